use std::fmt;

/// Progress of a single delivery task.
///
/// `Pending -> SourceResolved -> Pulled -> Tagged -> Delivered`, or `Failed` from any
/// state on the first error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Pending,
    SourceResolved,
    Pulled,
    Tagged,
    Delivered,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "pending",
            TaskState::SourceResolved => "source resolved",
            TaskState::Pulled => "pulled",
            TaskState::Tagged => "tagged",
            TaskState::Delivered => "delivered",
            TaskState::Failed => "failed",
        };
        f.write_str(name)
    }
}
