use crate::error::{Result, StreamError};
use tokio::process::Command;
use tracing::debug;

/// Binaries used to talk to the container engine and the chart repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub engine: String,
    pub helm: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            engine: "docker".to_string(),
            helm: "helm".to_string(),
        }
    }
}

/// Runs an external program to completion and reports its exit code.
pub trait CommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<i32>;
}

/// Spawns real processes. Stdout and stderr are inherited so engine progress stays visible.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<i32> {
        debug!("Running command: {} {}", program, args.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|source| StreamError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // no exit code means the process was killed by a signal
        Ok(status.code().unwrap_or(-1))
    }
}
