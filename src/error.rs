use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file {}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse YAML config")]
    ParseConfig(#[from] serde_yaml_ng::Error),

    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("task {task}: invalid source '{source_type}', expected 'image' or 'helm'")]
    InvalidSource { task: String, source_type: String },

    #[error("failed to fetch chart {chart}, exit code: {exit_code}")]
    ChartFetch { chart: String, exit_code: i32 },

    #[error("chart values file not found at {}", path.display())]
    MissingValuesFile { path: PathBuf },

    #[error("failed to read chart values file {}", path.display())]
    ReadValues {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse chart values file {}", path.display())]
    ParseValues {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("required image field '{field}' could not be resolved from chart values")]
    MissingField { field: &'static str },

    #[error("failed to {operation} image {reference}, exit code: {exit_code}")]
    ExternalCommand {
        operation: &'static str,
        reference: String,
        exit_code: i32,
    },

    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to create temporary chart directory")]
    TempDir(#[source] io::Error),
}

pub type Result<T, E = StreamError> = std::result::Result<T, E>;
