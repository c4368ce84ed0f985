//! CLI error types and conversions

use crate::client::ClientError;
use crate::output::OutputError;
use crate::pipeline::PipelineError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Client error
    #[error("client error: {0}")]
    ClientError(#[from] ClientError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Pipeline error
    #[error("{0}")]
    PipelineError(#[from] PipelineError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
