//! Error types for the trial pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source '{source_name}' is missing required column '{column}'")]
    MissingColumn { source_name: String, column: String },

    #[error("source '{source_name}' is malformed: {detail}")]
    Malformed { source_name: String, detail: String },

    #[error("failed to process CSV file '{0}': {1}")]
    Csv(String, #[source] csv::Error),

    #[error("failed to read workbook '{0}': {1}")]
    Workbook(String, #[source] calamine::XlsxError),

    #[error("I/O error for '{0}': {1}")]
    Io(String, #[source] std::io::Error),

    #[error("no usable {0} data after all recoverable skips")]
    EmptyPipeline(&'static str),

    #[error("aggregation over empty input: {0}")]
    EmptyAggregation(&'static str),

    #[error("configuration error: {0}")]
    Config(String),
}
