use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("NPY write failed: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A required column is absent from an input file.
    #[error("{file}: missing columns {missing:?}")]
    Schema { file: String, missing: Vec<String> },

    /// A structural sanity check failed while building features.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Scrape error: {message}")]
    Scrape { message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
