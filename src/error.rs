use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClanTuneError {
    /// Parallel trees disagree on whether a metadata key holds an allele or a raw value.
    #[error("Type mismatch at '{path}': {detail}")]
    TypeMismatch { path: String, detail: String },

    /// Parallel trees disagree on raw metadata, variant, domain or capability flags.
    #[error("Schema mismatch at '{path}': {detail}")]
    SchemaMismatch { path: String, detail: String },

    #[error("Domain error: {0}")]
    Domain(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("{strategy} does not support {variant} alleles")]
    UnsupportedVariant { strategy: String, variant: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClanTuneError>;
