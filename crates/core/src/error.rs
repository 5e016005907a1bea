use std::path::PathBuf;

/// Failure to load or resolve a mapping document.
///
/// Always fatal at startup; nothing in the engine retries a configuration load.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to read mapping document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed YAML mapping document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Malformed JSON mapping document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported mapping document format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing required element: {0}")]
    MissingElement(&'static str),

    #[error("Duplicate entity key: {0}")]
    DuplicateEntity(String),

    #[error("Duplicate property {property} in entity {entity}")]
    DuplicateProperty { entity: String, property: String },

    #[error("Invalid mapping for entity {entity}: {reason}")]
    InvalidEntity { entity: String, reason: String },
}
