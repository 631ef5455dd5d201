use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("'{path}' does not have a security descriptor associated")]
    MissingDescriptor { path: String },

    #[error("Malformed entry: {0}")]
    MalformedEntry(String),

    #[error("Failed to read data for '{path}': {message}")]
    ParseFailure { path: String, message: String },

    #[error("Failed to run `{command}`: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl DescriptorError {
    pub(crate) fn parse_failure(path: &str, message: impl Into<String>) -> Self {
        DescriptorError::ParseFailure {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DescriptorError>;
