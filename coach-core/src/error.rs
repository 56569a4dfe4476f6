use thiserror::Error;

use crate::gemini::GeminiError;

/// Startup-time failures. All of them abort process initialisation.
#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing {0} in environment (or .env file)")]
    MissingCredential(&'static str),

    #[error("Gemini client error: {0}")]
    Gemini(#[from] GeminiError),
}

/// Everything that can abort a single `/analyze` request.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("could not stage uploaded audio: {0}")]
    Upload(#[from] std::io::Error),

    #[error("Audio processing failed: remote file {name} reported state {state}")]
    MediaProcessing { name: String, state: String },

    #[error("Audio processing timed out: remote file {name} still processing after {attempts} polls")]
    MediaProcessingTimeout { name: String, attempts: usize },

    #[error("AI provider request failed: {0}")]
    Provider(#[from] GeminiError),

    #[error("AI response did not contain text content: {response}")]
    Extraction { response: String },

    #[error("AI response could not be parsed as JSON: {message}")]
    Decode { message: String, raw: String },

    #[error("AI response failed validation at `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("could not save interview: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl AnalysisError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Short tag used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upload(_) => "upload",
            Self::MediaProcessing { .. } => "media_processing",
            Self::MediaProcessingTimeout { .. } => "media_processing_timeout",
            Self::Provider(_) => "provider",
            Self::Extraction { .. } => "extraction",
            Self::Decode { .. } => "decode",
            Self::Validation { .. } => "validation",
            Self::Persistence(_) => "persistence",
        }
    }
}
