pub mod config;
pub mod db;
pub mod decode;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod models;
pub mod prompt;
pub mod sanitize;

pub use config::CoachConfig;
pub use decode::{decode_feedback, ScorePolicy};
pub use error::{AnalysisError, CoachError};
pub use extract::{extract_text, ResponseShape};
pub use gemini::{GeminiClient, GeminiError, GenerativeBackend, MediaState, RemoteMedia};
pub use models::{AnalysisResult, Feedback, InterviewRecord};
pub use prompt::coaching_prompt;
pub use sanitize::strip_code_fences;
