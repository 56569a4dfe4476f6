pub mod analysis;
pub mod interview;

pub use analysis::{AnalysisResult, ConfidenceScore, Feedback, StarAnalysis};
pub use interview::InterviewRecord;
