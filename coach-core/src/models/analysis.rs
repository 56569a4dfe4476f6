use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// STAR breakdown of a behavioural answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarAnalysis {
    pub situation: String,
    pub task: String,
    pub action: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceScore {
    pub score: f64,
    pub hesitation_words: u32,
    pub hesitation_details: Vec<String>,
    pub clarity: f64,
}

/// The validated model output, before it is stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub transcription: String,
    pub critique: String,
    pub star_analysis: StarAnalysis,
    pub confidence_score: ConfidenceScore,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub overall_rating: f64,
}

impl Feedback {
    pub fn stamp(self, timestamp: DateTime<Utc>) -> AnalysisResult {
        AnalysisResult {
            feedback: self,
            timestamp,
        }
    }
}

/// What `/analyze` returns: the feedback fields flattened next to `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub timestamp: DateTime<Utc>,
}
