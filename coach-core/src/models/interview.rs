use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `interviews` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InterviewRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub transcription: String,
    pub feedback: String,
    pub confidence_score: f64,
    pub clarity_score: f64,
}
