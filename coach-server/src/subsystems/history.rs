//! Interview history: one append-only row per analysed answer.

use coach_core::{AnalysisResult, InterviewRecord};
use sqlx::SqlitePool;

/// Insert the summary of `result` and return the new row id.
pub async fn record_interview(
    pool: &SqlitePool,
    result: &AnalysisResult,
    question: &str,
) -> Result<i64, sqlx::Error> {
    let feedback = &result.feedback;
    let done = sqlx::query(
        r#"
        INSERT INTO interviews (timestamp, question, transcription, feedback, confidence_score, clarity_score)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(result.timestamp)
    .bind(question)
    .bind(&feedback.transcription)
    .bind(&feedback.critique)
    .bind(feedback.confidence_score.score)
    .bind(feedback.confidence_score.clarity)
    .execute(pool)
    .await?;

    let id = done.last_insert_rowid();
    tracing::info!(id, "Saved interview to history");
    Ok(id)
}

/// Every recorded interview, newest first.
pub async fn list_history(pool: &SqlitePool) -> Result<Vec<InterviewRecord>, sqlx::Error> {
    sqlx::query_as::<_, InterviewRecord>(
        r#"
        SELECT id, timestamp, question, transcription, feedback, confidence_score, clarity_score
        FROM interviews
        ORDER BY id DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coach_core::config::DatabaseConfig;
    use coach_core::models::{ConfidenceScore, Feedback, StarAnalysis};

    async fn scratch_pool(dir: &tempfile::TempDir) -> SqlitePool {
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("history.db").display()),
            max_connections: 2,
        };
        let pool = coach_core::db::create_pool(&config).await.unwrap();
        coach_core::db::init_schema(&pool).await.unwrap();
        pool
    }

    fn result(transcription: &str, score: f64, clarity: f64) -> AnalysisResult {
        Feedback {
            transcription: transcription.to_string(),
            critique: format!("critique of {transcription}"),
            star_analysis: StarAnalysis {
                situation: "s".to_string(),
                task: "t".to_string(),
                action: "a".to_string(),
                result: "r".to_string(),
            },
            confidence_score: ConfidenceScore {
                score,
                hesitation_words: 0,
                hesitation_details: vec![],
                clarity,
            },
            strengths: vec![],
            improvements: vec![],
            overall_rating: 7.0,
        }
        .stamp(Utc::now())
    }

    #[tokio::test]
    async fn record_then_list_returns_new_row_first() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir).await;

        let first = record_interview(&pool, &result("first", 6.0, 7.0), "Q1").await.unwrap();
        let second = record_interview(&pool, &result("second", 8.5, 9.0), "Q2").await.unwrap();
        assert!(second > first);

        let rows = list_history(&pool).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, second);
        assert_eq!(rows[0].question, "Q2");
        assert_eq!(rows[0].transcription, "second");
        assert_eq!(rows[0].feedback, "critique of second");
        assert_eq!(rows[0].confidence_score, 8.5);
        assert_eq!(rows[0].clarity_score, 9.0);
        assert_eq!(rows[1].id, first);
    }

    #[tokio::test]
    async fn n_inserts_yield_n_rows() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir).await;

        for i in 0..7 {
            record_interview(&pool, &result(&format!("answer {i}"), 5.0, 5.0), "Q")
                .await
                .unwrap();
        }

        let rows = list_history(&pool).await.unwrap();
        assert_eq!(rows.len(), 7);
        assert!(rows.windows(2).all(|w| w[0].id > w[1].id));
        assert_eq!(rows[0].transcription, "answer 6");
    }

    #[tokio::test]
    async fn timestamp_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir).await;

        let analysed = result("ts", 5.0, 5.0);
        record_interview(&pool, &analysed, "Q").await.unwrap();

        let rows = list_history(&pool).await.unwrap();
        let drift = rows[0].timestamp - analysed.timestamp;
        assert_eq!(drift.num_milliseconds(), 0);
    }

    #[tokio::test]
    async fn empty_history_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir).await;
        assert!(list_history(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_without_schema_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("bare.db").display()),
            max_connections: 1,
        };
        let pool = coach_core::db::create_pool(&config).await.unwrap();
        assert!(record_interview(&pool, &result("x", 1.0, 1.0), "Q").await.is_err());
    }
}
