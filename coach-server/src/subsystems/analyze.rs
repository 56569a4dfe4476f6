//! Analysis orchestrator.
//!
//! read artifact → upload → wait for the remote file to leave PROCESSING → generate →
//! extract → strip fences → decode/validate → timestamp.
//!
//! Only the state poll repeats. The model call is made exactly once; any
//! failure aborts the whole analysis with a single `AnalysisError`.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use coach_core::config::AnalysisConfig;
use coach_core::{
    coaching_prompt, decode_feedback, extract_text, strip_code_fences, AnalysisError,
    AnalysisResult, GeminiError, GenerativeBackend, MediaState, RemoteMedia, ScorePolicy,
};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

/// Characters of model output shown in debug logs.
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub poll_interval: Duration,
    /// 0 polls until the file leaves PROCESSING, however long that takes.
    pub max_poll_attempts: usize,
    pub score_policy: ScorePolicy,
}

impl From<&AnalysisConfig> for AnalysisSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_poll_attempts: config.max_poll_attempts,
            score_policy: ScorePolicy::from_flag(config.enforce_score_range),
        }
    }
}

/// Analyse one recorded answer to `question`.
pub async fn analyze(
    backend: &dyn GenerativeBackend,
    settings: &AnalysisSettings,
    audio_path: &Path,
    mime_type: &str,
    question: &str,
) -> Result<AnalysisResult, AnalysisError> {
    tracing::info!(path = %audio_path.display(), backend = backend.name(), "Processing answer");

    let bytes = tokio::fs::read(audio_path).await?;
    let display_name = audio_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("answer");

    let uploaded = backend.upload_media(display_name, bytes, mime_type).await?;
    let media = wait_until_processed(backend, uploaded, settings).await?;

    if media.state == MediaState::Failed {
        return Err(AnalysisError::MediaProcessing {
            name: media.name,
            state: media.state.as_str().to_string(),
        });
    }

    let response = backend.generate(&media, &coaching_prompt(question)).await?;

    let raw = extract_text(&response)?;
    let cleaned = strip_code_fences(&raw);
    tracing::debug!(preview = %preview(&cleaned), "Raw AI response");

    let feedback = decode_feedback(&cleaned, settings.score_policy)?;
    Ok(feedback.stamp(Utc::now()))
}

enum PollError {
    StillProcessing,
    Provider(GeminiError),
}

/// Poll `media` until its state is anything but PROCESSING.
///
/// Every poll, the first included, waits `poll_interval` beforehand. At most
/// `max_poll_attempts` polls are made.
pub async fn wait_until_processed(
    backend: &dyn GenerativeBackend,
    media: RemoteMedia,
    settings: &AnalysisSettings,
) -> Result<RemoteMedia, AnalysisError> {
    if media.state != MediaState::Processing {
        return Ok(media);
    }

    let interval = FixedInterval::new(settings.poll_interval);
    let strategy: Box<dyn Iterator<Item = Duration> + Send> = match settings.max_poll_attempts {
        0 => Box::new(interval),
        n => Box::new(interval.take(n - 1)),
    };

    let name = media.name.as_str();
    let mut attempts = 0usize;

    // RetryIf fires its first attempt immediately
    tokio::time::sleep(settings.poll_interval).await;

    let outcome = RetryIf::spawn(
        strategy,
        || {
            attempts += 1;
            let attempt = attempts;
            async move {
                let polled = backend.media_status(name).await.map_err(PollError::Provider)?;
                tracing::debug!(file = name, attempt, state = polled.state.as_str(), "Polled remote file");
                match polled.state {
                    MediaState::Processing => Err(PollError::StillProcessing),
                    _ => Ok(polled),
                }
            }
        },
        |e: &PollError| matches!(e, PollError::StillProcessing),
    )
    .await;

    match outcome {
        Ok(polled) => Ok(polled),
        Err(PollError::Provider(e)) => Err(e.into()),
        Err(PollError::StillProcessing) => Err(AnalysisError::MediaProcessingTimeout {
            name: media.name.clone(),
            attempts,
        }),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
