use anyhow::Result;
use async_trait::async_trait;
use bfm_core::{Activity, ResourceResponse, SendHook, SendNext, SharedTranscriptLogger, TurnContext};
use tracing::warn;

/// Send-pipeline hook that copies every outbound activity to a
/// transcript sink before delegating to the rest of the pipeline.
/// Transcript failures never fail the send.
pub struct TranscriptLoggerMiddleware {
    logger: SharedTranscriptLogger,
}

impl TranscriptLoggerMiddleware {
    pub fn new(logger: SharedTranscriptLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl SendHook for TranscriptLoggerMiddleware {
    async fn on_send(
        &self,
        _context: &TurnContext,
        activities: Vec<Activity>,
        next: SendNext<'_>,
    ) -> Result<Vec<ResourceResponse>> {
        for activity in &activities {
            if let Err(err) = self.logger.log_activity(activity).await {
                warn!(error = %err, "transcript logging failed");
            }
        }
        next.run(activities).await
    }
}
