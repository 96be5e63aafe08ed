use crate::activity::Activity;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Shared transcript sink handle.
pub type SharedTranscriptLogger = Arc<dyn TranscriptLogger>;

/// Receives a copy of every activity flowing through the send pipeline.
#[async_trait]
pub trait TranscriptLogger: Send + Sync {
    async fn log_activity(&self, activity: &Activity) -> Result<()>;
}

/// In-memory transcript used in tests.
#[derive(Default)]
pub struct MemoryTranscriptLogger {
    activities: Mutex<Vec<Activity>>,
}

impl MemoryTranscriptLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.activities
            .lock()
            .expect("transcript lock poisoned")
            .clone()
    }
}

#[async_trait]
impl TranscriptLogger for MemoryTranscriptLogger {
    async fn log_activity(&self, activity: &Activity) -> Result<()> {
        self.activities
            .lock()
            .expect("transcript lock poisoned")
            .push(activity.clone());
        Ok(())
    }
}
