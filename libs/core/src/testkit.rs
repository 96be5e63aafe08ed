//! Test doubles shared by downstream crates (feature `testkit`).

use crate::activity::{Activity, ResourceResponse};
use crate::context::{ActivitySender, TurnContext};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Sender that records everything reaching the pipeline terminal and
/// answers with sequential resource ids.
#[derive(Default)]
pub struct CapturingSender {
    sent: Mutex<Vec<Activity>>,
    updated: Mutex<Vec<Activity>>,
    deleted: Mutex<Vec<String>>,
}

impl CapturingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Activity> {
        self.sent.lock().expect("capture lock poisoned").clone()
    }

    pub fn updated(&self) -> Vec<Activity> {
        self.updated.lock().expect("capture lock poisoned").clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("capture lock poisoned").clone()
    }
}

#[async_trait]
impl ActivitySender for CapturingSender {
    async fn send_activities(
        &self,
        _context: &TurnContext,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>> {
        let mut sent = self.sent.lock().expect("capture lock poisoned");
        let start = sent.len();
        let responses = activities
            .iter()
            .enumerate()
            .map(|(i, _)| ResourceResponse::new(format!("res-{}", start + i)))
            .collect();
        sent.extend(activities);
        Ok(responses)
    }

    async fn update_activity(
        &self,
        _context: &TurnContext,
        activity: Activity,
    ) -> Result<Option<ResourceResponse>> {
        let id = activity.id.clone().unwrap_or_default();
        self.updated
            .lock()
            .expect("capture lock poisoned")
            .push(activity);
        Ok(Some(ResourceResponse::new(id)))
    }

    async fn delete_activity(&self, _context: &TurnContext, activity_id: &str) -> Result<()> {
        self.deleted
            .lock()
            .expect("capture lock poisoned")
            .push(activity_id.to_string());
        Ok(())
    }
}

/// Turn context over a [`CapturingSender`] for driving dialogs in tests.
pub fn capture_context(activity: Activity) -> (TurnContext, Arc<CapturingSender>) {
    let sender = CapturingSender::new();
    let context = TurnContext::new(sender.clone(), activity);
    (context, sender)
}
