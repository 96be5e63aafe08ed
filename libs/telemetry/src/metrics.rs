/// Labels attached to every counter emitted by the turn pipeline.
#[derive(Debug, Clone, Default)]
pub struct TelemetryLabels {
    pub channel_id: Option<String>,
    pub activity_type: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl TelemetryLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_activity_type(mut self, activity_type: impl Into<String>) -> Self {
        self.activity_type = Some(activity_type.into());
        self
    }

    fn tags(&self) -> Vec<metrics::Label> {
        let mut tags = Vec::with_capacity(2 + self.extra.len());
        if let Some(channel) = &self.channel_id {
            tags.push(metrics::Label::new("channel_id", channel.clone()));
        }
        if let Some(activity_type) = &self.activity_type {
            tags.push(metrics::Label::new("activity_type", activity_type.clone()));
        }
        for (key, value) in &self.extra {
            tags.push(metrics::Label::new(key.clone(), value.clone()));
        }
        tags
    }
}

pub fn record_counter(name: &'static str, value: u64, labels: &TelemetryLabels) {
    metrics::counter!(name, labels.tags()).increment(value);
}

pub fn record_histogram(name: &'static str, value: f64, labels: &TelemetryLabels) {
    metrics::histogram!(name, labels.tags()).record(value);
}
