use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Well-known channel identifiers consulted by the turn pipeline.
pub mod channels {
    pub const EMULATOR: &str = "emulator";
    pub const DIRECTLINE: &str = "directline";
    pub const MSTEAMS: &str = "msteams";
    pub const WEBCHAT: &str = "webchat";
    pub const TEST: &str = "test";
}

/// Wire-level activity kinds.
///
/// ```
/// use bfm_core::ActivityType;
///
/// let ty: ActivityType = serde_json::from_str("\"invokeResponse\"").unwrap();
/// assert_eq!(ty, ActivityType::InvokeResponse);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    Message,
    Typing,
    Delay,
    Trace,
    Invoke,
    InvokeResponse,
    Event,
    MessageUpdate,
    MessageDelete,
    EndOfConversation,
    ConversationUpdate,
    Handoff,
    #[serde(other)]
    Unknown,
}

/// Per-activity flag altering outbound send semantics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryMode {
    #[default]
    Normal,
    ExpectReplies,
}

/// Role attached to a channel account; `skill` marks bot-to-bot traffic.
pub mod role_types {
    pub const USER: &str = "user";
    pub const BOT: &str = "bot";
    pub const SKILL: &str = "skill";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            role: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Address of a conversation, sufficient to resume it proactively.
///
/// Continuation input is only valid when both `conversation` and
/// `service_url` are present; callers check this before any network work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub service_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// One message/event unit of the conversational protocol.
///
/// Activities arrive immutable from the wire; the adapter owns the two
/// exceptions (ids are cleared before send, `caller_id` is stamped on
/// inbound activities after authentication).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub service_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<DeliveryMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relates_to: Option<ConversationReference>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channel_data: BTreeMap<String, Value>,
}

impl Activity {
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            id: None,
            reply_to_id: None,
            channel_id: String::new(),
            service_url: String::new(),
            conversation: None,
            from: None,
            recipient: None,
            delivery_mode: None,
            caller_id: None,
            text: None,
            name: None,
            value: None,
            value_type: None,
            label: None,
            locale: None,
            timestamp: None,
            relates_to: None,
            channel_data: BTreeMap::new(),
        }
    }

    /// Message activity with the given text.
    pub fn message(text: impl Into<String>) -> Self {
        let mut activity = Self::new(ActivityType::Message);
        activity.text = Some(text.into());
        activity
    }

    /// Trace activity; dropped by the adapter on non-emulator channels.
    pub fn trace(name: impl Into<String>, value: Option<Value>, label: Option<String>) -> Self {
        let mut activity = Self::new(ActivityType::Trace);
        activity.name = Some(name.into());
        activity.value = value;
        activity.value_type = Some("https://www.botframework.com/schemas/trace".into());
        activity.label = label;
        activity
    }

    pub fn is_type(&self, activity_type: ActivityType) -> bool {
        self.activity_type == activity_type
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode.unwrap_or_default()
    }

    /// Extracts the conversation reference addressing this activity.
    pub fn get_conversation_reference(&self) -> ConversationReference {
        ConversationReference {
            activity_id: self.id.clone(),
            user: self.from.clone(),
            bot: self.recipient.clone(),
            conversation: self.conversation.clone(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
            locale: self.locale.clone(),
        }
    }

    /// Stamps a conversation reference onto this activity.
    ///
    /// Incoming direction swaps the reference's bot/user into
    /// from/recipient; outgoing direction keeps the bot as sender.
    pub fn apply_conversation_reference(
        mut self,
        reference: &ConversationReference,
        is_incoming: bool,
    ) -> Self {
        self.channel_id = reference.channel_id.clone();
        self.service_url = reference.service_url.clone();
        self.conversation = reference.conversation.clone();
        if let Some(locale) = &reference.locale {
            self.locale = Some(locale.clone());
        }
        if is_incoming {
            self.from = reference.user.clone();
            self.recipient = reference.bot.clone();
            if let Some(id) = &reference.activity_id {
                self.id = Some(id.clone());
            }
        } else {
            self.from = reference.bot.clone();
            self.recipient = reference.user.clone();
            if let Some(id) = &reference.activity_id {
                self.reply_to_id = Some(id.clone());
            }
        }
        self
    }

    /// Builds a reply addressed back at this activity's sender.
    pub fn create_reply(&self, text: Option<&str>) -> Activity {
        let mut reply = Activity::new(ActivityType::Message);
        reply.text = text.map(|t| t.to_string());
        reply.channel_id = self.channel_id.clone();
        reply.service_url = self.service_url.clone();
        reply.conversation = self.conversation.clone();
        reply.from = self.recipient.clone();
        reply.recipient = self.from.clone();
        reply.reply_to_id = self.id.clone();
        reply.locale = self.locale.clone();
        reply
    }

    /// The synthetic event used to re-enter a conversation proactively.
    pub fn continuation(reference: &ConversationReference) -> Activity {
        let mut activity = Activity::new(ActivityType::Event);
        activity.name = Some("ContinueConversation".into());
        activity.relates_to = Some(reference.clone());
        activity.apply_conversation_reference(reference, true)
    }
}

/// Id handed back by the connector for each delivered activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponse {
    #[serde(default)]
    pub id: String,
}

impl ResourceResponse {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Synchronous payload reconciled for invoke and expect-replies turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvokeResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl InvokeResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Body of an expect-replies response: the buffered turn activities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedReplies {
    #[serde(default)]
    pub activities: Vec<Activity>,
}
