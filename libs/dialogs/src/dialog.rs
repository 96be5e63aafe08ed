use crate::context::DialogContext;
use crate::error::DialogError;
use crate::state::DialogInstance;
use async_trait::async_trait;
use bfm_core::TurnContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Shared dialog handle registered in a [`crate::DialogSet`].
pub type SharedDialog = Arc<dyn Dialog>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DialogTurnStatus {
    /// The stack was empty; nothing ran.
    Empty,
    /// The active dialog suspended awaiting the next inbound turn.
    Waiting,
    /// The stack completed and produced a result.
    Complete,
    /// The stack was cancelled.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogTurnResult {
    pub status: DialogTurnStatus,
    pub result: Option<Value>,
}

impl DialogTurnResult {
    pub fn empty() -> Self {
        Self {
            status: DialogTurnStatus::Empty,
            result: None,
        }
    }

    pub fn waiting() -> Self {
        Self {
            status: DialogTurnStatus::Waiting,
            result: None,
        }
    }

    pub fn complete(result: Option<Value>) -> Self {
        Self {
            status: DialogTurnStatus::Complete,
            result,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: DialogTurnStatus::Cancelled,
            result: None,
        }
    }
}

/// Why a dialog method is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogReason {
    BeginCalled,
    ContinueCalled,
    EndCalled,
    CancelCalled,
}

/// An event offered to the stack; see
/// [`DialogContext::emit_event`](crate::DialogContext::emit_event) for
/// the two-phase dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogEvent {
    pub name: String,
    pub value: Value,
}

pub mod dialog_events {
    /// Raised when a resumed conversation was persisted by a different
    /// version of the dialog set. Recoverable; traced when unhandled.
    pub const VERSION_CHANGED: &str = "versionChanged";
}

/// A named, resumable unit of conversational logic.
#[async_trait]
pub trait Dialog: Send + Sync {
    fn id(&self) -> &str;

    /// Version tag folded into the container hash; changes when the
    /// dialog's definition changes shape.
    fn version(&self) -> String {
        self.id().to_string()
    }

    /// Called when the dialog is pushed onto the stack.
    async fn begin(
        &self,
        dc: &mut DialogContext<'_>,
        options: Value,
    ) -> Result<DialogTurnResult, DialogError>;

    /// Called on the active dialog for each subsequent inbound turn.
    async fn continue_dialog(
        &self,
        _dc: &mut DialogContext<'_>,
    ) -> Result<DialogTurnResult, DialogError> {
        Ok(DialogTurnResult::waiting())
    }

    /// Called when a child dialog ended and this dialog becomes active
    /// again. By default the result is propagated by ending this dialog
    /// too.
    async fn resume(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> Result<DialogTurnResult, DialogError> {
        dc.end_dialog(result).await
    }

    /// Teardown hook; `reason` distinguishes normal completion
    /// (`EndCalled`) from cancellation (`CancelCalled`).
    async fn end(
        &self,
        _context: &TurnContext,
        _instance: &mut DialogInstance,
        _reason: DialogReason,
    ) -> Result<(), DialogError> {
        Ok(())
    }

    /// Pre-bubble phase of event dispatch; return `true` to mark the
    /// event handled.
    async fn on_event(
        &self,
        _context: &TurnContext,
        _event: &DialogEvent,
    ) -> Result<bool, DialogError> {
        Ok(false)
    }
}
