use crate::dialog::{
    DialogEvent, DialogReason, DialogTurnResult, dialog_events,
};
use crate::error::DialogError;
use crate::set::DialogSet;
use crate::state::{DialogInstance, DialogState};
use bfm_core::{Activity, TurnContext};
use serde_json::json;
use tracing::{debug, warn};

/// Binds a dialog set, the current turn, and the conversation's loaded
/// dialog stack for the duration of one turn.
pub struct DialogContext<'a> {
    pub(crate) dialogs: &'a DialogSet,
    pub(crate) context: &'a TurnContext,
    pub(crate) state: &'a mut DialogState,
}

impl<'a> DialogContext<'a> {
    pub fn context(&self) -> &TurnContext {
        self.context
    }

    pub fn active_instance(&self) -> Option<&DialogInstance> {
        self.state.active()
    }

    pub fn active_instance_mut(&mut self) -> Option<&mut DialogInstance> {
        self.state.active_mut()
    }

    /// Pushes a new instance of the named dialog and runs its begin
    /// logic. The new instance becomes the active dialog.
    pub async fn begin_dialog(
        &mut self,
        id: &str,
        options: serde_json::Value,
    ) -> Result<DialogTurnResult, DialogError> {
        let dialog = self
            .dialogs
            .find(id)
            .ok_or_else(|| DialogError::NotFound(id.to_string()))?;
        let instance = DialogInstance::new(id, Some(self.dialogs.version()));
        debug!(dialog_id = id, instance_id = %instance.instance_id, "beginning dialog");
        self.state.stack.push(instance);
        dialog.begin(self, options).await
    }

    /// Resumes the active dialog with the current turn's activity. An
    /// empty stack is a no-op.
    pub async fn continue_dialog(&mut self) -> Result<DialogTurnResult, DialogError> {
        self.check_for_version_change().await?;
        let Some(instance) = self.state.active() else {
            return Ok(DialogTurnResult::empty());
        };
        let id = instance.id.clone();
        let dialog = self
            .dialogs
            .find(&id)
            .ok_or_else(|| DialogError::NotFound(id))?;
        dialog.continue_dialog(self).await
    }

    /// Pops the active dialog, fires its end hook with `EndCalled`, and
    /// propagates the result to the parent dialog's resume logic.
    pub async fn end_dialog(
        &mut self,
        result: Option<serde_json::Value>,
    ) -> Result<DialogTurnResult, DialogError> {
        if let Some(mut instance) = self.state.stack.pop() {
            instance.state = crate::state::FrameState::Ended {
                result: result.clone(),
            };
            if let Some(dialog) = self.dialogs.find(&instance.id) {
                dialog
                    .end(self.context, &mut instance, DialogReason::EndCalled)
                    .await?;
            }
        }

        let parent_id = self.state.active().map(|instance| instance.id.clone());
        match parent_id {
            Some(id) => {
                let dialog = self
                    .dialogs
                    .find(&id)
                    .ok_or_else(|| DialogError::NotFound(id))?;
                dialog.resume(self, DialogReason::EndCalled, result).await
            }
            None => Ok(DialogTurnResult::complete(result)),
        }
    }

    /// Unwinds the entire stack, firing each dialog's end hook with
    /// `CancelCalled` innermost-to-outermost. Atomic from the caller's
    /// point of view; partial cancellation is not a valid outcome.
    pub async fn cancel_all_dialogs(&mut self) -> Result<DialogTurnResult, DialogError> {
        if self.state.is_empty() {
            return Ok(DialogTurnResult::empty());
        }
        while let Some(mut instance) = self.state.stack.pop() {
            if let Some(dialog) = self.dialogs.find(&instance.id) {
                dialog
                    .end(self.context, &mut instance, DialogReason::CancelCalled)
                    .await?;
            }
        }
        Ok(DialogTurnResult::cancelled())
    }

    /// Two-phase event dispatch: the active child gets the event first;
    /// if unhandled, the container fallback runs. Returns whether any
    /// phase handled it.
    pub async fn emit_event(&mut self, event: DialogEvent) -> Result<bool, DialogError> {
        if let Some(instance) = self.state.active() {
            if let Some(dialog) = self.dialogs.find(&instance.id) {
                if dialog.on_event(self.context, &event).await? {
                    return Ok(true);
                }
            }
        }
        self.handle_container_event(&event).await
    }

    /// Container fallback phase. A `versionChanged` event nobody
    /// handled is traced; re-running an outdated dialog version is
    /// recoverable, not an error.
    async fn handle_container_event(&mut self, event: &DialogEvent) -> Result<bool, DialogError> {
        if event.name == dialog_events::VERSION_CHANGED {
            warn!(value = %event.value, "dialog version changed under a resumed conversation");
            let mut trace = Activity::trace(
                "DialogVersionChanged",
                Some(event.value.clone()),
                Some("Dialog version changed under a resumed conversation".into()),
            );
            trace.channel_id = self.context.activity().channel_id.clone();
            trace.conversation = self.context.activity().conversation.clone();
            self.context.send_activity(trace).await?;
        }
        Ok(false)
    }

    /// Compares the version stamped on the outermost frame against the
    /// freshly computed container version and raises `versionChanged`
    /// on mismatch.
    pub async fn check_for_version_change(&mut self) -> Result<(), DialogError> {
        let Some(bottom) = self.state.stack.first() else {
            return Ok(());
        };
        let current = self.dialogs.version();
        if bottom.version.as_deref() == Some(current.as_str()) {
            return Ok(());
        }
        let dialog_id = bottom.id.clone();
        self.state.stack[0].version = Some(current);
        self.emit_event(DialogEvent {
            name: dialog_events::VERSION_CHANGED.to_string(),
            value: json!({ "dialogId": dialog_id }),
        })
        .await?;
        Ok(())
    }
}
