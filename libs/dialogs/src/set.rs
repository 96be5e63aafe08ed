use crate::context::DialogContext;
use crate::dialog::SharedDialog;
use crate::state::DialogState;
use bfm_core::TurnContext;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The container of dialogs a conversation can run. Its version hash
/// covers the child dialog set, so a redeployed bot can detect that a
/// resumed conversation was persisted by older dialog definitions.
#[derive(Default)]
pub struct DialogSet {
    dialogs: BTreeMap<String, SharedDialog>,
}

impl DialogSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, dialog: SharedDialog) -> Self {
        self.dialogs.insert(dialog.id().to_string(), dialog);
        self
    }

    pub fn find(&self, id: &str) -> Option<SharedDialog> {
        self.dialogs.get(id).cloned()
    }

    /// Hash over the sorted (id, version) pairs of the registered
    /// dialogs.
    pub fn version(&self) -> String {
        let mut hasher = Sha256::new();
        for (id, dialog) in &self.dialogs {
            hasher.update(id.as_bytes());
            hasher.update(b":");
            hasher.update(dialog.version().as_bytes());
            hasher.update(b";");
        }
        hex::encode(hasher.finalize())
    }

    /// Binds this set to one turn and its loaded dialog state.
    pub fn create_context<'a>(
        &'a self,
        context: &'a TurnContext,
        state: &'a mut DialogState,
    ) -> DialogContext<'a> {
        DialogContext {
            dialogs: self,
            context,
            state,
        }
    }
}
