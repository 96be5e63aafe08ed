//! Botframe dialog engine: a persisted stack of resumable dialogs per
//! conversation, a waterfall step sequencer with telemetry, two-phase
//! event dispatch, and version-change detection for redeployed bots.

mod context;
mod dialog;
mod error;
mod set;
mod state;
mod waterfall;

pub use context::DialogContext;
pub use dialog::{
    Dialog, DialogEvent, DialogReason, DialogTurnResult, DialogTurnStatus, SharedDialog,
    dialog_events,
};
pub use error::DialogError;
pub use set::DialogSet;
pub use state::{DialogInstance, DialogState, FrameState};
pub use waterfall::{
    StepResult, WATERFALL_CANCEL_EVENT, WATERFALL_COMPLETE_EVENT, WATERFALL_START_EVENT,
    WATERFALL_STEP_EVENT, WaterfallDialog, WaterfallStep, WaterfallStepContext,
};
