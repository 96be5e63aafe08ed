use crate::context::DialogContext;
use crate::dialog::{Dialog, DialogReason, DialogTurnResult};
use crate::error::DialogError;
use crate::state::{DialogInstance, FrameState};
use async_trait::async_trait;
use bfm_core::TurnContext;
use bfm_telemetry::{NullTelemetrySink, SharedTelemetrySink};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub const WATERFALL_START_EVENT: &str = "WaterfallStart";
pub const WATERFALL_STEP_EVENT: &str = "WaterfallStep";
pub const WATERFALL_COMPLETE_EVENT: &str = "WaterfallComplete";
pub const WATERFALL_CANCEL_EVENT: &str = "WaterfallCancel";

const DIALOG_ID_PROPERTY: &str = "DialogId";
const INSTANCE_ID_PROPERTY: &str = "InstanceId";
const STEP_NAME_PROPERTY: &str = "StepName";

/// What a waterfall step tells the engine to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// Suspend; the conversation resumes at the next step on the next
    /// inbound turn.
    EndOfTurn,
    /// Advance immediately; the value becomes the next step's input.
    Next(Option<Value>),
    /// Complete the waterfall with a result.
    EndDialog(Option<Value>),
    /// Unwind the entire dialog stack.
    CancelAll,
}

/// Per-step view handed to a step function.
pub struct WaterfallStepContext<'a> {
    /// The turn the step is running in.
    pub context: &'a TurnContext,
    /// Zero-based index of this step.
    pub index: usize,
    /// Options the dialog was begun with.
    pub options: Value,
    /// Result threaded from the previous step (or the inbound activity
    /// on a resumed turn).
    pub result: Option<Value>,
    /// Scratch values persisted with the frame across turns.
    pub values: &'a mut BTreeMap<String, Value>,
}

/// A step function; build one with an explicit [`WaterfallStep`]
/// binding so the closure coerces to the boxed-future signature.
pub type WaterfallStep = Arc<
    dyn for<'a> Fn(WaterfallStepContext<'a>) -> BoxFuture<'a, Result<StepResult, DialogError>>
        + Send
        + Sync,
>;

/// A named ordered sequence of steps that suspends between steps and
/// resumes on the next inbound turn.
pub struct WaterfallDialog {
    id: String,
    steps: Vec<WaterfallStep>,
    telemetry: SharedTelemetrySink,
}

impl WaterfallDialog {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            telemetry: Arc::new(NullTelemetrySink),
        }
    }

    pub fn with_telemetry(mut self, telemetry: SharedTelemetrySink) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn add_step(mut self, step: WaterfallStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn step_name(&self, index: usize) -> String {
        format!("Step{}of{}", index + 1, self.steps.len())
    }

    fn track(&self, event: &str, instance_id: &str, step_name: Option<String>) {
        let mut properties = BTreeMap::new();
        properties.insert(DIALOG_ID_PROPERTY.to_string(), self.id.clone());
        properties.insert(INSTANCE_ID_PROPERTY.to_string(), instance_id.to_string());
        if let Some(step_name) = step_name {
            properties.insert(STEP_NAME_PROPERTY.to_string(), step_name);
        }
        self.telemetry
            .track_event(event, &properties, &BTreeMap::new());
    }

    /// Runs steps from `index`, threading `Next` results forward until
    /// a step suspends, completes, or cancels. Running past the final
    /// step completes the dialog with the last result.
    async fn run_steps(
        &self,
        dc: &mut DialogContext<'_>,
        start_index: usize,
        mut input: Option<Value>,
    ) -> Result<DialogTurnResult, DialogError> {
        let mut index = start_index;
        loop {
            if index >= self.steps.len() {
                return dc.end_dialog(input).await;
            }

            let (options, mut values, instance_id) = {
                let instance = dc.active_instance().ok_or(DialogError::NoActiveDialog)?;
                match &instance.state {
                    FrameState::AwaitingInput {
                        options, values, ..
                    } => (options.clone(), values.clone(), instance.instance_id.clone()),
                    _ => (Value::Null, BTreeMap::new(), instance.instance_id.clone()),
                }
            };

            debug!(dialog_id = %self.id, index, "running waterfall step");
            let turn = dc.context;
            let step_context = WaterfallStepContext {
                context: turn,
                index,
                options: options.clone(),
                result: input.take(),
                values: &mut values,
            };
            let outcome = (self.steps[index])(step_context).await?;

            if let Some(instance) = dc.active_instance_mut() {
                instance.state = FrameState::AwaitingInput {
                    step_index: index,
                    options,
                    values,
                };
            }

            match outcome {
                StepResult::EndOfTurn => {
                    self.track(
                        WATERFALL_STEP_EVENT,
                        &instance_id,
                        Some(self.step_name(index)),
                    );
                    return Ok(DialogTurnResult::waiting());
                }
                StepResult::Next(value) => {
                    self.track(
                        WATERFALL_STEP_EVENT,
                        &instance_id,
                        Some(self.step_name(index)),
                    );
                    input = value;
                    index += 1;
                }
                StepResult::EndDialog(value) => {
                    self.track(
                        WATERFALL_STEP_EVENT,
                        &instance_id,
                        Some(self.step_name(index)),
                    );
                    return dc.end_dialog(value).await;
                }
                // The cancelling step gets no step event; the cancel
                // event fires from the end hook with this step's name.
                StepResult::CancelAll => {
                    return dc.cancel_all_dialogs().await;
                }
            }
        }
    }
}

#[async_trait]
impl Dialog for WaterfallDialog {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> String {
        format!("{}:{}", self.id, self.steps.len())
    }

    async fn begin(
        &self,
        dc: &mut DialogContext<'_>,
        options: Value,
    ) -> Result<DialogTurnResult, DialogError> {
        let instance_id = {
            let instance = dc.active_instance_mut().ok_or(DialogError::NoActiveDialog)?;
            instance.state = FrameState::AwaitingInput {
                step_index: 0,
                options: options.clone(),
                values: BTreeMap::new(),
            };
            instance.instance_id.clone()
        };
        self.track(WATERFALL_START_EVENT, &instance_id, None);
        self.run_steps(dc, 0, None).await
    }

    async fn continue_dialog(
        &self,
        dc: &mut DialogContext<'_>,
    ) -> Result<DialogTurnResult, DialogError> {
        let step_index = match dc.active_instance().map(|instance| &instance.state) {
            Some(FrameState::AwaitingInput { step_index, .. }) => *step_index,
            Some(_) => 0,
            None => return Err(DialogError::NoActiveDialog),
        };
        let input = serde_json::to_value(dc.context().activity()).ok();
        self.run_steps(dc, step_index + 1, input).await
    }

    async fn resume(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> Result<DialogTurnResult, DialogError> {
        let step_index = match dc.active_instance().map(|instance| &instance.state) {
            Some(FrameState::AwaitingInput { step_index, .. }) => *step_index,
            _ => return Err(DialogError::NoActiveDialog),
        };
        self.run_steps(dc, step_index + 1, result).await
    }

    async fn end(
        &self,
        _context: &TurnContext,
        instance: &mut DialogInstance,
        reason: DialogReason,
    ) -> Result<(), DialogError> {
        match reason {
            DialogReason::CancelCalled => {
                let step_name = match &instance.state {
                    FrameState::AwaitingInput { step_index, .. } => {
                        Some(self.step_name(*step_index))
                    }
                    _ => None,
                };
                instance.state = FrameState::Cancelled;
                self.track(WATERFALL_CANCEL_EVENT, &instance.instance_id, step_name);
            }
            DialogReason::EndCalled => {
                self.track(WATERFALL_COMPLETE_EVENT, &instance.instance_id, None);
            }
            _ => {}
        }
        Ok(())
    }
}
