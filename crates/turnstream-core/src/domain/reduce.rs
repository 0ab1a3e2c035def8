use crate::domain::effect::{Effect, TurnOutcome};
use crate::domain::event::{StampedEvent, TurnEvent};
use crate::domain::state::{
    Message, ReasoningFragment, StepStatus, Turn, TurnLifecycle, TurnState, WorkflowStep,
};
use crate::domain::types::{Timestamp, ToolCallId, TurnId};
use std::sync::Arc;

/// Applies one canonical event to the aggregate.
///
/// Total: unknown ids, missing streaming messages and events outside an
/// active turn are no-ops. Only `TurnStarted` is accepted while no turn is
/// active.
pub fn reduce(state: &mut TurnState, stamped: StampedEvent) -> Vec<Effect> {
    let StampedEvent { event, at } = stamped;

    if !state.is_turn_active() && !matches!(event, TurnEvent::TurnStarted { .. }) {
        tracing::debug!(
            target: "turnstream::reduce",
            event = event.kind(),
            "Ignoring event outside an active turn"
        );
        return vec![];
    }

    match event {
        TurnEvent::TurnStarted { turn_id } => handle_turn_started(state, turn_id, at),

        TurnEvent::TextDelta { delta } => {
            if let Some(message) = state.streaming_message_mut() {
                message.content.push_str(&delta);
            }
            vec![]
        }

        TurnEvent::ReasoningDelta { delta } => handle_reasoning_delta(state, delta, at),

        TurnEvent::ToolCallStarted { id, name } => {
            state.tool_calls.start(id.clone(), name);
            state.mirror_tool_call(&id);
            vec![]
        }

        TurnEvent::ToolCallArgsDelta { id, delta } => {
            if state.tool_calls.append_arguments(&id, &delta) {
                state.mirror_tool_call(&id);
            } else {
                log_unknown_tool_call(&id, "args");
            }
            vec![]
        }

        TurnEvent::ToolCallResult { id, result } => {
            if state.tool_calls.complete(&id, result) {
                state.mirror_tool_call(&id);
            } else {
                log_unknown_tool_call(&id, "result");
            }
            vec![]
        }

        TurnEvent::ToolCallFailed { id, error } => {
            if state.tool_calls.fail(&id, error) {
                state.mirror_tool_call(&id);
            } else {
                log_unknown_tool_call(&id, "failure");
            }
            vec![]
        }

        TurnEvent::StepStarted { name } => {
            let id = state.ids.step_id();
            state.steps.push(WorkflowStep {
                id,
                name,
                status: StepStatus::InProgress,
                started_at: at,
                finished_at: None,
                elapsed_ms: None,
            });
            vec![]
        }

        TurnEvent::StepFinished { name } => {
            handle_step_finished(state, &name, at);
            vec![]
        }

        TurnEvent::TurnFinished => finish_turn(state, TurnLifecycle::Finished, None),

        TurnEvent::TurnFailed { message } => {
            finish_turn(state, TurnLifecycle::Failed, Some(message))
        }
    }
}

fn handle_turn_started(
    state: &mut TurnState,
    turn_id: Option<TurnId>,
    at: Timestamp,
) -> Vec<Effect> {
    if state.is_turn_active() {
        // The wire acknowledgement of a turn the driver already opened.
        tracing::debug!(target: "turnstream::reduce", "Turn already active, ignoring TurnStarted");
        return vec![];
    }

    let message_id = state.ids.message_id();
    let turn_id = turn_id.unwrap_or_else(|| state.ids.turn_id());

    state
        .messages
        .push(Arc::new(Message::streaming_assistant(message_id.clone(), at)));
    state.streaming_message_id = Some(message_id.clone());
    state.loading = true;
    state.clear_turn_scratch();
    state.turn = Some(Turn {
        id: turn_id,
        thread_id: state.thread_id.clone(),
        message_id,
        lifecycle: TurnLifecycle::Active,
        started_at: at,
    });

    vec![]
}

fn handle_reasoning_delta(state: &mut TurnState, delta: String, at: Timestamp) -> Vec<Effect> {
    let fragment = ReasoningFragment {
        id: state.ids.fragment_id(),
        text: delta,
        timestamp: at,
    };

    if let Some(message) = state.streaming_message_mut() {
        message.reasoning.push(fragment.clone());
    }
    state.reasoning.push(fragment);

    vec![]
}

fn handle_step_finished(state: &mut TurnState, name: &str, at: Timestamp) {
    let Some(step) = state
        .steps
        .iter_mut()
        .rev()
        .find(|s| s.name == name && s.status == StepStatus::InProgress)
    else {
        tracing::debug!(target: "turnstream::reduce", step = name, "No in-progress step to finish");
        return;
    };

    step.status = StepStatus::Completed;
    step.finished_at = Some(at);
    step.elapsed_ms = Some(at.saturating_sub(step.started_at));
}

fn finish_turn(
    state: &mut TurnState,
    lifecycle: TurnLifecycle,
    error: Option<String>,
) -> Vec<Effect> {
    let Some(turn) = state.turn.as_mut() else {
        return vec![];
    };
    turn.lifecycle = lifecycle;
    let turn_id = turn.id.clone();
    let message_id = turn.message_id.clone();

    state.loading = false;
    state.streaming_message_id = None;
    if let Some(message) = state.message_mut(&message_id) {
        message.streaming = false;
    }

    let outcome = match error {
        Some(message) => {
            state.error = Some(message.clone());
            TurnOutcome::Failed { message }
        }
        None => TurnOutcome::Completed,
    };

    vec![Effect::TurnResolved { turn_id, outcome }]
}

fn log_unknown_tool_call(id: &ToolCallId, what: &str) {
    tracing::debug!(
        target: "turnstream::reduce",
        tool_call_id = %id,
        "Ignoring tool call {what} for unknown or finished call"
    );
}
