use async_trait::async_trait;
use eyre::Result;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;
use turnstream_core::domain::effect::TurnOutcome;
use turnstream_core::domain::state::TurnState;
use turnstream_core::session::SessionDriver;

use crate::render::TerminalRenderer;

pub mod ask;
pub mod chat;
pub mod config;
pub mod replay;

#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Submits `prompt`, feeding every snapshot of the turn to `renderer` until
/// the turn resolves. Ctrl-C cancels the turn instead of the process.
pub(crate) async fn drive_turn<W: Write + Send>(
    driver: &SessionDriver,
    prompt: &str,
    mut renderer: Option<&mut TerminalRenderer<W>>,
) -> Result<(TurnOutcome, Arc<TurnState>)> {
    let mut subscription = driver.subscribe().await?;
    let handle = driver.submit_user_input(prompt).await?;
    debug!(target: "turnstream::cli", turn_id = %handle.turn_id(), "Turn submitted");

    let outcome = handle.outcome();
    tokio::pin!(outcome);

    let mut subscribed = true;
    let outcome = loop {
        tokio::select! {
            outcome = &mut outcome => break outcome,
            envelope = subscription.recv(), if subscribed => match envelope {
                Some(envelope) => {
                    if let Some(renderer) = renderer.as_mut() {
                        renderer.render(&envelope.state)?;
                    }
                }
                None => subscribed = false,
            },
            _ = tokio::signal::ctrl_c() => {
                debug!(target: "turnstream::cli", "Interrupt received, cancelling turn");
                driver.cancel_turn().await?;
            }
        }
    };

    // Snapshots are published before the outcome resolves.
    let state = match subscription.latest() {
        Some(envelope) => envelope.state,
        None => driver.snapshot().await?,
    };
    if let Some(renderer) = renderer.as_mut() {
        renderer.render(&state)?;
    }

    Ok((outcome, state))
}

/// Maps a turn that did not complete to a process error.
pub(crate) fn ensure_completed(outcome: &TurnOutcome) -> Result<()> {
    match outcome {
        TurnOutcome::Completed => Ok(()),
        TurnOutcome::Failed { message } => Err(eyre::eyre!("Turn failed: {message}")),
        TurnOutcome::Cancelled => Err(eyre::eyre!("Turn cancelled")),
    }
}
