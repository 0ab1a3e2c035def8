use super::{Command, drive_turn, ensure_completed};
use crate::render::TerminalRenderer;
use async_trait::async_trait;
use eyre::Result;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use turnstream_core::session::SessionDriver;
use turnstream_core::transport::ReplayTransport;

/// Drives one turn from a JSONL recording instead of a live server.
pub struct ReplayCommand {
    pub file: PathBuf,
    pub json: bool,
    pub delay_ms: Option<u64>,
    pub prompt: String,
}

#[async_trait]
impl Command for ReplayCommand {
    async fn execute(&self) -> Result<()> {
        let mut transport = ReplayTransport::from_jsonl(&self.file)?;
        if let Some(delay_ms) = self.delay_ms {
            transport = transport.with_delay(Duration::from_millis(delay_ms));
        }
        tracing::info!(
            target: "turnstream::cli",
            file = %self.file.display(),
            events = transport.events().len(),
            "Replaying recorded turn"
        );
        let driver = SessionDriver::spawn(Arc::new(transport));

        let (outcome, state) = if self.json {
            drive_turn::<std::io::Stdout>(&driver, &self.prompt, None).await?
        } else {
            let stdout = std::io::stdout();
            let color = stdout.is_terminal();
            let mut renderer = TerminalRenderer::new(stdout).with_color(color);
            drive_turn(&driver, &self.prompt, Some(&mut renderer)).await?
        };
        driver.shutdown();

        if self.json {
            let mut stdout = std::io::stdout();
            writeln!(stdout, "{}", serde_json::to_string_pretty(&*state)?)?;
        }

        ensure_completed(&outcome)
    }
}
