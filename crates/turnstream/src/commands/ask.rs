use super::{Command, drive_turn, ensure_completed};
use crate::render::TerminalRenderer;
use async_trait::async_trait;
use eyre::Result;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use turnstream_core::config::ClientConfig;
use turnstream_core::session::SessionDriver;
use turnstream_core::transport::HttpTransport;

pub struct AskCommand {
    pub config: ClientConfig,
    pub prompt: String,
    pub json: bool,
}

#[async_trait]
impl Command for AskCommand {
    async fn execute(&self) -> Result<()> {
        let transport = HttpTransport::from_config(&self.config)?;
        tracing::info!(
            target: "turnstream::cli",
            endpoint = %transport.endpoint(),
            "Sending one-shot prompt"
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
