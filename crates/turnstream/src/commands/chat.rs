use super::{Command, drive_turn};
use crate::render::TerminalRenderer;
use async_trait::async_trait;
use eyre::Result;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use turnstream_core::Error as CoreError;
use turnstream_core::config::ClientConfig;
use turnstream_core::domain::effect::TurnOutcome;
use turnstream_core::session::SessionDriver;
use turnstream_core::transport::HttpTransport;

/// Interactive loop: one turn per line of input on a single thread.
pub struct ChatCommand {
    pub config: ClientConfig,
}

enum Input<'a> {
    Quit,
    Reset,
    ClearError,
    Help,
    Skip,
    Prompt(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Skip,
        "/quit" | "/exit" => Input::Quit,
        "/reset" => Input::Reset,
        "/clear" => Input::ClearError,
        "/help" => Input::Help,
        _ => Input::Prompt(line),
    }
}

const HELP: &str = "/reset  start a new thread\n/clear  dismiss the last error\n/quit   leave (Ctrl-C at the prompt also leaves; during a turn it cancels the turn)";

enum Prompted {
    Line(String),
    Closed,
    Interrupted,
}

/// Waits for the next input line. Once a turn has run, SIGINT is owned by
/// tokio for the rest of the process, so the prompt has to listen for it too.
async fn next_input<R, I>(lines: &mut Lines<R>, interrupt: I) -> std::io::Result<Prompted>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?.map_or(Prompted::Closed, Prompted::Line)),
        _ = interrupt => Ok(Prompted::Interrupted),
    }
}

#[async_trait]
impl Command for ChatCommand {
    async fn execute(&self) -> Result<()> {
        let transport = HttpTransport::from_config(&self.config)?;
        let endpoint = transport.endpoint().clone();
        let driver = SessionDriver::spawn(Arc::new(transport));

        let stdout = std::io::stdout();
        let color = stdout.is_terminal();
        let mut renderer = TerminalRenderer::new(stdout).with_color(color);

        let mut out = std::io::stdout();
        writeln!(out, "Connected to {endpoint}. Type /help for commands.")?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            write!(out, "> ")?;
            out.flush()?;

            let line = match next_input(&mut lines, tokio::signal::ctrl_c()).await? {
                Prompted::Line(line) => line,
                Prompted::Closed => break,
                Prompted::Interrupted => {
                    writeln!(out)?;
                    break;
                }
            };

            match parse_input(&line) {
                Input::Skip => {}
                Input::Quit => break,
                Input::Help => writeln!(out, "{HELP}")?,
                Input::Reset => {
                    let thread_id = driver.reset_thread().await?;
                    writeln!(out, "Started thread {thread_id}")?;
                }
                Input::ClearError => driver.clear_error().await?,
                Input::Prompt(prompt) => {
                    match drive_turn(&driver, prompt, Some(&mut renderer)).await {
                        Ok((TurnOutcome::Cancelled, _)) => writeln!(out, "(cancelled)")?,
                        Ok(_) => {}
                        Err(e) => match e.downcast_ref::<CoreError>() {
                            Some(CoreError::InvalidInput(_) | CoreError::Conflict(_)) => {
                                writeln!(out, "{e}")?;
                            }
                            _ => return Err(e),
                        },
                    }
                }
            }
        }

        driver.shutdown();
        Ok(())
    }
}
