//! Incremental terminal rendering of turn snapshots.
//!
//! Snapshots are full views, so the renderer remembers how much of the
//! current turn it has already written and only prints what is new.

use colored::Colorize;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use turnstream_core::domain::ledger::{ToolCall, ToolCallStatus};
use turnstream_core::domain::state::{Message, StepStatus, TurnLifecycle, TurnState, WorkflowStep};
use turnstream_core::domain::types::{StepId, ToolCallId, TurnId};

const MAX_ARGUMENT_PREVIEW: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Reasoning,
    Text,
}

pub struct TerminalRenderer<W: Write> {
    out: W,
    color: bool,
    turn_id: Option<TurnId>,
    text_len: usize,
    reasoning_fragments: usize,
    tools: HashMap<ToolCallId, ToolCallStatus>,
    steps_started: HashSet<StepId>,
    steps_finished: HashSet<StepId>,
    section: Section,
    at_line_start: bool,
    finished: bool,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            color: false,
            turn_id: None,
            text_len: 0,
            reasoning_fragments: 0,
            tools: HashMap::new(),
            steps_started: HashSet::new(),
            steps_finished: HashSet::new(),
            section: Section::None,
            at_line_start: true,
            finished: false,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes whatever `state` shows for the current turn that has not been
    /// written yet.
    pub fn render(&mut self, state: &TurnState) -> io::Result<()> {
        let Some(turn) = &state.turn else {
            return Ok(());
        };

        if self.turn_id.as_ref() != Some(&turn.id) {
            self.begin_turn(turn.id.clone());
        }
        if self.finished {
            return Ok(());
        }

        for step in &state.steps {
            self.render_step(step)?;
        }

        if let Some(message) = state.message(&turn.message_id) {
            self.render_reasoning(message)?;
            for call in &message.tool_calls {
                self.render_tool_call(call)?;
            }
            self.render_text(message)?;
        }

        match turn.lifecycle {
            TurnLifecycle::Active => {}
            TurnLifecycle::Finished => {
                self.end_line()?;
                self.finished = true;
            }
            TurnLifecycle::Failed => {
                self.end_line()?;
                let message = state.error.as_deref().unwrap_or("turn failed");
                let line = format!("error: {message}");
                writeln!(self.out, "{}", self.paint(&line, Paint::Error))?;
                self.finished = true;
            }
        }

        self.out.flush()
    }

    fn begin_turn(&mut self, turn_id: TurnId) {
        self.turn_id = Some(turn_id);
        self.text_len = 0;
        self.reasoning_fragments = 0;
        self.tools.clear();
        self.steps_started.clear();
        self.steps_finished.clear();
        self.section = Section::None;
        self.finished = false;
    }

    fn render_step(&mut self, step: &WorkflowStep) -> io::Result<()> {
        if self.steps_started.insert(step.id.clone()) {
            let line = format!("> {}", step.name);
            self.status_line(&line, Paint::Muted)?;
        }

        if step.status == StepStatus::Completed && self.steps_finished.insert(step.id.clone()) {
            let line = match step.elapsed_ms {
                Some(ms) => format!("> {} done ({ms} ms)", step.name),
                None => format!("> {} done", step.name),
            };
            self.status_line(&line, Paint::Muted)?;
        }

        Ok(())
    }

    fn render_reasoning(&mut self, message: &Message) -> io::Result<()> {
        let Some(fresh) = message.reasoning.get(self.reasoning_fragments..) else {
            return Ok(());
        };
        if fresh.is_empty() {
            return Ok(());
        }

        if self.section != Section::Reasoning {
            self.end_line()?;
            write!(self.out, "{}", self.paint("thinking: ", Paint::Muted))?;
            self.section = Section::Reasoning;
        }
        for fragment in fresh {
            write!(self.out, "{}", self.paint(&fragment.text, Paint::Muted))?;
            self.at_line_start = fragment.text.ends_with('\n');
        }
        self.reasoning_fragments = message.reasoning.len();

        Ok(())
    }

    fn render_tool_call(&mut self, call: &ToolCall) -> io::Result<()> {
        let previous = self.tools.get(&call.id).copied();
        let seen_terminal = previous.is_some_and(ToolCallStatus::is_terminal);
        if seen_terminal || (previous.is_some() && !call.status.is_terminal()) {
            return Ok(());
        }

        if previous.is_none() {
            let line = format!("[tool] {}", call.name);
            self.status_line(&line, Paint::Tool)?;
        }

        match call.status {
            ToolCallStatus::Completed => {
                let result = call.result.as_deref().unwrap_or_default();
                let line = format!(
                    "[tool] {}({}) -> {}",
                    call.name,
                    preview(&call.arguments),
                    preview(result)
                );
                self.status_line(&line, Paint::Success)?;
            }
            ToolCallStatus::Error => {
                let error = call.error.as_deref().unwrap_or("unknown error");
                let line = format!("[tool] {} failed: {}", call.name, preview(error));
                self.status_line(&line, Paint::Error)?;
            }
            ToolCallStatus::Pending | ToolCallStatus::Executing => {}
        }

        self.tools.insert(call.id.clone(), call.status);
        Ok(())
    }

    fn render_text(&mut self, message: &Message) -> io::Result<()> {
        let Some(fresh) = message.content.get(self.text_len..) else {
            return Ok(());
        };
        if fresh.is_empty() {
            return Ok(());
        }

        if self.section != Section::Text {
            self.end_line()?;
            self.section = Section::Text;
        }
        write!(self.out, "{fresh}")?;
        self.at_line_start = fresh.ends_with('\n');
        self.text_len = message.content.len();

        Ok(())
    }

    fn status_line(&mut self, line: &str, paint: Paint) -> io::Result<()> {
        self.end_line()?;
        writeln!(self.out, "{}", self.paint(line, paint))?;
        self.section = Section::None;
        Ok(())
    }

    fn end_line(&mut self) -> io::Result<()> {
        if !self.at_line_start {
            writeln!(self.out)?;
            self.at_line_start = true;
        }
        Ok(())
    }

    fn paint(&self, text: &str, paint: Paint) -> String {
        if !self.color {
            return text.to_string();
        }
        match paint {
            Paint::Muted => text.dimmed().to_string(),
            Paint::Tool => text.cyan().to_string(),
            Paint::Success => text.green().to_string(),
            Paint::Error => text.red().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Paint {
    Muted,
    Tool,
    Success,
    Error,
}

fn preview(text: &str) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= MAX_ARGUMENT_PREVIEW {
        return single_line;
    }
    let cut: String = single_line.chars().take(MAX_ARGUMENT_PREVIEW).collect();
    format!("{cut}...")
}
