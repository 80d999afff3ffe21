//! Interactive playback: transport commands typed on stdin, progress on the
//! output log.

use std::io::{BufRead, Write};
use std::path::Path;
use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use transport::{
    EngineFactory, PollOutcome, StartTimePrompt, TransportError, TransportHandle, TransportStatus,
};
use tracing::{debug, warn};

use crate::output::OutputLog;

pub const HELP: &str = "commands: p = pause/resume, s = stop, q = quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    /// Pause when playing, resume when paused, play when idle
    Toggle,
    Stop,
    Quit,
}

impl FromStr for TransportCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" | "resume" | "play" => Ok(TransportCommand::Toggle),
            "s" | "stop" => Ok(TransportCommand::Stop),
            "q" | "quit" | "exit" => Ok(TransportCommand::Quit),
            other => Err(format!("unknown command `{other}` ({HELP})")),
        }
    }
}

/// Why the interactive loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    Finished,
}

/// Asks for the start time on a line-based reader.
pub struct LinePrompt<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> StartTimePrompt for LinePrompt<R, W> {
    fn ask(&mut self, total: &str) -> Option<String> {
        let _ = write!(self.output, "Start time (m:ss, file is {total}): ");
        let _ = self.output.flush();

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(answer.trim().to_string()),
        }
    }
}

async fn apply<F: EngineFactory + 'static>(
    handle: &mut TransportHandle<F>,
    source: &Path,
    command: TransportCommand,
) -> Result<(), TransportError> {
    match command {
        TransportCommand::Toggle => match handle.state().await.status {
            TransportStatus::Playing => handle.pause().await,
            TransportStatus::Paused | TransportStatus::Idle => handle.resume(source).await,
        },
        TransportCommand::Stop => handle.stop().await,
        TransportCommand::Quit => {
            if handle.state().await.status != TransportStatus::Idle {
                handle.stop().await?;
            }
            Ok(())
        }
    }
}

/// Run transport commands from `commands` until quit or the file finishes.
/// Playback is expected to be started already. Closing the command stream
/// leaves playback running to the end.
pub async fn run_interactive<F, R>(
    handle: &mut TransportHandle<F>,
    source: &Path,
    commands: R,
    output: &dyn OutputLog,
) -> Result<SessionEnd, TransportError>
where
    F: EngineFactory + 'static,
    R: AsyncBufRead + Unpin,
{
    let mut updates = handle.subscribe();
    let mut lines = commands.lines();
    let mut reading = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if reading => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<TransportCommand>() {
                    Ok(command) => {
                        debug!(?command, "transport command");
                        if let Err(e) = apply(handle, source, command).await {
                            warn!(error = %e, "transport command failed");
                            output.append_line(&e.to_string());
                        }
                        if command == TransportCommand::Quit {
                            return Ok(SessionEnd::Quit);
                        }
                    }
                    Err(e) => output.append_line(&e),
                },
                Ok(None) => reading = false,
                Err(e) => {
                    warn!(error = %e, "stopped reading commands");
                    reading = false;
                }
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(SessionEnd::Finished);
                }
                let outcome = updates.borrow_and_update().clone();
                match outcome {
                    PollOutcome::Progress(timestamp) => output.append_line(&timestamp),
                    PollOutcome::Ended => {
                        output.append_line("Playback finished");
                        return Ok(SessionEnd::Finished);
                    }
                    PollOutcome::Paused => output.append_line("Paused"),
                    PollOutcome::Idle => output.append_line("Stopped"),
                }
            }
        }
    }
}
