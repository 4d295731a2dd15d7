//! REPL – Read-Eval-Print Loop for the DriveSafe interactive shell.
//!
//! Supported slash-commands:
//!   /status            – speed, state, cooldown and position
//!   /on | /off         – request activation / deactivation
//!   /pin <code>        – answer the pending PIN challenge
//!   /cancel            – abandon PIN entry
//!   /override          – emergency deactivation prompt (cooldown still applies)
//!   /call              – dial the emergency number
//!   /message [text]    – show or set the auto-response
//!   /incoming <from>   – simulate an incoming message
//!   /accident          – simulate a crash-sensor signal
//!   /help              – show this list
//!   /quit | /exit      – leave the shell

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use drivesafe_middleware::{EventBus, Topic, TopicReceiver};
use drivesafe_runtime::{SessionCommand, SessionHandle, SessionSnapshot};
use drivesafe_types::{Event, EventPayload, SafetyState, Severity, TransitionCause};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::runtime::Runtime;

use crate::gauge;

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Status,
    On,
    Off,
    Pin(String),
    Cancel,
    Override,
    Call,
    /// `None` shows the current auto-response.
    Message(Option<String>),
    Incoming(String),
    Accident,
    Help,
    Quit,
}

impl ReplCommand {
    /// Parse one line of input.
    ///
    /// # Errors
    ///
    /// A message for the user when the line is not a known command or is
    /// missing its argument.
    pub fn parse(line: &str) -> Result<ReplCommand, String> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let cmd = match head {
            "/status" => ReplCommand::Status,
            "/on" => ReplCommand::On,
            "/off" => ReplCommand::Off,
            "/pin" if rest.is_empty() => return Err("usage: /pin <code>".to_string()),
            "/pin" => ReplCommand::Pin(rest.to_string()),
            "/cancel" => ReplCommand::Cancel,
            "/override" => ReplCommand::Override,
            "/call" => ReplCommand::Call,
            "/message" if rest.is_empty() => ReplCommand::Message(None),
            "/message" => ReplCommand::Message(Some(rest.to_string())),
            "/incoming" if rest.is_empty() => return Err("usage: /incoming <from>".to_string()),
            "/incoming" => ReplCommand::Incoming(rest.to_string()),
            "/accident" => ReplCommand::Accident,
            "/help" => ReplCommand::Help,
            "/quit" | "/exit" => ReplCommand::Quit,
            other => return Err(format!("Unknown command: '{other}'")),
        };
        Ok(cmd)
    }

    /// The session input this command maps to, if any.
    fn session_command(&self) -> Option<SessionCommand> {
        match self {
            ReplCommand::On => Some(SessionCommand::Toggle(true)),
            ReplCommand::Off => Some(SessionCommand::Toggle(false)),
            ReplCommand::Pin(code) => Some(SessionCommand::SubmitPin(code.clone())),
            ReplCommand::Cancel => Some(SessionCommand::CancelPin),
            ReplCommand::Override => Some(SessionCommand::EmergencyOverride),
            ReplCommand::Call => Some(SessionCommand::EmergencyCall),
            ReplCommand::Message(Some(text)) => Some(SessionCommand::SetAutoResponse(text.clone())),
            ReplCommand::Incoming(from) => {
                Some(SessionCommand::IncomingMessage { from: from.clone() })
            }
            ReplCommand::Accident => Some(SessionCommand::AccidentSignal),
            ReplCommand::Status
            | ReplCommand::Message(None)
            | ReplCommand::Help
            | ReplCommand::Quit => None,
        }
    }

    /// PINs stay out of the line-editor history.
    fn keep_in_history(&self) -> bool {
        !matches!(self, ReplCommand::Pin(_))
    }
}

/// Bus subscriptions printed between prompts.
pub struct Feeds {
    receivers: Vec<TopicReceiver>,
}

impl Feeds {
    /// Subscribe before the session starts so no early notice is missed.
    pub fn subscribe(bus: &EventBus) -> Self {
        Self {
            receivers: [Topic::SafetyState, Topic::Notices, Topic::Messaging]
                .into_iter()
                .map(|topic| bus.subscribe_to(topic))
                .collect(),
        }
    }

    fn drain(&mut self) {
        for rx in &mut self.receivers {
            while let Some(event) = rx.try_recv() {
                if let Some(line) = render_event(&event) {
                    println!("{line}");
                }
            }
        }
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(rt: &Runtime, handle: &SessionHandle, mut feeds: Feeds, shutdown: Arc<AtomicBool>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start line editor".red(), e);
            return;
        }
    };

    loop {
        feeds.drain();
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let prompt = format!("{} ", prompt_label(handle.snapshot().state));
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cmd = match ReplCommand::parse(line) {
            Ok(cmd) => cmd,
            Err(msg) => {
                println!(
                    "{} Type {} for available commands.",
                    msg.red(),
                    "/help".bold()
                );
                continue;
            }
        };
        if cmd.keep_in_history() {
            let _ = editor.add_history_entry(line);
        }

        match cmd {
            ReplCommand::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            ReplCommand::Help => cmd_help(),
            ReplCommand::Status => print_status(&handle.snapshot()),
            ReplCommand::Message(None) => {
                println!("  Auto-response: {}", handle.snapshot().auto_response.italic());
            }
            other => {
                if let Some(command) = other.session_command() {
                    match rt.block_on(handle.send(command)) {
                        Ok(state) => {
                            if state.is_pending() {
                                println!(
                                    "  {} enter it with {} or abandon with {}",
                                    "PIN required:".yellow().bold(),
                                    "/pin <code>".bold(),
                                    "/cancel".bold()
                                );
                            }
                        }
                        Err(e) => println!("  {}", e.to_string().red()),
                    }
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_label(state: SafetyState) -> colored::ColoredString {
    match state {
        SafetyState::Disabled => "drivesafe>".bold().cyan(),
        SafetyState::Enabled => "drivesafe[safe]>".bold().green(),
        SafetyState::PendingActivation | SafetyState::PendingDeactivation => {
            "drivesafe[pin]>".bold().yellow()
        }
    }
}

fn cause_label(cause: TransitionCause) -> &'static str {
    match cause {
        TransitionCause::Manual => "manual",
        TransitionCause::SpeedThreshold => "speed threshold",
        TransitionCause::Accident => "accident",
        TransitionCause::EmergencyOverride => "emergency override",
    }
}

fn render_event(event: &Event) -> Option<String> {
    let line = match &event.payload {
        EventPayload::Notice(notice) => {
            let title = match notice.severity {
                Severity::Info => notice.title.bold().cyan(),
                Severity::Warning => notice.title.bold().yellow(),
                Severity::Critical => notice.title.bold().red(),
            };
            format!("  [{title}] {}", notice.description)
        }
        EventPayload::StateChanged { from, to, cause } => format!(
            "  {} {from} → {to} ({})",
            "state".dimmed(),
            cause_label(*cause)
        ),
        EventPayload::AccidentDetected {
            drop_kmh,
            elapsed_ms,
        } => format!(
            "  {} speed fell {drop_kmh:.0} km/h in {elapsed_ms} ms",
            "accident".red().bold()
        ),
        EventPayload::AutoReply { recipient, message } => {
            format!("  {} to {recipient}: {message}", "auto-reply".dimmed())
        }
        EventPayload::EmergencyCall { number } => {
            format!("  {} {number}", "calling".red().bold())
        }
        EventPayload::Speed(_) | EventPayload::Position(_) => return None,
    };
    Some(line)
}

fn print_status(snap: &SessionSnapshot) {
    let state = match snap.state {
        SafetyState::Enabled => snap.state.to_string().green().bold(),
        SafetyState::Disabled => snap.state.to_string().normal(),
        _ => snap.state.to_string().yellow(),
    };
    println!();
    println!("{}", "DriveSafe Status".bold().underline());
    println!(
        "  Speed        : {} km/h {}",
        gauge::digits(snap.speed_kmh).bold(),
        gauge::bar(snap.speed_kmh, 24).dimmed()
    );
    println!("  Safety mode  : {state}");
    match snap.cooldown_remaining_secs {
        Some(secs) => println!("  Cooldown     : {}m {:02}s left", secs / 60, secs % 60),
        None => println!("  Cooldown     : {}", "none".dimmed()),
    }
    let position = format!(
        "{:.5}, {:.5}",
        snap.position.latitude, snap.position.longitude
    );
    if snap.location_fault {
        println!("  Position     : {} {}", position, "(location error)".yellow());
    } else {
        println!("  Position     : {position}");
    }
    println!("  Auto-response: {}", snap.auto_response.italic());
    println!("  Source       : {}", snap.source.dimmed());
    println!();
}

fn cmd_help() {
    println!();
    println!("{}", "DriveSafe Commands".bold().underline());
    println!("  {}          – speed, state and cooldown", "/status".bold().cyan());
    println!("  {}        – turn safety mode on / off", "/on  /off".bold().cyan());
    println!("  {}      – answer the PIN prompt", "/pin <code>".bold().cyan());
    println!("  {}          – abandon PIN entry", "/cancel".bold().cyan());
    println!("  {}        – emergency deactivation prompt", "/override".bold().cyan());
    println!("  {}            – call the emergency number", "/call".bold().cyan());
    println!("  {}  – show or set the auto-response", "/message [text]".bold().cyan());
    println!("  {} – simulate an incoming message", "/incoming <from>".bold().cyan());
    println!("  {}        – simulate a crash signal", "/accident".bold().cyan());
    println!("  {}     – exit", "/quit  /exit".bold().cyan());
    println!();
}
