//! Console deck host and REPL
//!
//! Stands in for the deck application: outbound calls are printed to the
//! terminal and typed commands are turned into [`HostEvent`]s.

use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use std::str::SplitWhitespace;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::actions::ActionKind;
use crate::host::{DeckHost, HostEvent};

/// [`DeckHost`] that writes every call to stdout
#[derive(Debug, Default)]
pub struct ConsoleHost;

impl ConsoleHost {
    pub fn new() -> Self {
        Self
    }

    fn print(&self, context: &str, what: ColoredString, detail: String) {
        println!(
            "{} {} {} {}",
            chrono::Local::now().format("%H:%M:%S%.3f").to_string().dimmed(),
            format!("[{}]", context).bright_white(),
            what,
            detail
        );
    }
}

impl DeckHost for ConsoleHost {
    fn set_state(&self, context: &str, state: u8, label: Option<&str>) {
        let detail = match label {
            Some(label) => format!("{} ({})", state, label),
            None => state.to_string(),
        };
        self.print(context, "state".cyan(), detail);
    }

    fn set_title(&self, context: &str, title: &str) {
        self.print(context, "title".blue(), title.replace('\n', " | "));
    }

    fn toast(&self, context: &str, message: &str) {
        self.print(context, "toast".yellow(), message.to_string());
    }

    fn send_params(&self, context: &str, params: Value) {
        self.print(context, "params".magenta(), params.to_string());
    }
}

/// Parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Event(HostEvent),
    Status,
    Reconnect,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  add <ctx> <kind> [json]   place a button (kinds: input output micmute outputmute
                            caffeine cputemp llmtoggle llmstatus)
  run <ctx> [kind]          press a button
  show <ctx> | hide <ctx>   page with the button became visible / hidden
  params <ctx> <json>       send property inspector settings
  clear <ctx>...            remove buttons
  status                    show connection state and placed buttons
  reconnect                 re-run the connect sequence
  help                      this text
  quit                      exit";

fn parse_kind(kind: &str, plugin_uuid: &str) -> Result<String, String> {
    ActionKind::from_suffix(kind)
        .map(|k| k.uuid(plugin_uuid))
        .ok_or_else(|| format!("unknown kind '{}'", kind))
}

fn parse_json(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))
}

fn next_context(words: &mut SplitWhitespace<'_>, verb: &str) -> Result<String, String> {
    words
        .next()
        .map(str::to_string)
        .ok_or_else(|| format!("usage: {} <ctx> ...", verb))
}

/// Turn one input line into a command
pub fn parse_command(line: &str, plugin_uuid: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let mut words = rest.split_whitespace();

    match verb {
        "add" => {
            let ctx = next_context(&mut words, verb)?;
            let after_ctx = rest[ctx.len()..].trim_start();
            let (kind, json) = match after_ctx.split_once(char::is_whitespace) {
                Some((kind, json)) => (kind, json.trim()),
                None => (after_ctx, ""),
            };
            if kind.is_empty() {
                return Err("usage: add <ctx> <kind> [json]".to_string());
            }
            let params = if json.is_empty() {
                Value::Null
            } else {
                parse_json(json)?
            };
            Ok(Command::Event(HostEvent::Add {
                context: ctx,
                uuid: parse_kind(kind, plugin_uuid)?,
                params,
            }))
        }
        "run" => {
            let ctx = next_context(&mut words, verb)?;
            let uuid = match words.next() {
                Some(kind) => parse_kind(kind, plugin_uuid)?,
                None => String::new(),
            };
            Ok(Command::Event(HostEvent::Run { context: ctx, uuid }))
        }
        "show" | "hide" => Ok(Command::Event(HostEvent::SetActive {
            context: next_context(&mut words, verb)?,
            active: verb == "show",
        })),
        "params" => {
            let ctx = next_context(&mut words, verb)?;
            let json = rest[ctx.len()..].trim();
            if json.is_empty() {
                return Err("usage: params <ctx> <json>".to_string());
            }
            Ok(Command::Event(HostEvent::ParamFromApp {
                context: ctx,
                params: parse_json(json)?,
            }))
        }
        "clear" => {
            let contexts: Vec<String> = words.map(str::to_string).collect();
            if contexts.is_empty() {
                return Err("usage: clear <ctx>...".to_string());
            }
            Ok(Command::Event(HostEvent::Clear { contexts }))
        }
        "status" => Ok(Command::Status),
        "reconnect" => Ok(Command::Reconnect),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        "" => Err(String::new()),
        other => Err(format!("unknown command '{}' (try 'help')", other)),
    }
}

/// Read lines on a dedicated thread and forward them to the event loop.
/// End of input is forwarded as `quit`.
pub fn spawn_repl(tx: mpsc::Sender<String>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("repl".to_string())
        .spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    warn!("⚠️  Console unavailable: {}", e);
                    return;
                }
            };

            loop {
                match rl.readline("deck> ") {
                    Ok(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let _ = rl.add_history_entry(line.as_str());
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                        let _ = tx.blocking_send("quit".to_string());
                        break;
                    }
                    Err(e) => {
                        warn!("⚠️  Console read failed: {}", e);
                        let _ = tx.blocking_send("quit".to_string());
                        break;
                    }
                }
            }
            debug!("REPL thread finished");
        })
}
