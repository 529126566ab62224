//! Text console on stdin
//!
//! Accepts the same operator commands as the UI link, one per line:
//!
//! ```text
//! start pdc <h|e> <volts> <t1> <t2> <t3> [label]
//! start ponly <h|e> <volts> <t1> <t2> [label]
//! start manual <h|e> <volts> [label]
//! abort <run>
//! relay <hv|gnd> <open|closed>
//! ack | arm | disarm
//! range <auto|0-11>
//! quit
//! ```

use std::io::BufRead;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Sender};
use thiserror::Error;

use resistrig_core::config::RunRequest;
use resistrig_core::range::{MeasurementRange, RangeMode};
use resistrig_core::sequencer::RunHandle;
use resistrig_core::traits::{RelayId, RelayState, SourceKind};
use resistrig_protocol::{OperatorCommand, RigMessage};

use crate::runtime::Inbound;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {what} `{value}`")]
    Invalid { what: &'static str, value: String },
}

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Command(OperatorCommand),
    Help,
    Quit,
    Blank,
}

struct Words<'a> {
    iter: std::str::SplitWhitespace<'a>,
}

impl<'a> Words<'a> {
    fn next(&mut self, what: &'static str) -> Result<&'a str, ParseError> {
        self.iter.next().ok_or(ParseError::Missing(what))
    }

    fn number<T: std::str::FromStr>(&mut self, what: &'static str) -> Result<T, ParseError> {
        let word = self.next(what)?;
        word.parse().map_err(|_| invalid(what, word))
    }

    fn rest(self) -> String {
        self.iter.collect::<Vec<_>>().join(" ")
    }
}

fn invalid(what: &'static str, value: &str) -> ParseError {
    ParseError::Invalid {
        what,
        value: value.to_string(),
    }
}

fn source(word: &str) -> Result<SourceKind, ParseError> {
    match word {
        "h" | "hv" | "amp" => Ok(SourceKind::HvAmp),
        "e" | "electrometer" => Ok(SourceKind::Electrometer),
        other => Err(invalid("source", other)),
    }
}

/// Parse one console line
pub fn parse_line(line: &str) -> Result<ConsoleLine, ParseError> {
    let mut words = Words {
        iter: line.split_whitespace(),
    };
    let Some(verb) = words.iter.next() else {
        return Ok(ConsoleLine::Blank);
    };

    let command = match verb {
        "help" | "?" => return Ok(ConsoleLine::Help),
        "quit" | "exit" => return Ok(ConsoleLine::Quit),
        "start" => {
            let kind = words.next("measurement type")?;
            let src = source(words.next("source")?)?;
            let volts: i32 = words.number("voltage")?;
            let request = match kind {
                "pdc" => RunRequest::pdc(
                    src,
                    volts,
                    words.number("t1")?,
                    words.number("t2")?,
                    words.number("t3")?,
                ),
                "ponly" | "p" => {
                    RunRequest::polarize_only(src, volts, words.number("t1")?, words.number("t2")?)
                }
                "manual" => RunRequest::manual(src, volts),
                other => return Err(invalid("measurement type", other)),
            };
            OperatorCommand::StartRun(request.with_label(&words.rest()))
        }
        "abort" => OperatorCommand::AbortRun(RunHandle {
            id: words.number("run")?,
        }),
        "relay" => {
            let relay = match words.next("relay")? {
                "hv" => RelayId::Hv,
                "gnd" => RelayId::Gnd,
                other => return Err(invalid("relay", other)),
            };
            let state = match words.next("relay state")? {
                "closed" | "close" | "on" => RelayState::Closed,
                "open" | "off" => RelayState::Open,
                other => return Err(invalid("relay state", other)),
            };
            OperatorCommand::SetManualRelay { relay, state }
        }
        "ack" => OperatorCommand::AcknowledgeBreakdown,
        "arm" => OperatorCommand::ArmSafetyCircuit,
        "disarm" => OperatorCommand::DisarmSafetyCircuit,
        "range" => match words.next("range")? {
            "auto" => OperatorCommand::SetRangeMode(RangeMode::Auto),
            word => {
                let range = word
                    .parse()
                    .ok()
                    .and_then(MeasurementRange::new)
                    .ok_or_else(|| invalid("range", word))?;
                OperatorCommand::SetRangeMode(RangeMode::Manual(range))
            }
        },
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(ConsoleLine::Command(command))
}

fn print_help() {
    println!("commands:");
    println!("  start pdc <h|e> <volts> <t1> <t2> <t3> [label]");
    println!("  start ponly <h|e> <volts> <t1> <t2> [label]");
    println!("  start manual <h|e> <volts> [label]");
    println!("  abort <run>");
    println!("  relay <hv|gnd> <open|closed>");
    println!("  ack | arm | disarm");
    println!("  range <auto|0-11>");
    println!("  quit");
}

/// Read commands from stdin and print replies and events
pub fn spawn(inbound: Sender<Inbound>) -> std::io::Result<JoinHandle<()>> {
    let (events_tx, events_rx) = unbounded();
    let _ = inbound.send(Inbound::Subscribe(events_tx));
    thread::Builder::new()
        .name("console-events".into())
        .spawn(move || {
            for message in events_rx {
                if let RigMessage::Event(event) = message {
                    println!("event: {event:?}");
                }
            }
        })?;

    thread::Builder::new().name("console".into()).spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_line(&line) {
                Ok(ConsoleLine::Blank) => {}
                Ok(ConsoleLine::Help) => print_help(),
                Ok(ConsoleLine::Quit) => break,
                Ok(ConsoleLine::Command(command)) => {
                    let (reply_tx, reply_rx) = bounded(1);
                    let message = Inbound::Command {
                        command,
                        reply: reply_tx,
                    };
                    if inbound.send(message).is_err() {
                        return;
                    }
                    match reply_rx.recv_timeout(REPLY_TIMEOUT) {
                        Ok(reply) => println!("{reply:?}"),
                        Err(_) => println!("no reply"),
                    }
                }
                Err(e) => println!("error: {e}"),
            }
        }
        let _ = inbound.send(Inbound::Shutdown);
    })
}
