//! Console commands accepted while the passthrough runs

use murmur_core::domain::control::CutoffPreset;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  c <hz>           set cutoff frequency
  low | mid | high cutoff presets (200 / 1000 / 5000 Hz)
  t                toggle filter
  s                buffer status
  h                this help
  q                quit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Cutoff(f32),
    Preset(CutoffPreset),
    Toggle,
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("usage: c <hz>")]
    MissingCutoff,

    #[error("not a frequency: '{0}'")]
    BadCutoff(String),

    #[error("unknown command '{0}' (h for help)")]
    Unknown(String),
}

/// Parse one input line; blank lines yield `Ok(None)`
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "c" | "cutoff" => {
            let value = words.next().ok_or(ParseError::MissingCutoff)?;
            let hz = value
                .parse::<f32>()
                .ok()
                .filter(|hz| hz.is_finite())
                .ok_or_else(|| ParseError::BadCutoff(value.to_string()))?;
            Command::Cutoff(hz)
        }
        "low" => Command::Preset(CutoffPreset::Low),
        "mid" => Command::Preset(CutoffPreset::Mid),
        "high" => Command::Preset(CutoffPreset::High),
        "t" | "toggle" => Command::Toggle,
        "s" | "status" => Command::Status,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}
