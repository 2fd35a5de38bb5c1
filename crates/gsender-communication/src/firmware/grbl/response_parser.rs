//! GRBL response line classification

use super::status_parser::StatusReport;
use crate::firmware::settings::parse_setting_line;
use gsender_core::ControllerType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One line received from the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GrblResponse {
    /// Line accepted
    Ok,
    /// Line rejected with an error code
    Error(u8),
    Alarm(u8),
    Status(StatusReport),
    /// `$n=value` echoed by `$$`
    Setting { id: u16, value: String },
    /// `[GC:...]` parser state
    ParserState(String),
    /// `[MSG:...]` feedback message
    Message(String),
    /// Other bracketed feedback such as `[VER:...]` or `[PRB:...]`
    Feedback { tag: String, body: String },
    /// Startup banner, e.g. `Grbl 1.1h ['$' for help]`
    Welcome { firmware: ControllerType, version: String },
    /// Anything else
    Text(String),
}

impl GrblResponse {
    /// Classify a received line; `None` for blank lines
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if line == "ok" {
            return Some(Self::Ok);
        }
        if let Some(code) = line.strip_prefix("error:") {
            if let Ok(code) = code.trim().parse() {
                return Some(Self::Error(code));
            }
        }
        if let Some(code) = line
            .strip_prefix("ALARM:")
            .or_else(|| line.strip_prefix("alarm:"))
        {
            if let Ok(code) = code.trim().parse() {
                return Some(Self::Alarm(code));
            }
        }
        if line.starts_with('<') {
            if let Some(report) = StatusReport::parse(line) {
                return Some(Self::Status(report));
            }
        }
        if let Some((id, value)) = parse_setting_line(line) {
            return Some(Self::Setting { id, value });
        }
        if let Some(body) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let (tag, content) = body.split_once(':').unwrap_or((body, ""));
            return Some(match tag {
                "GC" => Self::ParserState(content.to_string()),
                "MSG" => Self::Message(content.to_string()),
                _ => Self::Feedback {
                    tag: tag.to_string(),
                    body: content.to_string(),
                },
            });
        }
        if let Some(welcome) = parse_welcome(line) {
            return Some(welcome);
        }

        Some(Self::Text(line.to_string()))
    }

    /// Whether this line completes a sent line (`ok` or `error:n`)
    pub fn is_acknowledgment(&self) -> bool {
        matches!(self, Self::Ok | Self::Error(_))
    }
}

fn parse_welcome(line: &str) -> Option<GrblResponse> {
    let (firmware, rest) = if let Some(rest) = line.strip_prefix("GrblHAL ") {
        (ControllerType::GrblHal, rest)
    } else if let Some(rest) = line.strip_prefix("Grbl ") {
        (ControllerType::Grbl, rest)
    } else {
        return None;
    };
    let version = rest.split_whitespace().next()?.to_string();
    Some(GrblResponse::Welcome { firmware, version })
}

impl fmt::Display for GrblResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error(code) => write!(f, "{}", super::error_decoder::format_error(*code)),
            Self::Alarm(code) => write!(f, "{}", super::error_decoder::format_alarm(*code)),
            Self::Status(report) => write!(f, "status:{}", report.state),
            Self::Setting { id, value } => write!(f, "${}={}", id, value),
            Self::ParserState(state) => write!(f, "[GC:{}]", state),
            Self::Message(message) => write!(f, "[MSG:{}]", message),
            Self::Feedback { tag, body } => write!(f, "[{}:{}]", tag, body),
            Self::Welcome { firmware, version } => write!(f, "{} {}", firmware, version),
            Self::Text(text) => write!(f, "{}", text),
        }
    }
}
