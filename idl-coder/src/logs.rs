//! Classification of runtime log lines.

/// One line of a transaction's program logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLine<'a> {
    /// `Program <id> invoke [<depth>]`
    Invoke { program: &'a str, depth: usize },
    /// `Program <id> success`
    Success { program: &'a str },
    /// `Program <id> failed: <reason>`
    Failed { program: &'a str, reason: &'a str },
    /// `Program log: <message>`
    Log(&'a str),
    /// `Program data: <base64>`
    Data(&'a str),
    /// `Program return: <id> <base64>`
    Return { program: &'a str, data: &'a str },
    /// Anything else: compute unit reports, upgrade notices, truncation.
    Other(&'a str),
}

pub const LOG_PREFIX: &str = "Program log: ";
pub const DATA_PREFIX: &str = "Program data: ";
const RETURN_PREFIX: &str = "Program return: ";
const PROGRAM_PREFIX: &str = "Program ";

impl<'a> LogLine<'a> {
    pub fn parse(line: &'a str) -> Self {
        if let Some(message) = line.strip_prefix(LOG_PREFIX) {
            return LogLine::Log(message);
        }
        if let Some(data) = line.strip_prefix(DATA_PREFIX) {
            return LogLine::Data(data);
        }
        if let Some(rest) = line.strip_prefix(RETURN_PREFIX) {
            if let Some((program, data)) = rest.split_once(' ') {
                return LogLine::Return { program, data };
            }
            return LogLine::Other(line);
        }

        let Some((program, tail)) = line
            .strip_prefix(PROGRAM_PREFIX)
            .and_then(|rest| rest.split_once(' '))
        else {
            return LogLine::Other(line);
        };
        // `Program log:`-style system lines have a colon where the id goes.
        if program.ends_with(':') {
            return LogLine::Other(line);
        }

        if let Some(depth) = tail
            .strip_prefix("invoke [")
            .and_then(|d| d.strip_suffix(']'))
            .and_then(|d| d.parse().ok())
        {
            return LogLine::Invoke { program, depth };
        }
        if tail == "success" {
            return LogLine::Success { program };
        }
        if let Some(reason) = tail.strip_prefix("failed") {
            let reason = reason.trim_start_matches(':').trim();
            return LogLine::Failed { program, reason };
        }
        LogLine::Other(line)
    }

    /// Payload of a line that may carry event data.
    pub fn event_payload(&self) -> Option<&'a str> {
        match *self {
            LogLine::Log(payload) | LogLine::Data(payload) => Some(payload),
            _ => None,
        }
    }
}
