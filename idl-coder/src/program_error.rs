//! Framework errors reported through program logs.
//!
//! A failing instruction logs a line of one of these shapes:
//!
//! ```text
//! Program log: AnchorError occurred. Error Code: <code>. Error Number: <n>. Error Message: <msg>.
//! Program log: AnchorError thrown in <file>:<line>. Error Code: ...
//! Program log: AnchorError caused by account: <name>. Error Code: ...
//! ```
//!
//! optionally followed by the two values a failed constraint compared.

use std::str::FromStr;

use idl_coder_core::pubkey::Pubkey;
use thiserror::Error;

use crate::logs::{LogLine, LOG_PREFIX};

const ERROR_MARKER: &str = "Program log: AnchorError";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode {
    /// Error name, e.g. `ConstraintHasOne`.
    pub code: String,
    pub number: u32,
}

/// Where the error was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorOrigin {
    Source { file: String, line: u32 },
    Account(String),
}

/// The values a failed constraint compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparedValues {
    Pubkeys(Pubkey, Pubkey),
    Values(String, String),
}

/// An error parsed from a failed transaction's logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProgramError {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub origin: Option<ErrorOrigin>,
    pub compared_values: Option<ComparedValues>,
    /// The log lines describing the error.
    pub error_logs: Vec<String>,
    /// Programs still executing when the error was logged, outermost first.
    pub program_stack: Vec<String>,
    message: String,
}

impl ProgramError {
    /// Find and parse the framework error in `logs`. `None` when the logs
    /// hold no error line or it has an unknown shape.
    pub fn parse<S: AsRef<str>>(logs: &[S]) -> Option<Self> {
        let logs: Vec<&str> = logs.iter().map(|l| l.as_ref()).collect();
        let index = logs.iter().position(|l| l.starts_with(ERROR_MARKER))?;
        let error_line = logs[index];

        let (origin, error_code, error_message) = parse_error_line(error_line)?;

        let mut error_logs = vec![error_line.to_string()];
        let compared_values = parse_compared_values(&logs[index + 1..], &mut error_logs);
        let message = error_logs.join("\n").replacen(LOG_PREFIX, "", 1);

        Some(Self {
            error_code,
            error_message,
            origin,
            compared_values,
            error_logs,
            program_stack: program_stack(&logs),
            message,
        })
    }

    /// The program that raised the error.
    pub fn program(&self) -> Option<&str> {
        self.program_stack.last().map(String::as_str)
    }
}

fn parse_error_line(line: &str) -> Option<(Option<ErrorOrigin>, ErrorCode, String)> {
    let rest = line.strip_prefix(ERROR_MARKER)?.trim_start();
    let (head, rest) = rest.split_once(". Error Code: ")?;
    let (code, rest) = rest.split_once(". Error Number: ")?;
    let (number, rest) = rest.split_once(". Error Message: ")?;
    let message = &rest[..rest.rfind('.')?];

    let origin = if head == "occurred" {
        None
    } else if let Some(location) = head.strip_prefix("thrown in ") {
        let (file, line) = location.rsplit_once(':')?;
        Some(ErrorOrigin::Source {
            file: file.to_string(),
            line: line.parse().ok()?,
        })
    } else if let Some(account) = head.strip_prefix("caused by account: ") {
        Some(ErrorOrigin::Account(account.to_string()))
    } else {
        return None;
    };

    let error_code = ErrorCode {
        code: code.to_string(),
        number: number.parse().ok()?,
    };
    Some((origin, error_code, message.to_string()))
}

// Either
//   Left:
//   <pubkey>
//   Right:
//   <pubkey>
// or
//   Left: <value>
//   Right: <value>
fn parse_compared_values(following: &[&str], error_logs: &mut Vec<String>) -> Option<ComparedValues> {
    let first = following.first()?.strip_prefix(LOG_PREFIX)?;
    if first == "Left:" {
        let lines = following.get(..4)?;
        let left = lines[1].strip_prefix(LOG_PREFIX)?;
        let right = lines[3].strip_prefix(LOG_PREFIX)?;
        let values = ComparedValues::Pubkeys(Pubkey::from_str(left).ok()?, Pubkey::from_str(right).ok()?);
        error_logs.extend(lines.iter().map(|l| l.to_string()));
        return Some(values);
    }
    if let Some(left) = first.strip_prefix("Left: ") {
        let second = following.get(1)?;
        let right = second.strip_prefix(LOG_PREFIX)?.strip_prefix("Right: ")?;
        error_logs.extend(following[..2].iter().map(|l| l.to_string()));
        return Some(ComparedValues::Values(left.to_string(), right.to_string()));
    }
    None
}

/// Programs left on the invocation stack once the logs end. Failed frames
/// stay on the stack, so the last entry is the failing program.
fn program_stack(logs: &[&str]) -> Vec<String> {
    let mut stack = Vec::new();
    for line in logs {
        match LogLine::parse(line) {
            LogLine::Invoke { program, .. } => stack.push(program.to_string()),
            LogLine::Success { .. } => {
                stack.pop();
            }
            _ => {}
        }
    }
    stack
}
