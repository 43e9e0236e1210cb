//! # IDL Coder
//!
//! Client-side coder for programs described by an IDL, in the manner of
//! Anchor's `BorshCoder`: encode and decode accounts, instructions, events
//! and user types from the IDL alone, and pull events and framework errors
//! out of transaction logs.
//!
//! ```ignore
//! use idl_coder::prelude::*;
//!
//! let coder = Coder::new(Idl::from_json(&idl_json)?)?;
//! let data = coder.instruction().encode_json("increment", &serde_json::json!({ "by": 2 }))?;
//! let account = coder.accounts().decode_any(&account_data)?;
//! ```

// Re-export core types
pub use idl_coder_core::*;

pub mod event_parser;
pub mod logs;
pub mod program_error;

pub use event_parser::EventParser;
pub use program_error::ProgramError;

pub mod prelude {
    pub use crate::event_parser::EventParser;
    pub use crate::logs::LogLine;
    pub use crate::program_error::{ComparedValues, ErrorOrigin, ProgramError};
    pub use idl_coder_core::prelude::*;
}
