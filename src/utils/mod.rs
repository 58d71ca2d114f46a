//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Local process execution (captured or streamed)
//! - `io` - File I/O with consistent error handling
//! - `shell` - Shell escaping, quoting, program name extraction
//! - `template` - String template rendering
//! - `which` - Program lookup on a PATH value

pub mod command;
pub mod io;
pub mod shell;
pub mod template;
pub mod which;
