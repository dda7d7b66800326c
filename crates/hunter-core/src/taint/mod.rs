//! Sinks and escaping transforms
//!
//! The registry of operations that execute text as script, and recognition of
//! the quote-escaping idioms that fail to make such text safe.

pub mod escaping;
pub mod sinks;

pub use escaping::{carries_escaped_taint, escaped_operand, is_quote_pattern};
pub use sinks::{
    CommandSink, LocalAliases, MethodSink, SinkCategory, SinkRegistry,
    normalize_command_name,
};
