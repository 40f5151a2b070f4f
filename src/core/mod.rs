//! Core interfaces and types.

pub mod output;
pub mod style;
pub mod terminal;
