//! Analysis engine: prompt assembly and the sentiment/report service.

pub mod analyzer;
pub mod prompt;
