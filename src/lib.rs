//! asset-sentiment: news-driven LLM sentiment for currency pairs and commodities.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod search;
pub mod data;
pub mod llm;
pub mod engine;
pub mod storage;
