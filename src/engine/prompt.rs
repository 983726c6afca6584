//! Prompt document assembly and token-bounded truncation.
//!
//! Token counts use the `cl100k_base` encoding, the one the GPT-3.5/GPT-4
//! family consumes, so a truncated document never exceeds the model's
//! input budget.

use anyhow::{Context, Result};
use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::types::{ArticleText, PromptDocument};

/// Default input budget for article text sent to the model.
pub const DEFAULT_MAX_PROMPT_TOKENS: usize = 3000;

pub struct PromptAssembler {
    bpe: CoreBPE,
}

impl PromptAssembler {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().context("Failed to load cl100k_base encoding")?;
        Ok(Self { bpe })
    }

    /// Label articles 1-based, in input order.
    ///
    /// Failed extractions still get a block with empty quoted text so the
    /// numbering matches the link order.
    pub fn assemble(&self, articles: &[ArticleText]) -> PromptDocument {
        let mut doc = String::new();
        for (i, article) in articles.iter().enumerate() {
            doc.push_str(&format!("Article {}:\n\"{}\"\n\n", i + 1, article.text()));
        }
        PromptDocument::new(doc)
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Keep at most `max_tokens` leading tokens of `doc`.
    ///
    /// A cut can land inside a multi-byte character, or the decoded prefix
    /// can re-encode to more tokens than it came from. In either case the
    /// cut moves one token earlier until the result fits.
    pub fn truncate(&self, doc: PromptDocument, max_tokens: usize) -> PromptDocument {
        let tokens = self.bpe.encode_ordinary(doc.as_str());
        if tokens.len() <= max_tokens {
            return doc;
        }

        let mut keep = max_tokens;
        while keep > 0 {
            if let Ok(text) = self.bpe.decode(tokens[..keep].to_vec()) {
                if self.count_tokens(&text) <= max_tokens {
                    debug!(
                        original_tokens = tokens.len(),
                        kept_tokens = keep,
                        "Prompt document truncated"
                    );
                    return PromptDocument::new(text);
                }
            }
            keep -= 1;
        }
        PromptDocument::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
