use std::path::Path;

use tokenizers::Tokenizer as HfTokenizer;

use crate::error::{Error, Result};

pub const END_OF_TEXT: &str = "<|endoftext|>";

/// Text <-> token id conversion used by the driver.
pub trait TextCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    fn decode(&self, tokens: &[u32]) -> Result<String>;

    /// Token used to condition generation on an empty prompt.
    fn end_of_text(&self) -> Option<u32>;
}

/// Byte-level BPE tokenizer loaded from a `tokenizer.json`.
pub struct Gpt2Tokenizer {
    tokenizer: HfTokenizer,
    end_of_text: Option<u32>,
}

impl Gpt2Tokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = HfTokenizer::from_file(path)
            .map_err(|e| Error::TokenizerLoad(format!("{}: {e}", path.display())))?;
        Ok(Self::new(tokenizer))
    }

    pub fn new(tokenizer: HfTokenizer) -> Self {
        let end_of_text = tokenizer.token_to_id(END_OF_TEXT);
        Self {
            tokenizer,
            end_of_text,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}

impl TextCodec for Gpt2Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::Tokenization(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(tokens, false)
            .map_err(|e| Error::Tokenization(e.to_string()))
    }

    fn end_of_text(&self) -> Option<u32> {
        self.end_of_text
    }
}

impl std::fmt::Debug for Gpt2Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gpt2Tokenizer")
            .field("vocab_size", &self.vocab_size())
            .field("end_of_text", &self.end_of_text)
            .finish()
    }
}
