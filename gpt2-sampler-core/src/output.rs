use std::io::Write;

use crate::error::Result;
use crate::utils::digest::DigestWriter;

pub const SAMPLE_RULE: usize = 40;
pub const PROMPT_RULE: usize = 80;

/// Formats samples for the terminal. The sample index runs across the whole
/// run and is never reset between prompts.
pub struct SampleWriter<W: Write> {
    out: DigestWriter<W>,
    emitted: usize,
}

impl<W: Write> SampleWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: DigestWriter::new(out),
            emitted: 0,
        }
    }

    /// Write one decoded sample and return its 1-based index.
    pub fn write_sample(&mut self, text: &str) -> Result<usize> {
        self.emitted += 1;
        let rule = "=".repeat(SAMPLE_RULE);
        writeln!(self.out, "{rule} SAMPLE {} {rule}", self.emitted)?;
        writeln!(self.out, "{text}")?;
        Ok(self.emitted)
    }

    /// Close the block of samples belonging to one prompt.
    pub fn write_separator(&mut self) -> Result<()> {
        writeln!(self.out, "{}", "=".repeat(PROMPT_RULE))?;
        self.out.flush()?;
        Ok(())
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn digest(&self) -> u64 {
        self.out.digest()
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}
