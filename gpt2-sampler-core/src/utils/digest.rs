//! Output fingerprinting.
//!
//! Every byte the driver emits is fed through a rolling 64-bit xxhash so two
//! runs can be compared without keeping their full output around.

use std::io::{self, Write};

use xxhash_rust::xxh64::Xxh64;

/// Writer adapter that hashes everything passing through it.
pub struct DigestWriter<W> {
    inner: W,
    hasher: Xxh64,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Xxh64::new(0),
        }
    }

    pub fn digest(&self) -> u64 {
        self.hasher.digest()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
