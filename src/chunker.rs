use anyhow::{bail, Result};
use std::ops::Range;

use crate::tokens;

/// Chunk geometry, in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkOptions {
    pub const DEFAULT_CHUNK_SIZE: usize = 6_000;
    pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk size must be greater than zero");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        Ok(())
    }
}

impl Default for ChunkOptions {
    fn default() -> Self {
        ChunkOptions {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            chunk_overlap: Self::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// One window over the diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// Byte range of `text` inside the source.
    pub range: Range<usize>,
    /// Bytes at the start of `text` repeated from the previous chunk.
    pub overlap: usize,
}

impl Chunk {
    /// The part of this chunk not already covered by its predecessor.
    pub fn fresh(&self) -> &str {
        &self.text[self.overlap..]
    }
}

/// Split `text` into token-bounded windows, consecutive windows sharing
/// `chunk_overlap` tokens. Always yields at least one chunk, even for empty
/// input.
pub fn chunk(text: &str, opts: ChunkOptions) -> Result<Vec<Chunk>> {
    opts.validate()?;

    let spans = tokens::tokenize(text);
    if spans.len() <= opts.chunk_size {
        return Ok(vec![Chunk {
            index: 0,
            text: text.to_string(),
            range: 0..text.len(),
            overlap: 0,
        }]);
    }

    let total = spans.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + opts.chunk_size).min(total);
        let range = spans[start].start..spans[end - 1].end;
        let overlap = if chunks.is_empty() {
            0
        } else {
            spans[start + opts.chunk_overlap].start - spans[start].start
        };

        chunks.push(Chunk {
            index: chunks.len(),
            text: text[range.clone()].to_string(),
            range,
            overlap,
        });

        if end == total {
            break;
        }
        start = end - opts.chunk_overlap;
    }

    log::debug!(
        "Split {} tokens into {} chunk(s) (size={}, overlap={})",
        total,
        chunks.len(),
        opts.chunk_size,
        opts.chunk_overlap
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF: &str = "diff --git a/src/lib.rs b/src/lib.rs\n\
index 3b18e51..a9c4f2d 100644\n\
--- a/src/lib.rs\n\
+++ b/src/lib.rs\n\
@@ -1,4 +1,6 @@\n\
-pub fn add(left: u64, right: u64) -> u64 {\n\
-    left + right\n\
+pub fn add(left: u64, right: u64) -> Option<u64> {\n\
+    left.checked_add(right)\n\
 }\n";

    fn opts(chunk_size: usize, chunk_overlap: usize) -> ChunkOptions {
        ChunkOptions {
            chunk_size,
            chunk_overlap,
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk(DIFF, ChunkOptions::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, DIFF);
        assert_eq!(chunks[0].fresh(), DIFF);
    }

    #[test]
    fn empty_text_is_one_empty_chunk() {
        let chunks = chunk("", opts(10, 2)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
    }

    #[test]
    fn chunks_respect_size_and_share_overlap() {
        let chunks = chunk(DIFF, opts(20, 5)).unwrap();
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let shared = &next.text[..next.overlap];
            assert!(prev.text.ends_with(shared));
            assert_eq!(tokens::count(shared), 5);
        }
        for c in &chunks {
            assert!(tokens::count(&c.text) <= 20);
        }
        assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn fresh_parts_rebuild_the_source() {
        for (size, overlap) in [(2, 1), (7, 3), (20, 5), (64, 0)] {
            let chunks = chunk(DIFF, opts(size, overlap)).unwrap();
            let rebuilt: String = chunks.iter().map(Chunk::fresh).collect();
            assert_eq!(rebuilt, DIFF, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn rejects_invalid_geometry() {
        assert!(chunk(DIFF, opts(0, 0)).is_err());
        assert!(chunk(DIFF, opts(10, 10)).is_err());
        assert!(chunk(DIFF, opts(10, 11)).is_err());
    }
}
