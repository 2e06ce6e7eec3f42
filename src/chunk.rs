// Chunk arithmetic for splitting a video into fixed-size byte ranges.

/// Default chunk size used by the upload API (10 MB).
pub const DEFAULT_CHUNK_SIZE: u64 = 10_000_000;

/// One contiguous byte range of a file. `end` is inclusive, matching the
/// `Content-Range` header format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: u64,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/*", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub file_size: u64,
    pub chunk_size: u64,
}

impl ChunkPlan {
    /// `chunk_size` must be non-zero.
    pub fn new(file_size: u64, chunk_size: u64) -> Self {
        debug_assert!(chunk_size > 0);
        Self {
            file_size,
            chunk_size,
        }
    }

    pub fn total_chunks(&self) -> u64 {
        self.file_size.div_ceil(self.chunk_size)
    }

    /// Range for `index`, or `None` when the index lies past end of file.
    pub fn range(&self, index: u64) -> Option<ChunkRange> {
        let start = index.checked_mul(self.chunk_size)?;
        if start >= self.file_size {
            return None;
        }
        let end = (start + self.chunk_size).min(self.file_size) - 1;
        Some(ChunkRange { index, start, end })
    }

    pub fn ranges(&self) -> impl Iterator<Item = ChunkRange> + '_ {
        (0..self.total_chunks()).filter_map(move |i| self.range(i))
    }
}
