//! Byte sources for whole and progressively loaded files.
//!
//! A [`ByteSource`] owns the file bytes plus a record of which ranges have
//! actually arrived. Readers ask for ranges; when a range has not been
//! supplied yet the source answers with [`Error::MissingData`] carrying the
//! exact half-open gap, and the caller retries the same operation after
//! supplying it. Fully in-memory files take the fast path with a single
//! loaded interval covering everything.

use crate::error::{Error, Result};

/// Byte source with availability tracking.
#[derive(Debug)]
pub struct ByteSource {
    data: Vec<u8>,
    /// Sorted, non-overlapping, non-adjacent loaded intervals (half-open).
    loaded: Vec<(usize, usize)>,
}

impl ByteSource {
    /// Create a source over a fully available buffer.
    pub fn complete(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            data,
            loaded: if len > 0 { vec![(0, len)] } else { Vec::new() },
        }
    }

    /// Create a source of known total length with no bytes supplied yet.
    pub fn growing(total_len: usize) -> Self {
        Self {
            data: vec![0; total_len],
            loaded: Vec::new(),
        }
    }

    /// Total file length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the file has zero length.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether every byte of the file has been supplied.
    pub fn is_complete(&self) -> bool {
        matches!(self.loaded.as_slice(), [(0, end)] if *end == self.data.len())
            || self.data.is_empty()
    }

    /// Supply bytes at `offset`. Overlapping or repeated ranges are fine;
    /// supplying the same bytes twice is a no-op in effect.
    ///
    /// Panics if the range extends past the declared total length, which is
    /// a caller bug (the transport knows the file size).
    pub fn supply(&mut self, offset: usize, chunk: &[u8]) {
        assert!(
            offset + chunk.len() <= self.data.len(),
            "chunk [{}, {}) exceeds file length {}",
            offset,
            offset + chunk.len(),
            self.data.len()
        );
        if chunk.is_empty() {
            return;
        }
        self.data[offset..offset + chunk.len()].copy_from_slice(chunk);
        self.insert_interval(offset, offset + chunk.len());
    }

    fn insert_interval(&mut self, begin: usize, end: usize) {
        let mut merged = Vec::with_capacity(self.loaded.len() + 1);
        let mut new = (begin, end);
        let mut placed = false;
        for &(s, e) in &self.loaded {
            if e < new.0 || s > new.1 {
                if s > new.1 && !placed {
                    merged.push(new);
                    placed = true;
                }
                merged.push((s, e));
            } else {
                // Overlapping or adjacent: absorb
                new.0 = new.0.min(s);
                new.1 = new.1.max(e);
            }
        }
        if !placed {
            merged.push(new);
        }
        merged.sort_unstable();
        self.loaded = merged;
    }

    /// Whether `[begin, end)` is fully available.
    pub fn is_loaded(&self, begin: usize, end: usize) -> bool {
        if begin >= end {
            return true;
        }
        self.loaded.iter().any(|&(s, e)| s <= begin && end <= e)
    }

    /// Check availability of `[begin, end)`, reporting the first gap.
    ///
    /// The reported range is the maximal contiguous missing run starting at
    /// the first unavailable byte, clipped to the request.
    pub fn ensure(&self, begin: usize, end: usize) -> Result<()> {
        let end = end.min(self.data.len());
        if begin >= end {
            return Ok(());
        }
        let mut pos = begin;
        for &(s, e) in &self.loaded {
            if e <= pos {
                continue;
            }
            if s > pos {
                // Gap from pos up to the next loaded interval
                return Err(Error::MissingData {
                    begin: pos,
                    end: s.min(end),
                });
            }
            pos = e;
            if pos >= end {
                return Ok(());
            }
        }
        Err(Error::MissingData { begin: pos, end })
    }

    /// Borrow `[begin, end)`, failing with the first missing gap.
    pub fn slice(&self, begin: usize, end: usize) -> Result<&[u8]> {
        if end > self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        self.ensure(begin, end)?;
        Ok(&self.data[begin..end])
    }

    /// Maximal contiguous available slice starting at `offset`.
    ///
    /// Fails with `MissingData` when the byte at `offset` itself has not
    /// arrived, and with `UnexpectedEof` when `offset` is past the file end.
    pub fn tail_from(&self, offset: usize) -> Result<&[u8]> {
        if offset >= self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        let end = self.contiguous_end(offset)?;
        Ok(&self.data[offset..end])
    }

    /// End of the contiguous loaded run containing `offset`.
    pub fn contiguous_end(&self, offset: usize) -> Result<usize> {
        for &(s, e) in &self.loaded {
            if s <= offset && offset < e {
                return Ok(e);
            }
        }
        // offset itself is inside a gap
        let gap_end = self
            .loaded
            .iter()
            .map(|&(s, _)| s)
            .find(|&s| s > offset)
            .unwrap_or(self.data.len());
        Err(Error::MissingData {
            begin: offset,
            end: gap_end,
        })
    }

    /// The gap that begins where the contiguous run containing `offset`
    /// ends, if the file continues past it.
    ///
    /// Used when a parse consumed all contiguous bytes without finishing:
    /// the caller reports this range so the transport can extend the run.
    pub fn gap_after(&self, offset: usize) -> Option<(usize, usize)> {
        let run_end = self.contiguous_end(offset).ok()?;
        if run_end >= self.data.len() {
            return None;
        }
        let gap_end = self
            .loaded
            .iter()
            .map(|&(s, _)| s)
            .find(|&s| s > run_end)
            .unwrap_or(self.data.len());
        Some((run_end, gap_end))
    }

    /// Borrow the whole buffer. Only valid when the source is complete;
    /// recovery scanning requires the full file.
    pub fn full(&self) -> Result<&[u8]> {
        self.ensure(0, self.data.len())?;
        Ok(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_source_is_fully_loaded() {
        let src = ByteSource::complete(b"hello world".to_vec());
        assert!(src.is_complete());
        assert_eq!(src.slice(0, 5).unwrap(), b"hello");
        assert_eq!(src.tail_from(6).unwrap(), b"world");
    }

    #[test]
    fn test_growing_source_reports_first_gap() {
        let mut src = ByteSource::growing(100);
        match src.ensure(10, 50) {
            Err(Error::MissingData { begin: 10, end: 50 }) => {},
            other => panic!("unexpected: {:?}", other),
        }

        src.supply(0, &[1; 30]);
        match src.ensure(10, 50) {
            Err(Error::MissingData { begin: 30, end: 50 }) => {},
            other => panic!("unexpected: {:?}", other),
        }

        src.supply(30, &[2; 20]);
        assert!(src.ensure(10, 50).is_ok());
    }

    #[test]
    fn test_gap_clipped_to_next_loaded_interval() {
        let mut src = ByteSource::growing(100);
        src.supply(0, &[1; 10]);
        src.supply(40, &[2; 10]);
        // Requesting [0, 60) misses [10, 40) first
        match src.ensure(0, 60) {
            Err(Error::MissingData { begin: 10, end: 40 }) => {},
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_supply_merges_adjacent_intervals() {
        let mut src = ByteSource::growing(30);
        src.supply(0, &[1; 10]);
        src.supply(10, &[2; 10]);
        src.supply(20, &[3; 10]);
        assert!(src.is_complete());
        assert_eq!(src.tail_from(0).unwrap().len(), 30);
    }

    #[test]
    fn test_tail_from_stops_at_run_end() {
        let mut src = ByteSource::growing(50);
        src.supply(0, b"0123456789");
        src.supply(20, b"abcde");
        assert_eq!(src.tail_from(3).unwrap(), b"3456789");
        assert_eq!(src.gap_after(3), Some((10, 20)));
        assert_eq!(src.gap_after(20), Some((25, 50)));
    }

    #[test]
    fn test_tail_from_inside_gap_is_missing_data() {
        let mut src = ByteSource::growing(50);
        src.supply(0, b"0123456789");
        match src.tail_from(15) {
            Err(Error::MissingData { begin: 15, end: 50 }) => {},
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_tail_from_past_eof() {
        let src = ByteSource::complete(vec![0; 10]);
        assert!(matches!(src.tail_from(10), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn test_resupply_is_idempotent() {
        let mut src = ByteSource::growing(10);
        src.supply(2, b"abc");
        src.supply(2, b"abc");
        assert_eq!(src.slice(2, 5).unwrap(), b"abc");
        assert_eq!(src.loaded, vec![(2, 5)]);
    }
}
