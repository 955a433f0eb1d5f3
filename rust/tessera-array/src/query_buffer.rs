//! Candidate buffer filtered in place by `retain`/`reject`.

use crate::word::Word;

/// A sorted candidate list with a read cursor and a write cursor.
///
/// Filtering walks the read cursor forward; every visited value is either kept
/// (copied down to the write cursor) or dropped. Values not yet visited stay
/// between `read` and `end`, so one buffer can be filtered against several
/// chunks of a backing array before [`finalize_filtering`](Self::finalize_filtering)
/// compacts it.
#[derive(Debug, Clone, Default)]
pub struct QueryBuffer<W: Word> {
    data: Vec<W>,
    read: usize,
    write: usize,
    end: usize,
}

impl<W: Word> QueryBuffer<W> {
    pub fn new(values: Vec<W>) -> QueryBuffer<W> {
        let end = values.len();
        QueryBuffer {
            data: values,
            read: 0,
            write: 0,
            end,
        }
    }

    pub fn from_slice(values: &[W]) -> QueryBuffer<W> {
        QueryBuffer::new(values.to_vec())
    }

    /// Value under the read cursor.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is exhausted.
    #[inline]
    pub fn current_value(&self) -> W {
        debug_assert!(self.has_more());
        self.data[self.read]
    }

    #[inline]
    pub fn has_more(&self) -> bool {
        self.read < self.end
    }

    /// Keeps the current value and advances. Returns `has_more()`.
    #[inline]
    pub fn retain_and_advance(&mut self) -> bool {
        self.data[self.write] = self.data[self.read];
        self.write += 1;
        self.read += 1;
        self.has_more()
    }

    /// Drops the current value and advances. Returns `has_more()`.
    #[inline]
    pub fn reject_and_advance(&mut self) -> bool {
        self.read += 1;
        self.has_more()
    }

    /// Keeps every value not yet visited.
    pub fn retain_all(&mut self) {
        while self.has_more() {
            self.retain_and_advance();
        }
    }

    /// Drops every value not yet visited.
    pub fn reject_remaining(&mut self) {
        self.read = self.end;
    }

    /// Compacts the buffer to the kept values followed by the unvisited ones and
    /// rewinds both cursors for another filtering pass.
    pub fn finalize_filtering(&mut self) {
        let unvisited = self.end - self.read;
        self.data.copy_within(self.read..self.end, self.write);
        self.end = self.write + unvisited;
        self.read = 0;
        self.write = 0;
    }

    /// Live values: everything in the buffer after
    /// [`finalize_filtering`](Self::finalize_filtering).
    #[inline]
    pub fn as_slice(&self) -> &[W] {
        &self.data[..self.end]
    }

    pub fn copy_data(&self) -> Vec<W> {
        self.as_slice().to_vec()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    /// Replaces the contents, reusing the allocation.
    pub fn reset(&mut self, values: &[W]) {
        self.data.clear();
        self.data.extend_from_slice(values);
        self.read = 0;
        self.write = 0;
        self.end = values.len();
    }
}
