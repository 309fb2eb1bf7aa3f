/// Index arithmetic over a fixed-length sequence. Pure: holds only the length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionSequencer {
    len: usize,
}

impl QuestionSequencer {
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn last_index(&self) -> usize {
        self.len.saturating_sub(1)
    }

    /// `min(index + 1, N - 1)`; advancing past the end stays on the last index.
    pub fn advance(&self, index: usize) -> usize {
        index.saturating_add(1).min(self.last_index())
    }

    /// `max(index - 1, 0)`.
    pub fn retreat(&self, index: usize) -> usize {
        index.saturating_sub(1)
    }

    /// True when `index` is the final position; answering it ends the sequence.
    pub fn is_last(&self, index: usize) -> bool {
        index >= self.last_index()
    }

    /// Brings an index read from storage back into range.
    pub fn clamp(&self, index: usize) -> usize {
        index.min(self.last_index())
    }
}
