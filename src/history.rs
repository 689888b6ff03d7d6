use std::collections::VecDeque;

use crate::sequence::Sequence;

pub const HISTORY_LIMIT: usize = 20;

/// Newest-first record of answered sequences, capped at [`HISTORY_LIMIT`].
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    entries: VecDeque<String>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sequence: &Sequence) {
        self.entries.push_front(sequence.expression());
        self.entries.truncate(HISTORY_LIMIT);
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.entries.iter().map(String::as_str)
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
