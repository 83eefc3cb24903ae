//! Ordered, bounded message history for the active room.
//!
//! Keeps the newest messages in timestamp order so the view can place an
//! out-of-order arrival where it belongs. Memory stays bounded by evicting
//! the oldest entry.

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::message::ChatMessage;

/// Messages retained per room.
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub key: String,
    pub message: ChatMessage,
}

/// Where an inserted message landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Position after the insert, oldest first.
    pub index: usize,
    /// The oldest entry was dropped to make room.
    pub evicted_oldest: bool,
}

#[derive(Debug)]
pub struct MessageLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

/// Sort order: timestamp, pending (no timestamp) last, then key.
fn compare(a_key: &str, a: &ChatMessage, b_key: &str, b: &ChatMessage) -> Ordering {
    let by_time = match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time.then_with(|| a_key.cmp(b_key))
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Insert in order and return the display position, or `None` when the
    /// key is already present or the message is older than everything a
    /// full log retains.
    pub fn insert(&mut self, key: String, message: ChatMessage) -> Option<Placement> {
        if self.entries.iter().any(|e| e.key == key) {
            return None;
        }
        let index = self
            .entries
            .partition_point(|e| compare(&e.key, &e.message, &key, &message) == Ordering::Less);
        if self.entries.len() >= self.capacity {
            if index == 0 {
                return None;
            }
            self.entries.pop_front();
            self.entries.insert(index - 1, LogEntry { key, message });
            return Some(Placement {
                index: index - 1,
                evicted_oldest: true,
            });
        }
        self.entries.insert(index, LogEntry { key, message });
        Some(Placement {
            index,
            evicted_oldest: false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(HISTORY_LIMIT)
    }
}
