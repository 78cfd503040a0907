//! Rolling window of matched timing errors
//!
//! Fixed-capacity ring buffer of `(beat_index, error_s)` pairs with an
//! explicit count. When full, a push overwrites the oldest entry. Only beats
//! that found a matching onset are recorded, so the window spans a variable
//! number of grid beats.

/// One matched beat
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowEntry {
    pub beat_index: u64,
    /// Matched onset time minus grid time (seconds); positive = onset late
    pub error_s: f64,
}

#[derive(Debug, Clone)]
pub struct RollingWindow {
    entries: Vec<WindowEntry>,
    head: usize,
    len: usize,
}

impl RollingWindow {
    /// Create an empty window; capacity is clamped to at least 1
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: vec![WindowEntry::default(); capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Record a matched beat, evicting the oldest entry when full
    pub fn push(&mut self, beat_index: u64, error_s: f64) {
        let entry = WindowEntry {
            beat_index,
            error_s,
        };
        let capacity = self.capacity();
        if self.len < capacity {
            self.entries[(self.head + self.len) % capacity] = entry;
            self.len += 1;
        } else {
            self.entries[self.head] = entry;
            self.head = (self.head + 1) % capacity;
        }
    }

    /// Drop every entry (the storage is kept)
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &WindowEntry> + '_ {
        let capacity = self.capacity();
        (0..self.len).map(move |offset| &self.entries[(self.head + offset) % capacity])
    }

    /// Beat indices as floats, oldest first
    pub fn beat_indices(&self) -> Vec<f64> {
        self.iter().map(|e| e.beat_index as f64).collect()
    }

    /// Errors in seconds, oldest first
    pub fn errors(&self) -> Vec<f64> {
        self.iter().map(|e| e.error_s).collect()
    }
}
