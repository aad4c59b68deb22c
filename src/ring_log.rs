//! Bounded in-memory diagnostic log.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

/// A fixed-capacity log of timestamped lines, oldest dropped first.
///
/// The database writes one line per significant event so that a dump taken
/// long after the fact still shows the recent mutation history.
pub struct RingLog {
    capacity: usize,
    entries: Mutex<VecDeque<Entry>>,
}

struct Entry {
    micros: i64,
    line: String,
}

impl RingLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a line, evicting the oldest entry when full.
    pub fn log(&self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(Entry {
            micros: now_micros(),
            line: line.into(),
        });
    }

    /// Formatted entries, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|e| format!("{} {}", e.micros, e.line))
            .collect()
    }

    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        for line in self.lines() {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }
}

fn now_micros() -> i64 {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards");
    duration.as_micros() as i64
}
