//! Capped in-memory log of pipeline errors, grouped by category.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of entries kept before the oldest are evicted.
pub const MAX_ERROR_LOG_ENTRIES: usize = 1000;

/// Category an error is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Payload could not be decoded.
    Parse,
    /// Payload decoded but failed a structural check.
    Validation,
    /// A route handler or batch callback failed.
    Handler,
    /// An alert or notification could not be delivered.
    Notification,
    /// Streaming transport failure.
    Websocket,
    Unknown,
}

impl ErrorCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Validation => "validation",
            Self::Handler => "handler",
            Self::Notification => "notification",
            Self::Websocket => "websocket",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded error with free-form context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default)]
    pub context: Value,
    pub timestamp_ms: u64,
}

/// Bounded error history. Oldest entries are evicted past the capacity.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    capacity: usize,
    entries: VecDeque<ErrorRecord>,
}

impl ErrorLog {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_ERROR_LOG_ENTRIES)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Appends an error, evicting the oldest entry when full.
    pub fn record(
        &mut self,
        category: ErrorCategory,
        message: impl Into<String>,
        context: Value,
        timestamp_ms: u64,
    ) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ErrorRecord {
            category,
            message: message.into(),
            context,
            timestamp_ms,
        });
    }

    /// Up to `n` most recent entries, newest last.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<ErrorRecord> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn count_by_category(&self) -> BTreeMap<ErrorCategory, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.category).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new()
    }
}
