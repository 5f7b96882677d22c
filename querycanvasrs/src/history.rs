use std::collections::VecDeque;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::HistoryConfig;
use crate::executor::QueryResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHistoryEntry {
    pub sql: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub execution_time: u64,
    pub row_count: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryHistoryEntry {
    pub fn from_result(sql: impl Into<String>, result: &QueryResult) -> Self {
        Self {
            sql: sql.into(),
            timestamp: Utc::now().timestamp_millis(),
            execution_time: result.execution_time,
            row_count: result.row_count,
            success: result.is_success(),
            error: result.error.clone(),
        }
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Success,
    Error,
}

impl StatusFilter {
    fn accepts(&self, entry: &QueryHistoryEntry) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Success => entry.success,
            StatusFilter::Error => !entry.success,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Rounded mean in milliseconds; 0 for an empty history.
    pub avg_execution_time: u64,
}

/// Bounded execution log, newest entry first.
#[derive(Debug, Clone)]
pub struct QueryHistory {
    entries: VecDeque<QueryHistoryEntry>,
    max_entries: usize,
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

impl QueryHistory {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: config.max_entries,
        }
    }

    /// Prepend an entry, dropping the oldest beyond the cap.
    pub fn record(&mut self, entry: QueryHistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.max_entries);
    }

    pub fn entries(&self) -> impl Iterator<Item = &QueryHistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&QueryHistoryEntry> {
        self.entries.front()
    }

    /// Case-insensitive substring match on the SQL, newest first.
    pub fn search(&self, term: &str, filter: StatusFilter) -> Vec<&QueryHistoryEntry> {
        let needle = term.to_lowercase();
        let mut found: Vec<_> = self
            .entries
            .iter()
            .filter(|e| filter.accepts(e) && e.sql.to_lowercase().contains(&needle))
            .collect();
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        found
    }

    /// Remove every entry recorded at `timestamp`; returns how many went.
    pub fn remove(&mut self, timestamp: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.timestamp != timestamp);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn clear_errors(&mut self) {
        self.entries.retain(|e| e.success);
    }

    pub fn stats(&self) -> HistoryStats {
        let total = self.entries.len();
        let successful = self.entries.iter().filter(|e| e.success).count();
        let avg_execution_time = if total == 0 {
            0
        } else {
            let sum: u64 = self.entries.iter().map(|e| e.execution_time).sum();
            (sum as f64 / total as f64).round() as u64
        };
        HistoryStats {
            total,
            successful,
            failed: total - successful,
            avg_execution_time,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
