//! In-memory [`MonitoringStore`] implementation.
//!
//! Event logs live in a [`DashMap`] keyed by event id; snapshots, health
//! checks, and alerts are append-mostly collections behind `parking_lot`
//! locks. Snapshot and health history is capped at `history_limit` entries,
//! oldest evicted first. An availability switch lets tests simulate an
//! unreachable backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use hookwatch_core::{Alert, EventLog, HealthStatus, MetricsSnapshot};
use parking_lot::RwLock;

use super::StoreError;
use crate::traits::{EventLogUpdate, MonitoringStore};

/// Default cap on stored metrics snapshots and health statuses each.
pub const DEFAULT_HISTORY_LIMIT: usize = 10_000;

/// Process-local store. Nothing survives a restart.
pub struct MemoryStore {
    initialized: AtomicBool,
    available: AtomicBool,
    history_limit: usize,
    event_logs: DashMap<String, EventLog>,
    snapshots: RwLock<VecDeque<MetricsSnapshot>>,
    health: RwLock<VecDeque<HealthStatus>>,
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Store keeping at most `limit` snapshots and `limit` health statuses
    /// (minimum one of each).
    #[must_use]
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            initialized: AtomicBool::new(false),
            available: AtomicBool::new(true),
            history_limit: limit.max(1),
            event_logs: DashMap::new(),
            snapshots: RwLock::new(VecDeque::new()),
            health: RwLock::new(VecDeque::new()),
            alerts: RwLock::new(Vec::new()),
        }
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`]
    /// until switched back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    #[must_use]
    pub fn event_log_count(&self) -> usize {
        self.event_logs.len()
    }

    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.read().len()
    }

    #[must_use]
    pub fn health_check_count(&self) -> usize {
        self.health.read().len()
    }

    /// Every stored alert, resolved or not, in insertion order.
    #[must_use]
    pub fn all_alerts(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }
}

fn push_capped<T>(history: &mut VecDeque<T>, item: T, limit: usize) {
    while history.len() >= limit {
        history.pop_front();
    }
    history.push_back(item);
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MonitoringStore for MemoryStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert_event_log(&self, log: &EventLog) -> Result<(), StoreError> {
        self.check()?;
        self.event_logs.insert(log.event_id.clone(), log.clone());
        Ok(())
    }

    async fn update_event_log(
        &self,
        event_id: &str,
        update: &EventLogUpdate,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let Some(mut log) = self.event_logs.get_mut(event_id) else {
            return Ok(false);
        };
        log.status = update.status;
        log.updated_at_ms = update.updated_at_ms;
        if update.processing_time_ms.is_some() {
            log.processing_time_ms = update.processing_time_ms;
        }
        if update.error.is_some() {
            log.error.clone_from(&update.error);
        }
        Ok(true)
    }

    async fn get_event_log(&self, event_id: &str) -> Result<Option<EventLog>, StoreError> {
        self.check()?;
        Ok(self.event_logs.get(event_id).map(|entry| entry.value().clone()))
    }

    async fn delete_event_logs_before(&self, cutoff_ms: u64) -> Result<u64, StoreError> {
        self.check()?;
        let before = self.event_logs.len();
        self.event_logs.retain(|_, log| log.created_at_ms >= cutoff_ms);
        Ok((before - self.event_logs.len()) as u64)
    }

    async fn insert_metrics_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<(), StoreError> {
        self.check()?;
        push_capped(&mut *self.snapshots.write(), snapshot.clone(), self.history_limit);
        Ok(())
    }

    async fn latest_metrics_snapshot(&self) -> Result<Option<MetricsSnapshot>, StoreError> {
        self.check()?;
        Ok(self.snapshots.read().back().cloned())
    }

    async fn delete_metrics_snapshots_before(&self, cutoff_ms: u64) -> Result<u64, StoreError> {
        self.check()?;
        let mut snapshots = self.snapshots.write();
        let before = snapshots.len();
        snapshots.retain(|s| s.captured_at_ms >= cutoff_ms);
        Ok((before - snapshots.len()) as u64)
    }

    async fn insert_health_status(&self, status: &HealthStatus) -> Result<(), StoreError> {
        self.check()?;
        push_capped(&mut *self.health.write(), status.clone(), self.history_limit);
        Ok(())
    }

    async fn delete_health_statuses_before(&self, cutoff_ms: u64) -> Result<u64, StoreError> {
        self.check()?;
        let mut health = self.health.write();
        let before = health.len();
        health.retain(|s| s.checked_at_ms >= cutoff_ms);
        Ok((before - health.len()) as u64)
    }

    async fn latest_health_status(
        &self,
        node_url: &str,
    ) -> Result<Option<HealthStatus>, StoreError> {
        self.check()?;
        Ok(self
            .health
            .read()
            .iter()
            .rev()
            .find(|s| s.node_url == node_url)
            .cloned())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        self.check()?;
        self.alerts.write().push(alert.clone());
        Ok(())
    }

    async fn resolve_alert(&self, id: &str, resolved_at_ms: u64) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self
            .alerts
            .write()
            .iter_mut()
            .find(|a| a.id == id)
            .is_some_and(|a| a.resolve(resolved_at_ms)))
    }

    async fn unresolved_alerts(&self) -> Result<Vec<Alert>, StoreError> {
        self.check()?;
        Ok(self
            .alerts
            .read()
            .iter()
            .filter(|a| !a.resolved)
            .cloned()
            .collect())
    }

    async fn delete_resolved_alerts_before(&self, cutoff_ms: u64) -> Result<u64, StoreError> {
        self.check()?;
        let mut alerts = self.alerts.write();
        let before = alerts.len();
        alerts.retain(|a| !(a.resolved && a.resolved_at_ms.unwrap_or(a.created_at_ms) < cutoff_ms));
        Ok((before - alerts.len()) as u64)
    }
}
