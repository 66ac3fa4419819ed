//! Position tracker: diffs snapshots against known state and classifies
//! lifecycle transitions.
//!
//! Handles:
//! - Detecting newly opened positions
//! - Detecting positions that disappeared from the snapshot (closed)
//! - Back-filling closures from the history feed that were never seen live
//! - Bounding the closed-id set

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info};

use crate::models::{PositionEvent, PositionRecord};

use super::TrackerConfig;

#[derive(Debug, Clone)]
struct KnownPosition {
    record: PositionRecord,
    /// Set once the position has gone missing from a snapshot; survives
    /// pruning of the closed set so a pruned id is never closed twice.
    gone: bool,
}

/// Process-lifetime memory of every position ever observed.
#[derive(Debug, Default)]
pub struct TrackerState {
    known: HashMap<String, KnownPosition>,
    known_order: Vec<String>,
    closed: HashSet<String>,
    closed_order: VecDeque<String>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_known(&self, id: &str) -> bool {
        self.known.contains_key(id)
    }

    pub fn is_closed(&self, id: &str) -> bool {
        self.closed.contains(id)
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }

    /// Known positions that have not disappeared yet.
    pub fn open_count(&self) -> usize {
        self.known.values().filter(|k| !k.gone).count()
    }

    /// Insert or refresh a live position. Returns true if it was new.
    fn observe(&mut self, record: &PositionRecord) -> bool {
        match self.known.get_mut(&record.id) {
            Some(existing) => {
                if existing.gone {
                    debug!(id = %record.id, "Closed position reappeared in snapshot");
                }
                existing.record = record.clone();
                false
            }
            None => {
                self.known_order.push(record.id.clone());
                self.known.insert(
                    record.id.clone(),
                    KnownPosition {
                        record: record.clone(),
                        gone: false,
                    },
                );
                true
            }
        }
    }

    fn mark_closed(&mut self, id: &str) -> bool {
        if self.closed.insert(id.to_string()) {
            self.closed_order.push_back(id.to_string());
            true
        } else {
            false
        }
    }

    /// Shrink the closed set to `retain` entries once it exceeds `ceiling`.
    ///
    /// The last `protected` entries (added during the current step) are kept
    /// even if that leaves more than `retain` ids behind.
    fn prune(&mut self, ceiling: usize, retain: usize, protected: usize) -> usize {
        if self.closed_order.len() <= ceiling {
            return 0;
        }

        let keep = retain.max(protected);
        let drop = self.closed_order.len().saturating_sub(keep);
        for id in self.closed_order.drain(..drop) {
            self.closed.remove(&id);
        }
        drop
    }
}

/// Tracker statistics, snapshot-copied for readers outside the driver.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TrackerStats {
    pub known: usize,
    pub open: usize,
    pub closed: usize,
}

/// Owns the tracking state and applies each classification step.
pub struct PositionTracker {
    config: TrackerConfig,
    state: TrackerState,
}

impl PositionTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: TrackerState::new(),
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            known: self.state.known_count(),
            open: self.state.open_count(),
            closed: self.state.closed_count(),
        }
    }

    /// Populate state without emitting anything.
    ///
    /// Open positions become known; history ids become closed so the first
    /// reconciliation does not announce positions closed before startup.
    pub fn seed(&mut self, snapshot: &[PositionRecord], history: &[PositionRecord]) {
        for record in snapshot.iter().filter(|r| !r.id.is_empty()) {
            self.state.observe(record);
        }

        let before = self.state.closed_order.len();
        for record in history.iter().take(self.config.history_window) {
            if !record.id.is_empty() && !self.state.is_known(&record.id) {
                self.state.mark_closed(&record.id);
            }
        }
        let added = self.state.closed_order.len() - before;
        self.prune(added);

        info!(
            open = self.state.known_count(),
            closed = self.state.closed_count(),
            "Tracker seeded"
        );
    }

    /// Diff a live snapshot against known state.
    ///
    /// Emits every `Opened` in snapshot order, then every `Closed` in the
    /// order positions were first seen.
    pub fn observe(&mut self, snapshot: &[PositionRecord]) -> Vec<PositionEvent> {
        let mut events = Vec::new();
        let current: HashSet<&str> = snapshot.iter().map(|r| r.id.as_str()).collect();

        for record in snapshot.iter().filter(|r| !r.id.is_empty()) {
            if self.state.observe(record) && record.belongs_to(&self.config.trader_id) {
                events.push(PositionEvent::Opened(record.clone()));
            }
        }

        let before = self.state.closed_order.len();
        let vanished: Vec<String> = self
            .state
            .known_order
            .iter()
            .filter(|id| !current.contains(id.as_str()))
            .filter(|id| self.state.known.get(*id).is_some_and(|k| !k.gone))
            .cloned()
            .collect();

        for id in vanished {
            let Some(known) = self.state.known.get_mut(&id) else {
                continue;
            };
            known.gone = true;
            let record = known.record.clone();

            if self.state.mark_closed(&id) && record.belongs_to(&self.config.trader_id) {
                events.push(PositionEvent::Closed(record));
            }
        }

        let added = self.state.closed_order.len() - before;
        self.prune(added);

        events
    }

    /// Back-fill closures from the history feed.
    ///
    /// Only the first `history_window` records are considered; ids already
    /// known or closed are ignored.
    pub fn reconcile(&mut self, history: &[PositionRecord]) -> Vec<PositionEvent> {
        let mut events = Vec::new();
        let before = self.state.closed_order.len();

        for record in history.iter().take(self.config.history_window) {
            if record.id.is_empty()
                || self.state.is_known(&record.id)
                || self.state.is_closed(&record.id)
            {
                continue;
            }

            self.state.mark_closed(&record.id);
            if record.belongs_to(&self.config.trader_id) {
                events.push(PositionEvent::Missed(record.clone()));
            }
        }

        let added = self.state.closed_order.len() - before;
        self.prune(added);

        events
    }

    fn prune(&mut self, added_this_step: usize) {
        let dropped = self.state.prune(
            self.config.closed_ceiling,
            self.config.closed_retain,
            added_this_step,
        );
        if dropped > 0 {
            debug!(
                dropped = dropped,
                remaining = self.state.closed_count(),
                "Pruned closed position ids"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRADER: &str = "T";

    fn tracker() -> PositionTracker {
        PositionTracker::new(TrackerConfig::new(TRADER))
    }

    fn pos(id: &str) -> PositionRecord {
        PositionRecord::new(id, TRADER)
    }

    fn ids(events: &[PositionEvent]) -> Vec<(&'static str, String)> {
        events
            .iter()
            .map(|e| (e.kind(), e.record().id.clone()))
            .collect()
    }

    #[test]
    fn test_lifecycle_scenario() {
        let mut t = tracker();

        t.seed(&[pos("1").with_symbol("BTCUSDT").with_side("long")], &[]);
        assert!(t.state().is_known("1"));

        let events = t.observe(&[
            pos("1").with_symbol("BTCUSDT").with_side("long"),
            pos("2").with_symbol("ETHUSDT").with_side("short"),
        ]);
        assert_eq!(ids(&events), vec![("opened", "2".to_string())]);

        let events = t.observe(&[pos("2")]);
        assert_eq!(ids(&events), vec![("closed", "1".to_string())]);
        assert_eq!(events[0].record().symbol.as_deref(), Some("BTCUSDT"));

        let events = t.observe(&[]);
        assert_eq!(ids(&events), vec![("closed", "2".to_string())]);

        assert!(t.observe(&[]).is_empty());
    }

    #[test]
    fn test_same_snapshot_twice_is_idempotent() {
        let mut t = tracker();
        let snapshot = vec![pos("a"), pos("b")];

        assert_eq!(t.observe(&snapshot).len(), 2);
        assert!(t.observe(&snapshot).is_empty());
    }

    #[test]
    fn test_other_trader_tracked_but_silent() {
        let mut t = tracker();
        let foreign = PositionRecord::new("x", "someone-else");

        assert!(t.observe(&[foreign.clone()]).is_empty());
        assert!(t.state().is_known("x"));

        assert!(t.observe(&[]).is_empty());
        assert!(t.state().is_closed("x"));
    }

    #[test]
    fn test_missing_trader_id_is_silent() {
        let mut t = tracker();
        let orphan = PositionRecord {
            trader_id: None,
            ..pos("o")
        };

        assert!(t.observe(&[orphan]).is_empty());
        assert!(t.state().is_known("o"));
    }

    #[test]
    fn test_event_ordering() {
        let mut t = tracker();
        t.observe(&[pos("c"), pos("a"), pos("b")]);

        let events = t.observe(&[pos("z"), pos("y")]);
        assert_eq!(
            ids(&events),
            vec![
                ("opened", "z".to_string()),
                ("opened", "y".to_string()),
                ("closed", "c".to_string()),
                ("closed", "a".to_string()),
                ("closed", "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_reobserved_value_is_refreshed() {
        let mut t = tracker();
        t.observe(&[pos("1").with_size("1")]);
        t.observe(&[pos("1").with_size("3")]);

        let events = t.observe(&[]);
        assert_eq!(events[0].record().size.as_deref(), Some("3"));
    }

    #[test]
    fn test_reappearing_position_never_closes_twice() {
        let mut t = tracker();
        t.observe(&[pos("1")]);
        assert_eq!(t.observe(&[]).len(), 1);

        // Back in the snapshot: no second Opened, and no second Closed later.
        assert!(t.observe(&[pos("1")]).is_empty());
        assert!(t.observe(&[]).is_empty());
    }

    #[test]
    fn test_reconcile_emits_missed_once() {
        let mut t = tracker();
        let history = vec![pos("5").with_profit("12.3")];

        let events = t.reconcile(&history);
        assert_eq!(events.len(), 1);
        match &events[0] {
            PositionEvent::Missed(r) => assert_eq!(r.profit.as_deref(), Some("12.3")),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(t.state().is_closed("5"));
        assert!(!t.state().is_known("5"));

        assert!(t.reconcile(&history).is_empty());
    }

    #[test]
    fn test_reconcile_skips_live_positions() {
        let mut t = tracker();
        t.observe(&[pos("1")]);
        assert!(t.reconcile(&[pos("1")]).is_empty());

        t.observe(&[]);
        assert!(t.reconcile(&[pos("1")]).is_empty());
    }

    #[test]
    fn test_reconcile_respects_window() {
        let mut t = PositionTracker::new(TrackerConfig {
            history_window: 2,
            ..TrackerConfig::new(TRADER)
        });

        let events = t.reconcile(&[pos("h1"), pos("h2"), pos("h3")]);
        assert_eq!(events.len(), 2);
        assert!(!t.state().is_closed("h3"));
    }

    #[test]
    fn test_reconcile_other_trader_marked_but_silent() {
        let mut t = tracker();
        let foreign = PositionRecord::new("f", "U");

        assert!(t.reconcile(&[foreign]).is_empty());
        assert!(t.state().is_closed("f"));
    }

    #[test]
    fn test_seed_history_suppresses_missed() {
        let mut t = tracker();
        t.seed(&[pos("open")], &[pos("old1"), pos("old2")]);

        let events = t.reconcile(&[pos("new"), pos("old1"), pos("old2")]);
        assert_eq!(ids(&events), vec![("missed", "new".to_string())]);
        assert_eq!(t.stats().closed, 3);
        assert_eq!(t.stats().open, 1);
    }

    #[test]
    fn test_prune_bounds_closed_set() {
        let mut t = PositionTracker::new(TrackerConfig {
            closed_ceiling: 10,
            closed_retain: 5,
            history_window: 100,
            ..TrackerConfig::new(TRADER)
        });

        for batch in 0..4 {
            let history: Vec<_> = (0..4).map(|i| pos(&format!("{batch}-{i}"))).collect();
            t.reconcile(&history);
            assert!(t.state().closed_count() <= 10);
        }

        // The latest batch always survives.
        for i in 0..4 {
            assert!(t.state().is_closed(&format!("3-{i}")));
        }
    }

    #[test]
    fn test_prune_keeps_current_step_ids() {
        let mut t = PositionTracker::new(TrackerConfig {
            closed_ceiling: 4,
            closed_retain: 2,
            history_window: 100,
            ..TrackerConfig::new(TRADER)
        });

        t.reconcile(&[pos("a"), pos("b")]);
        let history: Vec<_> = (0..6).map(|i| pos(&format!("n{i}"))).collect();
        let events = t.reconcile(&history);

        assert_eq!(events.len(), 6);
        for i in 0..6 {
            assert!(t.state().is_closed(&format!("n{i}")));
        }
        assert!(!t.state().is_closed("a"));
        assert!(!t.state().is_closed("b"));
    }

    #[test]
    fn test_pruned_known_id_is_not_closed_again() {
        let mut t = PositionTracker::new(TrackerConfig {
            closed_ceiling: 2,
            closed_retain: 1,
            ..TrackerConfig::new(TRADER)
        });

        t.observe(&[pos("1"), pos("2"), pos("3")]);
        assert_eq!(t.observe(&[pos("2"), pos("3")]).len(), 1);
        assert_eq!(t.observe(&[pos("3")]).len(), 1);
        assert_eq!(t.observe(&[]).len(), 1);

        // Ids 1 and 2 were pruned from the closed set but never close again.
        assert!(!t.state().is_closed("1"));
        assert!(!t.state().is_closed("2"));
        assert!(t.state().is_closed("3"));
        assert!(t.observe(&[]).is_empty());
        assert_eq!(t.state().known_count(), 3);
    }

    #[test]
    fn test_empty_id_is_ignored() {
        let mut t = tracker();
        assert!(t.observe(&[pos("")]).is_empty());
        assert_eq!(t.state().known_count(), 0);
        assert!(t.reconcile(&[pos("")]).is_empty());
        assert_eq!(t.state().closed_count(), 0);
    }
}
