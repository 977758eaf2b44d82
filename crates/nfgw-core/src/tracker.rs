//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Outstanding write overrides.
//!
//! The tracker is created empty when an interface is configured, grows on
//! every successful write, and shrinks only on a confirmed revert. A point
//! written at several priorities holds an override at each of them, so every
//! priority is tracked and released on its own; a name leaves the set once
//! none of its priorities is held.

use std::collections::BTreeSet;

use async_trait::async_trait;
use indexmap::IndexMap;
use nfgw_logging::{gw_info, gw_warn, LogContext};

use crate::error::{GatewayError, Result};

/// Releases the override held on one point at one priority.
#[async_trait]
pub trait PointReverter: Sync {
    async fn revert_point(&self, name: &str, priority: u8) -> Result<()>;
}

/// Outcome of [`WriteTracker::revert_all`].
///
/// A name is reported as failed when any of its priorities could not be
/// released; the first error is kept.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RevertReport {
    pub reverted: Vec<String>,
    pub failed: Vec<(String, GatewayError)>,
}

impl RevertReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Names of points with an outstanding override and the priorities held.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteTracker {
    written: IndexMap<String, BTreeSet<u8>>,
}

impl WriteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write at `priority`. Idempotent per name and priority.
    pub fn track(&mut self, name: &str, priority: u8) {
        self.written
            .entry(name.to_owned())
            .or_default()
            .insert(priority);
    }

    /// Forget `priority` after its override was released. The name is dropped
    /// with its last priority. Returns whether the priority was held.
    pub fn release(&mut self, name: &str, priority: u8) -> bool {
        let Some(held) = self.written.get_mut(name) else {
            return false;
        };
        let removed = held.remove(&priority);
        if held.is_empty() {
            self.written.shift_remove(name);
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.written.contains_key(name)
    }

    /// Held priorities, lowest number first. Empty for untracked names.
    pub fn priorities_of(&self, name: &str) -> Vec<u8> {
        self.written
            .get(name)
            .map(|held| held.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.written.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    pub fn clear(&mut self) {
        self.written.clear();
    }

    /// Revert every tracked point.
    ///
    /// With `priority` set each point is reverted at that priority only;
    /// otherwise at every priority it holds. Each successful revert releases
    /// its priority; failures stay tracked and do not stop the remaining
    /// reverts.
    pub async fn revert_all(
        &mut self,
        reverter: &dyn PointReverter,
        priority: Option<u8>,
    ) -> RevertReport {
        let pending: Vec<(String, Vec<u8>)> = self
            .written
            .iter()
            .map(|(name, held)| {
                let levels = match priority {
                    Some(priority) => vec![priority],
                    None => held.iter().copied().collect(),
                };
                (name.clone(), levels)
            })
            .collect();
        let mut report = RevertReport::default();
        for (name, levels) in pending {
            let ctx = LogContext::operation("revert_all").with_point(&name);
            let mut failure = None;
            for level in levels {
                match reverter.revert_point(&name, level).await {
                    Ok(()) => {
                        self.release(&name, level);
                        gw_info!(context = ctx, "override released at priority {}", level);
                    }
                    Err(err) => {
                        gw_warn!(
                            context = ctx,
                            error = err,
                            "revert at priority {} failed; priority stays tracked",
                            level
                        );
                        failure.get_or_insert(err);
                    }
                }
            }
            match failure {
                None => report.reverted.push(name),
                Some(err) => report.failed.push((name, err)),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct ScriptedReverter {
        failing: &'static [(&'static str, u8)],
        calls: Mutex<Vec<(String, u8)>>,
    }

    #[async_trait]
    impl PointReverter for ScriptedReverter {
        async fn revert_point(&self, name: &str, priority: u8) -> Result<()> {
            self.calls.lock().push((name.to_owned(), priority));
            if self
                .failing
                .iter()
                .any(|(failing, level)| *failing == name && *level == priority)
            {
                return Err(GatewayError::Transport("connection refused".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn priorities_are_tracked_and_released_individually() {
        let mut tracker = WriteTracker::new();
        tracker.track("a", 14);
        tracker.track("a", 8);
        tracker.track("a", 14);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.priorities_of("a"), vec![8, 14]);

        assert!(tracker.release("a", 14));
        assert!(tracker.contains("a"));
        assert!(!tracker.release("a", 14));
        assert!(tracker.release("a", 8));
        assert!(!tracker.contains("a"));
        assert!(tracker.priorities_of("a").is_empty());
    }

    #[tokio::test]
    async fn revert_all_keeps_failures_and_continues() {
        let mut tracker = WriteTracker::new();
        tracker.track("a", 14);
        tracker.track("b", 8);
        tracker.track("c", 14);
        let reverter = ScriptedReverter {
            failing: &[("b", 8)],
            calls: Mutex::new(Vec::new()),
        };

        let report = tracker.revert_all(&reverter, None).await;

        assert_eq!(report.reverted, vec!["a".to_owned(), "c".to_owned()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert!(!report.is_complete());
        assert_eq!(tracker.names().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(
            reverter.calls.lock().clone(),
            vec![("a".to_owned(), 14), ("b".to_owned(), 8), ("c".to_owned(), 14)]
        );
    }

    #[tokio::test]
    async fn every_held_priority_is_reverted() {
        let mut tracker = WriteTracker::new();
        tracker.track("a", 8);
        tracker.track("a", 14);
        let reverter = ScriptedReverter {
            failing: &[],
            calls: Mutex::new(Vec::new()),
        };

        let report = tracker.revert_all(&reverter, None).await;

        assert!(report.is_complete());
        assert_eq!(report.reverted, vec!["a".to_owned()]);
        assert!(tracker.is_empty());
        assert_eq!(
            reverter.calls.lock().clone(),
            vec![("a".to_owned(), 8), ("a".to_owned(), 14)]
        );
    }

    #[tokio::test]
    async fn partially_released_point_keeps_failed_priority() {
        let mut tracker = WriteTracker::new();
        tracker.track("a", 8);
        tracker.track("a", 14);
        let reverter = ScriptedReverter {
            failing: &[("a", 8)],
            calls: Mutex::new(Vec::new()),
        };

        let report = tracker.revert_all(&reverter, None).await;

        assert_eq!(report.failed.len(), 1);
        assert!(report.reverted.is_empty());
        assert_eq!(tracker.priorities_of("a"), vec![8]);
    }

    #[tokio::test]
    async fn explicit_priority_releases_only_that_level() {
        let mut tracker = WriteTracker::new();
        tracker.track("a", 8);
        tracker.track("b", 14);
        let reverter = ScriptedReverter {
            failing: &[],
            calls: Mutex::new(Vec::new()),
        };

        let report = tracker.revert_all(&reverter, Some(14)).await;

        assert!(report.is_complete());
        assert_eq!(
            reverter.calls.lock().clone(),
            vec![("a".to_owned(), 14), ("b".to_owned(), 14)]
        );
        assert_eq!(tracker.names().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(tracker.priorities_of("a"), vec![8]);
    }
}
