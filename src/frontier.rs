//! Frontier scheduling: discovered-but-unexpanded concepts, partitioned by
//! BFS distance and by relation family, drained strictly in distance order.

use crate::registry::ConceptRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which relation family discovered an entry. Secondary-ontology ids live in
/// a different identifier space and use a different lookup protocol, so they
/// are kept on their own frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontierKind {
    Primary,
    Secondary,
}

/// One unit of pending expansion work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub id: String,
    pub head_id: String,
    pub distance: u32,
    pub kind: FrontierKind,
}

/// Queues for one distance level. Maps are id → owning head, which both
/// deduplicates within the level and keeps drain order deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LevelQueues {
    primary: BTreeMap<String, String>,
    secondary: BTreeMap<String, String>,
}

impl LevelQueues {
    fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }
}

/// Typed per-distance work queues.
///
/// Acceptance contract: a primary id is accepted only when it is not yet in
/// the registry, and the caller must seed it into the registry immediately
/// after a successful enqueue — that is what makes the registry check a
/// complete duplicate/cycle guard (monotone discovery). Secondary ids are
/// tracked in a dedicated seen-set since they never enter the registry
/// directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrontierScheduler {
    levels: BTreeMap<u32, LevelQueues>,
    secondary_seen: BTreeSet<String>,
}

impl FrontierScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an id for expansion at `distance`. Rejects (returns false)
    /// duplicates and ids in the owning head's exclusion set.
    pub fn enqueue(
        &mut self,
        id: &str,
        head_id: &str,
        distance: u32,
        kind: FrontierKind,
        registry: &ConceptRegistry,
        exclude: &BTreeSet<String>,
    ) -> bool {
        if exclude.contains(id) {
            log::debug!("Excluded from frontier: {} (head {})", id, head_id);
            return false;
        }
        // Rejection checks come first: a rejected offer must not leave an
        // empty level behind in the map (it would bloat every snapshot).
        match kind {
            FrontierKind::Primary => {
                if registry.is_known(id) {
                    return false;
                }
                self.levels
                    .entry(distance)
                    .or_default()
                    .primary
                    .insert(id.to_string(), head_id.to_string());
            }
            FrontierKind::Secondary => {
                if !self.secondary_seen.insert(id.to_string()) {
                    return false;
                }
                self.levels
                    .entry(distance)
                    .or_default()
                    .secondary
                    .insert(id.to_string(), head_id.to_string());
            }
        }
        true
    }

    /// Remove and return every entry at exactly `distance`, primary entries
    /// first, each group in id order. Once drained, the entries are gone;
    /// restart is only possible through a checkpoint snapshot.
    pub fn drain_level(&mut self, distance: u32) -> Vec<FrontierEntry> {
        let Some(level) = self.levels.remove(&distance) else {
            return Vec::new();
        };
        let mut entries = Vec::with_capacity(level.primary.len() + level.secondary.len());
        for (id, head_id) in level.primary {
            entries.push(FrontierEntry {
                id,
                head_id,
                distance,
                kind: FrontierKind::Primary,
            });
        }
        for (id, head_id) in level.secondary {
            entries.push(FrontierEntry {
                id,
                head_id,
                distance,
                kind: FrontierKind::Secondary,
            });
        }
        entries
    }

    /// Shallowest distance with pending entries, if any.
    pub fn next_pending_level(&self) -> Option<u32> {
        self.levels
            .iter()
            .find(|(_, queues)| !queues.is_empty())
            .map(|(distance, _)| *distance)
    }

    /// Number of entries pending at `distance`.
    pub fn level_len(&self, distance: u32) -> usize {
        self.levels
            .get(&distance)
            .map(|l| l.primary.len() + l.secondary.len())
            .unwrap_or(0)
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_pending_level().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_excludes() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_enqueue_rejects_known_id() {
        let mut registry = ConceptRegistry::new();
        registry.seed("C0000001", None);
        let mut frontier = FrontierScheduler::new();
        let accepted = frontier.enqueue(
            "C0000001",
            "C0000001",
            1,
            FrontierKind::Primary,
            &registry,
            &no_excludes(),
        );
        assert!(!accepted);
        assert!(frontier.is_exhausted());
    }

    #[test]
    fn test_enqueue_rejects_excluded_id() {
        let registry = ConceptRegistry::new();
        let mut frontier = FrontierScheduler::new();
        let exclude: BTreeSet<String> = ["C0000002".to_string()].into_iter().collect();
        assert!(!frontier.enqueue(
            "C0000002",
            "C0000001",
            1,
            FrontierKind::Primary,
            &registry,
            &exclude,
        ));
        assert!(frontier.enqueue(
            "C0000003",
            "C0000001",
            1,
            FrontierKind::Primary,
            &registry,
            &exclude,
        ));
    }

    #[test]
    fn test_secondary_dedupe_across_levels() {
        let registry = ConceptRegistry::new();
        let mut frontier = FrontierScheduler::new();
        assert!(frontier.enqueue(
            "195967001",
            "C0000001",
            1,
            FrontierKind::Secondary,
            &registry,
            &no_excludes(),
        ));
        // Same secondary id offered again at a deeper level: rejected
        assert!(!frontier.enqueue(
            "195967001",
            "C0000001",
            2,
            FrontierKind::Secondary,
            &registry,
            &no_excludes(),
        ));
        assert_eq!(frontier.level_len(1), 1);
        assert_eq!(frontier.level_len(2), 0);
    }

    #[test]
    fn test_rejected_enqueue_leaves_no_level_behind() {
        let mut registry = ConceptRegistry::new();
        registry.seed("C0000001", None);
        let mut frontier = FrontierScheduler::new();
        let ex = no_excludes();

        // Rejected: already in the registry
        assert!(!frontier.enqueue("C0000001", "C0000001", 1, FrontierKind::Primary, &registry, &ex));
        // Accepted at distance 2, then rejected as a duplicate at distance 3
        assert!(frontier.enqueue("195967001", "C0000001", 2, FrontierKind::Secondary, &registry, &ex));
        assert!(!frontier.enqueue("195967001", "C0000001", 3, FrontierKind::Secondary, &registry, &ex));

        // Rejections must not materialize empty levels; they would otherwise
        // be carried in every snapshot from here on.
        let value = serde_json::to_value(&frontier).unwrap();
        let levels = value["levels"].as_object().unwrap();
        assert_eq!(levels.keys().collect::<Vec<_>>(), vec!["2"]);
        assert_eq!(frontier.next_pending_level(), Some(2));
    }

    #[test]
    fn test_drain_level_sorted_and_removes() {
        let registry = ConceptRegistry::new();
        let mut frontier = FrontierScheduler::new();
        let ex = no_excludes();
        frontier.enqueue("C0000003", "C0000001", 1, FrontierKind::Primary, &registry, &ex);
        frontier.enqueue("C0000002", "C0000001", 1, FrontierKind::Primary, &registry, &ex);
        frontier.enqueue("195967001", "C0000001", 1, FrontierKind::Secondary, &registry, &ex);

        let entries = frontier.drain_level(1);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["C0000002", "C0000003", "195967001"]);
        assert_eq!(entries[2].kind, FrontierKind::Secondary);

        assert!(frontier.drain_level(1).is_empty());
        assert!(frontier.is_exhausted());
    }

    #[test]
    fn test_next_pending_level_is_shallowest() {
        let registry = ConceptRegistry::new();
        let mut frontier = FrontierScheduler::new();
        let ex = no_excludes();
        frontier.enqueue("C0000005", "C0000001", 3, FrontierKind::Primary, &registry, &ex);
        frontier.enqueue("C0000002", "C0000001", 1, FrontierKind::Primary, &registry, &ex);
        assert_eq!(frontier.next_pending_level(), Some(1));
        frontier.drain_level(1);
        assert_eq!(frontier.next_pending_level(), Some(3));
    }

    #[test]
    fn test_serde_roundtrip_preserves_state() {
        let registry = ConceptRegistry::new();
        let mut frontier = FrontierScheduler::new();
        let ex = no_excludes();
        frontier.enqueue("C0000002", "C0000001", 1, FrontierKind::Primary, &registry, &ex);
        frontier.enqueue("195967001", "C0000001", 1, FrontierKind::Secondary, &registry, &ex);

        let json = serde_json::to_string(&frontier).unwrap();
        let mut restored: FrontierScheduler = serde_json::from_str(&json).unwrap();

        // Seen-set survives the round trip
        assert!(!restored.enqueue(
            "195967001",
            "C0000001",
            2,
            FrontierKind::Secondary,
            &registry,
            &ex,
        ));
        assert_eq!(restored.drain_level(1).len(), 2);
    }
}
