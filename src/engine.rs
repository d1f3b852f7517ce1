//! The traversal orchestrator: per-seed expansion followed by an iterative
//! per-level BFS loop over the frontiers.
//!
//! Each level runs in two phases. A fetch phase issues the remote queries for
//! every drained entry with bounded concurrency, in deterministic entry
//! order; an apply phase then mutates the registry and frontiers serially.
//! All work for distance d, including its checkpoint, completes before any
//! distance d+1 work begins — the depth bound depends on that ordering.

use crate::checkpoint::{CheckpointKey, CheckpointStore, TraversalSnapshot};
use crate::directive::{IncludeFlag, TraversalDirective};
use crate::error::Result;
use crate::frontier::{FrontierEntry, FrontierKind, FrontierScheduler};
use crate::registry::{ConceptProperties, ConceptRegistry};
use crate::remote::{HierarchyDirection, RelationKind, RemoteLookup};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};

/// Everything fetched for one frontier entry before any state is mutated.
struct FetchedExpansion {
    entry: FrontierEntry,
    /// Property bundle for primary entries still awaiting resolution.
    properties: Option<ConceptProperties>,
    /// Primary-space id for a secondary entry, if the crosswalk resolves.
    mapped: Option<String>,
    /// Next-distance candidates: descendants for primary entries,
    /// secondary-hierarchy children for secondary entries.
    neighbors: BTreeSet<String>,
}

/// Seed-driven BFS expansion over the remote relation graph.
pub struct ExpansionEngine<L> {
    lookup: L,
    directives: BTreeMap<String, TraversalDirective>,
    registry: ConceptRegistry,
    frontiers: FrontierScheduler,
    checkpoints: Option<CheckpointStore>,
    max_distance: i32,
    max_in_flight: usize,
}

impl<L: RemoteLookup> ExpansionEngine<L> {
    /// Build an engine over the given directives. Every directive's head is
    /// seeded into the registry immediately, before any remote traffic.
    pub fn new(
        lookup: L,
        directives: Vec<TraversalDirective>,
        max_distance: i32,
        max_in_flight: usize,
    ) -> Self {
        let mut registry = ConceptRegistry::new();
        let mut directive_map = BTreeMap::new();
        for directive in directives {
            registry.seed(&directive.head_id, None);
            directive_map.insert(directive.head_id.clone(), directive);
        }
        ExpansionEngine {
            lookup,
            directives: directive_map,
            registry,
            frontiers: FrontierScheduler::new(),
            checkpoints: None,
            max_distance,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Enable checkpointing; the store decides the persisted layout.
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn registry(&self) -> &ConceptRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> ConceptRegistry {
        self.registry
    }

    /// Run the traversal to completion, resuming past any existing
    /// checkpoints instead of re-issuing their remote calls.
    pub async fn run(&mut self) -> Result<()> {
        self.seed_pass().await?;
        self.level_loop().await?;
        log::info!("Traversal complete: {} concepts in registry", self.registry.len());
        Ok(())
    }

    /// Distance 0 → 1: expand each seed per its directive, checkpointing
    /// after every seed.
    async fn seed_pass(&mut self) -> Result<()> {
        let heads: Vec<String> = self.directives.keys().cloned().collect();
        let total = heads.len();
        for (idx, head) in heads.into_iter().enumerate() {
            let key = CheckpointKey::Seed(head.clone());
            if let Some(store) = &self.checkpoints {
                if store.has_checkpoint(&key) {
                    log::debug!("Checkpoint already exists for seed {}. Loading and continuing.", head);
                    let snapshot = store.load(&key)?;
                    self.restore(snapshot);
                    continue;
                }
            }
            log::info!("[{}/{}] Expanding seed {}", idx + 1, total, head);
            self.expand_seed(&head).await?;
            self.save_checkpoint(&key, 0)?;
        }
        Ok(())
    }

    async fn expand_seed(&mut self, head: &str) -> Result<()> {
        self.registry.flesh_out(head, &self.lookup).await?;
        let Some(directive) = self.directives.get(head).cloned() else {
            log::warn!("No directive for seed {}. Skipping", head);
            return Ok(());
        };
        // A zero bound means seeds only: resolve them but discover nothing.
        if self.max_distance == 0 {
            return Ok(());
        }

        match directive.include_parents {
            IncludeFlag::No => {}
            IncludeFlag::Some => {
                for parent in &directive.parents_include {
                    self.admit_primary(parent, head, 1, &directive.descendants_exclude);
                }
            }
            IncludeFlag::Yes => {
                let parents = self.lookup.relation(head, RelationKind::Narrower).await?;
                for parent in parents {
                    self.admit_primary(&parent, head, 1, &directive.descendants_exclude);
                }
            }
        }
        log::debug!("Done with parents for {}", head);

        if directive.include_related {
            let related = self.lookup.relation(head, RelationKind::RelatedOther).await?;
            for id in related {
                if directive.related_exclude.iter().any(|e| e == &id) {
                    continue;
                }
                self.admit_primary(&id, head, 1, &directive.descendants_exclude);
            }
        }
        log::debug!("Done with related-other for {}", head);

        // Descendants are the primary expansion axis: always queried.
        let descendants = self.lookup.relation(head, RelationKind::Broader).await?;
        log::debug!("Got {} descendant candidates for {}", descendants.len(), head);
        for descendant in descendants {
            self.admit_primary(&descendant, head, 1, &directive.descendants_exclude);
        }
        log::debug!("Done with descendants for {}", head);

        // Load-time expansions (e.g. drug-vocabulary concepts the seed loader
        // already resolved) are admitted directly under the seed.
        for id in &directive.descendants_include {
            self.admit_primary(id, head, 1, &directive.descendants_exclude);
        }

        let mut secondary_ids: Vec<String> = directive.secondary_seeds.clone();
        match directive.include_secondary_parents {
            IncludeFlag::No => {}
            IncludeFlag::Some => secondary_ids.extend(directive.secondary_parents.iter().cloned()),
            IncludeFlag::Yes => {
                for seed_id in &directive.secondary_seeds {
                    let ancestors = self
                        .lookup
                        .secondary_hierarchy(seed_id, HierarchyDirection::Parents)
                        .await?;
                    secondary_ids.extend(ancestors);
                }
            }
        }
        for secondary_id in secondary_ids {
            self.frontiers.enqueue(
                &secondary_id,
                head,
                1,
                FrontierKind::Secondary,
                &self.registry,
                &directive.descendants_exclude,
            );
        }
        Ok(())
    }

    /// Drain levels in strictly increasing distance order until both
    /// frontiers are exhausted, checkpointing after each completed level.
    async fn level_loop(&mut self) -> Result<()> {
        while let Some(distance) = self.frontiers.next_pending_level() {
            let key = CheckpointKey::Level(distance);
            if let Some(store) = &self.checkpoints {
                if store.has_checkpoint(&key) {
                    log::info!("Checkpoint already exists for level {}. Loading and continuing.", distance);
                    let snapshot = store.load(&key)?;
                    self.restore(snapshot);
                    continue;
                }
            }
            self.expand_level(distance).await?;
            self.save_checkpoint(&key, distance)?;
        }
        Ok(())
    }

    async fn expand_level(&mut self, distance: u32) -> Result<()> {
        let entries = self.frontiers.drain_level(distance);
        log::info!(
            "Filling out {} concepts at distance {} from seeds",
            entries.len(),
            distance
        );
        let global_descend = self.max_distance == -1 || (distance as i32) < self.max_distance;

        // Fetch phase: read-only against the service, bounded in flight,
        // results collected in entry order so apply stays deterministic.
        // Resolution and descent are decided per entry before anything runs:
        // a concept already resolved earlier in the run (a crosswalk can get
        // there first) is not fetched again, and a head's own depth cap stops
        // its subtree short of the global bound.
        let jobs: Vec<(FrontierEntry, bool, bool)> = entries
            .into_iter()
            .map(|entry| {
                let resolve = entry.kind == FrontierKind::Primary
                    && self.registry.needs_resolution(&entry.id);
                let descend = global_descend && self.head_depth_allows(&entry.head_id, distance);
                (entry, resolve, descend)
            })
            .collect();
        let lookup = &self.lookup;
        let fetches = jobs
            .into_iter()
            .map(|(entry, resolve, descend)| fetch_expansion(lookup, entry, resolve, descend));
        let mut stream = stream::iter(fetches).buffered(self.max_in_flight);
        let mut results: Vec<FetchedExpansion> = Vec::new();
        while let Some(fetched) = stream.next().await {
            // A fatal remote error discards the whole uncommitted level;
            // the last checkpoint stays valid for resume.
            results.push(fetched?);
        }
        drop(stream);

        // Apply phase: single writer over registry and frontiers.
        for fetched in results {
            self.apply_expansion(fetched, distance).await?;
        }
        Ok(())
    }

    async fn apply_expansion(&mut self, fetched: FetchedExpansion, distance: u32) -> Result<()> {
        let entry = fetched.entry;
        // Exclusions are scoped to the entry's own head, not global.
        let exclude = self
            .directives
            .get(&entry.head_id)
            .map(|d| d.descendants_exclude.clone())
            .unwrap_or_default();

        match entry.kind {
            FrontierKind::Primary => {
                if let Some(properties) = fetched.properties {
                    self.registry.apply_properties(&entry.id, properties);
                }
                for neighbor in &fetched.neighbors {
                    self.admit_primary(neighbor, &entry.head_id, distance + 1, &exclude);
                }
            }
            FrontierKind::Secondary => {
                if let Some(primary) = fetched.mapped {
                    if exclude.contains(&primary) {
                        log::debug!("Excluded crosswalk result {} (head {})", primary, entry.head_id);
                    } else {
                        self.registry.seed(&primary, Some(&entry.head_id));
                        self.registry.flesh_out(&primary, &self.lookup).await?;
                    }
                } else {
                    log::warn!("No primary concept for secondary id {}", entry.id);
                }
                for child in &fetched.neighbors {
                    self.frontiers.enqueue(
                        child,
                        &entry.head_id,
                        distance + 1,
                        FrontierKind::Secondary,
                        &self.registry,
                        &exclude,
                    );
                }
            }
        }
        Ok(())
    }

    /// Whether the head's own depth cap still permits discovery below
    /// `distance`. Heads without a cap defer to the global distance bound.
    fn head_depth_allows(&self, head_id: &str, distance: u32) -> bool {
        self.directives
            .get(head_id)
            .and_then(|d| d.max_depth)
            .map_or(true, |cap| distance < cap)
    }

    /// Enqueue-then-seed: the registry insert directly after a successful
    /// enqueue is what upholds the monotone-discovery invariant.
    fn admit_primary(
        &mut self,
        id: &str,
        head: &str,
        distance: u32,
        exclude: &BTreeSet<String>,
    ) -> bool {
        let accepted = self.frontiers.enqueue(
            id,
            head,
            distance,
            FrontierKind::Primary,
            &self.registry,
            exclude,
        );
        if accepted {
            self.registry.seed(id, Some(head));
        }
        accepted
    }

    fn restore(&mut self, snapshot: TraversalSnapshot) {
        self.directives = snapshot.directives;
        self.registry = snapshot.registry;
        self.frontiers = snapshot.frontiers;
    }

    fn save_checkpoint(&self, key: &CheckpointKey, distance: u32) -> Result<()> {
        if let Some(store) = &self.checkpoints {
            store.save(
                key,
                &TraversalSnapshot {
                    directives: self.directives.clone(),
                    registry: self.registry.clone(),
                    frontiers: self.frontiers.clone(),
                    distance,
                    saved_at: Utc::now(),
                },
            )?;
        }
        Ok(())
    }
}

/// Issue every remote query one frontier entry needs. Pure fetch: no shared
/// state is touched, so these run concurrently within a level.
async fn fetch_expansion<L: RemoteLookup + ?Sized>(
    lookup: &L,
    entry: FrontierEntry,
    resolve: bool,
    descend: bool,
) -> Result<FetchedExpansion> {
    match entry.kind {
        FrontierKind::Primary => {
            let properties = if resolve {
                Some(ConceptProperties::fetch(lookup, &entry.id).await?)
            } else {
                None
            };
            let neighbors = if descend {
                lookup.relation(&entry.id, RelationKind::Broader).await?
            } else {
                BTreeSet::new()
            };
            Ok(FetchedExpansion {
                entry,
                properties,
                mapped: None,
                neighbors,
            })
        }
        FrontierKind::Secondary => {
            let mapped = lookup.primary_id(&entry.id).await?;
            let neighbors = if descend {
                lookup
                    .secondary_hierarchy(&entry.id, HierarchyDirection::Children)
                    .await?
            } else {
                BTreeSet::new()
            };
            Ok(FetchedExpansion {
                entry,
                properties: None,
                mapped,
                neighbors,
            })
        }
    }
}
