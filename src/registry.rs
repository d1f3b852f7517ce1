//! The concept registry: single source of truth for "already discovered".
//!
//! Every concept carries an explicit resolution state so "resolved but empty"
//! and "not yet looked up" are distinguishable by type. Resolution happens at
//! most once per concept for the lifetime of a run, which is what keeps a
//! multi-hour traversal from re-issuing remote calls.

use crate::error::Result;
use crate::remote::RemoteLookup;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Property bundle fetched from the remote service for one concept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptProperties {
    pub preferred_term: Option<String>,
    pub semantic_types: BTreeSet<String>,
    pub variant_terms: BTreeSet<String>,
}

impl ConceptProperties {
    /// Fetch the full property bundle for `id`.
    ///
    /// A missing preferred term means the service has no usable entry; the
    /// type and variant queries are skipped in that case, matching the
    /// "no data" sentinel the registry records.
    pub async fn fetch<L: RemoteLookup + ?Sized>(lookup: &L, id: &str) -> Result<Self> {
        let preferred_term = lookup.preferred_term(id).await?;
        if preferred_term.is_none() {
            return Ok(ConceptProperties::default());
        }
        let semantic_types = lookup.semantic_types(id).await?;
        let variant_terms = lookup.english_variants(id).await?;
        Ok(ConceptProperties {
            preferred_term,
            semantic_types,
            variant_terms,
        })
    }
}

/// Resolution state of a concept record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConceptState {
    /// Seeded but not yet looked up remotely.
    Unresolved,
    /// Looked up exactly once. Empty fields mean "checked, no result".
    Resolved {
        preferred_term: String,
        semantic_types: BTreeSet<String>,
        variant_terms: BTreeSet<String>,
    },
}

/// One entry in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    /// Seed this concept was discovered from. First assignment wins; a
    /// concept reached from two seeds keeps the first. None on heads.
    pub head_id: Option<String>,
    /// Concept ids discovered from this head (populated on heads only).
    pub related_ids: BTreeSet<String>,
    pub state: ConceptState,
}

impl Concept {
    fn new(head_id: Option<String>) -> Self {
        Concept {
            head_id,
            related_ids: BTreeSet::new(),
            state: ConceptState::Unresolved,
        }
    }

    /// Preferred term if resolved, empty string otherwise.
    pub fn preferred_term(&self) -> &str {
        match &self.state {
            ConceptState::Resolved { preferred_term, .. } => preferred_term,
            ConceptState::Unresolved => "",
        }
    }

    /// Semantic types joined for rendering; empty when unresolved or unknown.
    pub fn semantic_types_joined(&self) -> String {
        match &self.state {
            ConceptState::Resolved { semantic_types, .. } => {
                semantic_types.iter().cloned().collect::<Vec<_>>().join(";")
            }
            ConceptState::Unresolved => String::new(),
        }
    }

    pub fn variant_terms(&self) -> Option<&BTreeSet<String>> {
        match &self.state {
            ConceptState::Resolved { variant_terms, .. } => Some(variant_terms),
            ConceptState::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, ConceptState::Resolved { .. })
    }
}

/// In-memory (and checkpoint-persisted) concept-id → record map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptRegistry {
    concepts: BTreeMap<String, Concept>,
}

impl ConceptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an empty record for `id` if absent. If `head` is given and the
    /// id is new, record the provenance link and add the id to the head's
    /// related set. Returns whether the id was newly created; a second call
    /// for the same id is a no-op.
    pub fn seed(&mut self, id: &str, head: Option<&str>) -> bool {
        if self.concepts.contains_key(id) {
            return false;
        }
        log::debug!(
            "Seeding concept {} (total concepts = {}, head = {:?})",
            id,
            self.concepts.len(),
            head
        );
        self.concepts
            .insert(id.to_string(), Concept::new(head.map(String::from)));
        if let Some(head_id) = head {
            match self.concepts.get_mut(head_id) {
                Some(head_concept) => {
                    head_concept.related_ids.insert(id.to_string());
                }
                None => log::warn!("Missing head concept: {}", head_id),
            }
        }
        true
    }

    pub fn is_known(&self, id: &str) -> bool {
        self.concepts.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Concept> {
        self.concepts.get(id)
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Whether `id` is seeded but not yet resolved.
    pub fn needs_resolution(&self, id: &str) -> bool {
        self.concepts
            .get(id)
            .map(|c| !c.is_resolved())
            .unwrap_or(false)
    }

    /// Mark `id` resolved with the fetched properties. A bundle with no
    /// preferred term records the empty sentinels, so the id is never
    /// re-queried. No-op once resolved (first resolution wins).
    pub fn apply_properties(&mut self, id: &str, props: ConceptProperties) {
        let Some(concept) = self.concepts.get_mut(id) else {
            log::warn!("Concept '{}' was never seeded. Skipping", id);
            return;
        };
        if concept.is_resolved() {
            return;
        }
        concept.state = ConceptState::Resolved {
            preferred_term: props.preferred_term.unwrap_or_default(),
            semantic_types: props.semantic_types,
            variant_terms: props.variant_terms,
        };
    }

    /// Resolve `id` via the remote lookup, at most once per run.
    ///
    /// Unseeded ids warn and are skipped; resolved ids return without any
    /// remote call. A "no data" answer still marks the record resolved.
    pub async fn flesh_out<L: RemoteLookup + ?Sized>(&mut self, id: &str, lookup: &L) -> Result<()> {
        let Some(concept) = self.concepts.get(id) else {
            log::warn!("Concept '{}' was never seeded. Skipping", id);
            return Ok(());
        };
        if concept.is_resolved() {
            return Ok(());
        }
        log::debug!("Fleshing out {} (total concepts = {})", id, self.concepts.len());
        let props = ConceptProperties::fetch(lookup, id).await?;
        self.apply_properties(id, props);
        Ok(())
    }

    /// Iterate all records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Concept)> {
        self.concepts.iter()
    }

    /// Ids of head concepts (those with no provenance link), in order.
    pub fn head_ids(&self) -> impl Iterator<Item = &String> {
        self.concepts
            .iter()
            .filter(|(_, c)| c.head_id.is_none())
            .map(|(id, _)| id)
    }
}
