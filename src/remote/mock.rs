//! In-memory `RemoteLookup` and `DrugLookup` for engine, registry and seed
//! loader tests.

use super::{DrugLookup, DrugRelation, HierarchyDirection, RelationKind, RemoteLookup};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

/// Scripted lookup backed by maps, counting every remote call per id.
#[derive(Default)]
pub struct MockLookup {
    terms: BTreeMap<String, String>,
    types: BTreeMap<String, BTreeSet<String>>,
    variants: BTreeMap<String, BTreeSet<String>>,
    relations: BTreeMap<(String, RelationKind), BTreeSet<String>>,
    children: BTreeMap<String, BTreeSet<String>>,
    parents: BTreeMap<String, BTreeSet<String>>,
    crosswalk: BTreeMap<String, String>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_term(mut self, id: &str, term: &str) -> Self {
        self.terms.insert(id.to_string(), term.to_string());
        self.types
            .insert(id.to_string(), [format!("T{}", id.len())].into_iter().collect());
        self.variants.insert(
            id.to_string(),
            [term.to_string(), format!("{} (variant)", term)].into_iter().collect(),
        );
        self
    }

    pub fn with_relation(mut self, id: &str, kind: RelationKind, targets: &[&str]) -> Self {
        self.relations.insert(
            (id.to_string(), kind),
            targets.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn with_secondary_children(mut self, id: &str, children: &[&str]) -> Self {
        self.children.insert(
            id.to_string(),
            children.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn with_secondary_parents(mut self, id: &str, parents: &[&str]) -> Self {
        self.parents.insert(
            id.to_string(),
            parents.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn with_crosswalk(mut self, secondary_id: &str, primary_id: &str) -> Self {
        self.crosswalk
            .insert(secondary_id.to_string(), primary_id.to_string());
        self
    }

    fn record(&self, op: &str, id: &str) {
        let mut calls = self.calls.lock().unwrap();
        *calls.entry(format!("{}:{}", op, id)).or_insert(0) += 1;
    }

    /// Number of remote calls issued for `op` against `id`.
    pub fn call_count(&self, op: &str, id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&format!("{}:{}", op, id))
            .copied()
            .unwrap_or(0)
    }

    /// Total remote calls issued across all operations.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl RemoteLookup for MockLookup {
    async fn preferred_term(&self, id: &str) -> Result<Option<String>> {
        self.record("term", id);
        Ok(self.terms.get(id).cloned())
    }

    async fn semantic_types(&self, id: &str) -> Result<BTreeSet<String>> {
        self.record("types", id);
        Ok(self.types.get(id).cloned().unwrap_or_default())
    }

    async fn english_variants(&self, id: &str) -> Result<BTreeSet<String>> {
        self.record("variants", id);
        Ok(self.variants.get(id).cloned().unwrap_or_default())
    }

    async fn relation(&self, id: &str, kind: RelationKind) -> Result<BTreeSet<String>> {
        self.record("relation", id);
        Ok(self
            .relations
            .get(&(id.to_string(), kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn secondary_hierarchy(
        &self,
        id: &str,
        direction: HierarchyDirection,
    ) -> Result<BTreeSet<String>> {
        self.record("secondary", id);
        let map = match direction {
            HierarchyDirection::Children => &self.children,
            HierarchyDirection::Parents => &self.parents,
        };
        Ok(map.get(id).cloned().unwrap_or_default())
    }

    async fn primary_id(&self, secondary_id: &str) -> Result<Option<String>> {
        self.record("crosswalk", secondary_id);
        Ok(self.crosswalk.get(secondary_id).cloned())
    }
}

/// Scripted drug-vocabulary lookup for medication seed tests.
#[derive(Default)]
pub struct MockDrugLookup {
    related: BTreeMap<(String, DrugRelation), BTreeSet<String>>,
    primary: BTreeMap<String, BTreeSet<String>>,
    members: BTreeMap<String, BTreeSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockDrugLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_related(mut self, id: &str, relation: DrugRelation, targets: &[&str]) -> Self {
        self.related.insert(
            (id.to_string(), relation),
            targets.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn with_primary_ids(mut self, id: &str, primary: &[&str]) -> Self {
        self.primary.insert(
            id.to_string(),
            primary.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn with_class_members(mut self, class_id: &str, members: &[&str]) -> Self {
        self.members.insert(
            class_id.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    fn record(&self, op: &str, id: &str) {
        let mut calls = self.calls.lock().unwrap();
        *calls.entry(format!("{}:{}", op, id)).or_insert(0) += 1;
    }

    pub fn call_count(&self, op: &str, id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&format!("{}:{}", op, id))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl DrugLookup for MockDrugLookup {
    async fn related_concepts(
        &self,
        drug_id: &str,
        relation: DrugRelation,
    ) -> Result<BTreeSet<String>> {
        self.record("related", drug_id);
        Ok(self
            .related
            .get(&(drug_id.to_string(), relation))
            .cloned()
            .unwrap_or_default())
    }

    async fn primary_ids(&self, drug_id: &str) -> Result<BTreeSet<String>> {
        self.record("primary", drug_id);
        Ok(self.primary.get(drug_id).cloned().unwrap_or_default())
    }

    async fn class_members(&self, class_id: &str) -> Result<BTreeSet<String>> {
        self.record("members", class_id);
        Ok(self.members.get(class_id).cloned().unwrap_or_default())
    }
}
