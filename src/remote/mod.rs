//! Abstract lookup interface over the remote vocabulary service.
//!
//! The traversal engine depends only on this trait; transport, pagination,
//! and session handling live behind it in the concrete client.

pub mod rxnav;
pub mod uts;

#[cfg(test)]
pub mod mock;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

pub use rxnav::RxNavClient;
pub use uts::UtsClient;

/// Relation families of the primary vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelationKind {
    /// The related concept is narrower; following it yields parents.
    Narrower,
    /// The related concept is broader; following it yields descendants.
    Broader,
    /// Related-other: associative links outside the hierarchy.
    RelatedOther,
}

/// Directions in the secondary ontology's hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyDirection {
    Parents,
    Children,
}

/// Atomic concept-property and relation queries against the remote service.
///
/// Every operation may return an empty result meaning "queried, nothing
/// found" — never conflated with "not queried". Transient per-identifier
/// failures are absorbed by implementations (empty result, warning logged);
/// an `Err` signals a persistent transport failure and is fatal to the run.
#[async_trait]
pub trait RemoteLookup: Send + Sync {
    /// The concept's preferred label, or None if the service has no entry.
    async fn preferred_term(&self, id: &str) -> Result<Option<String>>;

    /// All semantic type identifiers assigned to the concept.
    async fn semantic_types(&self, id: &str) -> Result<BTreeSet<String>>;

    /// The concept's English synonym set.
    async fn english_variants(&self, id: &str) -> Result<BTreeSet<String>>;

    /// Concept ids linked from `id` by the given relation family.
    async fn relation(&self, id: &str, kind: RelationKind) -> Result<BTreeSet<String>>;

    /// Ids one step up or down the secondary ontology's hierarchy.
    async fn secondary_hierarchy(
        &self,
        id: &str,
        direction: HierarchyDirection,
    ) -> Result<BTreeSet<String>>;

    /// Crosswalk a secondary-ontology id into the primary identifier space.
    async fn primary_id(&self, secondary_id: &str) -> Result<Option<String>>;
}

/// Relation families of the drug vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DrugRelation {
    /// Brand-name concepts for a drug.
    Brand,
    /// Active-ingredient concepts, single and multiple.
    Ingredient,
}

/// Drug-vocabulary queries used while loading medication seeds.
///
/// `related_concepts` and `primary_ids` return ids already crosswalked into
/// the primary vocabulary; `class_members` stays in the drug-vocabulary id
/// space. As with `RemoteLookup`, empty means "queried, nothing found" and
/// `Err` is a persistent transport failure.
#[async_trait]
pub trait DrugLookup: Send + Sync {
    /// Primary ids of the drug concepts related to `drug_id`.
    async fn related_concepts(
        &self,
        drug_id: &str,
        relation: DrugRelation,
    ) -> Result<BTreeSet<String>>;

    /// Crosswalk a drug-vocabulary id into the primary identifier space. A
    /// drug concept can map to more than one primary concept.
    async fn primary_ids(&self, drug_id: &str) -> Result<BTreeSet<String>>;

    /// Drug-vocabulary ids belonging to a drug class.
    async fn class_members(&self, class_id: &str) -> Result<BTreeSet<String>>;
}
