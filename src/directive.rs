//! Per-seed traversal directives: which relations to follow and what to exclude.
//!
//! A directive is produced once by a seed loader (see `crate::seeds`) and is
//! read-only for the rest of the run. All entry points feed this one canonical
//! shape; format differences live in the loaders.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Three-state flag for relation families that support an explicit include list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncludeFlag {
    /// Follow the relation for every remote result.
    Yes,
    /// Do not follow the relation.
    No,
    /// Follow only the ids in the directive's explicit include list.
    Some,
}

impl IncludeFlag {
    /// Parse a spreadsheet flag cell. Unrecognized values warn and default to
    /// `No` rather than aborting the run over one bad row.
    pub fn parse(raw: &str, context: &str) -> IncludeFlag {
        match raw.trim().to_lowercase().as_str() {
            "yes" => IncludeFlag::Yes,
            "no" | "" => IncludeFlag::No,
            "some" => IncludeFlag::Some,
            other => {
                log::warn!("Unrecognized {} flag: '{}' (treating as no)", context, other);
                IncludeFlag::No
            }
        }
    }
}

/// Parse a yes/no flag cell for relation families without an include list.
pub fn parse_yes_no(raw: &str, context: &str) -> bool {
    match raw.trim().to_lowercase().as_str() {
        "yes" => true,
        "no" | "" => false,
        other => {
            log::warn!("Unrecognized {} flag: '{}' (treating as no)", context, other);
            false
        }
    }
}

/// Traversal configuration for one seed concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalDirective {
    /// The seed concept id this directive governs.
    pub head_id: String,
    /// Whether to pull the seed's parents (narrower-than relation).
    pub include_parents: IncludeFlag,
    /// Explicit parent ids, used when `include_parents` is `Some`.
    pub parents_include: Vec<String>,
    /// Whether to pull the seed's related-other concepts.
    pub include_related: bool,
    /// Related-other ids to skip even when `include_related` is set.
    pub related_exclude: Vec<String>,
    /// Descendants never admitted into this seed's subtree, at any distance.
    pub descendants_exclude: BTreeSet<String>,
    /// Concept ids admitted directly under this seed at distance 1 without a
    /// remote relation query (e.g. drug-vocabulary expansions resolved while
    /// the seed file was loaded).
    #[serde(default)]
    pub descendants_include: Vec<String>,
    /// Per-seed cap on how far below the seed discovery reaches. `None`
    /// defers to the engine-wide distance bound.
    #[serde(default)]
    pub max_depth: Option<u32>,
    /// Secondary-ontology ids whose hierarchy is walked from this seed.
    pub secondary_seeds: Vec<String>,
    /// Whether to also walk upward from the secondary seeds.
    pub include_secondary_parents: IncludeFlag,
    /// Explicit secondary ancestor ids, used when `include_secondary_parents`
    /// is `Some`.
    pub secondary_parents: Vec<String>,
}

impl TraversalDirective {
    /// A directive that expands descendants only (the unconditional axis).
    pub fn descendants_only(head_id: impl Into<String>) -> Self {
        TraversalDirective {
            head_id: head_id.into(),
            include_parents: IncludeFlag::No,
            parents_include: Vec::new(),
            include_related: false,
            related_exclude: Vec::new(),
            descendants_exclude: BTreeSet::new(),
            descendants_include: Vec::new(),
            max_depth: None,
            secondary_seeds: Vec::new(),
            include_secondary_parents: IncludeFlag::No,
            secondary_parents: Vec::new(),
        }
    }

    /// Whether `id` is barred from this seed's subtree.
    pub fn excludes(&self, id: &str) -> bool {
        self.descendants_exclude.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_flag_parse() {
        assert_eq!(IncludeFlag::parse("yes", "test"), IncludeFlag::Yes);
        assert_eq!(IncludeFlag::parse("Yes", "test"), IncludeFlag::Yes);
        assert_eq!(IncludeFlag::parse("no", "test"), IncludeFlag::No);
        assert_eq!(IncludeFlag::parse("", "test"), IncludeFlag::No);
        assert_eq!(IncludeFlag::parse("SOME", "test"), IncludeFlag::Some);
    }

    #[test]
    fn test_include_flag_unrecognized_defaults_to_no() {
        assert_eq!(IncludeFlag::parse("maybe", "test"), IncludeFlag::No);
        assert_eq!(IncludeFlag::parse("1", "test"), IncludeFlag::No);
    }

    #[test]
    fn test_parse_yes_no() {
        assert!(parse_yes_no("yes", "test"));
        assert!(!parse_yes_no("no", "test"));
        assert!(!parse_yes_no("", "test"));
        // "some" is not valid for yes/no flags: warn and fall back to no
        assert!(!parse_yes_no("some", "test"));
    }

    #[test]
    fn test_snapshot_json_without_optional_fields() {
        // Snapshots written before the include-list/depth-cap fields existed
        // must still load.
        let json = r#"{
            "head_id": "C0000001",
            "include_parents": "No",
            "parents_include": [],
            "include_related": false,
            "related_exclude": [],
            "descendants_exclude": [],
            "secondary_seeds": [],
            "include_secondary_parents": "No",
            "secondary_parents": []
        }"#;
        let directive: TraversalDirective = serde_json::from_str(json).unwrap();
        assert!(directive.descendants_include.is_empty());
        assert_eq!(directive.max_depth, None);
    }

    #[test]
    fn test_excludes() {
        let mut directive = TraversalDirective::descendants_only("C0000001");
        directive.descendants_exclude.insert("C0000002".to_string());
        assert!(directive.excludes("C0000002"));
        assert!(!directive.excludes("C0000003"));
    }
}
