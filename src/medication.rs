//! Medication seed loader: one tab-separated row per drug seed concept.
//!
//! Unlike the problem-list layout in `crate::seeds`, medication rows carry
//! drug-vocabulary columns. Those are resolved against the drug service while
//! the file loads, so the returned directives are plain `TraversalDirective`s
//! the engine expands like any other seed: the resolved drug concepts become
//! the directive's load-time include list, and the children-of-children flag
//! becomes a per-seed depth cap.
//!
//! Column layout (header row skipped):
//!   0 description                     skip the row when empty
//!   1 seed concept id
//!   2 include parents?                yes / no / some
//!   3 parents or related to include   shared by columns 2 and 4 when "some"
//!   4 include related-other?          yes / no / some
//!   5 include children of children?   yes / no
//!   6 secondary-ontology seed ids
//!   7 drug-vocabulary ids             all-digit cells are drug concept ids,
//!                                     anything else is a drug-class id
//!   8 include drug ancestors?         accepted for sheet compatibility,
//!                                     not followed
//!   9 descendant ids to exclude

use crate::directive::{parse_yes_no, IncludeFlag, TraversalDirective};
use crate::error::{Result, TermgraphError};
use crate::remote::{DrugLookup, DrugRelation};
use crate::seeds::{col, split_id_list};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Load medication directives from a seed TSV file, resolving the
/// drug-vocabulary columns through `drug`.
pub async fn load_medication_directives<D: DrugLookup>(
    path: &Path,
    drug: &D,
) -> Result<Vec<TraversalDirective>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TermgraphError::Seed(format!("Cannot read seed file {}: {}", path.display(), e))
    })?;
    let directives = parse_medication_directives(&contents, drug).await?;
    if directives.is_empty() {
        return Err(TermgraphError::Seed(format!(
            "No usable seed rows in {}",
            path.display()
        )));
    }
    log::info!(
        "Loaded {} medication directives from {}",
        directives.len(),
        path.display()
    );
    Ok(directives)
}

/// Parse medication rows from TSV text. The first line is a header and is
/// skipped; malformed rows are skipped with a warning rather than aborting
/// the load. Drug-vocabulary lookups happen here, so a persistent transport
/// failure fails the load before any traversal starts.
pub async fn parse_medication_directives<D: DrugLookup>(
    contents: &str,
    drug: &D,
) -> Result<Vec<TraversalDirective>> {
    let mut directives: BTreeMap<String, TraversalDirective> = BTreeMap::new();
    for (line_no, line) in contents.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        let description = col(&cols, 0).trim();
        if description.is_empty() {
            continue;
        }
        let head_id = col(&cols, 1).trim();
        if head_id.is_empty() {
            log::warn!("Row {}: '{}' has no concept id. Skipping", line_no + 1, description);
            continue;
        }
        if directives.contains_key(head_id) {
            log::warn!(
                "Row {}: duplicate seed {}. Keeping the first occurrence",
                line_no + 1,
                head_id
            );
            continue;
        }

        let mut directive = TraversalDirective::descendants_only(head_id);
        // Columns 2 and 4 share the include list in column 3.
        let shared_include = split_id_list(col(&cols, 3));
        directive.include_parents = IncludeFlag::parse(col(&cols, 2), "include-parents");
        if directive.include_parents == IncludeFlag::Some {
            directive.parents_include = shared_include.clone();
        }
        match IncludeFlag::parse(col(&cols, 4), "include-related-other") {
            IncludeFlag::Yes => directive.include_related = true,
            IncludeFlag::Some => directive
                .descendants_include
                .extend(shared_include.iter().cloned()),
            IncludeFlag::No => {}
        }
        // Children are always pulled; grandchildren only on request, and
        // never anything deeper.
        let grandchildren = parse_yes_no(col(&cols, 5), "include-children-of-children");
        directive.max_depth = Some(if grandchildren { 2 } else { 1 });
        directive.secondary_seeds = split_id_list(col(&cols, 6));
        directive.descendants_exclude = split_id_list(col(&cols, 9)).into_iter().collect();

        let drug_concepts = expand_drug_cell(&split_id_list(col(&cols, 7)), drug).await?;
        directive.descendants_include.extend(drug_concepts);

        directives.insert(head_id.to_string(), directive);
    }
    Ok(directives.into_values().collect())
}

/// Resolve the drug-vocabulary cell into primary concept ids. All-digit
/// tokens are drug concept ids used directly; other tokens are drug-class
/// ids resolved through their member list first. Each drug concept then
/// contributes its own crosswalk plus its brand and ingredient concepts.
async fn expand_drug_cell<D: DrugLookup>(
    tokens: &[String],
    drug: &D,
) -> Result<BTreeSet<String>> {
    let mut drug_ids: BTreeSet<String> = BTreeSet::new();
    for token in tokens {
        if token.chars().all(|c| c.is_ascii_digit()) {
            drug_ids.insert(token.clone());
        } else {
            let members = drug.class_members(token).await?;
            if members.is_empty() {
                log::warn!("Drug class {} has no members", token);
            }
            drug_ids.extend(members);
        }
    }

    let mut concepts = BTreeSet::new();
    for drug_id in &drug_ids {
        let mapped = drug.primary_ids(drug_id).await?;
        if mapped.is_empty() {
            log::warn!("No primary concept for drug id {}", drug_id);
        }
        concepts.extend(mapped);
        concepts.extend(drug.related_concepts(drug_id, DrugRelation::Brand).await?);
        concepts.extend(
            drug.related_concepts(drug_id, DrugRelation::Ingredient)
                .await?,
        );
    }
    Ok(concepts)
}
