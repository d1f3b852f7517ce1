//! Problem-list seed loader: one tab-separated row per seed concept. The
//! medication layout, with its drug-vocabulary columns, lives in
//! `crate::medication`.
//!
//! Column layout (header row skipped):
//!   0 description            skip the row when empty
//!   1 seed concept id
//!   2 include parents?       yes / no / some
//!   3 parents to include     comma-separated, used when column 2 is "some"
//!   4 include related-other? yes / no
//!   5 related-other ids to exclude
//!   6 secondary-ontology seed ids
//!   7 include secondary ancestors?  yes / no / some
//!   8 secondary ancestors to include, used when column 7 is "some"
//!   9 descendant ids to exclude

use crate::directive::{parse_yes_no, IncludeFlag, TraversalDirective};
use crate::error::{Result, TermgraphError};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

/// Split a comma-separated id cell, trimming whitespace and stray quotes.
pub(crate) fn split_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_matches('"').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Cell accessor tolerant of rows with trailing columns omitted.
pub(crate) fn col<'a>(cols: &'a [&str], idx: usize) -> &'a str {
    cols.get(idx).copied().unwrap_or("")
}

/// Load traversal directives from a seed TSV file.
pub fn load_directives(path: &Path) -> Result<Vec<TraversalDirective>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TermgraphError::Seed(format!("Cannot read seed file {}: {}", path.display(), e))
    })?;
    let directives = parse_directives(&contents);
    if directives.is_empty() {
        return Err(TermgraphError::Seed(format!(
            "No usable seed rows in {}",
            path.display()
        )));
    }
    log::info!("Loaded {} seed directives from {}", directives.len(), path.display());
    Ok(directives)
}

/// Parse seed rows from TSV text. The first line is a header and is skipped;
/// malformed rows are skipped with a warning rather than aborting the load.
pub fn parse_directives(contents: &str) -> Vec<TraversalDirective> {
    // Ids stay opaque; the shape checks are warn-only tripwires for rows
    // where columns slipped out of alignment.
    let primary_shape = Regex::new(r"^C\d{7}$").expect("Invalid regex pattern");
    let secondary_shape = Regex::new(r"^\d+$").expect("Invalid regex pattern");
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
        if !primary_shape.is_match(head_id) {
            log::warn!(
                "Row {}: concept id '{}' does not look like a primary concept id",
                line_no + 1,
                head_id
            );
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
        directive.include_parents = IncludeFlag::parse(col(&cols, 2), "include-parents");
        if directive.include_parents == IncludeFlag::Some {
            directive.parents_include = split_id_list(col(&cols, 3));
        }
        directive.include_related = parse_yes_no(col(&cols, 4), "include-related-other");
        if directive.include_related {
            directive.related_exclude = split_id_list(col(&cols, 5));
        }
        directive.secondary_seeds = split_id_list(col(&cols, 6));
        for secondary_id in &directive.secondary_seeds {
            if !secondary_shape.is_match(secondary_id) {
                log::warn!(
                    "Row {}: secondary id '{}' does not look like a secondary concept id",
                    line_no + 1,
                    secondary_id
                );
            }
        }
        directive.include_secondary_parents =
            IncludeFlag::parse(col(&cols, 7), "include-secondary-ancestors");
        if directive.include_secondary_parents == IncludeFlag::Some {
            directive.secondary_parents = split_id_list(col(&cols, 8));
        }
        directive.descendants_exclude = split_id_list(col(&cols, 9)).into_iter().collect();

        directives.insert(head_id.to_string(), directive);
    }
    directives.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Description\tCUI\tInclude parents?\tParents to include\tInclude RO?\tRO to exclude\tSNOMED concepts\tInclude SNOMED ancestors?\tAncestors to include\tChildren to exclude\n";

    #[test]
    fn test_parse_basic_row() {
        let tsv = format!(
            "{}Asthma\tC0004096\tno\t\tno\t\t\tno\t\tC0264408, C0340067\n",
            HEADER
        );
        let directives = parse_directives(&tsv);
        assert_eq!(directives.len(), 1);
        let d = &directives[0];
        assert_eq!(d.head_id, "C0004096");
        assert_eq!(d.include_parents, IncludeFlag::No);
        assert!(!d.include_related);
        assert!(d.descendants_exclude.contains("C0264408"));
        assert!(d.descendants_exclude.contains("C0340067"));
    }

    #[test]
    fn test_parse_some_parents_reads_include_list() {
        let tsv = format!(
            "{}Diabetes\tC0011849\tsome\t\"C0011847\", C0011860\tyes\tC0342257\t\tno\t\t\n",
            HEADER
        );
        let directives = parse_directives(&tsv);
        let d = &directives[0];
        assert_eq!(d.include_parents, IncludeFlag::Some);
        assert_eq!(d.parents_include, vec!["C0011847", "C0011860"]);
        assert!(d.include_related);
        assert_eq!(d.related_exclude, vec!["C0342257"]);
    }

    #[test]
    fn test_parse_secondary_columns() {
        let tsv = format!(
            "{}Hypertension\tC0020538\tno\t\tno\t\t38341003, 59621000\tsome\t64572001\t\n",
            HEADER
        );
        let directives = parse_directives(&tsv);
        let d = &directives[0];
        assert_eq!(d.secondary_seeds, vec!["38341003", "59621000"]);
        assert_eq!(d.include_secondary_parents, IncludeFlag::Some);
        assert_eq!(d.secondary_parents, vec!["64572001"]);
    }

    #[test]
    fn test_rows_without_description_are_skipped() {
        let tsv = format!("{}\tC0004096\tno\t\tno\t\t\tno\t\t\n", HEADER);
        assert!(parse_directives(&tsv).is_empty());
    }

    #[test]
    fn test_short_rows_get_empty_trailing_columns() {
        let tsv = format!("{}Asthma\tC0004096\n", HEADER);
        let directives = parse_directives(&tsv);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].include_parents, IncludeFlag::No);
        assert!(directives[0].descendants_exclude.is_empty());
    }

    #[test]
    fn test_duplicate_seed_keeps_first() {
        let tsv = format!(
            "{}Asthma\tC0004096\tyes\t\tno\t\t\tno\t\t\nAsthma again\tC0004096\tno\t\tno\t\t\tno\t\t\n",
            HEADER
        );
        let directives = parse_directives(&tsv);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].include_parents, IncludeFlag::Yes);
    }

    #[test]
    fn test_load_directives_rejects_empty_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", HEADER).unwrap();
        let result = load_directives(file.path());
        assert!(matches!(result, Err(TermgraphError::Seed(_))));
    }

    #[test]
    fn test_load_directives_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "{}Asthma\tC0004096\tno\t\tno\t\t\tno\t\t\n",
            HEADER
        )
        .unwrap();
        let directives = load_directives(file.path()).unwrap();
        assert_eq!(directives.len(), 1);
    }
}
