//! Registry renderers: ConceptMapper dictionary XML and tab-separated
//! term tables.

use crate::error::{Result, TermgraphError};
use crate::registry::{Concept, ConceptRegistry};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::path::Path;

/// Canonical label for a record: the preferred term, falling back to the
/// first variant. None when the record has no usable label at all.
fn canonical_label(concept: &Concept) -> Option<&str> {
    let preferred = concept.preferred_term();
    if !preferred.is_empty() {
        return Some(preferred);
    }
    concept
        .variant_terms()
        .and_then(|terms| terms.iter().next())
        .map(String::as_str)
}

/// Render the registry as a ConceptMapper synonym dictionary.
///
/// One `<token>` per labeled concept with `canonical`, `conceptId`,
/// `semanticTypes` and (for non-head concepts) `headId` attributes; one
/// `<variant base="..."/>` per variant term. Unlabeled records are skipped.
pub fn render_concept_mapper(registry: &ConceptRegistry) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let render_err = |e| TermgraphError::Render(format!("XML write failed: {}", e));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(render_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("synonym")))
        .map_err(render_err)?;

    for (id, concept) in registry.iter() {
        let Some(canonical) = canonical_label(concept) else {
            log::debug!("No terms for {}. Skipping in dictionary output", id);
            continue;
        };
        let mut token = BytesStart::new("token");
        token.push_attribute(("canonical", canonical));
        token.push_attribute(("conceptId", id.as_str()));
        let semantic_types = concept.semantic_types_joined();
        if !semantic_types.is_empty() {
            token.push_attribute(("semanticTypes", semantic_types.as_str()));
        }
        if let Some(head_id) = &concept.head_id {
            token.push_attribute(("headId", head_id.as_str()));
        }
        writer.write_event(Event::Start(token)).map_err(render_err)?;

        if let Some(terms) = concept.variant_terms() {
            for term in terms {
                let mut variant = BytesStart::new("variant");
                variant.push_attribute(("base", term.as_str()));
                writer.write_event(Event::Empty(variant)).map_err(render_err)?;
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new("token")))
            .map_err(render_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("synonym")))
        .map_err(render_err)?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| TermgraphError::Render(format!("Dictionary output is not UTF-8: {}", e)))
}

/// Render the four-column term table: concept id, variant term, preferred
/// term, semantic types. One row per variant term, concepts in id order.
pub fn render_term_table(registry: &ConceptRegistry) -> String {
    let mut out = String::new();
    for (id, concept) in registry.iter() {
        let Some(terms) = concept.variant_terms() else {
            continue;
        };
        let preferred = concept.preferred_term();
        let semantic_types = concept.semantic_types_joined();
        for term in terms {
            out.push_str(id);
            out.push('\t');
            out.push_str(term);
            out.push('\t');
            out.push_str(preferred);
            out.push('\t');
            out.push_str(&semantic_types);
            out.push('\n');
        }
    }
    out
}

/// Render seed-to-concept provenance pairs, one `head<TAB>concept` row per
/// non-head record.
pub fn render_provenance_pairs(registry: &ConceptRegistry) -> String {
    let mut out = String::new();
    for (id, concept) in registry.iter() {
        if let Some(head_id) = &concept.head_id {
            out.push_str(head_id);
            out.push('\t');
            out.push_str(id);
            out.push('\n');
        }
    }
    out
}

pub fn write_concept_mapper(registry: &ConceptRegistry, path: &Path) -> Result<()> {
    let xml = render_concept_mapper(registry)?;
    std::fs::write(path, xml)?;
    log::info!("Wrote ConceptMapper dictionary to {}", path.display());
    Ok(())
}

pub fn write_term_table(registry: &ConceptRegistry, path: &Path) -> Result<()> {
    std::fs::write(path, render_term_table(registry))?;
    log::info!("Wrote term table to {}", path.display());
    Ok(())
}

pub fn write_provenance_pairs(registry: &ConceptRegistry, path: &Path) -> Result<()> {
    std::fs::write(path, render_provenance_pairs(registry))?;
    log::info!("Wrote provenance pairs to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConceptProperties;
    use std::collections::BTreeSet;

    fn sample_registry() -> ConceptRegistry {
        let mut registry = ConceptRegistry::new();
        registry.seed("C0004096", None);
        registry.seed("C0264408", Some("C0004096"));
        registry.apply_properties(
            "C0004096",
            ConceptProperties {
                preferred_term: Some("Asthma".to_string()),
                semantic_types: ["T047".to_string()].into_iter().collect(),
                variant_terms: ["Asthma".to_string(), "Asthma, Bronchial".to_string()]
                    .into_iter()
                    .collect(),
            },
        );
        registry.apply_properties(
            "C0264408",
            ConceptProperties {
                preferred_term: Some("Childhood asthma".to_string()),
                semantic_types: ["T047".to_string()].into_iter().collect(),
                variant_terms: ["Childhood asthma".to_string()].into_iter().collect(),
            },
        );
        registry
    }

    #[test]
    fn test_concept_mapper_structure() {
        let xml = render_concept_mapper(&sample_registry()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<synonym>"));
        assert!(xml.contains("canonical=\"Asthma\""));
        assert!(xml.contains("conceptId=\"C0004096\""));
        assert!(xml.contains("semanticTypes=\"T047\""));
        assert!(xml.contains("headId=\"C0004096\""));
        assert!(xml.contains("<variant base=\"Asthma, Bronchial\"/>"));
        assert!(xml.ends_with("</synonym>"));
    }

    #[test]
    fn test_concept_mapper_escapes_attribute_values() {
        let mut registry = ConceptRegistry::new();
        registry.seed("C0000001", None);
        registry.apply_properties(
            "C0000001",
            ConceptProperties {
                preferred_term: Some("Barrett's \"esophagus\" & more".to_string()),
                semantic_types: BTreeSet::new(),
                variant_terms: ["a<b".to_string()].into_iter().collect(),
            },
        );
        let xml = render_concept_mapper(&registry).unwrap();
        assert!(xml.contains("&quot;esophagus&quot; &amp; more"));
        assert!(xml.contains("base=\"a&lt;b\""));
    }

    #[test]
    fn test_concept_mapper_skips_unlabeled_records() {
        let mut registry = ConceptRegistry::new();
        registry.seed("C0000404", None);
        registry.apply_properties("C0000404", ConceptProperties::default());
        let xml = render_concept_mapper(&registry).unwrap();
        assert!(!xml.contains("C0000404"));
    }

    #[test]
    fn test_concept_mapper_falls_back_to_first_variant() {
        let mut registry = ConceptRegistry::new();
        registry.seed("C0000002", None);
        registry.apply_properties(
            "C0000002",
            ConceptProperties {
                preferred_term: None,
                semantic_types: BTreeSet::new(),
                variant_terms: ["Fallback term".to_string()].into_iter().collect(),
            },
        );
        let xml = render_concept_mapper(&registry).unwrap();
        assert!(xml.contains("canonical=\"Fallback term\""));
    }

    #[test]
    fn test_term_table_rows() {
        let table = render_term_table(&sample_registry());
        let rows: Vec<&str> = table.lines().collect();
        assert_eq!(
            rows,
            vec![
                "C0004096\tAsthma\tAsthma\tT047",
                "C0004096\tAsthma, Bronchial\tAsthma\tT047",
                "C0264408\tChildhood asthma\tChildhood asthma\tT047",
            ]
        );
    }

    #[test]
    fn test_term_table_skips_unresolved() {
        let mut registry = sample_registry();
        registry.seed("C0999999", Some("C0004096"));
        let table = render_term_table(&registry);
        assert!(!table.contains("C0999999"));
    }

    #[test]
    fn test_provenance_pairs() {
        let pairs = render_provenance_pairs(&sample_registry());
        assert_eq!(pairs, "C0004096\tC0264408\n");
    }
}
