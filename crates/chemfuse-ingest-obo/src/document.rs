//! Per-term ontology documents.
//!
//! The ChEBI `is_a` hierarchy has super-hub nodes (e.g. CHEBI:50860,
//! "organic molecular entity", with over 141,000 descendants and over 7,300
//! children). The 99.9% quantiles of children/parents/descendants/ancestors
//! counts are roughly 225, 8, 2187 and 86, so every family list is capped at
//! [`NODE_FAMILY_CAPACITY`] entries by default. The `num_*` fields always
//! carry the true counts.

use crate::graph::{ClosureCache, Direction, OntologyGraph};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default cap on every family list in a document.
pub const NODE_FAMILY_CAPACITY: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyConfig {
    /// Maximum ids kept in `children`/`parents`/`descendants`/`ancestors`.
    pub family_capacity: usize,
    /// Cache transitive closures per node.
    pub memoize_families: bool,
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            family_capacity: NODE_FAMILY_CAPACITY,
            memoize_families: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star: Option<u8>,

    pub num_children: usize,
    pub num_parents: usize,
    pub num_descendants: usize,
    pub num_ancestors: usize,

    pub children: Vec<String>,
    pub parents: Vec<String>,
    pub descendants: Vec<String>,
    pub ancestors: Vec<String>,
}

impl OntologyDocument {
    /// The document as a JSON object; absent optional fields are omitted.
    pub fn into_fields(self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(serde::ser::Error::custom(format!(
                "ontology document serialized to non-object: {other}"
            ))),
        }
    }
}

/// Parse `"<relation> <id>"` strings into `relation -> [id, ...]`.
///
/// Entries sharing a relation accumulate in input order. Entries without a
/// target are skipped. No entries yields `None`.
pub fn parse_relationships(values: &[String]) -> Option<BTreeMap<String, Vec<String>>> {
    let mut relationships: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for raw in values {
        let Some((relation, target)) = raw.split_once(char::is_whitespace) else {
            tracing::debug!(relationship = %raw, "skipping relationship without target");
            continue;
        };
        match relationships.get_mut(relation) {
            Some(targets) => targets.push(target.to_string()),
            None => {
                relationships.insert(relation.to_string(), vec![target.to_string()]);
            }
        }
    }
    (!relationships.is_empty()).then_some(relationships)
}

/// Star ratings curated in the ontology.
pub const STAR_RANGE: std::ops::RangeInclusive<u8> = 1..=3;

/// Star rating from the first subset token (`"<n>_STAR"`), if it is one.
pub fn parse_star(subsets: &[String]) -> Option<u8> {
    subsets
        .first()?
        .strip_suffix("_STAR")?
        .parse()
        .ok()
        .filter(|stars| STAR_RANGE.contains(stars))
}

/// Builds [`OntologyDocument`]s from a constructed [`OntologyGraph`].
#[derive(Debug)]
pub struct OntologyDocumentBuilder {
    graph: OntologyGraph,
    config: OntologyConfig,
    cache: Option<ClosureCache>,
}

impl OntologyDocumentBuilder {
    pub fn new(graph: OntologyGraph, config: OntologyConfig) -> Self {
        let cache = config.memoize_families.then(ClosureCache::new);
        Self {
            graph,
            config,
            cache,
        }
    }

    pub fn graph(&self) -> &OntologyGraph {
        &self.graph
    }

    pub fn config(&self) -> &OntologyConfig {
        &self.config
    }

    fn capped_ids(&self, nodes: impl Iterator<Item = u32>) -> Vec<String> {
        nodes
            .take(self.config.family_capacity)
            .map(|node| self.graph.id_of(node).to_string())
            .collect()
    }

    /// The ontology document for `id`, or `None` if `id` is not a graph node.
    pub fn read_ontology(&self, id: &str) -> Option<OntologyDocument> {
        let node = self.graph.index_of(id)?;
        let attrs = self.graph.node(node);

        let children = self.graph.successors(node);
        let parents = self.graph.predecessors(node);
        let descendants = self
            .graph
            .closure(node, Direction::Descendants, self.cache.as_ref());
        let ancestors = self
            .graph
            .closure(node, Direction::Ancestors, self.cache.as_ref());

        Some(OntologyDocument {
            id: attrs.id.clone(),
            secondary_ids: (!attrs.alt_id.is_empty()).then(|| attrs.alt_id.clone()),
            definition: attrs.def.clone(),
            name: attrs.name.clone(),
            relationship: parse_relationships(&attrs.relationship),
            star: parse_star(&attrs.subset),

            num_children: children.len(),
            num_parents: parents.len(),
            num_descendants: descendants.len() as usize,
            num_ancestors: ancestors.len() as usize,

            children: self.capped_ids(children.iter().copied()),
            parents: self.capped_ids(parents.iter().copied()),
            descendants: self.capped_ids(descendants.iter()),
            ancestors: self.capped_ids(ancestors.iter()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OboGraph, OboNode};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn relationship_strings_accumulate_per_relation() {
        let parsed = parse_relationships(&strings(&[
            "has_role CHEBI:68495",
            "has_functional_parent CHEBI:28179",
            "has_role CHEBI:38637",
            "has_role CHEBI:35610",
        ]))
        .expect("relationships");

        assert_eq!(
            parsed["has_role"],
            strings(&["CHEBI:68495", "CHEBI:38637", "CHEBI:35610"])
        );
        assert_eq!(parsed["has_functional_parent"], strings(&["CHEBI:28179"]));
    }

    #[test]
    fn relationship_splits_on_first_whitespace_only() {
        let parsed = parse_relationships(&strings(&["has_role CHEBI:1 extra"])).expect("rel");
        assert_eq!(parsed["has_role"], strings(&["CHEBI:1 extra"]));
    }

    #[test]
    fn empty_relationships_are_absent() {
        assert_eq!(parse_relationships(&[]), None);
        assert_eq!(parse_relationships(&strings(&["dangling"])), None);
    }

    #[test]
    fn star_from_subset_token() {
        assert_eq!(parse_star(&strings(&["2_STAR"])), Some(2));
        assert_eq!(parse_star(&strings(&["3_STAR"])), Some(3));
        assert_eq!(parse_star(&[]), None);
        assert_eq!(parse_star(&strings(&["mixed"])), None);
    }

    #[test]
    fn star_uses_first_subset_only_and_stays_in_range() {
        assert_eq!(parse_star(&strings(&["1_STAR", "3_STAR"])), Some(1));
        assert_eq!(parse_star(&strings(&["mixed", "3_STAR"])), None);
        assert_eq!(parse_star(&strings(&["9_STAR"])), None);
        assert_eq!(parse_star(&strings(&["0_STAR"])), None);
    }

    fn builder(capacity: usize) -> OntologyDocumentBuilder {
        let mut root = OboNode::new("CHEBI:24431");
        root.name = Some("chemical entity".to_string());
        root.subset = strings(&["3_STAR"]);

        let mut child = OboNode::new("CHEBI:23367");
        child.is_a = strings(&["CHEBI:24431"]);
        child.alt_id = strings(&["CHEBI:13699"]);
        child.relationship = strings(&["has_role CHEBI:24431"]);
        child.def = Some("Any constitutionally distinct atom.".to_string());

        let mut grandchild = OboNode::new("CHEBI:90");
        grandchild.is_a = strings(&["CHEBI:23367"]);

        let graph = OntologyGraph::from_obo(OboGraph::from_nodes(vec![root, child, grandchild]));
        OntologyDocumentBuilder::new(
            graph,
            OntologyConfig {
                family_capacity: capacity,
                ..OntologyConfig::default()
            },
        )
    }

    #[test]
    fn builds_family_document() {
        let builder = builder(NODE_FAMILY_CAPACITY);
        let doc = builder.read_ontology("CHEBI:23367").expect("document");

        assert_eq!(doc.secondary_ids, Some(strings(&["CHEBI:13699"])));
        assert_eq!(doc.definition.as_deref(), Some("Any constitutionally distinct atom."));
        assert_eq!(doc.name, None);
        assert_eq!(doc.star, None);
        assert_eq!(
            doc.relationship.as_ref().map(|r| r["has_role"].clone()),
            Some(strings(&["CHEBI:24431"]))
        );
        assert_eq!(doc.parents, strings(&["CHEBI:24431"]));
        assert_eq!(doc.children, strings(&["CHEBI:90"]));
        assert_eq!(doc.ancestors, strings(&["CHEBI:24431"]));
        assert_eq!(doc.descendants, strings(&["CHEBI:90"]));
        assert_eq!((doc.num_parents, doc.num_children), (1, 1));
    }

    #[test]
    fn non_is_a_relationships_do_not_create_family() {
        let builder = builder(NODE_FAMILY_CAPACITY);
        let root = builder.read_ontology("CHEBI:24431").expect("root");
        // has_role edge from CHEBI:23367 is dropped; only the is_a child remains
        assert_eq!(root.children, strings(&["CHEBI:23367"]));
        assert_eq!(root.num_descendants, 2);
        assert_eq!(root.star, Some(3));
    }

    #[test]
    fn unknown_id_is_absent() {
        assert!(builder(NODE_FAMILY_CAPACITY).read_ontology("CHEBI:0").is_none());
    }

    #[test]
    fn lists_are_capped_but_counts_are_not() {
        let builder = builder(1);
        let root = builder.read_ontology("CHEBI:24431").expect("root");
        assert_eq!(root.num_descendants, 2);
        assert_eq!(root.descendants.len(), 1);
    }

    #[test]
    fn absent_fields_are_omitted_from_json() {
        let builder = builder(NODE_FAMILY_CAPACITY);
        let fields = builder
            .read_ontology("CHEBI:90")
            .expect("leaf")
            .into_fields()
            .expect("fields");
        assert!(!fields.contains_key("name"));
        assert!(!fields.contains_key("relationship"));
        assert!(!fields.contains_key("star"));
        assert_eq!(fields["num_ancestors"], serde_json::json!(2));
        assert_eq!(fields["children"], serde_json::json!([]));
    }
}
