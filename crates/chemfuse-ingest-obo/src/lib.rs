//! OBO ontology ingestion for Chemfuse.
//!
//! Three layers, leaf-first:
//! - [`parse_obo`]: a minimal OBO text reader producing an [`OboGraph`]
//!   (term nodes plus typed edges pointing from specific to general terms).
//! - [`graph::OntologyGraph`]: the reversed, `is_a`-only graph with
//!   successor/predecessor lists and transitive closures.
//! - [`document::OntologyDocumentBuilder`]: per-id family documents with
//!   capped relationship lists and true counts.

pub mod document;
pub mod graph;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use document::{
    parse_relationships, parse_star, OntologyConfig, OntologyDocument, OntologyDocumentBuilder,
    NODE_FAMILY_CAPACITY, STAR_RANGE,
};
pub use graph::{ClosureCache, Direction, NodeIds, OntologyGraph};

/// The only relation kept for family computations.
pub const IS_A_RELATION: &str = "is_a";

#[derive(Debug, thiserror::Error)]
pub enum OboError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("term stanza starting at line {line} has no `id` tag")]
    MissingId { line: usize },
}

// ============================================================================
// Parsed graph model
// ============================================================================

/// Attributes of one ontology term, as read from its `[Term]` stanza.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OboNode {
    pub id: String,
    pub name: Option<String>,
    pub def: Option<String>,
    pub alt_id: Vec<String>,
    /// Raw `"<relation> <target>"` strings.
    pub relationship: Vec<String>,
    pub subset: Vec<String>,
    pub is_a: Vec<String>,
}

impl OboNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// A typed edge pointing from a specific term to a more general one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OboEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
}

/// Term nodes and typed edges, before any filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OboGraph {
    pub nodes: Vec<OboNode>,
    pub edges: Vec<OboEdge>,
}

impl OboGraph {
    /// Build the edge list from each node's `is_a` and `relationship` values.
    pub fn from_nodes(nodes: Vec<OboNode>) -> Self {
        let mut edges = Vec::new();
        for node in &nodes {
            for target in &node.is_a {
                edges.push(OboEdge {
                    source: node.id.clone(),
                    target: target.clone(),
                    relation: IS_A_RELATION.to_string(),
                });
            }
            for raw in &node.relationship {
                match raw.split_once(char::is_whitespace) {
                    Some((relation, target)) => edges.push(OboEdge {
                        source: node.id.clone(),
                        target: target.trim().to_string(),
                        relation: relation.to_string(),
                    }),
                    None => {
                        tracing::warn!(term = %node.id, relationship = %raw, "relationship without target");
                    }
                }
            }
        }
        Self { nodes, edges }
    }

    pub fn from_path(path: &Path) -> Result<Self, OboError> {
        parse_obo(&std::fs::read_to_string(path)?)
    }
}

// ============================================================================
// OBO text parser
// ============================================================================

#[derive(Debug)]
struct TermStanza {
    start_line: usize,
    id: Option<String>,
    node: OboNode,
    obsolete: bool,
}

impl TermStanza {
    fn new(start_line: usize) -> Self {
        Self {
            start_line,
            id: None,
            node: OboNode::default(),
            obsolete: false,
        }
    }

    fn apply(&mut self, tag: &str, value: &str) {
        match tag {
            "id" => self.id = Some(strip_value(value)),
            "name" => self.node.name = Some(strip_value(value)),
            "def" => self.node.def = Some(parse_quoted(value)),
            "alt_id" => self.node.alt_id.push(strip_value(value)),
            "subset" => self.node.subset.push(strip_value(value)),
            "is_a" => self.node.is_a.push(strip_value(value)),
            "relationship" => self.node.relationship.push(strip_value(value)),
            "is_obsolete" => self.obsolete = strip_value(value) == "true",
            _ => {}
        }
    }

    fn finish(self, nodes: &mut Vec<OboNode>, obsolete: &mut usize) -> Result<(), OboError> {
        let id = self.id.ok_or(OboError::MissingId {
            line: self.start_line,
        })?;
        if self.obsolete {
            *obsolete += 1;
            return Ok(());
        }
        nodes.push(OboNode { id, ..self.node });
        Ok(())
    }
}

/// Parse the `[Term]` stanzas of an OBO document.
///
/// Header tags and non-term stanzas (`[Typedef]`, `[Instance]`) are skipped;
/// obsolete terms are dropped.
pub fn parse_obo(text: &str) -> Result<OboGraph, OboError> {
    let mut nodes = Vec::new();
    let mut obsolete = 0usize;
    let mut current: Option<TermStanza> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('!') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            if let Some(stanza) = current.take() {
                stanza.finish(&mut nodes, &mut obsolete)?;
            }
            if line == "[Term]" {
                current = Some(TermStanza::new(line_no));
            }
            continue;
        }

        let Some((tag, value)) = line.split_once(':') else {
            return Err(OboError::Parse {
                line: line_no,
                message: format!("expected `tag: value`, got `{line}`"),
            });
        };
        if let Some(stanza) = current.as_mut() {
            stanza.apply(tag.trim(), value.trim());
        }
    }

    if let Some(stanza) = current.take() {
        stanza.finish(&mut nodes, &mut obsolete)?;
    }

    tracing::debug!(terms = nodes.len(), obsolete, "parsed OBO terms");
    Ok(OboGraph::from_nodes(nodes))
}

fn find_unescaped(s: &str, needle: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == needle {
            return Some(i);
        }
    }
    None
}

/// Drop a trailing `! comment` and `{modifier}` block.
fn strip_value(value: &str) -> String {
    let mut out = value;
    if let Some(pos) = find_unescaped(out, '!') {
        out = &out[..pos];
    }
    out = out.trim_end();
    if out.ends_with('}') {
        if let Some(open) = out.rfind('{') {
            out = out[..open].trim_end();
        }
    }
    out.to_string()
}

/// Extract the quoted text of a `def`-style value, resolving escapes.
fn parse_quoted(value: &str) -> String {
    let Some(rest) = value.strip_prefix('"') else {
        return strip_value(value);
    };
    let mut out = String::with_capacity(rest.len());
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return out,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}
