//! Flat compound-attribute ingestion for Chemfuse (boundary adapter).
//!
//! Reads an SDF-style attribute dump: one block per chemical entity,
//! blocks separated by `$$$$`, each block holding a molecule structure
//! followed by repeated sections of the form
//!
//! ```text
//! > <ChEBI ID>
//! CHEBI:90
//!
//! > <Synonyms>
//! (-)-epicatechin
//! (2R,3R)-2-(3,4-dihydroxyphenyl)-3,4-dihydro-2H-chromene-3,5,7-triol
//! ```
//!
//! The reader is two-staged:
//! - [`parse_compound_block`] turns one block into a [`RawCompound`]
//!   (ordered `field name -> lines`), discarding the structure section.
//! - [`restructure`] applies the declarative [`rules::FIELD_RULES`] table to
//!   produce a [`CompoundRecord`] with `xrefs`/`citations` sub-groups.
//!
//! The dump is assumed to be pre-validated upstream: any malformed block
//! fails the whole read.

pub mod rules;

use serde_json::{Map, Value};
use std::path::Path;

pub use rules::{resolve_field, FieldGroup, FieldPattern, FieldRule, ResolvedField, ValueTransform};

/// Separator between compound blocks.
pub const RECORD_DELIMITER: &str = "$$$$";

/// Marker opening every attribute section inside a block.
pub const ATTRIBUTE_MARKER: &str = "\n> <";

/// Separates an attribute tag from its value lines.
const TAG_TERMINATOR: &str = ">\n";

/// Field holding the entity id after restructuring.
pub const ID_FIELD: &str = "id";

#[derive(Debug, thiserror::Error)]
pub enum SdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("compound block {block}: no attribute sections found")]
    NoAttributes { block: usize },
    #[error("compound block {block}: attribute section `{section}` is missing its tag terminator")]
    MalformedAttribute { block: usize, section: String },
    #[error("compound block {block}: no `{ID_FIELD}` value after restructuring")]
    MissingId { block: usize },
}

// ============================================================================
// Raw field maps
// ============================================================================

/// Ordered `field name -> value lines` map for one compound block.
///
/// Inserting an existing name replaces its lines in place, so the first
/// occurrence keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCompound {
    fields: Vec<(String, Vec<String>)>,
}

impl RawCompound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, lines: Vec<String>) {
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = lines,
            None => self.fields.push((name, lines)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, lines)| lines.as_slice())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

impl IntoIterator for RawCompound {
    type Item = (String, Vec<String>);
    type IntoIter = std::vec::IntoIter<(String, Vec<String>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Lower-case a section tag and map spaces and hyphens to underscores.
pub fn normalize_tag(tag: &str) -> String {
    tag.to_lowercase().replace([' ', '-'], "_")
}

/// Parse one compound block (the text between two `$$$$` delimiters).
///
/// `block` is the zero-based position of the block in the dump and is only
/// used for error reporting.
pub fn parse_compound_block(text: &str, block: usize) -> Result<RawCompound, SdfError> {
    let mut sections = text.split(ATTRIBUTE_MARKER);
    // Molecule structure, not an attribute.
    let _structure = sections.next();

    let mut raw = RawCompound::new();
    let mut seen_section = false;
    for section in sections {
        seen_section = true;
        let section = section.trim_matches('\n');
        let Some((tag, value)) = section.split_once(TAG_TERMINATOR) else {
            return Err(SdfError::MalformedAttribute {
                block,
                section: section.lines().next().unwrap_or_default().to_string(),
            });
        };
        let lines = value.split('\n').map(str::to_string).collect();
        raw.insert(normalize_tag(tag), lines);
    }

    if !seen_section {
        return Err(SdfError::NoAttributes { block });
    }
    Ok(raw)
}

// ============================================================================
// Restructured records
// ============================================================================

/// One restructured compound, ready to be fused with its ontology document.
///
/// Every plain field is still a list of strings at this stage; singleton
/// lists are only flattened by the finalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundRecord {
    id: String,
    fields: Map<String, Value>,
}

impl CompoundRecord {
    /// The entity id (first value of the `id` field).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

/// Apply the field rule table to a raw compound.
pub fn restructure(raw: RawCompound, block: usize) -> Result<CompoundRecord, SdfError> {
    let mut fields = Map::new();
    let mut xrefs = Map::new();
    let mut citations = Map::new();

    for (name, lines) in raw {
        let resolved = resolve_field(&name);
        let value = resolved.transform.apply(lines);
        let target = match resolved.group {
            FieldGroup::Document => &mut fields,
            FieldGroup::Xrefs => &mut xrefs,
            FieldGroup::Citations => &mut citations,
        };
        target.insert(resolved.key, value);
    }

    if !xrefs.is_empty() {
        fields.insert(FieldGroup::Xrefs.key().to_string(), Value::Object(xrefs));
    }
    if !citations.is_empty() {
        fields.insert(
            FieldGroup::Citations.key().to_string(),
            Value::Object(citations),
        );
    }

    let id = fields
        .get(ID_FIELD)
        .and_then(Value::as_array)
        .and_then(|values| values.first())
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(SdfError::MissingId { block })?;

    Ok(CompoundRecord { id, fields })
}

// ============================================================================
// Reader
// ============================================================================

/// Holds a whole attribute dump in memory and hands out lazy record streams.
#[derive(Debug, Clone)]
pub struct CompoundReader {
    text: String,
}

impl CompoundReader {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn from_path(path: &Path) -> Result<Self, SdfError> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }

    /// Raw field maps, one per block, in dump order.
    pub fn raw_compounds(&self) -> RawCompounds<'_> {
        RawCompounds {
            blocks: self.text.split(RECORD_DELIMITER).peekable(),
            index: 0,
        }
    }

    /// Restructured records, one per block, in dump order.
    pub fn records(&self) -> impl Iterator<Item = Result<CompoundRecord, SdfError>> + '_ {
        self.raw_compounds()
            .enumerate()
            .map(|(block, raw)| raw.and_then(|raw| restructure(raw, block)))
    }
}

/// Lazy iterator over the raw blocks of a dump.
pub struct RawCompounds<'a> {
    blocks: std::iter::Peekable<std::str::Split<'a, &'static str>>,
    index: usize,
}

impl Iterator for RawCompounds<'_> {
    type Item = Result<RawCompound, SdfError>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.blocks.next()?;
        // The dump ends with a delimiter followed by a newline.
        if self.blocks.peek().is_none() && block.trim().is_empty() {
            return None;
        }
        let index = self.index;
        self.index += 1;
        Some(parse_compound_block(block, index))
    }
}
