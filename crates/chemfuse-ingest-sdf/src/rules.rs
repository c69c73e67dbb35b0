//! Declarative field-renaming rules.
//!
//! Each raw field name is matched against [`FIELD_RULES`] in order; the
//! first matching rule decides the target group, the target key, and how
//! the value lines are reshaped. Names that match no rule are kept as-is
//! in the document group.

use serde_json::{Map, Value};

/// Where a restructured field lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    /// Top level of the compound document.
    Document,
    /// External database cross-references.
    Xrefs,
    /// Literature citations.
    Citations,
}

impl FieldGroup {
    /// Document key under which a sub-group is stored.
    pub fn key(self) -> &'static str {
        match self {
            FieldGroup::Document => "",
            FieldGroup::Xrefs => "xrefs",
            FieldGroup::Citations => "citations",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPattern {
    /// The whole field name.
    Exact(&'static str),
    /// A fragment of the field name; the fragment is removed to form the key.
    Contains(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTransform {
    /// Keep the lines as a list of strings.
    Lines,
    /// Strip inline `<stereo>`/`<ital>` markup from the first line.
    StripMarkup,
    /// Parse `LABEL: value` lines into a `label -> value` map.
    LabelledLinks,
    /// Wrap the lines as `{"url_stub": [...]}`.
    UrlStub,
}

const MARKUP_TAGS: &[&str] = &["<stereo>", "</stereo>", "<ital>", "</ital>"];

impl ValueTransform {
    pub fn apply(self, mut lines: Vec<String>) -> Value {
        match self {
            ValueTransform::Lines => string_list(lines),
            ValueTransform::StripMarkup => {
                if let Some(first) = lines.first_mut() {
                    for tag in MARKUP_TAGS {
                        *first = first.replace(tag, "");
                    }
                }
                string_list(lines)
            }
            ValueTransform::LabelledLinks => {
                let mut links = Map::new();
                for line in &lines {
                    let parts: Vec<&str> = line.split(':').collect();
                    let [label, value] = parts.as_slice() else {
                        tracing::debug!(line = %line, "skipping unlabelled link");
                        continue;
                    };
                    // Drop the separator space.
                    let mut value_chars = value.chars();
                    value_chars.next();
                    links.insert(
                        label.to_lowercase(),
                        Value::String(value_chars.as_str().to_string()),
                    );
                }
                Value::Object(links)
            }
            ValueTransform::UrlStub => {
                let mut wrapped = Map::new();
                wrapped.insert("url_stub".to_string(), string_list(lines));
                Value::Object(wrapped)
            }
        }
    }
}

fn string_list(lines: Vec<String>) -> Value {
    Value::Array(lines.into_iter().map(Value::String).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub pattern: FieldPattern,
    pub group: FieldGroup,
    /// Replacement key for [`FieldPattern::Exact`] rules.
    pub rename: Option<&'static str>,
    /// Key aliases applied after a [`FieldPattern::Contains`] fragment is removed.
    pub aliases: &'static [(&'static str, &'static str)],
    pub transform: ValueTransform,
}

impl FieldRule {
    const fn exact(
        name: &'static str,
        group: FieldGroup,
        rename: Option<&'static str>,
        transform: ValueTransform,
    ) -> Self {
        Self {
            pattern: FieldPattern::Exact(name),
            group,
            rename,
            aliases: &[],
            transform,
        }
    }

    const fn contains(
        fragment: &'static str,
        group: FieldGroup,
        aliases: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            pattern: FieldPattern::Contains(fragment),
            group,
            rename: None,
            aliases,
            transform: ValueTransform::Lines,
        }
    }

    /// The target key if this rule applies to `name`.
    pub fn target_key(&self, name: &str) -> Option<String> {
        match self.pattern {
            FieldPattern::Exact(exact) if exact == name => {
                Some(self.rename.unwrap_or(exact).to_string())
            }
            FieldPattern::Contains(fragment) if name.contains(fragment) => {
                let key = name.replace(fragment, "");
                let aliased = self
                    .aliases
                    .iter()
                    .find(|(from, _)| *from == key)
                    .map(|(_, to)| to.to_string());
                Some(aliased.unwrap_or(key))
            }
            _ => None,
        }
    }
}

/// Field rules, most specific first.
pub const FIELD_RULES: &[FieldRule] = &[
    FieldRule::exact(
        "definition",
        FieldGroup::Document,
        None,
        ValueTransform::StripMarkup,
    ),
    FieldRule::exact(
        "pubchem_database_links",
        FieldGroup::Document,
        None,
        ValueTransform::LabelledLinks,
    ),
    FieldRule::exact(
        "iupac_names",
        FieldGroup::Document,
        Some("iupac"),
        ValueTransform::Lines,
    ),
    FieldRule::exact(
        "chebi_id",
        FieldGroup::Document,
        Some("id"),
        ValueTransform::Lines,
    ),
    FieldRule::exact(
        "chebi_name",
        FieldGroup::Document,
        Some("name"),
        ValueTransform::Lines,
    ),
    FieldRule::exact(
        "wikipedia_database_links",
        FieldGroup::Xrefs,
        Some("wikipedia"),
        ValueTransform::UrlStub,
    ),
    FieldRule::exact(
        "beilstein_registry_numbers",
        FieldGroup::Xrefs,
        Some("beilstein"),
        ValueTransform::Lines,
    ),
    FieldRule::contains("_database_links", FieldGroup::Xrefs, &[]),
    FieldRule::contains("_registry_numbers", FieldGroup::Xrefs, &[]),
    FieldRule::contains(
        "_citation_links",
        FieldGroup::Citations,
        &[("pubmed_central", "pmc")],
    ),
];

/// Outcome of matching a field name against the rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    pub group: FieldGroup,
    pub key: String,
    pub transform: ValueTransform,
}

pub fn resolve_field(name: &str) -> ResolvedField {
    FIELD_RULES
        .iter()
        .find_map(|rule| {
            rule.target_key(name).map(|key| ResolvedField {
                group: rule.group,
                key,
                transform: rule.transform,
            })
        })
        .unwrap_or_else(|| ResolvedField {
            group: FieldGroup::Document,
            key: name.to_string(),
            transform: ValueTransform::Lines,
        })
}
