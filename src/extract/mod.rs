//! Declarative field extraction against a rendered page.
//!
//! A flow describes each field it wants as a [`Field`]; [`extract`] walks the
//! table against any [`Node`] and returns a cleaned [`Record`].

pub mod labels;
pub mod links;

use tracing::debug;

use crate::engine::{BoxFuture, EngineResult, Node};
use crate::record::{FieldValue, Record};

pub use labels::LabelMap;

/// Visible placeholder for metadata the page never rendered.
pub const NOT_FOUND: &str = "Not found";

/// Where a value lives relative to the node being extracted from.
#[derive(Debug, Clone)]
pub struct Locator {
    /// `None` reads the node itself.
    pub selector: Option<String>,
    pub read: Read,
}

#[derive(Debug, Clone)]
pub enum Read {
    Text,
    Attribute(String),
}

impl Locator {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            read: Read::Text,
        }
    }

    pub fn attr(selector: &str, attribute: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            read: Read::Attribute(attribute.to_string()),
        }
    }

    /// `content` of `<meta {attr}="{key}">`.
    pub fn meta(attr: &str, key: &str) -> Self {
        Self::attr(&format!(r#"meta[{}="{}"]"#, attr, key), "content")
    }

    pub fn this() -> Self {
        Self {
            selector: None,
            read: Read::Text,
        }
    }

    pub async fn resolve(&self, node: &dyn Node) -> EngineResult<Option<String>> {
        match &self.selector {
            None => read(node, &self.read).await,
            Some(selector) => match node.query(selector).await? {
                Some(found) => read(found.as_ref(), &self.read).await,
                None => Ok(None),
            },
        }
    }
}

async fn read(node: &dyn Node, how: &Read) -> EngineResult<Option<String>> {
    match how {
        Read::Text => node.text_content().await,
        Read::Attribute(name) => node.attribute(name).await,
    }
}

/// What a text field turns into when nothing usable is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Omit,
    Empty,
    Sentinel,
}

#[derive(Debug, Clone)]
pub enum FieldSpec {
    /// First non-empty value across a fallback chain of locators.
    Text {
        locators: Vec<Locator>,
        missing: Missing,
    },
    /// Redirect link whose real target sits in its `q` query parameter.
    RedirectUnwrap { locator: Locator },
    /// Rows keyed by an icon; each row adds `label(icon) → value text`.
    /// Writes one key per row instead of a key named after the field.
    IconRemap {
        rows: String,
        icon: Locator,
        value_selector: String,
        value_index: usize,
        labels: LabelMap,
    },
    /// One sub-record per matching container.
    Group {
        containers: String,
        fields: Vec<Field>,
        limit: Option<usize>,
    },
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub spec: FieldSpec,
}

impl Field {
    pub fn new(name: &str, spec: FieldSpec) -> Self {
        Self {
            name: name.to_string(),
            spec,
        }
    }

    pub fn text(name: &str, locators: Vec<Locator>, missing: Missing) -> Self {
        Self::new(name, FieldSpec::Text { locators, missing })
    }
}

/// Collapses whitespace runs (newlines included) to one space and trims.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Applies every field in `fields` to `node`.
///
/// Missing elements never fail extraction; only engine errors do.
pub fn extract<'a>(node: &'a dyn Node, fields: &'a [Field]) -> BoxFuture<'a, EngineResult<Record>> {
    Box::pin(async move {
        let mut record = Record::new();
        for field in fields {
            extract_field(node, field, &mut record).await?;
        }
        Ok(record)
    })
}

async fn extract_field(node: &dyn Node, field: &Field, record: &mut Record) -> EngineResult<()> {
    match &field.spec {
        FieldSpec::Text { locators, missing } => {
            let mut value = None;
            for locator in locators {
                if let Some(raw) = locator.resolve(node).await? {
                    let cleaned = clean_text(&raw);
                    if !cleaned.is_empty() {
                        value = Some(cleaned);
                        break;
                    }
                }
            }
            match (value, missing) {
                (Some(v), _) => record.insert(field.name.as_str(), v),
                (None, Missing::Omit) => debug!("Field {} not found, omitting", field.name),
                (None, Missing::Empty) => record.insert(field.name.as_str(), ""),
                (None, Missing::Sentinel) => record.insert(field.name.as_str(), NOT_FOUND),
            }
        }
        FieldSpec::RedirectUnwrap { locator } => {
            let href = locator.resolve(node).await?.unwrap_or_default();
            let target = clean_text(&links::unwrap_redirect(&href));
            record.insert(field.name.as_str(), target);
        }
        FieldSpec::IconRemap {
            rows,
            icon,
            value_selector,
            value_index,
            labels,
        } => {
            for row in node.query_all(rows).await? {
                let icon_id = icon.resolve(row.as_ref()).await?.unwrap_or_default();
                let text = match row.nth(value_selector, *value_index).await? {
                    Some(cell) => cell.text_content().await?.unwrap_or_default(),
                    None => String::new(),
                };
                let (icon_id, text) = (icon_id.trim(), clean_text(&text));
                if icon_id.is_empty() || text.is_empty() {
                    continue;
                }
                record.insert(labels::label_for(*labels, icon_id), text);
            }
        }
        FieldSpec::Group {
            containers,
            fields,
            limit,
        } => {
            // Snapshot first so per-entry reads don't re-query a live DOM.
            let mut found = node.query_all(containers).await?;
            if let Some(limit) = limit {
                found.truncate(*limit);
            }
            let mut entries = Vec::with_capacity(found.len());
            for container in &found {
                entries.push(extract(container.as_ref(), fields).await?);
            }
            record.insert(field.name.as_str(), FieldValue::Group(entries));
        }
    }
    Ok(())
}

// ── Tests ──
