use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A cleaned scalar, or a repeated group of sub-records (links, comments).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Group(Vec<Record>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            FieldValue::Group(_) => None,
        }
    }

    /// Single-cell rendering for tabular output. Groups become compact JSON.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Text(t) => t.clone(),
            FieldValue::Group(entries) => serde_json::to_string(entries).unwrap_or_default(),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<Vec<Record>> for FieldValue {
    fn from(entries: Vec<Record>) -> Self {
        FieldValue::Group(entries)
    }
}

/// Field name → value. Keys are unique and iterate in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges `other` in; its values win on collision.
    pub fn merge(&mut self, other: Record) {
        self.0.extend(other.0);
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Record(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupLayout {
    /// Groups stay nested lists (document output).
    Nested,
    /// Group `g` becomes `g_1..g_n` (flat table rows).
    Indexed,
}

/// Merges partial records left to right, then lays out repeated groups.
pub fn assemble(parts: impl IntoIterator<Item = Record>, layout: GroupLayout) -> Record {
    let mut merged = Record::new();
    for part in parts {
        merged.merge(part);
    }
    match layout {
        GroupLayout::Nested => merged,
        GroupLayout::Indexed => flatten_groups(merged),
    }
}

fn flatten_groups(record: Record) -> Record {
    let mut flat = Record::new();
    for (key, value) in record {
        match value {
            FieldValue::Text(_) => flat.insert(key, value),
            FieldValue::Group(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    flat.insert(format!("{}_{}", key, i + 1), entry_cell(entry));
                }
            }
        }
    }
    flat
}

/// A one-field entry collapses to its text; anything richer stays JSON.
fn entry_cell(entry: &Record) -> String {
    let mut values = entry.iter();
    match (values.next(), values.next()) {
        (Some((_, FieldValue::Text(t))), None) => t.clone(),
        _ => serde_json::to_string(entry).unwrap_or_default(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(text: &str) -> Record {
        [("text", text)].into_iter().collect()
    }

    #[test]
    fn comments_flatten_to_indexed_keys() {
        let mut record = Record::new();
        record.insert("title", "Song");
        record.insert("comment", vec![comment("a"), comment("b")]);

        let flat = assemble([record], GroupLayout::Indexed);
        assert_eq!(flat.text("comment_1"), Some("a"));
        assert_eq!(flat.text("comment_2"), Some("b"));
        assert!(!flat.contains_key("comment"));
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn empty_group_contributes_no_keys() {
        let mut record = Record::new();
        record.insert("title", "Song");
        record.insert("comment", Vec::<Record>::new());

        let flat = assemble([record], GroupLayout::Indexed);
        assert_eq!(flat.keys().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn later_parts_win_on_collision() {
        let base: Record = [("name", "Not found"), ("url", "u")].into_iter().collect();
        let refined: Record = [("name", "Aimer")].into_iter().collect();

        let merged = assemble([base, refined], GroupLayout::Nested);
        assert_eq!(merged.text("name"), Some("Aimer"));
        assert_eq!(merged.text("url"), Some("u"));
    }

    #[test]
    fn nested_layout_keeps_groups() {
        let link: Record = [("title", "X"), ("url", "https://x.com/a")].into_iter().collect();
        let mut record = Record::new();
        record.insert("social_links", vec![link.clone()]);

        let nested = assemble([record.clone()], GroupLayout::Nested);
        assert_eq!(nested.get("social_links"), Some(&FieldValue::Group(vec![link])));

        // multi-field entries survive flattening as JSON
        let flat = assemble([record], GroupLayout::Indexed);
        let cell = flat.text("social_links_1").unwrap();
        assert!(cell.contains("\"url\":\"https://x.com/a\""));
    }

    #[test]
    fn serializes_as_plain_mapping() {
        let mut record = Record::new();
        record.insert("name", "Aimer");
        record.insert("links", vec![comment("hi")]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"links": [{"text": "hi"}], "name": "Aimer"}));

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
