//! Exact-match filtering, lexicographic sorting and truncation over raw records.

use serde_json::{Map, Value};

/// Marker prefix on a sort field selecting descending order.
pub const DESCENDING_MARKER: char = '-';

/// Parameters for [`super::EntityStore::filter`].
///
/// Every criterion must equal the record's field exactly; an empty query returns the
/// whole set in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    pub criteria: Map<String, Value>,
    /// Field to sort by; `-field` sorts descending.
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

impl EntityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.criteria.insert(field.into(), value.into());
        self
    }

    pub fn sort(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(field.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `true` when every criterion equals the corresponding field of `record`.
    pub fn matches(&self, record: &Value) -> bool {
        self.criteria
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }

    /// Filter, sort and truncate `records`, preserving insertion order among ties.
    pub fn apply<'a>(&self, records: &'a [Value]) -> Vec<&'a Value> {
        let mut selected: Vec<&Value> = records.iter().filter(|r| self.matches(r)).collect();

        if let Some(sort) = self.sort.as_deref() {
            let (field, descending) = match sort.strip_prefix(DESCENDING_MARKER) {
                Some(field) => (field, true),
                None => (sort, false),
            };
            // sort_by is stable
            selected.sort_by(|a, b| {
                let ordering = sort_key(a, field).cmp(&sort_key(b, field));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// String form of a field used for ordering. Missing and null fields sort as `""`.
pub fn sort_key(record: &Value, field: &str) -> String {
    match record.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
