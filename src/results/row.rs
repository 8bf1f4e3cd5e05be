use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::FetchFlags;
use crate::types::Value;

/// A key under which a row exposes a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    Name(String),
    Index(usize),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Name(name) => f.write_str(name),
            RowKey::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A fetched row.
///
/// Column names are lowercased and shared by every row of a cursor. Which
/// lookups succeed depends on the flags the row was fetched with: `get` needs
/// name keys, `get_by_index` needs ordinal keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    column_names: Arc<Vec<String>>,
    values: Vec<Value>,
    by_name: bool,
    by_index: bool,
}

impl Row {
    pub(crate) fn new(column_names: Arc<Vec<String>>, values: Vec<Value>, flags: FetchFlags) -> Self {
        Self {
            column_names,
            values,
            by_name: flags.keys_by_name(),
            by_index: flags.keys_by_index(),
        }
    }

    /// Value of the named column; names match case-insensitively and a
    /// repeated name resolves to its last column.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&Value> {
        if !self.by_name {
            return None;
        }
        let wanted = column_name.to_lowercase();
        self.column_names
            .iter()
            .rposition(|name| *name == wanted)
            .and_then(|idx| self.values.get(idx))
    }

    /// Value at a zero-based column ordinal.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        if self.by_index {
            self.values.get(index)
        } else {
            None
        }
    }

    #[must_use]
    pub fn get_key(&self, key: &RowKey) -> Option<&Value> {
        match key {
            RowKey::Name(name) => self.get(name),
            RowKey::Index(index) => self.get_by_index(*index),
        }
    }

    /// Every key this row answers to, ordinal before name for each column.
    #[must_use]
    pub fn keys(&self) -> Vec<RowKey> {
        let mut keys = Vec::with_capacity(self.values.len() * 2);
        for (idx, name) in self.column_names.iter().enumerate() {
            if self.by_index {
                keys.push(RowKey::Index(idx));
            }
            if self.by_name {
                keys.push(RowKey::Name(name.clone()));
            }
        }
        keys
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// The row as a JSON object keyed by [`Row::keys`].
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let keys = self.keys();
        let mut map = serializer.serialize_map(Some(keys.len()))?;
        for key in &keys {
            if let Some(value) = self.get_key(key) {
                map.serialize_entry(&key.to_string(), value)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(flags: FetchFlags) -> Row {
        Row::new(
            Arc::new(vec!["id".to_owned(), "name".to_owned()]),
            vec![Value::Int(7), Value::Text("alice".into())],
            flags,
        )
    }

    #[test]
    fn assoc_rows_answer_by_name_only() {
        let row = sample(FetchFlags::ASSOC);
        assert_eq!(row.get("NAME"), Some(&Value::Text("alice".into())));
        assert_eq!(row.get_by_index(0), None);
        assert_eq!(
            row.keys(),
            vec![RowKey::Name("id".into()), RowKey::Name("name".into())]
        );
    }

    #[test]
    fn num_rows_answer_by_index_only() {
        let row = sample(FetchFlags::NUM);
        assert_eq!(row.get_by_index(0), Some(&Value::Int(7)));
        assert_eq!(row.get("id"), None);
    }

    #[test]
    fn combined_rows_carry_both_keys() {
        let row = sample(FetchFlags::ASSOC | FetchFlags::NUM);
        assert_eq!(row.keys().len(), 4);
        assert_eq!(
            row.to_json(),
            json!({"0": 7, "id": 7, "1": "alice", "name": "alice"})
        );
    }

    #[test]
    fn repeated_column_name_resolves_to_last() {
        let row = Row::new(
            Arc::new(vec!["id".to_owned(), "id".to_owned()]),
            vec![Value::Int(1), Value::Int(2)],
            FetchFlags::ASSOC,
        );
        assert_eq!(row.get("ID"), Some(&Value::Int(2)));
        assert_eq!(row.to_json(), json!({"id": 2}));
    }
}
