use crate::domain::model::{Id, RawNote, SanitizeOutcome, Table};
use crate::utils::error::{NoteError, Result};
use async_trait::async_trait;
use serde_json::Value;

pub type Row = serde_json::Map<String, Value>;

/// Row filter understood by every Store.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    All,
    Id(Id),
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Condition {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Condition::Eq(field.to_string(), value.into())
    }

    pub fn matches(&self, row: &Row) -> bool {
        let field = |name: &str| row.get(name).unwrap_or(&Value::Null);
        match self {
            Condition::All => true,
            Condition::Id(id) => row.get("id").and_then(Value::as_i64) == Some(*id),
            Condition::Eq(name, value) => field(name) == value,
            Condition::In(name, values) => values.contains(field(name)),
        }
    }
}

/// Relational persistence. `None` / `false` are the only failure signals;
/// details, when the store keeps any, come from `last_error`.
pub trait Store: Send + Sync {
    fn insert(&self, table: Table, row: Row) -> Option<Id>;

    fn update(&self, table: Table, patch: Row, condition: &Condition) -> bool;

    fn query(&self, table: Table, condition: &Condition) -> Vec<Row>;

    /// Runs `f` atomically: every write made through `self` inside `f` is
    /// undone when `f` returns `false`.
    fn with_transaction<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Self) -> bool,
        Self: Sized;

    fn last_error(&self) -> Option<String> {
        None
    }
}

/// Name to identifier lookup within the reference tables.
pub trait Alias {
    fn resolve(&self, table: Table, name_or_id: &str) -> Option<Id>;

    fn resolve_many(&self, table: Table, names: &[String]) -> Vec<Option<Id>> {
        names.iter().map(|name| self.resolve(table, name)).collect()
    }
}

/// Import stages. `mark_seen` runs between extract and transform so the
/// cursor advances even when later stages reject notes.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<RawNote>>;
    async fn mark_seen(&self, last: &RawNote) -> bool;
    async fn transform(&self, notes: &[RawNote]) -> Result<SanitizeOutcome>;
    async fn load(&self, outcome: &SanitizeOutcome) -> Result<Vec<(usize, NoteError)>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_condition_matches() {
        let row: Row = serde_json::from_value(json!({"id": 3, "name": "cash", "tag": null}))
            .unwrap();

        assert!(Condition::All.matches(&row));
        assert!(Condition::Id(3).matches(&row));
        assert!(!Condition::Id(4).matches(&row));
        assert!(Condition::eq("name", "cash").matches(&row));
        assert!(Condition::eq("tag", Value::Null).matches(&row));
        assert!(Condition::eq("missing", Value::Null).matches(&row));
        assert!(Condition::In("id".to_string(), vec![json!(1), json!(3)]).matches(&row));
        assert!(!Condition::In("id".to_string(), vec![json!(1)]).matches(&row));
    }
}
