use crate::domain::model::{Id, Table};
use crate::domain::ports::{Alias, Condition, Store};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

const REFERENCE_TABLES: [Table; 3] = [Table::Account, Table::Wallet, Table::Tag];

/// Snapshot of account, wallet and tag names taken from a store.
///
/// A value resolves by exact name first, then as a numeric id of an existing
/// row. Anything else stays unresolved.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    names: HashMap<Table, HashMap<String, Id>>,
    ids: HashMap<Table, HashSet<Id>>,
}

impl AliasTable {
    pub fn from_store<S: Store + ?Sized>(store: &S) -> Self {
        let mut aliases = Self::default();
        for table in REFERENCE_TABLES {
            for row in store.query(table, &Condition::All) {
                let Some(id) = row.get("id").and_then(Value::as_i64) else {
                    continue;
                };
                if let Some(name) = row.get("name").and_then(Value::as_str) {
                    aliases.add(table, name, id);
                }
                aliases.ids.entry(table).or_default().insert(id);
            }
        }
        aliases
    }

    pub fn add(&mut self, table: Table, name: &str, id: Id) {
        self.names
            .entry(table)
            .or_default()
            .insert(name.to_string(), id);
        self.ids.entry(table).or_default().insert(id);
    }
}

impl Alias for AliasTable {
    fn resolve(&self, table: Table, name_or_id: &str) -> Option<Id> {
        let key = name_or_id.trim();
        if key.is_empty() {
            return None;
        }
        if let Some(id) = self.names.get(&table).and_then(|names| names.get(key)) {
            return Some(*id);
        }

        let id = key.parse::<Id>().ok()?;
        self.ids
            .get(&table)
            .filter(|ids| ids.contains(&id))
            .map(|_| id)
    }
}
