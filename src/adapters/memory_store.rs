//! Relational store kept in memory and optionally persisted as one JSON file.
//!
//! Each table enforces its NOT NULL columns, UNIQUE columns and foreign keys,
//! so rejected writes behave like a SQL backend's constraint failures.

use crate::domain::model::{Id, Table};
use crate::domain::ports::{Condition, Row, Store};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Schema {
    required: &'static [&'static str],
    unique: &'static [&'static str],
    references: &'static [(&'static str, Table)],
}

fn schema(table: Table) -> Schema {
    match table {
        Table::Account | Table::Tag => Schema {
            required: &["name"],
            unique: &["name"],
            references: &[],
        },
        Table::Wallet => Schema {
            required: &["name", "account"],
            unique: &["name"],
            references: &[("account", Table::Account)],
        },
        Table::Transaction => Schema {
            required: &["amount", "currency"],
            unique: &[],
            references: &[
                ("payer", Table::Wallet),
                ("receiver", Table::Wallet),
                ("category", Table::Tag),
            ],
        },
        Table::Order => Schema {
            required: &["tx", "items"],
            unique: &["tx"],
            references: &[("tx", Table::Transaction), ("tag", Table::Tag)],
        },
        Table::Sharing => Schema {
            required: &["tx", "people"],
            unique: &["tx"],
            references: &[
                ("tx", Table::Transaction),
                ("people", Table::Account),
                ("tag", Table::Tag),
            ],
        },
        Table::Event => Schema {
            required: &["name", "currency", "bills", "sharings"],
            unique: &["name"],
            references: &[("tag", Table::Tag)],
        },
        Table::Resource => Schema {
            required: &["name", "link"],
            unique: &["name"],
            references: &[],
        },
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    next_id: Id,
    rows: BTreeMap<String, Vec<Row>>,
}

impl Tables {
    fn rows(&self, table: Table) -> &[Row] {
        self.rows.get(table.name()).map(Vec::as_slice).unwrap_or(&[])
    }

    fn exists(&self, table: Table, id: Id) -> bool {
        self.rows(table).iter().any(|row| Condition::Id(id).matches(row))
    }

    /// Constraint violations of `row` as stored in `table`; `own_id` is the
    /// row being replaced, if any.
    fn check(&self, table: Table, row: &Row, own_id: Option<Id>) -> std::result::Result<(), String> {
        let schema = schema(table);

        for column in schema.required {
            if row.get(*column).map_or(true, Value::is_null) {
                return Err(format!("NOT NULL constraint failed: {}.{}", table, column));
            }
        }

        for column in schema.unique {
            let Some(value) = row.get(*column) else {
                continue;
            };
            let taken = self.rows(table).iter().any(|other| {
                other.get(*column) == Some(value)
                    && other.get("id").and_then(Value::as_i64) != own_id
            });
            if taken {
                return Err(format!("UNIQUE constraint failed: {}.{}", table, column));
            }
        }

        for (column, target) in schema.references {
            let ids: Vec<&Value> = match row.get(*column) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(values)) => values.iter().collect(),
                Some(value) => vec![value],
            };
            let valid = ids
                .iter()
                .all(|value| value.as_i64().is_some_and(|id| self.exists(*target, id)));
            if !valid {
                return Err(format!(
                    "FOREIGN KEY constraint failed: {}.{} -> {}",
                    table, column, target
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    last_error: Mutex<Option<String>>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by `path`; the file is read when it exists and written by
    /// [`MemoryStore::save`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            serde_json::from_slice(&fs::read(&path)?)?
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: Mutex::new(tables),
            last_error: Mutex::new(None),
            path: Some(path),
        })
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(&*self.tables())?;
        fs::write(path, data)?;
        Ok(())
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, message: String) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }
}

impl Store for MemoryStore {
    fn insert(&self, table: Table, mut row: Row) -> Option<Id> {
        let mut tables = self.tables();
        row.remove("id");
        if let Err(message) = tables.check(table, &row, None) {
            self.fail(message);
            return None;
        }

        tables.next_id += 1;
        let id = tables.next_id;
        row.insert("id".to_string(), Value::from(id));
        tables.rows.entry(table.name().to_string()).or_default().push(row);
        Some(id)
    }

    /// Patches every matching row. Fails when nothing matches or when any
    /// patched row would break a constraint; no row changes in that case.
    fn update(&self, table: Table, mut patch: Row, condition: &Condition) -> bool {
        let mut tables = self.tables();
        patch.remove("id");

        let patched: std::result::Result<Vec<(usize, Row)>, String> = tables
            .rows(table)
            .iter()
            .enumerate()
            .filter(|(_, row)| condition.matches(row))
            .map(|(position, row)| {
                let mut updated = row.clone();
                updated.extend(patch.clone());
                let own_id = updated.get("id").and_then(Value::as_i64);
                tables
                    .check(table, &updated, own_id)
                    .map(|_| (position, updated))
            })
            .collect();

        let patched = match patched {
            Ok(patched) => patched,
            Err(message) => {
                self.fail(message);
                return false;
            }
        };

        if patched.is_empty() {
            self.fail(format!("no {} row matches {:?}", table, condition));
            return false;
        }

        let rows = tables.rows.entry(table.name().to_string()).or_default();
        for (position, updated) in patched {
            rows[position] = updated;
        }
        true
    }

    fn query(&self, table: Table, condition: &Condition) -> Vec<Row> {
        self.tables()
            .rows(table)
            .iter()
            .filter(|row| condition.matches(row))
            .cloned()
            .collect()
    }

    fn with_transaction<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Self) -> bool,
    {
        let snapshot = self.tables().clone();
        let committed = f(self);
        if !committed {
            *self.tables() = snapshot;
        }
        committed
    }

    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
