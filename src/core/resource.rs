//! Import resources and their cursors, stored in the `resource` table.

use crate::core::importer::to_row;
use crate::domain::model::{Id, ImportResource, RawNote, Table};
use crate::domain::ports::{Condition, Row, Store};
use crate::utils::error::{NoteError, Result};
use chrono::Local;
use serde_json::Value;

/// Resource by name, or by id when `key` is numeric and no name matches.
pub fn find_resource<S: Store>(store: &S, key: &str) -> Result<Option<ImportResource>> {
    let mut rows = store.query(Table::Resource, &Condition::eq("name", key));
    if rows.is_empty() {
        if let Ok(id) = key.trim().parse::<Id>() {
            rows = store.query(Table::Resource, &Condition::Id(id));
        }
    }

    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(Value::Object(row))?)),
        None => Ok(None),
    }
}

/// Creates the resource or refreshes the stored one with the same name.
/// An existing cursor is kept.
pub fn upsert_resource<S: Store>(store: &S, resource: &ImportResource) -> Result<ImportResource> {
    let save_error = |reason: String| NoteError::SaveError {
        what: format!("resource '{}'", resource.name),
        reason,
    };

    let mut row = to_row(resource).map_err(save_error)?;
    row.remove("id");
    row.remove("last_import");
    row.remove("last_record");

    let id = match find_resource(store, &resource.name)?.and_then(|found| found.id) {
        Some(id) => {
            if !store.update(Table::Resource, row, &Condition::Id(id)) {
                return Err(save_error(store.last_error().unwrap_or_default()));
            }
            id
        }
        None => store
            .insert(Table::Resource, row)
            .ok_or_else(|| save_error(store.last_error().unwrap_or_default()))?,
    };

    find_resource(store, &id.to_string())?.ok_or_else(|| NoteError::NotFoundError {
        what: "resource".to_string(),
        key: id.to_string(),
    })
}

/// Records `last` as the newest imported note of resource `id`.
pub fn update_cursor<S: Store>(store: &S, id: Id, last: &RawNote) -> bool {
    let Ok(Value::Object(note)) = serde_json::to_value(last) else {
        return false;
    };

    let mut patch = Row::new();
    patch.insert(
        "last_import".to_string(),
        Value::from(Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S").to_string()),
    );
    patch.insert("last_record".to_string(), Value::Object(note));
    store.update(Table::Resource, patch, &Condition::Id(id))
}
