use crate::domain::model::{Extension, Id, NoteRecord, Table};
use crate::domain::ports::{Row, Store};
use crate::utils::error::NoteError;
use serde::Serialize;
use serde_json::Value;

/// Saves each record in its own store transaction. A record whose transaction
/// or extension row is rejected leaves nothing behind and is reported with
/// its note index; the others are unaffected.
pub fn import_records<S: Store>(
    store: &S,
    records: &[(usize, NoteRecord)],
) -> Vec<(usize, NoteError)> {
    let mut failures = Vec::new();

    for (index, record) in records {
        let mut reason = None;
        let saved = store.with_transaction(|store| match save_record(store, record) {
            Ok(_) => true,
            Err(message) => {
                reason = Some(message);
                false
            }
        });

        if !saved {
            failures.push((
                *index,
                NoteError::SaveError {
                    what: format!("notes[{}]", index + 1),
                    reason: reason.unwrap_or_else(|| "transaction was rolled back".to_string()),
                },
            ));
        }
    }

    failures
}

/// Inserts the transaction row, then the extension row pointing at it.
pub fn save_record<S: Store>(store: &S, record: &NoteRecord) -> Result<Id, String> {
    let tx_id = store
        .insert(Table::Transaction, to_row(&record.transaction)?)
        .ok_or_else(|| rejection(store, Table::Transaction))?;

    if let Some(extension) = &record.extension {
        let mut row = match extension {
            Extension::Order(order) => to_row(order)?,
            Extension::Sharing(sharing) => to_row(sharing)?,
        };
        row.insert("tx".to_string(), Value::from(tx_id));

        store
            .insert(extension.table(), row)
            .ok_or_else(|| rejection(store, extension.table()))?;
    }

    Ok(tx_id)
}

pub(crate) fn to_row<T: Serialize>(value: &T) -> Result<Row, String> {
    match serde_json::to_value(value).map_err(|e| e.to_string())? {
        Value::Object(row) => Ok(row),
        other => Err(format!("expected an object, got {}", other)),
    }
}

fn rejection<S: Store>(store: &S, table: Table) -> String {
    match store.last_error() {
        Some(detail) => format!("{} rejected: {}", table, detail),
        None => format!("{} rejected", table),
    }
}
