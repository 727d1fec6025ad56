//! Raw notes into transactions plus their order or sharing extension.

use crate::core::amount::eval_amount;
use crate::domain::model::{
    Extension, Id, NoteRecord, Order, RawNote, SanitizeOutcome, Scope, Sharing, Table, Transaction,
};
use crate::domain::ports::Alias;
use crate::utils::error::{NoteError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Fields a note may carry: transaction, order and sharing columns without
/// the bookkeeping ones (`id`, `tx`, `created_at`, ...).
pub const NOTE_FIELDS: [&str; 15] = [
    "amount",
    "currency",
    "message",
    "payer",
    "receiver",
    "category",
    "timestamp",
    "items",
    "shop",
    "platform",
    "review",
    "tag",
    "complete",
    "people",
    "shares",
];

/// `alice:2, bob, carol(0.5)` → (alice, 2), (bob, -), (carol, 0.5)
const SHARE_PATTERN: &str =
    r"(?P<person>[^\s,;:=()*]+)\s*(?:[:=*(]\s*(?P<weight>\d+(?:\.\d*)?|\.\d+)\s*\)?)?";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

#[derive(Debug, Clone)]
pub struct SanitizeConfig {
    pub scope: Scope,
    /// Note field name → canonical field name, applied before filtering.
    pub rename: HashMap<String, String>,
    pub scale: f64,
    /// Currency forced onto every note, replacing the note's own.
    pub currency: Option<String>,
    /// Values forced onto every note.
    pub overrides: HashMap<String, Value>,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            scope: Scope::Tx,
            rename: HashMap::new(),
            scale: 1.0,
            currency: None,
            overrides: HashMap::new(),
        }
    }
}

impl SanitizeConfig {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }
}

type Fields = HashMap<String, Value>;

/// Sanitizes every note; a failing note never stops the others.
pub fn sanitize_notes<A: Alias + ?Sized>(
    alias: &A,
    notes: &[RawNote],
    config: &SanitizeConfig,
) -> SanitizeOutcome {
    let mut outcome = SanitizeOutcome::default();
    for (index, note) in notes.iter().enumerate() {
        match sanitize_note(alias, note, config) {
            Ok(record) => outcome.records.push((index, record)),
            Err(error) => outcome.errors.push((index, error)),
        }
    }
    outcome
}

pub fn sanitize_note<A: Alias + ?Sized>(
    alias: &A,
    note: &RawNote,
    config: &SanitizeConfig,
) -> Result<NoteRecord> {
    let fields = prepare_fields(note, config);

    let mut transaction = sanitize_transaction(alias, &fields)?;
    transaction.amount *= config.scale;

    let extension = match config.scope {
        Scope::Tx => None,
        Scope::Order => Some(Extension::Order(sanitize_order(alias, &fields)?)),
        Scope::Sharing => Some(Extension::Sharing(sanitize_sharing(alias, &fields)?)),
    };

    Ok(NoteRecord {
        transaction,
        extension,
    })
}

fn prepare_fields(note: &RawNote, config: &SanitizeConfig) -> Fields {
    let mut fields: Fields = note
        .data
        .iter()
        .map(|(key, value)| {
            let key = config.rename.get(key).unwrap_or(key);
            (key.clone(), value.clone())
        })
        .filter(|(key, _)| NOTE_FIELDS.contains(&key.as_str()))
        .collect();

    if let Some(currency) = &config.currency {
        fields.insert("currency".to_string(), Value::from(currency.as_str()));
    }
    for (key, value) in &config.overrides {
        if NOTE_FIELDS.contains(&key.as_str()) {
            fields.insert(key.clone(), value.clone());
        }
    }
    fields
}

/// Scalar as trimmed text; empty strings, null and containers are absent.
fn text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn resolve_ref<A: Alias + ?Sized>(alias: &A, table: Table, value: Option<&Value>) -> Option<Id> {
    text(value).and_then(|name| alias.resolve(table, &name))
}

fn parse_amount(value: Option<&Value>) -> Result<f64> {
    match value {
        Some(Value::String(expression)) => eval_amount(expression),
        Some(Value::Number(number)) => {
            number
                .as_f64()
                .ok_or_else(|| NoteError::InvalidAmountError {
                    input: number.to_string(),
                })
        }
        other => Err(NoteError::InvalidAmountError {
            input: other.map(Value::to_string).unwrap_or_default(),
        }),
    }
}

fn parse_datetime(field: &str, value: Option<&Value>) -> Result<Option<NaiveDateTime>> {
    let Some(raw) = text(value) else {
        return Ok(None);
    };

    if let Ok(datetime) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(datetime.naive_local()));
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(&raw, format) {
            return Ok(Some(datetime));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&raw, format) {
            return Ok(date.and_hms_opt(0, 0, 0));
        }
    }
    Err(NoteError::InvalidFieldError {
        field: field.to_string(),
        value: raw,
    })
}

pub fn sanitize_transaction<A: Alias + ?Sized>(alias: &A, fields: &Fields) -> Result<Transaction> {
    let payer = resolve_ref(alias, Table::Wallet, fields.get("payer"));
    let receiver = resolve_ref(alias, Table::Wallet, fields.get("receiver"));
    let category = resolve_ref(alias, Table::Tag, fields.get("category"));
    let amount = parse_amount(fields.get("amount"))?;

    if payer.is_none() && receiver.is_none() {
        return Err(NoteError::MissingPartyError);
    }

    let currency = text(fields.get("currency")).ok_or(NoteError::MissingCurrencyError)?;

    Ok(Transaction {
        amount,
        currency,
        message: text(fields.get("message")),
        payer,
        receiver,
        category,
        timestamp: parse_datetime("timestamp", fields.get("timestamp"))?,
    })
}

pub fn sanitize_order<A: Alias + ?Sized>(alias: &A, fields: &Fields) -> Result<Order> {
    let items: Vec<String> = match fields.get("items") {
        Some(Value::Array(items)) => items.iter().filter_map(|item| text(Some(item))).collect(),
        other => text(other)
            .map(|raw| {
                raw.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };
    if items.is_empty() {
        return Err(NoteError::EmptyOrderError);
    }

    Ok(Order {
        items,
        shop: text(fields.get("shop")),
        platform: text(fields.get("platform")),
        review: text(fields.get("review")),
        tag: resolve_ref(alias, Table::Tag, fields.get("tag")),
        complete: parse_datetime("complete", fields.get("complete"))?,
    })
}

fn share_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(SHARE_PATTERN).expect("share pattern is valid"))
}

/// Splits free text like `alice:2, bob` into names and weights (default 1.0).
pub fn parse_share_text(raw: &str) -> (Vec<String>, Vec<f64>) {
    share_pattern()
        .captures_iter(raw)
        .map(|caps| {
            let weight = caps
                .name("weight")
                .and_then(|weight| weight.as_str().parse().ok())
                .unwrap_or(1.0);
            (caps["person"].to_string(), weight)
        })
        .unzip()
}

fn share_weight(value: &Value) -> Result<f64> {
    let invalid = || NoteError::InvalidFieldError {
        field: "shares".to_string(),
        value: value.to_string(),
    };
    match value {
        Value::Null => Ok(1.0),
        Value::Number(number) => number.as_f64().ok_or_else(invalid),
        Value::String(raw) => raw.trim().parse().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn people_names(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(names)) => names.iter().filter_map(|name| text(Some(name))).collect(),
        other => text(other)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

pub fn sanitize_sharing<A: Alias + ?Sized>(alias: &A, fields: &Fields) -> Result<Sharing> {
    let (names, shares) = match fields.get("shares") {
        Some(Value::Array(weights)) => (
            people_names(fields.get("people")),
            weights.iter().map(share_weight).collect::<Result<Vec<_>>>()?,
        ),
        None | Some(Value::Null) => (people_names(fields.get("people")), Vec::new()),
        other => parse_share_text(&text(other).unwrap_or_default()),
    };

    // An unresolved person leaves together with the share at the same position.
    let mut people = Vec::with_capacity(names.len());
    let mut weights = Vec::with_capacity(shares.len());
    for (index, id) in alias
        .resolve_many(Table::Account, &names)
        .into_iter()
        .enumerate()
    {
        if let Some(id) = id {
            people.push(id);
            weights.extend(shares.get(index).copied());
        }
    }
    weights.extend(shares.iter().skip(names.len()).copied());

    if people.is_empty() {
        return Err(NoteError::EmptyGroupError);
    }
    if weights.len() < people.len() {
        weights.resize(people.len(), 1.0);
    }

    Ok(Sharing {
        people,
        shares: weights,
        tag: resolve_ref(alias, Table::Tag, fields.get("tag")),
    })
}
