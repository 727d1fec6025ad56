use crate::utils::error::{NoteError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Store-assigned identifier. Unresolved references are `None`, never `0`.
pub type Id = i64;

/// A bill holder. `None` stands for a party outside the group.
pub type PersonRef = Option<Id>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Account,
    Wallet,
    Tag,
    Transaction,
    Order,
    Sharing,
    Event,
    Resource,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Account => "account",
            Table::Wallet => "wallet",
            Table::Tag => "tag",
            Table::Transaction => "tx",
            Table::Order => "shopping",
            Table::Sharing => "sharing",
            Table::Event => "event",
            Table::Resource => "resource",
        }
    }

    pub fn all() -> [Table; 8] {
        [
            Table::Account,
            Table::Wallet,
            Table::Tag,
            Table::Transaction,
            Table::Order,
            Table::Sharing,
            Table::Event,
            Table::Resource,
        ]
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One unvalidated record as a parser produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawNote {
    pub data: HashMap<String, Value>,
}

impl RawNote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when every field of `cursor` holds the same value here.
    /// A field missing from this note compares as `null`.
    pub fn matches(&self, cursor: &RawNote) -> bool {
        cursor
            .data
            .iter()
            .all(|(key, value)| self.data.get(key).unwrap_or(&Value::Null) == value)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for RawNote {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Which extension record an import populates next to the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Tx,
    Order,
    Sharing,
}

impl Scope {
    pub const NAMES: [&'static str; 3] = ["tx", "order", "sharing"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Tx => "tx",
            Scope::Order => "order",
            Scope::Sharing => "sharing",
        }
    }
}

impl FromStr for Scope {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "tx" | "transaction" => Ok(Scope::Tx),
            "order" => Ok(Scope::Order),
            "sharing" => Ok(Scope::Sharing),
            other => Err(NoteError::InvalidConfigValueError {
                field: "scope".to_string(),
                value: other.to_string(),
                reason: format!("Expected one of: {}", Scope::NAMES.join(", ")),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub payer: Option<Id>,
    #[serde(default)]
    pub receiver: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(default)]
    pub tag: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sharing {
    pub people: Vec<Id>,
    pub shares: Vec<f64>,
    #[serde(default)]
    pub tag: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    Order(Order),
    Sharing(Sharing),
}

impl Extension {
    pub fn table(&self) -> Table {
        match self {
            Extension::Order(_) => Table::Order,
            Extension::Sharing(_) => Table::Sharing,
        }
    }
}

/// A sanitized note: a transaction plus the extension its scope asks for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteRecord {
    #[serde(rename = "tx")]
    pub transaction: Transaction,
    #[serde(flatten)]
    pub extension: Option<Extension>,
}

/// Sanitized notes and per-note failures, both keyed by the note's index.
#[derive(Debug, Default)]
pub struct SanitizeOutcome {
    pub records: Vec<(usize, NoteRecord)>,
    pub errors: Vec<(usize, NoteError)>,
}

impl SanitizeOutcome {
    pub fn len(&self) -> usize {
        self.records.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Field values forced onto every note of the resource.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub overrides: HashMap<String, Value>,
}

/// Persisted metadata of a note source, including its import cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    pub name: String,
    pub link: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub option: ResourceOption,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub last_import: Option<NaiveDateTime>,
    #[serde(default)]
    pub last_record: Option<RawNote>,
}

/// Outcome of one import run.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Notes newer than the cursor, in source order.
    pub notes: Vec<RawNote>,
    /// Indices into `notes` that were persisted.
    pub imported: Vec<usize>,
    /// Parse and save failures, keyed by index into `notes`.
    pub failures: Vec<(usize, NoteError)>,
    pub cursor_saved: bool,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A persisted sharing joined with its transaction and the wallets' owners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingEntry {
    pub id: Id,
    pub tx: Id,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub payer: PersonRef,
    #[serde(default)]
    pub receiver: PersonRef,
    #[serde(default)]
    pub people: Vec<Id>,
    #[serde(default)]
    pub shares: Vec<f64>,
    #[serde(default)]
    pub tag: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub person: PersonRef,
    pub paid: f64,
    pub received: f64,
    pub needs: f64,
}

impl Bill {
    pub fn new(person: PersonRef) -> Self {
        Self {
            person,
            paid: 0.0,
            received: 0.0,
            needs: 0.0,
        }
    }

    pub fn refund(&self) -> f64 {
        self.paid - self.needs
    }
}

/// Settlement snapshot of a set of sharings in one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub currency: String,
    #[serde(default)]
    pub rates: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub tag: Option<Id>,
    pub bills: Vec<Bill>,
    pub sharings: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: PersonRef,
    pub to: PersonRef,
    pub amount: f64,
}
