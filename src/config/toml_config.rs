use crate::core::resource::{find_resource, upsert_resource};
use crate::core::{Condition, ImportResource, Row, Scope, Store, Table};
use crate::domain::model::ResourceOption;
use crate::utils::error::{NoteError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub notes: NotesConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotesConfig {
    /// Directory receiving a JSON log of rejected notes per run.
    pub rejected_dir: Option<String>,
    /// Canonical field → label used by the note sources, e.g. `amount = "Amount"`.
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    #[serde(default)]
    pub wallets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub link: String,
    pub scope: Option<String>,
    pub format: Option<String>,
    pub currency: Option<String>,
    pub scale: Option<f64>,
    /// Field values forced onto every note, e.g. `{ category = "food" }`.
    #[serde(default)]
    pub overrides: HashMap<String, Value>,
}

impl ResourceConfig {
    pub fn to_resource(&self) -> Result<ImportResource> {
        Ok(ImportResource {
            name: self.name.clone(),
            link: self.link.clone(),
            scope: self.scope.as_deref().unwrap_or_default().parse::<Scope>()?,
            option: ResourceOption {
                format: self.format.clone(),
                overrides: self.overrides.clone(),
            },
            currency: self.currency.clone(),
            scale: self.scale,
            ..ImportResource::default()
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                path: "money.json".to_string(),
            },
            notes: NotesConfig::default(),
            accounts: Vec::new(),
            tags: Vec::new(),
            resources: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML after replacing `${VAR}` with environment values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| NoteError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> String {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN
            .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    /// Note label → canonical field, the direction the sanitizer renames in.
    pub fn rename_map(&self) -> HashMap<String, String> {
        self.notes
            .fields
            .iter()
            .map(|(field, label)| (label.clone(), field.clone()))
            .collect()
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|resource| resource.name == name)
    }

    /// Creates the configured accounts, wallets, tags and resources that the
    /// store does not know yet. Resources already stored get their settings
    /// refreshed but keep their cursor.
    pub fn apply_to<S: Store>(&self, store: &S) -> Result<()> {
        for account in &self.accounts {
            let account_id = ensure_named(store, Table::Account, &account.name, Row::new())?;
            for wallet in &account.wallets {
                let mut row = Row::new();
                row.insert("account".to_string(), Value::from(account_id));
                ensure_named(store, Table::Wallet, wallet, row)?;
            }
        }
        for tag in &self.tags {
            ensure_named(store, Table::Tag, tag, Row::new())?;
        }
        for resource in &self.resources {
            upsert_resource(store, &resource.to_resource()?)?;
        }
        Ok(())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("store.path", &self.store.path)?;

        if let Some(dir) = &self.notes.rejected_dir {
            validation::validate_path("notes.rejected_dir", dir)?;
        }

        for field in self.notes.fields.keys() {
            validation::validate_one_of("notes.fields", field, &crate::core::sanitizer::NOTE_FIELDS)?;
        }

        for account in &self.accounts {
            validation::validate_non_empty_string("accounts.name", &account.name)?;
        }

        for resource in &self.resources {
            validation::validate_non_empty_string("resources.name", &resource.name)?;
            validation::validate_link("resources.link", &resource.link)?;
            if let Some(scope) = &resource.scope {
                validation::validate_one_of("resources.scope", scope, &Scope::NAMES)?;
            }
            if let Some(scale) = resource.scale {
                validation::validate_positive("resources.scale", scale)?;
            }
            for field in resource.overrides.keys() {
                validation::validate_one_of(
                    "resources.overrides",
                    field,
                    &crate::core::sanitizer::NOTE_FIELDS,
                )?;
            }
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// Id of the row named `name`, inserting `row` with that name when missing.
fn ensure_named<S: Store>(store: &S, table: Table, name: &str, mut row: Row) -> Result<i64> {
    if let Some(id) = store
        .query(table, &Condition::eq("name", name))
        .first()
        .and_then(|existing| existing.get("id"))
        .and_then(Value::as_i64)
    {
        return Ok(id);
    }

    row.insert("name".to_string(), Value::from(name));
    store.insert(table, row).ok_or_else(|| NoteError::SaveError {
        what: format!("{} '{}'", table, name),
        reason: store.last_error().unwrap_or_default(),
    })
}

/// Stored resource by name or id, falling back to the configured one.
pub fn lookup_resource<S: Store>(
    config: &AppConfig,
    store: &S,
    key: &str,
) -> Result<ImportResource> {
    if let Some(resource) = find_resource(store, key)? {
        return Ok(resource);
    }
    match config.resource(key) {
        Some(resource) => upsert_resource(store, &resource.to_resource()?),
        None => Err(NoteError::NotFoundError {
            what: "resource".to_string(),
            key: key.to_string(),
        }),
    }
}
