use crate::config::toml_config::{lookup_resource, AppConfig};
use crate::config::ImportArgs;
use crate::core::resource::upsert_resource;
use crate::core::sanitizer::NOTE_FIELDS;
use crate::core::{ImportResource, Scope, Store};
use crate::utils::error::{NoteError, Result};
use crate::utils::validation;
use serde_json::Value;

/// The resource an `import` invocation targets. A `--link` creates or updates
/// the resource named by `--name` (or `--resource`, or the link itself);
/// otherwise `--resource` must name a stored or configured one. Command line
/// settings override the stored ones for this run and are persisted with the
/// resource.
pub fn import_resource<S: Store>(
    args: &ImportArgs,
    config: &AppConfig,
    store: &S,
) -> Result<ImportResource> {
    let mut resource = match (&args.link, &args.resource) {
        (Some(link), key) => {
            validation::validate_link("--link", link)?;
            let name = args
                .name
                .clone()
                .or_else(|| key.clone())
                .unwrap_or_else(|| link.clone());
            let mut resource = lookup_resource(config, store, &name).unwrap_or(ImportResource {
                name,
                ..ImportResource::default()
            });
            resource.link = link.clone();
            resource
        }
        (None, Some(key)) => lookup_resource(config, store, key)?,
        (None, None) => {
            return Err(NoteError::ConfigError {
                message: "import needs --resource or --link".to_string(),
            })
        }
    };

    if let Some(scope) = &args.scope {
        resource.scope = scope.parse::<Scope>()?;
    }
    if let Some(format) = &args.format {
        resource.option.format = Some(format.clone());
    }
    if let Some(currency) = &args.currency {
        resource.currency = Some(currency.clone());
    }
    if let Some(scale) = args.scale {
        validation::validate_positive("--scale", scale)?;
        resource.scale = Some(scale);
    }
    for entry in &args.overrides {
        let (field, value) = parse_override(entry)?;
        resource.option.overrides.insert(field, value);
    }

    upsert_resource(store, &resource)
}

/// `field=value` into a note field and its text value.
fn parse_override(entry: &str) -> Result<(String, Value)> {
    let Some((field, value)) = entry.split_once('=') else {
        return Err(NoteError::InvalidConfigValueError {
            field: "--set".to_string(),
            value: entry.to_string(),
            reason: "expected FIELD=VALUE".to_string(),
        });
    };
    let field = field.trim();
    validation::validate_one_of("--set", field, &NOTE_FIELDS)?;
    Ok((field.to_string(), Value::from(value.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::MemoryStore;

    fn args() -> ImportArgs {
        ImportArgs {
            resource: None,
            link: None,
            name: None,
            scope: None,
            format: None,
            currency: None,
            scale: None,
            overrides: Vec::new(),
            force: false,
            rejected_dir: None,
        }
    }

    #[test]
    fn test_link_creates_resource() {
        let store = MemoryStore::new();
        let args = ImportArgs {
            link: Some("notes/bank.csv".to_string()),
            name: Some("bank".to_string()),
            scope: Some("order".to_string()),
            ..args()
        };

        let resource = import_resource(&args, &AppConfig::default(), &store).unwrap();

        assert!(resource.id.is_some());
        assert_eq!(resource.name, "bank");
        assert_eq!(resource.scope, Scope::Order);
    }

    #[test]
    fn test_overrides_keep_identity() {
        let store = MemoryStore::new();
        let first = ImportArgs {
            link: Some("bank.csv".to_string()),
            ..args()
        };
        let created = import_resource(&first, &AppConfig::default(), &store).unwrap();

        let second = ImportArgs {
            resource: Some("bank.csv".to_string()),
            currency: Some("eur".to_string()),
            ..args()
        };
        let updated = import_resource(&second, &AppConfig::default(), &store).unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.currency.as_deref(), Some("eur"));
    }

    #[test]
    fn test_set_persists_note_overrides() {
        let store = MemoryStore::new();
        let with_set = ImportArgs {
            link: Some("bank.csv".to_string()),
            overrides: vec!["category = food".to_string(), "message=monthly".to_string()],
            ..args()
        };

        let resource = import_resource(&with_set, &AppConfig::default(), &store).unwrap();

        assert_eq!(resource.option.overrides["category"], Value::from("food"));
        assert_eq!(resource.option.overrides["message"], Value::from("monthly"));

        for bad in ["category", "nickname=x"] {
            let malformed = ImportArgs {
                link: Some("bank.csv".to_string()),
                overrides: vec![bad.to_string()],
                ..args()
            };
            assert!(import_resource(&malformed, &AppConfig::default(), &store).is_err());
        }
    }

    #[test]
    fn test_requires_a_target() {
        let store = MemoryStore::new();
        assert!(import_resource(&args(), &AppConfig::default(), &store).is_err());

        let unknown = ImportArgs {
            resource: Some("ghost".to_string()),
            ..args()
        };
        assert!(matches!(
            import_resource(&unknown, &AppConfig::default(), &store),
            Err(NoteError::NotFoundError { .. })
        ));
    }
}
