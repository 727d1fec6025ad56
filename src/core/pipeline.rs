use crate::adapters::alias::AliasTable;
use crate::core::change::find_new;
use crate::core::importer::import_records;
use crate::core::parsers::document::DocumentParser;
use crate::core::parsers::{parse_file, NoteFormat};
use crate::core::resource::{find_resource, update_cursor};
use crate::core::sanitizer::{sanitize_notes, SanitizeConfig};
use crate::core::source::{resolve, ResolvedSource};
use crate::core::{ImportResource, Pipeline, RawNote, Result, SanitizeOutcome, Store};
use crate::utils::error::NoteError;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Import every note, ignoring the resource's cursor.
    pub force: bool,
    /// Note field name → canonical field name.
    pub rename: HashMap<String, String>,
}

/// Imports the notes of one resource into a store.
pub struct NotePipeline<S: Store> {
    store: Arc<S>,
    resource: ImportResource,
    options: ImportOptions,
    documents: DocumentParser,
}

impl<S: Store> NotePipeline<S> {
    pub fn new(store: Arc<S>, resource: ImportResource, options: ImportOptions) -> Self {
        Self {
            store,
            resource,
            options,
            documents: DocumentParser::new(),
        }
    }

    pub fn with_documents(mut self, documents: DocumentParser) -> Self {
        self.documents = documents;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resource(&self) -> &ImportResource {
        &self.resource
    }

    /// The stored cursor when the resource is persisted, so the same pipeline
    /// can run repeatedly.
    fn cursor(&self) -> Result<Option<RawNote>> {
        let Some(id) = self.resource.id else {
            return Ok(self.resource.last_record.clone());
        };
        Ok(find_resource(self.store(), &id.to_string())?.and_then(|stored| stored.last_record))
    }

    fn sanitize_config(&self) -> SanitizeConfig {
        SanitizeConfig {
            scope: self.resource.scope,
            rename: self.options.rename.clone(),
            scale: self.resource.scale.unwrap_or(1.0),
            currency: self.resource.currency.clone(),
            overrides: self.resource.option.overrides.clone(),
        }
    }

    async fn read(&self, source: &ResolvedSource) -> Result<Vec<RawNote>> {
        let explicit = self.resource.option.format.as_deref();
        if !source.is_remote {
            tracing::debug!("Reading local notes from {}", source.location);
            return parse_file(&source.location, explicit);
        }

        // Remote tabular files are parsed as-is; anything else is a document.
        let format = match explicit.filter(|format| !format.trim().is_empty()) {
            Some(format) => Some(NoteFormat::from_extension(format)?),
            None => NoteFormat::detect(&source.location, None).ok(),
        };
        match format {
            Some(format) if format.is_tabular() => {
                tracing::debug!("Fetching {:?} notes", format);
                let body = self.documents.fetch(&source.location).await?;
                format.parse(&body)
            }
            _ => {
                tracing::debug!("Fetching note document");
                self.documents.parse(&source.location).await
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: Store> Pipeline for NotePipeline<S> {
    async fn extract(&self) -> Result<Vec<RawNote>> {
        let source = resolve(&self.resource.link)?;
        let notes = self.read(&source).await?;
        tracing::debug!("Parsed {} notes from '{}'", notes.len(), self.resource.name);

        if self.options.force {
            return Ok(notes);
        }
        let cursor = self.cursor()?;
        Ok(find_new(&notes, cursor.as_ref()).to_vec())
    }

    async fn mark_seen(&self, last: &RawNote) -> bool {
        match self.resource.id {
            Some(id) => update_cursor(self.store(), id, last),
            None => false,
        }
    }

    async fn transform(&self, notes: &[RawNote]) -> Result<SanitizeOutcome> {
        let aliases = AliasTable::from_store(self.store());
        Ok(sanitize_notes(&aliases, notes, &self.sanitize_config()))
    }

    async fn load(&self, outcome: &SanitizeOutcome) -> Result<Vec<(usize, NoteError)>> {
        Ok(import_records(self.store(), &outcome.records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::MemoryStore;
    use crate::core::resource::upsert_resource;
    use crate::core::{Scope, Table};
    use crate::domain::ports::Condition;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        let row = |value: Value| serde_json::from_value(value).unwrap();
        let alice = store.insert(Table::Account, row(json!({"name": "alice"}))).unwrap();
        store
            .insert(Table::Wallet, row(json!({"name": "cash", "account": alice})))
            .unwrap();
        Arc::new(store)
    }

    fn csv_resource(dir: &TempDir, body: &str) -> ImportResource {
        let path = dir.path().join("notes.csv");
        fs::write(&path, body).unwrap();
        ImportResource {
            name: "wallet".to_string(),
            link: path.to_string_lossy().into_owned(),
            scope: Scope::Tx,
            currency: Some("usd".to_string()),
            ..ImportResource::default()
        }
    }

    #[tokio::test]
    async fn test_extract_respects_stored_cursor() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store();
        let resource = upsert_resource(
            store.as_ref(),
            &csv_resource(&dir, "amount,payer\n1,cash\n2,cash\n3,cash\n"),
        )
        .unwrap();
        let pipeline = NotePipeline::new(store.clone(), resource, ImportOptions::default());

        let notes = pipeline.extract().await.unwrap();
        assert_eq!(notes.len(), 3);
        assert!(pipeline.mark_seen(&notes[1]).await);

        let notes = pipeline.extract().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].get("amount"), Some(&json!("3")));
    }

    #[tokio::test]
    async fn test_force_ignores_cursor() {
        let dir = TempDir::new().unwrap();
        let mut resource = csv_resource(&dir, "amount,payer\n1,cash\n2,cash\n");
        resource.last_record = Some(RawNote::from_iter([("amount", json!("2"))]));
        let options = ImportOptions {
            force: true,
            ..ImportOptions::default()
        };
        let pipeline = NotePipeline::new(seeded_store(), resource, options);

        assert_eq!(pipeline.extract().await.unwrap().len(), 2);
        assert!(!pipeline.mark_seen(&RawNote::new()).await);
    }

    #[tokio::test]
    async fn test_transform_and_load() {
        let dir = TempDir::new().unwrap();
        let resource = csv_resource(&dir, "Amount,Wallet\n10*2,cash\nabc,cash\n");
        let options = ImportOptions {
            rename: HashMap::from([
                ("Amount".to_string(), "amount".to_string()),
                ("Wallet".to_string(), "payer".to_string()),
            ]),
            ..ImportOptions::default()
        };
        let pipeline = NotePipeline::new(seeded_store(), resource, options);

        let notes = pipeline.extract().await.unwrap();
        let outcome = pipeline.transform(&notes).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.errors[0].0, 1);

        let failures = pipeline.load(&outcome).await.unwrap();
        assert!(failures.is_empty());
        let rows = pipeline.store().query(Table::Transaction, &Condition::All);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["amount"], json!(20.0));
    }

    #[tokio::test]
    async fn test_resource_settings_apply_to_every_note() {
        let dir = TempDir::new().unwrap();
        let mut resource = csv_resource(
            &dir,
            "amount,payer,currency,message\n4,cash,usd,lunch\n5,cash,,\n",
        );
        resource.currency = Some("eur".to_string());
        resource.scale = Some(10.0);
        resource.option.overrides = HashMap::from([("message".to_string(), json!("weekly"))]);
        let pipeline = NotePipeline::new(seeded_store(), resource, ImportOptions::default());

        let notes = pipeline.extract().await.unwrap();
        let outcome = pipeline.transform(&notes).await.unwrap();
        assert!(outcome.errors.is_empty());
        pipeline.load(&outcome).await.unwrap();

        let rows = pipeline.store().query(Table::Transaction, &Condition::All);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row["currency"], json!("eur"));
            assert_eq!(row["message"], json!("weekly"));
        }
        assert_eq!(rows[0]["amount"], json!(40.0));
    }
}
