use crate::core::{ImportReport, Pipeline};
use crate::utils::error::Result;

pub struct ImportEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> ImportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Extracts new notes, advances the cursor past them, then sanitizes and
    /// saves each one. Errors of individual notes end up in the report; only
    /// source-level failures abort the run.
    pub async fn run(&self) -> Result<ImportReport> {
        tracing::info!("Starting note import");

        let notes = self.pipeline.extract().await?;
        let Some(last) = notes.last() else {
            tracing::info!("No new notes");
            return Ok(ImportReport::default());
        };
        tracing::info!("Extracted {} new notes", notes.len());

        let cursor_saved = self.pipeline.mark_seen(last).await;
        if !cursor_saved {
            tracing::warn!("Import cursor was not saved, the next run will see these notes again");
        }

        let outcome = self.pipeline.transform(&notes).await?;
        for (index, error) in &outcome.errors {
            tracing::warn!("notes[{}] rejected: {}", index + 1, error);
        }

        let save_failures = if outcome.records.is_empty() {
            Vec::new()
        } else {
            self.pipeline.load(&outcome).await?
        };
        for (index, error) in &save_failures {
            tracing::warn!("notes[{}] not saved: {}", index + 1, error);
        }

        let imported: Vec<usize> = outcome
            .records
            .iter()
            .map(|(index, _)| *index)
            .filter(|index| !save_failures.iter().any(|(failed, _)| failed == index))
            .collect();
        let mut failures = outcome.errors;
        failures.extend(save_failures);
        failures.sort_by_key(|(index, _)| *index);

        tracing::info!(
            "Imported {} of {} notes ({} rejected)",
            imported.len(),
            notes.len(),
            failures.len()
        );

        Ok(ImportReport {
            notes,
            imported,
            failures,
            cursor_saved,
        })
    }
}
