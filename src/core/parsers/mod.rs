//! Note parsers. A [`NoteFormat`] turns text into raw notes; remote documents
//! go through [`document`] first, which may decrypt them into HTML.

pub mod document;
pub mod html;
pub mod tabular;

use crate::domain::model::RawNote;
use crate::utils::error::{NoteError, Result};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteFormat {
    Csv,
    Json,
    Yaml,
    Html,
}

impl NoteFormat {
    pub fn from_extension(extension: &str) -> Result<Self> {
        let normalized = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "csv" => Ok(NoteFormat::Csv),
            "json" => Ok(NoteFormat::Json),
            "yaml" | "yml" => Ok(NoteFormat::Yaml),
            "html" | "htm" => Ok(NoteFormat::Html),
            "" => Err(NoteError::FormatError {
                message: "missing file extension".to_string(),
            }),
            other => Err(NoteError::FormatError {
                message: format!("'.{}' is not one of csv, json, yaml, html", other),
            }),
        }
    }

    /// An explicit format wins over the extension of `location`.
    pub fn detect(location: &str, explicit: Option<&str>) -> Result<Self> {
        match explicit.filter(|format| !format.trim().is_empty()) {
            Some(format) => Self::from_extension(format),
            None => {
                let path = location.split(['?', '#']).next().unwrap_or(location);
                let extension = Path::new(path)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .unwrap_or_default();
                Self::from_extension(extension)
            }
        }
    }

    pub fn is_tabular(&self) -> bool {
        !matches!(self, NoteFormat::Html)
    }

    pub fn parse(&self, content: &str) -> Result<Vec<RawNote>> {
        match self {
            NoteFormat::Csv => tabular::parse_csv(content),
            NoteFormat::Json => tabular::parse_json(content),
            NoteFormat::Yaml => tabular::parse_yaml(content),
            NoteFormat::Html => html::parse_tables(content),
        }
    }
}

/// Reads a local note file, choosing the parser by format or extension.
pub fn parse_file(path: &str, format: Option<&str>) -> Result<Vec<RawNote>> {
    let format = NoteFormat::detect(path, format)?;
    let content = std::fs::read_to_string(path)?;
    format.parse(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(NoteFormat::detect("a/notes.csv", None).unwrap(), NoteFormat::Csv);
        assert_eq!(NoteFormat::detect("notes.YML", None).unwrap(), NoteFormat::Yaml);
        assert_eq!(
            NoteFormat::detect("notes.txt", Some(".json")).unwrap(),
            NoteFormat::Json
        );
        assert_eq!(
            NoteFormat::detect("notes.csv", Some("yaml")).unwrap(),
            NoteFormat::Yaml
        );
        assert_eq!(
            NoteFormat::detect("https://host/notes.json?dl=1", None).unwrap(),
            NoteFormat::Json
        );
        assert_eq!(NoteFormat::detect("notes.csv", Some("")).unwrap(), NoteFormat::Csv);
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(
            NoteFormat::detect("notes", None),
            Err(NoteError::FormatError { .. })
        ));
        assert!(matches!(
            NoteFormat::detect("notes.txt", None),
            Err(NoteError::FormatError { .. })
        ));
        assert!(matches!(
            NoteFormat::detect("notes.csv", Some("xlsx")),
            Err(NoteError::FormatError { .. })
        ));
    }
}
