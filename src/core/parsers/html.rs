use crate::domain::model::RawNote;
use crate::utils::error::{NoteError, Result};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

struct TableSelectors {
    table: Selector,
    row: Selector,
    header: Selector,
    cell: Selector,
    any_cell: Selector,
}

impl TableSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            table: selector("table")?,
            row: selector("tr")?,
            header: selector("th")?,
            cell: selector("td")?,
            any_cell: selector("th, td")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| NoteError::FormatError {
        message: format!("invalid selector '{}': {:?}", css, e),
    })
}

/// Stripped text nodes of `element`, joined by `separator`.
fn text_of(element: &ElementRef, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Extracts one note per non-empty data row of every `<table>`, in document order.
pub fn parse_tables(html: &str) -> Result<Vec<RawNote>> {
    let selectors = TableSelectors::new()?;
    let document = Html::parse_document(html);

    let mut notes = Vec::new();
    for table in document.select(&selectors.table) {
        notes.extend(parse_table(table, &selectors));
    }
    Ok(notes)
}

fn parse_table(table: ElementRef, selectors: &TableSelectors) -> Vec<RawNote> {
    let rows: Vec<ElementRef> = table.select(&selectors.row).collect();
    let Some(first_row) = rows.first() else {
        return Vec::new();
    };

    let mut header_cells: Vec<ElementRef> = table.select(&selectors.header).collect();
    if header_cells.is_empty() {
        header_cells = first_row.select(&selectors.any_cell).collect();
    }
    let labels: Vec<String> = header_cells
        .iter()
        .map(|cell| text_of(cell, ""))
        .filter(|label| !label.is_empty())
        .collect();

    rows[1..]
        .iter()
        .filter(|row| !text_of(row, "").is_empty())
        .map(|row| {
            labels
                .iter()
                .zip(row.select(&selectors.cell))
                .map(|(label, cell)| {
                    let text = text_of(&cell, "\n");
                    let value = if text.is_empty() {
                        Value::Null
                    } else {
                        Value::String(text)
                    };
                    (label.clone(), value)
                })
                .collect()
        })
        .collect()
}
