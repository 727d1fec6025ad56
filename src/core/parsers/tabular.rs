use crate::domain::model::RawNote;
use crate::utils::error::{NoteError, Result};
use serde_json::Value;

/// Every CSV row becomes a note keyed by the header row. Short rows leave
/// the trailing fields out and extra cells are dropped.
pub fn parse_csv(content: &str) -> Result<Vec<RawNote>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();

    let mut notes = Vec::new();
    for row in reader.records() {
        let row = row?;
        notes.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(key, value)| (key, Value::String(value.to_string())))
                .collect(),
        );
    }
    Ok(notes)
}

pub fn parse_json(content: &str) -> Result<Vec<RawNote>> {
    let value: Value = serde_json::from_str(content)?;
    notes_from_sequence(value, "JSON")
}

pub fn parse_yaml(content: &str) -> Result<Vec<RawNote>> {
    // An empty document is an empty note list.
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_yaml::from_str(content)?;
    notes_from_sequence(value, "YAML")
}

fn notes_from_sequence(value: Value, encoding: &str) -> Result<Vec<RawNote>> {
    let Value::Array(items) = value else {
        return Err(NoteError::FormatError {
            message: format!("{} notes must be a sequence of records", encoding),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => Ok(fields.into_iter().collect()),
            other => Err(NoteError::FormatError {
                message: format!(
                    "{} notes[{}] is not a record: {}",
                    encoding, index, other
                ),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_csv() {
        let notes = parse_csv("amount,payer,message\n\"1,000\",cash,lunch\n25,,coffee\n").unwrap();

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].get("amount"), Some(&json!("1,000")));
        assert_eq!(notes[0].get("payer"), Some(&json!("cash")));
        assert_eq!(notes[1].get("payer"), Some(&json!("")));
        assert_eq!(notes[1].get("message"), Some(&json!("coffee")));
    }

    #[test]
    fn test_parse_csv_tolerates_ragged_rows() {
        let notes = parse_csv("amount,payer,message\n5,cash\n6,cash,tea,extra\n7,cash,ok\n").unwrap();

        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].get("payer"), Some(&json!("cash")));
        assert_eq!(notes[0].get("message"), None);
        assert_eq!(notes[1].get("message"), Some(&json!("tea")));
        assert_eq!(notes[1].data.len(), 3);
        assert_eq!(notes[2].get("message"), Some(&json!("ok")));
    }

    #[test]
    fn test_parse_json() {
        let notes = parse_json(r#"[{"amount": 12.5, "items": ["a", "b"]}, {"amount": "3*4"}]"#)
            .unwrap();

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].get("items"), Some(&json!(["a", "b"])));
        assert_eq!(notes[1].get("amount"), Some(&json!("3*4")));
    }

    #[test]
    fn test_parse_json_rejects_non_sequence() {
        assert!(matches!(
            parse_json(r#"{"amount": 1}"#),
            Err(NoteError::FormatError { .. })
        ));
        assert!(matches!(
            parse_json(r#"[1, 2]"#),
            Err(NoteError::FormatError { .. })
        ));
    }

    #[test]
    fn test_parse_yaml() {
        let content = "
- amount: 100
  payer: cash
  shares: alice:2, bob
- amount: '20+5'
  receiver: bank
";
        let notes = parse_yaml(content).unwrap();

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].get("amount"), Some(&json!(100)));
        assert_eq!(notes[0].get("shares"), Some(&json!("alice:2, bob")));
        assert_eq!(notes[1].get("amount"), Some(&json!("20+5")));
        assert!(parse_yaml("").unwrap().is_empty());
    }
}
