use crate::domain::model::RawNote;

/// Notes strictly after the first one matching `cursor` on the cursor's fields.
///
/// Without a cursor, with an empty cursor, or when nothing matches, every note
/// counts as new: an unknown watermark must never hide records.
pub fn find_new<'a>(notes: &'a [RawNote], cursor: Option<&RawNote>) -> &'a [RawNote] {
    let Some(cursor) = cursor.filter(|cursor| !cursor.is_empty()) else {
        return notes;
    };

    match notes.iter().position(|note| note.matches(cursor)) {
        Some(index) => &notes[index + 1..],
        None => notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notes() -> Vec<RawNote> {
        (1..=4)
            .map(|day| {
                RawNote::from_iter([
                    ("date", json!(format!("2024-01-0{}", day))),
                    ("amount", json!(day * 10)),
                ])
            })
            .collect()
    }

    #[test]
    fn test_returns_notes_after_cursor() {
        let notes = notes();
        for k in 0..notes.len() {
            assert_eq!(find_new(&notes, Some(&notes[k])), &notes[k + 1..]);
        }
    }

    #[test]
    fn test_partial_cursor_matches_subset_of_fields() {
        let notes = notes();
        let cursor = RawNote::from_iter([("date", json!("2024-01-02"))]);

        assert_eq!(find_new(&notes, Some(&cursor)), &notes[2..]);
    }

    #[test]
    fn test_first_match_wins() {
        let mut notes = notes();
        notes.push(notes[0].clone());
        notes.push(RawNote::from_iter([("date", json!("2024-01-09"))]));

        assert_eq!(find_new(&notes, Some(&notes[0].clone())).len(), 5);
    }

    #[test]
    fn test_unmatched_or_missing_cursor_returns_everything() {
        let notes = notes();
        let unmatched = RawNote::from_iter([("date", json!("1999-12-31"))]);

        assert_eq!(find_new(&notes, Some(&unmatched)), notes.as_slice());
        assert_eq!(find_new(&notes, None), notes.as_slice());
        assert_eq!(find_new(&notes, Some(&RawNote::new())), notes.as_slice());
        assert!(find_new(&[], Some(&unmatched)).is_empty());
    }
}
