//! Schema validation for raw records.
//!
//! Validation is pure and never fails: problems are collected into a
//! `ValidationResult` so one bad record in a batch does not affect others.
//! Errors make a record unusable; warnings describe parts the parser will
//! skip or repair.

use crate::reference::{Reference, AUTHORITY_LEN};
use crate::types::{RawRecord, RecordKind, WorkoutType};
use serde::Serialize;

/// Outcome of validating one raw record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn require(&mut self, record: &RawRecord, tag: &str) {
        if record.tag_list().non_empty_value(tag).is_none() {
            self.error(format!("missing required '{}' tag", tag));
        }
    }
}

type Rules = fn(&RawRecord, &mut ValidationResult);

/// Per-kind validation rules.
fn rules_for(kind: RecordKind) -> Rules {
    match kind {
        RecordKind::Exercise => validate_exercise,
        RecordKind::Template => validate_template,
        RecordKind::WorkoutRecord => validate_workout_record,
        RecordKind::Collection => validate_collection,
    }
}

/// Validate a raw record against the schema for its kind.
pub fn validate(record: &RawRecord) -> ValidationResult {
    let mut result = ValidationResult::new();

    let Some(kind) = record.record_kind() else {
        result.error(format!("unsupported record kind {}", record.kind));
        return result;
    };

    if record.id.trim().is_empty() {
        result.error("record has no id");
    }
    if record.authority.len() != AUTHORITY_LEN
        || !record.authority.chars().all(|c| c.is_ascii_hexdigit())
    {
        result.error(format!(
            "authority '{}' is not a {}-character hex key",
            record.authority, AUTHORITY_LEN
        ));
    }

    rules_for(kind)(record, &mut result);
    result
}

fn validate_exercise(record: &RawRecord, result: &mut ValidationResult) {
    for tag in ["d", "title", "equipment"] {
        result.require(record, tag);
    }

    let tags = record.tag_list();
    let format = tags.first("format");
    let units = tags.first("format_units");

    match (format, units) {
        (None, _) => result.error("missing required 'format' tag"),
        (_, None) => result.error("missing required 'format_units' tag"),
        (Some(format), Some(units)) => {
            if format.len() != units.len() {
                result.error(format!(
                    "'format' declares {} parameters but 'format_units' declares {}",
                    format.len(),
                    units.len()
                ));
            }
            if format.is_empty() {
                result.warn("exercise declares no parameters");
            }
        }
    }
}

fn validate_template(record: &RawRecord, result: &mut ValidationResult) {
    result.require(record, "d");
    result.require(record, "title");

    let tags = record.tag_list();
    let mut usable = 0;
    for entry in tags.entries("exercise") {
        match entry.first() {
            Some(raw) => match check_reference(raw, RecordKind::Exercise) {
                Ok(()) => usable += 1,
                Err(message) => result.warn(format!("skipping exercise entry: {}", message)),
            },
            None => result.warn("skipping empty exercise entry"),
        }
    }
    if usable == 0 {
        result.warn("template has no usable exercise entries");
    }

    if let Some(kind) = tags.non_empty_value("type") {
        if WorkoutType::parse(kind).is_none() {
            result.warn(format!("unknown template type '{}'", kind));
        }
    }
    if let Some(duration) = tags.non_empty_value("duration") {
        if duration.parse::<u32>().is_err() {
            result.warn(format!("ignoring non-numeric duration '{}'", duration));
        }
    }
}

fn validate_workout_record(record: &RawRecord, result: &mut ValidationResult) {
    for tag in ["title", "type", "start", "end", "completed"] {
        result.require(record, tag);
    }

    let tags = record.tag_list();
    if let Some(kind) = tags.non_empty_value("type") {
        if WorkoutType::parse(kind).is_none() {
            result.error(format!("unknown workout type '{}'", kind));
        }
    }

    let start = timestamp_field(record, "start", result);
    let end = timestamp_field(record, "end", result);
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            result.warn("workout ends before it starts");
        }
    }

    if let Some(completed) = tags.non_empty_value("completed") {
        if !matches!(completed, "true" | "false") {
            result.error(format!("'completed' must be true or false, got '{}'", completed));
        }
    }

    if let Some(template) = tags.non_empty_value("template") {
        if let Err(message) = check_reference(template, RecordKind::Template) {
            result.warn(format!("ignoring template reference: {}", message));
        }
    }

    for entry in tags.entries("exercise") {
        if let Some(raw) = entry.first() {
            if let Err(message) = check_reference(raw, RecordKind::Exercise) {
                result.warn(format!("skipping set: {}", message));
            }
        }
    }
}

fn validate_collection(record: &RawRecord, result: &mut ValidationResult) {
    result.require(record, "d");

    let tags = record.tag_list();
    if tags.non_empty_value("title").is_none() {
        result.warn("collection has no title");
    }
    for raw in tags.all_values("a") {
        if let Err(error) = Reference::parse(raw) {
            result.warn(format!("skipping reference '{}': {}", raw, error));
        }
    }
}

fn timestamp_field(record: &RawRecord, tag: &str, result: &mut ValidationResult) -> Option<i64> {
    let value = record.tag_list().non_empty_value(tag)?;
    match value.parse::<i64>() {
        Ok(seconds) => Some(seconds),
        Err(_) => {
            result.error(format!("'{}' must be a unix timestamp, got '{}'", tag, value));
            None
        }
    }
}

/// Check reference syntax and that it points at the expected kind.
fn check_reference(raw: &str, expected: RecordKind) -> std::result::Result<(), String> {
    let reference = Reference::parse(raw).map_err(|e| format!("'{}': {}", raw, e))?;
    if reference.kind() != expected {
        return Err(format!(
            "'{}' points at {} but {} was expected",
            raw,
            reference.kind(),
            expected
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::reference::tests::ALICE;
    use crate::tags::tag;

    pub fn exercise_record(id: &str, d: &str) -> RawRecord {
        RawRecord {
            id: id.into(),
            kind: RecordKind::EXERCISE_CODE,
            authority: ALICE.into(),
            created_at: 1_700_000_000,
            tags: vec![
                tag(&["d", d]),
                tag(&["title", "Bench Press"]),
                tag(&["format", "weight", "reps", "rpe", "set_type"]),
                tag(&["format_units", "kg", "count", "0-10", "warmup|normal|drop|failure"]),
                tag(&["equipment", "barbell"]),
            ],
            content: "Press the bar".into(),
        }
    }

    fn workout_record() -> RawRecord {
        RawRecord {
            id: "w1".into(),
            kind: RecordKind::WORKOUT_RECORD_CODE,
            authority: ALICE.into(),
            created_at: 1_700_000_000,
            tags: vec![
                tag(&["d", "session-1"]),
                tag(&["title", "Push"]),
                tag(&["type", "strength"]),
                tag(&["start", "1700000000"]),
                tag(&["end", "1700003600"]),
                tag(&["completed", "true"]),
            ],
            content: String::new(),
        }
    }

    #[test]
    fn test_valid_exercise() {
        let result = validate(&exercise_record("e1", "bench"));
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_exercise_missing_fields() {
        let mut record = exercise_record("e1", "bench");
        record.tags.retain(|t| t[0] != "equipment" && t[0] != "format_units");
        let result = validate(&record);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("equipment")));
        assert!(result.errors.iter().any(|e| e.contains("format_units")));
    }

    #[test]
    fn test_exercise_format_length_mismatch_is_error() {
        let mut record = exercise_record("e1", "bench");
        record.tags.retain(|t| t[0] != "format_units");
        record.tags.push(tag(&["format_units", "kg"]));
        let result = validate(&record);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("declares 4 parameters"));
    }

    #[test]
    fn test_unknown_kind_is_invalid() {
        let mut record = exercise_record("e1", "bench");
        record.kind = 1;
        assert!(!validate(&record).is_valid);
    }

    #[test]
    fn test_bad_authority_is_invalid() {
        let mut record = exercise_record("e1", "bench");
        record.authority = "npub1xyz".into();
        let result = validate(&record);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("hex key"));
    }

    #[test]
    fn test_template_corrupted_reference_is_reported() {
        let record = RawRecord {
            id: "t1".into(),
            kind: RecordKind::TEMPLATE_CODE,
            authority: ALICE.into(),
            created_at: 1,
            tags: vec![
                tag(&["d", "push"]),
                tag(&["title", "Push Day"]),
                tag(&["exercise", &format!("33401:{ALICE}:bench,100,8"), "100", "8"]),
            ],
            content: String::new(),
        };
        let result = validate(&record);
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.contains("leaked")));
        assert!(result.warnings.iter().any(|w| w.contains("no usable")));
    }

    #[test]
    fn test_template_entry_of_wrong_kind_is_skipped() {
        let record = RawRecord {
            id: "t1".into(),
            kind: RecordKind::TEMPLATE_CODE,
            authority: ALICE.into(),
            created_at: 1,
            tags: vec![
                tag(&["d", "push"]),
                tag(&["title", "Push Day"]),
                tag(&["exercise", &format!("33402:{ALICE}:other-template")]),
            ],
            content: String::new(),
        };
        let result = validate(&record);
        assert!(result.warnings.iter().any(|w| w.contains("was expected")));
    }

    #[test]
    fn test_valid_workout_record() {
        let result = validate(&workout_record());
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn test_workout_record_requires_completion_flag() {
        let mut record = workout_record();
        record.tags.retain(|t| t[0] != "completed");
        let result = validate(&record);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("completed")));
    }

    #[test]
    fn test_workout_record_bad_timestamp() {
        let mut record = workout_record();
        record.tags.retain(|t| t[0] != "start");
        record.tags.push(tag(&["start", "yesterday"]));
        let result = validate(&record);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("unix timestamp")));
    }

    #[test]
    fn test_collection_with_bad_reference_is_still_valid() {
        let record = RawRecord {
            id: "c1".into(),
            kind: RecordKind::COLLECTION_CODE,
            authority: ALICE.into(),
            created_at: 1,
            tags: vec![
                tag(&["d", "favs"]),
                tag(&["title", "Favourites"]),
                tag(&["a", "not-a-reference"]),
            ],
            content: String::new(),
        };
        let result = validate(&record);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }
}
