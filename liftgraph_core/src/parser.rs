//! Conversion of validated raw records into typed domain objects.
//!
//! Each kind has one pure parse function, selected through a single
//! dispatch table. `RecordParser` wraps them with validation and a bounded
//! memo keyed by record id.

use crate::memo::{CacheStatsSnapshot, MemoCache, DEFAULT_CAPACITY};
use crate::reference::{Reference, ReferenceDiagnostic};
use crate::types::*;
use crate::validator::validate;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type ParseFn = fn(&RawRecord) -> DomainObject;

fn parser_for(kind: RecordKind) -> ParseFn {
    match kind {
        RecordKind::Exercise => |raw| DomainObject::Exercise(parse_exercise(raw)),
        RecordKind::Template => |raw| DomainObject::Template(parse_template(raw)),
        RecordKind::WorkoutRecord => |raw| DomainObject::WorkoutRecord(parse_workout_record(raw)),
        RecordKind::Collection => |raw| DomainObject::Collection(parse_collection(raw)),
    }
}

/// Validate and parse a record without memoization.
///
/// Returns `None` (and logs why) when the record fails validation.
pub fn parse_record(raw: &RawRecord) -> Option<DomainObject> {
    let validation = validate(raw);
    if !validation.is_valid {
        tracing::warn!(
            "Dropping record {} (kind {}): {}",
            raw.id,
            raw.kind,
            validation.errors.join("; ")
        );
        return None;
    }
    for warning in &validation.warnings {
        tracing::debug!("Record {}: {}", raw.id, warning);
    }

    let kind = raw.record_kind()?;
    Some(parser_for(kind)(raw))
}

/// Memoizing parser. One instance per resolver; there is no global cache.
pub struct RecordParser {
    cache: MemoCache<Option<Arc<DomainObject>>>,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecordParser {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: MemoCache::new(capacity),
        }
    }

    /// Parse a record, reusing the earlier result for the same record id.
    ///
    /// Invalid records are memoized as `None` so they are not re-validated.
    pub fn parse(&self, raw: &RawRecord) -> Option<Arc<DomainObject>> {
        self.cache
            .get_or_insert_with(&raw.id, || parse_record(raw).map(Arc::new))
    }

    pub fn parse_exercise(&self, raw: &RawRecord) -> Result<Option<Exercise>> {
        expect_kind(raw, RecordKind::Exercise)?;
        Ok(self.parse(raw).and_then(|o| o.as_exercise().cloned()))
    }

    pub fn parse_template(&self, raw: &RawRecord) -> Result<Option<Template>> {
        expect_kind(raw, RecordKind::Template)?;
        Ok(self.parse(raw).and_then(|o| o.as_template().cloned()))
    }

    pub fn parse_workout_record(&self, raw: &RawRecord) -> Result<Option<WorkoutRecord>> {
        expect_kind(raw, RecordKind::WorkoutRecord)?;
        Ok(self.parse(raw).and_then(|o| o.as_workout_record().cloned()))
    }

    pub fn parse_collection(&self, raw: &RawRecord) -> Result<Option<Collection>> {
        expect_kind(raw, RecordKind::Collection)?;
        Ok(self.parse(raw).and_then(|o| o.as_collection().cloned()))
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

fn expect_kind(raw: &RawRecord, expected: RecordKind) -> Result<()> {
    if raw.kind == expected.code() {
        Ok(())
    } else {
        Err(Error::Contract(format!(
            "record {} has kind {} but was dispatched to the {} parser",
            raw.id, raw.kind, expected
        )))
    }
}

// ============================================================================
// Per-kind parsers (input is already validated)
// ============================================================================

fn text(raw: &RawRecord, tag: &str) -> String {
    raw.tag_list().first_value(tag).unwrap_or_default().to_string()
}

fn optional_text(raw: &RawRecord, tag: &str) -> Option<String> {
    raw.tag_list().non_empty_value(tag).map(str::to_string)
}

fn values(raw: &RawRecord, tag: &str) -> Vec<String> {
    raw.tag_list()
        .first(tag)
        .map(|v| v.to_vec())
        .unwrap_or_default()
}

fn parse_exercise(raw: &RawRecord) -> Exercise {
    Exercise {
        id: text(raw, "d"),
        record_id: raw.id.clone(),
        title: text(raw, "title"),
        description: raw.content.clone(),
        format: values(raw, "format"),
        format_units: values(raw, "format_units"),
        equipment: text(raw, "equipment"),
        difficulty: optional_text(raw, "difficulty"),
        tags: raw
            .tag_list()
            .all_values("t")
            .into_iter()
            .map(str::to_string)
            .collect(),
        instructions: values(raw, "instructions"),
        authority: raw.authority.clone(),
        created_at: raw.created_at_utc(),
    }
}

/// Parse a reference that must point at `kind`. Rejections come back as
/// diagnostics; corrupted identifiers are logged at warn level.
fn reference_of_kind(
    raw_ref: &str,
    kind: RecordKind,
    record_id: &str,
) -> std::result::Result<Reference, ReferenceDiagnostic> {
    match Reference::parse(raw_ref) {
        Ok(reference) if reference.kind() == kind => Ok(reference),
        Ok(reference) => {
            tracing::debug!(
                "Record {}: skipping {} reference where {} was expected",
                record_id,
                reference.kind(),
                kind
            );
            Err(ReferenceDiagnostic {
                input: raw_ref.to_string(),
                message: format!("points at {} but {} was expected", reference.kind(), kind),
                corrupted: false,
            })
        }
        Err(error) => {
            let diagnostic = ReferenceDiagnostic::new(raw_ref, &error);
            if diagnostic.corrupted {
                tracing::warn!("Record {}: {}", record_id, diagnostic);
            } else {
                tracing::debug!("Record {}: skipping {}", record_id, diagnostic);
            }
            Err(diagnostic)
        }
    }
}

/// Templates encode "N sets of X" as N repeated entries for X. Entries are
/// grouped by reference in first-occurrence order; the first entry's values
/// stand for the group.
fn parse_template(raw: &RawRecord) -> Template {
    let mut exercises: Vec<TemplateExercise> = Vec::new();
    let mut positions: HashMap<Reference, usize> = HashMap::new();
    let mut invalid_entries = Vec::new();

    for entry in raw.tag_list().entries("exercise") {
        let Some((raw_ref, params)) = entry.split_first() else {
            continue;
        };
        let reference = match reference_of_kind(raw_ref, RecordKind::Exercise, &raw.id) {
            Ok(reference) => reference,
            Err(diagnostic) => {
                invalid_entries.push(diagnostic);
                continue;
            }
        };

        match positions.get(&reference) {
            Some(&index) => exercises[index].sets += 1,
            None => {
                positions.insert(reference.clone(), exercises.len());
                exercises.push(TemplateExercise {
                    reference,
                    sets: 1,
                    params: params.to_vec(),
                });
            }
        }
    }

    Template {
        id: text(raw, "d"),
        record_id: raw.id.clone(),
        title: text(raw, "title"),
        description: raw.content.clone(),
        workout_type: raw.tag_list().first_value("type").and_then(WorkoutType::parse),
        exercises,
        invalid_entries,
        duration_seconds: raw
            .tag_list()
            .first_value("duration")
            .and_then(|d| d.trim().parse().ok()),
        difficulty: optional_text(raw, "difficulty"),
        authority: raw.authority.clone(),
        created_at: raw.created_at_utc(),
    }
}

/// Set entries are `[ref, weight, reps, rpe, set_type, set_number, completed_at]`.
fn parse_workout_record(raw: &RawRecord) -> WorkoutRecord {
    let tags = raw.tag_list();
    let mut sets = Vec::new();
    let mut seen: HashSet<(Reference, u32)> = HashSet::new();
    let mut last_number: HashMap<Reference, u32> = HashMap::new();

    for entry in tags.entries("exercise") {
        let Some((raw_ref, fields)) = entry.split_first() else {
            continue;
        };
        let Ok(exercise) = reference_of_kind(raw_ref, RecordKind::Exercise, &raw.id) else {
            continue;
        };
        let field = |i: usize| fields.get(i).map(|s| s.trim()).filter(|s| !s.is_empty());

        let previous = last_number.get(&exercise).copied().unwrap_or(0);
        let set_number = field(4)
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(previous + 1);
        last_number.insert(exercise.clone(), previous.max(set_number));

        if !seen.insert((exercise.clone(), set_number)) {
            tracing::debug!(
                "Record {}: dropping duplicate set {} of {}",
                raw.id,
                set_number,
                exercise
            );
            continue;
        }

        sets.push(CompletedSet {
            set_number,
            weight: field(0).and_then(|w| w.parse().ok()).unwrap_or(0.0),
            reps: field(1).and_then(|r| r.parse().ok()).unwrap_or(0),
            rpe: field(2).and_then(|r| r.parse().ok()),
            set_type: field(3).and_then(SetType::parse).unwrap_or_default(),
            completed_at: field(5)
                .and_then(|t| t.parse::<i64>().ok())
                .map(timestamp_to_utc),
            exercise,
        });
    }

    let timestamp = |tag: &str| {
        tags.first_value(tag)
            .and_then(|t| t.trim().parse::<i64>().ok())
            .map(timestamp_to_utc)
            .unwrap_or_else(|| raw.created_at_utc())
    };

    WorkoutRecord {
        id: tags.first_value("d").unwrap_or(raw.id.as_str()).to_string(),
        record_id: raw.id.clone(),
        title: text(raw, "title"),
        workout_type: tags
            .first_value("type")
            .and_then(WorkoutType::parse)
            .unwrap_or(WorkoutType::Strength),
        started_at: timestamp("start"),
        ended_at: timestamp("end"),
        completed: tags.first_value("completed") == Some("true"),
        sets,
        template: tags
            .first_value("template")
            .and_then(|t| reference_of_kind(t, RecordKind::Template, &raw.id).ok()),
        notes: raw.content.clone(),
        authority: raw.authority.clone(),
    }
}

fn parse_collection(raw: &RawRecord) -> Collection {
    let mut references = Vec::new();
    let mut invalid_references = Vec::new();
    let mut seen = HashSet::new();

    for raw_ref in raw.tag_list().all_values("a") {
        match Reference::parse(raw_ref) {
            Ok(reference) => {
                if seen.insert(reference.clone()) {
                    references.push(reference);
                }
            }
            Err(error) => invalid_references.push(ReferenceDiagnostic::new(raw_ref, &error)),
        }
    }

    Collection {
        id: text(raw, "d"),
        record_id: raw.id.clone(),
        title: text(raw, "title"),
        description: optional_text(raw, "description").unwrap_or_else(|| raw.content.clone()),
        references,
        invalid_references,
        authority: raw.authority.clone(),
        created_at: raw.created_at_utc(),
    }
}
