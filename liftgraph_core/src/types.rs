//! Core domain types for liftgraph.
//!
//! This module defines:
//! - Record kinds and the raw wire record
//! - Typed domain objects parsed from raw records
//! - Small enums shared by the parser and parameter interpreter

use crate::reference::{Reference, ReferenceDiagnostic};
use crate::tags::TagList;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Record Kinds
// ============================================================================

/// Record kind codes fixed by the external protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Exercise,
    Template,
    WorkoutRecord,
    Collection,
}

impl RecordKind {
    pub const EXERCISE_CODE: u32 = 33401;
    pub const TEMPLATE_CODE: u32 = 33402;
    pub const WORKOUT_RECORD_CODE: u32 = 1301;
    pub const COLLECTION_CODE: u32 = 30003;

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            Self::EXERCISE_CODE => Some(RecordKind::Exercise),
            Self::TEMPLATE_CODE => Some(RecordKind::Template),
            Self::WORKOUT_RECORD_CODE => Some(RecordKind::WorkoutRecord),
            Self::COLLECTION_CODE => Some(RecordKind::Collection),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            RecordKind::Exercise => Self::EXERCISE_CODE,
            RecordKind::Template => Self::TEMPLATE_CODE,
            RecordKind::WorkoutRecord => Self::WORKOUT_RECORD_CODE,
            RecordKind::Collection => Self::COLLECTION_CODE,
        }
    }

    /// Kinds that can be the target of a `kind:authority:identifier` reference.
    ///
    /// All addressable kinds are replaceable: the newest record for an
    /// (authority, identifier) pair is authoritative.
    pub fn is_addressable(self) -> bool {
        !matches!(self, RecordKind::WorkoutRecord)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Exercise => "exercise",
            RecordKind::Template => "template",
            RecordKind::WorkoutRecord => "workout record",
            RecordKind::Collection => "collection",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

// ============================================================================
// Raw Record
// ============================================================================

/// An immutable, author-signed record exactly as delivered by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub kind: u32,
    #[serde(alias = "pubkey")]
    pub authority: String,
    pub created_at: i64,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
}

impl RawRecord {
    pub fn record_kind(&self) -> Option<RecordKind> {
        RecordKind::from_code(self.kind)
    }

    pub fn tag_list(&self) -> TagList<'_> {
        TagList::new(&self.tags)
    }

    /// Local identifier (the `d` tag) of an addressable record.
    pub fn identifier(&self) -> Option<&str> {
        self.tag_list().first_value("d")
    }

    /// The reference that addresses this record, if it is addressable.
    pub fn address(&self) -> Option<Reference> {
        let kind = self.record_kind()?;
        let identifier = self.identifier()?;
        Reference::new(kind, self.authority.clone(), identifier).ok()
    }

    pub fn created_at_utc(&self) -> DateTime<Utc> {
        timestamp_to_utc(self.created_at)
    }

    /// Whether `self` supersedes `other` as the version of a replaceable record.
    ///
    /// Newer `created_at` wins; equal timestamps fall back to the larger id so
    /// the choice is deterministic across sources.
    pub fn supersedes(&self, other: &RawRecord) -> bool {
        (self.created_at, &self.id) > (other.created_at, &other.id)
    }
}

/// Convert unix seconds into a UTC timestamp, clamping out-of-range values.
pub fn timestamp_to_utc(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

// ============================================================================
// Shared Enums
// ============================================================================

/// Style of a workout or template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    Strength,
    Circuit,
    /// Timed rounds (every minute on the minute).
    Emom,
    /// As many rounds as possible.
    Amrap,
}

impl WorkoutType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "strength" => Some(WorkoutType::Strength),
            "circuit" => Some(WorkoutType::Circuit),
            "emom" | "timed-rounds" | "timed_rounds" => Some(WorkoutType::Emom),
            "amrap" | "as-many-as-possible" => Some(WorkoutType::Amrap),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkoutType::Strength => "strength",
            WorkoutType::Circuit => "circuit",
            WorkoutType::Emom => "emom",
            WorkoutType::Amrap => "amrap",
        }
    }
}

/// Kind of set performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetType {
    Warmup,
    #[default]
    Normal,
    Drop,
    Failure,
}

impl SetType {
    pub const ALL: [SetType; 4] = [
        SetType::Warmup,
        SetType::Normal,
        SetType::Drop,
        SetType::Failure,
    ];

    /// Case-insensitive parse.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "warmup" => Some(SetType::Warmup),
            "normal" => Some(SetType::Normal),
            "drop" => Some(SetType::Drop),
            "failure" => Some(SetType::Failure),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SetType::Warmup => "warmup",
            SetType::Normal => "normal",
            SetType::Drop => "drop",
            SetType::Failure => "failure",
        }
    }
}

impl fmt::Display for SetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Domain Objects
// ============================================================================

/// An exercise definition with its declared parameter schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub record_id: String,
    pub title: String,
    pub description: String,
    /// Declared parameter names, one per positional slot.
    pub format: Vec<String>,
    /// Declared units, parallel to `format`.
    pub format_units: Vec<String>,
    pub equipment: String,
    pub difficulty: Option<String>,
    pub tags: Vec<String>,
    pub instructions: Vec<String>,
    pub authority: String,
    pub created_at: DateTime<Utc>,
}

impl Exercise {
    pub fn reference(&self) -> Option<Reference> {
        Reference::new(RecordKind::Exercise, self.authority.clone(), self.id.clone()).ok()
    }
}

/// One distinct exercise planned in a template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateExercise {
    pub reference: Reference,
    /// Number of raw entries that shared this reference.
    pub sets: u32,
    /// Raw positional values of the first entry, interpreted later against
    /// the exercise's declared format.
    pub params: Vec<String>,
}

/// A reusable workout plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub record_id: String,
    pub title: String,
    pub description: String,
    pub workout_type: Option<WorkoutType>,
    pub exercises: Vec<TemplateExercise>,
    /// Exercise entries that were skipped because their reference was unusable.
    #[serde(default)]
    pub invalid_entries: Vec<ReferenceDiagnostic>,
    pub duration_seconds: Option<u32>,
    pub difficulty: Option<String>,
    pub authority: String,
    pub created_at: DateTime<Utc>,
}

impl Template {
    pub fn reference(&self) -> Option<Reference> {
        Reference::new(RecordKind::Template, self.authority.clone(), self.id.clone()).ok()
    }

    pub fn total_sets(&self) -> u32 {
        self.exercises.iter().map(|e| e.sets).sum()
    }

    pub fn exercise_references(&self) -> impl Iterator<Item = &Reference> {
        self.exercises.iter().map(|e| &e.reference)
    }
}

/// One set performed during a workout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedSet {
    pub exercise: Reference,
    /// 1-based position among this exercise's sets.
    pub set_number: u32,
    pub reps: u32,
    pub weight: f64,
    pub rpe: Option<f64>,
    pub set_type: SetType,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A completed workout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub id: String,
    pub record_id: String,
    pub title: String,
    pub workout_type: WorkoutType,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub completed: bool,
    pub sets: Vec<CompletedSet>,
    pub template: Option<Reference>,
    pub notes: String,
    pub authority: String,
}

impl WorkoutRecord {
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }

    /// Sum of weight × reps over working (non-warmup) sets.
    pub fn total_volume(&self) -> f64 {
        self.sets
            .iter()
            .filter(|s| s.set_type != SetType::Warmup)
            .map(|s| s.weight * f64::from(s.reps))
            .sum()
    }
}

/// A curated, replaceable list of references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub record_id: String,
    pub title: String,
    pub description: String,
    pub references: Vec<Reference>,
    /// Entries that failed reference validation while parsing.
    pub invalid_references: Vec<ReferenceDiagnostic>,
    pub authority: String,
    pub created_at: DateTime<Utc>,
}

impl Collection {
    pub fn references_of(&self, kind: RecordKind) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(move |r| r.kind() == kind)
    }
}

/// Any parsed domain object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainObject {
    Exercise(Exercise),
    Template(Template),
    WorkoutRecord(WorkoutRecord),
    Collection(Collection),
}

impl DomainObject {
    pub fn kind(&self) -> RecordKind {
        match self {
            DomainObject::Exercise(_) => RecordKind::Exercise,
            DomainObject::Template(_) => RecordKind::Template,
            DomainObject::WorkoutRecord(_) => RecordKind::WorkoutRecord,
            DomainObject::Collection(_) => RecordKind::Collection,
        }
    }

    pub fn as_exercise(&self) -> Option<&Exercise> {
        match self {
            DomainObject::Exercise(exercise) => Some(exercise),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&Template> {
        match self {
            DomainObject::Template(template) => Some(template),
            _ => None,
        }
    }

    pub fn as_workout_record(&self) -> Option<&WorkoutRecord> {
        match self {
            DomainObject::WorkoutRecord(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            DomainObject::Collection(collection) => Some(collection),
            _ => None,
        }
    }
}
