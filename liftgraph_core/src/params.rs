//! Interpretation of positional parameter values against an exercise's
//! declared schema.
//!
//! Templates and workout records carry raw values like `["100", "8"]`. Their
//! meaning comes from the exercise: `format` names each slot and
//! `format_units` gives its unit. Interpretation zips the three together and
//! validates every slot with a per-parameter rule.

use crate::types::{Exercise, SetType};
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// Output Types
// ============================================================================

/// One interpreted slot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParameterValue {
    /// Normalized value (trimmed, lowercased for categorical parameters).
    pub value: String,
    pub unit: String,
    /// Value exactly as it appeared in the record.
    pub raw: String,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Scalar fields for callers that do not need full parameter fidelity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegacyView {
    pub weight: f64,
    pub reps: u32,
    pub rpe: f64,
    pub set_type: SetType,
}

impl LegacyView {
    pub const DEFAULT_WEIGHT: f64 = 0.0;
    pub const DEFAULT_REPS: u32 = 1;
    pub const DEFAULT_RPE: f64 = 7.0;
}

impl Default for LegacyView {
    fn default() -> Self {
        Self {
            weight: Self::DEFAULT_WEIGHT,
            reps: Self::DEFAULT_REPS,
            rpe: Self::DEFAULT_RPE,
            set_type: SetType::Normal,
        }
    }
}

/// Result of interpreting one exercise's raw values.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Interpretation {
    pub parameters: BTreeMap<String, ParameterValue>,
    pub legacy_view: LegacyView,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Interpretation {
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }

    /// True when every interpreted slot passed validation and nothing was fatal.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.parameters.values().all(|p| p.is_valid)
    }
}

// ============================================================================
// Per-parameter Rules
// ============================================================================

const WEIGHT_UNITS: &[&str] = &["kg", "lb", "lbs", "bodyweight"];
const REPS_UNITS: &[&str] = &["count", "reps"];
const RPE_UNITS: &[&str] = &["0-10", "1-10"];
const SET_TYPE_UNITS: &[&str] = &["warmup|normal|drop|failure", "enum"];
const DURATION_UNITS: &[&str] = &["seconds", "s", "minutes", "min"];
const DISTANCE_UNITS: &[&str] = &["m", "meters", "km", "mi", "miles", "yards"];

/// Rule for a declared parameter name. Returns the normalized value or a
/// validation error.
type Rule = fn(value: &str, unit: &str) -> Result<String, String>;

fn rule_for(name: &str) -> Option<Rule> {
    match name.to_lowercase().as_str() {
        "weight" => Some(check_weight),
        "reps" => Some(check_reps),
        "rpe" | "effort" => Some(check_rpe),
        "set_type" | "settype" => Some(check_set_type),
        "duration" => Some(check_duration),
        "distance" => Some(check_distance),
        _ => None,
    }
}

fn check_unit(param: &str, unit: &str, allowed: &[&str]) -> Result<(), String> {
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(unit)) {
        Ok(())
    } else {
        Err(format!(
            "unit '{}' is not valid for {} (expected one of: {})",
            unit,
            param,
            allowed.join(", ")
        ))
    }
}

fn non_negative(param: &str, value: &str) -> Result<f64, String> {
    let number: f64 = value
        .parse()
        .map_err(|_| format!("{} '{}' is not a number", param, value))?;
    if !number.is_finite() || number < 0.0 {
        return Err(format!("{} must be a non-negative number, got '{}'", param, value));
    }
    Ok(number)
}

fn check_weight(value: &str, unit: &str) -> Result<String, String> {
    check_unit("weight", unit, WEIGHT_UNITS)?;
    // Bodyweight movements may leave the added load blank.
    if value.is_empty() && unit.eq_ignore_ascii_case("bodyweight") {
        return Ok(String::new());
    }
    non_negative("weight", value)?;
    Ok(value.to_string())
}

fn check_reps(value: &str, unit: &str) -> Result<String, String> {
    check_unit("reps", unit, REPS_UNITS)?;
    match value.parse::<u32>() {
        Ok(reps) if reps > 0 => Ok(value.to_string()),
        _ => Err(format!("reps must be a positive integer, got '{}'", value)),
    }
}

fn check_rpe(value: &str, unit: &str) -> Result<String, String> {
    check_unit("rpe", unit, RPE_UNITS)?;
    let min = if unit == "1-10" { 1.0 } else { 0.0 };
    let rpe: f64 = value
        .parse()
        .map_err(|_| format!("rpe '{}' is not a number", value))?;
    if !(min..=10.0).contains(&rpe) {
        return Err(format!(
            "rpe {} is out of bounds for unit '{}' ({}-10)",
            value, unit, min
        ));
    }
    Ok(value.to_string())
}

fn check_set_type(value: &str, unit: &str) -> Result<String, String> {
    check_unit("set_type", unit, SET_TYPE_UNITS)?;
    SetType::parse(value)
        .map(|t| t.as_str().to_string())
        .ok_or_else(|| {
            format!(
                "set type '{}' is not one of: {}",
                value,
                SetType::ALL.map(SetType::as_str).join(", ")
            )
        })
}

fn check_duration(value: &str, unit: &str) -> Result<String, String> {
    check_unit("duration", unit, DURATION_UNITS)?;
    non_negative("duration", value)?;
    Ok(value.to_string())
}

fn check_distance(value: &str, unit: &str) -> Result<String, String> {
    check_unit("distance", unit, DISTANCE_UNITS)?;
    non_negative("distance", value)?;
    Ok(value.to_string())
}

// ============================================================================
// Interpretation
// ============================================================================

/// Interpret `raw_values` against the exercise's declared format.
///
/// Only the prefix shared by the values, `format` and `format_units` is
/// interpreted; count mismatches become warnings.
pub fn interpret(raw_values: &[String], exercise: &Exercise) -> Interpretation {
    interpret_with_format(raw_values, &exercise.format, &exercise.format_units)
}

/// Same as [`interpret`] for callers holding the schema without an `Exercise`.
/// An empty `format` or `format_units` is treated as missing.
pub fn interpret_with_format(
    raw_values: &[String],
    format: &[String],
    format_units: &[String],
) -> Interpretation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut parameters = BTreeMap::new();

    if format.is_empty() || format_units.is_empty() {
        let missing = if format.is_empty() { "format" } else { "format_units" };
        errors.push(format!(
            "exercise has no '{}' declaration; raw values cannot be interpreted",
            missing
        ));
        return Interpretation {
            parameters,
            legacy_view: LegacyView::default(),
            errors,
            warnings,
        };
    }

    if format.len() != format_units.len() {
        warnings.push(format!(
            "format declares {} parameters but format_units declares {}",
            format.len(),
            format_units.len()
        ));
    }
    if raw_values.len() != format.len() {
        warnings.push(format!(
            "{} raw values supplied for {} declared parameters",
            raw_values.len(),
            format.len()
        ));
    }

    let shared = raw_values.len().min(format.len()).min(format_units.len());
    for i in 0..shared {
        let name = format[i].trim().to_lowercase();
        let unit = format_units[i].trim();
        let raw = &raw_values[i];
        let value = raw.trim();

        let outcome = match rule_for(&name) {
            Some(rule) => rule(value, unit),
            None => {
                warnings.push(format!("no validation rule for parameter '{}'", name));
                Ok(value.to_string())
            }
        };

        let parameter = match outcome {
            Ok(normalized) => ParameterValue {
                value: normalized,
                unit: unit.to_string(),
                raw: raw.clone(),
                is_valid: true,
                error: None,
            },
            Err(error) => ParameterValue {
                value: value.to_string(),
                unit: unit.to_string(),
                raw: raw.clone(),
                is_valid: false,
                error: Some(error),
            },
        };

        if parameters.insert(name.clone(), parameter).is_some() {
            warnings.push(format!("parameter '{}' declared more than once; last wins", name));
        }
    }

    let legacy_view = legacy_view(&parameters);
    Interpretation {
        parameters,
        legacy_view,
        errors,
        warnings,
    }
}

/// Best-effort scalars. Invalid or absent parameters fall back to defaults.
fn legacy_view(parameters: &BTreeMap<String, ParameterValue>) -> LegacyView {
    let valid = |name: &str| {
        parameters
            .get(name)
            .filter(|p| p.is_valid)
            .map(|p| p.value.as_str())
    };

    let defaults = LegacyView::default();
    LegacyView {
        weight: valid("weight")
            .and_then(|w| w.parse().ok())
            .unwrap_or(defaults.weight),
        reps: valid("reps")
            .and_then(|r| r.parse().ok())
            .unwrap_or(defaults.reps),
        rpe: valid("rpe")
            .or_else(|| valid("effort"))
            .and_then(|r| r.parse().ok())
            .unwrap_or(defaults.rpe),
        set_type: valid("set_type")
            .or_else(|| valid("settype"))
            .and_then(SetType::parse)
            .unwrap_or(defaults.set_type),
    }
}
