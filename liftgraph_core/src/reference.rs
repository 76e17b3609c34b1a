//! Addressable record references (`kind:authority:identifier`).
//!
//! A reference is parsed once into a typed `Reference` and is never mutated
//! afterwards. Parsing failures are values (`ReferenceError`) so a batch of
//! references can report per-item diagnostics without aborting.

use crate::types::RecordKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delimiter between the three parts of a reference.
pub const DELIMITER: char = ':';

/// Required length of an authority token (hex-encoded 32-byte key).
pub const AUTHORITY_LEN: usize = 64;

/// A parsed `kind:authority:identifier` address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference {
    kind: RecordKind,
    authority: String,
    identifier: String,
}

/// Why a reference string was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("expected 3 colon-separated parts (kind:authority:identifier), found {found}")]
    WrongPartCount { found: usize },

    #[error("unknown record kind '{0}'")]
    UnknownKind(String),

    #[error("kind {0} is not addressable by reference")]
    NotAddressable(u32),

    #[error("authority must be 64 hex characters, got '{0}'")]
    InvalidAuthority(String),

    /// Parameter values were concatenated into the identifier upstream.
    #[error(
        "identifier '{identifier}' contains a comma; parameter values appear to have leaked \
         into the reference, so the source record is corrupt and should be republished"
    )]
    CorruptedIdentifier { identifier: String },
}

/// A rejected reference together with the input that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDiagnostic {
    pub input: String,
    pub message: String,
    /// True when the reference shows signs of upstream data corruption.
    pub corrupted: bool,
}

impl ReferenceDiagnostic {
    pub fn new(input: impl Into<String>, error: &ReferenceError) -> Self {
        Self {
            input: input.into(),
            message: error.to_string(),
            corrupted: matches!(error, ReferenceError::CorruptedIdentifier { .. }),
        }
    }
}

impl fmt::Display for ReferenceDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.input, self.message)
    }
}

impl Reference {
    /// Build a reference from already-trusted parts.
    pub fn new(
        kind: RecordKind,
        authority: impl Into<String>,
        identifier: impl Into<String>,
    ) -> std::result::Result<Self, ReferenceError> {
        let authority = authority.into();
        let identifier = identifier.into();
        check_kind(kind)?;
        check_authority(&authority)?;
        check_identifier(&identifier)?;
        Ok(Self {
            kind,
            authority,
            identifier,
        })
    }

    /// Parse a reference string, reporting exactly why it is invalid.
    ///
    /// The input is taken verbatim. Surrounding whitespace is not stripped,
    /// so a padded reference fails on the part that carries the padding.
    pub fn parse(input: &str) -> std::result::Result<Self, ReferenceError> {
        let parts: Vec<&str> = input.split(DELIMITER).collect();
        if parts.len() != 3 {
            return Err(ReferenceError::WrongPartCount { found: parts.len() });
        }

        let kind = parts[0]
            .parse::<u32>()
            .ok()
            .and_then(RecordKind::from_code)
            .ok_or_else(|| ReferenceError::UnknownKind(parts[0].to_string()))?;

        Self::new(kind, parts[1], parts[2])
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Check a reference string without keeping the parsed value.
pub fn validate_reference(input: &str) -> std::result::Result<(), ReferenceError> {
    Reference::parse(input).map(|_| ())
}

fn check_kind(kind: RecordKind) -> std::result::Result<(), ReferenceError> {
    if kind.is_addressable() {
        Ok(())
    } else {
        Err(ReferenceError::NotAddressable(kind.code()))
    }
}

fn check_authority(authority: &str) -> std::result::Result<(), ReferenceError> {
    if authority.len() == AUTHORITY_LEN && authority.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ReferenceError::InvalidAuthority(authority.to_string()))
    }
}

fn check_identifier(identifier: &str) -> std::result::Result<(), ReferenceError> {
    if identifier.contains(',') {
        return Err(ReferenceError::CorruptedIdentifier {
            identifier: identifier.to_string(),
        });
    }
    if identifier.contains(DELIMITER) {
        return Err(ReferenceError::WrongPartCount {
            found: identifier.split(DELIMITER).count() + 2,
        });
    }
    Ok(())
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.kind.code(),
            self.authority,
            self.identifier
        )
    }
}

impl FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Reference {
    type Error = ReferenceError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.to_string()
    }
}
