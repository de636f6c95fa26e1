//! # Core Types for the Ballot Box
//!
//! Candidates as they are stored on disk, and the request/receipt shapes
//! that flow through [`crate::service::VotingService`].
//!
//! ## Privacy
//!
//! A [`VoteRequest`] is the only type that ever holds a voter's display
//! name or raw identity token. Neither is serialized, the token is wiped on
//! drop, and the [`VoteReceipt`] handed back after a successful vote carries
//! nothing that points at the voter.
//!
//! ## Usage Examples
//!
//! ```rust
//! use votebox::types::{CandidateForm, VoteRequest};
//!
//! let form = CandidateForm::new("Ana", "Partido Verde", "4", "Presidencial");
//! let candidate = form.into_candidate().unwrap();
//! assert_eq!(candidate.nombre, "Ana");
//!
//! let request = VoteRequest::new("Maria", "30", "1001234567", "1");
//! assert_eq!(request.choice(), "1");
//! ```

use crate::{Result, validation_error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Stable unique candidate identifier
///
/// Assigned at registration time so two candidates sharing a display name
/// still get separate ballot entries. The default (nil) value marks a
/// candidate loaded from a file written before identifiers existed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(Uuid);

/// Namespace for identifiers derived from legacy candidate rows
const LEGACY_NAMESPACE: Uuid = Uuid::from_u128(0x3d1f_6b2e_9a47_4c0d_8e15_72a9_c4b8_0f63);

impl CandidateId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Identifier for a legacy row, stable across loads of the same file
    pub fn for_legacy(position: usize, candidate: &Candidate) -> Self {
        let name = format!(
            "{position}|{}|{}|{}|{}",
            candidate.nombre, candidate.partido, candidate.periodo, candidate.gobierno
        );
        Self(Uuid::new_v5(&LEGACY_NAMESPACE, name.as_bytes()))
    }

    /// False for the placeholder given to rows without an `id`
    pub fn is_assigned(&self) -> bool {
        !self.0.is_nil()
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for CandidateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A registered candidate
///
/// Field names on disk follow the candidate file format
/// (`nombre`, `partido`, `periodo`, `gobierno`). Older files that predate
/// `id` and `registered_at` still load; the session assigns the missing
/// identifier and writes the file back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    /// Unique identifier used as the ballot box key
    #[serde(default)]
    pub id: CandidateId,

    /// Candidate's display name
    pub nombre: String,

    /// Political party
    pub partido: String,

    /// Term length in years, as entered
    pub periodo: String,

    /// Government model
    pub gobierno: String,

    /// When the candidate was registered
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {}",
            self.nombre, self.partido, self.periodo, self.gobierno
        )
    }
}

/// Raw registration input
#[derive(Debug, Clone, Default)]
pub struct CandidateForm {
    pub nombre: String,
    pub partido: String,
    pub periodo: String,
    pub gobierno: String,
}

impl CandidateForm {
    pub fn new(
        nombre: impl Into<String>,
        partido: impl Into<String>,
        periodo: impl Into<String>,
        gobierno: impl Into<String>,
    ) -> Self {
        Self {
            nombre: nombre.into(),
            partido: partido.into(),
            periodo: periodo.into(),
            gobierno: gobierno.into(),
        }
    }

    /// Validate the form and build a candidate with a fresh identifier
    ///
    /// Every field is trimmed and required.
    pub fn into_candidate(self) -> Result<Candidate> {
        Ok(Candidate {
            id: CandidateId::new(),
            nombre: required("nombre", &self.nombre)?,
            partido: required("partido", &self.partido)?,
            periodo: required("periodo", &self.periodo)?,
            gobierno: required("gobierno", &self.gobierno)?,
            registered_at: Utc::now(),
        })
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(validation_error!(field, "all candidate fields are required"));
    }
    Ok(value.to_string())
}

/// A single vote attempt, exactly as entered
///
/// Age and choice stay textual so that non-numeric input is classified by
/// the service like any other validation failure.
pub struct VoteRequest {
    voter_name: String,
    age: String,
    identity: Zeroizing<String>,
    choice: String,
}

impl VoteRequest {
    pub fn new(
        voter_name: impl Into<String>,
        age: impl Into<String>,
        identity: impl Into<String>,
        choice: impl Into<String>,
    ) -> Self {
        Self {
            voter_name: voter_name.into(),
            age: age.into(),
            identity: Zeroizing::new(identity.into()),
            choice: choice.into(),
        }
    }

    pub fn voter_name(&self) -> &str {
        &self.voter_name
    }

    pub fn age(&self) -> &str {
        &self.age
    }

    /// Raw identity token; only the identity hasher should read this
    pub(crate) fn identity(&self) -> &str {
        &self.identity
    }

    /// 1-based position in the candidate list
    pub fn choice(&self) -> &str {
        &self.choice
    }
}

impl fmt::Debug for VoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoteRequest")
            .field("voter_name", &"<redacted>")
            .field("age", &self.age)
            .field("identity", &"<redacted>")
            .field("choice", &self.choice)
            .finish()
    }
}

/// Acknowledgement of an accepted vote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteReceipt {
    pub candidate_id: CandidateId,
    pub candidate_name: String,
    /// Total accepted votes after this one
    pub total_votes: u64,
}
