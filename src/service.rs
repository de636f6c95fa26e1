//! Voting service: candidate registration, vote casting and results
//!
//! Every vote attempt moves through the same stages:
//! 1. Validate the voter (name present, numeric age at or above the minimum)
//! 2. Validate the identity token (digits only, bounded length)
//! 3. Reject identities whose digest is already registered
//! 4. Resolve the 1-based candidate choice
//! 5. Commit: count the vote, register the digest, persist both together
//!
//! Stages 3 to 5 run under one lock, so concurrent callers cannot both pass
//! the duplicate check for the same identity. A failed write rolls the
//! in-memory commit back before the error is returned.

use crate::ballot::BallotBox;
use crate::config::{Config, VotingRules};
use crate::crypto::{IdentityDigest, IdentityHasher};
use crate::ranking::{Results, ResultsRanker};
use crate::registry::VoterRegistry;
use crate::storage::{self, StateStore};
use crate::types::{Candidate, CandidateForm, CandidateId, VoteReceipt, VoteRequest};
use crate::{Error, Result, validation_error};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Stage at which a vote attempt was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoteStage {
    ValidateVoter,
    ValidateIdentity,
    CheckDuplicate,
    SelectCandidate,
    Commit,
}

/// Explicit session state owned by the service
#[derive(Debug, Default)]
struct Session {
    candidates: Vec<Candidate>,
    ballot: BallotBox,
    registry: VoterRegistry,
}

/// Orchestrates registration, voting and tallying over a [`StateStore`]
pub struct VotingService<S: StateStore> {
    store: S,
    hasher: IdentityHasher,
    rules: VotingRules,
    session: Mutex<Session>,
}

impl<S: StateStore> VotingService<S> {
    /// Open a session, loading whatever the store already holds
    ///
    /// Malformed or unreadable state is logged and replaced by an empty
    /// structure; the session still opens. Candidates loaded without an
    /// identifier get a derived one, and the list is written back so votes
    /// cast now still point at them after a restart.
    pub fn open(config: &Config, store: S) -> Result<Self> {
        let hasher = IdentityHasher::from_config(&config.security)?;

        let mut candidates = recover_or_empty(store.load_candidates(), "candidates")?;
        let upgraded = assign_missing_ids(&mut candidates);
        if upgraded > 0 {
            match store.save_candidates(&candidates) {
                Ok(()) => tracing::info!("🆔 Assigned identifiers to {} legacy candidates", upgraded),
                Err(e) => tracing::warn!("Legacy candidate identifiers not persisted: {}", e),
            }
        }

        let document = recover_or_empty(store.load_ballot(), "ballot")?;

        let mut ballot = document.votes;
        for candidate in &candidates {
            ballot.ensure_entry(candidate.id);
        }
        let registry = document.voters;

        if ballot.total() != registry.len() as u64 {
            tracing::warn!(
                "⚠️ Ballot out of balance: {} votes counted, {} voters registered",
                ballot.total(),
                registry.len()
            );
        }

        tracing::info!(
            "📂 Session opened: {} candidates, {} votes, keyed_hashing={}",
            candidates.len(),
            ballot.total(),
            hasher.is_keyed()
        );

        Ok(Self {
            store,
            hasher,
            rules: config.rules.clone(),
            session: Mutex::new(Session {
                candidates,
                ballot,
                registry,
            }),
        })
    }

    /// Register a new candidate and persist the list
    pub fn register_candidate(&self, form: CandidateForm) -> Result<Candidate> {
        let candidate = form.into_candidate()?;
        let mut session = self.lock()?;

        session.candidates.push(candidate.clone());
        if let Err(e) = self.store.save_candidates(&session.candidates) {
            session.candidates.pop();
            tracing::error!("Candidate {} not registered: {}", candidate.nombre, e);
            return Err(e);
        }

        session.ballot.ensure_entry(candidate.id);
        if let Err(e) = self.store.save_ballot(&session.ballot, &session.registry) {
            // The zero entry is rebuilt from the candidate list on next open
            tracing::warn!("Ballot entry for {} not persisted: {}", candidate.id, e);
        }

        tracing::info!("📝 Candidate registered: {} ({})", candidate.nombre, candidate.id);
        Ok(candidate)
    }

    /// Registered candidates in registration order
    pub fn candidates(&self) -> Result<Vec<Candidate>> {
        Ok(self.lock()?.candidates.clone())
    }

    /// Look up a candidate by identifier
    pub fn candidate(&self, id: &CandidateId) -> Result<Option<Candidate>> {
        Ok(self.lock()?.candidates.iter().find(|c| &c.id == id).cloned())
    }

    /// Cast a vote
    ///
    /// The request (and with it the voter's name and raw identity token) is
    /// consumed and dropped here; nothing identifying is stored or returned.
    pub fn cast_vote(&self, request: VoteRequest) -> Result<VoteReceipt> {
        self.validate_voter(&request)
            .map_err(|e| rejected(VoteStage::ValidateVoter, e))?;
        self.validate_identity(request.identity())
            .map_err(|e| rejected(VoteStage::ValidateIdentity, e))?;

        let digest = self.hasher.digest(request.identity().trim());
        let mut session = self.lock()?;

        if session.registry.has_voted(&digest) {
            return Err(rejected(VoteStage::CheckDuplicate, Error::DuplicateVote));
        }

        let candidate = select_candidate(&session.candidates, request.choice())
            .map_err(|e| rejected(VoteStage::SelectCandidate, e))?
            .clone();

        self.commit(&mut session, &candidate, digest)
            .map_err(|e| rejected(VoteStage::Commit, e))?;

        let receipt = VoteReceipt {
            candidate_id: candidate.id,
            candidate_name: candidate.nombre,
            total_votes: session.ballot.total(),
        };

        tracing::info!(
            "🗳️ Vote accepted: voter={}, candidate={}, total={}",
            digest.short(),
            receipt.candidate_id,
            receipt.total_votes
        );

        Ok(receipt)
    }

    /// Rank candidates by votes received
    pub fn results(&self) -> Result<Results> {
        Ok(ResultsRanker::rank(&self.lock()?.ballot))
    }

    /// Write the candidate list to `path`
    ///
    /// Paths that resolve to one of the store's own state files are refused.
    pub fn export_candidates(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if let Some(state_file) = self
            .store
            .protected_paths()
            .into_iter()
            .find(|state_file| storage::same_location(state_file, path))
        {
            tracing::warn!("Export to {} refused: it is a state file", state_file.display());
            return Err(validation_error!(
                "export path",
                "{} holds voting state and cannot be overwritten",
                path.display()
            ));
        }

        let session = self.lock()?;
        self.store.export_candidates(path, &session.candidates)?;

        tracing::info!("📤 Exported {} candidates to {}", session.candidates.len(), path.display());
        Ok(path.to_path_buf())
    }

    /// Accepted votes so far
    pub fn total_votes(&self) -> Result<u64> {
        Ok(self.lock()?.ballot.total())
    }

    /// Identities that have voted
    pub fn voter_count(&self) -> Result<usize> {
        Ok(self.lock()?.registry.len())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn validate_voter(&self, request: &VoteRequest) -> Result<()> {
        if request.voter_name().trim().is_empty() {
            return Err(validation_error!("voter_name", "a name is required"));
        }

        let age: u32 = request
            .age()
            .trim()
            .parse()
            .map_err(|_| validation_error!("age", "must be a whole number"))?;

        if age < self.rules.minimum_age {
            return Err(validation_error!(
                "age",
                "voters must be at least {} years old",
                self.rules.minimum_age
            ));
        }

        Ok(())
    }

    fn validate_identity(&self, raw_identity: &str) -> Result<()> {
        let token = raw_identity.trim();

        if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
            return Err(validation_error!("identity", "must contain digits only"));
        }

        if token.len() > self.rules.identity_max_digits {
            return Err(validation_error!(
                "identity",
                "must be at most {} digits",
                self.rules.identity_max_digits
            ));
        }

        Ok(())
    }

    fn commit(&self, session: &mut Session, candidate: &Candidate, digest: IdentityDigest) -> Result<()> {
        session.registry.record(digest)?;
        session.ballot.increment(candidate.id);

        if let Err(e) = self.store.save_ballot(&session.ballot, &session.registry) {
            session.ballot.retract(&candidate.id);
            session.registry.revoke(&digest);
            tracing::error!("↩️ Vote rolled back, ballot not persisted: {}", e);
            return Err(e);
        }

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|_| Error::internal("Session lock poisoned"))
    }
}

/// Resolve a 1-based choice against the candidate list
fn select_candidate<'a>(candidates: &'a [Candidate], choice: &str) -> Result<&'a Candidate> {
    if candidates.is_empty() {
        return Err(validation_error!("choice", "no candidates are registered"));
    }

    let position: usize = choice
        .trim()
        .parse()
        .map_err(|_| validation_error!("choice", "must be a number"))?;

    position
        .checked_sub(1)
        .and_then(|index| candidates.get(index))
        .ok_or_else(|| validation_error!("choice", "must be between 1 and {}", candidates.len()))
}

fn rejected(stage: VoteStage, error: Error) -> Error {
    tracing::info!("🚫 Vote rejected at {:?}: {}", stage, error);
    error
}

/// Give rows loaded without an `id` their derived identifier
fn assign_missing_ids(candidates: &mut [Candidate]) -> usize {
    let mut assigned = 0;
    for (position, candidate) in candidates.iter_mut().enumerate() {
        if !candidate.id.is_assigned() {
            candidate.id = CandidateId::for_legacy(position, candidate);
            assigned += 1;
        }
    }
    assigned
}

/// Fall back to the empty value when stored state cannot be read
fn recover_or_empty<T: Default>(loaded: Result<T>, what: &str) -> Result<T> {
    match loaded {
        Ok(value) => Ok(value),
        Err(e @ (Error::Parse { .. } | Error::Persistence { .. })) => {
            tracing::error!("Could not load {}: {}. Starting with empty {}", what, e, what);
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn service() -> VotingService<MemoryStore> {
        let config = Config::for_testing(".");
        VotingService::open(&config, MemoryStore::new()).unwrap()
    }

    fn register(service: &VotingService<MemoryStore>, name: &str) -> Candidate {
        service
            .register_candidate(CandidateForm::new(name, "Partido", "4", "Republica"))
            .unwrap()
    }

    #[test]
    fn test_accepted_vote_updates_ballot_and_registry() {
        let service = service();
        let ana = register(&service, "Ana");
        register(&service, "Beto");

        let receipt = service
            .cast_vote(VoteRequest::new("Maria", "30", "1001234567", "1"))
            .unwrap();

        assert_eq!(receipt.candidate_id, ana.id);
        assert_eq!(receipt.candidate_name, "Ana");
        assert_eq!(receipt.total_votes, 1);
        assert_eq!(service.voter_count().unwrap(), 1);
    }

    #[test]
    fn test_validation_order() {
        let service = service();
        register(&service, "Ana");

        let cases = [
            (VoteRequest::new("", "30", "1", "1"), "voter_name"),
            (VoteRequest::new("Maria", "treinta", "1", "1"), "age"),
            (VoteRequest::new("Maria", "17", "1", "1"), "age"),
            (VoteRequest::new("Maria", "30", "12a34", "1"), "identity"),
            (VoteRequest::new("Maria", "30", "", "1"), "identity"),
            (VoteRequest::new("Maria", "30", "12345678901", "1"), "identity"),
            (VoteRequest::new("Maria", "30", "1", "0"), "choice"),
            (VoteRequest::new("Maria", "30", "1", "2"), "choice"),
            (VoteRequest::new("Maria", "30", "1", "uno"), "choice"),
        ];

        for (request, expected_field) in cases {
            match service.cast_vote(request) {
                Err(Error::Validation { field, .. }) => assert_eq!(field, expected_field),
                other => panic!("expected validation error on {expected_field}, got {other:?}"),
            }
        }

        assert_eq!(service.total_votes().unwrap(), 0);
        assert_eq!(service.voter_count().unwrap(), 0);
    }

    #[test]
    fn test_ten_digit_identity_and_minimum_age_accepted() {
        let service = service();
        register(&service, "Ana");

        assert!(service
            .cast_vote(VoteRequest::new("Maria", " 18 ", "9999999999", "1"))
            .is_ok());
    }

    #[test]
    fn test_duplicate_checked_before_candidate_choice() {
        let service = service();
        register(&service, "Ana");
        service
            .cast_vote(VoteRequest::new("Maria", "30", "42", "1"))
            .unwrap();

        let result = service.cast_vote(VoteRequest::new("Maria", "30", "42", "99"));
        assert!(matches!(result, Err(Error::DuplicateVote)));
    }

    #[test]
    fn test_no_candidates_rejects_choice() {
        let service = service();
        let result = service.cast_vote(VoteRequest::new("Maria", "30", "42", "1"));
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_candidate_lookup_and_results() {
        let service = service();
        assert_eq!(service.results().unwrap(), Results::NoVotes);

        let ana = register(&service, "Ana");
        assert_eq!(service.candidate(&ana.id).unwrap().unwrap().nombre, "Ana");
        assert!(service.candidate(&CandidateId::new()).unwrap().is_none());

        service
            .cast_vote(VoteRequest::new("Maria", "30", "42", "1"))
            .unwrap();
        let results = service.results().unwrap();
        assert_eq!(results.standings().unwrap().winner().candidate_id, ana.id);
    }

    #[test]
    fn test_malformed_store_opens_empty() {
        let config = Config::for_testing(".");
        let service = VotingService::open(&config, MemoryStore::with_ballot_json("[[[")).unwrap();
        assert_eq!(service.total_votes().unwrap(), 0);

        let service =
            VotingService::open(&config, MemoryStore::with_candidates_json("{\"nombre\"")).unwrap();
        assert!(service.candidates().unwrap().is_empty());
    }

    #[test]
    fn test_legacy_candidates_get_stable_persisted_ids() {
        let legacy = r#"[{"nombre":"Ana","partido":"Verde","periodo":"4","gobierno":"Presidencial"},
                         {"nombre":"Ana","partido":"Verde","periodo":"4","gobierno":"Presidencial"}]"#;
        let config = Config::for_testing(".");

        let first = VotingService::open(&config, MemoryStore::with_candidates_json(legacy)).unwrap();
        let ids: Vec<CandidateId> = first.candidates().unwrap().iter().map(|c| c.id).collect();
        assert!(ids.iter().all(CandidateId::is_assigned));
        assert_ne!(ids[0], ids[1]);

        // Written back on open
        let stored: Vec<CandidateId> = first
            .store()
            .load_candidates()
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(stored, ids);

        // Another load of the untouched legacy text derives the same ids
        let second = VotingService::open(&config, MemoryStore::with_candidates_json(legacy)).unwrap();
        let again: Vec<CandidateId> = second.candidates().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(again, ids);
    }

    #[test]
    fn test_select_candidate_bounds() {
        let a = CandidateForm::new("Ana", "P", "4", "G").into_candidate().unwrap();
        let b = CandidateForm::new("Beto", "P", "4", "G").into_candidate().unwrap();
        let list = vec![a.clone(), b.clone()];

        assert_eq!(select_candidate(&list, "1").unwrap().id, a.id);
        assert_eq!(select_candidate(&list, " 2 ").unwrap().id, b.id);
        assert!(select_candidate(&list, "3").is_err());
        assert!(select_candidate(&list, "-1").is_err());
    }
}
