//! Edge cases: concurrent vote attempts, failed writes and hash stability
//!
//! The console drives one session at a time, but the service is shared
//! behind `Arc` here to check that duplicate detection and commit stay
//! atomic when callers race.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use votebox::{
    Error, Result, VotingService,
    ballot::BallotBox,
    config::Config,
    crypto::IdentityHasher,
    registry::VoterRegistry,
    storage::{BallotDocument, MemoryStore, StateStore},
    types::{Candidate, CandidateForm, VoteRequest},
};

/// Store whose ballot writes can be switched off
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_ballot_writes: AtomicBool,
    fail_candidate_writes: AtomicBool,
}

impl StateStore for FlakyStore {
    fn load_candidates(&self) -> Result<Vec<Candidate>> {
        self.inner.load_candidates()
    }

    fn save_candidates(&self, candidates: &[Candidate]) -> Result<()> {
        if self.fail_candidate_writes.load(Ordering::SeqCst) {
            return Err(Error::persistence(
                "candidatos.json",
                std::io::Error::other("disk full"),
            ));
        }
        self.inner.save_candidates(candidates)
    }

    fn load_ballot(&self) -> Result<BallotDocument> {
        self.inner.load_ballot()
    }

    fn save_ballot(&self, votes: &BallotBox, voters: &VoterRegistry) -> Result<()> {
        if self.fail_ballot_writes.load(Ordering::SeqCst) {
            return Err(Error::persistence("urna.json", std::io::Error::other("disk full")));
        }
        self.inner.save_ballot(votes, voters)
    }
}

fn shared_service() -> Result<Arc<VotingService<MemoryStore>>> {
    let service = VotingService::open(&Config::for_testing("."), MemoryStore::new())?;
    service.register_candidate(CandidateForm::new("Ana", "Verde", "4", "Presidencial"))?;
    service.register_candidate(CandidateForm::new("Beto", "Azul", "6", "Federal"))?;
    Ok(Arc::new(service))
}

// =============================================================================
// CONCURRENT OPERATIONS TESTS
// =============================================================================

#[tokio::test]
async fn test_concurrent_same_identity_counts_once() -> Result<()> {
    println!("🏁 Testing concurrent votes with one identity...");

    let service = shared_service()?;
    let mut handles = Vec::new();

    for i in 0..16 {
        let service = Arc::clone(&service);
        handles.push(tokio::task::spawn_blocking(move || {
            let choice = if i % 2 == 0 { "1" } else { "2" };
            service.cast_vote(VoteRequest::new("Maria", "30", "1001234567", choice))
        }));
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => accepted += 1,
            Err(Error::DuplicateVote) => duplicates += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 15);
    assert_eq!(service.total_votes()?, 1);
    assert_eq!(service.voter_count()?, 1);

    println!("✅ Exactly one vote accepted");
    Ok(())
}

#[tokio::test]
async fn test_concurrent_distinct_identities_all_counted() -> Result<()> {
    let service = shared_service()?;
    let mut handles = Vec::new();

    for i in 0..50u32 {
        let service = Arc::clone(&service);
        handles.push(tokio::task::spawn_blocking(move || {
            let choice = if i % 3 == 0 { "2" } else { "1" };
            service.cast_vote(VoteRequest::new("Voter", "25", (5000 + i).to_string(), choice))
        }));
    }

    for handle in handles {
        handle.await.expect("task panicked")?;
    }

    assert_eq!(service.total_votes()?, 50);
    assert_eq!(service.voter_count()?, 50);

    let results = service.results()?;
    let standings = results.standings().expect("ranked results");
    assert_eq!(standings.winner().votes, 33);
    assert_eq!(standings.entries()[1].votes, 17);
    Ok(())
}

// =============================================================================
// PERSISTENCE FAILURE TESTS
// =============================================================================

#[test]
fn test_failed_ballot_write_rolls_back_vote() -> Result<()> {
    println!("💾 Testing rollback on failed ballot write...");

    let service = VotingService::open(&Config::for_testing("."), FlakyStore::default())?;
    service.register_candidate(CandidateForm::new("Ana", "Verde", "4", "Presidencial"))?;

    service.store().fail_ballot_writes.store(true, Ordering::SeqCst);
    let result = service.cast_vote(VoteRequest::new("Maria", "30", "1001234567", "1"));
    assert!(matches!(result, Err(Error::Persistence { .. })));
    assert_eq!(service.total_votes()?, 0);
    assert_eq!(service.voter_count()?, 0);

    // Once storage recovers the same identity can vote
    service.store().fail_ballot_writes.store(false, Ordering::SeqCst);
    service.cast_vote(VoteRequest::new("Maria", "30", "1001234567", "1"))?;
    assert_eq!(service.total_votes()?, 1);

    let persisted = service.store().load_ballot()?;
    assert_eq!(persisted.votes.total(), 1);
    assert_eq!(persisted.voters.len(), 1);

    println!("✅ In-memory state matches storage after failure");
    Ok(())
}

#[test]
fn test_failed_candidate_write_leaves_list_unchanged() -> Result<()> {
    let service = VotingService::open(&Config::for_testing("."), FlakyStore::default())?;
    service.register_candidate(CandidateForm::new("Ana", "Verde", "4", "Presidencial"))?;

    service.store().fail_candidate_writes.store(true, Ordering::SeqCst);
    let result = service.register_candidate(CandidateForm::new("Beto", "Azul", "6", "Federal"));
    assert!(matches!(result, Err(Error::Persistence { .. })));
    assert_eq!(service.candidates()?.len(), 1);

    // A vote for the missing second slot is a selection error, not a phantom entry
    let vote = service.cast_vote(VoteRequest::new("Maria", "30", "11", "2"));
    assert!(matches!(vote, Err(Error::Validation { .. })));
    Ok(())
}

#[test]
fn test_failed_ballot_write_on_registration_is_not_fatal() -> Result<()> {
    let store = FlakyStore::default();
    store.fail_ballot_writes.store(true, Ordering::SeqCst);
    let service = VotingService::open(&Config::for_testing("."), store)?;

    let ana = service.register_candidate(CandidateForm::new("Ana", "Verde", "4", "Presidencial"))?;
    assert_eq!(service.candidates()?[0].id, ana.id);
    Ok(())
}

// =============================================================================
// HASH STABILITY TESTS
// =============================================================================

#[test]
fn test_same_salt_recognises_returning_voter() -> Result<()> {
    let config = Config::for_testing(".");
    let store = MemoryStore::new();

    let first = VotingService::open(&config, store)?;
    first.register_candidate(CandidateForm::new("Ana", "Verde", "4", "Presidencial"))?;
    first.cast_vote(VoteRequest::new("Maria", "30", "1001234567", "1"))?;
    let ballot_json = first.store().ballot_json().expect("ballot saved");

    let second = VotingService::open(&config, MemoryStore::with_ballot_json(ballot_json))?;
    assert_eq!(second.voter_count()?, 1);

    let hasher = IdentityHasher::from_config(&config.security)?;
    let digest = hasher.digest("1001234567");
    let document = second.store().load_ballot()?;
    assert!(document.voters.has_voted(&digest));
    Ok(())
}

#[test]
fn test_identity_whitespace_is_ignored() -> Result<()> {
    let service = shared_service()?;
    tokio_test::assert_ok!(service.cast_vote(VoteRequest::new("Maria", "30", " 1001234567 ", "1")));

    let again = tokio_test::assert_err!(service.cast_vote(VoteRequest::new("Maria", "30", "1001234567", "1")));
    assert!(matches!(again, Error::DuplicateVote));
    Ok(())
}
