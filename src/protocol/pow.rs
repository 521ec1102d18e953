//! Proof-of-work challenges.
//!
//! A challenge is a random seed plus a difficulty `d`. A solution is any string
//! `s` for which the hex form of `SHA-256(seed || s)` starts with `d` zeros.
//! Finding one costs about `16^d` hashes; checking one costs a single hash.
//!
//! The solver walks a `u64` counter from zero and tries each value's lowercase
//! hex text as the candidate. It is the only CPU-bound loop in the crate, so it
//! polls a [`CancellationToken`] every [`CANCEL_CHECK_INTERVAL`] iterations.

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::Message;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::ops::RangeInclusive;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Length of a challenge seed in bytes
pub const SEED_LEN: usize = 32;

/// A SHA-256 digest has 64 hex digits, so no larger difficulty can be met
pub const MAX_DIFFICULTY: u8 = 64;

/// How many candidates the solver hashes between cancellation checks
pub const CANCEL_CHECK_INTERVAL: u64 = 10_000;

/// One connection's challenge. Never reused across connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    seed: [u8; SEED_LEN],
    difficulty: u8,
}

impl Challenge {
    pub fn new(seed: [u8; SEED_LEN], difficulty: u8) -> Self {
        Self { seed, difficulty }
    }

    pub fn seed(&self) -> &[u8; SEED_LEN] {
        &self.seed
    }

    pub fn difficulty(&self) -> u8 {
        self.difficulty
    }

    /// Check a claimed solution against this challenge
    pub fn verify(&self, solution: &str) -> bool {
        validate(&self.seed, self.difficulty, solution)
    }

    /// The `ChallengeRequest` envelope announcing this challenge
    pub fn to_message(&self) -> Message {
        Message::ChallengeRequest {
            data: self.seed.to_vec(),
            complexity: self.difficulty,
        }
    }
}

/// Draw a fresh challenge from the OS random source.
///
/// # Errors
/// Returns `ProtocolError::SecurityError` if the OS cannot provide entropy.
pub fn generate_challenge(difficulty: u8) -> Result<Challenge> {
    let mut seed = [0u8; SEED_LEN];
    getrandom::fill(&mut seed)
        .map_err(|e| ProtocolError::SecurityError(format!("{}: {e}", constants::ERR_ENTROPY)))?;
    Ok(Challenge::new(seed, difficulty))
}

/// Count leading zero hex digits (nibbles) of a digest
pub fn leading_zero_digits(hash: &[u8]) -> u32 {
    let mut count = 0u32;
    for &byte in hash {
        if byte == 0 {
            count += 2;
            continue;
        }
        if byte < 0x10 {
            count += 1;
        }
        break;
    }
    count
}

fn meets_difficulty(hash: &[u8], difficulty: u8) -> bool {
    leading_zero_digits(hash) >= u32::from(difficulty)
}

/// Recompute `SHA-256(seed || solution)` and check the difficulty predicate.
///
/// Deterministic and side-effect free; costs one hash regardless of difficulty.
pub fn validate(seed: &[u8], difficulty: u8, solution: &str) -> bool {
    let hash = Sha256::new_with_prefix(seed)
        .chain_update(solution.as_bytes())
        .finalize();
    meets_difficulty(&hash, difficulty)
}

/// Search for a solution, starting from counter 0.
///
/// # Errors
/// - `ProtocolError::ChallengeCancelled` once `cancel` is observed
/// - `ProtocolError::SolutionNotFound` if the counter space is exhausted or
///   the difficulty exceeds [`MAX_DIFFICULTY`]
pub fn solve(seed: &[u8], difficulty: u8, cancel: &CancellationToken) -> Result<String> {
    solve_range(seed, difficulty, 0..=u64::MAX, cancel)
}

pub(crate) fn solve_range(
    seed: &[u8],
    difficulty: u8,
    counters: RangeInclusive<u64>,
    cancel: &CancellationToken,
) -> Result<String> {
    if difficulty > MAX_DIFFICULTY {
        return Err(ProtocolError::SolutionNotFound);
    }

    let prefix = Sha256::new_with_prefix(seed);
    let mut candidate = String::with_capacity(16);

    for counter in counters {
        if counter % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(ProtocolError::ChallengeCancelled);
        }

        candidate.clear();
        // Writing into a String cannot fail
        let _ = write!(candidate, "{counter:x}");

        let hash = prefix.clone().chain_update(candidate.as_bytes()).finalize();
        if meets_difficulty(&hash, difficulty) {
            return Ok(candidate);
        }
    }

    Err(ProtocolError::SolutionNotFound)
}

/// Run [`solve`] on the blocking pool, cancelling it when `deadline` passes.
///
/// An already-expired deadline wins over a finished search.
#[instrument(skip(seed))]
pub async fn solve_within(seed: Vec<u8>, difficulty: u8, deadline: Instant) -> Result<String> {
    let cancel = CancellationToken::new();
    // Stops the search if this future is dropped mid-flight
    let _guard = cancel.clone().drop_guard();

    let worker_cancel = cancel.clone();
    let search = tokio::task::spawn_blocking(move || solve(&seed, difficulty, &worker_cancel));

    tokio::select! {
        biased;
        _ = tokio::time::sleep_until(deadline) => {
            cancel.cancel();
            debug!("Proof-of-work deadline reached, search cancelled");
            Err(ProtocolError::ChallengeCancelled)
        }
        joined = search => joined.map_err(|e| {
            ProtocolError::HandshakeError(format!("{}: {e}", constants::ERR_SOLVER_TASK))
        })?,
    }
}
