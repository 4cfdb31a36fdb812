/*
    Proof of work.

    A proof `p` is valid for the preceding proof `l` when the SHA-256 digest of
    the decimal strings of `l` and `p` concatenated (no separator) starts with
    the hex characters of TARGET_PREFIX. The search is a plain linear scan from 0,
    so for a given `l` the result is always the smallest valid proof.
*/

use crate::blockchain::LedgerError;
use sha2::{Digest as _, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};

pub const TARGET_PREFIX: &str = "1516";

// how many candidates are tried between two checks of the cancel flag
pub const CANCEL_POLL_INTERVAL: u64 = 4096;

pub fn is_valid_proof(last_proof: u64, proof: u64) -> bool {
    let guess = format!("{}{}", last_proof, proof);
    let digest = Sha256::digest(guess.as_bytes());

    // each byte is two hex characters
    let prefix_bytes = TARGET_PREFIX.len().div_ceil(2);
    hex::encode(&digest[..prefix_bytes]).starts_with(TARGET_PREFIX)
}

/// Finds the smallest proof that is valid for `last_proof`.
///
/// The search is unbounded and blocks the calling thread until it succeeds.
/// Use [`find_proof_cancellable`] to run it somewhere it can be abandoned.
pub fn find_proof(last_proof: u64) -> u64 {
    let mut proof = 0;
    while !is_valid_proof(last_proof, proof) {
        proof += 1;
    }

    log::debug!("Found proof {} for last proof {}", proof, last_proof);

    proof
}

/// Same search as [`find_proof`], but gives up once `cancel` is set.
///
/// The flag is polled every [`CANCEL_POLL_INTERVAL`] candidates.
/// Returns `None` if the search was cancelled before finishing.
pub fn find_proof_cancellable(last_proof: u64, cancel: &AtomicBool) -> Option<u64> {
    let mut proof = 0;
    loop {
        if proof % CANCEL_POLL_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            log::debug!("Proof search for last proof {} cancelled", last_proof);
            return None;
        }

        if is_valid_proof(last_proof, proof) {
            log::debug!("Found proof {} for last proof {}", proof, last_proof);
            return Some(proof);
        }

        proof += 1;
    }
}

/// Parses a proof given as text, e.g. on the command line.
pub fn parse_proof(s: &str) -> Result<u64, LedgerError> {
    let trimmed = s.trim();

    // `u64::from_str` also accepts a leading '+'
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LedgerError::MalformedProof(s.to_string()));
    }

    trimmed
        .parse()
        .map_err(|_| LedgerError::MalformedProof(s.to_string()))
}
