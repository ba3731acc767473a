use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CHECK_INTERVAL, CancelToken, MAX_DIFFICULTY};
use crate::error::{Error, Result};
use crate::targeting::NonceTarget;

/// Successful proof-of-work search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningResult {
    pub digest_hex: String,
    pub nonce: u64,
    pub target: NonceTarget,
    pub elapsed_seconds: f64,
}

pub fn validate_difficulty(difficulty: u32) -> Result<()> {
    if difficulty == 0 || difficulty > MAX_DIFFICULTY {
        return Err(Error::InvalidConfiguration(format!(
            "difficulty must be in 1..={MAX_DIFFICULTY}, got {difficulty}"
        )));
    }
    Ok(())
}

/// SHA-256 of a candidate preimage.
pub fn digest(preimage: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(preimage);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize()[..]);
    out
}

/// True when the hex form of `digest` starts with `difficulty` '0' characters.
pub fn meets_difficulty(digest: &[u8], difficulty: u32) -> bool {
    let nibbles = difficulty as usize;
    if nibbles > digest.len() * 2 {
        return false;
    }
    let full = nibbles / 2;
    if digest[..full].iter().any(|b| *b != 0) {
        return false;
    }
    nibbles % 2 == 0 || digest[full] >> 4 == 0
}

/// Search `target`'s window for a nonce whose digest meets `difficulty`.
///
/// Returns `Ok(None)` when the window is exhausted, `timeout` elapses or
/// `cancel` fires; none of these are errors.
pub fn search<F>(
    target: &NonceTarget,
    difficulty: u32,
    timeout: Duration,
    cancel: &CancelToken,
    hash_input: F,
) -> Result<Option<MiningResult>>
where
    F: Fn(u64, &NonceTarget) -> Vec<u8>,
{
    validate_difficulty(difficulty)?;
    let deadline = Instant::now() + timeout;
    Ok(search_until(target, difficulty, deadline, cancel, hash_input))
}

/// Search loop shared with the batch driver. Difficulty is already validated.
pub(crate) fn search_until<F>(
    target: &NonceTarget,
    difficulty: u32,
    deadline: Instant,
    cancel: &CancelToken,
    hash_input: F,
) -> Option<MiningResult>
where
    F: Fn(u64, &NonceTarget) -> Vec<u8>,
{
    let started = Instant::now();
    let end = target.end_nonce();

    for (tried, nonce) in (target.start_nonce..end).enumerate() {
        if tried as u64 % CHECK_INTERVAL == 0 {
            if cancel.is_cancelled() {
                debug!("search cancelled after {tried} candidates");
                return None;
            }
            if Instant::now() >= deadline {
                debug!("search timed out after {tried} candidates");
                return None;
            }
        }

        let hash = digest(&hash_input(nonce, target));
        if meets_difficulty(&hash, difficulty) {
            return Some(MiningResult {
                digest_hex: hex::encode(hash),
                nonce,
                target: target.clone(),
                elapsed_seconds: started.elapsed().as_secs_f64(),
            });
        }
    }

    debug!(
        "search exhausted window {}..{} without a match",
        target.start_nonce, end
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Phase;

    fn target(start_nonce: u64, range_size: u64) -> NonceTarget {
        NonceTarget {
            start_nonce,
            range_size,
            source_ratio: 0.7375,
            source_phase: Phase::Verification,
        }
    }

    fn preimage(nonce: u64, _t: &NonceTarget) -> Vec<u8> {
        format!("{nonce}:LIVE-1").into_bytes()
    }

    #[test]
    fn difficulty_one_succeeds_inside_window() {
        let t = target(1270, 1_200_000);
        let found = search(&t, 1, Duration::from_secs(30), &CancelToken::new(), preimage)
            .unwrap()
            .expect("difficulty 1 over 1.2M candidates");

        assert!(found.digest_hex.starts_with('0'));
        assert!(found.nonce >= t.start_nonce && found.nonce < t.end_nonce());
        assert_eq!(found.digest_hex, hex::encode(digest(&preimage(found.nonce, &t))));
        assert_eq!(found.target, t);
    }

    #[test]
    fn impossible_difficulty_times_out_with_none() {
        let t = target(0, 1_200_000);
        let result = search(&t, 64, Duration::from_millis(200), &CancelToken::new(), preimage);
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn cancelled_search_returns_none() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = search(&target(0, 1_000_000), 1, Duration::from_secs(30), &cancel, preimage);
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn exhausted_window_returns_none() {
        let result = search(&target(5, 3), 64, Duration::from_secs(30), &CancelToken::new(), preimage);
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn rejects_unsatisfiable_difficulty_settings() {
        for bad in [0, 65] {
            let result = search(&target(0, 10), bad, Duration::from_secs(1), &CancelToken::new(), preimage);
            assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        }
    }

    #[test]
    fn difficulty_counts_hex_nibbles() {
        let mut d = [0xffu8; 32];
        assert!(!meets_difficulty(&d, 1));
        d[0] = 0x0f;
        assert!(meets_difficulty(&d, 1));
        assert!(!meets_difficulty(&d, 2));
        d[0] = 0x00;
        d[1] = 0x0a;
        assert!(meets_difficulty(&d, 3));
        assert!(!meets_difficulty(&d, 4));
        assert!(meets_difficulty(&[0u8; 32], 64));
        assert!(!meets_difficulty(&[0u8; 32], 65));
    }
}
