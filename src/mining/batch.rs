use std::time::{Duration, Instant};

use log::{debug, info};
use rayon::prelude::*;

use super::CancelToken;
use super::search::{MiningResult, search_until, validate_difficulty};
use crate::error::Result;
use crate::targeting::NonceTarget;

/// Winning search of a batch together with the position of its target.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWinner {
    pub index: usize,
    pub result: MiningResult,
}

/// Search every target within one shared `timeout` and keep the
/// highest-ratio success. On a ratio tie the earlier target wins.
///
/// Sequential mode walks targets in order until the deadline; parallel
/// mode spreads targets over the rayon pool, each with its own nonce
/// cursor and all bound to the same deadline. Both apply the same
/// tie-break, so the winner does not depend on thread scheduling.
pub fn search_batch<F>(
    targets: &[NonceTarget],
    difficulty: u32,
    timeout: Duration,
    cancel: &CancelToken,
    parallel: bool,
    hash_input: F,
) -> Result<Option<BatchWinner>>
where
    F: Fn(usize, u64, &NonceTarget) -> Vec<u8> + Sync,
{
    validate_difficulty(difficulty)?;
    let deadline = Instant::now() + timeout;

    let outcomes: Vec<Option<MiningResult>> = if parallel {
        // collect keeps target order, so the winner pass below is unaffected
        targets
            .par_iter()
            .enumerate()
            .map(|(i, target)| search_until(target, difficulty, deadline, cancel, |n, t| hash_input(i, n, t)))
            .collect()
    } else {
        let mut outcomes = Vec::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            if cancel.is_cancelled() || Instant::now() >= deadline {
                debug!("batch budget spent before target {i}");
                break;
            }
            outcomes.push(search_until(target, difficulty, deadline, cancel, |n, t| {
                hash_input(i, n, t)
            }));
        }
        outcomes
    };

    let winner = pick_winner(outcomes);
    match &winner {
        Some(w) => info!(
            "batch winner: target #{} ratio={} nonce={}",
            w.index, w.result.target.source_ratio, w.result.nonce
        ),
        None => info!("batch produced no result across {} target(s)", targets.len()),
    }
    Ok(winner)
}

fn pick_winner(outcomes: Vec<Option<MiningResult>>) -> Option<BatchWinner> {
    let mut best: Option<BatchWinner> = None;
    for (index, outcome) in outcomes.into_iter().enumerate() {
        let Some(result) = outcome else { continue };
        let better = match &best {
            None => true,
            // strict: ties keep the earlier success
            Some(b) => result.target.source_ratio > b.result.target.source_ratio,
        };
        if better {
            best = Some(BatchWinner { index, result });
        }
    }
    best
}
