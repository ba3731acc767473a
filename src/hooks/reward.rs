use log::info;
use serde::Serialize;

/// Reward owed to a wallet for a mined block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardEvent {
    pub wallet_id: String,
    pub amount: f64,
    pub block_hash: String,
}

/// Crediting the reward happens outside this crate.
pub trait RewardSink: Send + Sync {
    fn emit(&self, event: &RewardEvent);
}

impl<F> RewardSink for F
where
    F: Fn(&RewardEvent) + Send + Sync,
{
    fn emit(&self, event: &RewardEvent) {
        self(event)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogRewardSink;

impl RewardSink for LogRewardSink {
    fn emit(&self, event: &RewardEvent) {
        info!(
            "reward {:.8} owed to {} for block {}",
            event.amount, event.wallet_id, event.block_hash
        );
    }
}
