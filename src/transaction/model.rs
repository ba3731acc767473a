use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use super::{KIND_REPORT, KIND_REWARD, PAYLOAD_VERSION};
use crate::mining::MiningResult;
use crate::report::Report;
use crate::scoring::ScoreResult;
use crate::utc_now_iso;

/// Opaque ledger entry. The ledger only hashes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    pub payload: Value,
    /// Content seal over the payload. Not a cryptographic signature.
    pub signature: String,
}

impl Transaction {
    /// Build a transaction; the id and seal are derived from the payload.
    pub fn new(kind: &str, id_prefix: &str, payload: Value) -> Self {
        let payload_hash = sha256_hex(&serde_json::to_vec(&payload).expect("json serialize"));
        Self {
            tx_id: format!("{id_prefix}-{}-{}", Utc::now().timestamp(), &payload_hash[..16]),
            kind: kind.to_string(),
            timestamp: utc_now_iso(),
            signature: format!("SIG-{}", &payload_hash[..32]),
            payload,
        }
    }

    /// Record of a scored report.
    pub fn report(report: &Report, score: &ScoreResult, network: &str) -> Self {
        let payload = json!({
            "id": report.id,
            "location": report.location(),
            "coordinates": { "lat": report.lat, "lon": report.lon },
            "trajectory_score": score,
            "evidence_hash": report.evidence_hash(),
            "classification": report.classification(),
            "network": network,
            "version": PAYLOAD_VERSION,
        });
        Self::new(KIND_REPORT, "NWI-TX", payload)
    }

    /// Payout from the network to a miner wallet for a successful search.
    pub fn reward(network: &str, wallet: &str, amount: f64, mined: &MiningResult) -> Self {
        let payload = json!({
            "from": network,
            "to": wallet,
            "amount": amount,
            "mining_digest": mined.digest_hex,
            "nonce": mined.nonce,
        });
        Self::new(KIND_REWARD, "TOKEN", payload)
    }

    /// Stable serialization: fields in declaration order, payload keys sorted.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("serialize tx")
    }

    /// SHA-256 (hex) of the canonical form; the merkle leaf for this entry.
    pub fn content_hash(&self) -> String {
        sha256_hex(&self.canonical_bytes())
    }

    /// True when the seal still matches the payload.
    pub fn seal_matches(&self) -> bool {
        match serde_json::to_vec(&self.payload) {
            Ok(bytes) => self.signature == format!("SIG-{}", &sha256_hex(&bytes)[..32]),
            Err(_) => false,
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{Phase, ScoreEngine};
    use crate::targeting::NonceTarget;
    use serde_json::json;

    fn sample_report() -> Report {
        Report::from_value(&json!({
            "id": "LIVE-1", "lat": 37.22, "lon": -77.40,
            "courage": 0.8, "dexterity": 0.7, "clause_matter": 0.85, "audacity": 0.6,
            "meta": {"location": "pier-7"}
        }))
        .unwrap()
    }

    #[test]
    fn report_transaction_carries_score_and_evidence() {
        let report = sample_report();
        let score = report.score_with(&ScoreEngine::default());
        let tx = Transaction::report(&report, &score, "nwi_testnet");

        assert_eq!(tx.kind, "nwi_report");
        assert!(tx.tx_id.starts_with("NWI-TX-"));
        assert_eq!(tx.payload["id"], "LIVE-1");
        assert_eq!(tx.payload["location"], "pier-7");
        assert_eq!(tx.payload["classification"], "UNCLASSIFIED");
        assert_eq!(tx.payload["trajectory_score"]["ratio"], 0.7375);
        assert_eq!(tx.payload["evidence_hash"], report.evidence_hash());
        assert!(tx.seal_matches());
    }

    #[test]
    fn reward_transaction_references_mining_result() {
        let mined = MiningResult {
            digest_hex: format!("0{}", "a".repeat(63)),
            nonce: 4242,
            target: NonceTarget {
                start_nonce: 1270,
                range_size: 1_200_000,
                source_ratio: 0.7375,
                source_phase: Phase::Verification,
            },
            elapsed_seconds: 0.1,
        };
        let tx = Transaction::reward("nwi_mainnet", "NWI_abc", 0.03, &mined);
        assert_eq!(tx.kind, "token_reward");
        assert_eq!(tx.payload["nonce"], 4242);
        assert_eq!(tx.payload["to"], "NWI_abc");
        assert!(tx.tx_id.starts_with("TOKEN-"));
    }

    #[test]
    fn content_hash_tracks_any_field_change() {
        let report = sample_report();
        let score = report.score_with(&ScoreEngine::default());
        let tx = Transaction::report(&report, &score, "nwi_testnet");
        let same = tx.clone();
        assert_eq!(tx.content_hash(), same.content_hash());

        let mut tampered = tx.clone();
        tampered.payload["id"] = json!("LIVE-2");
        assert_ne!(tx.content_hash(), tampered.content_hash());
        assert!(!tampered.seal_matches());
    }

    #[test]
    fn canonical_form_survives_json_round_trip() {
        let report = sample_report();
        let score = report.score_with(&ScoreEngine::default());
        let tx = Transaction::report(&report, &score, "nwi_testnet");
        let line = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&line).unwrap();
        assert_eq!(tx.content_hash(), back.content_hash());
    }
}
