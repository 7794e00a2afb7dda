use std::collections::BTreeMap;
use std::path::Path;

use glyph_core::{sha256_hex, GlyphError, Receipt};
use serde::{Deserialize, Serialize};

const DEFAULT_QUALITY: f64 = 0.8;
const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000";

fn store_err(e: impl std::fmt::Display) -> GlyphError {
    GlyphError::Storage(e.to_string())
}

fn ser<T: Serialize>(value: &T) -> Result<Vec<u8>, GlyphError> {
    bincode::serialize(value).map_err(store_err)
}

fn de<T: for<'a> Deserialize<'a>>(bytes: &[u8]) -> Result<T, GlyphError> {
    bincode::deserialize(bytes).map_err(store_err)
}

/// One committed receipt plus the hash-chain linkage that makes the ledger
/// tamper-evident (spec.md §3, §4.C).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiptRow {
    pub receipt: Receipt,
    pub seq: u64,
    pub prev_hash: String,
    pub payload_hash: String,
    pub chain_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub address: String,
    pub balance: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountTxn {
    pub seq: u64,
    pub address: String,
    pub delta: i64,
    pub balance_after: u64,
    pub reason: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payment {
    pub id: String,
    pub address: String,
    pub amount: u64,
    pub epoch_id: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Validator {
    pub pubkey: String,
    pub added_at: u64,
}

/// One node's share of an epoch snapshot (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payout {
    pub node_pubkey: String,
    pub eth_address: String,
    pub amount: u64,
}

/// A `{address, amount}` pair ready for on-chain execution, selected from a
/// snapshot's non-zero payouts (spec.md §4.I).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedPayout {
    pub address: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Epoch {
    pub epoch_id: String,
    pub created_at: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub token_ticker: String,
    pub total_amount: u64,
    pub payouts: Vec<Payout>,
    pub root_hash: String,
    pub gateway_sig: Option<String>,
    pub anchor_tx: Option<String>,
    pub finalized: bool,
}

impl Epoch {
    /// Non-zero payouts ready for minting (spec.md §4.I).
    pub fn select_payouts(&self) -> Vec<SelectedPayout> {
        self.payouts
            .iter()
            .filter(|p| p.amount > 0)
            .map(|p| SelectedPayout {
                address: p.eth_address.clone(),
                amount: p.amount,
            })
            .collect()
    }
}

/// Embedded, transactional ledger store (spec.md §4.B-G). One `sled::Db`
/// with a named tree per table, mirroring the original SQLite schema.
pub struct Ledger {
    db: sled::Db,
    receipts: sled::Tree,
    receipts_seq: sled::Tree,
    accounts: sled::Tree,
    account_txns: sled::Tree,
    payments: sled::Tree,
    node_addresses: sled::Tree,
    epochs: sled::Tree,
    epoch_signatures: sled::Tree,
    validators: sled::Tree,
    settings: sled::Tree,
    quality: sled::Tree,
    meta: sled::Tree,
}

impl Ledger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GlyphError> {
        let db = sled::open(path).map_err(store_err)?;
        Ok(Self {
            receipts: db.open_tree("receipts").map_err(store_err)?,
            receipts_seq: db.open_tree("receipts_seq").map_err(store_err)?,
            accounts: db.open_tree("accounts").map_err(store_err)?,
            account_txns: db.open_tree("account_txns").map_err(store_err)?,
            payments: db.open_tree("payments").map_err(store_err)?,
            node_addresses: db.open_tree("node_addresses").map_err(store_err)?,
            epochs: db.open_tree("epochs").map_err(store_err)?,
            epoch_signatures: db.open_tree("epoch_signatures").map_err(store_err)?,
            validators: db.open_tree("validators").map_err(store_err)?,
            settings: db.open_tree("settings").map_err(store_err)?,
            quality: db.open_tree("quality").map_err(store_err)?,
            meta: db.open_tree("meta").map_err(store_err)?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), GlyphError> {
        self.db.flush().map_err(store_err)?;
        Ok(())
    }

    // ── Receipts / hash chain ──────────────────────────────────────────

    fn next_seq(&self) -> Result<u64, GlyphError> {
        let current = self
            .meta
            .get("next_seq")
            .map_err(store_err)?
            .map(|b| u64::from_be_bytes(b.as_ref().try_into().unwrap_or([0; 8])))
            .unwrap_or(0);
        self.meta
            .insert("next_seq", (current + 1).to_be_bytes().to_vec())
            .map_err(store_err)?;
        Ok(current)
    }

    pub fn chain_head(&self) -> Result<String, GlyphError> {
        Ok(self
            .meta
            .get("chain_head")
            .map_err(store_err)?
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_else(|| GENESIS_HASH.to_string()))
    }

    /// Idempotently commits `receipt`. If a row with the same receipt id
    /// already exists (e.g. re-delivered by gossip or a pull), the existing
    /// row is returned unchanged rather than re-chained.
    pub fn add_receipt(&self, receipt: Receipt) -> Result<ReceiptRow, GlyphError> {
        let id = receipt.receipt_id();
        if let Some(existing) = self.receipts.get(id.as_bytes()).map_err(store_err)? {
            return de(&existing);
        }
        let prev_hash = self.chain_head()?;
        let payload_hash = id.clone();
        let chain_hash = sha256_hex(format!("{prev_hash}{payload_hash}").as_bytes());
        let seq = self.next_seq()?;
        let row = ReceiptRow {
            receipt,
            seq,
            prev_hash,
            payload_hash,
            chain_hash: chain_hash.clone(),
        };
        self.receipts
            .insert(id.as_bytes(), ser(&row)?)
            .map_err(store_err)?;
        self.receipts_seq
            .insert(seq.to_be_bytes(), id.as_bytes())
            .map_err(store_err)?;
        self.meta
            .insert("chain_head", chain_hash.as_bytes())
            .map_err(store_err)?;
        Ok(row)
    }

    pub fn get_receipt(&self, receipt_id: &str) -> Result<Option<ReceiptRow>, GlyphError> {
        match self.receipts.get(receipt_id.as_bytes()).map_err(store_err)? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_receipts(&self) -> Result<Vec<ReceiptRow>, GlyphError> {
        self.list_receipts_since(0)
    }

    /// Returns rows with `seq >= since_seq`, in chain order.
    pub fn list_receipts_since(&self, since_seq: u64) -> Result<Vec<ReceiptRow>, GlyphError> {
        let mut out = Vec::new();
        for item in self.receipts_seq.range(since_seq.to_be_bytes()..) {
            let (_, id) = item.map_err(store_err)?;
            let bytes = self
                .receipts
                .get(&id)
                .map_err(store_err)?
                .ok_or_else(|| GlyphError::Storage("dangling receipt index entry".into()))?;
            out.push(de(&bytes)?);
        }
        Ok(out)
    }

    /// Walks the chain in seq order and confirms every `chain_hash` matches
    /// `H(prev_hash ++ payload_hash)` of its row, and that `prev_hash` links
    /// to the previous row's `chain_hash` (spec.md §4.C invariant).
    pub fn verify_chain(&self) -> Result<bool, GlyphError> {
        let mut expected_prev = GENESIS_HASH.to_string();
        for row in self.list_receipts()? {
            if row.prev_hash != expected_prev {
                return Ok(false);
            }
            let expected_chain =
                sha256_hex(format!("{}{}", row.prev_hash, row.payload_hash).as_bytes());
            if row.chain_hash != expected_chain {
                return Ok(false);
            }
            expected_prev = row.chain_hash;
        }
        Ok(true)
    }

    // ── Accounts ────────────────────────────────────────────────────────

    pub fn ensure_account(&self, address: &str) -> Result<Account, GlyphError> {
        if let Some(bytes) = self.accounts.get(address.as_bytes()).map_err(store_err)? {
            return de(&bytes);
        }
        let account = Account {
            address: address.to_string(),
            balance: 0,
        };
        self.accounts
            .insert(address.as_bytes(), ser(&account)?)
            .map_err(store_err)?;
        Ok(account)
    }

    pub fn get_account(&self, address: &str) -> Result<Option<Account>, GlyphError> {
        match self.accounts.get(address.as_bytes()).map_err(store_err)? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn credit(&self, address: &str, amount: u64, reason: &str, now: u64) -> Result<Account, GlyphError> {
        let mut account = self.ensure_account(address)?;
        account.balance += amount;
        self.accounts
            .insert(address.as_bytes(), ser(&account)?)
            .map_err(store_err)?;
        self.record_txn(address, amount as i64, account.balance, reason, now)?;
        Ok(account)
    }

    pub fn debit(&self, address: &str, amount: u64, reason: &str, now: u64) -> Result<Account, GlyphError> {
        let mut account = self.ensure_account(address)?;
        if account.balance < amount {
            return Err(GlyphError::InsufficientBalance {
                have: account.balance,
                need: amount,
            });
        }
        account.balance -= amount;
        self.accounts
            .insert(address.as_bytes(), ser(&account)?)
            .map_err(store_err)?;
        self.record_txn(address, -(amount as i64), account.balance, reason, now)?;
        Ok(account)
    }

    fn record_txn(
        &self,
        address: &str,
        delta: i64,
        balance_after: u64,
        reason: &str,
        created_at: u64,
    ) -> Result<(), GlyphError> {
        let seq = self.next_txn_seq()?;
        let txn = AccountTxn {
            seq,
            address: address.to_string(),
            delta,
            balance_after,
            reason: reason.to_string(),
            created_at,
        };
        self.account_txns
            .insert(seq.to_be_bytes(), ser(&txn)?)
            .map_err(store_err)?;
        Ok(())
    }

    fn next_txn_seq(&self) -> Result<u64, GlyphError> {
        let current = self
            .meta
            .get("next_txn_seq")
            .map_err(store_err)?
            .map(|b| u64::from_be_bytes(b.as_ref().try_into().unwrap_or([0; 8])))
            .unwrap_or(0);
        self.meta
            .insert("next_txn_seq", (current + 1).to_be_bytes().to_vec())
            .map_err(store_err)?;
        Ok(current)
    }

    pub fn list_txns(&self, address: &str) -> Result<Vec<AccountTxn>, GlyphError> {
        let mut out = Vec::new();
        for item in self.account_txns.iter() {
            let (_, bytes) = item.map_err(store_err)?;
            let txn: AccountTxn = de(&bytes)?;
            if txn.address == address {
                out.push(txn);
            }
        }
        Ok(out)
    }

    // ── Payments ────────────────────────────────────────────────────────

    pub fn record_payment(&self, payment: Payment) -> Result<(), GlyphError> {
        self.payments
            .insert(payment.id.as_bytes(), ser(&payment)?)
            .map_err(store_err)?;
        Ok(())
    }

    pub fn list_payments(&self, epoch_id: &str) -> Result<Vec<Payment>, GlyphError> {
        let mut out = Vec::new();
        for item in self.payments.iter() {
            let (_, bytes) = item.map_err(store_err)?;
            let payment: Payment = de(&bytes)?;
            if payment.epoch_id == epoch_id {
                out.push(payment);
            }
        }
        Ok(out)
    }

    // ── Node Ethereum addresses ─────────────────────────────────────────

    pub fn is_valid_eth_address(address: &str) -> bool {
        address.len() == 42
            && address.starts_with("0x")
            && address[2..].chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn set_node_address(&self, pubkey: &str, eth_address: &str) -> Result<(), GlyphError> {
        if !Self::is_valid_eth_address(eth_address) {
            return Err(GlyphError::InvalidAddress(eth_address.to_string()));
        }
        self.node_addresses
            .insert(pubkey.as_bytes(), eth_address.as_bytes())
            .map_err(store_err)?;
        Ok(())
    }

    pub fn get_node_address(&self, pubkey: &str) -> Result<Option<String>, GlyphError> {
        Ok(self
            .node_addresses
            .get(pubkey.as_bytes())
            .map_err(store_err)?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    // ── Validators / quorum ─────────────────────────────────────────────

    pub fn add_validator(&self, pubkey: &str, now: u64) -> Result<(), GlyphError> {
        let validator = Validator {
            pubkey: pubkey.to_string(),
            added_at: now,
        };
        self.validators
            .insert(pubkey.as_bytes(), ser(&validator)?)
            .map_err(store_err)?;
        Ok(())
    }

    pub fn remove_validator(&self, pubkey: &str) -> Result<(), GlyphError> {
        self.validators.remove(pubkey.as_bytes()).map_err(store_err)?;
        Ok(())
    }

    pub fn list_validators(&self) -> Result<Vec<Validator>, GlyphError> {
        let mut out = Vec::new();
        for item in self.validators.iter() {
            let (_, bytes) = item.map_err(store_err)?;
            out.push(de(&bytes)?);
        }
        Ok(out)
    }

    pub fn set_quorum_threshold(&self, threshold: u32) -> Result<(), GlyphError> {
        self.settings
            .insert("quorum_threshold", threshold.to_be_bytes().to_vec())
            .map_err(store_err)?;
        Ok(())
    }

    pub fn quorum_threshold(&self) -> Result<u32, GlyphError> {
        Ok(self
            .settings
            .get("quorum_threshold")
            .map_err(store_err)?
            .map(|b| u32::from_be_bytes(b.as_ref().try_into().unwrap_or([0; 4])))
            .unwrap_or(1))
    }

    pub fn set_token_ticker(&self, ticker: &str) -> Result<(), GlyphError> {
        self.settings
            .insert("token_ticker", ticker.as_bytes())
            .map_err(store_err)?;
        Ok(())
    }

    pub fn token_ticker(&self) -> Result<String, GlyphError> {
        Ok(self
            .settings
            .get("token_ticker")
            .map_err(store_err)?
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_else(|| "GLYPH".to_string()))
    }

    // ── Token address settings ──────────────────────────────────────────

    pub fn set_token_address(&self, address: &str) -> Result<(), GlyphError> {
        if !Self::is_valid_eth_address(address) {
            return Err(GlyphError::InvalidAddress(address.to_string()));
        }
        self.settings
            .insert("token_address", address.as_bytes())
            .map_err(store_err)?;
        Ok(())
    }

    pub fn token_address(&self) -> Result<Option<String>, GlyphError> {
        Ok(self
            .settings
            .get("token_address")
            .map_err(store_err)?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    pub fn set_token_network(&self, network: &str) -> Result<(), GlyphError> {
        self.settings
            .insert("token_network", network.as_bytes())
            .map_err(store_err)?;
        Ok(())
    }

    pub fn token_network(&self) -> Result<Option<String>, GlyphError> {
        Ok(self
            .settings
            .get("token_network")
            .map_err(store_err)?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    pub fn set_rpc_url(&self, url: &str) -> Result<(), GlyphError> {
        self.settings
            .insert("rpc_url", url.as_bytes())
            .map_err(store_err)?;
        Ok(())
    }

    pub fn rpc_url(&self) -> Result<Option<String>, GlyphError> {
        Ok(self
            .settings
            .get("rpc_url")
            .map_err(store_err)?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    // ── Quality scores ──────────────────────────────────────────────────

    /// Quality is keyed by `receipt_id`, per spec.md §3 (`receipt_id →
    /// score`) — not by node, since a node's receipts may be judged
    /// individually.
    pub fn record_quality(&self, receipt_id: &str, score: f64) -> Result<(), GlyphError> {
        self.quality
            .insert(receipt_id.as_bytes(), ser(&score)?)
            .map_err(store_err)?;
        Ok(())
    }

    pub fn quality_of(&self, receipt_id: &str) -> Result<f64, GlyphError> {
        match self.quality.get(receipt_id.as_bytes()).map_err(store_err)? {
            Some(bytes) => de(&bytes),
            None => Ok(DEFAULT_QUALITY),
        }
    }

    // ── Epoch aggregation ───────────────────────────────────────────────

    /// Sums `output_tokens * quality(receipt_id)` per node over receipts
    /// whose `created_at` falls in the half-open window `[start_time,
    /// end_time)`. Missing quality defaults to 0.8 (spec.md §4.C, §4.F).
    pub fn aggregate_weighted(
        &self,
        start_time: u64,
        end_time: u64,
    ) -> Result<BTreeMap<String, u64>, GlyphError> {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for row in self.list_receipts()? {
            if row.receipt.created_at < start_time || row.receipt.created_at >= end_time {
                continue;
            }
            let quality = self.quality_of(&row.payload_hash)?;
            let tokens = row.receipt.output_tokens as f64;
            *totals.entry(row.receipt.node_pubkey).or_insert(0.0) += tokens * quality;
        }
        Ok(totals
            .into_iter()
            .map(|(k, v)| (k, v.round() as u64))
            .collect())
    }

    pub fn save_epoch(&self, epoch: &Epoch) -> Result<(), GlyphError> {
        self.epochs
            .insert(epoch.epoch_id.as_bytes(), ser(epoch)?)
            .map_err(store_err)?;
        Ok(())
    }

    pub fn get_epoch(&self, id: &str) -> Result<Option<Epoch>, GlyphError> {
        match self.epochs.get(id.as_bytes()).map_err(store_err)? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set_anchor(&self, id: &str, anchor_tx: &str) -> Result<(), GlyphError> {
        let mut epoch = self
            .get_epoch(id)?
            .ok_or_else(|| GlyphError::NotFound(format!("epoch {id}")))?;
        epoch.anchor_tx = Some(anchor_tx.to_string());
        self.save_epoch(&epoch)
    }

    pub fn set_finalized(&self, id: &str) -> Result<(), GlyphError> {
        let mut epoch = self
            .get_epoch(id)?
            .ok_or_else(|| GlyphError::NotFound(format!("epoch {id}")))?;
        epoch.finalized = true;
        self.save_epoch(&epoch)
    }

    pub fn is_finalized(&self, id: &str) -> Result<bool, GlyphError> {
        Ok(self.get_epoch(id)?.map(|e| e.finalized).unwrap_or(false))
    }

    pub fn add_epoch_signature(
        &self,
        epoch_id: &str,
        validator_pubkey: &str,
        signature: &str,
    ) -> Result<(), GlyphError> {
        let mut key = epoch_id.as_bytes().to_vec();
        key.extend_from_slice(validator_pubkey.as_bytes());
        self.epoch_signatures
            .insert(key, signature.as_bytes())
            .map_err(store_err)?;
        Ok(())
    }

    pub fn epoch_signature_count(&self, epoch_id: &str) -> Result<usize, GlyphError> {
        let prefix = epoch_id.as_bytes();
        Ok(self.epoch_signatures.scan_prefix(prefix).count())
    }

    /// Signature-counting quorum check (unweighted by validator stake), per
    /// spec.md's stated non-goal of excluding Byzantine-fault weighting.
    pub fn has_quorum(&self, epoch_id: &str) -> Result<bool, GlyphError> {
        Ok(self.epoch_signature_count(epoch_id)? >= self.quorum_threshold()? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tmp() -> (Ledger, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        (ledger, dir)
    }

    fn sample_receipt(session_id: &str) -> Receipt {
        Receipt::new(
            "gw-pub".into(),
            "node-pub".into(),
            session_id.into(),
            "route-a".into(),
            10,
            20,
            100,
            1,
        )
    }

    #[test]
    fn receipt_insertion_is_idempotent() {
        let (ledger, _dir) = open_tmp();
        let r = sample_receipt("s1");
        let first = ledger.add_receipt(r.clone()).unwrap();
        let second = ledger.add_receipt(r).unwrap();
        assert_eq!(first.seq, second.seq);
        assert_eq!(ledger.list_receipts().unwrap().len(), 1);
    }

    #[test]
    fn chain_detects_tampering() {
        let (ledger, _dir) = open_tmp();
        ledger.add_receipt(sample_receipt("s1")).unwrap();
        ledger.add_receipt(sample_receipt("s2")).unwrap();
        assert!(ledger.verify_chain().unwrap());

        let mut row = ledger.get_receipt(&sample_receipt("s1").receipt_id()).unwrap().unwrap();
        row.chain_hash = "tampered".into();
        ledger
            .receipts
            .insert(
                sample_receipt("s1").receipt_id().as_bytes(),
                ser(&row).unwrap(),
            )
            .unwrap();
        assert!(!ledger.verify_chain().unwrap());
    }

    #[test]
    fn account_conservation_holds() {
        let (ledger, _dir) = open_tmp();
        ledger.credit("alice", 100, "seed", 1).unwrap();
        ledger.debit("alice", 40, "spend", 2).unwrap();
        let account = ledger.get_account("alice").unwrap().unwrap();
        assert_eq!(account.balance, 60);
    }

    #[test]
    fn debit_rejects_insufficient_balance() {
        let (ledger, _dir) = open_tmp();
        ledger.credit("alice", 10, "seed", 1).unwrap();
        let err = ledger.debit("alice", 20, "spend", 2).unwrap_err();
        assert!(matches!(err, GlyphError::InsufficientBalance { .. }));
    }

    #[test]
    fn quorum_is_monotonic_in_signature_count() {
        let (ledger, _dir) = open_tmp();
        ledger.set_quorum_threshold(2).unwrap();
        let epoch = Epoch {
            epoch_id: "e1".into(),
            created_at: 1,
            start_time: 0,
            end_time: 0,
            token_ticker: "GLYPH".into(),
            total_amount: 0,
            payouts: Vec::new(),
            root_hash: "x".into(),
            gateway_sig: None,
            anchor_tx: None,
            finalized: false,
        };
        ledger.save_epoch(&epoch).unwrap();
        assert!(!ledger.has_quorum("e1").unwrap());
        ledger.add_epoch_signature("e1", "v1", "sig1").unwrap();
        assert!(!ledger.has_quorum("e1").unwrap());
        ledger.add_epoch_signature("e1", "v2", "sig2").unwrap();
        assert!(ledger.has_quorum("e1").unwrap());
    }

    #[test]
    fn weighted_aggregation_scales_by_quality_and_output_tokens_only() {
        let (ledger, _dir) = open_tmp();
        let receipt = sample_receipt("s1");
        let receipt_id = receipt.receipt_id();
        ledger.record_quality(&receipt_id, 1.0).unwrap();
        ledger.add_receipt(receipt).unwrap();
        // sample_receipt has input_tokens=10, output_tokens=20, created_at=1.
        let totals = ledger.aggregate_weighted(0, 2).unwrap();
        assert_eq!(totals.get("node-pub"), Some(&20));
    }

    #[test]
    fn aggregation_excludes_receipts_outside_the_time_window() {
        let (ledger, _dir) = open_tmp();
        ledger.add_receipt(sample_receipt("s1")).unwrap();
        let totals = ledger.aggregate_weighted(2, 10).unwrap();
        assert!(totals.is_empty());
    }

    #[test]
    fn eth_address_validation() {
        assert!(Ledger::is_valid_eth_address(
            "0x1234567890123456789012345678901234567890"
        ));
        assert!(!Ledger::is_valid_eth_address("not-an-address"));
    }

    #[test]
    fn select_payouts_drops_zero_amounts() {
        let epoch = Epoch {
            epoch_id: "e1".into(),
            created_at: 1,
            start_time: 0,
            end_time: 1,
            token_ticker: "GLYPH".into(),
            total_amount: 300,
            payouts: vec![
                Payout {
                    node_pubkey: "a".into(),
                    eth_address: "0x1111111111111111111111111111111111111111".into(),
                    amount: 100,
                },
                Payout {
                    node_pubkey: "b".into(),
                    eth_address: "0x2222222222222222222222222222222222222222".into(),
                    amount: 0,
                },
            ],
            root_hash: "x".into(),
            gateway_sig: None,
            anchor_tx: None,
            finalized: false,
        };
        let selected = epoch.select_payouts();
        assert_eq!(
            selected,
            vec![SelectedPayout {
                address: "0x1111111111111111111111111111111111111111".into(),
                amount: 100,
            }]
        );
    }
}
