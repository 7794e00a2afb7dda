use std::sync::atomic::{AtomicU64, Ordering};

use glyph_core::{sha256_hex, GlyphError};
use glyph_ledger::Epoch;

/// The on-chain minter is out of scope for real execution (spec.md §1);
/// this trait is the seam a real ERC-20 minter implementation would fill.
#[async_trait::async_trait]
pub trait MintExecutor: Send + Sync {
    /// Commits the epoch's root hash on-chain. Returns the anchor tx hash.
    async fn anchor(&self, epoch: &Epoch) -> Result<String, GlyphError>;
    /// Mints the epoch's payouts. Returns the mint tx hash.
    async fn execute(&self, epoch: &Epoch) -> Result<String, GlyphError>;
    fn token_supply(&self) -> u64;
}

/// Deterministic stand-in: derives a pseudo-txid from the epoch root hash
/// instead of talking to a chain, and tracks supply in-process.
pub struct StubMintExecutor {
    supply: AtomicU64,
}

impl Default for StubMintExecutor {
    fn default() -> Self {
        Self {
            supply: AtomicU64::new(0),
        }
    }
}

#[async_trait::async_trait]
impl MintExecutor for StubMintExecutor {
    async fn anchor(&self, epoch: &Epoch) -> Result<String, GlyphError> {
        Ok(format!(
            "0x{}",
            &sha256_hex(format!("anchor:{}", epoch.root_hash).as_bytes())[..40]
        ))
    }

    async fn execute(&self, epoch: &Epoch) -> Result<String, GlyphError> {
        let total: u64 = epoch.payouts.iter().map(|p| p.amount).sum();
        self.supply.fetch_add(total, Ordering::SeqCst);
        Ok(format!(
            "0x{}",
            &sha256_hex(format!("execute:{}", epoch.root_hash).as_bytes())[..40]
        ))
    }

    fn token_supply(&self) -> u64 {
        self.supply.load(Ordering::SeqCst)
    }
}
