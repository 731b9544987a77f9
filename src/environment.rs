//! Hardfork predicate, EVM configuration and per-transaction environment.

use ethereum_types::{Address, H256, U256};
use rustc_hash::FxHashMap;
use strum::EnumString;

/// Ethereum protocol version, total-ordered from Frontier through Prague.
/// Opcode availability and gas schedules are gated on the active value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Fork {
    Frontier,
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Paris,
    Shanghai,
    Cancun,
    Prague,
}

impl Fork {
    pub const LATEST: Fork = Fork::Prague;

    pub fn is_at_least(self, other: Fork) -> bool {
        self >= other
    }

    pub fn is_before(self, other: Fork) -> bool {
        self < other
    }
}

impl Default for Fork {
    fn default() -> Self {
        Fork::LATEST
    }
}

/// Embedder-supplied, loader-free configuration. Reading this from a file or
/// environment variables is the embedder's concern, not this crate's.
#[derive(Debug, Clone, Copy)]
pub struct EvmConfig {
    pub fork: Fork,
    pub chain_id: u64,
}

impl Default for EvmConfig {
    fn default() -> Self {
        EvmConfig {
            fork: Fork::LATEST,
            chain_id: 1,
        }
    }
}

/// Block-level context visible to BLOCK-category opcodes. Block-hash and
/// blob-hash *provisioning* are out of scope; this struct is where the
/// caller plugs in values it already resolved.
#[derive(Debug, Clone)]
pub struct BlockEnv {
    pub number: U256,
    pub coinbase: Address,
    pub timestamp: U256,
    pub gas_limit: U256,
    pub prev_randao_or_difficulty: U256,
    pub base_fee_per_gas: U256,
    pub blob_base_fee: U256,
    pub blob_hashes: Vec<ethereum_types::H256>,
    /// BLOCKHASH lookups, keyed by block number. The caller is expected to
    /// have populated the last 256 ancestor hashes before execution; a miss
    /// is indistinguishable from "outside the 256-block window" and yields 0.
    pub block_hashes: FxHashMap<u64, H256>,
}

impl Default for BlockEnv {
    fn default() -> Self {
        BlockEnv {
            number: U256::zero(),
            coinbase: Address::zero(),
            timestamp: U256::zero(),
            gas_limit: U256::zero(),
            prev_randao_or_difficulty: U256::zero(),
            base_fee_per_gas: U256::zero(),
            blob_base_fee: U256::zero(),
            blob_hashes: Vec::new(),
            block_hashes: FxHashMap::default(),
        }
    }
}

/// Transaction-level inputs handed to the call orchestrator. Signature
/// recovery and intrinsic-gas charging already happened upstream.
#[derive(Debug, Clone)]
pub struct TxEnv {
    pub origin: Address,
    pub gas_price: U256,
}

impl Default for TxEnv {
    fn default() -> Self {
        TxEnv {
            origin: Address::zero(),
            gas_price: U256::zero(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub config: EvmConfig,
    pub block: BlockEnv,
    pub tx: TxEnv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_ordering() {
        assert!(Fork::Shanghai.is_at_least(Fork::London));
        assert!(Fork::Frontier.is_before(Fork::Homestead));
        assert!(!Fork::Berlin.is_at_least(Fork::London));
    }
}
