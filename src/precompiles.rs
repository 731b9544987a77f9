//! Precompile dispatch hook (spec.md §1 explicitly excludes precompile
//! *implementations*; §4.8 step 5 still requires the orchestrator to
//! recognize precompile addresses and attempt dispatch). This module only
//! answers "is this a precompile address, and if so, is anyone plugged in
//! to run it" — ECRECOVER..BLS12-381/KZG bodies are the embedder's concern.

use crate::environment::Fork;
use bytes::Bytes;
use ethereum_types::Address;

/// Highest precompile id active at `fork` (spec.md §4.8: "0x01..0x09
/// Berlin-Istanbul, 0x01..0x0A Cancun, 0x01..0x12 Prague").
fn max_precompile_id(fork: Fork) -> u8 {
    if fork.is_at_least(Fork::Prague) {
        0x12
    } else if fork.is_at_least(Fork::Cancun) {
        0x0A
    } else {
        0x09
    }
}

/// The single low-order byte a precompile address reduces to, if `address`
/// is of the form `0x00..00XX`.
fn precompile_id(address: Address) -> Option<u8> {
    let bytes = address.as_bytes();
    #[allow(clippy::indexing_slicing)]
    let (high, low) = (&bytes[..19], bytes[19]);
    if high.iter().any(|&b| b != 0) {
        return None;
    }
    Some(low)
}

pub fn is_precompile(address: Address, fork: Fork) -> bool {
    match precompile_id(address) {
        Some(id) if id >= 1 => id <= max_precompile_id(fork),
        _ => false,
    }
}

/// Plugged in by an embedder that actually implements precompile bodies.
/// Returns `None` when `id` isn't one this runner handles (letting the
/// orchestrator fall back to its no-op placeholder), `Some(Err(_))` on a
/// precompile-internal failure, `Some(Ok((output, gas_used)))` on success.
pub trait PrecompileRunner: Send + Sync {
    fn run(&mut self, id: u8, input: &[u8], gas_limit: u64) -> Option<Result<(Bytes, u64), String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_precompile_addresses_by_fork() {
        let ecrecover = Address::from_low_u64_be(1);
        let blake2f = Address::from_low_u64_be(9);
        let point_eval = Address::from_low_u64_be(0x0A);
        let bls_g1_add = Address::from_low_u64_be(0x0B);

        assert!(is_precompile(ecrecover, Fork::Istanbul));
        assert!(is_precompile(blake2f, Fork::Istanbul));
        assert!(!is_precompile(point_eval, Fork::Istanbul));
        assert!(is_precompile(point_eval, Fork::Cancun));
        assert!(!is_precompile(bls_g1_add, Fork::Cancun));
        assert!(is_precompile(bls_g1_add, Fork::Prague));
        assert!(!is_precompile(Address::zero(), Fork::Prague));
    }
}
