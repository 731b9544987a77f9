//! 512-bit widening type used only by ADDMOD/MULMOD (spec §4.6, §8): compute
//! in 512-bit space then reduce mod `n`, so results near 2²⁵⁶ are exact.

ethereum_types::construct_uint! {
    pub struct U512(8);
}

impl From<ethereum_types::U256> for U512 {
    fn from(value: ethereum_types::U256) -> Self {
        let ethereum_types::U256(limbs) = value;
        U512([limbs[0], limbs[1], limbs[2], limbs[3], 0, 0, 0, 0])
    }
}
