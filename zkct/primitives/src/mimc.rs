//! MiMC digest over the coordinate field.
//!
//! The transcript hash is an arithmetic-friendly MiMC permutation in
//! Miyaguchi–Preneel mode: 91 rounds of `x ← (x + k + cᵢ)^5` with round
//! constants derived by an iterated SHA-256 chain from a fixed seed. The
//! exponent 5 is coprime with `|Fq| − 1`, so each round is a permutation.
//!
//! Input bytes are zero-padded to 32-byte blocks; each block is reduced
//! into `Fq` and absorbed as `state ← E_state(m) + state + m`.

use ark_ff::{Field, PrimeField, Zero};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use crate::field::fq_to_be_bytes;
use crate::Fq;

const ROUNDS: usize = 91;
const CONSTANTS_SEED: &[u8] = b"zkct_mimc_seed";

static ROUND_CONSTANTS: Lazy<Vec<Fq>> = Lazy::new(|| {
    let mut constants = Vec::with_capacity(ROUNDS);
    let mut digest: [u8; 32] = Sha256::digest(CONSTANTS_SEED).into();
    for _ in 0..ROUNDS {
        digest = Sha256::digest(digest).into();
        constants.push(Fq::from_be_bytes_mod_order(&digest));
    }
    constants
});

/// One keyed MiMC permutation: 91 rounds of `(x + k + cᵢ)^5`, plus the
/// final key addition.
fn permute(message: Fq, key: Fq) -> Fq {
    let mut state = message;
    for constant in ROUND_CONSTANTS.iter() {
        let t = state + key + constant;
        state = t.square().square() * t;
    }
    state + key
}

/// MiMC digest of an arbitrary byte string, 32 bytes big-endian.
pub fn mimc_hash(data: &[u8]) -> [u8; 32] {
    let mut state = Fq::zero();
    for chunk in data.chunks(32) {
        let mut block = [0u8; 32];
        block[..chunk.len()].copy_from_slice(chunk);
        let m = Fq::from_be_bytes_mod_order(&block);
        state = permute(m, state) + state + m;
    }
    fq_to_be_bytes(&state)
}
