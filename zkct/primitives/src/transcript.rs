//! Fiat–Shamir transcript.
//!
//! A single append-only byte buffer, seeded with the `FIXED_CURVE`
//! domain-separation tag. Each relation appends its public elements in a
//! fixed per-relation order: points as `x || y` (2 × 32 bytes big-endian),
//! integers as 8 bytes big-endian, pre-hashed material as raw bytes. The
//! challenge is the MiMC digest of the buffer reduced mod the subgroup
//! order.
//!
//! The append order is a contract, not an implementation detail: a
//! verifier reconstructing a different buffer derives a different
//! challenge, and the proof fails.

use ark_ff::PrimeField;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use crate::curve::{point_to_bytes, Point};
use crate::elgamal::ElGamalEnc;
use crate::mimc::mimc_hash;
use crate::Fr;

/// 32-byte domain-separation tag prepended to every transcript.
pub static FIXED_CURVE: Lazy<[u8; 32]> =
    Lazy::new(|| Sha256::digest(b"zkct-twisted-edwards-bn254-v1").into());

/// MiMC digest of `data`, reduced into the scalar field.
pub fn hash_to_fr(data: &[u8]) -> Fr {
    Fr::from_be_bytes_mod_order(&mimc_hash(data))
}

pub struct Transcript {
    buf: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(1024);
        buf.extend_from_slice(&*FIXED_CURVE);
        Transcript { buf }
    }

    pub fn append_point(&mut self, p: &Point) {
        self.buf.extend_from_slice(&point_to_bytes(p));
    }

    /// `CL` then `CR`.
    pub fn append_enc(&mut self, enc: &ElGamalEnc) {
        self.append_point(&enc.cl);
        self.append_point(&enc.cr);
    }

    pub fn append_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Derive the challenge `c ∈ [0, q)` from the accumulated buffer.
    pub fn challenge(&self) -> Fr {
        hash_to_fr(&self.buf)
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
