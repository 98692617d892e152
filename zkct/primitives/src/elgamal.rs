//! Twisted ElGamal over the prime-order subgroup.
//!
//! The plaintext is carried in the exponent of the second generator:
//! `enc(v; r, pk) = (r·pk, r·G + v·H)`. Addition of ciphertexts adds the
//! plaintexts and the randomness, so encrypted balances can be updated
//! homomorphically. Decryption recovers `v·H` and then searches a bounded
//! window for `v` by baby-step/giant-step; messages are small integers
//! (amounts fit in 40 bits).

use std::collections::HashMap;

use ark_ec::CurveGroup;
use ark_ff::Zero;
use rand::Rng;
use thiserror::Error;

use crate::curve::{point_to_bytes, Point, G, H};
use crate::field::{mod_inverse, random_nonzero};
use crate::Fr;

/// Upper bound on plaintext width accepted by [`decrypt`].
pub const MAX_MESSAGE_BITS: u32 = 40;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecError {
    #[error("decryption search window exhausted")]
    OutOfRange,
    #[error("invalid decryption parameters")]
    InvalidParams,
}

/// Twisted-ElGamal ciphertext `(CL, CR)` with `CL = r·pk`,
/// `CR = r·G + v·H`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElGamalEnc {
    pub cl: Point,
    pub cr: Point,
}

impl ElGamalEnc {
    /// Homomorphic addition: `enc(v1, r1) + enc(v2, r2) = enc(v1+v2, r1+r2)`.
    pub fn add(&self, other: &ElGamalEnc) -> ElGamalEnc {
        ElGamalEnc {
            cl: self.cl + other.cl,
            cr: self.cr + other.cr,
        }
    }

    pub fn neg(&self) -> ElGamalEnc {
        ElGamalEnc {
            cl: -self.cl,
            cr: -self.cr,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Keypair {
    pub sk: Fr,
    pub pk: Point,
}

/// `sk ←$ [1, q)`, `pk = sk·G`. The inverse `sk⁻¹` must exist, so zero is
/// rejected during sampling.
pub fn keygen<R: Rng>(rng: &mut R) -> Keypair {
    let sk = random_nonzero(rng);
    Keypair { sk, pk: *G * sk }
}

pub fn encrypt(v: u64, r: &Fr, pk: &Point) -> ElGamalEnc {
    ElGamalEnc {
        cl: *pk * *r,
        cr: *G * *r + *H * Fr::from(v),
    }
}

/// Recover `v` from a ciphertext under `sk`, searching `[0, 2^max_bits)`.
///
/// `CR − sk⁻¹·CL = v·H`; the discrete log of the residue is found by
/// baby-step/giant-step over the window. Exhausting the window yields
/// [`DecError::OutOfRange`].
pub fn decrypt(ct: &ElGamalEnc, sk: &Fr, max_bits: u32) -> Result<u64, DecError> {
    if max_bits == 0 || max_bits > MAX_MESSAGE_BITS {
        return Err(DecError::InvalidParams);
    }
    let sk_inv = mod_inverse(*sk).map_err(|_| DecError::InvalidParams)?;
    let target = ct.cr - ct.cl * sk_inv;

    let baby_bits = max_bits.div_ceil(2);
    let baby_count = 1u64 << baby_bits;
    let giant_count = 1u64 << (max_bits - baby_bits);

    // Baby table: j·H for j in [0, 2^⌈bits/2⌉).
    let mut running = Point::zero();
    let mut babies = Vec::with_capacity(baby_count as usize);
    for _ in 0..baby_count {
        babies.push(running);
        running += *H;
    }
    let affine = Point::normalize_batch(&babies);
    let mut table: HashMap<[u8; 64], u64> = HashMap::with_capacity(baby_count as usize);
    for (j, p) in affine.iter().enumerate() {
        table.insert(point_to_bytes(&(*p).into()), j as u64);
    }

    let giant_step = *H * Fr::from(baby_count);
    let mut current = target;
    for i in 0..giant_count {
        if let Some(j) = table.get(&point_to_bytes(&current)) {
            return Ok(i * baby_count + j);
        }
        current -= giant_step;
    }
    Err(DecError::OutOfRange)
}
