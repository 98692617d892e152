//! Scalar- and coordinate-field helpers.
//!
//! `Fr` is the order of the prime subgroup; all randomness, secret keys and
//! Fiat–Shamir responses live there. `Fq` is the coordinate field of the
//! curve (the BN254 scalar field). Byte codecs are canonical fixed-width
//! big-endian and reject non-canonical encodings on decode.

use ark_ff::{BigInteger, Field, PrimeField, UniformRand, Zero};
use rand::Rng;
use thiserror::Error;

use crate::{Fq, Fr};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("zero has no modular inverse")]
    NotInvertible,
    #[error("non-canonical field element encoding")]
    NonCanonical,
}

/// Multiplicative inverse mod the subgroup order.
pub fn mod_inverse(x: Fr) -> Result<Fr, FieldError> {
    x.inverse().ok_or(FieldError::NotInvertible)
}

/// Uniform nonzero scalar. Zero draws are rejected and resampled.
pub fn random_nonzero<R: Rng>(rng: &mut R) -> Fr {
    loop {
        let x = Fr::rand(rng);
        if !x.is_zero() {
            return x;
        }
    }
}

pub fn fr_to_be_bytes(x: &Fr) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&x.into_bigint().to_bytes_be());
    out
}

pub fn fr_from_be_bytes(bytes: &[u8; 32]) -> Result<Fr, FieldError> {
    let x = Fr::from_be_bytes_mod_order(bytes);
    if fr_to_be_bytes(&x) != *bytes {
        return Err(FieldError::NonCanonical);
    }
    Ok(x)
}

pub fn fq_to_be_bytes(x: &Fq) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&x.into_bigint().to_bytes_be());
    out
}

pub fn fq_from_be_bytes(bytes: &[u8; 32]) -> Result<Fq, FieldError> {
    let x = Fq::from_be_bytes_mod_order(bytes);
    if fq_to_be_bytes(&x) != *bytes {
        return Err(FieldError::NonCanonical);
    }
    Ok(x)
}
