//! Twisted-Edwards group layer on the BN254 scalar field (Baby Jubjub).
//!
//! The protocol works entirely in the prime-order subgroup. Besides the
//! standard base `G`, two more generators are fixed: `H` (value slot of
//! Pedersen commitments and ElGamal ciphertexts) and `U`, both obtained by
//! hash-to-point from domain-separation seeds so that no discrete-log
//! relation between any pair is known.

use ark_ec::{AffineRepr, CurveGroup, Group};
use ark_ed_on_bn254::{EdwardsAffine, EdwardsProjective};
use ark_ff::PrimeField;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::field::{fq_from_be_bytes, fq_to_be_bytes, FieldError};
use crate::Fq;

pub type Point = EdwardsProjective;

/// Seed for the Pedersen/ElGamal value generator.
pub const H_SEED: &str = "zkct_H_seed";
/// Seed for the auxiliary generator.
pub const U_SEED: &str = "zkct_U_seed";

/// Standard base point of the prime-order subgroup.
pub static G: Lazy<Point> = Lazy::new(EdwardsProjective::generator);

/// `H = map_to_group(H_SEED)`; no known DL relative to `G`.
pub static H: Lazy<Point> =
    Lazy::new(|| map_to_group(H_SEED).expect("H seed maps onto the curve"));

/// `U = map_to_group(U_SEED)`; independent of both `G` and `H`.
pub static U: Lazy<Point> =
    Lazy::new(|| map_to_group(U_SEED).expect("U seed maps onto the curve"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurveError {
    #[error("point is not on the curve")]
    NotOnCurve,
    #[error("point is outside the prime-order subgroup")]
    NotInSubgroup,
    #[error("invalid point encoding")]
    InvalidEncoding,
    #[error("seed {0:?} does not map onto the curve")]
    UnmappableSeed(String),
}

impl From<FieldError> for CurveError {
    fn from(_: FieldError) -> Self {
        CurveError::InvalidEncoding
    }
}

/// Deterministic hash-to-point (BLS-style try-and-increment).
///
/// SHA-256 of `seed || counter` is interpreted as a candidate `y`
/// coordinate; if the Edwards equation has a solution `x` the point is
/// cofactor-cleared into the prime-order subgroup. The first counter that
/// yields a non-identity subgroup element wins, so the result is a
/// nothing-up-my-sleeve generator.
pub fn map_to_group(seed: &str) -> Result<Point, CurveError> {
    for counter in 0u8..=255 {
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        hasher.update([counter]);
        let digest = hasher.finalize();
        let y = Fq::from_be_bytes_mod_order(&digest);
        if let Some(candidate) = EdwardsAffine::get_point_from_y_unchecked(y, false) {
            let cleared = candidate.mul_by_cofactor();
            if !cleared.is_zero() {
                return Ok(cleared.into_group());
            }
        }
    }
    Err(CurveError::UnmappableSeed(seed.to_owned()))
}

/// Prime-order subgroup membership. Must hold for every externally
/// supplied point before it enters the protocol.
pub fn in_subgroup(p: &Point) -> bool {
    let affine = p.into_affine();
    affine.is_on_curve() && affine.is_in_correct_subgroup_assuming_on_curve()
}

/// Canonical encoding: affine `x || y`, each 32 bytes big-endian.
pub fn point_to_bytes(p: &Point) -> [u8; 64] {
    let affine = p.into_affine();
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&fq_to_be_bytes(&affine.x));
    out[32..].copy_from_slice(&fq_to_be_bytes(&affine.y));
    out
}

/// Decode and validate a canonical point encoding. Rejects non-canonical
/// coordinates, off-curve points and points outside the prime subgroup.
pub fn point_from_bytes(bytes: &[u8; 64]) -> Result<Point, CurveError> {
    let mut x_bytes = [0u8; 32];
    let mut y_bytes = [0u8; 32];
    x_bytes.copy_from_slice(&bytes[..32]);
    y_bytes.copy_from_slice(&bytes[32..]);
    let x = fq_from_be_bytes(&x_bytes)?;
    let y = fq_from_be_bytes(&y_bytes)?;
    let affine = EdwardsAffine::new_unchecked(x, y);
    if !affine.is_on_curve() {
        return Err(CurveError::NotOnCurve);
    }
    if !affine.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CurveError::NotInSubgroup);
    }
    Ok(affine.into_group())
}
