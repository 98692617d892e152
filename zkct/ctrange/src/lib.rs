//! # zkct-ctrange — bit-decomposition range proof
//!
//! Proves that a committed amount lies in `[0, 2^32)` by decomposing it
//! into bits and giving, per bit, a Chaum–Pedersen-style OR proof that the
//! bit commitment opens to either `0` or `2^i` without revealing which.
//! The aggregate commitment `A = Σ Asᵢ` is published so a relation can
//! bind the per-bit openings to its refreshed-balance commitment.
//!
//! Proving runs in two phases separated by the global Fiat–Shamir
//! challenge (the per-bit sub-challenges for zero bits depend on it). The
//! per-bit work in both phases, and in verification, is independent and
//! runs fork-join parallel: one worker per bit, each writing its own
//! pre-allocated slot before signalling completion on a bounded channel
//! local to the call. The call fails if any worker reports an error.

use std::sync::mpsc;
use std::thread;

use ark_ec::Group;
use ark_ff::{Field, Zero};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::debug;

use zkct_primitives::{
    fr_from_be_bytes, fr_to_be_bytes, hash_to_fr, in_subgroup, pedersen, point_from_bytes,
    point_to_bytes, random_nonzero, Fr, Point, G, H,
};

#[cfg(test)]
mod tests;

/// Bit width of the proved range: amounts lie in `[0, 2^32)`.
pub const RANGE_MAX_BITS: usize = 32;

/// Serialized size: `C ‖ Zs[32] ‖ As[32] ‖ A`.
pub const SERIALIZED_LEN: usize = 32 + RANGE_MAX_BITS * 32 + RANGE_MAX_BITS * 64 + 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid range-proof parameters")]
    InvalidParams,
    #[error("range-proof bit is not 0 or 1")]
    InvalidBit,
    #[error("degenerate per-bit sub-challenge")]
    Degenerate,
}

/// Non-interactive proof that a committed value is in `[0, 2^32)`.
///
/// `bit_comms[i]` commits to bit `i` scaled by `2^i`; `a` is their sum and
/// doubles as the Pedersen commitment `v·h + r̄·g` of the proved value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeProof {
    pub c: Fr,
    pub zs: [Fr; RANGE_MAX_BITS],
    pub bit_comms: [Point; RANGE_MAX_BITS],
    pub a: Point,
    pub g: Point,
    pub h: Point,
}

#[derive(Clone, Copy)]
struct BitSlot {
    alpha: Fr,
    r: Fr,
    sub_c: Fr,
    a_a: Point,
    comm: Point,
    z: Fr,
    blind: Fr,
}

impl BitSlot {
    fn empty() -> Self {
        BitSlot {
            alpha: Fr::zero(),
            r: Fr::zero(),
            sub_c: Fr::zero(),
            a_a: Point::zero(),
            comm: Point::zero(),
            z: Fr::zero(),
            blind: Fr::zero(),
        }
    }
}

fn hash_point(p: &Point) -> Fr {
    hash_to_fr(&point_to_bytes(p))
}

fn to_binary(b: u64) -> Result<[u8; RANGE_MAX_BITS], RangeError> {
    if b >> RANGE_MAX_BITS != 0 {
        return Err(RangeError::InvalidBit);
    }
    let mut bits = [0u8; RANGE_MAX_BITS];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = ((b >> i) & 1) as u8;
    }
    Ok(bits)
}

/// Run one task per slot on its own thread. Each worker writes its slot
/// and then signals its index (or an error) on a channel bounded at the
/// slot count; the caller drains exactly that many messages and joins.
fn fork_join<T, F>(slots: &mut [T], task: F) -> Result<(), RangeError>
where
    T: Send,
    F: Fn(usize, &mut T) -> Result<(), RangeError> + Sync,
{
    let n = slots.len();
    let (tx, rx) = mpsc::sync_channel::<Result<usize, RangeError>>(n);
    thread::scope(|scope| {
        for (i, slot) in slots.iter_mut().enumerate() {
            let tx = tx.clone();
            let task = &task;
            scope.spawn(move || {
                let res = task(i, slot).map(|_| i);
                let _ = tx.send(res);
            });
        }
        drop(tx);
        let mut failure = None;
        for _ in 0..n {
            match rx.recv() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    failure.get_or_insert(RangeError::Degenerate);
                }
            }
        }
        match failure {
            None => Ok(()),
            Some(e) => Err(e),
        }
    })
}

fn phase1(
    bit: u8,
    g: &Point,
    h_two_exp: &Point,
    seed: [u8; 32],
    slot: &mut BitSlot,
) -> Result<(), RangeError> {
    let mut rng = ChaCha20Rng::from_seed(seed);
    match bit {
        0 => {
            slot.alpha = random_nonzero(&mut rng);
            slot.a_a = *g * slot.alpha;
        }
        1 => {
            slot.r = random_nonzero(&mut rng);
            slot.comm = *g * slot.r + *h_two_exp;
            slot.alpha = random_nonzero(&mut rng);
            slot.sub_c = hash_point(&(*g * slot.alpha));
            slot.a_a = slot.comm * slot.sub_c;
            slot.blind = slot.r;
        }
        _ => return Err(RangeError::InvalidBit),
    }
    Ok(())
}

fn phase2(
    bit: u8,
    c: &Fr,
    two_exp: &Fr,
    g: &Point,
    h: &Point,
    seed: [u8; 32],
    slot: &mut BitSlot,
) -> Result<(), RangeError> {
    match bit {
        0 => {
            let mut rng = ChaCha20Rng::from_seed(seed);
            slot.r = random_nonzero(&mut rng);
            let tmp = pedersen::commit(&(*c * two_exp), &slot.r, h, g);
            slot.sub_c = hash_point(&tmp);
            let sub_c_inv = slot
                .sub_c
                .inverse()
                .ok_or(RangeError::Degenerate)?;
            slot.blind = slot.alpha * sub_c_inv;
            slot.comm = *g * slot.blind;
            slot.z = slot.r + slot.alpha * *c * sub_c_inv;
        }
        1 => {
            slot.z = slot.alpha + *c * slot.r;
        }
        _ => return Err(RangeError::InvalidBit),
    }
    Ok(())
}

/// Prove `b ∈ [0, 2^32)` with respect to the generator pair `(g, h)`.
///
/// Returns the proof together with the aggregate blinding `r̄` of `a`, so
/// the caller can use `(a, r̄)` as the refreshed Pedersen commitment and
/// its opening: `a = b·h + r̄·g`.
pub fn prove<R: RngCore>(
    b: u64,
    g: &Point,
    h: &Point,
    rng: &mut R,
) -> Result<(RangeProof, Fr), RangeError> {
    if !in_subgroup(g) || !in_subgroup(h) {
        return Err(RangeError::InvalidParams);
    }
    let bits = to_binary(b)?;

    let mut h_pows = [Point::zero(); RANGE_MAX_BITS];
    let mut current = *h;
    for slot in h_pows.iter_mut() {
        *slot = current;
        current.double_in_place();
    }

    let mut seeds = [[0u8; 32]; RANGE_MAX_BITS];
    for seed in seeds.iter_mut() {
        rng.fill_bytes(seed);
    }

    let mut slots = [BitSlot::empty(); RANGE_MAX_BITS];
    fork_join(&mut slots, |i, slot| {
        phase1(bits[i], g, &h_pows[i], seeds[i], slot)
    })?;

    let mut buf = Vec::with_capacity(RANGE_MAX_BITS * 64);
    for slot in &slots {
        buf.extend_from_slice(&point_to_bytes(&slot.a_a));
    }
    let c = hash_to_fr(&buf);

    let mut seeds2 = [[0u8; 32]; RANGE_MAX_BITS];
    for seed in seeds2.iter_mut() {
        rng.fill_bytes(seed);
    }
    let mut two_pows = [Fr::zero(); RANGE_MAX_BITS];
    for (i, p) in two_pows.iter_mut().enumerate() {
        *p = Fr::from(1u64 << i);
    }

    fork_join(&mut slots, |i, slot| {
        phase2(bits[i], &c, &two_pows[i], g, h, seeds2[i], slot)
    })?;

    let mut a = Point::zero();
    let mut blind = Fr::zero();
    let mut zs = [Fr::zero(); RANGE_MAX_BITS];
    let mut bit_comms = [Point::zero(); RANGE_MAX_BITS];
    for (i, slot) in slots.iter().enumerate() {
        a += slot.comm;
        blind += slot.blind;
        zs[i] = slot.z;
        bit_comms[i] = slot.comm;
    }

    Ok((
        RangeProof {
            c,
            zs,
            bit_comms,
            a,
            g: *g,
            h: *h,
        },
        blind,
    ))
}

impl RangeProof {
    /// Verify the proof. Cryptographic mismatches return `Ok(false)`;
    /// `Err` is reserved for inputs that cannot be evaluated.
    pub fn verify(&self) -> Result<bool, RangeError> {
        if !in_subgroup(&self.g)
            || !in_subgroup(&self.h)
            || !in_subgroup(&self.a)
            || self.bit_comms.iter().any(|p| !in_subgroup(p))
        {
            return Err(RangeError::InvalidParams);
        }

        let mut neg_h_pows = [Point::zero(); RANGE_MAX_BITS];
        let mut current = -self.h;
        for slot in neg_h_pows.iter_mut() {
            *slot = current;
            current.double_in_place();
        }

        let mut a_as = [Point::zero(); RANGE_MAX_BITS];
        fork_join(&mut a_as, |i, out| {
            let aih_neg = self.bit_comms[i] + neg_h_pows[i];
            let com = self.g * self.zs[i] + (-aih_neg) * self.c;
            *out = self.bit_comms[i] * hash_point(&com);
            Ok(())
        })?;

        let mut buf = Vec::with_capacity(RANGE_MAX_BITS * 64);
        for a_a in &a_as {
            buf.extend_from_slice(&point_to_bytes(a_a));
        }
        if hash_to_fr(&buf) != self.c {
            debug!("range proof rejected: aggregate challenge mismatch");
            return Ok(false);
        }

        let sum = self
            .bit_comms
            .iter()
            .fold(Point::zero(), |acc, p| acc + *p);
        if sum != self.a {
            debug!("range proof rejected: bit commitments do not sum to A");
            return Ok(false);
        }
        Ok(true)
    }

    /// Canonical wire format: `C ‖ Zs[32] ‖ As[32] ‖ A`. The generators
    /// are the fixed `G`/`H` pair and are not serialized.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SERIALIZED_LEN);
        out.extend_from_slice(&fr_to_be_bytes(&self.c));
        for z in &self.zs {
            out.extend_from_slice(&fr_to_be_bytes(z));
        }
        for p in &self.bit_comms {
            out.extend_from_slice(&point_to_bytes(p));
        }
        out.extend_from_slice(&point_to_bytes(&self.a));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<RangeProof, RangeError> {
        if bytes.len() != SERIALIZED_LEN {
            return Err(RangeError::InvalidParams);
        }
        fn scalar(bytes: &[u8], off: &mut usize) -> Result<Fr, RangeError> {
            let mut raw = [0u8; 32];
            raw.copy_from_slice(&bytes[*off..*off + 32]);
            *off += 32;
            fr_from_be_bytes(&raw).map_err(|_| RangeError::InvalidParams)
        }
        fn point(bytes: &[u8], off: &mut usize) -> Result<Point, RangeError> {
            let mut raw = [0u8; 64];
            raw.copy_from_slice(&bytes[*off..*off + 64]);
            *off += 64;
            point_from_bytes(&raw).map_err(|_| RangeError::InvalidParams)
        }

        let mut off = 0usize;
        let c = scalar(bytes, &mut off)?;
        let mut zs = [Fr::zero(); RANGE_MAX_BITS];
        for z in zs.iter_mut() {
            *z = scalar(bytes, &mut off)?;
        }
        let mut bit_comms = [Point::zero(); RANGE_MAX_BITS];
        for p in bit_comms.iter_mut() {
            *p = point(bytes, &mut off)?;
        }
        let a = point(bytes, &mut off)?;

        Ok(RangeProof {
            c,
            zs,
            bit_comms,
            a,
            g: *G,
            h: *H,
        })
    }
}
