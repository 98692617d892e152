//! # zkct-sigma — confidential-transaction relation provers and verifiers
//!
//! One relation per transaction kind: [`transfer`], [`withdraw`],
//! [`unlock`], [`swap`], [`add_liquidity`] and [`remove_liquidity`]. All
//! follow the same Schnorr-style skeleton:
//!
//! 1. **Commit**: draw fresh `α` randomness and form auxiliary points
//!    from linear combinations of `G`, `H`, the public keys and the
//!    ciphertext components.
//! 2. **Challenge**: append the statement and the auxiliary points to a
//!    [`Transcript`] in the relation's fixed order and hash to
//!    `c ∈ [0, q)`.
//! 3. **Respond**: `z_w = α_w + c·w` for every witness `w`.
//! 4. **Attach**: one range proof per refreshed balance, plus one for the
//!    fee side when the fee asset differs from the transacted asset.
//!
//! Verifiers rebuild the identical transcript, recompute every auxiliary
//! point from the responses and return `Ok(false)` on any cryptographic or
//! structural mismatch; `Err` is reserved for inputs that cannot be
//! evaluated at all.

use std::sync::mpsc;
use std::thread;

use thiserror::Error;

use zkct_ctrange::{RangeError, RangeProof};
use zkct_primitives::{in_subgroup, CurveError, ElGamalEnc, FieldError, Fr, Point, Transcript, G};

pub mod add_liquidity;
pub mod remove_liquidity;
mod serialize;
pub mod swap;
pub mod transfer;
pub mod unlock;
pub mod withdraw;

#[cfg(test)]
mod tests;

pub use add_liquidity::{
    prove_add_liquidity, AddLiquidityInput, AddLiquidityProof, AddLiquidityRelation,
};
pub use remove_liquidity::{
    prove_remove_liquidity, RemoveLiquidityInput, RemoveLiquidityProof, RemoveLiquidityRelation,
};
pub use swap::{prove_swap, SwapInput, SwapProof, SwapRelation};
pub use transfer::{prove_transfer, TransferInput, TransferProof, TransferRelation};
pub use unlock::{prove_unlock, UnlockInput, UnlockProof, UnlockRelation};
pub use withdraw::{prove_withdraw, WithdrawInput, WithdrawProof, WithdrawRelation};

/// Amounts must fit the range-proof window.
pub const MAX_AMOUNT_BITS: u32 = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofError {
    #[error("invalid proof parameters")]
    InvalidParams,
    #[error("transcript hash failure")]
    Transcript,
    #[error(transparent)]
    Range(#[from] RangeError),
}

impl From<FieldError> for ProofError {
    fn from(_: FieldError) -> Self {
        ProofError::InvalidParams
    }
}

impl From<CurveError> for ProofError {
    fn from(_: CurveError) -> Self {
        ProofError::InvalidParams
    }
}

pub(crate) fn valid_amount(v: u64) -> bool {
    v >> MAX_AMOUNT_BITS == 0
}

/// Both ciphertext components in the prime-order subgroup.
pub(crate) fn enc_subgroup(c: &ElGamalEnc) -> bool {
    in_subgroup(&c.cl) && in_subgroup(&c.cr)
}

/// `z = α + c·w mod q`.
pub(crate) fn response(alpha: &Fr, c: &Fr, w: &Fr) -> Fr {
    *alpha + *c * *w
}

/// Commit phase of the refresh-opening rail:
/// `A_T = α_r̄·G + α_sk⁻¹·(−C'.CL)`.
pub(crate) fn refresh_commit(alpha_bar_r: &Fr, alpha_sk_inv: &Fr, cl_prime: &Point) -> Point {
    *G * *alpha_bar_r + (-*cl_prime) * *alpha_sk_inv
}

/// Response check of the refresh-opening rail:
/// `z_r̄·G + z_sk⁻¹·(−C'.CL) == A_T + c·(T + (−C'.CR))`.
pub(crate) fn refresh_check(
    z_bar_r: &Fr,
    z_sk_inv: &Fr,
    c_prime: &ElGamalEnc,
    a_t: &Point,
    t: &Point,
    c: &Fr,
) -> bool {
    let neg = c_prime.neg();
    let lhs = *G * *z_bar_r + neg.cl * *z_sk_inv;
    let rhs = *a_t + (*t + neg.cr) * *c;
    lhs == rhs
}

/// `z_sk·G == A_pk + c·pk`.
pub(crate) fn ownership_check(z_sk: &Fr, a_pk: &Point, pk: &Point, c: &Fr) -> bool {
    *G * *z_sk == *a_pk + *pk * *c
}

/// Encryption-correctness rail for a delta ciphertext with secret
/// randomness: `z_r·pk == A + c·CL`.
pub(crate) fn enc_rail_check(z_r: &Fr, pk: &Point, a: &Point, cl: &Point, c: &Fr) -> bool {
    *pk * *z_r == *a + *cl * *c
}

/// Fee block transcript order: `A_T_fee ‖ C_fee ‖ fee_asset_id ‖ fee`.
pub(crate) fn append_fee_block(
    t: &mut Transcript,
    a_t_fee: &Point,
    c_fee: &ElGamalEnc,
    fee_asset_id: u32,
    fee: u64,
) {
    t.append_point(a_t_fee);
    t.append_enc(c_fee);
    t.append_u64(fee_asset_id as u64);
    t.append_u64(fee);
}

/// Integer square root (floor), Newton's method.
pub(crate) fn isqrt(n: u128) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut x = n;
    let mut y = (x + 1) >> 1;
    while y < x {
        x = y;
        y = (x + n / x) >> 1;
    }
    x as u64
}

/// LP amount rule: `Δ_LP = ⌊√(bΔA·bΔB)⌋`.
pub(crate) fn lp_amount(delta_a: u64, delta_b: u64) -> u64 {
    isqrt(delta_a as u128 * delta_b as u128)
}

/// AMM consistency: the posted deltas match the constant-product price to
/// within one unit of rounding, `|b_poolB·bΔA − b_poolA·bΔB| ≤
/// max(b_poolA, b_poolB)`.
pub(crate) fn amm_rate_within_tolerance(
    pool_a: u64,
    pool_b: u64,
    delta_a: u64,
    delta_b: u64,
) -> bool {
    let lhs = pool_b as i128 * delta_a as i128;
    let rhs = pool_a as i128 * delta_b as i128;
    (lhs - rhs).abs() <= pool_a.max(pool_b) as i128
}

/// Constant-product swap output: `⌊b_poolB·bΔA / (b_poolA + bΔA)⌋`.
pub(crate) fn swap_output(pool_a: u64, pool_b: u64, delta_a: u64) -> Option<u64> {
    let denom = pool_a as u128 + delta_a as u128;
    if denom == 0 {
        return None;
    }
    Some((pool_b as u128 * delta_a as u128 / denom) as u64)
}

/// RemoveLiquidity no-slippage rule:
/// `b_pool·Δ_LP ≤ b_LP·bΔ + b_LP`.
pub(crate) fn no_slippage(pool_side: u64, lp_total: u64, delta_side: u64, delta_lp: u64) -> bool {
    pool_side as u128 * delta_lp as u128
        <= lp_total as u128 * delta_side as u128 + lp_total as u128
}

/// Verify a batch of range proofs fork-join parallel: one worker per
/// proof, completion reported on a channel bounded at the batch size, the
/// caller drains exactly that many messages. Any worker error fails the
/// batch; any `false` verdict makes the batch `Ok(false)`.
pub(crate) fn verify_ranges_parallel(proofs: &[&RangeProof]) -> Result<bool, ProofError> {
    let n = proofs.len();
    let (tx, rx) = mpsc::sync_channel::<Result<bool, RangeError>>(n);
    thread::scope(|scope| {
        for proof in proofs {
            let tx = tx.clone();
            scope.spawn(move || {
                let _ = tx.send(proof.verify());
            });
        }
        drop(tx);
        let mut all_valid = true;
        let mut failure = None;
        for _ in 0..n {
            match rx.recv() {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => all_valid = false,
                Ok(Err(e)) => {
                    failure.get_or_insert(ProofError::Range(e));
                }
                Err(_) => {
                    failure.get_or_insert(ProofError::InvalidParams);
                }
            }
        }
        match failure {
            None => Ok(all_valid),
            Some(e) => Err(e),
        }
    })
}

/// Tagged variant over the six proof shapes. All kinds expose the same
/// verify / serialize interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxProof {
    Transfer(TransferProof),
    Withdraw(WithdrawProof),
    Unlock(UnlockProof),
    Swap(SwapProof),
    AddLiquidity(AddLiquidityProof),
    RemoveLiquidity(RemoveLiquidityProof),
}

impl TxProof {
    pub fn verify(&self) -> Result<bool, ProofError> {
        match self {
            TxProof::Transfer(p) => p.verify(),
            TxProof::Withdraw(p) => p.verify(),
            TxProof::Unlock(p) => p.verify(),
            TxProof::Swap(p) => p.verify(),
            TxProof::AddLiquidity(p) => p.verify(),
            TxProof::RemoveLiquidity(p) => p.verify(),
        }
    }
}
