//! Withdraw: move a public amount out of an encrypted balance.
//!
//! The prover shows ownership of the account key and opens the refreshed
//! balance commitment `T = b'·H + r̄·G` against the post-withdraw
//! ciphertext, where `b' = b − bΔ − fee` (the fee folds into the same
//! balance when it is paid in the withdrawn asset). A range proof on `b'`
//! shows the account cannot be overdrawn.

use ark_ff::Zero;
use rand::Rng;
use tracing::debug;

use zkct_ctrange::{self as ctrange, RangeProof};
use zkct_primitives::{
    in_subgroup, mod_inverse, random_nonzero, ElGamalEnc, Fr, Point, Transcript, G, H,
};

use crate::{
    append_fee_block, enc_subgroup, ownership_check, refresh_check, refresh_commit, response,
    valid_amount, verify_ranges_parallel, ProofError,
};

/// Ciphertext after deducting a public amount from the value slot.
pub(crate) fn deduct_public(c: &ElGamalEnc, amount: u64) -> ElGamalEnc {
    ElGamalEnc {
        cl: c.cl,
        cr: c.cr - *H * Fr::from(amount),
    }
}

/// Prover-side inputs for building a [`WithdrawRelation`].
pub struct WithdrawInput {
    pub sk: Fr,

    /// Current encrypted balance and its plaintext.
    pub c: ElGamalEnc,
    pub b: u64,

    /// Public amount to withdraw.
    pub b_delta: u64,

    pub asset_id: u32,

    /// Destination bound into the challenge.
    pub receive_addr: Vec<u8>,

    pub fee_asset_id: u32,
    pub fee: u64,

    /// Fee-asset balance (ciphertext, plaintext); required when the fee
    /// asset differs from the withdrawn asset.
    pub fee_balance: Option<(ElGamalEnc, u64)>,
}

pub struct WithdrawRelation {
    // statement
    pub pk: Point,
    pub c: ElGamalEnc,
    pub b_delta: u64,
    pub t: Point,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub asset_id: u32,
    pub fee_asset_id: u32,
    pub fee: u64,
    pub receive_addr: Vec<u8>,
    pub range_proof: RangeProof,
    pub fee_range_proof: Option<RangeProof>,
    // witness
    pub(crate) sk: Fr,
    pub(crate) bar_r: Fr,
    pub(crate) bar_r_fee: Fr,
    pub(crate) b_prime: u64,
}

impl WithdrawRelation {
    /// Build the relation from the caller's secret material. Runs the
    /// range proofs, which fix the refreshed commitments `T` (and
    /// `T_fee` when the fee is paid in another asset) together with
    /// their openings.
    pub fn new<R: Rng>(input: &WithdrawInput, rng: &mut R) -> Result<Self, ProofError> {
        if input.sk.is_zero()
            || !enc_subgroup(&input.c)
            || !valid_amount(input.b)
            || !valid_amount(input.b_delta)
            || !valid_amount(input.fee)
            || input.receive_addr.is_empty()
            || input.receive_addr.len() > 256
        {
            return Err(ProofError::InvalidParams);
        }
        let pk = *G * input.sk;
        let same = input.fee_asset_id == input.asset_id;

        let spent = if same {
            input.b_delta + input.fee
        } else {
            input.b_delta
        };
        let b_prime = input.b.checked_sub(spent).ok_or(ProofError::InvalidParams)?;
        let (range_proof, bar_r) = ctrange::prove(b_prime, &G, &H, rng)?;
        let t = range_proof.a;

        let (c_fee, t_fee, bar_r_fee, fee_range_proof) = if same {
            (input.c, t, bar_r, None)
        } else {
            let (c_fee, b_fee) = input.fee_balance.ok_or(ProofError::InvalidParams)?;
            if !enc_subgroup(&c_fee) || !valid_amount(b_fee) {
                return Err(ProofError::InvalidParams);
            }
            let b_fee_prime = b_fee.checked_sub(input.fee).ok_or(ProofError::InvalidParams)?;
            let (fee_proof, bar_r_fee) = ctrange::prove(b_fee_prime, &G, &H, rng)?;
            (c_fee, fee_proof.a, bar_r_fee, Some(fee_proof))
        };

        Ok(WithdrawRelation {
            pk,
            c: input.c,
            b_delta: input.b_delta,
            t,
            c_fee,
            t_fee,
            asset_id: input.asset_id,
            fee_asset_id: input.fee_asset_id,
            fee: input.fee,
            receive_addr: input.receive_addr.clone(),
            range_proof,
            fee_range_proof,
            sk: input.sk,
            bar_r,
            bar_r_fee,
            b_prime,
        })
    }

    fn same_asset(&self) -> bool {
        self.fee_asset_id == self.asset_id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawProof {
    // statement
    pub pk: Point,
    pub c: ElGamalEnc,
    pub b_delta: u64,
    pub t: Point,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub asset_id: u32,
    pub fee_asset_id: u32,
    pub fee: u64,
    pub receive_addr: Vec<u8>,
    // auxiliary commitments
    pub a_pk: Point,
    pub a_t: Point,
    pub a_t_fee: Point,
    // responses
    pub z_sk: Fr,
    pub z_sk_inv: Fr,
    pub z_bar_r: Fr,
    pub z_bar_r_fee: Fr,
    // attachments
    pub range_proof: RangeProof,
    pub fee_range_proof: Option<RangeProof>,
}

pub fn prove_withdraw<R: Rng>(
    rel: &WithdrawRelation,
    rng: &mut R,
) -> Result<WithdrawProof, ProofError> {
    let same = rel.same_asset();

    // commit phase
    let alpha_sk = random_nonzero(rng);
    let alpha_sk_inv = mod_inverse(alpha_sk)?;
    let alpha_bar_r = random_nonzero(rng);
    let a_pk = *G * alpha_sk;

    let spent = if same { rel.b_delta + rel.fee } else { rel.b_delta };
    let c_prime = deduct_public(&rel.c, spent);
    let a_t = refresh_commit(&alpha_bar_r, &alpha_sk_inv, &c_prime.cl);

    let (alpha_bar_r_fee, a_t_fee) = if same {
        (alpha_bar_r, a_t)
    } else {
        let alpha_fee = random_nonzero(rng);
        let a_fee = refresh_commit(&alpha_fee, &alpha_sk_inv, &rel.c_fee.cl);
        (alpha_fee, a_fee)
    };

    // challenge
    let mut t = Transcript::new();
    t.append_point(&rel.pk);
    t.append_enc(&rel.c);
    t.append_point(&rel.t);
    t.append_u64(rel.b_delta);
    t.append_u64(rel.asset_id as u64);
    t.append_bytes(&rel.receive_addr);
    append_fee_block(&mut t, &a_t_fee, &rel.c_fee, rel.fee_asset_id, rel.fee);
    t.append_point(&a_pk);
    t.append_point(&a_t);
    let c = t.challenge();

    // responses
    let z_sk = response(&alpha_sk, &c, &rel.sk);
    let z_sk_inv = response(&alpha_sk_inv, &c, &mod_inverse(rel.sk)?);
    let z_bar_r = response(&alpha_bar_r, &c, &rel.bar_r);
    let z_bar_r_fee = response(&alpha_bar_r_fee, &c, &rel.bar_r_fee);

    Ok(WithdrawProof {
        pk: rel.pk,
        c: rel.c,
        b_delta: rel.b_delta,
        t: rel.t,
        c_fee: rel.c_fee,
        t_fee: rel.t_fee,
        asset_id: rel.asset_id,
        fee_asset_id: rel.fee_asset_id,
        fee: rel.fee,
        receive_addr: rel.receive_addr.clone(),
        a_pk,
        a_t,
        a_t_fee,
        z_sk,
        z_sk_inv,
        z_bar_r,
        z_bar_r_fee,
        range_proof: rel.range_proof.clone(),
        fee_range_proof: rel.fee_range_proof.clone(),
    })
}

impl WithdrawProof {
    fn same_asset(&self) -> bool {
        self.fee_asset_id == self.asset_id
    }

    fn check_params(&self) -> Result<(), ProofError> {
        let points = [
            &self.pk,
            &self.t,
            &self.t_fee,
            &self.a_pk,
            &self.a_t,
            &self.a_t_fee,
        ];
        let subgroup_ok = points.iter().all(|p| in_subgroup(p))
            && enc_subgroup(&self.c)
            && enc_subgroup(&self.c_fee);
        if !subgroup_ok || !valid_amount(self.b_delta) || !valid_amount(self.fee) {
            return Err(ProofError::InvalidParams);
        }
        Ok(())
    }

    pub fn verify(&self) -> Result<bool, ProofError> {
        self.check_params()?;
        let same = self.same_asset();

        // Each attached range proof must open the matching commitment.
        if self.range_proof.a != self.t {
            debug!("withdraw: range proof aggregate does not match T");
            return Ok(false);
        }
        match (&self.fee_range_proof, same) {
            (None, true) => {
                if self.t_fee != self.t || self.c_fee != self.c || self.a_t_fee != self.a_t {
                    debug!("withdraw: same-asset fee aliases do not hold");
                    return Ok(false);
                }
            }
            (Some(fee_proof), false) => {
                if fee_proof.a != self.t_fee {
                    debug!("withdraw: fee range proof aggregate does not match T_fee");
                    return Ok(false);
                }
            }
            _ => {
                debug!("withdraw: fee range proof presence mismatch");
                return Ok(false);
            }
        }

        // challenge
        let mut t = Transcript::new();
        t.append_point(&self.pk);
        t.append_enc(&self.c);
        t.append_point(&self.t);
        t.append_u64(self.b_delta);
        t.append_u64(self.asset_id as u64);
        t.append_bytes(&self.receive_addr);
        append_fee_block(&mut t, &self.a_t_fee, &self.c_fee, self.fee_asset_id, self.fee);
        t.append_point(&self.a_pk);
        t.append_point(&self.a_t);
        let c = t.challenge();

        if !ownership_check(&self.z_sk, &self.a_pk, &self.pk, &c) {
            debug!("withdraw: ownership check failed");
            return Ok(false);
        }

        let spent = if same { self.b_delta + self.fee } else { self.b_delta };
        let c_prime = deduct_public(&self.c, spent);
        if !refresh_check(&self.z_bar_r, &self.z_sk_inv, &c_prime, &self.a_t, &self.t, &c) {
            debug!("withdraw: refresh opening failed");
            return Ok(false);
        }

        if !same {
            let c_fee_prime = deduct_public(&self.c_fee, self.fee);
            if !refresh_check(
                &self.z_bar_r_fee,
                &self.z_sk_inv,
                &c_fee_prime,
                &self.a_t_fee,
                &self.t_fee,
                &c,
            ) {
                debug!("withdraw: fee refresh opening failed");
                return Ok(false);
            }
        }

        let mut ranges = vec![&self.range_proof];
        if let Some(fee_proof) = &self.fee_range_proof {
            ranges.push(fee_proof);
        }
        verify_ranges_parallel(&ranges)
    }
}
