//! Transfer: move a hidden amount between two encrypted balances.
//!
//! The sender proves: both delta ciphertexts are well formed (the sender
//! debit under `pk_from`, the recipient credit under `pk_to`), ownership
//! of the sending key, and the opening of the refreshed balance
//! commitment against `C' = C + CΔ_from` with the fee folded in when it
//! is paid in the transacted asset. The amount itself never appears in
//! the statement; the range proof on the refreshed balance shows the
//! account cannot be overdrawn.

use ark_ff::Zero;
use rand::Rng;
use tracing::debug;

use zkct_ctrange::{self as ctrange, RangeProof};
use zkct_primitives::{
    in_subgroup, mod_inverse, random_nonzero, ElGamalEnc, Fr, Point, Transcript, G, H,
};

use crate::withdraw::deduct_public;
use crate::{
    append_fee_block, enc_rail_check, enc_subgroup, ownership_check, refresh_check,
    refresh_commit, response, valid_amount, verify_ranges_parallel, ProofError,
};

/// Prover-side inputs for building a [`TransferRelation`].
pub struct TransferInput {
    pub sk: Fr,
    pub pk_to: Point,

    /// Sender's current encrypted balance and its plaintext.
    pub c: ElGamalEnc,
    pub b: u64,

    /// Amount to send.
    pub b_delta: u64,

    pub asset_id: u32,
    pub fee_asset_id: u32,
    pub fee: u64,

    /// Fee-asset balance (ciphertext, plaintext); required when the fee
    /// asset differs from the transacted asset.
    pub fee_balance: Option<(ElGamalEnc, u64)>,
}

pub struct TransferRelation {
    // statement
    pub pk_from: Point,
    pub pk_to: Point,
    pub c: ElGamalEnc,
    pub c_delta_from: ElGamalEnc,
    pub c_delta_to: ElGamalEnc,
    pub t: Point,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub asset_id: u32,
    pub fee_asset_id: u32,
    pub fee: u64,
    pub range_proof: RangeProof,
    pub fee_range_proof: Option<RangeProof>,
    // witness
    pub(crate) sk: Fr,
    pub(crate) r_delta_from: Fr,
    pub(crate) r_delta_to: Fr,
    pub(crate) bar_r: Fr,
    pub(crate) bar_r_fee: Fr,
    pub(crate) b_prime: u64,
}

impl TransferRelation {
    /// Build the sender-side relation: encrypt the debit under the
    /// sender's key and the credit under the recipient's, then run the
    /// range proofs that fix the refreshed commitments.
    pub fn new<R: Rng>(input: &TransferInput, rng: &mut R) -> Result<Self, ProofError> {
        if input.sk.is_zero()
            || !in_subgroup(&input.pk_to)
            || !enc_subgroup(&input.c)
            || !valid_amount(input.b)
            || !valid_amount(input.b_delta)
            || !valid_amount(input.fee)
        {
            return Err(ProofError::InvalidParams);
        }
        let pk_from = *G * input.sk;
        let same = input.fee_asset_id == input.asset_id;

        let delta = Fr::from(input.b_delta);
        let r_delta_from = random_nonzero(rng);
        let c_delta_from = ElGamalEnc {
            cl: pk_from * r_delta_from,
            cr: *G * r_delta_from + *H * (-delta),
        };
        let r_delta_to = random_nonzero(rng);
        let c_delta_to = ElGamalEnc {
            cl: input.pk_to * r_delta_to,
            cr: *G * r_delta_to + *H * delta,
        };

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

        Ok(TransferRelation {
            pk_from,
            pk_to: input.pk_to,
            c: input.c,
            c_delta_from,
            c_delta_to,
            t,
            c_fee,
            t_fee,
            asset_id: input.asset_id,
            fee_asset_id: input.fee_asset_id,
            fee: input.fee,
            range_proof,
            fee_range_proof,
            sk: input.sk,
            r_delta_from,
            r_delta_to,
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
pub struct TransferProof {
    // statement
    pub pk_from: Point,
    pub pk_to: Point,
    pub c: ElGamalEnc,
    pub c_delta_from: ElGamalEnc,
    pub c_delta_to: ElGamalEnc,
    pub t: Point,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub asset_id: u32,
    pub fee_asset_id: u32,
    pub fee: u64,
    // auxiliary commitments
    pub a_c_delta_from: Point,
    pub a_c_delta_to: Point,
    pub a_pk: Point,
    pub a_t: Point,
    pub a_t_fee: Point,
    // responses
    pub z_r_delta_from: Fr,
    pub z_r_delta_to: Fr,
    pub z_sk: Fr,
    pub z_sk_inv: Fr,
    pub z_bar_r: Fr,
    pub z_bar_r_fee: Fr,
    // attachments
    pub range_proof: RangeProof,
    pub fee_range_proof: Option<RangeProof>,
}

struct TransferStatement<'a> {
    pk_from: &'a Point,
    pk_to: &'a Point,
    c: &'a ElGamalEnc,
    c_delta_from: &'a ElGamalEnc,
    c_delta_to: &'a ElGamalEnc,
    t: &'a Point,
    asset_id: u32,
}

fn append_statement(t: &mut Transcript, s: &TransferStatement<'_>) {
    t.append_point(s.pk_from);
    t.append_point(s.pk_to);
    t.append_enc(s.c);
    t.append_enc(s.c_delta_from);
    t.append_enc(s.c_delta_to);
    t.append_point(s.t);
    t.append_u64(s.asset_id as u64);
}

pub fn prove_transfer<R: Rng>(
    rel: &TransferRelation,
    rng: &mut R,
) -> Result<TransferProof, ProofError> {
    let same = rel.same_asset();

    // commit phase
    let alpha_r_from = random_nonzero(rng);
    let alpha_r_to = random_nonzero(rng);
    let alpha_sk = random_nonzero(rng);
    let alpha_sk_inv = mod_inverse(alpha_sk)?;
    let alpha_bar_r = random_nonzero(rng);

    let a_c_delta_from = rel.pk_from * alpha_r_from;
    let a_c_delta_to = rel.pk_to * alpha_r_to;
    let a_pk = *G * alpha_sk;

    let c_prime = refreshed_enc(&rel.c, &rel.c_delta_from, rel.fee, same);
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
    append_statement(
        &mut t,
        &TransferStatement {
            pk_from: &rel.pk_from,
            pk_to: &rel.pk_to,
            c: &rel.c,
            c_delta_from: &rel.c_delta_from,
            c_delta_to: &rel.c_delta_to,
            t: &rel.t,
            asset_id: rel.asset_id,
        },
    );
    t.append_point(&a_c_delta_from);
    t.append_point(&a_c_delta_to);
    append_fee_block(&mut t, &a_t_fee, &rel.c_fee, rel.fee_asset_id, rel.fee);
    t.append_point(&a_pk);
    t.append_point(&a_t);
    let c = t.challenge();

    // responses
    let z_r_delta_from = response(&alpha_r_from, &c, &rel.r_delta_from);
    let z_r_delta_to = response(&alpha_r_to, &c, &rel.r_delta_to);
    let z_sk = response(&alpha_sk, &c, &rel.sk);
    let z_sk_inv = response(&alpha_sk_inv, &c, &mod_inverse(rel.sk)?);
    let z_bar_r = response(&alpha_bar_r, &c, &rel.bar_r);
    let z_bar_r_fee = response(&alpha_bar_r_fee, &c, &rel.bar_r_fee);

    Ok(TransferProof {
        pk_from: rel.pk_from,
        pk_to: rel.pk_to,
        c: rel.c,
        c_delta_from: rel.c_delta_from,
        c_delta_to: rel.c_delta_to,
        t: rel.t,
        c_fee: rel.c_fee,
        t_fee: rel.t_fee,
        asset_id: rel.asset_id,
        fee_asset_id: rel.fee_asset_id,
        fee: rel.fee,
        a_c_delta_from,
        a_c_delta_to,
        a_pk,
        a_t,
        a_t_fee,
        z_r_delta_from,
        z_r_delta_to,
        z_sk,
        z_sk_inv,
        z_bar_r,
        z_bar_r_fee,
        range_proof: rel.range_proof.clone(),
        fee_range_proof: rel.fee_range_proof.clone(),
    })
}

/// `C' = C + CΔ_from`, with the fee deducted from the value slot when it
/// is paid in the transacted asset.
fn refreshed_enc(c: &ElGamalEnc, c_delta_from: &ElGamalEnc, fee: u64, same: bool) -> ElGamalEnc {
    let merged = c.add(c_delta_from);
    if same {
        deduct_public(&merged, fee)
    } else {
        merged
    }
}

impl TransferProof {
    fn same_asset(&self) -> bool {
        self.fee_asset_id == self.asset_id
    }

    fn check_params(&self) -> Result<(), ProofError> {
        let points = [
            &self.pk_from,
            &self.pk_to,
            &self.t,
            &self.t_fee,
            &self.a_c_delta_from,
            &self.a_c_delta_to,
            &self.a_pk,
            &self.a_t,
            &self.a_t_fee,
        ];
        let subgroup_ok = points.iter().all(|p| in_subgroup(p))
            && enc_subgroup(&self.c)
            && enc_subgroup(&self.c_delta_from)
            && enc_subgroup(&self.c_delta_to)
            && enc_subgroup(&self.c_fee);
        if !subgroup_ok || !valid_amount(self.fee) {
            return Err(ProofError::InvalidParams);
        }
        Ok(())
    }

    pub fn verify(&self) -> Result<bool, ProofError> {
        self.check_params()?;
        let same = self.same_asset();

        if self.range_proof.a != self.t {
            debug!("transfer: range proof aggregate does not match T");
            return Ok(false);
        }
        match (&self.fee_range_proof, same) {
            (None, true) => {
                if self.t_fee != self.t || self.c_fee != self.c || self.a_t_fee != self.a_t {
                    debug!("transfer: same-asset fee aliases do not hold");
                    return Ok(false);
                }
            }
            (Some(fee_proof), false) => {
                if fee_proof.a != self.t_fee {
                    debug!("transfer: fee range proof aggregate does not match T_fee");
                    return Ok(false);
                }
            }
            _ => {
                debug!("transfer: fee range proof presence mismatch");
                return Ok(false);
            }
        }

        let mut t = Transcript::new();
        append_statement(
            &mut t,
            &TransferStatement {
                pk_from: &self.pk_from,
                pk_to: &self.pk_to,
                c: &self.c,
                c_delta_from: &self.c_delta_from,
                c_delta_to: &self.c_delta_to,
                t: &self.t,
                asset_id: self.asset_id,
            },
        );
        t.append_point(&self.a_c_delta_from);
        t.append_point(&self.a_c_delta_to);
        append_fee_block(&mut t, &self.a_t_fee, &self.c_fee, self.fee_asset_id, self.fee);
        t.append_point(&self.a_pk);
        t.append_point(&self.a_t);
        let c = t.challenge();

        if !enc_rail_check(
            &self.z_r_delta_from,
            &self.pk_from,
            &self.a_c_delta_from,
            &self.c_delta_from.cl,
            &c,
        ) {
            debug!("transfer: sender delta encryption check failed");
            return Ok(false);
        }
        if !enc_rail_check(
            &self.z_r_delta_to,
            &self.pk_to,
            &self.a_c_delta_to,
            &self.c_delta_to.cl,
            &c,
        ) {
            debug!("transfer: recipient delta encryption check failed");
            return Ok(false);
        }
        if !ownership_check(&self.z_sk, &self.a_pk, &self.pk_from, &c) {
            debug!("transfer: ownership check failed");
            return Ok(false);
        }

        let c_prime = refreshed_enc(&self.c, &self.c_delta_from, self.fee, same);
        if !refresh_check(&self.z_bar_r, &self.z_sk_inv, &c_prime, &self.a_t, &self.t, &c) {
            debug!("transfer: refresh opening failed");
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
                debug!("transfer: fee refresh opening failed");
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
