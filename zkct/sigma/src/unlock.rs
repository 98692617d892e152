//! Unlock: release a publicly known locked amount back into an encrypted
//! balance.
//!
//! The mirror image of [`withdraw`](crate::withdraw): the delta is added
//! to the value slot instead of removed, and the statement carries the
//! chain the funds were locked on. Ownership, refresh opening and fee
//! handling are identical.

use ark_ff::Zero;
use rand::Rng;
use tracing::debug;

use zkct_ctrange::{self as ctrange, RangeProof};
use zkct_primitives::{
    in_subgroup, mod_inverse, random_nonzero, ElGamalEnc, Fr, Point, Transcript, G, H,
};

use crate::withdraw::deduct_public;
use crate::{
    append_fee_block, enc_subgroup, ownership_check, refresh_check, refresh_commit, response,
    valid_amount, verify_ranges_parallel, ProofError,
};

/// Ciphertext after crediting a public amount to the value slot.
fn credit_public(c: &ElGamalEnc, amount: u64) -> ElGamalEnc {
    ElGamalEnc {
        cl: c.cl,
        cr: c.cr + *H * Fr::from(amount),
    }
}

/// Post-unlock ciphertext: delta credited, same-asset fee deducted.
fn refreshed_enc(c: &ElGamalEnc, b_delta: u64, fee: u64, same_asset: bool) -> ElGamalEnc {
    let credited = credit_public(c, b_delta);
    if same_asset {
        deduct_public(&credited, fee)
    } else {
        credited
    }
}

/// Prover-side inputs for building an [`UnlockRelation`].
pub struct UnlockInput {
    pub sk: Fr,

    /// Chain the funds were locked on.
    pub chain_id: u32,

    /// Current encrypted balance and its plaintext.
    pub c: ElGamalEnc,
    pub b: u64,

    /// Public amount released back into the balance.
    pub b_delta: u64,

    pub asset_id: u32,
    pub fee_asset_id: u32,
    pub fee: u64,

    /// Fee-asset balance (ciphertext, plaintext); required when the fee
    /// asset differs from the unlocked asset.
    pub fee_balance: Option<(ElGamalEnc, u64)>,
}

pub struct UnlockRelation {
    // statement
    pub pk: Point,
    pub chain_id: u32,
    pub asset_id: u32,
    pub c: ElGamalEnc,
    pub b_delta: u64,
    pub t: Point,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub fee_asset_id: u32,
    pub fee: u64,
    pub range_proof: RangeProof,
    pub fee_range_proof: Option<RangeProof>,
    // witness
    pub(crate) sk: Fr,
    pub(crate) bar_r: Fr,
    pub(crate) bar_r_fee: Fr,
    pub(crate) b_prime: u64,
}

impl UnlockRelation {
    pub fn new<R: Rng>(input: &UnlockInput, rng: &mut R) -> Result<Self, ProofError> {
        if input.sk.is_zero()
            || !enc_subgroup(&input.c)
            || !valid_amount(input.b)
            || !valid_amount(input.b_delta)
            || !valid_amount(input.fee)
        {
            return Err(ProofError::InvalidParams);
        }
        let pk = *G * input.sk;
        let same = input.fee_asset_id == input.asset_id;

        let credited = input
            .b
            .checked_add(input.b_delta)
            .ok_or(ProofError::InvalidParams)?;
        let b_prime = if same {
            credited.checked_sub(input.fee).ok_or(ProofError::InvalidParams)?
        } else {
            credited
        };
        if !valid_amount(b_prime) {
            return Err(ProofError::InvalidParams);
        }
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

        Ok(UnlockRelation {
            pk,
            chain_id: input.chain_id,
            asset_id: input.asset_id,
            c: input.c,
            b_delta: input.b_delta,
            t,
            c_fee,
            t_fee,
            fee_asset_id: input.fee_asset_id,
            fee: input.fee,
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
pub struct UnlockProof {
    // statement
    pub pk: Point,
    pub chain_id: u32,
    pub asset_id: u32,
    pub c: ElGamalEnc,
    pub b_delta: u64,
    pub t: Point,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub fee_asset_id: u32,
    pub fee: u64,
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

fn append_statement(t: &mut Transcript, p: &UnlockProofStatement<'_>) {
    t.append_point(p.pk);
    t.append_u64(p.chain_id as u64);
    t.append_u64(p.asset_id as u64);
    t.append_enc(p.c);
    t.append_point(p.t);
    t.append_u64(p.b_delta);
}

struct UnlockProofStatement<'a> {
    pk: &'a Point,
    chain_id: u32,
    asset_id: u32,
    c: &'a ElGamalEnc,
    t: &'a Point,
    b_delta: u64,
}

pub fn prove_unlock<R: Rng>(rel: &UnlockRelation, rng: &mut R) -> Result<UnlockProof, ProofError> {
    let same = rel.same_asset();

    let alpha_sk = random_nonzero(rng);
    let alpha_sk_inv = mod_inverse(alpha_sk)?;
    let alpha_bar_r = random_nonzero(rng);
    let a_pk = *G * alpha_sk;

    let c_prime = refreshed_enc(&rel.c, rel.b_delta, rel.fee, same);
    let a_t = refresh_commit(&alpha_bar_r, &alpha_sk_inv, &c_prime.cl);

    let (alpha_bar_r_fee, a_t_fee) = if same {
        (alpha_bar_r, a_t)
    } else {
        let alpha_fee = random_nonzero(rng);
        let a_fee = refresh_commit(&alpha_fee, &alpha_sk_inv, &rel.c_fee.cl);
        (alpha_fee, a_fee)
    };

    let mut t = Transcript::new();
    append_statement(
        &mut t,
        &UnlockProofStatement {
            pk: &rel.pk,
            chain_id: rel.chain_id,
            asset_id: rel.asset_id,
            c: &rel.c,
            t: &rel.t,
            b_delta: rel.b_delta,
        },
    );
    append_fee_block(&mut t, &a_t_fee, &rel.c_fee, rel.fee_asset_id, rel.fee);
    t.append_point(&a_pk);
    t.append_point(&a_t);
    let c = t.challenge();

    let z_sk = response(&alpha_sk, &c, &rel.sk);
    let z_sk_inv = response(&alpha_sk_inv, &c, &mod_inverse(rel.sk)?);
    let z_bar_r = response(&alpha_bar_r, &c, &rel.bar_r);
    let z_bar_r_fee = response(&alpha_bar_r_fee, &c, &rel.bar_r_fee);

    Ok(UnlockProof {
        pk: rel.pk,
        chain_id: rel.chain_id,
        asset_id: rel.asset_id,
        c: rel.c,
        b_delta: rel.b_delta,
        t: rel.t,
        c_fee: rel.c_fee,
        t_fee: rel.t_fee,
        fee_asset_id: rel.fee_asset_id,
        fee: rel.fee,
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

impl UnlockProof {
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

        if self.range_proof.a != self.t {
            debug!("unlock: range proof aggregate does not match T");
            return Ok(false);
        }
        match (&self.fee_range_proof, same) {
            (None, true) => {
                if self.t_fee != self.t || self.c_fee != self.c || self.a_t_fee != self.a_t {
                    debug!("unlock: same-asset fee aliases do not hold");
                    return Ok(false);
                }
            }
            (Some(fee_proof), false) => {
                if fee_proof.a != self.t_fee {
                    debug!("unlock: fee range proof aggregate does not match T_fee");
                    return Ok(false);
                }
            }
            _ => {
                debug!("unlock: fee range proof presence mismatch");
                return Ok(false);
            }
        }

        let mut t = Transcript::new();
        append_statement(
            &mut t,
            &UnlockProofStatement {
                pk: &self.pk,
                chain_id: self.chain_id,
                asset_id: self.asset_id,
                c: &self.c,
                t: &self.t,
                b_delta: self.b_delta,
            },
        );
        append_fee_block(&mut t, &self.a_t_fee, &self.c_fee, self.fee_asset_id, self.fee);
        t.append_point(&self.a_pk);
        t.append_point(&self.a_t);
        let c = t.challenge();

        if !ownership_check(&self.z_sk, &self.a_pk, &self.pk, &c) {
            debug!("unlock: ownership check failed");
            return Ok(false);
        }

        let c_prime = refreshed_enc(&self.c, self.b_delta, self.fee, same);
        if !refresh_check(&self.z_bar_r, &self.z_sk_inv, &c_prime, &self.a_t, &self.t, &c) {
            debug!("unlock: refresh opening failed");
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
                debug!("unlock: fee refresh opening failed");
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
