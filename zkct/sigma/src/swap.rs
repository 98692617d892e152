//! Swap: trade asset A for asset B against the constant-product pool.
//!
//! The input and output amounts are public (the output is fixed by the
//! pool price), as is the delta randomness, so the four delta ciphertexts
//! are recomputed by the verifier rather than proved. The zero-knowledge
//! part covers ownership of the user key and the opening of the refreshed
//! A-balance commitment after paying the input (and the fee, when it is
//! charged in asset A).

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
    swap_output, valid_amount, verify_ranges_parallel, ProofError,
};

/// Prover-side inputs for building a [`SwapRelation`].
pub struct SwapInput {
    pub sk_u: Fr,
    pub pk_pool: Point,

    /// User's encrypted A and B balances; the A plaintext backs the
    /// refresh proof.
    pub c_ua: ElGamalEnc,
    pub c_ub: ElGamalEnc,
    pub b_ua: u64,

    /// Amount of A paid into the pool.
    pub b_a_delta: u64,

    /// Pool reserves fixing the output amount.
    pub b_pool_a: u64,
    pub b_pool_b: u64,

    pub asset_a_id: u32,
    pub asset_b_id: u32,
    pub fee_asset_id: u32,
    pub fee: u64,

    /// Fee-asset balance (ciphertext, plaintext); required when the fee
    /// asset differs from asset A.
    pub fee_balance: Option<(ElGamalEnc, u64)>,
}

pub struct SwapRelation {
    // statement
    pub pk_u: Point,
    pub pk_pool: Point,
    pub c_ua: ElGamalEnc,
    pub c_ub: ElGamalEnc,
    pub c_ua_delta: ElGamalEnc,
    pub c_ub_delta: ElGamalEnc,
    pub lc_pool_a_delta: ElGamalEnc,
    pub lc_pool_b_delta: ElGamalEnc,
    pub r_delta_a: Fr,
    pub r_delta_b: Fr,
    pub t_ua: Point,
    pub b_pool_a: u64,
    pub b_pool_b: u64,
    pub b_a_delta: u64,
    pub b_b_delta: u64,
    pub asset_a_id: u32,
    pub asset_b_id: u32,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub fee_asset_id: u32,
    pub fee: u64,
    pub a_range_proof: RangeProof,
    pub fee_range_proof: Option<RangeProof>,
    // witness
    pub(crate) sk_u: Fr,
    pub(crate) bar_r_a: Fr,
    pub(crate) bar_r_fee: Fr,
    pub(crate) b_prime_a: u64,
}

impl SwapRelation {
    /// Build an A→B swap. The output amount is derived from the pool
    /// balances with the constant-product rule; the delta randomness is
    /// drawn here and becomes part of the public statement.
    pub fn new<R: Rng>(input: &SwapInput, rng: &mut R) -> Result<Self, ProofError> {
        if input.sk_u.is_zero()
            || !in_subgroup(&input.pk_pool)
            || !enc_subgroup(&input.c_ua)
            || !enc_subgroup(&input.c_ub)
            || !valid_amount(input.b_ua)
            || !valid_amount(input.b_a_delta)
            || !valid_amount(input.b_pool_a)
            || !valid_amount(input.b_pool_b)
            || !valid_amount(input.fee)
            || input.b_a_delta == 0
            || input.asset_a_id == input.asset_b_id
        {
            return Err(ProofError::InvalidParams);
        }
        let pk_u = *G * input.sk_u;
        let same = input.fee_asset_id == input.asset_a_id;

        let b_b_delta = swap_output(input.b_pool_a, input.b_pool_b, input.b_a_delta)
            .filter(|out| valid_amount(*out))
            .ok_or(ProofError::InvalidParams)?;

        // Public-randomness delta ciphertexts: the user pays A and
        // receives B; the pool sees the mirror image.
        let r_delta_a = random_nonzero(rng);
        let r_delta_b = random_nonzero(rng);
        let delta_a = Fr::from(input.b_a_delta);
        let delta_b = Fr::from(b_b_delta);
        let c_ua_delta = ElGamalEnc {
            cl: pk_u * r_delta_a,
            cr: *G * r_delta_a + *H * (-delta_a),
        };
        let lc_pool_a_delta = ElGamalEnc {
            cl: input.pk_pool * r_delta_a,
            cr: *G * r_delta_a + *H * delta_a,
        };
        let c_ub_delta = ElGamalEnc {
            cl: pk_u * r_delta_b,
            cr: *G * r_delta_b + *H * delta_b,
        };
        let lc_pool_b_delta = ElGamalEnc {
            cl: input.pk_pool * r_delta_b,
            cr: *G * r_delta_b + *H * (-delta_b),
        };

        let spent = if same {
            input.b_a_delta + input.fee
        } else {
            input.b_a_delta
        };
        let b_prime_a = input.b_ua.checked_sub(spent).ok_or(ProofError::InvalidParams)?;
        let (a_range_proof, bar_r_a) = ctrange::prove(b_prime_a, &G, &H, rng)?;
        let t_ua = a_range_proof.a;

        let (c_fee, t_fee, bar_r_fee, fee_range_proof) = if same {
            (input.c_ua, t_ua, bar_r_a, None)
        } else {
            let (c_fee, b_fee) = input.fee_balance.ok_or(ProofError::InvalidParams)?;
            if !enc_subgroup(&c_fee) || !valid_amount(b_fee) {
                return Err(ProofError::InvalidParams);
            }
            let b_fee_prime = b_fee.checked_sub(input.fee).ok_or(ProofError::InvalidParams)?;
            let (fee_proof, bar_r_fee) = ctrange::prove(b_fee_prime, &G, &H, rng)?;
            (c_fee, fee_proof.a, bar_r_fee, Some(fee_proof))
        };

        Ok(SwapRelation {
            pk_u,
            pk_pool: input.pk_pool,
            c_ua: input.c_ua,
            c_ub: input.c_ub,
            c_ua_delta,
            c_ub_delta,
            lc_pool_a_delta,
            lc_pool_b_delta,
            r_delta_a,
            r_delta_b,
            t_ua,
            b_pool_a: input.b_pool_a,
            b_pool_b: input.b_pool_b,
            b_a_delta: input.b_a_delta,
            b_b_delta,
            asset_a_id: input.asset_a_id,
            asset_b_id: input.asset_b_id,
            c_fee,
            t_fee,
            fee_asset_id: input.fee_asset_id,
            fee: input.fee,
            a_range_proof,
            fee_range_proof,
            sk_u: input.sk_u,
            bar_r_a,
            bar_r_fee,
            b_prime_a,
        })
    }

    fn same_asset(&self) -> bool {
        self.fee_asset_id == self.asset_a_id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapProof {
    // statement
    pub pk_u: Point,
    pub pk_pool: Point,
    pub c_ua: ElGamalEnc,
    pub c_ub: ElGamalEnc,
    pub c_ua_delta: ElGamalEnc,
    pub c_ub_delta: ElGamalEnc,
    pub lc_pool_a_delta: ElGamalEnc,
    pub lc_pool_b_delta: ElGamalEnc,
    pub r_delta_a: Fr,
    pub r_delta_b: Fr,
    pub t_ua: Point,
    pub b_pool_a: u64,
    pub b_pool_b: u64,
    pub b_a_delta: u64,
    pub b_b_delta: u64,
    pub asset_a_id: u32,
    pub asset_b_id: u32,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub fee_asset_id: u32,
    pub fee: u64,
    // auxiliary commitments
    pub a_pk: Point,
    pub a_t_ua: Point,
    pub a_t_fee: Point,
    // responses
    pub z_sk: Fr,
    pub z_sk_inv: Fr,
    pub z_bar_r_a: Fr,
    pub z_bar_r_fee: Fr,
    // attachments
    pub a_range_proof: RangeProof,
    pub fee_range_proof: Option<RangeProof>,
}

fn append_statement(t: &mut Transcript, p: &SwapProofView<'_>) {
    t.append_point(p.pk_u);
    t.append_point(p.pk_pool);
    t.append_enc(p.c_ua);
    t.append_enc(p.c_ub);
    t.append_enc(p.c_ua_delta);
    t.append_enc(p.c_ub_delta);
    t.append_point(p.t_ua);
    t.append_u64(p.b_a_delta);
    t.append_u64(p.b_b_delta);
    t.append_u64(p.asset_a_id as u64);
    t.append_u64(p.asset_b_id as u64);
}

struct SwapProofView<'a> {
    pk_u: &'a Point,
    pk_pool: &'a Point,
    c_ua: &'a ElGamalEnc,
    c_ub: &'a ElGamalEnc,
    c_ua_delta: &'a ElGamalEnc,
    c_ub_delta: &'a ElGamalEnc,
    t_ua: &'a Point,
    b_a_delta: u64,
    b_b_delta: u64,
    asset_a_id: u32,
    asset_b_id: u32,
}

pub fn prove_swap<R: Rng>(rel: &SwapRelation, rng: &mut R) -> Result<SwapProof, ProofError> {
    let same = rel.same_asset();

    let alpha_sk = random_nonzero(rng);
    let alpha_sk_inv = mod_inverse(alpha_sk)?;
    let alpha_bar_r_a = random_nonzero(rng);
    let a_pk = *G * alpha_sk;

    let c_prime = refreshed_enc(&rel.c_ua, &rel.c_ua_delta, rel.fee, same);
    let a_t_ua = refresh_commit(&alpha_bar_r_a, &alpha_sk_inv, &c_prime.cl);

    let (alpha_bar_r_fee, a_t_fee) = if same {
        (alpha_bar_r_a, a_t_ua)
    } else {
        let alpha_fee = random_nonzero(rng);
        let a_fee = refresh_commit(&alpha_fee, &alpha_sk_inv, &rel.c_fee.cl);
        (alpha_fee, a_fee)
    };

    let mut t = Transcript::new();
    append_statement(
        &mut t,
        &SwapProofView {
            pk_u: &rel.pk_u,
            pk_pool: &rel.pk_pool,
            c_ua: &rel.c_ua,
            c_ub: &rel.c_ub,
            c_ua_delta: &rel.c_ua_delta,
            c_ub_delta: &rel.c_ub_delta,
            t_ua: &rel.t_ua,
            b_a_delta: rel.b_a_delta,
            b_b_delta: rel.b_b_delta,
            asset_a_id: rel.asset_a_id,
            asset_b_id: rel.asset_b_id,
        },
    );
    append_fee_block(&mut t, &a_t_fee, &rel.c_fee, rel.fee_asset_id, rel.fee);
    t.append_point(&a_pk);
    t.append_point(&a_t_ua);
    let c = t.challenge();

    let z_sk = response(&alpha_sk, &c, &rel.sk_u);
    let z_sk_inv = response(&alpha_sk_inv, &c, &mod_inverse(rel.sk_u)?);
    let z_bar_r_a = response(&alpha_bar_r_a, &c, &rel.bar_r_a);
    let z_bar_r_fee = response(&alpha_bar_r_fee, &c, &rel.bar_r_fee);

    Ok(SwapProof {
        pk_u: rel.pk_u,
        pk_pool: rel.pk_pool,
        c_ua: rel.c_ua,
        c_ub: rel.c_ub,
        c_ua_delta: rel.c_ua_delta,
        c_ub_delta: rel.c_ub_delta,
        lc_pool_a_delta: rel.lc_pool_a_delta,
        lc_pool_b_delta: rel.lc_pool_b_delta,
        r_delta_a: rel.r_delta_a,
        r_delta_b: rel.r_delta_b,
        t_ua: rel.t_ua,
        b_pool_a: rel.b_pool_a,
        b_pool_b: rel.b_pool_b,
        b_a_delta: rel.b_a_delta,
        b_b_delta: rel.b_b_delta,
        asset_a_id: rel.asset_a_id,
        asset_b_id: rel.asset_b_id,
        c_fee: rel.c_fee,
        t_fee: rel.t_fee,
        fee_asset_id: rel.fee_asset_id,
        fee: rel.fee,
        a_pk,
        a_t_ua,
        a_t_fee,
        z_sk,
        z_sk_inv,
        z_bar_r_a,
        z_bar_r_fee,
        a_range_proof: rel.a_range_proof.clone(),
        fee_range_proof: rel.fee_range_proof.clone(),
    })
}

fn refreshed_enc(c_ua: &ElGamalEnc, c_ua_delta: &ElGamalEnc, fee: u64, same: bool) -> ElGamalEnc {
    let merged = c_ua.add(c_ua_delta);
    if same {
        deduct_public(&merged, fee)
    } else {
        merged
    }
}

impl SwapProof {
    fn same_asset(&self) -> bool {
        self.fee_asset_id == self.asset_a_id
    }

    fn check_params(&self) -> Result<(), ProofError> {
        let points = [
            &self.pk_u,
            &self.pk_pool,
            &self.t_ua,
            &self.t_fee,
            &self.a_pk,
            &self.a_t_ua,
            &self.a_t_fee,
        ];
        let encs = [
            &self.c_ua,
            &self.c_ub,
            &self.c_ua_delta,
            &self.c_ub_delta,
            &self.lc_pool_a_delta,
            &self.lc_pool_b_delta,
            &self.c_fee,
        ];
        let subgroup_ok =
            points.iter().all(|p| in_subgroup(p)) && encs.iter().all(|e| enc_subgroup(e));
        let amounts_ok = valid_amount(self.b_pool_a)
            && valid_amount(self.b_pool_b)
            && valid_amount(self.b_a_delta)
            && valid_amount(self.b_b_delta)
            && valid_amount(self.fee);
        if !subgroup_ok || !amounts_ok {
            return Err(ProofError::InvalidParams);
        }
        Ok(())
    }

    /// Recompute the public-randomness delta ciphertexts and the AMM
    /// output from the public statement.
    fn check_consistency(&self) -> bool {
        let delta_a = Fr::from(self.b_a_delta);
        let delta_b = Fr::from(self.b_b_delta);
        let c_ua_delta = ElGamalEnc {
            cl: self.pk_u * self.r_delta_a,
            cr: *G * self.r_delta_a + *H * (-delta_a),
        };
        let lc_pool_a_delta = ElGamalEnc {
            cl: self.pk_pool * self.r_delta_a,
            cr: *G * self.r_delta_a + *H * delta_a,
        };
        let c_ub_delta = ElGamalEnc {
            cl: self.pk_u * self.r_delta_b,
            cr: *G * self.r_delta_b + *H * delta_b,
        };
        let lc_pool_b_delta = ElGamalEnc {
            cl: self.pk_pool * self.r_delta_b,
            cr: *G * self.r_delta_b + *H * (-delta_b),
        };
        if c_ua_delta != self.c_ua_delta
            || lc_pool_a_delta != self.lc_pool_a_delta
            || c_ub_delta != self.c_ub_delta
            || lc_pool_b_delta != self.lc_pool_b_delta
        {
            debug!("swap: delta ciphertexts do not match public statement");
            return false;
        }
        match swap_output(self.b_pool_a, self.b_pool_b, self.b_a_delta) {
            Some(out) if out == self.b_b_delta => true,
            _ => {
                debug!("swap: output amount violates constant-product rule");
                false
            }
        }
    }

    pub fn verify(&self) -> Result<bool, ProofError> {
        self.check_params()?;
        let same = self.same_asset();

        if self.a_range_proof.a != self.t_ua {
            debug!("swap: range proof aggregate does not match T_uA");
            return Ok(false);
        }
        match (&self.fee_range_proof, same) {
            (None, true) => {
                if self.t_fee != self.t_ua
                    || self.c_fee != self.c_ua
                    || self.a_t_fee != self.a_t_ua
                {
                    debug!("swap: same-asset fee aliases do not hold");
                    return Ok(false);
                }
            }
            (Some(fee_proof), false) => {
                if fee_proof.a != self.t_fee {
                    debug!("swap: fee range proof aggregate does not match T_fee");
                    return Ok(false);
                }
            }
            _ => {
                debug!("swap: fee range proof presence mismatch");
                return Ok(false);
            }
        }

        if !self.check_consistency() {
            return Ok(false);
        }

        let mut t = Transcript::new();
        append_statement(
            &mut t,
            &SwapProofView {
                pk_u: &self.pk_u,
                pk_pool: &self.pk_pool,
                c_ua: &self.c_ua,
                c_ub: &self.c_ub,
                c_ua_delta: &self.c_ua_delta,
                c_ub_delta: &self.c_ub_delta,
                t_ua: &self.t_ua,
                b_a_delta: self.b_a_delta,
                b_b_delta: self.b_b_delta,
                asset_a_id: self.asset_a_id,
                asset_b_id: self.asset_b_id,
            },
        );
        append_fee_block(&mut t, &self.a_t_fee, &self.c_fee, self.fee_asset_id, self.fee);
        t.append_point(&self.a_pk);
        t.append_point(&self.a_t_ua);
        let c = t.challenge();

        if !ownership_check(&self.z_sk, &self.a_pk, &self.pk_u, &c) {
            debug!("swap: ownership check failed");
            return Ok(false);
        }

        let c_prime = refreshed_enc(&self.c_ua, &self.c_ua_delta, self.fee, same);
        if !refresh_check(
            &self.z_bar_r_a,
            &self.z_sk_inv,
            &c_prime,
            &self.a_t_ua,
            &self.t_ua,
            &c,
        ) {
            debug!("swap: refresh opening failed");
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
                debug!("swap: fee refresh opening failed");
                return Ok(false);
            }
        }

        let mut ranges = vec![&self.a_range_proof];
        if let Some(fee_proof) = &self.fee_range_proof {
            ranges.push(fee_proof);
        }
        verify_ranges_parallel(&ranges)
    }
}
