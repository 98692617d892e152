//! RemoveLiquidity: burn LP tokens against a withdrawal of both pool
//! assets.
//!
//! The mirror of [`add_liquidity`](crate::add_liquidity): the received
//! amounts and their randomness are public, the burnt LP delta is
//! encrypted with secret randomness, and the refresh opening is on the
//! user's LP balance. The received A/B amounts are credited
//! homomorphically, so there is no same-asset refresh to alias the fee
//! onto; the fee rail is always independent. Verification enforces both
//! no-slippage inequalities `b_pool·Δ_LP ≤ b_LP·bΔ + b_LP`.

use ark_ff::Zero;
use rand::Rng;
use tracing::debug;

use zkct_ctrange::{self as ctrange, RangeProof};
use zkct_primitives::{
    in_subgroup, mod_inverse, random_nonzero, ElGamalEnc, Fr, Point, Transcript, G, H,
};

use crate::withdraw::deduct_public;
use crate::{
    append_fee_block, enc_rail_check, enc_subgroup, no_slippage, ownership_check, refresh_check,
    refresh_commit, response, valid_amount, verify_ranges_parallel, ProofError,
};

/// Prover-side inputs for building a [`RemoveLiquidityRelation`].
pub struct RemoveLiquidityInput {
    pub sk_u: Fr,
    pub pk_pool: Point,

    /// User's encrypted LP balance and its plaintext.
    pub c_u_lp: ElGamalEnc,
    pub b_u_lp: u64,

    /// LP amount burnt.
    pub delta_lp: u64,

    /// Amounts withdrawn from the pool.
    pub b_a_delta: u64,
    pub b_b_delta: u64,

    /// Current pool reserves and total LP issued.
    pub b_pool_a: u64,
    pub b_pool_b: u64,
    pub b_lp: u64,

    pub asset_a_id: u32,
    pub asset_b_id: u32,
    pub fee_asset_id: u32,
    pub fee: u64,

    /// Fee-asset balance; the fee rail is always independent here.
    pub c_fee: ElGamalEnc,
    pub b_fee: u64,
}

pub struct RemoveLiquidityRelation {
    // statement
    pub pk_u: Point,
    pub pk_pool: Point,
    pub c_u_lp: ElGamalEnc,
    pub c_u_lp_delta: ElGamalEnc,
    pub c_ua_delta: ElGamalEnc,
    pub c_ub_delta: ElGamalEnc,
    pub lc_pool_a_delta: ElGamalEnc,
    pub lc_pool_b_delta: ElGamalEnc,
    pub r_delta_a: Fr,
    pub r_delta_b: Fr,
    pub t_u_lp: Point,
    pub b_pool_a: u64,
    pub b_pool_b: u64,
    pub b_lp: u64,
    pub b_a_delta: u64,
    pub b_b_delta: u64,
    pub delta_lp: u64,
    pub asset_a_id: u32,
    pub asset_b_id: u32,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub fee_asset_id: u32,
    pub fee: u64,
    pub lp_range_proof: RangeProof,
    pub fee_range_proof: RangeProof,
    // witness
    pub(crate) sk_u: Fr,
    pub(crate) r_delta_lp: Fr,
    pub(crate) bar_r_lp: Fr,
    pub(crate) bar_r_fee: Fr,
    pub(crate) b_prime_lp: u64,
}

impl RemoveLiquidityRelation {
    pub fn new<R: Rng>(input: &RemoveLiquidityInput, rng: &mut R) -> Result<Self, ProofError> {
        if input.sk_u.is_zero()
            || !in_subgroup(&input.pk_pool)
            || !enc_subgroup(&input.c_u_lp)
            || !enc_subgroup(&input.c_fee)
            || !valid_amount(input.b_u_lp)
            || !valid_amount(input.delta_lp)
            || !valid_amount(input.b_a_delta)
            || !valid_amount(input.b_b_delta)
            || !valid_amount(input.b_pool_a)
            || !valid_amount(input.b_pool_b)
            || !valid_amount(input.b_lp)
            || !valid_amount(input.b_fee)
            || !valid_amount(input.fee)
            || input.asset_a_id == input.asset_b_id
        {
            return Err(ProofError::InvalidParams);
        }
        let pk_u = *G * input.sk_u;

        // Public-randomness withdrawals: the user receives A and B, the
        // pool pays the mirror image.
        let r_delta_a = random_nonzero(rng);
        let r_delta_b = random_nonzero(rng);
        let delta_a = Fr::from(input.b_a_delta);
        let delta_b = Fr::from(input.b_b_delta);
        let c_ua_delta = ElGamalEnc {
            cl: pk_u * r_delta_a,
            cr: *G * r_delta_a + *H * delta_a,
        };
        let lc_pool_a_delta = ElGamalEnc {
            cl: input.pk_pool * r_delta_a,
            cr: *G * r_delta_a + *H * (-delta_a),
        };
        let c_ub_delta = ElGamalEnc {
            cl: pk_u * r_delta_b,
            cr: *G * r_delta_b + *H * delta_b,
        };
        let lc_pool_b_delta = ElGamalEnc {
            cl: input.pk_pool * r_delta_b,
            cr: *G * r_delta_b + *H * (-delta_b),
        };

        // Burnt LP, secret randomness.
        let r_delta_lp = random_nonzero(rng);
        let c_u_lp_delta = ElGamalEnc {
            cl: pk_u * r_delta_lp,
            cr: *G * r_delta_lp + *H * (-Fr::from(input.delta_lp)),
        };

        let b_prime_lp = input
            .b_u_lp
            .checked_sub(input.delta_lp)
            .ok_or(ProofError::InvalidParams)?;
        let (lp_range_proof, bar_r_lp) = ctrange::prove(b_prime_lp, &G, &H, rng)?;
        let t_u_lp = lp_range_proof.a;

        let b_fee_prime = input.b_fee.checked_sub(input.fee).ok_or(ProofError::InvalidParams)?;
        let (fee_range_proof, bar_r_fee) = ctrange::prove(b_fee_prime, &G, &H, rng)?;
        let t_fee = fee_range_proof.a;

        Ok(RemoveLiquidityRelation {
            pk_u,
            pk_pool: input.pk_pool,
            c_u_lp: input.c_u_lp,
            c_u_lp_delta,
            c_ua_delta,
            c_ub_delta,
            lc_pool_a_delta,
            lc_pool_b_delta,
            r_delta_a,
            r_delta_b,
            t_u_lp,
            b_pool_a: input.b_pool_a,
            b_pool_b: input.b_pool_b,
            b_lp: input.b_lp,
            b_a_delta: input.b_a_delta,
            b_b_delta: input.b_b_delta,
            delta_lp: input.delta_lp,
            asset_a_id: input.asset_a_id,
            asset_b_id: input.asset_b_id,
            c_fee: input.c_fee,
            t_fee,
            fee_asset_id: input.fee_asset_id,
            fee: input.fee,
            lp_range_proof,
            fee_range_proof,
            sk_u: input.sk_u,
            r_delta_lp,
            bar_r_lp,
            bar_r_fee,
            b_prime_lp,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveLiquidityProof {
    // statement
    pub pk_u: Point,
    pub pk_pool: Point,
    pub c_u_lp: ElGamalEnc,
    pub c_u_lp_delta: ElGamalEnc,
    pub c_ua_delta: ElGamalEnc,
    pub c_ub_delta: ElGamalEnc,
    pub lc_pool_a_delta: ElGamalEnc,
    pub lc_pool_b_delta: ElGamalEnc,
    pub r_delta_a: Fr,
    pub r_delta_b: Fr,
    pub t_u_lp: Point,
    pub b_pool_a: u64,
    pub b_pool_b: u64,
    pub b_lp: u64,
    pub b_a_delta: u64,
    pub b_b_delta: u64,
    pub delta_lp: u64,
    pub asset_a_id: u32,
    pub asset_b_id: u32,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub fee_asset_id: u32,
    pub fee: u64,
    // auxiliary commitments
    pub a_c_lp_l_delta: Point,
    pub a_c_lp_r_delta: Point,
    pub a_pk_u: Point,
    pub a_t_u_lp: Point,
    pub a_t_fee: Point,
    // responses
    pub z_r_delta_lp: Fr,
    pub z_sk_u: Fr,
    pub z_sk_u_inv: Fr,
    pub z_bar_r_lp: Fr,
    pub z_bar_r_fee: Fr,
    // attachments
    pub lp_range_proof: RangeProof,
    pub fee_range_proof: RangeProof,
}

struct Statement<'a> {
    pk_u: &'a Point,
    pk_pool: &'a Point,
    c_u_lp: &'a ElGamalEnc,
    c_ua_delta: &'a ElGamalEnc,
    c_ub_delta: &'a ElGamalEnc,
    c_u_lp_delta: &'a ElGamalEnc,
    t_u_lp: &'a Point,
    b_a_delta: u64,
    b_b_delta: u64,
    delta_lp: u64,
    asset_a_id: u32,
    asset_b_id: u32,
}

fn append_statement(t: &mut Transcript, s: &Statement<'_>) {
    t.append_point(s.pk_u);
    t.append_point(s.pk_pool);
    t.append_enc(s.c_u_lp);
    t.append_enc(s.c_ua_delta);
    t.append_enc(s.c_ub_delta);
    t.append_enc(s.c_u_lp_delta);
    t.append_point(s.t_u_lp);
    t.append_u64(s.b_a_delta);
    t.append_u64(s.b_b_delta);
    t.append_u64(s.delta_lp);
    t.append_u64(s.asset_a_id as u64);
    t.append_u64(s.asset_b_id as u64);
}

pub fn prove_remove_liquidity<R: Rng>(
    rel: &RemoveLiquidityRelation,
    rng: &mut R,
) -> Result<RemoveLiquidityProof, ProofError> {
    // valid enc of the burnt LP delta
    let alpha_r_delta_lp = random_nonzero(rng);
    let a_c_lp_l_delta = rel.pk_u * alpha_r_delta_lp;
    let a_c_lp_r_delta = *G * alpha_r_delta_lp;

    // ownership and refresh openings
    let alpha_sk_u = random_nonzero(rng);
    let alpha_sk_u_inv = mod_inverse(alpha_sk_u)?;
    let alpha_bar_r_lp = random_nonzero(rng);
    let a_pk_u = *G * alpha_sk_u;
    let a_t_u_lp = refresh_commit(
        &alpha_bar_r_lp,
        &alpha_sk_u_inv,
        &(rel.c_u_lp.cl + rel.c_u_lp_delta.cl),
    );
    let alpha_bar_r_fee = random_nonzero(rng);
    let a_t_fee = refresh_commit(&alpha_bar_r_fee, &alpha_sk_u_inv, &rel.c_fee.cl);

    let mut t = Transcript::new();
    append_statement(
        &mut t,
        &Statement {
            pk_u: &rel.pk_u,
            pk_pool: &rel.pk_pool,
            c_u_lp: &rel.c_u_lp,
            c_ua_delta: &rel.c_ua_delta,
            c_ub_delta: &rel.c_ub_delta,
            c_u_lp_delta: &rel.c_u_lp_delta,
            t_u_lp: &rel.t_u_lp,
            b_a_delta: rel.b_a_delta,
            b_b_delta: rel.b_b_delta,
            delta_lp: rel.delta_lp,
            asset_a_id: rel.asset_a_id,
            asset_b_id: rel.asset_b_id,
        },
    );
    t.append_point(&a_c_lp_l_delta);
    t.append_point(&a_c_lp_r_delta);
    append_fee_block(&mut t, &a_t_fee, &rel.c_fee, rel.fee_asset_id, rel.fee);
    t.append_point(&a_pk_u);
    t.append_point(&a_t_u_lp);
    let c = t.challenge();

    let z_r_delta_lp = response(&alpha_r_delta_lp, &c, &rel.r_delta_lp);
    let z_sk_u = response(&alpha_sk_u, &c, &rel.sk_u);
    let z_sk_u_inv = response(&alpha_sk_u_inv, &c, &mod_inverse(rel.sk_u)?);
    let z_bar_r_lp = response(&alpha_bar_r_lp, &c, &rel.bar_r_lp);
    let z_bar_r_fee = response(&alpha_bar_r_fee, &c, &rel.bar_r_fee);

    Ok(RemoveLiquidityProof {
        pk_u: rel.pk_u,
        pk_pool: rel.pk_pool,
        c_u_lp: rel.c_u_lp,
        c_u_lp_delta: rel.c_u_lp_delta,
        c_ua_delta: rel.c_ua_delta,
        c_ub_delta: rel.c_ub_delta,
        lc_pool_a_delta: rel.lc_pool_a_delta,
        lc_pool_b_delta: rel.lc_pool_b_delta,
        r_delta_a: rel.r_delta_a,
        r_delta_b: rel.r_delta_b,
        t_u_lp: rel.t_u_lp,
        b_pool_a: rel.b_pool_a,
        b_pool_b: rel.b_pool_b,
        b_lp: rel.b_lp,
        b_a_delta: rel.b_a_delta,
        b_b_delta: rel.b_b_delta,
        delta_lp: rel.delta_lp,
        asset_a_id: rel.asset_a_id,
        asset_b_id: rel.asset_b_id,
        c_fee: rel.c_fee,
        t_fee: rel.t_fee,
        fee_asset_id: rel.fee_asset_id,
        fee: rel.fee,
        a_c_lp_l_delta,
        a_c_lp_r_delta,
        a_pk_u,
        a_t_u_lp,
        a_t_fee,
        z_r_delta_lp,
        z_sk_u,
        z_sk_u_inv,
        z_bar_r_lp,
        z_bar_r_fee,
        lp_range_proof: rel.lp_range_proof.clone(),
        fee_range_proof: rel.fee_range_proof.clone(),
    })
}

impl RemoveLiquidityProof {
    /// Attach the current pool reserves and LP supply (checked against
    /// the posted deltas during verification).
    pub fn add_pool_info(
        &mut self,
        b_pool_a: u64,
        b_pool_b: u64,
        b_lp: u64,
    ) -> Result<(), ProofError> {
        if !valid_amount(b_pool_a) || !valid_amount(b_pool_b) || !valid_amount(b_lp) {
            return Err(ProofError::InvalidParams);
        }
        self.b_pool_a = b_pool_a;
        self.b_pool_b = b_pool_b;
        self.b_lp = b_lp;
        Ok(())
    }

    fn check_params(&self) -> Result<(), ProofError> {
        let points = [
            &self.pk_u,
            &self.pk_pool,
            &self.t_u_lp,
            &self.t_fee,
            &self.a_c_lp_l_delta,
            &self.a_c_lp_r_delta,
            &self.a_pk_u,
            &self.a_t_u_lp,
            &self.a_t_fee,
        ];
        let encs = [
            &self.c_u_lp,
            &self.c_u_lp_delta,
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
            && valid_amount(self.b_lp)
            && valid_amount(self.b_a_delta)
            && valid_amount(self.b_b_delta)
            && valid_amount(self.delta_lp)
            && valid_amount(self.fee);
        if !subgroup_ok || !amounts_ok || self.asset_a_id == self.asset_b_id {
            return Err(ProofError::InvalidParams);
        }
        Ok(())
    }

    /// Recompute the public-randomness withdrawals and apply both
    /// no-slippage inequalities.
    fn check_consistency(&self) -> bool {
        let delta_a = Fr::from(self.b_a_delta);
        let delta_b = Fr::from(self.b_b_delta);
        let c_ua_delta = ElGamalEnc {
            cl: self.pk_u * self.r_delta_a,
            cr: *G * self.r_delta_a + *H * delta_a,
        };
        let lc_pool_a_delta = ElGamalEnc {
            cl: self.pk_pool * self.r_delta_a,
            cr: *G * self.r_delta_a + *H * (-delta_a),
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
            debug!("remove_liquidity: withdrawal ciphertexts do not match public statement");
            return false;
        }
        if !no_slippage(self.b_pool_a, self.b_lp, self.b_a_delta, self.delta_lp)
            || !no_slippage(self.b_pool_b, self.b_lp, self.b_b_delta, self.delta_lp)
        {
            debug!("remove_liquidity: no-slippage bound violated");
            return false;
        }
        true
    }

    pub fn verify(&self) -> Result<bool, ProofError> {
        self.check_params()?;

        if self.lp_range_proof.a != self.t_u_lp || self.fee_range_proof.a != self.t_fee {
            debug!("remove_liquidity: range proof aggregate does not match commitment");
            return Ok(false);
        }

        let mut t = Transcript::new();
        append_statement(
            &mut t,
            &Statement {
                pk_u: &self.pk_u,
                pk_pool: &self.pk_pool,
                c_u_lp: &self.c_u_lp,
                c_ua_delta: &self.c_ua_delta,
                c_ub_delta: &self.c_ub_delta,
                c_u_lp_delta: &self.c_u_lp_delta,
                t_u_lp: &self.t_u_lp,
                b_a_delta: self.b_a_delta,
                b_b_delta: self.b_b_delta,
                delta_lp: self.delta_lp,
                asset_a_id: self.asset_a_id,
                asset_b_id: self.asset_b_id,
            },
        );
        t.append_point(&self.a_c_lp_l_delta);
        t.append_point(&self.a_c_lp_r_delta);
        append_fee_block(&mut t, &self.a_t_fee, &self.c_fee, self.fee_asset_id, self.fee);
        t.append_point(&self.a_pk_u);
        t.append_point(&self.a_t_u_lp);
        let c = t.challenge();

        if !self.check_consistency() {
            return Ok(false);
        }

        if !enc_rail_check(
            &self.z_r_delta_lp,
            &self.pk_u,
            &self.a_c_lp_l_delta,
            &self.c_u_lp_delta.cl,
            &c,
        ) {
            debug!("remove_liquidity: LP delta encryption check failed");
            return Ok(false);
        }
        if !ownership_check(&self.z_sk_u, &self.a_pk_u, &self.pk_u, &c) {
            debug!("remove_liquidity: ownership check failed");
            return Ok(false);
        }

        let c_lp_prime = self.c_u_lp.add(&self.c_u_lp_delta);
        if !refresh_check(
            &self.z_bar_r_lp,
            &self.z_sk_u_inv,
            &c_lp_prime,
            &self.a_t_u_lp,
            &self.t_u_lp,
            &c,
        ) {
            debug!("remove_liquidity: LP refresh opening failed");
            return Ok(false);
        }
        let c_fee_prime = deduct_public(&self.c_fee, self.fee);
        if !refresh_check(
            &self.z_bar_r_fee,
            &self.z_sk_u_inv,
            &c_fee_prime,
            &self.a_t_fee,
            &self.t_fee,
            &c,
        ) {
            debug!("remove_liquidity: fee refresh opening failed");
            return Ok(false);
        }

        verify_ranges_parallel(&[&self.lp_range_proof, &self.fee_range_proof])
    }
}
