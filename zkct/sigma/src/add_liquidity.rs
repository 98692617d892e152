//! AddLiquidity: deposit both pool assets against freshly minted LP
//! tokens.
//!
//! The deposited amounts and their delta randomness are public (the pool
//! must see them to credit its reserves); the minted LP delta is
//! encrypted with secret randomness and proved well formed. Zero
//! knowledge covers ownership of the user key and the openings of the
//! refreshed A- and B-balance commitments, with the fee rail aliased onto
//! whichever side the fee is charged in (or run independently for a
//! third asset). Verification also enforces the LP amount rule
//! `Δ_LP = ⌊√(bΔA·bΔB)⌋` and the constant-product rate tolerance.

use ark_ff::Zero;
use rand::Rng;
use tracing::debug;

use zkct_ctrange::{self as ctrange, RangeProof};
use zkct_primitives::{
    in_subgroup, mod_inverse, random_nonzero, ElGamalEnc, Fr, Point, Transcript, G, H,
};

use crate::withdraw::deduct_public;
use crate::{
    amm_rate_within_tolerance, append_fee_block, enc_rail_check, enc_subgroup, lp_amount,
    ownership_check, refresh_check, refresh_commit, response, valid_amount,
    verify_ranges_parallel, ProofError,
};

/// Prover-side inputs for building an [`AddLiquidityRelation`].
pub struct AddLiquidityInput {
    pub sk_u: Fr,
    pub pk_pool: Point,

    /// User's encrypted A and B balances and their plaintexts.
    pub c_ua: ElGamalEnc,
    pub c_ub: ElGamalEnc,
    pub b_ua: u64,
    pub b_ub: u64,

    /// Amounts deposited into the pool.
    pub b_a_delta: u64,
    pub b_b_delta: u64,

    /// Current pool reserves.
    pub b_pool_a: u64,
    pub b_pool_b: u64,

    pub asset_a_id: u32,
    pub asset_b_id: u32,
    pub fee_asset_id: u32,
    pub fee: u64,

    /// Fee-asset balance (ciphertext, plaintext); required when the fee
    /// asset is neither A nor B.
    pub fee_balance: Option<(ElGamalEnc, u64)>,
}

pub struct AddLiquidityRelation {
    // statement
    pub pk_u: Point,
    pub pk_pool: Point,
    pub c_ua: ElGamalEnc,
    pub c_ub: ElGamalEnc,
    pub c_ua_delta: ElGamalEnc,
    pub c_ub_delta: ElGamalEnc,
    pub lc_pool_a_delta: ElGamalEnc,
    pub lc_pool_b_delta: ElGamalEnc,
    pub c_lp_delta: ElGamalEnc,
    pub r_delta_a: Fr,
    pub r_delta_b: Fr,
    pub t_ua: Point,
    pub t_ub: Point,
    pub b_pool_a: u64,
    pub b_pool_b: u64,
    pub b_a_delta: u64,
    pub b_b_delta: u64,
    pub delta_lp: u64,
    pub asset_a_id: u32,
    pub asset_b_id: u32,
    pub c_fee: ElGamalEnc,
    pub t_fee: Point,
    pub fee_asset_id: u32,
    pub fee: u64,
    pub a_range_proof: RangeProof,
    pub b_range_proof: RangeProof,
    pub fee_range_proof: RangeProof,
    // witness
    pub(crate) sk_u: Fr,
    pub(crate) r_delta_lp: Fr,
    pub(crate) bar_r_a: Fr,
    pub(crate) bar_r_b: Fr,
    pub(crate) bar_r_fee: Fr,
    pub(crate) b_prime_a: u64,
    pub(crate) b_prime_b: u64,
}

impl AddLiquidityRelation {
    /// Build the relation: encrypt both deposits with public randomness,
    /// mint the LP delta under secret randomness, and run the three
    /// range proofs that fix the refreshed commitments.
    pub fn new<R: Rng>(input: &AddLiquidityInput, rng: &mut R) -> Result<Self, ProofError> {
        if input.sk_u.is_zero()
            || !in_subgroup(&input.pk_pool)
            || !enc_subgroup(&input.c_ua)
            || !enc_subgroup(&input.c_ub)
            || !valid_amount(input.b_ua)
            || !valid_amount(input.b_ub)
            || !valid_amount(input.b_a_delta)
            || !valid_amount(input.b_b_delta)
            || !valid_amount(input.b_pool_a)
            || !valid_amount(input.b_pool_b)
            || !valid_amount(input.fee)
            || input.asset_a_id == input.asset_b_id
        {
            return Err(ProofError::InvalidParams);
        }
        let pk_u = *G * input.sk_u;
        let fee_is_a = input.fee_asset_id == input.asset_a_id;
        let fee_is_b = input.fee_asset_id == input.asset_b_id;

        // Public-randomness deposits: the user pays A and B, the pool
        // receives the mirror image.
        let r_delta_a = random_nonzero(rng);
        let r_delta_b = random_nonzero(rng);
        let delta_a = Fr::from(input.b_a_delta);
        let delta_b = Fr::from(input.b_b_delta);
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
            cr: *G * r_delta_b + *H * (-delta_b),
        };
        let lc_pool_b_delta = ElGamalEnc {
            cl: input.pk_pool * r_delta_b,
            cr: *G * r_delta_b + *H * delta_b,
        };

        // Minted LP, secret randomness.
        let delta_lp = lp_amount(input.b_a_delta, input.b_b_delta);
        let r_delta_lp = random_nonzero(rng);
        let c_lp_delta = ElGamalEnc {
            cl: pk_u * r_delta_lp,
            cr: *G * r_delta_lp + *H * Fr::from(delta_lp),
        };

        let spent_a = if fee_is_a {
            input.b_a_delta + input.fee
        } else {
            input.b_a_delta
        };
        let b_prime_a = input.b_ua.checked_sub(spent_a).ok_or(ProofError::InvalidParams)?;
        let (a_range_proof, bar_r_a) = ctrange::prove(b_prime_a, &G, &H, rng)?;
        let t_ua = a_range_proof.a;

        let spent_b = if fee_is_b {
            input.b_b_delta + input.fee
        } else {
            input.b_b_delta
        };
        let b_prime_b = input.b_ub.checked_sub(spent_b).ok_or(ProofError::InvalidParams)?;
        let (b_range_proof, bar_r_b) = ctrange::prove(b_prime_b, &G, &H, rng)?;
        let t_ub = b_range_proof.a;

        let (c_fee, t_fee, bar_r_fee, fee_range_proof) = if fee_is_a {
            (input.c_ua, t_ua, bar_r_a, a_range_proof.clone())
        } else if fee_is_b {
            (input.c_ub, t_ub, bar_r_b, b_range_proof.clone())
        } else {
            let (c_fee, b_fee) = input.fee_balance.ok_or(ProofError::InvalidParams)?;
            if !enc_subgroup(&c_fee) || !valid_amount(b_fee) {
                return Err(ProofError::InvalidParams);
            }
            let b_fee_prime = b_fee.checked_sub(input.fee).ok_or(ProofError::InvalidParams)?;
            let (fee_proof, bar_r_fee) = ctrange::prove(b_fee_prime, &G, &H, rng)?;
            (c_fee, fee_proof.a, bar_r_fee, fee_proof)
        };

        Ok(AddLiquidityRelation {
            pk_u,
            pk_pool: input.pk_pool,
            c_ua: input.c_ua,
            c_ub: input.c_ub,
            c_ua_delta,
            c_ub_delta,
            lc_pool_a_delta,
            lc_pool_b_delta,
            c_lp_delta,
            r_delta_a,
            r_delta_b,
            t_ua,
            t_ub,
            b_pool_a: input.b_pool_a,
            b_pool_b: input.b_pool_b,
            b_a_delta: input.b_a_delta,
            b_b_delta: input.b_b_delta,
            delta_lp,
            asset_a_id: input.asset_a_id,
            asset_b_id: input.asset_b_id,
            c_fee,
            t_fee,
            fee_asset_id: input.fee_asset_id,
            fee: input.fee,
            a_range_proof,
            b_range_proof,
            fee_range_proof,
            sk_u: input.sk_u,
            r_delta_lp,
            bar_r_a,
            bar_r_b,
            bar_r_fee,
            b_prime_a,
            b_prime_b,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddLiquidityProof {
    // statement
    pub pk_u: Point,
    pub pk_pool: Point,
    pub c_ua: ElGamalEnc,
    pub c_ub: ElGamalEnc,
    pub c_ua_delta: ElGamalEnc,
    pub c_ub_delta: ElGamalEnc,
    pub lc_pool_a_delta: ElGamalEnc,
    pub lc_pool_b_delta: ElGamalEnc,
    pub c_lp_delta: ElGamalEnc,
    pub r_delta_a: Fr,
    pub r_delta_b: Fr,
    pub t_ua: Point,
    pub t_ub: Point,
    pub b_pool_a: u64,
    pub b_pool_b: u64,
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
    pub a_t_ua: Point,
    pub a_t_ub: Point,
    pub a_t_fee: Point,
    // responses
    pub z_r_delta_lp: Fr,
    pub z_sk_u: Fr,
    pub z_sk_u_inv: Fr,
    pub z_bar_r_a: Fr,
    pub z_bar_r_b: Fr,
    pub z_bar_r_fee: Fr,
    // attachments
    pub a_range_proof: RangeProof,
    pub b_range_proof: RangeProof,
    pub fee_range_proof: RangeProof,
}

struct Statement<'a> {
    pk_u: &'a Point,
    pk_pool: &'a Point,
    c_ua: &'a ElGamalEnc,
    c_ub: &'a ElGamalEnc,
    c_ua_delta: &'a ElGamalEnc,
    c_ub_delta: &'a ElGamalEnc,
    c_lp_delta: &'a ElGamalEnc,
    t_ua: &'a Point,
    t_ub: &'a Point,
    asset_a_id: u32,
    asset_b_id: u32,
}

fn append_statement(t: &mut Transcript, s: &Statement<'_>) {
    t.append_point(s.pk_u);
    t.append_point(s.pk_pool);
    t.append_enc(s.c_ua);
    t.append_enc(s.c_ub);
    t.append_enc(s.c_ua_delta);
    t.append_enc(s.c_ub_delta);
    t.append_enc(s.c_lp_delta);
    t.append_point(s.t_ua);
    t.append_point(s.t_ub);
    t.append_u64(s.asset_a_id as u64);
    t.append_u64(s.asset_b_id as u64);
}

pub fn prove_add_liquidity<R: Rng>(
    rel: &AddLiquidityRelation,
    rng: &mut R,
) -> Result<AddLiquidityProof, ProofError> {
    let fee_is_a = rel.fee_asset_id == rel.asset_a_id;
    let fee_is_b = rel.fee_asset_id == rel.asset_b_id;

    // valid enc of the LP delta
    let alpha_r_delta_lp = random_nonzero(rng);
    let a_c_lp_l_delta = rel.pk_u * alpha_r_delta_lp;
    let a_c_lp_r_delta = *G * alpha_r_delta_lp;

    // ownership and refresh openings
    let alpha_sk_u = random_nonzero(rng);
    let alpha_sk_u_inv = mod_inverse(alpha_sk_u)?;
    let alpha_bar_r_a = random_nonzero(rng);
    let alpha_bar_r_b = random_nonzero(rng);
    let a_pk_u = *G * alpha_sk_u;
    let a_t_ua = refresh_commit(
        &alpha_bar_r_a,
        &alpha_sk_u_inv,
        &(rel.c_ua.cl + rel.c_ua_delta.cl),
    );
    let a_t_ub = refresh_commit(
        &alpha_bar_r_b,
        &alpha_sk_u_inv,
        &(rel.c_ub.cl + rel.c_ub_delta.cl),
    );

    let (alpha_bar_r_fee, a_t_fee) = if fee_is_a {
        (alpha_bar_r_a, a_t_ua)
    } else if fee_is_b {
        (alpha_bar_r_b, a_t_ub)
    } else {
        let alpha_fee = random_nonzero(rng);
        let a_fee = refresh_commit(&alpha_fee, &alpha_sk_u_inv, &rel.c_fee.cl);
        (alpha_fee, a_fee)
    };

    let mut t = Transcript::new();
    append_statement(
        &mut t,
        &Statement {
            pk_u: &rel.pk_u,
            pk_pool: &rel.pk_pool,
            c_ua: &rel.c_ua,
            c_ub: &rel.c_ub,
            c_ua_delta: &rel.c_ua_delta,
            c_ub_delta: &rel.c_ub_delta,
            c_lp_delta: &rel.c_lp_delta,
            t_ua: &rel.t_ua,
            t_ub: &rel.t_ub,
            asset_a_id: rel.asset_a_id,
            asset_b_id: rel.asset_b_id,
        },
    );
    t.append_point(&a_c_lp_l_delta);
    t.append_point(&a_c_lp_r_delta);
    append_fee_block(&mut t, &a_t_fee, &rel.c_fee, rel.fee_asset_id, rel.fee);
    t.append_point(&a_pk_u);
    t.append_point(&a_t_ua);
    t.append_point(&a_t_ub);
    let c = t.challenge();

    let z_r_delta_lp = response(&alpha_r_delta_lp, &c, &rel.r_delta_lp);
    let z_sk_u = response(&alpha_sk_u, &c, &rel.sk_u);
    let z_sk_u_inv = response(&alpha_sk_u_inv, &c, &mod_inverse(rel.sk_u)?);
    let z_bar_r_a = response(&alpha_bar_r_a, &c, &rel.bar_r_a);
    let z_bar_r_b = response(&alpha_bar_r_b, &c, &rel.bar_r_b);
    let z_bar_r_fee = response(&alpha_bar_r_fee, &c, &rel.bar_r_fee);

    Ok(AddLiquidityProof {
        pk_u: rel.pk_u,
        pk_pool: rel.pk_pool,
        c_ua: rel.c_ua,
        c_ub: rel.c_ub,
        c_ua_delta: rel.c_ua_delta,
        c_ub_delta: rel.c_ub_delta,
        lc_pool_a_delta: rel.lc_pool_a_delta,
        lc_pool_b_delta: rel.lc_pool_b_delta,
        c_lp_delta: rel.c_lp_delta,
        r_delta_a: rel.r_delta_a,
        r_delta_b: rel.r_delta_b,
        t_ua: rel.t_ua,
        t_ub: rel.t_ub,
        b_pool_a: rel.b_pool_a,
        b_pool_b: rel.b_pool_b,
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
        a_t_ua,
        a_t_ub,
        a_t_fee,
        z_r_delta_lp,
        z_sk_u,
        z_sk_u_inv,
        z_bar_r_a,
        z_bar_r_b,
        z_bar_r_fee,
        a_range_proof: rel.a_range_proof.clone(),
        b_range_proof: rel.b_range_proof.clone(),
        fee_range_proof: rel.fee_range_proof.clone(),
    })
}

impl AddLiquidityProof {
    /// Attach the current pool reserves (checked against the posted
    /// deltas during verification).
    pub fn add_pool_info(&mut self, b_pool_a: u64, b_pool_b: u64) -> Result<(), ProofError> {
        if !valid_amount(b_pool_a) || !valid_amount(b_pool_b) {
            return Err(ProofError::InvalidParams);
        }
        self.b_pool_a = b_pool_a;
        self.b_pool_b = b_pool_b;
        Ok(())
    }

    fn check_params(&self) -> Result<(), ProofError> {
        let points = [
            &self.pk_u,
            &self.pk_pool,
            &self.t_ua,
            &self.t_ub,
            &self.t_fee,
            &self.a_c_lp_l_delta,
            &self.a_c_lp_r_delta,
            &self.a_pk_u,
            &self.a_t_ua,
            &self.a_t_ub,
            &self.a_t_fee,
        ];
        let encs = [
            &self.c_ua,
            &self.c_ub,
            &self.c_ua_delta,
            &self.c_ub_delta,
            &self.lc_pool_a_delta,
            &self.lc_pool_b_delta,
            &self.c_lp_delta,
            &self.c_fee,
        ];
        let subgroup_ok =
            points.iter().all(|p| in_subgroup(p)) && encs.iter().all(|e| enc_subgroup(e));
        let amounts_ok = valid_amount(self.b_pool_a)
            && valid_amount(self.b_pool_b)
            && valid_amount(self.b_a_delta)
            && valid_amount(self.b_b_delta)
            && valid_amount(self.delta_lp)
            && valid_amount(self.fee);
        if !subgroup_ok || !amounts_ok || self.asset_a_id == self.asset_b_id {
            return Err(ProofError::InvalidParams);
        }
        Ok(())
    }

    /// Recompute the public-randomness deposits, the LP amount rule and
    /// the constant-product rate tolerance.
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
            cr: *G * self.r_delta_b + *H * (-delta_b),
        };
        let lc_pool_b_delta = ElGamalEnc {
            cl: self.pk_pool * self.r_delta_b,
            cr: *G * self.r_delta_b + *H * delta_b,
        };
        if c_ua_delta != self.c_ua_delta
            || lc_pool_a_delta != self.lc_pool_a_delta
            || c_ub_delta != self.c_ub_delta
            || lc_pool_b_delta != self.lc_pool_b_delta
        {
            debug!("add_liquidity: deposit ciphertexts do not match public statement");
            return false;
        }
        if lp_amount(self.b_a_delta, self.b_b_delta) != self.delta_lp {
            debug!("add_liquidity: LP amount rule violated");
            return false;
        }
        if !amm_rate_within_tolerance(
            self.b_pool_a,
            self.b_pool_b,
            self.b_a_delta,
            self.b_b_delta,
        ) {
            debug!("add_liquidity: deposit rate outside pool tolerance");
            return false;
        }
        true
    }

    pub fn verify(&self) -> Result<bool, ProofError> {
        self.check_params()?;
        let fee_is_a = self.fee_asset_id == self.asset_a_id;
        let fee_is_b = self.fee_asset_id == self.asset_b_id;

        // Each attached range proof must open its commitment.
        if self.a_range_proof.a != self.t_ua
            || self.b_range_proof.a != self.t_ub
            || self.fee_range_proof.a != self.t_fee
        {
            debug!("add_liquidity: range proof aggregate does not match commitment");
            return Ok(false);
        }

        let mut t = Transcript::new();
        append_statement(
            &mut t,
            &Statement {
                pk_u: &self.pk_u,
                pk_pool: &self.pk_pool,
                c_ua: &self.c_ua,
                c_ub: &self.c_ub,
                c_ua_delta: &self.c_ua_delta,
                c_ub_delta: &self.c_ub_delta,
                c_lp_delta: &self.c_lp_delta,
                t_ua: &self.t_ua,
                t_ub: &self.t_ub,
                asset_a_id: self.asset_a_id,
                asset_b_id: self.asset_b_id,
            },
        );
        t.append_point(&self.a_c_lp_l_delta);
        t.append_point(&self.a_c_lp_r_delta);
        append_fee_block(&mut t, &self.a_t_fee, &self.c_fee, self.fee_asset_id, self.fee);
        t.append_point(&self.a_pk_u);
        t.append_point(&self.a_t_ua);
        t.append_point(&self.a_t_ub);
        let c = t.challenge();

        if !self.check_consistency() {
            return Ok(false);
        }

        // LP delta encryption correctness.
        if !enc_rail_check(
            &self.z_r_delta_lp,
            &self.pk_u,
            &self.a_c_lp_l_delta,
            &self.c_lp_delta.cl,
            &c,
        ) {
            debug!("add_liquidity: LP delta encryption check failed");
            return Ok(false);
        }
        if !ownership_check(&self.z_sk_u, &self.a_pk_u, &self.pk_u, &c) {
            debug!("add_liquidity: ownership check failed");
            return Ok(false);
        }

        // Refreshed ciphertexts per fee case.
        let (c_ua_prime, c_ub_prime, c_fee_prime) = if fee_is_a {
            if self.c_fee != self.c_ua || self.a_t_fee != self.a_t_ua || self.t_fee != self.t_ua {
                debug!("add_liquidity: A-side fee aliases do not hold");
                return Ok(false);
            }
            let a = deduct_public(&self.c_ua.add(&self.c_ua_delta), self.fee);
            let b = self.c_ub.add(&self.c_ub_delta);
            (a, b, a)
        } else if fee_is_b {
            if self.c_fee != self.c_ub || self.a_t_fee != self.a_t_ub || self.t_fee != self.t_ub {
                debug!("add_liquidity: B-side fee aliases do not hold");
                return Ok(false);
            }
            let a = self.c_ua.add(&self.c_ua_delta);
            let b = deduct_public(&self.c_ub.add(&self.c_ub_delta), self.fee);
            (a, b, b)
        } else {
            let a = self.c_ua.add(&self.c_ua_delta);
            let b = self.c_ub.add(&self.c_ub_delta);
            let f = deduct_public(&self.c_fee, self.fee);
            (a, b, f)
        };

        if !refresh_check(
            &self.z_bar_r_a,
            &self.z_sk_u_inv,
            &c_ua_prime,
            &self.a_t_ua,
            &self.t_ua,
            &c,
        ) {
            debug!("add_liquidity: A refresh opening failed");
            return Ok(false);
        }
        if !refresh_check(
            &self.z_bar_r_b,
            &self.z_sk_u_inv,
            &c_ub_prime,
            &self.a_t_ub,
            &self.t_ub,
            &c,
        ) {
            debug!("add_liquidity: B refresh opening failed");
            return Ok(false);
        }
        if !refresh_check(
            &self.z_bar_r_fee,
            &self.z_sk_u_inv,
            &c_fee_prime,
            &self.a_t_fee,
            &self.t_fee,
            &c,
        ) {
            debug!("add_liquidity: fee refresh opening failed");
            return Ok(false);
        }

        verify_ranges_parallel(&[
            &self.a_range_proof,
            &self.b_range_proof,
            &self.fee_range_proof,
        ])
    }
}
