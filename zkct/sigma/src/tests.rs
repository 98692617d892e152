use ark_ff::One;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use zkct_primitives::{decrypt, encrypt, keygen, random_nonzero, ElGamalEnc, Fr, Keypair, G};

use crate::withdraw::deduct_public;
use crate::*;

fn rng(tag: u8) -> ChaCha20Rng {
    let mut seed = [0u8; 32];
    seed[0] = tag;
    ChaCha20Rng::from_seed(seed)
}

fn account(rng: &mut ChaCha20Rng) -> Keypair {
    keygen(rng)
}

/// Encrypted balance with fresh randomness.
fn balance(rng: &mut ChaCha20Rng, kp: &Keypair, v: u64) -> ElGamalEnc {
    encrypt(v, &random_nonzero(rng), &kp.pk)
}

// ---- AddLiquidity (S2, S6) ----

fn add_liquidity_fixture(
    rng: &mut ChaCha20Rng,
    fee_asset_id: u32,
    fee: u64,
) -> (AddLiquidityRelation, Keypair) {
    let user = account(rng);
    let pool = account(rng);
    let c_ua = balance(rng, &user, 1_000);
    let c_ub = balance(rng, &user, 2_000);
    let fee_balance = if fee_asset_id == 0 || fee_asset_id == 1 {
        None
    } else {
        Some((balance(rng, &user, 50), 50u64))
    };
    let rel = AddLiquidityRelation::new(
        &AddLiquidityInput {
            sk_u: user.sk,
            pk_pool: pool.pk,
            c_ua,
            c_ub,
            b_ua: 1_000,
            b_ub: 2_000,
            b_a_delta: 100,
            b_b_delta: 400,
            b_pool_a: 1_000,
            b_pool_b: 4_000,
            asset_a_id: 0,
            asset_b_id: 1,
            fee_asset_id,
            fee,
            fee_balance,
        },
        rng,
    )
    .expect("relation");
    (rel, user)
}

#[test]
fn add_liquidity_round_trip_same_asset_fee() {
    let mut rng = rng(1);
    let (rel, _) = add_liquidity_fixture(&mut rng, 0, 3);
    assert_eq!(rel.delta_lp, 200); // ⌊√(100·400)⌋
    assert_eq!(rel.b_prime_a, 1_000 - 100 - 3);
    assert_eq!(rel.b_prime_b, 2_000 - 400);

    let proof = prove_add_liquidity(&rel, &mut rng).expect("prove");
    assert_eq!(proof.verify(), Ok(true));
}

#[test]
fn add_liquidity_rejects_mutated_response() {
    let mut rng = rng(2);
    let (rel, _) = add_liquidity_fixture(&mut rng, 0, 3);
    let mut proof = prove_add_liquidity(&rel, &mut rng).expect("prove");
    proof.z_bar_r_a += Fr::one();
    assert_eq!(proof.verify(), Ok(false));
}

#[test]
fn add_liquidity_rejects_tampered_commitment() {
    let mut rng = rng(3);
    let (rel, _) = add_liquidity_fixture(&mut rng, 0, 3);
    let mut proof = prove_add_liquidity(&rel, &mut rng).expect("prove");
    proof.t_ua += *G;
    assert_eq!(proof.verify(), Ok(false));
}

#[test]
fn add_liquidity_cross_asset_fee_round_trip() {
    let mut rng = rng(4);
    let (rel, _) = add_liquidity_fixture(&mut rng, 7, 5);
    let proof = prove_add_liquidity(&rel, &mut rng).expect("prove");

    // Three independent refreshes, three distinct aggregates.
    assert_ne!(proof.t_fee, proof.t_ua);
    assert_ne!(proof.t_fee, proof.t_ub);
    assert_eq!(proof.verify(), Ok(true));
}

#[test]
fn add_liquidity_rejects_swapped_fee_range_proof() {
    let mut rng = rng(5);
    let (rel, _) = add_liquidity_fixture(&mut rng, 7, 5);
    let mut proof = prove_add_liquidity(&rel, &mut rng).expect("prove");
    proof.fee_range_proof = proof.a_range_proof.clone();
    assert_eq!(proof.verify(), Ok(false));
}

#[test]
fn add_liquidity_rejects_bad_rate_via_pool_info() {
    let mut rng = rng(6);
    let (rel, _) = add_liquidity_fixture(&mut rng, 0, 3);
    let mut proof = prove_add_liquidity(&rel, &mut rng).expect("prove");
    // Reserves far off the 1:4 deposit rate.
    proof.add_pool_info(4_000, 1_000).expect("pool info");
    assert_eq!(proof.verify(), Ok(false));
}

#[test]
fn add_liquidity_wire_round_trip() {
    let mut rng = rng(7);
    let (rel, _) = add_liquidity_fixture(&mut rng, 7, 5);
    let proof = prove_add_liquidity(&rel, &mut rng).expect("prove");
    let decoded = AddLiquidityProof::from_bytes(&proof.to_bytes()).expect("decode");
    assert_eq!(decoded, proof);
    assert_eq!(decoded.verify(), Ok(true));
}

// ---- Withdraw (S3) ----

#[test]
fn withdraw_round_trip_and_balance_refresh() {
    let mut rng = rng(10);
    let user = account(&mut rng);
    let c = balance(&mut rng, &user, 1_000);

    let rel = WithdrawRelation::new(
        &WithdrawInput {
            sk: user.sk,
            c,
            b: 1_000,
            b_delta: 500,
            asset_id: 0,
            receive_addr: b"l1-recipient".to_vec(),
            fee_asset_id: 0,
            fee: 1,
            fee_balance: None,
        },
        &mut rng,
    )
    .expect("relation");
    assert_eq!(rel.b_prime, 499);
    assert_eq!(rel.range_proof.verify(), Ok(true));

    // The refreshed ciphertext decrypts to the refreshed balance.
    let c_prime = deduct_public(&c, 501);
    assert_eq!(decrypt(&c_prime, &user.sk, 32), Ok(499));

    let proof = prove_withdraw(&rel, &mut rng).expect("prove");
    assert_eq!(proof.verify(), Ok(true));

    // Tampering with the attached range-proof aggregate must reject.
    let mut tampered = proof.clone();
    tampered.range_proof.a += *G;
    assert_eq!(tampered.verify(), Ok(false));
}

#[test]
fn withdraw_rejects_overdraw() {
    let mut rng = rng(11);
    let user = account(&mut rng);
    let c = balance(&mut rng, &user, 100);
    let res = WithdrawRelation::new(
        &WithdrawInput {
            sk: user.sk,
            c,
            b: 100,
            b_delta: 500,
            asset_id: 0,
            receive_addr: b"addr".to_vec(),
            fee_asset_id: 0,
            fee: 1,
            fee_balance: None,
        },
        &mut rng,
    );
    assert!(matches!(res, Err(ProofError::InvalidParams)));
}

#[test]
fn withdraw_cross_asset_fee_round_trip() {
    let mut rng = rng(12);
    let user = account(&mut rng);
    let c = balance(&mut rng, &user, 1_000);
    let c_fee = balance(&mut rng, &user, 80);

    let rel = WithdrawRelation::new(
        &WithdrawInput {
            sk: user.sk,
            c,
            b: 1_000,
            b_delta: 500,
            asset_id: 0,
            receive_addr: b"addr".to_vec(),
            fee_asset_id: 3,
            fee: 7,
            fee_balance: Some((c_fee, 80)),
        },
        &mut rng,
    )
    .expect("relation");
    let proof = prove_withdraw(&rel, &mut rng).expect("prove");
    assert!(proof.fee_range_proof.is_some());
    assert_eq!(proof.verify(), Ok(true));

    let decoded = WithdrawProof::from_bytes(&proof.to_bytes()).expect("decode");
    assert_eq!(decoded, proof);
}

// ---- Unlock ----

#[test]
fn unlock_round_trip() {
    let mut rng = rng(20);
    let user = account(&mut rng);
    let c = balance(&mut rng, &user, 300);

    let rel = UnlockRelation::new(
        &UnlockInput {
            sk: user.sk,
            chain_id: 5,
            c,
            b: 300,
            b_delta: 120,
            asset_id: 0,
            fee_asset_id: 0,
            fee: 2,
            fee_balance: None,
        },
        &mut rng,
    )
    .expect("relation");
    assert_eq!(rel.b_prime, 300 + 120 - 2);

    let proof = prove_unlock(&rel, &mut rng).expect("prove");
    assert_eq!(proof.verify(), Ok(true));

    // Binding to the chain is part of the challenge.
    let mut tampered = proof.clone();
    tampered.chain_id = 6;
    assert_eq!(tampered.verify(), Ok(false));
}

// ---- Transfer ----

fn transfer_fixture(rng: &mut ChaCha20Rng) -> TransferRelation {
    let sender = account(rng);
    let recipient = account(rng);
    let c = balance(rng, &sender, 900);
    TransferRelation::new(
        &TransferInput {
            sk: sender.sk,
            pk_to: recipient.pk,
            c,
            b: 900,
            b_delta: 250,
            asset_id: 0,
            fee_asset_id: 0,
            fee: 4,
            fee_balance: None,
        },
        rng,
    )
    .expect("relation")
}

#[test]
fn transfer_round_trip_and_bit_flip() {
    let mut rng = rng(30);
    let rel = transfer_fixture(&mut rng);
    assert_eq!(rel.b_prime, 900 - 250 - 4);

    let proof = prove_transfer(&rel, &mut rng).expect("prove");
    assert_eq!(proof.verify(), Ok(true));

    // Flipping any response scalar must reject.
    let mutations: [fn(&mut TransferProof); 5] = [
        |p| p.z_r_delta_from += Fr::one(),
        |p| p.z_r_delta_to += Fr::one(),
        |p| p.z_sk += Fr::one(),
        |p| p.z_sk_inv += Fr::one(),
        |p| p.z_bar_r += Fr::one(),
    ];
    for mutate in mutations {
        let mut tampered = proof.clone();
        mutate(&mut tampered);
        assert_eq!(tampered.verify(), Ok(false));
    }

    // Transcript-order sensitivity: a permuted statement field changes
    // the challenge and the proof no longer verifies.
    let mut tampered = proof.clone();
    tampered.asset_id = 1;
    tampered.fee_asset_id = 1;
    assert_eq!(tampered.verify(), Ok(false));

    let decoded = TransferProof::from_bytes(&proof.to_bytes()).expect("decode");
    assert_eq!(decoded, proof);
    assert_eq!(decoded.verify(), Ok(true));
}

#[test]
fn transfer_wire_rejects_corrupted_scalar() {
    let mut rng = rng(31);
    let rel = transfer_fixture(&mut rng);
    let proof = prove_transfer(&rel, &mut rng).expect("prove");

    let bytes = proof.to_bytes();
    // Flip one bit inside the first point encoding: decode must refuse
    // or the proof must no longer verify.
    let mut bad = bytes.clone();
    bad[10] ^= 0x01;
    match TransferProof::from_bytes(&bad) {
        Err(e) => assert_eq!(e, ProofError::InvalidParams),
        Ok(p) => assert_eq!(p.verify(), Ok(false)),
    }
}

// ---- Swap (S4) ----

fn swap_input(user: &Keypair, pool: &Keypair, c_ua: ElGamalEnc, c_ub: ElGamalEnc) -> SwapInput {
    SwapInput {
        sk_u: user.sk,
        pk_pool: pool.pk,
        c_ua,
        c_ub,
        b_ua: 5_000,
        b_a_delta: 100,
        b_pool_a: 10_000,
        b_pool_b: 40_000,
        asset_a_id: 0,
        asset_b_id: 1,
        fee_asset_id: 0,
        fee: 0,
        fee_balance: None,
    }
}

#[test]
fn swap_round_trip_with_fresh_blindings() {
    let mut rng = rng(40);
    let user = account(&mut rng);
    let pool = account(&mut rng);
    let c_ua = balance(&mut rng, &user, 5_000);
    let c_ub = balance(&mut rng, &user, 10);

    let input = swap_input(&user, &pool, c_ua, c_ub);
    let rel = SwapRelation::new(&input, &mut rng).expect("relation");
    // ⌊40_000·100 / (10_000 + 100)⌋
    assert_eq!(rel.b_b_delta, 396);
    assert_eq!(rel.b_prime_a, 5_000 - 100);

    let proof = prove_swap(&rel, &mut rng).expect("prove");
    assert_eq!(proof.verify(), Ok(true));

    // Rebuilding the relation draws a fresh r̄_A; both proofs stand.
    let rel2 = SwapRelation::new(&input, &mut rng).expect("relation");
    assert_ne!(rel2.t_ua, rel.t_ua);
    let proof2 = prove_swap(&rel2, &mut rng).expect("prove");
    assert_eq!(proof2.verify(), Ok(true));
    assert_eq!(proof.verify(), Ok(true));
}

#[test]
fn swap_rejects_wrong_output_amount() {
    let mut rng = rng(41);
    let user = account(&mut rng);
    let pool = account(&mut rng);
    let c_ua = balance(&mut rng, &user, 5_000);
    let c_ub = balance(&mut rng, &user, 10);
    let rel = SwapRelation::new(&swap_input(&user, &pool, c_ua, c_ub), &mut rng)
        .expect("relation");
    let mut proof = prove_swap(&rel, &mut rng).expect("prove");
    proof.b_b_delta += 1;
    assert_eq!(proof.verify(), Ok(false));
}

#[test]
fn swap_wire_round_trip() {
    let mut rng = rng(42);
    let user = account(&mut rng);
    let pool = account(&mut rng);
    let c_ua = balance(&mut rng, &user, 5_000);
    let c_ub = balance(&mut rng, &user, 10);
    let rel = SwapRelation::new(&swap_input(&user, &pool, c_ua, c_ub), &mut rng)
        .expect("relation");
    let proof = prove_swap(&rel, &mut rng).expect("prove");
    let decoded = SwapProof::from_bytes(&proof.to_bytes()).expect("decode");
    assert_eq!(decoded, proof);
}

// ---- RemoveLiquidity ----

fn remove_liquidity_fixture(rng: &mut ChaCha20Rng) -> RemoveLiquidityRelation {
    let user = account(rng);
    let pool = account(rng);
    let c_u_lp = balance(rng, &user, 500);
    let c_fee = balance(rng, &user, 60);

    // Burn 200 LP against a (1_000, 4_000) pool with 2_000 LP issued.
    RemoveLiquidityRelation::new(
        &RemoveLiquidityInput {
            sk_u: user.sk,
            pk_pool: pool.pk,
            c_u_lp,
            b_u_lp: 500,
            delta_lp: 200,
            b_a_delta: 100,
            b_b_delta: 400,
            b_pool_a: 1_000,
            b_pool_b: 4_000,
            b_lp: 2_000,
            asset_a_id: 0,
            asset_b_id: 1,
            fee_asset_id: 7,
            fee: 5,
            c_fee,
            b_fee: 60,
        },
        rng,
    )
    .expect("relation")
}

#[test]
fn remove_liquidity_round_trip() {
    let mut rng = rng(50);
    let rel = remove_liquidity_fixture(&mut rng);
    assert_eq!(rel.b_prime_lp, 300);

    let proof = prove_remove_liquidity(&rel, &mut rng).expect("prove");
    assert_eq!(proof.verify(), Ok(true));

    let decoded = RemoveLiquidityProof::from_bytes(&proof.to_bytes()).expect("decode");
    assert_eq!(decoded, proof);
}

#[test]
fn remove_liquidity_rejects_slippage_violation() {
    let mut rng = rng(51);
    let rel = remove_liquidity_fixture(&mut rng);
    let mut proof = prove_remove_liquidity(&rel, &mut rng).expect("prove");
    // Claim the pool owes far more A per LP than the reserves support:
    // 8_000·200 > 2_000·100 + 2_000.
    proof.add_pool_info(8_000, 4_000, 2_000).expect("pool info");
    assert_eq!(proof.verify(), Ok(false));
}

// ---- AMM arithmetic ----

#[test]
fn isqrt_is_floor_sqrt() {
    for (n, root) in [
        (0u128, 0u64),
        (1, 1),
        (3, 1),
        (4, 2),
        (40_000, 200),
        (40_001, 200),
        ((1u128 << 64) - 1, u32::MAX as u64),
    ] {
        assert_eq!(isqrt(n), root, "n = {n}");
    }
}

#[test]
fn swap_output_follows_constant_product() {
    assert_eq!(swap_output(10_000, 40_000, 100), Some(396));
    assert_eq!(swap_output(0, 40_000, 0), None);
    // Rounding always favors the pool.
    assert_eq!(swap_output(3, 10, 1), Some(2));
}

#[test]
fn amm_tolerance_is_one_reserve_unit() {
    // Exact rate.
    assert!(amm_rate_within_tolerance(1_000, 4_000, 100, 400));
    // Off by the max reserve: still allowed.
    assert!(amm_rate_within_tolerance(1_000, 4_000, 101, 400));
    // Far off: rejected.
    assert!(!amm_rate_within_tolerance(1_000, 4_000, 200, 400));
}

#[test]
fn no_slippage_bound() {
    // pool·Δ_LP ≤ lp·Δ + lp
    assert!(no_slippage(1_000, 2_000, 100, 200));
    assert!(!no_slippage(8_000, 2_000, 100, 200));
}

// ---- Tagged proof enum ----

#[test]
fn tx_proof_round_trip_and_dispatch() {
    let mut rng = rng(60);
    let rel = transfer_fixture(&mut rng);
    let proof = TxProof::Transfer(prove_transfer(&rel, &mut rng).expect("prove"));

    assert_eq!(proof.verify(), Ok(true));
    let bytes = proof.to_bytes();
    let decoded = TxProof::from_bytes(&bytes).expect("decode");
    assert_eq!(decoded, proof);

    let mut bad_tag = bytes;
    bad_tag[0] = 99;
    assert_eq!(
        TxProof::from_bytes(&bad_tag).unwrap_err(),
        ProofError::InvalidParams
    );
}
