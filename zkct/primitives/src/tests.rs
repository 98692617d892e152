use ark_ec::Group;
use ark_ff::{One, Zero};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::*;

fn rng(tag: u8) -> ChaCha20Rng {
    let mut seed = [0u8; 32];
    seed[0] = tag;
    ChaCha20Rng::from_seed(seed)
}

#[test]
fn keygen_small_sk_matches_base_multiples() {
    // sk = 3: pk must equal 3·G computed through independent paths.
    let sk = Fr::from(3u64);
    let pk = *G * sk;
    assert_eq!(pk, *G + *G + *G);
    assert_eq!(point_to_bytes(&pk), point_to_bytes(&(*G + G.double())));

    // enc(10; 7, pk) decrypts back to 10.
    let ct = encrypt(10, &Fr::from(7u64), &pk);
    assert_eq!(decrypt(&ct, &sk, 32), Ok(10));
}

#[test]
fn keygen_produces_subgroup_keys() {
    let mut rng = rng(1);
    let kp = keygen(&mut rng);
    assert!(!kp.sk.is_zero());
    assert!(in_subgroup(&kp.pk));
    assert_eq!(kp.pk, *G * kp.sk);
}

#[test]
fn elgamal_decrypt_window_edges() {
    let mut rng = rng(2);
    let kp = keygen(&mut rng);
    for v in [0u64, 1, 499, (1 << 32) - 1] {
        let r = random_nonzero(&mut rng);
        let ct = encrypt(v, &r, &kp.pk);
        assert_eq!(decrypt(&ct, &kp.sk, 32), Ok(v));
    }
}

#[test]
fn elgamal_decrypt_out_of_window() {
    let mut rng = rng(3);
    let kp = keygen(&mut rng);
    let r = random_nonzero(&mut rng);
    let ct = encrypt(1 << 33, &r, &kp.pk);
    assert_eq!(decrypt(&ct, &kp.sk, 32), Err(DecError::OutOfRange));
}

#[test]
fn elgamal_decrypt_rejects_bad_params() {
    let mut rng = rng(4);
    let kp = keygen(&mut rng);
    let ct = encrypt(5, &random_nonzero(&mut rng), &kp.pk);
    assert_eq!(decrypt(&ct, &kp.sk, 0), Err(DecError::InvalidParams));
    assert_eq!(decrypt(&ct, &kp.sk, 41), Err(DecError::InvalidParams));
    assert_eq!(decrypt(&ct, &Fr::zero(), 32), Err(DecError::InvalidParams));
}

#[test]
fn pedersen_commit_open() {
    let mut rng = rng(5);
    let v = Fr::from(1234u64);
    let r = random_nonzero(&mut rng);
    let t = pedersen::commit(&v, &r, &H, &G);
    assert!(pedersen::open(&v, &r, &H, &G, &t));
    assert!(!pedersen::open(&(v + Fr::one()), &r, &H, &G, &t));
    assert!(!pedersen::open(&v, &(r + Fr::one()), &H, &G, &t));
}

#[test]
fn generators_are_distinct_subgroup_elements() {
    for p in [&*G, &*H, &*U] {
        assert!(in_subgroup(p));
        assert!(!p.is_zero());
    }
    assert_ne!(*G, *H);
    assert_ne!(*G, *U);
    assert_ne!(*H, *U);
}

#[test]
fn map_to_group_is_deterministic() {
    let a = map_to_group("some-domain-tag").unwrap();
    let b = map_to_group("some-domain-tag").unwrap();
    let c = map_to_group("another-domain-tag").unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn point_codec_round_trip() {
    let mut rng = rng(6);
    let p = *G * random_nonzero(&mut rng);
    let bytes = point_to_bytes(&p);
    assert_eq!(point_from_bytes(&bytes).unwrap(), p);

    // Corrupting a coordinate must not decode to a curve point.
    let mut bad = bytes;
    bad[40] ^= 0x01;
    assert!(point_from_bytes(&bad).is_err());
}

#[test]
fn scalar_codec_rejects_non_canonical() {
    use ark_ff::{BigInteger, PrimeField};
    let mut modulus = [0u8; 32];
    modulus.copy_from_slice(&Fr::MODULUS.to_bytes_be());
    assert_eq!(fr_from_be_bytes(&modulus), Err(FieldError::NonCanonical));

    let x = Fr::from(99u64);
    assert_eq!(fr_from_be_bytes(&fr_to_be_bytes(&x)), Ok(x));
}

#[test]
fn inverse_of_zero_fails() {
    assert_eq!(mod_inverse(Fr::zero()), Err(FieldError::NotInvertible));
    let x = Fr::from(42u64);
    assert_eq!(mod_inverse(x).unwrap() * x, Fr::one());
}

#[test]
fn transcript_order_changes_challenge() {
    let p = *G * Fr::from(11u64);
    let q = *H * Fr::from(13u64);

    let mut t1 = Transcript::new();
    t1.append_point(&p);
    t1.append_point(&q);
    t1.append_u64(7);

    let mut t2 = Transcript::new();
    t2.append_point(&q);
    t2.append_point(&p);
    t2.append_u64(7);

    let mut t3 = Transcript::new();
    t3.append_point(&p);
    t3.append_point(&q);
    t3.append_u64(7);

    assert_ne!(t1.challenge(), t2.challenge());
    assert_eq!(t1.challenge(), t3.challenge());
}

#[test]
fn mimc_digest_is_stable() {
    let a = mimc::mimc_hash(b"zkct");
    let b = mimc::mimc_hash(b"zkct");
    let c = mimc::mimc_hash(b"zkcu");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(mimc::mimc_hash(b""), mimc::mimc_hash(b"\0"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn elgamal_is_additively_homomorphic(
        v1 in 0u64..(1 << 31),
        v2 in 0u64..(1 << 31),
        s1 in 1u64..u64::MAX,
        s2 in 1u64..u64::MAX,
        sk in 1u64..u64::MAX,
    ) {
        let pk = *G * Fr::from(sk);
        let (r1, r2) = (Fr::from(s1), Fr::from(s2));
        let sum = encrypt(v1, &r1, &pk).add(&encrypt(v2, &r2, &pk));
        prop_assert_eq!(sum, encrypt(v1 + v2, &(r1 + r2), &pk));
    }

    #[test]
    fn pedersen_is_deterministic(v in 0u64..u64::MAX, r in 1u64..u64::MAX) {
        let (v, r) = (Fr::from(v), Fr::from(r));
        prop_assert_eq!(
            pedersen::commit(&v, &r, &H, &G),
            pedersen::commit(&v, &r, &H, &G)
        );
    }
}
