use ark_ff::One;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use zkct_primitives::{pedersen, Fr, G, H};

use crate::*;

fn rng(tag: u8) -> ChaCha20Rng {
    let mut seed = [0u8; 32];
    seed[0] = tag;
    ChaCha20Rng::from_seed(seed)
}

#[test]
fn proves_and_verifies_window_values() {
    let mut rng = rng(1);
    for b in [0u64, 1, 499, (1 << 32) - 1] {
        let (proof, blind) = prove(b, &G, &H, &mut rng).expect("prove");
        assert_eq!(proof.verify(), Ok(true), "b = {b}");
        // (a, blind) is the Pedersen opening of the proved value.
        assert!(pedersen::open(&Fr::from(b), &blind, &H, &G, &proof.a));
    }
}

#[test]
fn refuses_out_of_window_value() {
    let mut rng = rng(2);
    assert_eq!(
        prove(1 << 32, &G, &H, &mut rng).unwrap_err(),
        RangeError::InvalidBit
    );
    assert_eq!(
        prove(u64::MAX, &G, &H, &mut rng).unwrap_err(),
        RangeError::InvalidBit
    );
}

#[test]
fn rejects_tampered_aggregate() {
    let mut rng = rng(3);
    let (mut proof, _) = prove(777, &G, &H, &mut rng).expect("prove");
    proof.a += *G;
    assert_eq!(proof.verify(), Ok(false));
}

#[test]
fn rejects_tampered_challenge() {
    let mut rng = rng(4);
    let (mut proof, _) = prove(777, &G, &H, &mut rng).expect("prove");
    proof.c += Fr::one();
    assert_eq!(proof.verify(), Ok(false));
}

#[test]
fn rejects_tampered_response() {
    let mut rng = rng(5);
    let (mut proof, _) = prove(12345, &G, &H, &mut rng).expect("prove");
    proof.zs[7] += Fr::one();
    assert_eq!(proof.verify(), Ok(false));
}

#[test]
fn rejects_tampered_bit_commitment() {
    let mut rng = rng(6);
    let (mut proof, _) = prove(12345, &G, &H, &mut rng).expect("prove");
    proof.bit_comms[3] += *G;
    assert_eq!(proof.verify(), Ok(false));
}

#[test]
fn wire_format_round_trip() {
    let mut rng = rng(7);
    let (proof, _) = prove(40_000, &G, &H, &mut rng).expect("prove");
    let bytes = proof.to_bytes();
    assert_eq!(bytes.len(), SERIALIZED_LEN);
    let decoded = RangeProof::from_bytes(&bytes).expect("decode");
    assert_eq!(decoded, proof);
    assert_eq!(decoded.verify(), Ok(true));
}

#[test]
fn wire_format_rejects_bad_input() {
    let mut rng = rng(8);
    let (proof, _) = prove(40_000, &G, &H, &mut rng).expect("prove");
    let bytes = proof.to_bytes();

    assert_eq!(
        RangeProof::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err(),
        RangeError::InvalidParams
    );

    // Corrupt a point coordinate: decoding must refuse it.
    let mut bad = bytes.clone();
    let point_region = 32 + RANGE_MAX_BITS * 32;
    bad[point_region + 5] ^= 0x01;
    assert_eq!(
        RangeProof::from_bytes(&bad).unwrap_err(),
        RangeError::InvalidParams
    );
}

#[test]
fn proofs_are_randomized() {
    let mut rng = rng(9);
    let (p1, _) = prove(999, &G, &H, &mut rng).expect("prove");
    let (p2, _) = prove(999, &G, &H, &mut rng).expect("prove");
    assert_ne!(p1.a, p2.a);
    assert_eq!(p1.verify(), Ok(true));
    assert_eq!(p2.verify(), Ok(true));
}
