//! # zkct-primitives — curve, encryption and transcript layers
//!
//! Foundation crate for the zkct confidential-transaction proof system:
//!
//! - **Field helpers** over the scalar field of the prime-order subgroup
//!   (`Fr`) and the coordinate field (`Fq`), with canonical big-endian
//!   codecs.
//! - **Curve layer**: a twisted-Edwards group on the BN254 scalar field
//!   (Baby Jubjub), hash-to-point generator derivation and subgroup checks.
//! - **MiMC** transcript digest and the Fiat–Shamir [`Transcript`].
//! - **Pedersen commitments** `v·H + r·G`.
//! - **Twisted ElGamal** encryption of small integer exponents with
//!   additive homomorphism and bounded-range decryption.
//!
//! All externally supplied points must pass [`curve::in_subgroup`] before
//! they participate in any protocol; the canonical decoders enforce this.

pub mod curve;
pub mod elgamal;
pub mod field;
pub mod mimc;
pub mod pedersen;
pub mod transcript;

#[cfg(test)]
mod tests;

pub use ark_ed_on_bn254::{Fq, Fr};

pub use curve::{
    in_subgroup, map_to_group, point_from_bytes, point_to_bytes, CurveError, Point, G, H, U,
};
pub use elgamal::{decrypt, encrypt, keygen, DecError, ElGamalEnc, Keypair};
pub use field::{
    fq_from_be_bytes, fq_to_be_bytes, fr_from_be_bytes, fr_to_be_bytes, mod_inverse,
    random_nonzero, FieldError,
};
pub use transcript::{hash_to_fr, Transcript, FIXED_CURVE};
