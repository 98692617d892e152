//! Canonical proof wire format.
//!
//! Fixed-width big-endian throughout: a Point is `x ‖ y` (2 × 32 bytes),
//! a Scalar 32 bytes, an integer 8 bytes. Fields appear in the relation's
//! Fiat–Shamir order, followed by the responses, the statement elements
//! that are not transcript-bound, and the attached range proofs
//! (`C ‖ Zs[32] ‖ As[32] ‖ A` each). Variable-length byte strings carry a
//! 2-byte big-endian length prefix. Decoding validates every point
//! (canonical coordinates, on-curve, subgroup) and every scalar
//! (canonical encoding); any violation is `InvalidParams`.

use zkct_ctrange::{RangeProof, SERIALIZED_LEN as RANGE_PROOF_LEN};
use zkct_primitives::{
    fr_from_be_bytes, fr_to_be_bytes, point_from_bytes, point_to_bytes, ElGamalEnc, Fr, Point,
};

use crate::{
    AddLiquidityProof, ProofError, RemoveLiquidityProof, SwapProof, TransferProof, TxProof,
    UnlockProof, WithdrawProof,
};

const TAG_TRANSFER: u8 = 1;
const TAG_WITHDRAW: u8 = 2;
const TAG_UNLOCK: u8 = 3;
const TAG_SWAP: u8 = 4;
const TAG_ADD_LIQUIDITY: u8 = 5;
const TAG_REMOVE_LIQUIDITY: u8 = 6;

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    fn point(&mut self, p: &Point) {
        self.buf.extend_from_slice(&point_to_bytes(p));
    }

    fn enc(&mut self, e: &ElGamalEnc) {
        self.point(&e.cl);
        self.point(&e.cr);
    }

    fn fr(&mut self, x: &Fr) {
        self.buf.extend_from_slice(&fr_to_be_bytes(x));
    }

    fn int(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn var_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= u16::MAX as usize);
        self.buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(bytes);
    }

    fn range(&mut self, proof: &RangeProof) {
        self.buf.extend_from_slice(&proof.to_bytes());
    }

    fn opt_range(&mut self, proof: &Option<RangeProof>) {
        match proof {
            None => self.buf.push(0),
            Some(p) => {
                self.buf.push(1);
                self.range(p);
            }
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, off: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProofError> {
        let end = self.off.checked_add(n).ok_or(ProofError::InvalidParams)?;
        if end > self.buf.len() {
            return Err(ProofError::InvalidParams);
        }
        let out = &self.buf[self.off..end];
        self.off = end;
        Ok(out)
    }

    fn point(&mut self) -> Result<Point, ProofError> {
        let mut raw = [0u8; 64];
        raw.copy_from_slice(self.take(64)?);
        Ok(point_from_bytes(&raw)?)
    }

    fn enc(&mut self) -> Result<ElGamalEnc, ProofError> {
        Ok(ElGamalEnc {
            cl: self.point()?,
            cr: self.point()?,
        })
    }

    fn fr(&mut self) -> Result<Fr, ProofError> {
        let mut raw = [0u8; 32];
        raw.copy_from_slice(self.take(32)?);
        Ok(fr_from_be_bytes(&raw)?)
    }

    fn int(&mut self) -> Result<u64, ProofError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(raw))
    }

    fn small_int(&mut self) -> Result<u32, ProofError> {
        u32::try_from(self.int()?).map_err(|_| ProofError::InvalidParams)
    }

    fn var_bytes(&mut self) -> Result<Vec<u8>, ProofError> {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(self.take(2)?);
        let len = u16::from_be_bytes(raw) as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn range(&mut self) -> Result<RangeProof, ProofError> {
        let raw = self.take(RANGE_PROOF_LEN)?;
        Ok(RangeProof::from_bytes(raw)?)
    }

    fn opt_range(&mut self) -> Result<Option<RangeProof>, ProofError> {
        match self.take(1)?[0] {
            0 => Ok(None),
            1 => Ok(Some(self.range()?)),
            _ => Err(ProofError::InvalidParams),
        }
    }

    fn finish(self) -> Result<(), ProofError> {
        if self.off == self.buf.len() {
            Ok(())
        } else {
            Err(ProofError::InvalidParams)
        }
    }
}

impl TransferProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.point(&self.pk_from);
        w.point(&self.pk_to);
        w.enc(&self.c);
        w.enc(&self.c_delta_from);
        w.enc(&self.c_delta_to);
        w.point(&self.t);
        w.int(self.asset_id as u64);
        w.point(&self.a_c_delta_from);
        w.point(&self.a_c_delta_to);
        w.point(&self.a_t_fee);
        w.enc(&self.c_fee);
        w.int(self.fee_asset_id as u64);
        w.int(self.fee);
        w.point(&self.a_pk);
        w.point(&self.a_t);
        w.fr(&self.z_r_delta_from);
        w.fr(&self.z_r_delta_to);
        w.fr(&self.z_sk);
        w.fr(&self.z_sk_inv);
        w.fr(&self.z_bar_r);
        w.fr(&self.z_bar_r_fee);
        w.point(&self.t_fee);
        w.range(&self.range_proof);
        w.opt_range(&self.fee_range_proof);
        w.buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        let mut r = Reader::new(bytes);
        let proof = TransferProof {
            pk_from: r.point()?,
            pk_to: r.point()?,
            c: r.enc()?,
            c_delta_from: r.enc()?,
            c_delta_to: r.enc()?,
            t: r.point()?,
            asset_id: r.small_int()?,
            a_c_delta_from: r.point()?,
            a_c_delta_to: r.point()?,
            a_t_fee: r.point()?,
            c_fee: r.enc()?,
            fee_asset_id: r.small_int()?,
            fee: r.int()?,
            a_pk: r.point()?,
            a_t: r.point()?,
            z_r_delta_from: r.fr()?,
            z_r_delta_to: r.fr()?,
            z_sk: r.fr()?,
            z_sk_inv: r.fr()?,
            z_bar_r: r.fr()?,
            z_bar_r_fee: r.fr()?,
            t_fee: r.point()?,
            range_proof: r.range()?,
            fee_range_proof: r.opt_range()?,
        };
        r.finish()?;
        Ok(proof)
    }
}

impl WithdrawProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.point(&self.pk);
        w.enc(&self.c);
        w.point(&self.t);
        w.int(self.b_delta);
        w.int(self.asset_id as u64);
        w.var_bytes(&self.receive_addr);
        w.point(&self.a_t_fee);
        w.enc(&self.c_fee);
        w.int(self.fee_asset_id as u64);
        w.int(self.fee);
        w.point(&self.a_pk);
        w.point(&self.a_t);
        w.fr(&self.z_sk);
        w.fr(&self.z_sk_inv);
        w.fr(&self.z_bar_r);
        w.fr(&self.z_bar_r_fee);
        w.point(&self.t_fee);
        w.range(&self.range_proof);
        w.opt_range(&self.fee_range_proof);
        w.buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        let mut r = Reader::new(bytes);
        let proof = WithdrawProof {
            pk: r.point()?,
            c: r.enc()?,
            t: r.point()?,
            b_delta: r.int()?,
            asset_id: r.small_int()?,
            receive_addr: r.var_bytes()?,
            a_t_fee: r.point()?,
            c_fee: r.enc()?,
            fee_asset_id: r.small_int()?,
            fee: r.int()?,
            a_pk: r.point()?,
            a_t: r.point()?,
            z_sk: r.fr()?,
            z_sk_inv: r.fr()?,
            z_bar_r: r.fr()?,
            z_bar_r_fee: r.fr()?,
            t_fee: r.point()?,
            range_proof: r.range()?,
            fee_range_proof: r.opt_range()?,
        };
        r.finish()?;
        Ok(proof)
    }
}

impl UnlockProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.point(&self.pk);
        w.int(self.chain_id as u64);
        w.int(self.asset_id as u64);
        w.enc(&self.c);
        w.point(&self.t);
        w.int(self.b_delta);
        w.point(&self.a_t_fee);
        w.enc(&self.c_fee);
        w.int(self.fee_asset_id as u64);
        w.int(self.fee);
        w.point(&self.a_pk);
        w.point(&self.a_t);
        w.fr(&self.z_sk);
        w.fr(&self.z_sk_inv);
        w.fr(&self.z_bar_r);
        w.fr(&self.z_bar_r_fee);
        w.point(&self.t_fee);
        w.range(&self.range_proof);
        w.opt_range(&self.fee_range_proof);
        w.buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        let mut r = Reader::new(bytes);
        let proof = UnlockProof {
            pk: r.point()?,
            chain_id: r.small_int()?,
            asset_id: r.small_int()?,
            c: r.enc()?,
            t: r.point()?,
            b_delta: r.int()?,
            a_t_fee: r.point()?,
            c_fee: r.enc()?,
            fee_asset_id: r.small_int()?,
            fee: r.int()?,
            a_pk: r.point()?,
            a_t: r.point()?,
            z_sk: r.fr()?,
            z_sk_inv: r.fr()?,
            z_bar_r: r.fr()?,
            z_bar_r_fee: r.fr()?,
            t_fee: r.point()?,
            range_proof: r.range()?,
            fee_range_proof: r.opt_range()?,
        };
        r.finish()?;
        Ok(proof)
    }
}

impl SwapProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.point(&self.pk_u);
        w.point(&self.pk_pool);
        w.enc(&self.c_ua);
        w.enc(&self.c_ub);
        w.enc(&self.c_ua_delta);
        w.enc(&self.c_ub_delta);
        w.point(&self.t_ua);
        w.int(self.b_a_delta);
        w.int(self.b_b_delta);
        w.int(self.asset_a_id as u64);
        w.int(self.asset_b_id as u64);
        w.point(&self.a_t_fee);
        w.enc(&self.c_fee);
        w.int(self.fee_asset_id as u64);
        w.int(self.fee);
        w.point(&self.a_pk);
        w.point(&self.a_t_ua);
        w.fr(&self.z_sk);
        w.fr(&self.z_sk_inv);
        w.fr(&self.z_bar_r_a);
        w.fr(&self.z_bar_r_fee);
        w.enc(&self.lc_pool_a_delta);
        w.enc(&self.lc_pool_b_delta);
        w.fr(&self.r_delta_a);
        w.fr(&self.r_delta_b);
        w.point(&self.t_fee);
        w.int(self.b_pool_a);
        w.int(self.b_pool_b);
        w.range(&self.a_range_proof);
        w.opt_range(&self.fee_range_proof);
        w.buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        let mut r = Reader::new(bytes);
        let proof = SwapProof {
            pk_u: r.point()?,
            pk_pool: r.point()?,
            c_ua: r.enc()?,
            c_ub: r.enc()?,
            c_ua_delta: r.enc()?,
            c_ub_delta: r.enc()?,
            t_ua: r.point()?,
            b_a_delta: r.int()?,
            b_b_delta: r.int()?,
            asset_a_id: r.small_int()?,
            asset_b_id: r.small_int()?,
            a_t_fee: r.point()?,
            c_fee: r.enc()?,
            fee_asset_id: r.small_int()?,
            fee: r.int()?,
            a_pk: r.point()?,
            a_t_ua: r.point()?,
            z_sk: r.fr()?,
            z_sk_inv: r.fr()?,
            z_bar_r_a: r.fr()?,
            z_bar_r_fee: r.fr()?,
            lc_pool_a_delta: r.enc()?,
            lc_pool_b_delta: r.enc()?,
            r_delta_a: r.fr()?,
            r_delta_b: r.fr()?,
            t_fee: r.point()?,
            b_pool_a: r.int()?,
            b_pool_b: r.int()?,
            a_range_proof: r.range()?,
            fee_range_proof: r.opt_range()?,
        };
        r.finish()?;
        Ok(proof)
    }
}

impl AddLiquidityProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.point(&self.pk_u);
        w.point(&self.pk_pool);
        w.enc(&self.c_ua);
        w.enc(&self.c_ub);
        w.enc(&self.c_ua_delta);
        w.enc(&self.c_ub_delta);
        w.enc(&self.c_lp_delta);
        w.point(&self.t_ua);
        w.point(&self.t_ub);
        w.int(self.asset_a_id as u64);
        w.int(self.asset_b_id as u64);
        w.point(&self.a_c_lp_l_delta);
        w.point(&self.a_c_lp_r_delta);
        w.point(&self.a_t_fee);
        w.enc(&self.c_fee);
        w.int(self.fee_asset_id as u64);
        w.int(self.fee);
        w.point(&self.a_pk_u);
        w.point(&self.a_t_ua);
        w.point(&self.a_t_ub);
        w.fr(&self.z_r_delta_lp);
        w.fr(&self.z_sk_u);
        w.fr(&self.z_sk_u_inv);
        w.fr(&self.z_bar_r_a);
        w.fr(&self.z_bar_r_b);
        w.fr(&self.z_bar_r_fee);
        w.enc(&self.lc_pool_a_delta);
        w.enc(&self.lc_pool_b_delta);
        w.fr(&self.r_delta_a);
        w.fr(&self.r_delta_b);
        w.point(&self.t_fee);
        w.int(self.b_pool_a);
        w.int(self.b_pool_b);
        w.int(self.b_a_delta);
        w.int(self.b_b_delta);
        w.int(self.delta_lp);
        w.range(&self.a_range_proof);
        w.range(&self.b_range_proof);
        w.range(&self.fee_range_proof);
        w.buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        let mut r = Reader::new(bytes);
        let proof = AddLiquidityProof {
            pk_u: r.point()?,
            pk_pool: r.point()?,
            c_ua: r.enc()?,
            c_ub: r.enc()?,
            c_ua_delta: r.enc()?,
            c_ub_delta: r.enc()?,
            c_lp_delta: r.enc()?,
            t_ua: r.point()?,
            t_ub: r.point()?,
            asset_a_id: r.small_int()?,
            asset_b_id: r.small_int()?,
            a_c_lp_l_delta: r.point()?,
            a_c_lp_r_delta: r.point()?,
            a_t_fee: r.point()?,
            c_fee: r.enc()?,
            fee_asset_id: r.small_int()?,
            fee: r.int()?,
            a_pk_u: r.point()?,
            a_t_ua: r.point()?,
            a_t_ub: r.point()?,
            z_r_delta_lp: r.fr()?,
            z_sk_u: r.fr()?,
            z_sk_u_inv: r.fr()?,
            z_bar_r_a: r.fr()?,
            z_bar_r_b: r.fr()?,
            z_bar_r_fee: r.fr()?,
            lc_pool_a_delta: r.enc()?,
            lc_pool_b_delta: r.enc()?,
            r_delta_a: r.fr()?,
            r_delta_b: r.fr()?,
            t_fee: r.point()?,
            b_pool_a: r.int()?,
            b_pool_b: r.int()?,
            b_a_delta: r.int()?,
            b_b_delta: r.int()?,
            delta_lp: r.int()?,
            a_range_proof: r.range()?,
            b_range_proof: r.range()?,
            fee_range_proof: r.range()?,
        };
        r.finish()?;
        Ok(proof)
    }
}

impl RemoveLiquidityProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.point(&self.pk_u);
        w.point(&self.pk_pool);
        w.enc(&self.c_u_lp);
        w.enc(&self.c_ua_delta);
        w.enc(&self.c_ub_delta);
        w.enc(&self.c_u_lp_delta);
        w.point(&self.t_u_lp);
        w.int(self.b_a_delta);
        w.int(self.b_b_delta);
        w.int(self.delta_lp);
        w.int(self.asset_a_id as u64);
        w.int(self.asset_b_id as u64);
        w.point(&self.a_c_lp_l_delta);
        w.point(&self.a_c_lp_r_delta);
        w.point(&self.a_t_fee);
        w.enc(&self.c_fee);
        w.int(self.fee_asset_id as u64);
        w.int(self.fee);
        w.point(&self.a_pk_u);
        w.point(&self.a_t_u_lp);
        w.fr(&self.z_r_delta_lp);
        w.fr(&self.z_sk_u);
        w.fr(&self.z_sk_u_inv);
        w.fr(&self.z_bar_r_lp);
        w.fr(&self.z_bar_r_fee);
        w.enc(&self.lc_pool_a_delta);
        w.enc(&self.lc_pool_b_delta);
        w.fr(&self.r_delta_a);
        w.fr(&self.r_delta_b);
        w.point(&self.t_fee);
        w.int(self.b_pool_a);
        w.int(self.b_pool_b);
        w.int(self.b_lp);
        w.range(&self.lp_range_proof);
        w.range(&self.fee_range_proof);
        w.buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        let mut r = Reader::new(bytes);
        let proof = RemoveLiquidityProof {
            pk_u: r.point()?,
            pk_pool: r.point()?,
            c_u_lp: r.enc()?,
            c_ua_delta: r.enc()?,
            c_ub_delta: r.enc()?,
            c_u_lp_delta: r.enc()?,
            t_u_lp: r.point()?,
            b_a_delta: r.int()?,
            b_b_delta: r.int()?,
            delta_lp: r.int()?,
            asset_a_id: r.small_int()?,
            asset_b_id: r.small_int()?,
            a_c_lp_l_delta: r.point()?,
            a_c_lp_r_delta: r.point()?,
            a_t_fee: r.point()?,
            c_fee: r.enc()?,
            fee_asset_id: r.small_int()?,
            fee: r.int()?,
            a_pk_u: r.point()?,
            a_t_u_lp: r.point()?,
            z_r_delta_lp: r.fr()?,
            z_sk_u: r.fr()?,
            z_sk_u_inv: r.fr()?,
            z_bar_r_lp: r.fr()?,
            z_bar_r_fee: r.fr()?,
            lc_pool_a_delta: r.enc()?,
            lc_pool_b_delta: r.enc()?,
            r_delta_a: r.fr()?,
            r_delta_b: r.fr()?,
            t_fee: r.point()?,
            b_pool_a: r.int()?,
            b_pool_b: r.int()?,
            b_lp: r.int()?,
            lp_range_proof: r.range()?,
            fee_range_proof: r.range()?,
        };
        r.finish()?;
        Ok(proof)
    }
}

impl TxProof {
    /// One-byte kind tag followed by the proof payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let (tag, payload) = match self {
            TxProof::Transfer(p) => (TAG_TRANSFER, p.to_bytes()),
            TxProof::Withdraw(p) => (TAG_WITHDRAW, p.to_bytes()),
            TxProof::Unlock(p) => (TAG_UNLOCK, p.to_bytes()),
            TxProof::Swap(p) => (TAG_SWAP, p.to_bytes()),
            TxProof::AddLiquidity(p) => (TAG_ADD_LIQUIDITY, p.to_bytes()),
            TxProof::RemoveLiquidity(p) => (TAG_REMOVE_LIQUIDITY, p.to_bytes()),
        };
        let mut out = Vec::with_capacity(1 + payload.len());
        out.push(tag);
        out.extend_from_slice(&payload);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        let (tag, payload) = bytes.split_first().ok_or(ProofError::InvalidParams)?;
        match *tag {
            TAG_TRANSFER => Ok(TxProof::Transfer(TransferProof::from_bytes(payload)?)),
            TAG_WITHDRAW => Ok(TxProof::Withdraw(WithdrawProof::from_bytes(payload)?)),
            TAG_UNLOCK => Ok(TxProof::Unlock(UnlockProof::from_bytes(payload)?)),
            TAG_SWAP => Ok(TxProof::Swap(SwapProof::from_bytes(payload)?)),
            TAG_ADD_LIQUIDITY => Ok(TxProof::AddLiquidity(AddLiquidityProof::from_bytes(
                payload,
            )?)),
            TAG_REMOVE_LIQUIDITY => Ok(TxProof::RemoveLiquidity(
                RemoveLiquidityProof::from_bytes(payload)?,
            )),
            _ => Err(ProofError::InvalidParams),
        }
    }
}
