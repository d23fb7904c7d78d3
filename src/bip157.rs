//! BIP157: Client-Side Block Filtering Network Protocol
//!
//! Only the `regular` filter type is supported. Defines `FilterKey` /
//! `FilterEntry` (the filter store's key/value shape) and the
//! `getcfilters` / `cfilter` wire payloads the protocol engine exchanges
//! with peers.

use std::io::Read;

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::codec::{read_hash, read_u32, read_u8, CodecError, CodecResult, Decode, Encode, VarInt};
use crate::types::Hash;

/// Service bit advertised by peers that serve compact filters.
pub const NODE_COMPACT_FILTERS: u64 = 1 << 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Regular = 0,
}

impl FilterType {
    pub fn from_u8(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(FilterType::Regular),
            other => Err(CodecError::PayloadMalformed(format!(
                "unsupported filter_type {other}"
            ))),
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// `(block_hash, filter_type)`. `stable_id` renders a short hex tag for
/// logs: hex of the first 6 bytes of HASH160(block_hash || filter_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterKey {
    pub block_hash: Hash,
    pub filter_type: u8,
}

impl FilterKey {
    pub fn new(block_hash: Hash, filter_type: FilterType) -> Self {
        Self {
            block_hash,
            filter_type: filter_type.to_u8(),
        }
    }

    pub fn stable_id(&self) -> String {
        let mut preimage = Vec::with_capacity(33);
        preimage.extend_from_slice(&self.block_hash);
        preimage.push(self.filter_type);
        let sha = Sha256::digest(&preimage);
        let ripe = Ripemd160::digest(sha);
        hex::encode(&ripe[..6])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEntry {
    pub key: FilterKey,
    pub nbytes: Vec<u8>,
}

/// `getcfilters { filter_type=0, start_height, stop_hash }` — this client
/// only ever sends this message; it validates an inbound one (acting as
/// the protocol dispatcher for a peer's request) per §4.5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetCfilters {
    pub filter_type: u8,
    pub start_height: u32,
    pub stop_hash: Hash,
}

impl Encode for GetCfilters {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.filter_type);
        out.extend_from_slice(&self.start_height.to_le_bytes());
        out.extend_from_slice(&self.stop_hash);
    }
}

impl Decode for GetCfilters {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        Ok(GetCfilters {
            filter_type: read_u8(input)?,
            start_height: read_u32(input)?,
            stop_hash: read_hash(input)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CFilter {
    pub filter_type: u8,
    pub block_hash: Hash,
    pub filter_bytes: Vec<u8>,
}

impl Encode for CFilter {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.filter_type);
        out.extend_from_slice(&self.block_hash);
        VarInt::len_prefixed_bytes(out, &self.filter_bytes);
    }
}

impl Decode for CFilter {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        Ok(CFilter {
            filter_type: read_u8(input)?,
            block_hash: read_hash(input)?,
            filter_bytes: VarInt::read_len_prefixed_bytes(input)?,
        })
    }
}
