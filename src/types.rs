//! Local Elements-family domain types.
//!
//! These stand in for what the upstream `bllvm-protocol` crate would have
//! supplied (`Block`, `BlockHeader`, `Transaction`, `Hash`, ...). The core
//! here only ever reads a handful of fields off these types — height,
//! previous-hash linkage, output scripts, input outpoints — so the rest of
//! an Elements block/transaction (confidential value and asset envelopes,
//! the block's signed-block/PoW proof) is carried as opaque bytes rather
//! than decoded.

use std::io::Read;

use sha2::{Digest, Sha256};

use crate::codec::{
    read_hash, read_u32, CodecResult, Decode, Encode, VarInt,
};

/// A double-SHA-256 digest, displayed big-endian in hex per Bitcoin/Elements
/// convention.
pub type Hash = [u8; 32];

pub fn double_sha256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Render a hash the way block explorers and logs do: byte-reversed hex.
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parse a big-endian display hex string (as used by the checkpoint table)
/// back into wire-order bytes.
pub fn hash_from_hex(s: &str) -> Result<Hash, hex::FromHexError> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(s, &mut bytes)?;
    bytes.reverse();
    Ok(bytes)
}

/// An Elements block header. `proof` carries the signed-block or legacy
/// bits/nonce proof opaquely — this client never validates it (Non-goal:
/// consensus/PoW), only uses it to round-trip the header byte-for-byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u32,
    pub height: u32,
    pub proof: Vec<u8>,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        double_sha256(&self.encode_for_hash())
    }

    fn encode_for_hash(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 32 + 32 + 4 + 4 + self.proof.len());
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.prev_block_hash);
        buf.extend_from_slice(&self.merkle_root);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.proof);
        buf
    }
}

impl Encode for BlockHeader {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.prev_block_hash);
        out.extend_from_slice(&self.merkle_root);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        VarInt::len_prefixed_bytes(out, &self.proof);
    }
}

impl Decode for BlockHeader {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        Ok(BlockHeader {
            version: read_u32(input)?,
            prev_block_hash: read_hash(input)?,
            merkle_root: read_hash(input)?,
            timestamp: read_u32(input)?,
            height: read_u32(input)?,
            proof: VarInt::read_len_prefixed_bytes(input)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutPoint {
    pub txid: Hash,
    pub vout: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInput {
    pub prev_out: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

/// `value` is the opaque confidential-or-explicit value envelope; the
/// watch-item matcher never inspects it, only `script_pubkey`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionOutput {
    pub script_pubkey: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn txid(&self) -> Hash {
        double_sha256(&self.encode_for_txid())
    }

    fn encode_for_txid(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.version.to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(&input.prev_out.txid);
            buf.extend_from_slice(&input.prev_out.vout.to_le_bytes());
            buf.extend_from_slice(&(input.script_sig.len() as u32).to_le_bytes());
            buf.extend_from_slice(&input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        for output in &self.outputs {
            buf.extend_from_slice(&(output.value.len() as u32).to_le_bytes());
            buf.extend_from_slice(&output.value);
            buf.extend_from_slice(&(output.script_pubkey.len() as u32).to_le_bytes());
            buf.extend_from_slice(&output.script_pubkey);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }
}

impl Encode for TransactionInput {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.prev_out.txid);
        out.extend_from_slice(&self.prev_out.vout.to_le_bytes());
        VarInt::len_prefixed_bytes(out, &self.script_sig);
        out.extend_from_slice(&self.sequence.to_le_bytes());
    }
}

impl Decode for TransactionInput {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        let txid = read_hash(input)?;
        let vout = read_u32(input)?;
        let script_sig = VarInt::read_len_prefixed_bytes(input)?;
        let sequence = read_u32(input)?;
        Ok(TransactionInput {
            prev_out: OutPoint { txid, vout },
            script_sig,
            sequence,
        })
    }
}

impl Encode for TransactionOutput {
    fn encode(&self, out: &mut Vec<u8>) {
        VarInt::len_prefixed_bytes(out, &self.value);
        VarInt::len_prefixed_bytes(out, &self.script_pubkey);
    }
}

impl Decode for TransactionOutput {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        let value = VarInt::read_len_prefixed_bytes(input)?;
        let script_pubkey = VarInt::read_len_prefixed_bytes(input)?;
        Ok(TransactionOutput {
            script_pubkey,
            value,
        })
    }
}

impl Encode for Transaction {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        VarInt(self.inputs.len() as u64).encode(out);
        for input in &self.inputs {
            input.encode(out);
        }
        VarInt(self.outputs.len() as u64).encode(out);
        for output in &self.outputs {
            output.encode(out);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
    }
}

impl Decode for Transaction {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        let version = read_u32(input)?;
        let input_count = VarInt::decode(input)?.0 as usize;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(TransactionInput::decode(input)?);
        }
        let output_count = VarInt::decode(input)?.0 as usize;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(TransactionOutput::decode(input)?);
        }
        let lock_time = read_u32(input)?;
        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Encode for Block {
    fn encode(&self, out: &mut Vec<u8>) {
        self.header.encode(out);
        VarInt(self.transactions.len() as u64).encode(out);
        for tx in &self.transactions {
            tx.encode(out);
        }
    }
}

impl Decode for Block {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        let header = BlockHeader::decode(input)?;
        let tx_count = VarInt::decode(input)?.0 as usize;
        let mut transactions = Vec::with_capacity(tx_count);
        for _ in 0..tx_count {
            transactions.push(Transaction::decode(input)?);
        }
        Ok(Block {
            header,
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hex_round_trips() {
        let checkpoint =
            "1466275836220db2944ca059a3a10ef6fd2ea684b0688d2c379296888a206003";
        let parsed = hash_from_hex(checkpoint).unwrap();
        assert_eq!(hash_to_hex(&parsed), checkpoint);

        let original: Hash = [7u8; 32];
        let hex_str = hash_to_hex(&original);
        let parsed = hash_from_hex(&hex_str).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn header_hash_is_deterministic() {
        let header = BlockHeader {
            version: 1,
            prev_block_hash: [0u8; 32],
            merkle_root: [1u8; 32],
            timestamp: 100,
            height: 1,
            proof: vec![0xde, 0xad, 0xbe, 0xef],
        };
        assert_eq!(header.hash(), header.clone().hash());
    }

    #[test]
    fn txid_changes_with_outputs() {
        let base = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![],
            lock_time: 0,
        };
        let mut with_output = base.clone();
        with_output.outputs.push(TransactionOutput {
            script_pubkey: vec![0x51],
            value: vec![1, 2, 3],
        });
        assert_ne!(base.txid(), with_output.txid());
    }

    #[test]
    fn transaction_wire_round_trips() {
        let tx = Transaction {
            version: 2,
            inputs: vec![TransactionInput {
                prev_out: OutPoint {
                    txid: [5u8; 32],
                    vout: 1,
                },
                script_sig: vec![0x01, 0x02],
                sequence: 0xffffffff,
            }],
            outputs: vec![TransactionOutput {
                script_pubkey: vec![0x76, 0xa9],
                value: vec![0x01, 0x00, 0x00],
            }],
            lock_time: 0,
        };
        let mut buf = Vec::new();
        tx.encode(&mut buf);
        let decoded = Transaction::decode(&mut std::io::Cursor::new(buf)).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn block_wire_round_trips() {
        let header = BlockHeader {
            version: 1,
            prev_block_hash: [0u8; 32],
            merkle_root: [2u8; 32],
            timestamp: 42,
            height: 3,
            proof: vec![0xaa, 0xbb],
        };
        let block = Block {
            header,
            transactions: vec![Transaction {
                version: 1,
                inputs: vec![],
                outputs: vec![],
                lock_time: 0,
            }],
        };
        let mut buf = Vec::new();
        block.encode(&mut buf);
        let decoded = Block::decode(&mut std::io::Cursor::new(buf)).unwrap();
        assert_eq!(decoded, block);
    }
}
