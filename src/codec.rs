//! Bit-exact wire codec for the Elements P2P message set: `VarInt`, the
//! 24-byte message header, and the `Encode`/`Decode` traits every payload
//! type implements.

use std::io::{self, Read, Write};

use crate::types::{double_sha256, Hash};

pub const MAX_MESSAGE_LENGTH: usize = 32 * 1024 * 1024;
const COMMAND_LEN: usize = 12;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("invalid magic bytes: {0:02x?}")]
    InvalidMagic([u8; 4]),
    #[error("invalid command: {0:?}")]
    InvalidCommand(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("short read")]
    ShortRead,
    #[error("payload length {0} exceeds limit {1}")]
    LengthExceedsLimit(u32, usize),
    #[error("malformed payload: {0}")]
    PayloadMalformed(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Bitcoin-style variable-length integer. `<0xFD` is a single raw byte;
/// `0xFD` + u16, `0xFE` + u32, `0xFF` + u64 follow, all little-endian
/// except the discriminator byte itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl VarInt {
    pub fn encode(self, out: &mut Vec<u8>) {
        match self.0 {
            n if n < 0xFD => out.push(n as u8),
            n if n <= 0xFFFF => {
                out.push(0xFD);
                out.extend_from_slice(&(n as u16).to_le_bytes());
            }
            n if n <= 0xFFFF_FFFF => {
                out.push(0xFE);
                out.extend_from_slice(&(n as u32).to_le_bytes());
            }
            n => {
                out.push(0xFF);
                out.extend_from_slice(&n.to_le_bytes());
            }
        }
    }

    pub fn decode(input: &mut impl Read) -> CodecResult<Self> {
        let discriminator = read_u8(input)?;
        let value = match discriminator {
            0xFD => read_u16(input)? as u64,
            0xFE => read_u32(input)? as u64,
            0xFF => read_u64(input)?,
            n => n as u64,
        };
        Ok(VarInt(value))
    }

    pub fn len_prefixed_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
        VarInt(bytes.len() as u64).encode(out);
        out.extend_from_slice(bytes);
    }

    pub fn read_len_prefixed_bytes(input: &mut impl Read) -> CodecResult<Vec<u8>> {
        let len = VarInt::decode(input)?.0 as usize;
        let mut buf = vec![0u8; len];
        input
            .read_exact(&mut buf)
            .map_err(|_| CodecError::ShortRead)?;
        Ok(buf)
    }
}

pub fn read_u8(input: &mut impl Read) -> CodecResult<u8> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf).map_err(|_| CodecError::ShortRead)?;
    Ok(buf[0])
}

pub fn read_u16(input: &mut impl Read) -> CodecResult<u16> {
    let mut buf = [0u8; 2];
    input.read_exact(&mut buf).map_err(|_| CodecError::ShortRead)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32(input: &mut impl Read) -> CodecResult<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf).map_err(|_| CodecError::ShortRead)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_u64(input: &mut impl Read) -> CodecResult<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf).map_err(|_| CodecError::ShortRead)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn read_i64(input: &mut impl Read) -> CodecResult<i64> {
    Ok(read_u64(input)? as i64)
}

pub fn read_hash(input: &mut impl Read) -> CodecResult<Hash> {
    let mut buf = [0u8; 32];
    input.read_exact(&mut buf).map_err(|_| CodecError::ShortRead)?;
    Ok(buf)
}

/// Checksum is the first 4 bytes of double-SHA-256(payload).
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = double_sha256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

fn command_bytes(command: &str) -> [u8; COMMAND_LEN] {
    let mut buf = [0u8; COMMAND_LEN];
    let bytes = command.as_bytes();
    let n = bytes.len().min(COMMAND_LEN);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

fn command_str(bytes: &[u8; COMMAND_LEN]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(COMMAND_LEN);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Fixed 24-byte message header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: [u8; 4],
    pub command: String,
    pub length: u32,
    pub checksum: [u8; 4],
}

impl MessageHeader {
    pub fn for_payload(magic: [u8; 4], command: &str, payload: &[u8]) -> Self {
        Self {
            magic,
            command: command.to_string(),
            length: payload.len() as u32,
            checksum: checksum(payload),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24);
        buf.extend_from_slice(&self.magic);
        buf.extend_from_slice(&command_bytes(&self.command));
        buf.extend_from_slice(&self.length.to_le_bytes());
        buf.extend_from_slice(&self.checksum);
        buf
    }

    pub fn decode(input: &mut impl Read) -> CodecResult<Self> {
        let mut magic = [0u8; 4];
        input
            .read_exact(&mut magic)
            .map_err(|_| CodecError::ShortRead)?;
        let mut command_raw = [0u8; COMMAND_LEN];
        input
            .read_exact(&mut command_raw)
            .map_err(|_| CodecError::ShortRead)?;
        let length = read_u32(input)?;
        let mut checksum = [0u8; 4];
        input
            .read_exact(&mut checksum)
            .map_err(|_| CodecError::ShortRead)?;
        Ok(Self {
            magic,
            command: command_str(&command_raw),
            length,
            checksum,
        })
    }

    /// Validate magic membership and the payload length bound. Checksum is
    /// validated separately once the payload has actually been read.
    pub fn validate_framing(&self, known_magics: &[[u8; 4]]) -> CodecResult<()> {
        if !known_magics.contains(&self.magic) {
            return Err(CodecError::InvalidMagic(self.magic));
        }
        if self.length as usize > MAX_MESSAGE_LENGTH {
            return Err(CodecError::LengthExceedsLimit(
                self.length,
                MAX_MESSAGE_LENGTH,
            ));
        }
        Ok(())
    }

    pub fn validate_checksum(&self, payload: &[u8]) -> CodecResult<()> {
        if checksum(payload) != self.checksum {
            return Err(CodecError::ChecksumMismatch);
        }
        Ok(())
    }
}

/// Implemented by every wire payload type plus the primitives the codec
/// needs (VarInt, fixed arrays, length-prefixed byte slices).
pub trait Encode {
    fn encode(&self, out: &mut Vec<u8>);
}

pub trait Decode: Sized {
    fn decode(input: &mut impl Read) -> CodecResult<Self>;
}

impl Encode for u8 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}
impl Decode for u8 {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        read_u8(input)
    }
}

impl Encode for u32 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}
impl Decode for u32 {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        read_u32(input)
    }
}

impl Encode for u64 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}
impl Decode for u64 {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        read_u64(input)
    }
}

impl Encode for Hash {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}
impl Decode for Hash {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        read_hash(input)
    }
}

/// A list of 32-byte block-locator hashes, VarInt-length-prefixed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLocators(pub Vec<Hash>);

impl Encode for BlockLocators {
    fn encode(&self, out: &mut Vec<u8>) {
        VarInt(self.0.len() as u64).encode(out);
        for hash in &self.0 {
            out.extend_from_slice(hash);
        }
    }
}

impl Decode for BlockLocators {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        let count = VarInt::decode(input)?.0 as usize;
        let mut hashes = Vec::with_capacity(count);
        for _ in 0..count {
            hashes.push(read_hash(input)?);
        }
        Ok(BlockLocators(hashes))
    }
}

/// Writes `value`'s `Encode` impl into a byte buffer from scratch.
pub fn encode_to_vec<T: Encode>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut buf);
    buf
}

pub fn write_all(writer: &mut impl Write, bytes: &[u8]) -> CodecResult<()> {
    writer.write_all(bytes).map_err(CodecError::Io)
}
