//! Elements P2P message payloads: the wire shapes the protocol engine
//! sends and dispatches, built on the primitives in `crate::codec`.

use std::io::Read;

use crate::bip157::{CFilter, GetCfilters};
use crate::codec::{
    read_hash, read_i64, read_u32, read_u64, read_u8, BlockLocators, CodecError, CodecResult,
    Decode, Encode, VarInt,
};
use crate::types::{BlockHeader, Hash, Transaction};

pub const PROTOCOL_VERSION: u32 = 70016;

pub const CMD_VERSION: &str = "version";
pub const CMD_VERACK: &str = "verack";
pub const CMD_PING: &str = "ping";
pub const CMD_PONG: &str = "pong";
pub const CMD_GETHEADERS: &str = "getheaders";
pub const CMD_HEADERS: &str = "headers";
pub const CMD_GETCFILTERS: &str = "getcfilters";
pub const CMD_CFILTER: &str = "cfilter";
pub const CMD_BLOCK: &str = "block";
pub const CMD_TX: &str = "tx";
pub const CMD_INV: &str = "inv";
pub const CMD_GETDATA: &str = "getdata";
pub const CMD_SENDCMPCT: &str = "sendcmpct";
pub const CMD_SENDHEADERS: &str = "sendheaders";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAddress {
    pub services: u64,
    pub ip: [u8; 16],
    pub port: u16,
}

impl Encode for NetworkAddress {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.ip);
        out.extend_from_slice(&self.port.to_be_bytes());
    }
}

impl Decode for NetworkAddress {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        let services = read_u64(input)?;
        let mut ip = [0u8; 16];
        input.read_exact(&mut ip).map_err(|_| CodecError::ShortRead)?;
        let mut port_bytes = [0u8; 2];
        input
            .read_exact(&mut port_bytes)
            .map_err(|_| CodecError::ShortRead)?;
        Ok(NetworkAddress {
            services,
            ip,
            port: u16::from_be_bytes(port_bytes),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: u32,
    pub services: u64,
    pub timestamp: i64,
    pub addr_recv: NetworkAddress,
    pub addr_from: NetworkAddress,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: u32,
    pub relay: bool,
}

impl Encode for VersionMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        self.addr_recv.encode(out);
        self.addr_from.encode(out);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        VarInt::len_prefixed_bytes(out, self.user_agent.as_bytes());
        out.extend_from_slice(&self.start_height.to_le_bytes());
        out.push(self.relay as u8);
    }
}

impl Decode for VersionMessage {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        Ok(VersionMessage {
            version: read_u32(input)?,
            services: read_u64(input)?,
            timestamp: read_i64(input)?,
            addr_recv: NetworkAddress::decode(input)?,
            addr_from: NetworkAddress::decode(input)?,
            nonce: read_u64(input)?,
            user_agent: String::from_utf8_lossy(&VarInt::read_len_prefixed_bytes(input)?)
                .into_owned(),
            start_height: read_u32(input)?,
            relay: read_u8(input)? != 0,
        })
    }
}

/// Messages with no payload: `verack` and `sendheaders`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyMessage;

impl Encode for EmptyMessage {
    fn encode(&self, _out: &mut Vec<u8>) {}
}
impl Decode for EmptyMessage {
    fn decode(_input: &mut impl Read) -> CodecResult<Self> {
        Ok(EmptyMessage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingMessage {
    pub nonce: u64,
}
impl Encode for PingMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.nonce.to_le_bytes());
    }
}
impl Decode for PingMessage {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        Ok(PingMessage {
            nonce: read_u64(input)?,
        })
    }
}

pub type PongMessage = PingMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetHeadersMessage {
    pub version: u32,
    pub locator: BlockLocators,
    pub stop_hash: Hash,
}

impl Encode for GetHeadersMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        self.locator.encode(out);
        out.extend_from_slice(&self.stop_hash);
    }
}

impl Decode for GetHeadersMessage {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        Ok(GetHeadersMessage {
            version: read_u32(input)?,
            locator: BlockLocators::decode(input)?,
            stop_hash: read_hash(input)?,
        })
    }
}

/// The wire form of a header in a `headers` message additionally carries a
/// trailing VarInt transaction count (always 0 for a headers-only reply,
/// per the Bitcoin-derived convention this client relies on).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersMessage {
    pub headers: Vec<BlockHeader>,
}

impl Encode for HeadersMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        VarInt(self.headers.len() as u64).encode(out);
        for header in &self.headers {
            header.encode(out);
            VarInt(0).encode(out); // tx_count
        }
    }
}

impl Decode for HeadersMessage {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        let count = VarInt::decode(input)?.0 as usize;
        let mut headers = Vec::with_capacity(count);
        for _ in 0..count {
            let header = BlockHeader::decode(input)?;
            let _tx_count = VarInt::decode(input)?;
            headers.push(header);
        }
        Ok(HeadersMessage { headers })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    pub kind: u32,
    pub hash: Hash,
}

impl Encode for InventoryItem {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(&self.hash);
    }
}
impl Decode for InventoryItem {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        Ok(InventoryItem {
            kind: read_u32(input)?,
            hash: read_hash(input)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvMessage {
    pub items: Vec<InventoryItem>,
}

impl Encode for InvMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        VarInt(self.items.len() as u64).encode(out);
        for item in &self.items {
            item.encode(out);
        }
    }
}
impl Decode for InvMessage {
    fn decode(input: &mut impl Read) -> CodecResult<Self> {
        let count = VarInt::decode(input)?.0 as usize;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(InventoryItem::decode(input)?);
        }
        Ok(InvMessage { items })
    }
}

pub type GetDataMessage = InvMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMessage {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

/// Inbound protocol messages this client dispatches on, once framed and
/// decoded. The `Unknown` variant covers the skip-unknown-command path and
/// carries the already-drained payload length only, never the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMessage {
    Version(VersionMessage),
    VerAck,
    Ping(PingMessage),
    Pong(PongMessage),
    GetHeaders(GetHeadersMessage),
    Headers(HeadersMessage),
    GetCfilters(GetCfilters),
    CFilter(CFilter),
    Block(Box<BlockMessage>),
    Tx(Transaction),
    Inv(InvMessage),
    GetData(GetDataMessage),
    SendCmpct,
    SendHeaders,
    Unknown { command: String, length: u32 },
}

impl NetworkMessage {
    pub fn command(&self) -> &str {
        match self {
            NetworkMessage::Version(_) => CMD_VERSION,
            NetworkMessage::VerAck => CMD_VERACK,
            NetworkMessage::Ping(_) => CMD_PING,
            NetworkMessage::Pong(_) => CMD_PONG,
            NetworkMessage::GetHeaders(_) => CMD_GETHEADERS,
            NetworkMessage::Headers(_) => CMD_HEADERS,
            NetworkMessage::GetCfilters(_) => CMD_GETCFILTERS,
            NetworkMessage::CFilter(_) => CMD_CFILTER,
            NetworkMessage::Block(_) => CMD_BLOCK,
            NetworkMessage::Tx(_) => CMD_TX,
            NetworkMessage::Inv(_) => CMD_INV,
            NetworkMessage::GetData(_) => CMD_GETDATA,
            NetworkMessage::SendCmpct => CMD_SENDCMPCT,
            NetworkMessage::SendHeaders => CMD_SENDHEADERS,
            NetworkMessage::Unknown { command, .. } => command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn addr() -> NetworkAddress {
        NetworkAddress {
            services: crate::bip157::NODE_COMPACT_FILTERS,
            ip: [0u8; 16],
            port: 18886,
        }
    }

    #[test]
    fn version_message_round_trips() {
        let msg = VersionMessage {
            version: PROTOCOL_VERSION,
            services: crate::bip157::NODE_COMPACT_FILTERS,
            timestamp: 1_700_000_000,
            addr_recv: addr(),
            addr_from: addr(),
            nonce: 0xdeadbeefcafef00d,
            user_agent: "/elements-spv:0.1/".to_string(),
            start_height: 12,
            relay: false,
        };
        let mut buf = Vec::new();
        msg.encode(&mut buf);
        let decoded = VersionMessage::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn headers_message_round_trips_and_preserves_order() {
        let h1 = BlockHeader {
            version: 1,
            prev_block_hash: [0u8; 32],
            merkle_root: [1u8; 32],
            timestamp: 1,
            height: 1,
            proof: vec![0xaa],
        };
        let h2 = BlockHeader {
            version: 1,
            prev_block_hash: h1.hash(),
            merkle_root: [2u8; 32],
            timestamp: 2,
            height: 2,
            proof: vec![0xbb, 0xcc],
        };
        let msg = HeadersMessage {
            headers: vec![h1, h2],
        };
        let mut buf = Vec::new();
        msg.encode(&mut buf);
        let decoded = HeadersMessage::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn getheaders_round_trips_with_locator() {
        let msg = GetHeadersMessage {
            version: PROTOCOL_VERSION,
            locator: BlockLocators(vec![[1u8; 32], [2u8; 32]]),
            stop_hash: [0u8; 32],
        };
        let mut buf = Vec::new();
        msg.encode(&mut buf);
        let decoded = GetHeadersMessage::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn ping_pong_round_trip() {
        let msg = PingMessage { nonce: 42 };
        let mut buf = Vec::new();
        msg.encode(&mut buf);
        let decoded = PongMessage::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn inv_message_round_trips() {
        let msg = InvMessage {
            items: vec![
                InventoryItem { kind: 1, hash: [1u8; 32] },
                InventoryItem { kind: 2, hash: [2u8; 32] },
            ],
        };
        let mut buf = Vec::new();
        msg.encode(&mut buf);
        let decoded = InvMessage::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, msg);
    }
}
