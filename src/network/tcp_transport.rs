//! TCP transport: the sole transport this client speaks. `connect` performs
//! a plain TCP dial; `read_header`/`read_payload`/`write` frame the stream
//! according to the wire codec in `crate::codec`. `into_split` hands the
//! read and write halves to separate tasks so a peer's read loop and its
//! keepalive/outbound writers never contend on the same lock.

use std::io::Cursor;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::codec::{CodecError, CodecResult, MessageHeader};

pub struct TcpTransport {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl TcpTransport {
    pub async fn connect(addr: SocketAddr) -> CodecResult<Self> {
        let stream = TcpStream::connect(addr).await.map_err(CodecError::Io)?;
        stream.set_nodelay(true).map_err(CodecError::Io)?;
        let peer_addr = stream.peer_addr().map_err(CodecError::Io)?;
        Ok(Self { stream, peer_addr })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub async fn read_header(&mut self) -> CodecResult<MessageHeader> {
        let mut buf = [0u8; 24];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(|_| CodecError::ShortRead)?;
        MessageHeader::decode(&mut Cursor::new(buf))
    }

    pub async fn read_payload(&mut self, n: u32) -> CodecResult<Vec<u8>> {
        let mut buf = vec![0u8; n as usize];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(|_| CodecError::ShortRead)?;
        Ok(buf)
    }

    pub async fn write(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.stream.write_all(bytes).await.map_err(CodecError::Io)
    }

    pub async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }

    /// Splits the stream into an owned reader and writer, handed to the
    /// peer's independent read loop and write task respectively.
    pub fn into_split(self, magic: [u8; 4]) -> (TcpReader, TcpWriter) {
        let peer_addr = self.peer_addr;
        let (read_half, write_half) = self.stream.into_split();
        (
            TcpReader {
                read_half,
                peer_addr,
                magic,
            },
            TcpWriter { write_half },
        )
    }
}

pub struct TcpReader {
    read_half: OwnedReadHalf,
    peer_addr: SocketAddr,
    magic: [u8; 4],
}

impl TcpReader {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    pub async fn read_header(&mut self) -> CodecResult<MessageHeader> {
        let mut buf = [0u8; 24];
        self.read_half
            .read_exact(&mut buf)
            .await
            .map_err(|_| CodecError::ShortRead)?;
        MessageHeader::decode(&mut Cursor::new(buf))
    }

    pub async fn read_payload(&mut self, n: u32) -> CodecResult<Vec<u8>> {
        let mut buf = vec![0u8; n as usize];
        self.read_half
            .read_exact(&mut buf)
            .await
            .map_err(|_| CodecError::ShortRead)?;
        Ok(buf)
    }
}

pub struct TcpWriter {
    write_half: OwnedWriteHalf,
}

impl TcpWriter {
    pub async fn write(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.write_half.write_all(bytes).await.map_err(CodecError::Io)
    }

    pub async fn shutdown(&mut self) {
        let _ = self.write_half.shutdown().await;
    }
}
