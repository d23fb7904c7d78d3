//! elements-spv: a neutrino-style SPV light client for Elements-family
//! sidechains (Liquid and its testnets). Speaks the Elements P2P wire
//! protocol and BIP157/158 compact filters to track chain headers and scan
//! for watched scripts and outpoints without downloading full blocks.
//!
//! ## Layout
//!
//! - `codec` / `types` / `bip157` / `bip158`: wire primitives and the
//!   domain model (headers, transactions, filters).
//! - `network`: the protocol engine (C5) — peer registry, handshake,
//!   keepalive, message dispatch.
//! - `storage`: `BlockHeaderRepository` / `FilterRepository` trait
//!   interfaces plus an in-memory reference backend.
//! - `node`: top-level orchestration (`Node`), the header synchronizer
//!   (C6), the mempool tracker (C7), and the block service (C4).
//! - `scanner`: the watch-item model (C8), the scan request queue (C9),
//!   and the scanner engine (C10).
//! - `config`: immutable configuration, loadable from TOML or CLI flags.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod bip157;
pub mod bip158;
pub mod codec;
pub mod config;
pub mod network;
pub mod node;
pub mod scanner;
pub mod storage;
pub mod types;
pub mod utils;

pub use config::*;
pub use node::Node;
pub use types::{Block, BlockHeader, Hash, Transaction};
