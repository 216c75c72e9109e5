// Copyright (c) 2026 Thor Mesh Contributors. MIT License.
// See LICENSE for details.

//! # Thor Mesh — Construction API Core
//!
//! Builds, parses, combines, hashes and submits VeChainThor transactions
//! through the Mesh (Rosetta) Construction API, and translates between
//! native clauses and Mesh operations.
//!
//! ## Architecture
//!
//! - **config** — Chain tags, native currencies, gas constants, [`ServiceConfig`].
//! - **error** — [`MeshError`] with stable codes and retriability.
//! - **address** — 20-byte account addresses.
//! - **crypto** — BLAKE2b, Keccak and secp256k1 recovery.
//! - **transaction** — Clauses, native transactions, the RLP codec, the
//!   clause ↔ operation mapper and the signing envelope.
//! - **client** — The chain node seam ([`ThorClient`]) with HTTP and
//!   in-memory implementations.
//! - **construction** — The eight-step pipeline and the `call` endpoint.
//!
//! ## Ground rules
//!
//! 1. Nothing is cached between requests.
//! 2. Every chain-node call is bounded by the configured timeout.
//! 3. Only chain-node failures are retriable.
//! 4. Decoding is strict: trailing bytes and unknown shapes are errors.

pub mod address;
pub mod client;
pub mod config;
pub mod construction;
pub mod crypto;
pub mod error;
pub mod transaction;

pub use address::Address;
pub use client::{HttpThorClient, MockThorClient, ThorClient};
pub use config::{Mode, ServiceConfig};
pub use construction::ConstructionService;
pub use error::{ApiError, MeshError, Result};
