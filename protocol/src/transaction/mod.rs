//! # Transaction Module
//!
//! Native transactions, their wire codec, and the translation between
//! clauses and Mesh operations.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        — Operation, Amount, Currency and quantity helpers
//! clause.rs       — Clause and the ClauseLike capability trait
//! abi.rs          — transfer/symbol/decimals calldata
//! builder.rs      — native Transaction and TransactionBuilder
//! codec.rs        — strict RLP encoding (legacy and dynamic-fee)
//! signing.rs      — signing hashes, signing, signer recovery
//! verification.rs — signatures checked against declared signers
//! mesh.rs         — MeshTransaction envelope and signer derivation
//! currency.rs     — CurrencyResolver and TokenRegistry
//! mapper.rs       — clauses → operations
//! options.rs      — descriptors/operations → clauses
//! extractor.rs    — origin, delegator and transfer queries over operations
//! ```
//!
//! ## Life cycle
//!
//! 1. **Intent** — operations become clauses ([`clauses_from_operations`]).
//! 2. **Build** — [`TransactionBuilder`] assembles the unsigned transaction.
//! 3. **Wrap** — [`MeshTransaction`] records origin and delegator beside it.
//! 4. **Sign** — each signer signs its payload out of band.
//! 5. **Combine** — signatures are attached and verified positionally.
//! 6. **Read back** — [`map_clauses`] turns any transaction back into
//!    operations.

pub mod abi;
pub mod builder;
pub mod clause;
pub mod codec;
pub mod currency;
pub mod extractor;
pub mod mapper;
pub mod mesh;
pub mod options;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{intrinsic_gas, FeeParams, Reserved, Transaction, TransactionBuilder};
pub use clause::{Clause, ClauseLike};
pub use currency::{parse_token_list, CurrencyResolver, TokenRegistry};
pub use mapper::{analyze_clauses, map_clauses, operations_for_api_transaction, ClauseAnalysis};
pub use mesh::{derive_signers_and_operations, MeshTransaction};
pub use options::{build_clauses, clauses_from_operations};
pub use signing::{sign_delegated, sign_transaction};
pub use types::{Amount, Currency, Operation, OperationStatus, OperationType};
pub use verification::verify_signers;
