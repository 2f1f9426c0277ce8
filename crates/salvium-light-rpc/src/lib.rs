//! Remote-node access for the Salvium light wallet.
//!
//! [`Node`] is the abstract surface the wallet core consumes; any transport
//! can implement it. The `transport` feature (default) provides the
//! reqwest-backed [`HttpNode`] with the standard retry policy: per-call
//! timeout, two retries, one-second initial delay.

pub mod error;
pub mod node;

#[cfg(feature = "transport")]
pub mod client;
#[cfg(feature = "transport")]
pub mod http_node;

pub use error::RpcError;
pub use node::{
    Block, BlockHeader, Node, NodeInfo, OutputIndexes, OutputInfo, OutputRef, SendRawTxResult,
    TransactionEntry,
};

#[cfg(feature = "transport")]
pub use client::{RpcClient, RpcConfig};
#[cfg(feature = "transport")]
pub use http_node::HttpNode;
