//! Wallet core for Salvium: key hierarchies, output scanning, reorg-safe
//! sync, balances, and the transfer/sweep/stake/burn/convert entry points.
//!
//! The session is generic over the [`salvium_light_rpc::Node`] transport and
//! the [`salvium_light_storage::WalletStore`] backend; the crate itself
//! never blocks on anything but node calls.

pub mod cancel;
pub mod error;
pub mod keys;
pub mod scanner;
pub mod session;
pub mod sync;
pub mod utxo;

pub use cancel::CancelToken;
pub use error::WalletError;
pub use keys::{WalletKeys, WalletType};
pub use scanner::ScanContext;
pub use session::{Balance, TransferOptions, TransferResult, Wallet};
pub use sync::{SyncEvent, SyncOutcome};
