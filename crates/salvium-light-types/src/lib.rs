//! Foundational types for the Salvium light-wallet core: network and wire
//! constants, address encoding across all 18 variants, mnemonic seeds, and
//! the hard-fork policy table.

pub mod address;
pub mod base58;
pub mod constants;
pub mod mnemonic;
pub mod policy;
pub mod wordlists;

pub use address::{Address, AddressError};
pub use constants::{AddressFormat, AddressType, AssetType, Network, RctType, SigType, TxType};
pub use policy::{policy, ForkPolicy};
