//! Transaction construction for the Salvium light wallet.
//!
//! The [`builder::TransactionBuilder`] assembles inputs, outputs, fee, and
//! the Salvium prefix extensions into an unsigned transaction;
//! [`sign::sign_transaction`] balances the commitments, proves ranges, and
//! rings each input with CLSAG or TCLSAG.

pub mod builder;
pub mod carrot;
pub mod decoy;
pub mod fee;
pub mod serialize;
pub mod sign;
pub mod types;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("no destinations")]
    NoDestinations,

    #[error("insufficient inputs: need {need}, have {have}")]
    InsufficientInputs { need: u64, have: u64 },

    #[error("ring size mismatch: expected {expected}, got {got}")]
    RingSizeMismatch { expected: usize, got: usize },

    #[error("decoy selection failed: {0}")]
    DecoySelection(String),

    #[error("CARROT output construction failed: {0}")]
    CarrotOutput(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Crypto(#[from] salvium_light_crypto::CryptoError),

    #[error("invalid transaction: {0}")]
    Invalid(String),
}
