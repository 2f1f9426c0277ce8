//! The wallet's error taxonomy.
//!
//! One flat enum; sub-crate errors fold into it at the session boundary.
//! Network and RPC failures are retried inside the node adapter before they
//! ever surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: u64, have: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("node error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("key image already spent")]
    DoubleSpend,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("value is not a canonical scalar")]
    ScalarInvalid,

    #[error("value is not a curve point")]
    PointInvalid,

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl From<salvium_light_rpc::RpcError> for WalletError {
    fn from(err: salvium_light_rpc::RpcError) -> Self {
        use salvium_light_rpc::RpcError;
        match err {
            RpcError::Rpc { code, message, .. } => WalletError::Rpc { code, message },
            RpcError::BadStatus { status, .. } => WalletError::Rpc {
                code: -1,
                message: status,
            },
            RpcError::Json { source, .. } => WalletError::Parse(source.to_string()),
            other => WalletError::Network(other.to_string()),
        }
    }
}

impl From<salvium_light_crypto::CryptoError> for WalletError {
    fn from(err: salvium_light_crypto::CryptoError) -> Self {
        match err {
            salvium_light_crypto::CryptoError::ScalarInvalid => WalletError::ScalarInvalid,
            salvium_light_crypto::CryptoError::PointInvalid => WalletError::PointInvalid,
        }
    }
}

impl From<salvium_light_tx::TxError> for WalletError {
    fn from(err: salvium_light_tx::TxError) -> Self {
        use salvium_light_tx::TxError;
        match err {
            TxError::InsufficientInputs { need, have } => {
                WalletError::InsufficientBalance { need, have }
            }
            TxError::NoDestinations => WalletError::InvalidInput("no destinations".into()),
            TxError::Crypto(e) => e.into(),
            other => WalletError::Internal(other.to_string()),
        }
    }
}

impl From<salvium_light_types::AddressError> for WalletError {
    fn from(err: salvium_light_types::AddressError) -> Self {
        use salvium_light_types::address::AddressError;
        match err {
            AddressError::Base58(salvium_light_types::base58::Base58Error::ChecksumMismatch) => {
                WalletError::ChecksumMismatch
            }
            other => WalletError::InvalidInput(other.to_string()),
        }
    }
}

impl From<salvium_light_storage::StoreError> for WalletError {
    fn from(err: salvium_light_storage::StoreError) -> Self {
        WalletError::Internal(err.to_string())
    }
}

impl From<salvium_light_types::mnemonic::MnemonicError> for WalletError {
    fn from(err: salvium_light_types::mnemonic::MnemonicError) -> Self {
        use salvium_light_types::mnemonic::MnemonicError;
        match err {
            MnemonicError::ChecksumMismatch { .. } => WalletError::ChecksumMismatch,
            other => WalletError::InvalidInput(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_error_mapping() {
        let err: WalletError =
            salvium_light_tx::TxError::InsufficientInputs { need: 10, have: 3 }.into();
        assert!(matches!(
            err,
            WalletError::InsufficientBalance { need: 10, have: 3 }
        ));
    }

    #[test]
    fn crypto_error_mapping() {
        let err: WalletError = salvium_light_crypto::CryptoError::PointInvalid.into();
        assert!(matches!(err, WalletError::PointInvalid));
    }

    #[test]
    fn address_checksum_maps_to_checksum_mismatch() {
        // Corrupt a valid address so only the checksum fails.
        let addr = salvium_light_types::Address::new(
            salvium_light_types::Network::Mainnet,
            salvium_light_types::AddressFormat::Legacy,
            salvium_light_types::AddressType::Standard,
            [1; 32],
            [2; 32],
        );
        let mut s = addr.encode().into_bytes();
        let last = s.len() - 1;
        s[last] = if s[last] == b'1' { b'2' } else { b'1' };
        let err: WalletError = salvium_light_types::Address::parse(
            std::str::from_utf8(&s).unwrap(),
        )
        .unwrap_err()
        .into();
        assert!(matches!(err, WalletError::ChecksumMismatch));
    }
}
