//! Address parsing and construction for all 18 variants.

use crate::base58;
use crate::constants::{
    address_payload_size, address_tag, classify_tag, AddressFormat, AddressType, Network,
    KEY_SIZE, PAYMENT_ID_SIZE,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("empty address string")]
    Empty,

    #[error("implausible address length {0}")]
    BadLength(usize),

    #[error(transparent)]
    Base58(#[from] base58::Base58Error),

    #[error("unknown address tag 0x{0:x}")]
    UnknownTag(u64),

    #[error("payload must be {expected} bytes, got {actual}")]
    BadPayloadSize { expected: usize, actual: usize },

    #[error("integrated addresses require an 8-byte payment id")]
    MissingPaymentId,

    #[error("expected a {expected:?} address, got {actual:?}")]
    WrongType {
        expected: AddressType,
        actual: AddressType,
    },
}

/// A decoded address: classification plus raw keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub network: Network,
    pub format: AddressFormat,
    pub address_type: AddressType,
    pub spend_public_key: [u8; KEY_SIZE],
    pub view_public_key: [u8; KEY_SIZE],
    pub payment_id: Option<[u8; PAYMENT_ID_SIZE]>,
}

impl Address {
    /// Build a standard or subaddress-typed address from its keys.
    pub fn new(
        network: Network,
        format: AddressFormat,
        address_type: AddressType,
        spend_public_key: [u8; KEY_SIZE],
        view_public_key: [u8; KEY_SIZE],
    ) -> Self {
        Self {
            network,
            format,
            address_type,
            spend_public_key,
            view_public_key,
            payment_id: None,
        }
    }

    /// Parse and validate an address string.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        // Standard addresses land around 95-99 chars, integrated around 106-110.
        if s.len() < 90 || s.len() > 150 {
            return Err(AddressError::BadLength(s.len()));
        }

        let (tag, payload) = base58::decode_address(s)?;
        let (network, format, address_type, _) =
            classify_tag(tag).ok_or(AddressError::UnknownTag(tag))?;

        let expected = address_payload_size(address_type);
        if payload.len() != expected {
            return Err(AddressError::BadPayloadSize {
                expected,
                actual: payload.len(),
            });
        }

        let mut spend_public_key = [0u8; KEY_SIZE];
        spend_public_key.copy_from_slice(&payload[..KEY_SIZE]);
        let mut view_public_key = [0u8; KEY_SIZE];
        view_public_key.copy_from_slice(&payload[KEY_SIZE..KEY_SIZE * 2]);

        let payment_id = (address_type == AddressType::Integrated).then(|| {
            let mut pid = [0u8; PAYMENT_ID_SIZE];
            pid.copy_from_slice(&payload[KEY_SIZE * 2..]);
            pid
        });

        Ok(Self {
            network,
            format,
            address_type,
            spend_public_key,
            view_public_key,
            payment_id,
        })
    }

    /// Encode back to the canonical Base58 string.
    pub fn encode(&self) -> String {
        let tag = address_tag(self.network, self.format, self.address_type).tag;
        let mut payload = Vec::with_capacity(address_payload_size(self.address_type));
        payload.extend_from_slice(&self.spend_public_key);
        payload.extend_from_slice(&self.view_public_key);
        if let Some(pid) = &self.payment_id {
            payload.extend_from_slice(pid);
        }
        base58::encode_address(tag, &payload)
    }

    /// Attach a payment id, producing the integrated form.
    pub fn to_integrated(
        &self,
        payment_id: [u8; PAYMENT_ID_SIZE],
    ) -> Result<Address, AddressError> {
        if self.address_type != AddressType::Standard {
            return Err(AddressError::WrongType {
                expected: AddressType::Standard,
                actual: self.address_type,
            });
        }
        Ok(Address {
            address_type: AddressType::Integrated,
            payment_id: Some(payment_id),
            ..self.clone()
        })
    }

    /// Strip the payment id from an integrated address.
    pub fn to_standard(&self) -> Result<Address, AddressError> {
        if self.address_type != AddressType::Integrated {
            return Err(AddressError::WrongType {
                expected: AddressType::Integrated,
                actual: self.address_type,
            });
        }
        Ok(Address {
            address_type: AddressType::Standard,
            payment_id: None,
            ..self.clone()
        })
    }

    pub fn is_carrot(&self) -> bool {
        self.format == AddressFormat::Carrot
    }

    pub fn is_subaddress(&self) -> bool {
        self.address_type == AddressType::Subaddress
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Cheap validity predicate.
pub fn is_valid_address(s: &str) -> bool {
    Address::parse(s).is_ok()
}
