//! Network definitions, address prefixes, and wire constants.
//!
//! Reference: salvium/src/cryptonote_config.h, cryptonote_basic.h

use serde::{Deserialize, Serialize};

// =============================================================================
// Networks and address classification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
    Stagenet,
}

/// Address generation: legacy CryptoNote (SaLv...) or CARROT (SC1...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFormat {
    Legacy,
    Carrot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    Standard,
    Integrated,
    Subaddress,
}

/// Varint tag and human-readable prefix for one of the 18 address variants.
#[derive(Debug, Clone, Copy)]
pub struct AddressTag {
    pub tag: u64,
    pub text: &'static str,
}

/// Tag table: 3 networks x 2 formats x 3 types.
pub fn address_tag(network: Network, format: AddressFormat, addr_type: AddressType) -> AddressTag {
    use AddressFormat::*;
    use AddressType::*;
    use Network::*;
    let (tag, text) = match (network, format, addr_type) {
        (Mainnet, Legacy, Standard) => (0x3ef318, "SaLv"),
        (Mainnet, Legacy, Integrated) => (0x55ef318, "SaLvi"),
        (Mainnet, Legacy, Subaddress) => (0xf5ef318, "SaLvs"),
        (Mainnet, Carrot, Standard) => (0x180c96, "SC1"),
        (Mainnet, Carrot, Integrated) => (0x2ccc96, "SC1i"),
        (Mainnet, Carrot, Subaddress) => (0x314c96, "SC1s"),
        (Testnet, Legacy, Standard) => (0x15beb318, "SaLvT"),
        (Testnet, Legacy, Integrated) => (0xd055eb318, "SaLvTi"),
        (Testnet, Legacy, Subaddress) => (0xa59eb318, "SaLvTs"),
        (Testnet, Carrot, Standard) => (0x254c96, "SC1T"),
        (Testnet, Carrot, Integrated) => (0x1ac50c96, "SC1Ti"),
        (Testnet, Carrot, Subaddress) => (0x3c54c96, "SC1Ts"),
        (Stagenet, Legacy, Standard) => (0x149eb318, "SaLvS"),
        (Stagenet, Legacy, Integrated) => (0xf343eb318, "SaLvSi"),
        (Stagenet, Legacy, Subaddress) => (0x2d47eb318, "SaLvSs"),
        (Stagenet, Carrot, Standard) => (0x24cc96, "SC1S"),
        (Stagenet, Carrot, Integrated) => (0x1a848c96, "SC1Si"),
        (Stagenet, Carrot, Subaddress) => (0x384cc96, "SC1Ss"),
    };
    AddressTag { tag, text }
}

/// Reverse lookup: tag value back to its (network, format, type) triple.
pub fn classify_tag(tag: u64) -> Option<(Network, AddressFormat, AddressType, &'static str)> {
    use AddressFormat::*;
    use AddressType::*;
    use Network::*;
    for network in [Mainnet, Testnet, Stagenet] {
        for format in [Legacy, Carrot] {
            for addr_type in [Standard, Integrated, Subaddress] {
                let at = address_tag(network, format, addr_type);
                if at.tag == tag {
                    return Some((network, format, addr_type, at.text));
                }
            }
        }
    }
    None
}

// =============================================================================
// Sizes
// =============================================================================

pub const KEY_SIZE: usize = 32;
pub const CHECKSUM_SIZE: usize = 4;
pub const PAYMENT_ID_SIZE: usize = 8;

/// Address payload size (after the varint tag, before the checksum).
pub fn address_payload_size(addr_type: AddressType) -> usize {
    match addr_type {
        AddressType::Integrated => KEY_SIZE * 2 + PAYMENT_ID_SIZE,
        _ => KEY_SIZE * 2,
    }
}

// =============================================================================
// Transaction and RingCT types
// =============================================================================

/// Salvium transaction type.
///
/// Reference: salvium/src/cryptonote_basic/cryptonote_basic.h
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum TxType {
    Unset = 0,
    Miner = 1,
    Protocol = 2,
    Transfer = 3,
    Convert = 4,
    Burn = 5,
    Stake = 6,
    Return = 7,
}

impl TxType {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0 => Some(Self::Unset),
            1 => Some(Self::Miner),
            2 => Some(Self::Protocol),
            3 => Some(Self::Transfer),
            4 => Some(Self::Convert),
            5 => Some(Self::Burn),
            6 => Some(Self::Stake),
            7 => Some(Self::Return),
            _ => None,
        }
    }
}

impl std::fmt::Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unset => "UNSET",
            Self::Miner => "MINER",
            Self::Protocol => "PROTOCOL",
            Self::Transfer => "TRANSFER",
            Self::Convert => "CONVERT",
            Self::Burn => "BURN",
            Self::Stake => "STAKE",
            Self::Return => "RETURN",
        };
        write!(f, "{}", name)
    }
}

/// RingCT signature type.
///
/// Reference: salvium/src/ringct/rctTypes.h
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RctType {
    Null = 0,
    BulletproofPlus = 6,
    FullProofs = 7,
    SalviumZero = 8,
    SalviumOne = 9,
}

impl RctType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Null),
            6 => Some(Self::BulletproofPlus),
            7 => Some(Self::FullProofs),
            8 => Some(Self::SalviumZero),
            9 => Some(Self::SalviumOne),
            _ => None,
        }
    }
}

/// Ring signature scheme implied by the RCT type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigType {
    Clsag,
    Tclsag,
}

// =============================================================================
// Asset types
// =============================================================================

/// Ledger asset tag. `Sal` pre-HF6, `Sal1` from HF6; `Vsd` is the convert
/// counter-asset and `Burn` the sink sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    Sal,
    Sal1,
    Vsd,
    Burn,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sal => "SAL",
            Self::Sal1 => "SAL1",
            Self::Vsd => "VSD",
            Self::Burn => "BURN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SAL" => Some(Self::Sal),
            "SAL1" => Some(Self::Sal1),
            "VSD" => Some(Self::Vsd),
            "BURN" => Some(Self::Burn),
            _ => None,
        }
    }

    /// SAL and SAL1 are the same native asset; SAL1 is the post-HF6 rename.
    pub fn equivalent(a: AssetType, b: AssetType) -> bool {
        let native = |x| matches!(x, AssetType::Sal | AssetType::Sal1);
        a == b || (native(a) && native(b))
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Hard forks and per-network configuration
// =============================================================================

/// Hard fork numbers that gate light-wallet behaviour.
pub struct Hf;

impl Hf {
    pub const N_OUTS: u8 = 2;
    pub const FULL_PROOFS: u8 = 3;
    pub const SAL1: u8 = 6;
    pub const CARROT: u8 = 10;
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub network: Network,
    /// (fork version, activation height), ascending.
    pub hard_fork_heights: &'static [(u8, u64)],
    /// Blocks a STAKE output stays locked.
    pub stake_lock_period: u64,
}

static MAINNET_HF_HEIGHTS: [(u8, u64); 10] = [
    (1, 1),
    (2, 89_800),
    (3, 121_100),
    (4, 121_800),
    (5, 136_100),
    (6, 154_750),
    (7, 161_900),
    (8, 172_000),
    (9, 179_200),
    (10, 334_750),
];

static TESTNET_HF_HEIGHTS: [(u8, u64); 10] = [
    (1, 1),
    (2, 250),
    (3, 500),
    (4, 600),
    (5, 800),
    (6, 815),
    (7, 900),
    (8, 950),
    (9, 1000),
    (10, 1100),
];

pub static MAINNET_CONFIG: NetworkConfig = NetworkConfig {
    network: Network::Mainnet,
    hard_fork_heights: &MAINNET_HF_HEIGHTS,
    stake_lock_period: 21_600, // 30 days of 120 s blocks
};

pub static TESTNET_CONFIG: NetworkConfig = NetworkConfig {
    network: Network::Testnet,
    hard_fork_heights: &TESTNET_HF_HEIGHTS,
    stake_lock_period: 20,
};

pub static STAGENET_CONFIG: NetworkConfig = NetworkConfig {
    network: Network::Stagenet,
    hard_fork_heights: &TESTNET_HF_HEIGHTS,
    stake_lock_period: 20,
};

pub fn network_config(network: Network) -> &'static NetworkConfig {
    match network {
        Network::Mainnet => &MAINNET_CONFIG,
        Network::Testnet => &TESTNET_CONFIG,
        Network::Stagenet => &STAGENET_CONFIG,
    }
}

// =============================================================================
// Wire and timing constants
// =============================================================================

/// Ring size 11: the real output plus 10 decoys.
pub const DEFAULT_RING_SIZE: usize = 11;

/// Target seconds between blocks.
pub const DIFFICULTY_TARGET_V2: u64 = 120;

/// Blocks whose timestamp median gates admission of a new tip.
pub const BLOCKCHAIN_TIMESTAMP_CHECK_WINDOW: usize = 60;

/// Maximum allowed future timestamp offset (2 hours).
pub const BLOCK_FUTURE_TIME_LIMIT: u64 = 60 * 60 * 2;

/// Mempool lifetime for transactions resurrected from alt blocks (1 week).
pub const MEMPOOL_TX_FROM_ALT_BLOCK_LIVETIME: u64 = 604_800;

/// Coinbase maturity window (blocks).
pub const MINED_MONEY_UNLOCK_WINDOW: u64 = 60;

/// Minimum age of a regular output before it may be spent (blocks).
pub const DEFAULT_TX_SPENDABLE_AGE: u64 = 10;

/// Per-byte fee floor.
pub const FEE_PER_BYTE: u64 = 30;

/// Hard ceiling on serialized transaction weight.
pub const MAX_TX_WEIGHT: usize = 149_400;

/// Sweep input cap keeping the signed blob under `MAX_TX_WEIGHT`.
pub const SWEEP_MAX_INPUTS: usize = 60;

/// Subaddress lookahead grid, major x minor.
pub const SUBADDRESS_MAJOR_LOOKAHEAD: u32 = 50;
pub const SUBADDRESS_MINOR_LOOKAHEAD: u32 = 200;

/// The scalar 1: commitment mask of every coinbase output.
pub const IDENTITY_MASK: [u8; 32] = {
    let mut m = [0u8; 32];
    m[0] = 0x01;
    m
};

// =============================================================================
// Amounts
// =============================================================================

/// Atomic units per coin (10^8).
pub const COIN: u64 = 100_000_000;

/// Render an atomic amount with trailing zeros trimmed (e.g. `1.23456789`).
pub fn format_amount(atomic: u64) -> String {
    let whole = atomic / COIN;
    let frac = atomic % COIN;
    if frac == 0 {
        format!("{}.0", whole)
    } else {
        let frac = format!("{:08}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

/// Parse a decimal amount string to atomic units. At most 8 fraction digits.
pub fn parse_amount(s: &str) -> Option<u64> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    let whole: u64 = whole.parse().ok()?;
    let frac: u64 = if frac.is_empty() {
        0
    } else if frac.len() > 8 {
        return None;
    } else {
        format!("{:0<8}", frac).parse().ok()?
    };
    whole.checked_mul(COIN)?.checked_add(frac)
}
