//! Height-to-protocol decision table.
//!
//! One pure function maps a block height to everything the builder and
//! scanner need to agree with consensus: hard-fork version, transaction
//! version, RingCT type, ring-signature scheme, native asset tag, and
//! whether CARROT addressing is live.
//!
//! Reference: salvium/src/cryptonote_config.h, hardforks.cpp

use crate::constants::{network_config, AssetType, Hf, Network, RctType, SigType, TxType};

/// Everything fork-dependent, resolved for one height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkPolicy {
    pub hf_version: u8,
    pub rct_type: RctType,
    pub sig_type: SigType,
    pub asset_type: AssetType,
    pub carrot_active: bool,
}

impl ForkPolicy {
    /// Transaction version for a given transaction type at this fork.
    ///
    /// TRANSFER gained N-output support (version 3) at HF2; everything moves
    /// to version 4 with CARROT. STAKE/BURN/CONVERT stay at version 2 until
    /// then.
    pub fn tx_version(&self, tx_type: TxType) -> u8 {
        if self.hf_version >= Hf::CARROT {
            4
        } else if tx_type == TxType::Transfer && self.hf_version >= Hf::N_OUTS {
            3
        } else {
            2
        }
    }
}

/// Hard-fork version active at `height`.
pub fn hf_version_at(height: u64, network: Network) -> u8 {
    let mut active = 1u8;
    for &(version, activation) in network_config(network).hard_fork_heights {
        if height >= activation && version > active {
            active = version;
        }
    }
    active
}

/// Resolve the full policy for `height`.
pub fn policy(height: u64, network: Network) -> ForkPolicy {
    let hf_version = hf_version_at(height, network);

    let rct_type = if hf_version >= Hf::CARROT {
        RctType::SalviumOne
    } else if hf_version >= Hf::SAL1 {
        RctType::SalviumZero
    } else if hf_version >= Hf::FULL_PROOFS {
        RctType::FullProofs
    } else {
        RctType::BulletproofPlus
    };

    ForkPolicy {
        hf_version,
        rct_type,
        sig_type: if rct_type >= RctType::SalviumOne {
            SigType::Tclsag
        } else {
            SigType::Clsag
        },
        asset_type: if hf_version >= Hf::SAL1 {
            AssetType::Sal1
        } else {
            AssetType::Sal
        },
        carrot_active: hf_version >= Hf::CARROT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testnet_matrix() {
        let p = policy(100, Network::Testnet);
        assert_eq!(p.hf_version, 1);
        assert_eq!(p.tx_version(TxType::Transfer), 2);
        assert_eq!(p.rct_type, RctType::BulletproofPlus);
        assert_eq!(p.sig_type, SigType::Clsag);
        assert_eq!(p.asset_type, AssetType::Sal);
        assert!(!p.carrot_active);

        let p = policy(250, Network::Testnet);
        assert_eq!(p.hf_version, 2);
        assert_eq!(p.tx_version(TxType::Transfer), 3);
        assert_eq!(p.rct_type, RctType::BulletproofPlus);

        let p = policy(500, Network::Testnet);
        assert_eq!(p.hf_version, 3);
        assert_eq!(p.rct_type, RctType::FullProofs);
        assert_eq!(p.sig_type, SigType::Clsag);

        let p = policy(815, Network::Testnet);
        assert_eq!(p.hf_version, 6);
        assert_eq!(p.tx_version(TxType::Transfer), 3);
        assert_eq!(p.rct_type, RctType::SalviumZero);
        assert_eq!(p.sig_type, SigType::Clsag);
        assert_eq!(p.asset_type, AssetType::Sal1);

        let p = policy(1100, Network::Testnet);
        assert_eq!(p.hf_version, 10);
        assert_eq!(p.tx_version(TxType::Transfer), 4);
        assert_eq!(p.rct_type, RctType::SalviumOne);
        assert_eq!(p.sig_type, SigType::Tclsag);
        assert_eq!(p.asset_type, AssetType::Sal1);
        assert!(p.carrot_active);
    }

    #[test]
    fn non_transfer_versions() {
        let pre = policy(900, Network::Testnet);
        assert_eq!(pre.tx_version(TxType::Stake), 2);
        assert_eq!(pre.tx_version(TxType::Burn), 2);
        assert_eq!(pre.tx_version(TxType::Convert), 2);

        let post = policy(1100, Network::Testnet);
        assert_eq!(post.tx_version(TxType::Stake), 4);
        assert_eq!(post.tx_version(TxType::Burn), 4);
        assert_eq!(post.tx_version(TxType::Convert), 4);
    }

    #[test]
    fn policy_is_monotone_in_height() {
        let mut last_hf = 0;
        for h in (0..1500).step_by(25) {
            let p = policy(h, Network::Testnet);
            assert!(p.hf_version >= last_hf);
            last_hf = p.hf_version;
        }
    }

    #[test]
    fn mainnet_heights_differ_from_testnet() {
        assert_eq!(policy(1100, Network::Mainnet).hf_version, 1);
        assert_eq!(policy(334_750, Network::Mainnet).hf_version, 10);
        assert!(policy(334_750, Network::Mainnet).carrot_active);
    }
}
