//! Wallet key management.
//!
//! One 32-byte seed yields both hierarchies: the legacy CryptoNote pair
//! (spend from the reduced seed, view from its Keccak image) and the full
//! CARROT tree. View-only wallets drop the spend-capable halves.

use curve25519_dalek::scalar::Scalar;

use salvium_light_crypto::carrot::CarrotKeys;
use salvium_light_crypto::{compress, keccak256, reduce32, scalar_mul_base};
use salvium_light_types::constants::{AddressFormat, AddressType, Network};
use salvium_light_types::wordlists::WordList;
use salvium_light_types::Address;

use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletType {
    /// Can scan and spend.
    Full,
    /// Can scan but not spend.
    ViewOnly,
}

/// Legacy CryptoNote key pair.
#[derive(Clone)]
pub struct CnKeys {
    pub spend_secret: Option<Scalar>,
    pub spend_public: [u8; 32],
    pub view_secret: Scalar,
    pub view_public: [u8; 32],
}

pub struct WalletKeys {
    pub wallet_type: WalletType,
    pub seed: Option<[u8; 32]>,
    pub cn: CnKeys,
    /// CARROT tier; absent for CN-only view wallets.
    pub carrot: Option<CarrotKeys>,
    pub network: Network,
}

impl WalletKeys {
    /// Full wallet from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32], network: Network) -> Self {
        let spend_secret = reduce32(&seed);
        let view_secret = reduce32(&keccak256(&spend_secret.to_bytes()));

        Self {
            wallet_type: WalletType::Full,
            seed: Some(seed),
            cn: CnKeys {
                spend_secret: Some(spend_secret),
                spend_public: compress(&scalar_mul_base(&spend_secret)),
                view_secret,
                view_public: compress(&scalar_mul_base(&view_secret)),
            },
            carrot: Some(CarrotKeys::from_master(&seed)),
            network,
        }
    }

    /// Full wallet from a 25-word phrase.
    pub fn from_mnemonic(
        phrase: &str,
        wordlist: &WordList,
        network: Network,
    ) -> Result<Self, WalletError> {
        let seed = salvium_light_types::mnemonic::mnemonic_to_seed(phrase, wordlist)?;
        Ok(Self::from_seed(seed, network))
    }

    /// Legacy view-only wallet (CN scanning only).
    pub fn view_only(
        view_secret: Scalar,
        spend_public: [u8; 32],
        network: Network,
    ) -> Self {
        Self {
            wallet_type: WalletType::ViewOnly,
            seed: None,
            cn: CnKeys {
                spend_secret: None,
                spend_public,
                view_secret,
                view_public: compress(&scalar_mul_base(&view_secret)),
            },
            carrot: None,
            network,
        }
    }

    /// View-only wallet that can also scan CARROT enotes.
    pub fn view_only_carrot(
        view_secret: Scalar,
        spend_public: [u8; 32],
        view_balance_secret: [u8; 32],
        account_spend_pubkey: [u8; 32],
        network: Network,
    ) -> Result<Self, WalletError> {
        let carrot = CarrotKeys::view_only(&view_balance_secret, &account_spend_pubkey)?;
        Ok(Self {
            wallet_type: WalletType::ViewOnly,
            seed: None,
            cn: CnKeys {
                spend_secret: None,
                spend_public,
                view_secret,
                view_public: compress(&scalar_mul_base(&view_secret)),
            },
            carrot: Some(carrot),
            network,
        })
    }

    pub fn random_seed() -> [u8; 32] {
        use rand::RngCore;
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        seed
    }

    /// 25-word phrase for the seed, in the given wordlist.
    pub fn to_mnemonic(&self, wordlist: &WordList) -> Option<String> {
        self.seed
            .map(|seed| salvium_light_types::mnemonic::seed_to_mnemonic(&seed, wordlist))
    }

    /// Primary legacy address.
    pub fn cn_address(&self) -> Address {
        Address::new(
            self.network,
            AddressFormat::Legacy,
            AddressType::Standard,
            self.cn.spend_public,
            self.cn.view_public,
        )
    }

    /// Primary CARROT address, when the tier is present.
    pub fn carrot_address(&self) -> Option<Address> {
        self.carrot.as_ref().map(|carrot| {
            Address::new(
                self.network,
                AddressFormat::Carrot,
                AddressType::Standard,
                carrot.account_spend_pubkey,
                carrot.account_view_pubkey,
            )
        })
    }

    pub fn can_spend(&self) -> bool {
        self.wallet_type == WalletType::Full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvium_light_types::wordlists::synthetic;

    #[test]
    fn derivation_is_deterministic() {
        let a = WalletKeys::from_seed([42u8; 32], Network::Testnet);
        let b = WalletKeys::from_seed([42u8; 32], Network::Testnet);
        assert_eq!(a.cn.spend_public, b.cn.spend_public);
        assert_eq!(a.cn.view_public, b.cn.view_public);
        assert_eq!(
            a.carrot.as_ref().unwrap().account_spend_pubkey,
            b.carrot.as_ref().unwrap().account_spend_pubkey
        );
    }

    #[test]
    fn view_key_is_keccak_of_spend_key() {
        let seed = [7u8; 32];
        let keys = WalletKeys::from_seed(seed, Network::Mainnet);
        let expected =
            reduce32(&keccak256(&keys.cn.spend_secret.unwrap().to_bytes()));
        assert_eq!(keys.cn.view_secret, expected);
    }

    #[test]
    fn seeds_diverge() {
        let a = WalletKeys::from_seed([1u8; 32], Network::Mainnet);
        let b = WalletKeys::from_seed([2u8; 32], Network::Mainnet);
        assert_ne!(a.cn.spend_public, b.cn.spend_public);
    }

    #[test]
    fn cn_and_carrot_hierarchies_differ() {
        let keys = WalletKeys::from_seed([9u8; 32], Network::Mainnet);
        assert_ne!(
            keys.cn.spend_public,
            keys.carrot.as_ref().unwrap().account_spend_pubkey
        );
    }

    #[test]
    fn addresses_carry_expected_prefixes() {
        let keys = WalletKeys::from_seed([99u8; 32], Network::Testnet);
        assert!(keys.cn_address().encode().starts_with("SaLvT"));
        assert!(keys.carrot_address().unwrap().encode().starts_with("SC1T"));
    }

    #[test]
    fn mnemonic_roundtrip_through_wallet() {
        let list = synthetic("test");
        let seed = WalletKeys::random_seed();
        let keys = WalletKeys::from_seed(seed, Network::Testnet);
        let phrase = keys.to_mnemonic(&list).unwrap();
        let restored = WalletKeys::from_mnemonic(&phrase, &list, Network::Testnet).unwrap();
        assert_eq!(restored.seed, Some(seed));
        assert_eq!(restored.cn.spend_public, keys.cn.spend_public);
    }

    #[test]
    fn view_only_wallets() {
        let full = WalletKeys::from_seed([10u8; 32], Network::Testnet);
        let view = WalletKeys::view_only(full.cn.view_secret, full.cn.spend_public, Network::Testnet);
        assert!(!view.can_spend());
        assert!(view.carrot.is_none());
        assert_eq!(view.cn.view_public, full.cn.view_public);

        let full_carrot = full.carrot.as_ref().unwrap();
        let view2 = WalletKeys::view_only_carrot(
            full.cn.view_secret,
            full.cn.spend_public,
            full_carrot.view_balance_secret,
            full_carrot.account_spend_pubkey,
            Network::Testnet,
        )
        .unwrap();
        let view2_carrot = view2.carrot.as_ref().unwrap();
        assert!(!view2_carrot.can_spend());
        assert_eq!(view2_carrot.account_view_pubkey, full_carrot.account_view_pubkey);
    }
}
