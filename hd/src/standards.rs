// Descriptor wallet library extending bitcoin & miniscript functionality
// by LNP/BP Association (https://lnp-bp.org)
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

//! Derivation schemata based on BIP-43-related standards.

use core::str::FromStr;

use bitcoin::Network;
use slip132::KeyApplication;

use crate::{AccountPath, HardenedIndex, PathSegment};

/// Errors in parsing derivation scheme string representation
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Error, Display)]
#[display(doc_comments)]
pub enum ParseError {
    /// invalid blockchain name {0}; it must be one of `bitcoin`, `mainnet`,
    /// `testnet`, `signet` or `regtest`
    InvalidBlockchainName(String),

    /// derivation scheme `{0}` can't be recognized as one of BIP-43-based
    /// standards
    UnrecognizedBipScheme(String),

    /// BIP-48 scheme must have form of `bip48-nested`, `bip48-native` or
    /// `bip48-taproot`
    InvalidBip48Scheme,
}

/// Blockchain selected by the BIP-44 `coin_type` derivation path segment.
///
/// Signet and regtest use the testnet coin type.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
pub enum DerivationBlockchain {
    /// Bitcoin mainnet
    #[display("bitcoin")]
    Bitcoin,

    /// Any testnet blockchain
    #[display("testnet")]
    Testnet,
}

impl From<Network> for DerivationBlockchain {
    fn from(network: Network) -> Self {
        match network {
            Network::Bitcoin => DerivationBlockchain::Bitcoin,
            _ => DerivationBlockchain::Testnet,
        }
    }
}

impl DerivationBlockchain {
    /// Returns hardened `coin_type` index for the blockchain: `0'` for
    /// mainnet and `1'` for all test networks.
    #[inline]
    pub fn coin_type(self) -> HardenedIndex {
        match self {
            Self::Bitcoin => HardenedIndex(0),
            Self::Testnet => HardenedIndex(1),
        }
    }

    /// Tests whether given derivation blockchain is a testnet.
    pub fn is_testnet(self) -> bool { self == DerivationBlockchain::Testnet }
}

impl FromStr for DerivationBlockchain {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bitcoin" | "mainnet" => Ok(Self::Bitcoin),
            "testnet" | "signet" | "regtest" => Ok(Self::Testnet),
            wrong => Err(ParseError::InvalidBlockchainName(wrong.to_owned())),
        }
    }
}

/// Output descriptor templates which can be produced for BIP-43 standards.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
pub enum DescriptorType {
    /// Pay-to-pubkey-hash: `pkh(KEY)`
    #[display("pkh")]
    Pkh,

    /// P2WPKH nested in P2SH: `sh(wpkh(KEY))`
    #[display("sh-wpkh")]
    ShWpkh,

    /// Native P2WPKH: `wpkh(KEY)`
    #[display("wpkh")]
    Wpkh,

    /// Taproot key-path-only output: `tr(KEY)`
    #[display("tr")]
    Tr,

    /// Bare P2SH multisig: `sh(sortedmulti(M,KEY...))`
    #[display("sh-sortedmulti")]
    ShSortedMulti,

    /// P2WSH multisig nested in P2SH: `sh(wsh(sortedmulti(M,KEY...)))`
    #[display("sh-wsh-sortedmulti")]
    ShWshSortedMulti,

    /// Native P2WSH multisig: `wsh(sortedmulti(M,KEY...))`
    #[display("wsh-sortedmulti")]
    WshSortedMulti,
}

impl DescriptorType {
    /// Detects whether the descriptor uses `sortedmulti` script.
    pub fn is_multisig(self) -> bool {
        matches!(
            self,
            DescriptorType::ShSortedMulti
                | DescriptorType::ShWshSortedMulti
                | DescriptorType::WshSortedMulti
        )
    }

    /// Maximal number of keys which may be used by the descriptor.
    ///
    /// Multisig under bare P2SH is limited by the 520-byte redeem script size;
    /// witness scripts use the `CHECKMULTISIG` consensus limit.
    pub fn max_keys(self) -> usize {
        match self {
            DescriptorType::Pkh
            | DescriptorType::ShWpkh
            | DescriptorType::Wpkh
            | DescriptorType::Tr => 1,
            DescriptorType::ShSortedMulti => 15,
            DescriptorType::ShWshSortedMulti | DescriptorType::WshSortedMulti => 20,
        }
    }
}

/// Specific derivation scheme after BIP-43 standards
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "kebab-case")
)]
pub enum Bip43 {
    /// Account-based P2PKH derivation.
    ///
    /// `m / 44' / coin_type' / account'`
    #[display("bip44")]
    Bip44,

    /// Account-based legacy P2WPH-in-P2SH derivation.
    ///
    /// `m / 49' / coin_type' / account'`
    #[display("bip49")]
    Bip49,

    /// Account-based native P2WPKH derivation.
    ///
    /// `m / 84' / coin_type' / account'`
    #[display("bip84")]
    Bip84,

    /// Account-based single-key P2TR derivation.
    ///
    /// `m / 86' / coin_type' / account'`
    #[display("bip86")]
    Bip86,

    /// Multisig P2SH derivation. Has no coin type segment; the second
    /// segment is used as an account number.
    ///
    /// `m / 45' / account'`
    #[display("bip45")]
    Bip45,

    /// Account-based multisig derivation with sorted keys & P2WSH nested
    /// scripts
    ///
    /// `m / 48' / coin_type' / account' / 1'`
    #[display("bip48-nested")]
    Bip48Nested,

    /// Account-based multisig derivation with sorted keys & P2WSH native
    /// scripts
    ///
    /// `m / 48' / coin_type' / account' / 2'`
    #[display("bip48-native")]
    Bip48Native,

    /// Proposed BIP-48 extension for taproot multisig. Not standardized: the
    /// path is computable, but no descriptor template exists for it.
    ///
    /// `m / 48' / coin_type' / account' / 3'`
    #[display("bip48-taproot")]
    Bip48Taproot,
}

impl FromStr for Bip43 {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        let bip = s
            .strip_prefix("bip")
            .or_else(|| s.strip_prefix("m/"))
            .map(|bip| bip.trim_end_matches(|c| c == '\'' || c == 'h'));
        Ok(match bip {
            Some("44") => Bip43::Bip44,
            Some("49") => Bip43::Bip49,
            Some("84") => Bip43::Bip84,
            Some("86") => Bip43::Bip86,
            Some("45") => Bip43::Bip45,
            Some("48-nested") => Bip43::Bip48Nested,
            Some("48-native") => Bip43::Bip48Native,
            Some("48-taproot") => Bip43::Bip48Taproot,
            Some(bip48) if bip48.starts_with("48") => return Err(ParseError::InvalidBip48Scheme),
            Some(_) | None => return Err(ParseError::UnrecognizedBipScheme(s.clone())),
        })
    }
}

impl Bip43 {
    /// Get hardened index matching BIP-43 purpose value.
    pub fn purpose(self) -> HardenedIndex {
        HardenedIndex(match self {
            Bip43::Bip44 => 44,
            Bip43::Bip49 => 49,
            Bip43::Bip84 => 84,
            Bip43::Bip86 => 86,
            Bip43::Bip45 => 45,
            Bip43::Bip48Nested | Bip43::Bip48Native | Bip43::Bip48Taproot => 48,
        })
    }

    /// BIP-48 `script_type` discriminator, present only for BIP-48 schemes.
    pub fn script_type(self) -> Option<HardenedIndex> {
        match self {
            Bip43::Bip48Nested => Some(HardenedIndex(1)),
            Bip43::Bip48Native => Some(HardenedIndex(2)),
            Bip43::Bip48Taproot => Some(HardenedIndex(3)),
            _ => None,
        }
    }

    /// Detects whether the standard includes `coin_type` segment.
    pub fn has_coin_type(self) -> bool { self != Bip43::Bip45 }

    /// Constructs derivation path for the account-level extended key.
    pub fn to_account_path(
        self,
        blockchain: DerivationBlockchain,
        account: HardenedIndex,
    ) -> AccountPath {
        let mut path = AccountPath::new().with(self.purpose());
        if self.has_coin_type() {
            path = path.with(blockchain.coin_type());
        }
        path = path.with(account);
        match self.script_type() {
            Some(script_type) => path.with(script_type),
            None => path,
        }
    }

    /// Deduces derivation standard used by the provided derivation path, if
    /// possible.
    pub fn deduce(path: &AccountPath) -> Option<Bip43> {
        let purpose = match path.first() {
            Some(PathSegment::Hardened(purpose)) => *purpose,
            _ => return None,
        };
        Some(match purpose.0 {
            44 => Bip43::Bip44,
            49 => Bip43::Bip49,
            84 => Bip43::Bip84,
            86 => Bip43::Bip86,
            45 => Bip43::Bip45,
            48 => match path.get(3) {
                Some(PathSegment::Hardened(HardenedIndex(1))) => Bip43::Bip48Nested,
                Some(PathSegment::Hardened(HardenedIndex(2))) => Bip43::Bip48Native,
                Some(PathSegment::Hardened(HardenedIndex(3))) => Bip43::Bip48Taproot,
                _ => return None,
            },
            _ => return None,
        })
    }

    /// Returns [`DescriptorType`] produced for the standard. BIP-48 taproot
    /// has none.
    pub fn descriptor_type(self) -> Option<DescriptorType> {
        Some(match self {
            Bip43::Bip44 => DescriptorType::Pkh,
            Bip43::Bip49 => DescriptorType::ShWpkh,
            Bip43::Bip84 => DescriptorType::Wpkh,
            Bip43::Bip86 => DescriptorType::Tr,
            Bip43::Bip45 => DescriptorType::ShSortedMulti,
            Bip43::Bip48Nested => DescriptorType::ShWshSortedMulti,
            Bip43::Bip48Native => DescriptorType::WshSortedMulti,
            Bip43::Bip48Taproot => return None,
        })
    }

    /// Returns [`slip132::KeyApplication`] corresponding to the provided
    /// derivation standard.
    pub fn slip_application(self) -> Option<KeyApplication> {
        Some(match self {
            Bip43::Bip44 | Bip43::Bip45 => KeyApplication::Hashed,
            Bip43::Bip49 => KeyApplication::Nested,
            Bip43::Bip84 => KeyApplication::SegWit,
            Bip43::Bip48Nested => KeyApplication::NestedMultisig,
            Bip43::Bip48Native => KeyApplication::SegWitMultisig,
            Bip43::Bip86 | Bip43::Bip48Taproot => return None,
        })
    }

    /// Check whether provided SLIP-132 key application is expected for this
    /// derivation scheme. Plain `xpub`/`tpub` keys are accepted by any
    /// standard.
    pub fn check_slip_application(self, key_application: KeyApplication) -> bool {
        key_application == KeyApplication::Hashed
            || self.slip_application() == Some(key_application)
    }
}
