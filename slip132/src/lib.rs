// SLIP-132 library for parsing custom xpub key formats
// Written in 2021 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the Apache 2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

//! SLIP-132 extended public key versions.
//!
//! Hardware wallets export account-level keys with version bytes signalling
//! the script type they are meant for (`ypub`, `zpub`, `Zpub` etc). Bitcoin
//! Core descriptors and BIP-32 derivation only know about `xpub` and `tpub`,
//! so every key entering the wallet is normalized here while its network
//! family and intended application are still known.

// Coding conventions
#![recursion_limit = "256"]
#![deny(dead_code, missing_docs)]

#[macro_use]
extern crate amplify;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use bitcoin::util::base58;
use bitcoin::util::bip32::{self, ExtendedPubKey};
use bitcoin::Network;

/// Magical version bytes for xpub: bitcoin mainnet public key for P2PKH or P2SH
pub const VERSION_MAGIC_XPUB: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
/// Magical version bytes for ypub: bitcoin mainnet public key for P2WPKH in
/// P2SH
pub const VERSION_MAGIC_YPUB: [u8; 4] = [0x04, 0x9D, 0x7C, 0xB2];
/// Magical version bytes for zpub: bitcoin mainnet public key for P2WPKH
pub const VERSION_MAGIC_ZPUB: [u8; 4] = [0x04, 0xB2, 0x47, 0x46];
/// Magical version bytes for Ypub: bitcoin mainnet public key for
/// multi-signature P2WSH in P2SH
pub const VERSION_MAGIC_YPUB_MULTISIG: [u8; 4] = [0x02, 0x95, 0xb4, 0x3f];
/// Magical version bytes for Zpub: bitcoin mainnet public key for
/// multi-signature P2WSH
pub const VERSION_MAGIC_ZPUB_MULTISIG: [u8; 4] = [0x02, 0xaa, 0x7e, 0xd3];

/// Magical version bytes for tpub: bitcoin testnet/regtest public key for
/// P2PKH or P2SH
pub const VERSION_MAGIC_TPUB: [u8; 4] = [0x04, 0x35, 0x87, 0xCF];
/// Magical version bytes for upub: bitcoin testnet/regtest public key for
/// P2WPKH in P2SH
pub const VERSION_MAGIC_UPUB: [u8; 4] = [0x04, 0x4A, 0x52, 0x62];
/// Magical version bytes for vpub: bitcoin testnet/regtest public key for
/// P2WPKH
pub const VERSION_MAGIC_VPUB: [u8; 4] = [0x04, 0x5F, 0x1C, 0xF6];
/// Magical version bytes for Upub: bitcoin testnet/regtest public key for
/// multi-signature P2WSH in P2SH
pub const VERSION_MAGIC_UPUB_MULTISIG: [u8; 4] = [0x02, 0x42, 0x89, 0xef];
/// Magical version bytes for Vpub: bitcoin testnet/regtest public key for
/// multi-signature P2WSH
pub const VERSION_MAGIC_VPUB_MULTISIG: [u8; 4] = [0x02, 0x57, 0x54, 0x83];

// xprv, yprv, zprv, Yprv, Zprv, tprv, uprv, vprv, Uprv, Vprv
const PRIVATE_VERSIONS: [[u8; 4]; 10] = [
    [0x04, 0x88, 0xAD, 0xE4],
    [0x04, 0x9D, 0x78, 0x78],
    [0x04, 0xB2, 0x43, 0x0C],
    [0x02, 0x95, 0xb0, 0x05],
    [0x02, 0xaa, 0x7a, 0x99],
    [0x04, 0x35, 0x83, 0x94],
    [0x04, 0x4A, 0x4E, 0x28],
    [0x04, 0x5F, 0x18, 0xBC],
    [0x02, 0x42, 0x85, 0xb5],
    [0x02, 0x57, 0x50, 0x48],
];

/// Length of BIP-32 serialized extended key data
const XKEY_LEN: usize = 78;

/// Extended public key processing errors
#[derive(Clone, PartialEq, Eq, Debug, Display, From, Error)]
#[display(doc_comments)]
pub enum Error {
    /// error in BASE58 key encoding: {0}
    #[from]
    Base58(base58::Error),

    /// encoded extended key data has wrong length {0}
    WrongExtendedKeyLength(usize),

    /// unrecognized or unsupported extended key version {0} (please check
    /// SLIP-132 for possible values)
    UnknownVersion(KeyVersion),

    /// extended private key was provided where an extended public key is
    /// expected
    PrivateKey,

    /// extended key data contains invalid public key
    InvalidPublicKey,

    /// failure in rust bitcoin library
    InternalFailure,
}

impl From<bip32::Error> for Error {
    fn from(err: bip32::Error) -> Self {
        match err {
            bip32::Error::Base58(err) => Error::Base58(err),
            bip32::Error::WrongExtendedKeyLength(len) => Error::WrongExtendedKeyLength(len),
            bip32::Error::UnknownVersion(ver) => Error::UnknownVersion(KeyVersion(ver)),
            bip32::Error::Secp256k1(_) => Error::InvalidPublicKey,
            _ => Error::InternalFailure,
        }
    }
}

/// Structure holding 4 version bytes with magical numbers representing
/// different versions of extended public keys according to BIP-32 and
/// SLIP-132.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct KeyVersion([u8; 4]);

impl Display for KeyVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl KeyVersion {
    /// Constructs [`KeyVersion`] from a fixed 4 bytes values
    pub fn from_bytes(version_bytes: [u8; 4]) -> KeyVersion { KeyVersion(version_bytes) }

    /// Constructs [`KeyVersion`] from a Base58Check-encoded extended key
    /// string.
    pub fn from_xkey_str(key: &str) -> Result<KeyVersion, Error> {
        let data = base58::from_check(key)?;
        if data.len() != XKEY_LEN {
            return Err(Error::WrongExtendedKeyLength(data.len()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&data[0..4]);
        Ok(KeyVersion(version))
    }

    /// Returns internal representation of version bytes
    pub fn as_bytes(&self) -> &[u8; 4] { &self.0 }

    /// Detects whether the version corresponds to an extended public key.
    /// Returns `None` if the version is not known.
    pub fn is_pub(&self) -> Option<bool> {
        if self.network().is_some() {
            Some(true)
        } else if PRIVATE_VERSIONS.contains(&self.0) {
            Some(false)
        } else {
            None
        }
    }

    /// Detects network family of the public key version: either
    /// [`Network::Bitcoin`] or [`Network::Testnet`], which also covers signet
    /// and regtest. Returns `None` for unknown or private key versions.
    pub fn network(&self) -> Option<Network> {
        match self.0 {
            VERSION_MAGIC_XPUB
            | VERSION_MAGIC_YPUB
            | VERSION_MAGIC_ZPUB
            | VERSION_MAGIC_YPUB_MULTISIG
            | VERSION_MAGIC_ZPUB_MULTISIG => Some(Network::Bitcoin),
            VERSION_MAGIC_TPUB
            | VERSION_MAGIC_UPUB
            | VERSION_MAGIC_VPUB
            | VERSION_MAGIC_UPUB_MULTISIG
            | VERSION_MAGIC_VPUB_MULTISIG => Some(Network::Testnet),
            _ => None,
        }
    }

    /// Detects application scope defined by the public key version bytes.
    pub fn application(&self) -> Option<KeyApplication> {
        match self.0 {
            VERSION_MAGIC_XPUB | VERSION_MAGIC_TPUB => Some(KeyApplication::Hashed),
            VERSION_MAGIC_YPUB | VERSION_MAGIC_UPUB => Some(KeyApplication::Nested),
            VERSION_MAGIC_ZPUB | VERSION_MAGIC_VPUB => Some(KeyApplication::SegWit),
            VERSION_MAGIC_YPUB_MULTISIG | VERSION_MAGIC_UPUB_MULTISIG => {
                Some(KeyApplication::NestedMultisig)
            }
            VERSION_MAGIC_ZPUB_MULTISIG | VERSION_MAGIC_VPUB_MULTISIG => {
                Some(KeyApplication::SegWitMultisig)
            }
            _ => None,
        }
    }
}

/// SLIP 132-defined key applications defining types of scriptPubkey descriptors
/// in which they can be used
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
pub enum KeyApplication {
    /// xpub: keys that can be used for P2PKH and multisig P2SH
    /// scriptPubkey descriptors.
    #[display("BIP44")]
    #[cfg_attr(feature = "serde", serde(rename = "bip44"))]
    Hashed,

    /// ypub: keys that can be used for P2WPKH-in-P2SH scriptPubkey
    /// descriptors
    #[display("BIP49")]
    #[cfg_attr(feature = "serde", serde(rename = "bip49"))]
    Nested,

    /// zpub: keys that can be used for P2WPKH scriptPubkey descriptors
    #[display("BIP84")]
    #[cfg_attr(feature = "serde", serde(rename = "bip84"))]
    SegWit,

    /// Ypub: keys that can be used for multisig P2WSH-in-P2SH
    /// scriptPubkey descriptors
    #[display("BIP48-nested")]
    #[cfg_attr(feature = "serde", serde(rename = "bip48-nested"))]
    NestedMultisig,

    /// Zpub: keys that can be used for multisig P2WSH scriptPubkey
    /// descriptors
    #[display("BIP48-native")]
    #[cfg_attr(feature = "serde", serde(rename = "bip48-native"))]
    SegWitMultisig,
}

/// Unknown string representation of [`KeyApplication`] enum
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct UnknownKeyApplicationError;

impl FromStr for KeyApplication {
    type Err = UnknownKeyApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "bip44" => KeyApplication::Hashed,
            "bip49" => KeyApplication::Nested,
            "bip84" => KeyApplication::SegWit,
            "bip48-nested" => KeyApplication::NestedMultisig,
            "bip48-native" => KeyApplication::SegWitMultisig,
            _ => return Err(UnknownKeyApplicationError),
        })
    }
}

impl KeyApplication {
    /// Returns public key version bytes used for this application on the
    /// given network. Signet and regtest share testnet versions.
    pub fn key_version(self, network: Network) -> KeyVersion {
        let mainnet = network == Network::Bitcoin;
        KeyVersion(match (self, mainnet) {
            (KeyApplication::Hashed, true) => VERSION_MAGIC_XPUB,
            (KeyApplication::Nested, true) => VERSION_MAGIC_YPUB,
            (KeyApplication::SegWit, true) => VERSION_MAGIC_ZPUB,
            (KeyApplication::NestedMultisig, true) => VERSION_MAGIC_YPUB_MULTISIG,
            (KeyApplication::SegWitMultisig, true) => VERSION_MAGIC_ZPUB_MULTISIG,
            (KeyApplication::Hashed, false) => VERSION_MAGIC_TPUB,
            (KeyApplication::Nested, false) => VERSION_MAGIC_UPUB,
            (KeyApplication::SegWit, false) => VERSION_MAGIC_VPUB,
            (KeyApplication::NestedMultisig, false) => VERSION_MAGIC_UPUB_MULTISIG,
            (KeyApplication::SegWitMultisig, false) => VERSION_MAGIC_VPUB_MULTISIG,
        })
    }
}

/// Parsing extended public keys from any SLIP-132 representation
pub trait FromSlip132 {
    /// Parses the key, returning it together with the original version bytes
    fn from_slip132_str_versioned(s: &str) -> Result<(Self, KeyVersion), Error>
    where
        Self: Sized;

    /// Parses the key dropping the information about its original version
    fn from_slip132_str(s: &str) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_slip132_str_versioned(s).map(|(key, _)| key)
    }
}

impl FromSlip132 for ExtendedPubKey {
    fn from_slip132_str_versioned(s: &str) -> Result<(Self, KeyVersion), Error> {
        let mut data = base58::from_check(s.trim())?;
        if data.len() != XKEY_LEN {
            return Err(Error::WrongExtendedKeyLength(data.len()));
        }

        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&data[0..4]);
        let version = KeyVersion(prefix);
        let slice = match version.network() {
            Some(Network::Bitcoin) => VERSION_MAGIC_XPUB,
            Some(_) => VERSION_MAGIC_TPUB,
            None if version.is_pub() == Some(false) => return Err(Error::PrivateKey),
            None => return Err(Error::UnknownVersion(version)),
        };
        data[0..4].copy_from_slice(&slice);

        let xpub = ExtendedPubKey::decode(&data)?;

        Ok((xpub, version))
    }
}

/// Encoding extended public keys with SLIP-132 version bytes
pub trait ToSlip132 {
    /// Encodes the key with version bytes matching given application and
    /// network
    fn to_slip132_string(&self, key_application: KeyApplication, network: Network) -> String;
}

impl ToSlip132 for ExtendedPubKey {
    fn to_slip132_string(&self, key_application: KeyApplication, network: Network) -> String {
        let key_version = key_application.key_version(network);
        let mut xpub = self.encode();
        xpub[0..4].copy_from_slice(key_version.as_bytes());
        base58::check_encode_slice(&xpub)
    }
}
