// Descriptor wallet library extending bitcoin & miniscript functionality
// by LNP/BP Association (https://lnp-bp.org)
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

use bitcoin::util::bip32;
use bitcoin::Network;
use bitcoin_hd::DescriptorType;
use descriptors::{DeriveError, ParseError, TemplateError};

/// Errors of script type dispatch, descriptor construction and address
/// derivation
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// script type `{0}` is not registered
    UnknownScriptType(String),

    /// script type `{0}` is already registered
    DuplicateScriptType(String),

    /// multisig is not supported: {0}
    #[from]
    MultisigUnsupported(MultisigIssue),

    /// malformed descriptor: {0}
    #[from]
    DescriptorParseError(ParseError),

    /// invalid key material: {0}
    #[from]
    #[from(slip132::Error)]
    InvalidKeyMaterial(KeyMaterialError),
}

/// Reasons for rejecting a multisig request
#[derive(Clone, PartialEq, Eq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum MultisigIssue {
    /// script type `{0}` has no multisig descriptor template
    NoTemplate(String),

    /// no signer keys were provided
    NoSigners,

    /// quorum {quorum} is out of range for {signers} signer keys
    QuorumOutOfRange {
        /// Requested quorum
        quorum: usize,
        /// Number of signer keys
        signers: usize,
    },

    /// {signers} signer keys exceed the limit of {max} keys for
    /// {descriptor_type} descriptors
    TooManySigners {
        /// Multisig descriptor type
        descriptor_type: DescriptorType,
        /// Number of signer keys
        signers: usize,
        /// Maximal number of keys
        max: usize,
    },
}

/// Errors in extended keys and device key records
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum KeyMaterialError {
    /// {0}
    #[from]
    ExtendedKey(slip132::Error),

    /// malformed master key fingerprint `{0}`; it must be 8 hex digits
    Fingerprint(String),

    /// malformed derivation path `{0}`
    DerivationPath(String),

    /// extended key belongs to {key} network family and can't be used on
    /// {requested}
    NetworkMismatch {
        /// Network family of the extended key
        key: Network,
        /// Network requested by the caller
        requested: Network,
    },

    /// signer keys belong to different network families
    MixedNetworks,

    /// address index {0} is hardened and can't be derived from an extended
    /// public key
    HardenedIndex(u32),

    /// BIP-32 derivation failure: {0}
    #[from]
    Derivation(bip32::Error),

    /// derived key can't be encoded into a script or address: {0}
    Script(String),
}

impl From<DeriveError> for Error {
    fn from(err: DeriveError) -> Self {
        match err {
            DeriveError::HardenedIndex(index) => KeyMaterialError::HardenedIndex(index).into(),
            DeriveError::NetworkMismatch { key, requested } => {
                KeyMaterialError::NetworkMismatch { key, requested }.into()
            }
            DeriveError::Bip32(err) => KeyMaterialError::Derivation(err).into(),
            DeriveError::Descriptor(err) => Error::DescriptorParseError(err),
            DeriveError::Miniscript(msg) => KeyMaterialError::Script(msg).into(),
        }
    }
}

impl From<TemplateError> for Error {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NoKeys => MultisigIssue::NoSigners.into(),
            TemplateError::QuorumOutOfRange { quorum, keys } => MultisigIssue::QuorumOutOfRange {
                quorum,
                signers: keys,
            }
            .into(),
            TemplateError::TooManyKeys {
                descriptor_type,
                keys,
                max,
            } => MultisigIssue::TooManySigners {
                descriptor_type,
                signers: keys,
                max,
            }
            .into(),
            TemplateError::MixedNetworks => KeyMaterialError::MixedNetworks.into(),
            // handler template does not match the requested descriptor form
            err => ParseError::Template(err).into(),
        }
    }
}
