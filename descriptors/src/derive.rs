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

use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::util::bip32;
use bitcoin::{Address, Network, PublicKey, Script};
use bitcoin_hd::{DerivationBlockchain, SegmentIndexes, UnhardenedIndex, HARDENED_INDEX_BOUNDARY};
use miniscript::{Descriptor, TranslatePk, Translator};
use tracing::trace;

use crate::{KeyExpression, ParseError, ScriptDescriptor};

/// Errors deriving addresses and scripts from descriptors
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum DeriveError {
    /// address index {0} is hardened; only unhardened indexes can be derived
    /// from extended public keys
    HardenedIndex(u32),

    /// descriptor keys belong to {key} network family, which can't be used
    /// to derive addresses for {requested}
    NetworkMismatch {
        /// Network of the descriptor extended keys
        key: Network,
        /// Network requested for the address
        requested: Network,
    },

    /// BIP-32 derivation failure: {0}
    #[from]
    Bip32(bip32::Error),

    /// {0}
    #[from]
    Descriptor(ParseError),

    /// unable to construct output script: {0}
    Miniscript(String),
}

impl From<miniscript::Error> for DeriveError {
    fn from(err: miniscript::Error) -> Self { DeriveError::Miniscript(err.to_string()) }
}

struct KeyDeriver<'secp, C: Verification> {
    secp: &'secp Secp256k1<C>,
    change: bool,
    index: UnhardenedIndex,
}

impl<'secp, C: Verification> Translator<KeyExpression, PublicKey, DeriveError>
    for KeyDeriver<'secp, C>
{
    fn pk(&mut self, key: &KeyExpression) -> Result<PublicKey, DeriveError> {
        key.derive_public_key(self.secp, self.change, self.index)
    }

    miniscript::translate_hash_fail!(KeyExpression, PublicKey, DeriveError);
}

impl ScriptDescriptor {
    fn check_index(index: u32) -> Result<UnhardenedIndex, DeriveError> {
        if index >= HARDENED_INDEX_BOUNDARY {
            return Err(DeriveError::HardenedIndex(index));
        }
        Ok(UnhardenedIndex::from_index(index)?)
    }

    /// Derives descriptor over the public keys at `chain/index`. Multipath
    /// keys take the chain selected by `change`; fixed `/0` and `/1` keys
    /// must agree with it. Multisig keys are sorted when the script is
    /// constructed.
    pub fn derive<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        change: bool,
        index: u32,
    ) -> Result<Descriptor<PublicKey>, DeriveError> {
        let index = Self::check_index(index)?;
        self.to_miniscript()?
            .translate_pk(&mut KeyDeriver { secp, change, index })
    }

    /// Derives address at `chain/index` for the given network.
    ///
    /// Extended keys of the descriptor must belong to the same network
    /// family as `network`: `xpub`s can be used only for mainnet, `tpub`s
    /// for testnet, signet and regtest.
    pub fn address<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        network: Network,
        change: bool,
        index: u32,
    ) -> Result<Address, DeriveError> {
        let key_network = self.network();
        if DerivationBlockchain::from(key_network) != DerivationBlockchain::from(network) {
            return Err(DeriveError::NetworkMismatch {
                key: key_network,
                requested: network,
            });
        }

        let address = self.derive(secp, change, index)?.address(network)?;
        trace!(
            "derived {} address {} at {}/{}",
            self.descriptor_type(),
            address,
            change as u8,
            index
        );
        Ok(address)
    }

    /// Derives `scriptPubkey` at `chain/index`.
    pub fn script_pubkey<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        change: bool,
        index: u32,
    ) -> Result<Script, DeriveError> {
        Ok(self.derive(secp, change, index)?.script_pubkey())
    }
}
