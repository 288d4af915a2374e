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

//! Script type handlers: derivation standards and descriptor templates for
//! each supported output type.

use std::collections::BTreeSet;
use std::fmt::Debug;

use bitcoin::Network;
use bitcoin_hd::{AccountPath, Bip43, DescriptorType, HardenedIndex, SegmentIndexes};
use descriptors::{ChainStep, ScriptDescriptor, SortedMulti};
use tracing::debug;

use crate::{DescriptorBuildOptions, DeviceKeyInfo, Error, MultiSigBuildOptions, MultisigIssue};

/// Strategy for a single script type.
///
/// Implementors provide the identification data and the derivation standards;
/// descriptor construction is shared by all handlers and driven by
/// [`ScriptTypeHandler::single_sig_type`] and
/// [`ScriptTypeHandler::multisig_type`].
pub trait ScriptTypeHandler: Send + Sync + Debug {
    /// Canonical script type id, like `native_segwit`.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Short description for user interfaces.
    fn description(&self) -> &str;

    /// Alternative identifiers of the script type.
    fn aliases(&self) -> &[&str];

    /// Single-key derivation standard.
    fn bip(&self) -> Bip43;

    /// Multisig derivation standard. It is defined even for handlers without
    /// multisig support.
    fn multisig_bip(&self) -> Bip43;

    /// Descriptor template for single-key wallets.
    fn single_sig_type(&self) -> DescriptorType;

    /// Descriptor template for multisig wallets, if the script type supports
    /// them.
    fn multisig_type(&self) -> Option<DescriptorType>;

    /// BIP-48 `script_type` discriminator of the multisig standard.
    fn multisig_script_type_number(&self) -> Option<HardenedIndex> {
        self.multisig_bip().script_type()
    }

    /// Detects whether multisig descriptors can be constructed.
    fn supports_multisig(&self) -> bool { self.multisig_type().is_some() }

    /// Standard single-key account derivation path,
    /// `m/{purpose}'/{coin_type}'/{account}'`.
    fn derivation_path(&self, network: Network, account: HardenedIndex) -> AccountPath {
        self.bip().to_account_path(network.into(), account)
    }

    /// Standard multisig account derivation path: `m/45'/{account}'` for
    /// BIP-45 and `m/48'/{coin_type}'/{account}'/{script_type}'` for BIP-48.
    fn multisig_derivation_path(&self, network: Network, account: HardenedIndex) -> AccountPath {
        self.multisig_bip().to_account_path(network.into(), account)
    }

    /// Builds single-key descriptor for the device key.
    fn build_single_sig_descriptor(
        &self,
        device: &DeviceKeyInfo,
        opts: &DescriptorBuildOptions,
    ) -> Result<ScriptDescriptor, Error> {
        let key = device.key_expression(
            self.bip(),
            self.derivation_path(opts.network, HardenedIndex::zero()),
            opts.network,
            ChainStep::with_change(opts.change),
        )?;
        let descriptor = ScriptDescriptor::single_sig(self.single_sig_type(), key)?;
        debug!("{} handler built descriptor {}", self.id(), descriptor);
        Ok(descriptor)
    }

    /// Builds sorted multisig descriptor over the device keys.
    fn build_multisig_descriptor(
        &self,
        devices: &[DeviceKeyInfo],
        opts: &MultiSigBuildOptions,
    ) -> Result<ScriptDescriptor, Error> {
        let descriptor_type = self
            .multisig_type()
            .ok_or_else(|| MultisigIssue::NoTemplate(self.id().to_owned()))?;
        let default_path = self.multisig_derivation_path(opts.network, HardenedIndex::zero());
        let keys = devices
            .iter()
            .map(|device| {
                device.key_expression(
                    self.multisig_bip(),
                    default_path.clone(),
                    opts.network,
                    ChainStep::with_change(opts.change),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let multi = SortedMulti::new(opts.quorum, keys)?;
        let descriptor = ScriptDescriptor::multisig(descriptor_type, multi)?;
        debug!("{} handler built multisig descriptor {}", self.id(), descriptor);
        Ok(descriptor)
    }

    /// Checks whether a device declaring support for the given script types
    /// can be used with this handler. Comparison is case-insensitive and
    /// covers both the id and the aliases.
    fn validate_device(&self, device_script_types: &BTreeSet<String>) -> bool {
        device_script_types.iter().any(|script_type| {
            script_type.eq_ignore_ascii_case(self.id())
                || self
                    .aliases()
                    .iter()
                    .any(|alias| script_type.eq_ignore_ascii_case(alias))
        })
    }
}

/// Legacy P2PKH outputs (BIP-44), with BIP-45 P2SH multisig.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Legacy;

impl ScriptTypeHandler for Legacy {
    fn id(&self) -> &str { "legacy" }
    fn name(&self) -> &str { "Legacy (P2PKH)" }
    fn description(&self) -> &str {
        "Original address format; addresses start with 1 on mainnet and m or n on testnet"
    }
    fn aliases(&self) -> &[&str] { &["p2pkh", "pkh", "bip44"] }
    fn bip(&self) -> Bip43 { Bip43::Bip44 }
    fn multisig_bip(&self) -> Bip43 { Bip43::Bip45 }
    fn single_sig_type(&self) -> DescriptorType { DescriptorType::Pkh }
    fn multisig_type(&self) -> Option<DescriptorType> { Some(DescriptorType::ShSortedMulti) }
}

/// P2SH-wrapped SegWit outputs (BIP-49), with BIP-48 P2SH-P2WSH multisig.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct NestedSegwit;

impl ScriptTypeHandler for NestedSegwit {
    fn id(&self) -> &str { "nested_segwit" }
    fn name(&self) -> &str { "Nested SegWit (P2SH-P2WPKH)" }
    fn description(&self) -> &str {
        "SegWit wrapped into P2SH for compatibility; addresses start with 3 on mainnet and 2 on \
         testnet"
    }
    fn aliases(&self) -> &[&str] {
        &["p2sh-p2wpkh", "p2sh_p2wpkh", "wrapped_segwit", "nested", "sh_wpkh"]
    }
    fn bip(&self) -> Bip43 { Bip43::Bip49 }
    fn multisig_bip(&self) -> Bip43 { Bip43::Bip48Nested }
    fn single_sig_type(&self) -> DescriptorType { DescriptorType::ShWpkh }
    fn multisig_type(&self) -> Option<DescriptorType> { Some(DescriptorType::ShWshSortedMulti) }
}

/// Native SegWit v0 outputs (BIP-84), with BIP-48 P2WSH multisig.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct NativeSegwit;

impl ScriptTypeHandler for NativeSegwit {
    fn id(&self) -> &str { "native_segwit" }
    fn name(&self) -> &str { "Native SegWit (P2WPKH)" }
    fn description(&self) -> &str {
        "Bech32 addresses starting with bc1q on mainnet and tb1q on testnet"
    }
    fn aliases(&self) -> &[&str] { &["bech32", "p2wpkh", "segwit", "wpkh"] }
    fn bip(&self) -> Bip43 { Bip43::Bip84 }
    fn multisig_bip(&self) -> Bip43 { Bip43::Bip48Native }
    fn single_sig_type(&self) -> DescriptorType { DescriptorType::Wpkh }
    fn multisig_type(&self) -> Option<DescriptorType> { Some(DescriptorType::WshSortedMulti) }
}

/// Taproot key-path outputs (BIP-86).
///
/// Multisig derivation path uses the provisional BIP-48 script type `3'`, but
/// no multisig descriptor is defined.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Taproot;

impl ScriptTypeHandler for Taproot {
    fn id(&self) -> &str { "taproot" }
    fn name(&self) -> &str { "Taproot (P2TR)" }
    fn description(&self) -> &str {
        "Bech32m addresses starting with bc1p on mainnet and tb1p on testnet"
    }
    fn aliases(&self) -> &[&str] { &["p2tr", "bech32m", "tr"] }
    fn bip(&self) -> Bip43 { Bip43::Bip86 }
    fn multisig_bip(&self) -> Bip43 { Bip43::Bip48Taproot }
    fn single_sig_type(&self) -> DescriptorType { DescriptorType::Tr }
    fn multisig_type(&self) -> Option<DescriptorType> { None }
}
