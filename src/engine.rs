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

use std::str::FromStr;

use bitcoin::secp256k1::{Secp256k1, VerifyOnly};
use bitcoin::util::bip32::ExtendedPubKey;
use bitcoin_hd::DescriptorType;
use descriptors::{ChainStep, KeyExpression, ScriptDescriptor, SortedMulti};
use slip132::FromSlip132;
use tracing::debug;

use crate::{
    AddressOptions, DerivedAddress, DescriptorAddressOptions, Error, KeyMaterialError,
    MultisigIssue, ScriptTypeRegistry,
};

/// Derives addresses from extended keys and descriptors.
///
/// All operations are deterministic functions of their arguments and the
/// registry content.
#[derive(Debug)]
pub struct AddressDerivationEngine<'registry> {
    registry: &'registry ScriptTypeRegistry,
    secp: Secp256k1<VerifyOnly>,
}

impl<'registry> AddressDerivationEngine<'registry> {
    /// Constructs engine resolving script types with the registry.
    pub fn new(registry: &'registry ScriptTypeRegistry) -> Self {
        AddressDerivationEngine {
            registry,
            secp: Secp256k1::verification_only(),
        }
    }

    fn parse_xpub(xpub: &str) -> Result<ExtendedPubKey, Error> {
        ExtendedPubKey::from_slip132_str(xpub)
            .map_err(KeyMaterialError::from)
            .map_err(Error::from)
    }

    fn script_type_name(&self, descriptor_type: DescriptorType) -> String {
        self.registry
            .script_type_of(descriptor_type)
            .map(|handler| handler.id().to_owned())
            .unwrap_or_else(|| descriptor_type.to_string())
    }

    fn derive(
        &self,
        descriptor: &ScriptDescriptor,
        script_type: String,
        index: u32,
        opts: DescriptorAddressOptions,
    ) -> Result<DerivedAddress, Error> {
        let address = descriptor.address(&self.secp, opts.network, opts.change, index)?;
        debug!(
            "derived {} address {} at {}/{} for {}",
            script_type, address, opts.change as u8, index, opts.network
        );
        Ok(DerivedAddress {
            address: address.to_string(),
            script_type,
            index,
            is_change: opts.change,
        })
    }

    /// Derives single-key address from the account-level extended public key
    /// at `{0|1}/{index}`.
    pub fn derive_address(
        &self,
        xpub: &str,
        index: u32,
        opts: &AddressOptions,
    ) -> Result<DerivedAddress, Error> {
        let handler = self.registry.resolve(&opts.script_type)?;
        let key = KeyExpression {
            origin: None,
            xpub: Self::parse_xpub(xpub)?,
            chain: ChainStep::with_change(opts.change),
        };
        let descriptor = ScriptDescriptor::single_sig(handler.single_sig_type(), key)?;
        self.derive(&descriptor, handler.id().to_owned(), index, DescriptorAddressOptions {
            network: opts.network,
            change: opts.change,
        })
    }

    /// Derives address from a descriptor at `{0|1}/{index}`.
    pub fn derive_address_from_descriptor(
        &self,
        descriptor: &str,
        index: u32,
        opts: &DescriptorAddressOptions,
    ) -> Result<DerivedAddress, Error> {
        let descriptor = ScriptDescriptor::from_str(descriptor)?;
        let script_type = self.script_type_name(descriptor.descriptor_type());
        self.derive(&descriptor, script_type, index, *opts)
    }

    /// Derives `count` consecutive addresses starting from `start` index.
    pub fn derive_address_range(
        &self,
        descriptor: &str,
        start: u32,
        count: u32,
        opts: &DescriptorAddressOptions,
    ) -> Result<Vec<DerivedAddress>, Error> {
        let descriptor = ScriptDescriptor::from_str(descriptor)?;
        let script_type = self.script_type_name(descriptor.descriptor_type());
        (0..count)
            .map(|offset| {
                let index = start
                    .checked_add(offset)
                    .ok_or(KeyMaterialError::HardenedIndex(u32::MAX))?;
                self.derive(&descriptor, script_type.clone(), index, *opts)
            })
            .collect()
    }

    /// Resolves multisig descriptor type from a wrapping name (`p2sh`,
    /// `p2wsh`, `p2sh_p2wsh`) or a registered script type.
    pub fn multisig_type(&self, script_type: &str) -> Result<DescriptorType, Error> {
        match script_type.trim().to_lowercase().as_str() {
            "p2sh" => Ok(DescriptorType::ShSortedMulti),
            "p2wsh" => Ok(DescriptorType::WshSortedMulti),
            "p2sh_p2wsh" | "p2sh-p2wsh" => Ok(DescriptorType::ShWshSortedMulti),
            _ => {
                let handler = self.registry.resolve(script_type)?;
                handler
                    .multisig_type()
                    .ok_or_else(|| MultisigIssue::NoTemplate(handler.id().to_owned()).into())
            }
        }
    }

    /// Derives sorted multisig address from account-level extended keys
    /// without origin information.
    pub fn derive_multisig_address(
        &self,
        xpubs: &[impl AsRef<str>],
        quorum: usize,
        index: u32,
        opts: &AddressOptions,
    ) -> Result<DerivedAddress, Error> {
        let descriptor_type = self.multisig_type(&opts.script_type)?;
        let keys = xpubs
            .iter()
            .map(|xpub| {
                Ok(KeyExpression {
                    origin: None,
                    xpub: Self::parse_xpub(xpub.as_ref())?,
                    chain: ChainStep::with_change(opts.change),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let descriptor =
            ScriptDescriptor::multisig(descriptor_type, SortedMulti::new(quorum, keys)?)?;
        let script_type = self.script_type_name(descriptor_type);
        self.derive(&descriptor, script_type, index, DescriptorAddressOptions {
            network: opts.network,
            change: opts.change,
        })
    }
}

#[cfg(test)]
mod test {
    use bitcoin::Network;
    use bitcoin_hd::HardenedIndex;
    use descriptors::ParseError;

    use super::*;
    use crate::{DescriptorBuildOptions, DeviceKeyInfo, MultiSigBuildOptions};

    const XPUB84: &str = "xpub6CatWdiZiodmUeTDp8LT5or8nmbKNcuyvz7WyksVFkKB4RHwCD3XyuvPEbvqAQY3rAPshWcMLoP2fMFMKHPJ4ZeZXYVUhLv1VMrjPC7PW6V";
    const ZPUB84: &str = "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs";
    const XPUB86: &str = "xpub6BgBgsespWvERF3LHQu6CnqdvfEvtMcQjYrcRzx53QJjSxarj2afYWcLteoGVky7D3UKDP9QyrLprQ3VCECoY49yfdDEHGCtMMj92pReUsQ";
    const T1: &str = "tpubDFc9Mm4tw6EkgR4YTC1GrU6CGEd9yw7KSBnSssL4LXAXh89D4uMZigRyv3csdXbeU3BhLQc4vWKTLewboA1Pt8Fu6fbHKu81MZ6VGdc32eM";
    const T2: &str = "tpubDErWN5qfdLwYE94mh12oWr4uURDDNKCjKVhCEcAgZ7jKnnAwq5tcTF2iEk3VuznkJuk2G8SCHft9gS6aKbBd18ptYWPqKLRSTRQY7e2rrDj";
    const P2SH_T1: &str = "tpubDDinbKDXyddTUKcX6mv936Ux5utCJteq5S6EEKhfpM8CqN2rMAcccv6GecsB3cPt8eGL4e4K2eaZ9Jis9TGf7mbwBsRTN7ngnFR7yJZxBKC";
    const P2SH_T2: &str = "tpubDDQubdBx9cbwQtdcRTisKF7wVCwHgHewhU7wh77VzCi62Q9q81qyQeLoZjKWZ62FnQbWU8k7CuKo2A21pAWaFtPGDHP9WuhtAx4smcCxqn1";

    #[test]
    fn single_sig_addresses() {
        let registry = ScriptTypeRegistry::with_builtin();
        let engine = AddressDerivationEngine::new(&registry);

        let opts = AddressOptions::new("native_segwit", Network::Bitcoin);
        let address = engine.derive_address(ZPUB84, 0, &opts).unwrap();
        assert_eq!(address, DerivedAddress {
            address: s!("bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"),
            script_type: s!("native_segwit"),
            index: 0,
            is_change: false,
        });
        // idempotence
        assert_eq!(engine.derive_address(ZPUB84, 0, &opts).unwrap(), address);
        assert_eq!(engine.derive_address(XPUB84, 0, &opts).unwrap(), address);

        let change = AddressOptions::new("BECH32", Network::Bitcoin).with_change(true);
        let address = engine.derive_address(XPUB84, 1, &change).unwrap();
        assert_eq!(address.address, "bc1qggnasd834t54yulsep6fta8lpjekv4zj6gv5rf");
        assert!(address.is_change);

        let taproot = AddressOptions::new("p2tr", Network::Bitcoin);
        assert_eq!(
            engine.derive_address(XPUB86, 0, &taproot).unwrap().address,
            "bc1p5cyxnuxmeuwuvkwfem96lqzszd02n6xdcjrs20cac6yqjjwudpxqkedrcr"
        );
    }

    #[test]
    fn single_sig_failures() {
        let registry = ScriptTypeRegistry::with_builtin();
        let engine = AddressDerivationEngine::new(&registry);
        assert_eq!(
            engine.derive_address(XPUB84, 0, &AddressOptions::new("p2wsh", Network::Bitcoin)),
            Err(Error::UnknownScriptType(s!("p2wsh")))
        );
        assert_eq!(
            engine.derive_address(XPUB84, 0, &AddressOptions::new("wpkh", Network::Testnet)),
            Err(KeyMaterialError::NetworkMismatch {
                key: Network::Bitcoin,
                requested: Network::Testnet
            }
            .into())
        );
        let wpkh = AddressOptions::new("wpkh", Network::Bitcoin);
        assert_eq!(
            engine.derive_address(XPUB84, 1 << 31, &wpkh),
            Err(KeyMaterialError::HardenedIndex(1 << 31).into())
        );
        assert!(matches!(
            engine.derive_address("xpub", 0, &AddressOptions::new("wpkh", Network::Bitcoin)),
            Err(Error::InvalidKeyMaterial(KeyMaterialError::ExtendedKey(_)))
        ));
    }

    #[test]
    fn descriptor_addresses() {
        let registry = ScriptTypeRegistry::with_builtin();
        let engine = AddressDerivationEngine::new(&registry);
        let descriptor = format!(
            "wsh(sortedmulti(2,[f57ec65d/48'/1'/100'/2']{}/0/*,[efa5d916/48'/1'/100'/2']{}/0/*))",
            T1, T2
        );

        let opts = DescriptorAddressOptions {
            network: Network::Testnet,
            change: false,
        };
        let addresses = engine.derive_address_range(&descriptor, 0, 3, &opts).unwrap();
        assert_eq!(
            addresses.iter().map(|address| address.address.as_str()).collect::<Vec<_>>(),
            [
                "tb1qhgj3fnwn50pq966rjnj4pg8uz9ktsd8nge32qxd73ffvvg636p5q54g7m0",
                "tb1q4ka64s7fcdv8ms7xs6j2w35dz8t7n0zd450lgsny73jvg8lpyqfqr9n037",
                "tb1q8fglyvwtlr5t427cqn898jc9vrqxkc43522tpxjaupmn8ewu9sushz86gf"
            ]
        );
        assert!(addresses.iter().all(|address| address.script_type == "native_segwit"));
        assert_eq!(addresses[2].index, 2);
        assert_eq!(
            engine.derive_address_from_descriptor(&descriptor, 1, &opts).unwrap(),
            addresses[1]
        );

        let regtest = DescriptorAddressOptions {
            network: Network::Regtest,
            change: true,
        };
        assert_eq!(
            engine.derive_address_from_descriptor(&descriptor, 0, &regtest),
            Err(Error::DescriptorParseError(ParseError::ChainMismatch {
                chain: ChainStep::Receive,
                requested: ChainStep::Change
            }))
        );
        let change = descriptor.replace("/0/*", "/1/*");
        let address = engine.derive_address_from_descriptor(&change, 0, &regtest).unwrap();
        assert!(address.is_change);
        assert!(address.address.starts_with("bcrt1q"));
        let multipath = descriptor.replace("/0/*", "/<0;1>/*");
        assert_eq!(
            engine.derive_address_from_descriptor(&multipath, 0, &regtest).unwrap(),
            address
        );

        assert!(matches!(
            engine.derive_address_from_descriptor("wsh(multi(1,xpub))", 0, &opts),
            Err(Error::DescriptorParseError(_))
        ));
    }

    #[test]
    fn multisig_addresses() {
        let registry = ScriptTypeRegistry::with_builtin();
        let engine = AddressDerivationEngine::new(&registry);
        let opts = AddressOptions::new("p2sh", Network::Testnet);
        let expected = [
            "2N5KgAnFFpmk5TRMiCicRZDQS8FFNCKqKf1",
            "2N5hHeNeqk72xkQiHWTHvmpVTpyuKynGrcH",
            "2NC1zVgtFLBfc3UZvnhhjNAF15NmksNCZXe",
        ];
        for (index, expected) in expected.into_iter().enumerate() {
            for xpubs in [[P2SH_T1, P2SH_T2], [P2SH_T2, P2SH_T1]] {
                let address = engine
                    .derive_multisig_address(&xpubs, 2, index as u32, &opts)
                    .unwrap();
                assert_eq!(address.address, expected);
                assert_eq!(address.script_type, "legacy");
            }
        }

        let opts = AddressOptions::new("native_segwit", Network::Testnet).with_change(true);
        assert_eq!(
            engine.derive_multisig_address(&[T1, T2], 2, 0, &opts).unwrap().address,
            "tb1qhjtyry0qwm5l6v5v7y27hc6m60vm0d8exlr3cswdrxsgaygqvd2q5zsl0n"
        );
        assert_eq!(
            engine.derive_multisig_address(&[T1, T2], 3, 0, &opts),
            Err(MultisigIssue::QuorumOutOfRange {
                quorum: 3,
                signers: 2
            }
            .into())
        );
        let taproot = AddressOptions::new("tr", Network::Testnet);
        assert_eq!(
            engine.derive_multisig_address(&[T1, T2], 1, 0, &taproot),
            Err(MultisigIssue::NoTemplate(s!("taproot")).into())
        );
        assert_eq!(engine.multisig_type("P2SH_P2WSH").unwrap(), DescriptorType::ShWshSortedMulti);
    }

    #[test]
    fn multisig_key_order_invariance() {
        let registry = ScriptTypeRegistry::with_builtin();
        let engine = AddressDerivationEngine::new(&registry);
        let a = DeviceKeyInfo::new("f57ec65d", T1).with_derivation_path("m/48'/1'/100'/2'");
        let b = DeviceKeyInfo::new("efa5d916", T2).with_derivation_path("m/48'/1'/100'/2'");
        let opts = MultiSigBuildOptions::new(Network::Testnet, 2);
        let addr_opts = DescriptorAddressOptions::from(DescriptorBuildOptions::from(opts));

        let addresses = [[a.clone(), b.clone()], [b, a]].map(|devices| {
            let descriptor = registry
                .build_multisig_descriptor("native_segwit", &devices, &opts)
                .unwrap();
            engine
                .derive_address_from_descriptor(&descriptor.to_string(), 0, &addr_opts)
                .unwrap()
                .address
        });
        assert_eq!(addresses[0], addresses[1]);
        assert_eq!(addresses[0], "tb1qhgj3fnwn50pq966rjnj4pg8uz9ktsd8nge32qxd73ffvvg636p5q54g7m0");
    }

    #[test]
    fn legacy_multisig_testnet() {
        let registry = ScriptTypeRegistry::with_builtin();
        let engine = AddressDerivationEngine::new(&registry);
        let devices = [
            DeviceKeyInfo::new("f57ec65d", P2SH_T1),
            DeviceKeyInfo::new("efa5d916", P2SH_T2),
            DeviceKeyInfo::new("73c5da0a", T1),
        ];
        let opts = MultiSigBuildOptions::new(Network::Testnet, 2);
        let descriptor = registry
            .build_multisig_descriptor("legacy", &devices, &opts)
            .unwrap();
        assert_eq!(
            descriptor.to_string(),
            format!(
                "sh(sortedmulti(2,[f57ec65d/45h/0h]{}/0/*,[efa5d916/45h/0h]{}/0/*,[73c5da0a/45h/\
                 0h]{}/0/*))",
                P2SH_T1, P2SH_T2, T1
            )
        );
        let address = engine
            .derive_address_from_descriptor(&descriptor.to_string(), 0, &DescriptorAddressOptions {
                network: Network::Testnet,
                change: false,
            })
            .unwrap();
        assert!(address.address.starts_with('2'));
        assert_eq!(address.script_type, "legacy");
    }

    #[test]
    fn native_segwit_scenario() {
        let registry = ScriptTypeRegistry::with_builtin();
        let engine = AddressDerivationEngine::new(&registry);
        assert_eq!(
            registry
                .derivation_path("native_segwit", Network::Bitcoin, HardenedIndex::from(0u8))
                .unwrap()
                .to_bip32_string(),
            "m/84'/0'/0'"
        );
        let device = DeviceKeyInfo::new("f57ec65d", XPUB84);
        let descriptor = registry
            .build_single_sig_descriptor(
                "native_segwit",
                &device,
                &DescriptorBuildOptions::receive(Network::Bitcoin),
            )
            .unwrap()
            .to_string();
        assert_eq!(descriptor, format!("wpkh([f57ec65d/84h/0h/0h]{}/0/*)", XPUB84));
        let address = engine
            .derive_address_from_descriptor(&descriptor, 0, &DescriptorAddressOptions {
                network: Network::Bitcoin,
                change: false,
            })
            .unwrap();
        assert!(address.address.starts_with("bc1q"));
        assert_eq!(address.address, "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu");
    }

    #[test]
    fn taproot_scenario() {
        let registry = ScriptTypeRegistry::with_builtin();
        let engine = AddressDerivationEngine::new(&registry);
        let device = DeviceKeyInfo::new("73c5da0a", XPUB86);
        let opts = DescriptorBuildOptions::receive(Network::Bitcoin);
        let descriptor = registry
            .build_single_sig_descriptor("taproot", &device, &opts)
            .unwrap()
            .to_string();
        assert_eq!(descriptor, format!("tr([73c5da0a/86h/0h/0h]{}/0/*)", XPUB86));
        let address = engine
            .derive_address_from_descriptor(&descriptor, 0, &DescriptorAddressOptions {
                network: Network::Bitcoin,
                change: false,
            })
            .unwrap();
        assert!(address.address.starts_with("bc1p"));
        assert_eq!(address.script_type, "taproot");

        assert_eq!(
            registry.build_multisig_descriptor(
                "taproot",
                &[device],
                &MultiSigBuildOptions::new(Network::Bitcoin, 1)
            ),
            Err(MultisigIssue::NoTemplate(s!("taproot")).into())
        );
    }
}
