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

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use bitcoin::Network;
use bitcoin_hd::{AccountPath, DescriptorType, HardenedIndex};
use descriptors::ScriptDescriptor;
use tracing::{debug, warn};

use crate::handler::{Legacy, NativeSegwit, NestedSegwit, Taproot};
use crate::{
    DescriptorBuildOptions, DeviceKeyInfo, Error, MultiSigBuildOptions, MultisigIssue,
    ScriptTypeHandler,
};

/// Registry shared between threads which may register script types at
/// runtime.
pub type SharedRegistry = Arc<RwLock<ScriptTypeRegistry>>;

/// Lookup table of script type handlers by id and by alias.
///
/// Every registered id is also an alias of its own handler. Aliases are
/// case-insensitive.
#[derive(Clone, Debug)]
pub struct ScriptTypeRegistry {
    handlers: BTreeMap<String, Arc<dyn ScriptTypeHandler>>,
    aliases: BTreeMap<String, String>,
}

impl ScriptTypeRegistry {
    /// Constructs empty registry.
    pub fn new() -> ScriptTypeRegistry {
        ScriptTypeRegistry {
            handlers: empty!(),
            aliases: empty!(),
        }
    }

    /// Constructs registry with legacy, nested SegWit, native SegWit and
    /// taproot handlers.
    pub fn with_builtin() -> ScriptTypeRegistry {
        let mut registry = ScriptTypeRegistry::new();
        registry.insert(Arc::new(Legacy));
        registry.insert(Arc::new(NestedSegwit));
        registry.insert(Arc::new(NativeSegwit));
        registry.insert(Arc::new(Taproot));
        registry
    }

    /// Wraps registry for runtime registration from multiple threads.
    pub fn into_shared(self) -> SharedRegistry { Arc::new(RwLock::new(self)) }

    /// Registers handler. Fails if a handler with the same id is already
    /// registered.
    pub fn register(&mut self, handler: impl ScriptTypeHandler + 'static) -> Result<(), Error> {
        self.register_shared(Arc::new(handler))
    }

    /// Registers handler instance which may be shared with other registries.
    pub fn register_shared(&mut self, handler: Arc<dyn ScriptTypeHandler>) -> Result<(), Error> {
        if self.handlers.contains_key(handler.id()) {
            return Err(Error::DuplicateScriptType(handler.id().to_owned()));
        }
        self.insert(handler);
        Ok(())
    }

    /// Adds handler whose id is not yet registered.
    fn insert(&mut self, handler: Arc<dyn ScriptTypeHandler>) {
        let id = handler.id().to_owned();
        self.handlers.insert(id.clone(), handler.clone());

        for alias in handler.aliases() {
            let alias = alias.to_lowercase();
            match self.aliases.get(&alias) {
                Some(owner) if owner != &id => {
                    warn!("alias `{}` of `{}` is already used by `{}`", alias, id, owner)
                }
                _ => {
                    self.aliases.insert(alias, id.clone());
                }
            }
        }
        if let Some(owner) = self.aliases.insert(id.to_lowercase(), id.clone()) {
            if owner != id {
                warn!("script type id `{}` replaces alias of `{}`", id, owner);
            }
        }

        debug!("registered script type `{}` ({})", id, handler.name());
    }

    /// Removes handler with the given id together with its aliases. Returns
    /// whether the handler was registered.
    pub fn unregister(&mut self, id: &str) -> bool {
        if self.handlers.remove(id).is_none() {
            return false;
        }
        self.aliases.retain(|_, owner| owner != id);
        // aliases shadowed by the removed handler fall back to their declarers
        for owner in self.handlers.keys() {
            self.aliases
                .entry(owner.to_lowercase())
                .or_insert_with(|| owner.clone());
        }
        for (owner, handler) in &self.handlers {
            for alias in handler.aliases() {
                self.aliases
                    .entry(alias.to_lowercase())
                    .or_insert_with(|| owner.clone());
            }
        }
        debug!("unregistered script type `{}`", id);
        true
    }

    /// Looks up handler by id or by alias, ignoring case of the alias.
    pub fn get(&self, id_or_alias: &str) -> Option<Arc<dyn ScriptTypeHandler>> {
        self.handlers.get(id_or_alias).cloned().or_else(|| {
            self.aliases
                .get(&id_or_alias.trim().to_lowercase())
                .and_then(|id| self.handlers.get(id))
                .cloned()
        })
    }

    /// Looks up handler by id or alias, failing if it is not registered.
    pub fn resolve(&self, id_or_alias: &str) -> Result<Arc<dyn ScriptTypeHandler>, Error> {
        self.get(id_or_alias)
            .ok_or_else(|| Error::UnknownScriptType(id_or_alias.to_owned()))
    }

    fn resolve_multisig(&self, id_or_alias: &str) -> Result<Arc<dyn ScriptTypeHandler>, Error> {
        let handler = self.resolve(id_or_alias)?;
        if !handler.supports_multisig() {
            return Err(MultisigIssue::NoTemplate(handler.id().to_owned()).into());
        }
        Ok(handler)
    }

    /// Ids of registered handlers.
    pub fn ids(&self) -> impl Iterator<Item = &str> { self.handlers.keys().map(String::as_str) }

    /// Handlers able to construct multisig descriptors.
    pub fn multisig_capable(&self) -> Vec<Arc<dyn ScriptTypeHandler>> {
        self.handlers
            .values()
            .filter(|handler| handler.supports_multisig())
            .cloned()
            .collect()
    }

    /// Finds handler producing descriptors of the given type.
    pub fn script_type_of(
        &self,
        descriptor_type: DescriptorType,
    ) -> Option<Arc<dyn ScriptTypeHandler>> {
        self.handlers
            .values()
            .find(|handler| {
                handler.single_sig_type() == descriptor_type
                    || handler.multisig_type() == Some(descriptor_type)
            })
            .cloned()
    }

    /// Standard single-key derivation path of the script type.
    pub fn derivation_path(
        &self,
        script_type: &str,
        network: Network,
        account: HardenedIndex,
    ) -> Result<AccountPath, Error> {
        Ok(self.resolve(script_type)?.derivation_path(network, account))
    }

    /// Standard multisig derivation path of the script type. Fails for script
    /// types without multisig support.
    pub fn multisig_derivation_path(
        &self,
        script_type: &str,
        network: Network,
        account: HardenedIndex,
    ) -> Result<AccountPath, Error> {
        Ok(self
            .resolve_multisig(script_type)?
            .multisig_derivation_path(network, account))
    }

    /// Builds single-key descriptor with the handler of the script type.
    pub fn build_single_sig_descriptor(
        &self,
        script_type: &str,
        device: &DeviceKeyInfo,
        opts: &DescriptorBuildOptions,
    ) -> Result<ScriptDescriptor, Error> {
        self.resolve(script_type)?
            .build_single_sig_descriptor(device, opts)
    }

    /// Builds multisig descriptor with the handler of the script type.
    pub fn build_multisig_descriptor(
        &self,
        script_type: &str,
        devices: &[DeviceKeyInfo],
        opts: &MultiSigBuildOptions,
    ) -> Result<ScriptDescriptor, Error> {
        self.resolve_multisig(script_type)?
            .build_multisig_descriptor(devices, opts)
    }
}

impl Default for ScriptTypeRegistry {
    fn default() -> Self { ScriptTypeRegistry::with_builtin() }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;
    use std::thread;

    use bitcoin_hd::Bip43;

    use super::*;

    #[derive(Debug)]
    struct Wrapped;

    impl ScriptTypeHandler for Wrapped {
        fn id(&self) -> &str { "Wrapped" }
        fn name(&self) -> &str { "Wrapped legacy" }
        fn description(&self) -> &str { "Test handler" }
        fn aliases(&self) -> &[&str] { &["nested", "Legacy-Wrapped"] }
        fn bip(&self) -> Bip43 { Bip43::Bip49 }
        fn multisig_bip(&self) -> Bip43 { Bip43::Bip45 }
        fn single_sig_type(&self) -> DescriptorType { DescriptorType::ShWpkh }
        fn multisig_type(&self) -> Option<DescriptorType> { None }
    }

    #[derive(Debug)]
    struct Shadow;

    impl ScriptTypeHandler for Shadow {
        fn id(&self) -> &str { "segwit" }
        fn name(&self) -> &str { "Shadowing handler" }
        fn description(&self) -> &str { "Test handler" }
        fn aliases(&self) -> &[&str] { &[] }
        fn bip(&self) -> Bip43 { Bip43::Bip84 }
        fn multisig_bip(&self) -> Bip43 { Bip43::Bip48Native }
        fn single_sig_type(&self) -> DescriptorType { DescriptorType::Wpkh }
        fn multisig_type(&self) -> Option<DescriptorType> { None }
    }

    #[test]
    fn builtin_ids() {
        let registry = ScriptTypeRegistry::with_builtin();
        assert_eq!(registry.ids().collect::<Vec<_>>(), [
            "legacy",
            "native_segwit",
            "nested_segwit",
            "taproot"
        ]);
        let capable = registry
            .multisig_capable()
            .iter()
            .map(|handler| handler.id().to_owned())
            .collect::<BTreeSet<_>>();
        assert_eq!(capable, bset! {s!("legacy"), s!("nested_segwit"), s!("native_segwit")});
    }

    #[test]
    fn alias_resolution() {
        let mut registry = ScriptTypeRegistry::new();
        registry.register(NativeSegwit).unwrap();
        let handler = registry.get("native_segwit").unwrap();
        for alias in ["bech32", "P2WPKH", "segwit", "Native_SegWit", " wpkh "] {
            assert!(Arc::ptr_eq(&registry.get(alias).unwrap(), &handler), "{}", alias);
        }
        assert!(registry.get("taproot").is_none());
        assert_eq!(
            registry.resolve("taproot").unwrap_err(),
            Error::UnknownScriptType(s!("taproot"))
        );
    }

    #[test]
    fn duplicate_registration() {
        let mut registry = ScriptTypeRegistry::with_builtin();
        assert_eq!(
            registry.register(Taproot),
            Err(Error::DuplicateScriptType(s!("taproot")))
        );
    }

    #[test]
    fn alias_conflicts() {
        let mut registry = ScriptTypeRegistry::with_builtin();
        registry.register(Wrapped).unwrap();
        // first registration keeps the alias
        assert_eq!(registry.get("nested").unwrap().id(), "nested_segwit");
        assert_eq!(registry.get("legacy-wrapped").unwrap().id(), "Wrapped");
        assert_eq!(registry.get("WRAPPED").unwrap().id(), "Wrapped");

        assert!(registry.unregister("Wrapped"));
        assert!(!registry.unregister("Wrapped"));
        assert!(registry.get("legacy-wrapped").is_none());
        assert!(registry.get("wrapped").is_none());
        assert_eq!(registry.get("nested").unwrap().id(), "nested_segwit");

        assert!(registry.unregister("nested_segwit"));
        assert!(registry.get("p2sh-p2wpkh").is_none());
        assert!(registry.get("nested").is_none());
    }

    #[test]
    fn shadowed_alias_restored() {
        let mut registry = ScriptTypeRegistry::with_builtin();
        assert_eq!(registry.get("segwit").unwrap().id(), "native_segwit");

        registry.register(Shadow).unwrap();
        assert_eq!(registry.get("segwit").unwrap().id(), "segwit");
        assert_eq!(registry.get("SegWit").unwrap().id(), "segwit");

        assert!(registry.unregister("segwit"));
        assert_eq!(registry.get("segwit").unwrap().id(), "native_segwit");
        assert_eq!(registry.get("SegWit").unwrap().id(), "native_segwit");
        assert_eq!(registry.get("bech32").unwrap().id(), "native_segwit");
    }

    #[test]
    fn dispatch() {
        let registry = ScriptTypeRegistry::with_builtin();
        let account = HardenedIndex::from(0u8);
        assert_eq!(
            registry
                .derivation_path("bech32", Network::Bitcoin, account)
                .unwrap()
                .to_bip32_string(),
            "m/84'/0'/0'"
        );
        assert_eq!(
            registry
                .multisig_derivation_path("p2sh-p2wpkh", Network::Testnet, account)
                .unwrap()
                .to_bip32_string(),
            "m/48'/1'/0'/1'"
        );
        assert_eq!(
            registry.multisig_derivation_path("p2tr", Network::Bitcoin, account),
            Err(MultisigIssue::NoTemplate(s!("taproot")).into())
        );
        assert_eq!(
            registry.derivation_path("p2wsh", Network::Bitcoin, account),
            Err(Error::UnknownScriptType(s!("p2wsh")))
        );
        assert_eq!(
            registry
                .script_type_of(DescriptorType::ShWshSortedMulti)
                .map(|handler| handler.id().to_owned()),
            Some(s!("nested_segwit"))
        );
    }

    #[test]
    fn shared_registration() {
        let shared = ScriptTypeRegistry::new().into_shared();
        let handles = [
            Arc::new(Legacy) as Arc<dyn ScriptTypeHandler>,
            Arc::new(NestedSegwit),
            Arc::new(NativeSegwit),
            Arc::new(Taproot),
        ]
        .map(|handler| {
            let shared = shared.clone();
            thread::spawn(move || shared.write().unwrap().register_shared(handler))
        });
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        let registry = shared.read().unwrap();
        assert_eq!(registry.ids().count(), 4);
        assert_eq!(registry.get("tr").unwrap().id(), "taproot");
    }
}
