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

use bitcoin::Network;

/// Options for single-key descriptor construction
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct DescriptorBuildOptions {
    /// Network the descriptor is built for
    pub network: Network,

    /// Use change (`1`) chain instead of receive (`0`) chain
    #[cfg_attr(feature = "serde", serde(default))]
    pub change: bool,
}

impl DescriptorBuildOptions {
    /// Options for the receive chain.
    pub fn receive(network: Network) -> Self {
        DescriptorBuildOptions {
            network,
            change: false,
        }
    }

    /// Options for the change chain.
    pub fn change(network: Network) -> Self {
        DescriptorBuildOptions {
            network,
            change: true,
        }
    }
}

/// Options for multisig descriptor construction
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct MultiSigBuildOptions {
    /// Network the descriptor is built for
    pub network: Network,

    /// Use change (`1`) chain instead of receive (`0`) chain
    #[cfg_attr(feature = "serde", serde(default))]
    pub change: bool,

    /// Number of signatures required to spend; must be within
    /// `1..=signers`
    pub quorum: usize,
}

impl MultiSigBuildOptions {
    /// Options for the receive chain with the given quorum.
    pub fn new(network: Network, quorum: usize) -> Self {
        MultiSigBuildOptions {
            network,
            change: false,
            quorum,
        }
    }

    /// Switches options to the change chain.
    pub fn with_change(mut self, change: bool) -> Self {
        self.change = change;
        self
    }
}

impl From<MultiSigBuildOptions> for DescriptorBuildOptions {
    fn from(opts: MultiSigBuildOptions) -> Self {
        DescriptorBuildOptions {
            network: opts.network,
            change: opts.change,
        }
    }
}

/// Options for deriving an address from an extended key
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct AddressOptions {
    /// Script type id or alias
    pub script_type: String,

    /// Network of the address
    pub network: Network,

    /// Derive from the change chain
    #[cfg_attr(feature = "serde", serde(default))]
    pub change: bool,
}

impl AddressOptions {
    /// Constructs options for the receive chain.
    pub fn new(script_type: impl ToString, network: Network) -> Self {
        AddressOptions {
            script_type: script_type.to_string(),
            network,
            change: false,
        }
    }

    /// Switches options to the change chain.
    pub fn with_change(mut self, change: bool) -> Self {
        self.change = change;
        self
    }
}

/// Options for deriving an address from a descriptor
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct DescriptorAddressOptions {
    /// Network of the address
    pub network: Network,

    /// Derive from the change chain
    #[cfg_attr(feature = "serde", serde(default))]
    pub change: bool,
}

impl From<DescriptorBuildOptions> for DescriptorAddressOptions {
    fn from(opts: DescriptorBuildOptions) -> Self {
        DescriptorAddressOptions {
            network: opts.network,
            change: opts.change,
        }
    }
}

/// Address derived at a specific chain and index
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Clone, Eq, PartialEq, Hash, Debug, Display)]
#[display("{address}")]
pub struct DerivedAddress {
    /// Encoded address
    pub address: String,

    /// Script type id of the handler producing the address
    pub script_type: String,

    /// Address index
    pub index: u32,

    /// Whether the address belongs to the change chain
    pub is_change: bool,
}
