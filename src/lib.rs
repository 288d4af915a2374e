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

//! Script type handlers, output descriptor construction and address
//! derivation for custodial wallets.
//!
//! A caller supplies a script type id (or an existing descriptor), device key
//! material and a network:
//! ```text
//! ScriptTypeRegistry -> ScriptTypeHandler -> ScriptDescriptor
//!     -> AddressDerivationEngine -> DerivedAddress
//! ```

// Coding conventions
#![recursion_limit = "256"]
#![deny(dead_code, missing_docs)]

#[macro_use]
extern crate amplify;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

pub extern crate bitcoin_hd as hd;
pub extern crate descriptors;
pub extern crate slip132;

mod device;
mod engine;
mod error;
pub mod handler;
mod options;
mod registry;

pub use device::DeviceKeyInfo;
pub use engine::AddressDerivationEngine;
pub use error::{Error, KeyMaterialError, MultisigIssue};
pub use handler::ScriptTypeHandler;
pub use options::{
    AddressOptions, DerivedAddress, DescriptorAddressOptions, DescriptorBuildOptions,
    MultiSigBuildOptions,
};
pub use registry::{ScriptTypeRegistry, SharedRegistry};
