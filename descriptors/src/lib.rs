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

//! Output descriptors for custody wallets.
//!
//! Supports single-key (`pkh`, `sh(wpkh)`, `wpkh`, `tr`) and sorted multisig
//! (`sh(sortedmulti)`, `sh(wsh(sortedmulti))`, `wsh(sortedmulti)`)
//! descriptors over account-level extended public keys:
//! ```text
//! Template -> Descriptor -> Address (network, chain, index)
//!
//! String -> Descriptor -> String#checksum
//! ```

// Coding conventions
#![recursion_limit = "256"]
#![deny(dead_code, missing_docs)]

#[macro_use]
extern crate amplify;
extern crate miniscript_crate as miniscript;
#[cfg(feature = "serde")]
extern crate serde_crate as serde;

mod derive;
mod descriptor;
mod key;

pub use derive::DeriveError;
pub use descriptor::{ParseError, ScriptDescriptor, SortedMulti, TemplateError};
pub use key::{ChainStep, KeyExpression, KeyOrigin};
