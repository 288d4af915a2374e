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

//! Library with typed hierarchical deterministic derivation paths.
//!
//! Provides index types which can't be confused between hardened and normal
//! derivation, a path builder rendering both BIP-32 (`m/84'/0'/0'`) and output
//! descriptor (`84h/0h/0h`) notations, and BIP-43 purpose standards.

// Coding conventions
#![recursion_limit = "256"]
#![deny(dead_code, missing_docs)]

#[macro_use]
extern crate amplify;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

mod indexes;
mod path;
pub mod standards;

pub use indexes::{
    HardenedIndex, HardenedIndexExpected, PathSegment, SegmentIndexes, UnhardenedIndex,
    UnhardenedIndexExpected,
};
pub use path::{AccountPath, DerivationSubpath};
pub use standards::{Bip43, DerivationBlockchain, DescriptorType};

/// Constant determining BIP32 boundary for u32 values after which index
/// is treated as hardened
pub const HARDENED_INDEX_BOUNDARY: u32 = 1 << 31;
