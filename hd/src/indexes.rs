// Wallet-level libraries for bitcoin protocol by LNP/BP Association
//
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// This software is distributed without any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use bitcoin::util::bip32::{self, ChildNumber};

use crate::HARDENED_INDEX_BOUNDARY;

/// Trait defining common API for different types of indexes which may be
/// present in a certain derivation path segment: hardened, unhardened, mixed.
pub trait SegmentIndexes
where
    Self: Sized + Eq + Ord + Copy,
{
    /// Constructs derivation path segment with index equal to zero
    fn zero() -> Self;

    /// Constructs derivation path segment with specific index.
    ///
    /// Index is always a value in range of `0..`[`HARDENED_INDEX_BOUNDARY`]
    fn from_index(index: impl Into<u32>) -> Result<Self, bip32::Error>;

    /// Returns index representation of this derivation path segment.
    ///
    /// Index is always a value in range of `0..`[`HARDENED_INDEX_BOUNDARY`]
    fn first_index(&self) -> u32;

    /// Returns value used during derivation, which for normal indexes must lie
    /// in range `0..`[`HARDENED_INDEX_BOUNDARY`] and for hardened in range
    /// of [`HARDENED_INDEX_BOUNDARY`]`..=u32::MAX`
    fn first_derivation_value(&self) -> u32;

    /// Detects whether path segment uses hardened index(es)
    fn is_hardened(&self) -> bool;
}

fn parse_index(s: &str) -> Result<u32, bip32::Error> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bip32::Error::InvalidChildNumberFormat);
    }
    let index = u32::from_str(s).map_err(|_| bip32::Error::InvalidChildNumberFormat)?;
    if index >= HARDENED_INDEX_BOUNDARY {
        return Err(bip32::Error::InvalidChildNumber(index));
    }
    Ok(index)
}

/// normal derivation index {0} met when a hardened index was required.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Display, From, Error)]
#[display(doc_comments)]
pub struct HardenedIndexExpected(pub UnhardenedIndex);

/// hardened derivation index {0} met when a normal (unhardened) index was
/// required.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Display, From, Error)]
#[display(doc_comments)]
pub struct UnhardenedIndexExpected(pub HardenedIndex);

/// Index for unhardened children derivation; ensures that the inner value
/// is always < 2^31
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Display, From)]
#[display(inner)]
pub struct UnhardenedIndex(
    #[from(u8)]
    #[from(u16)]
    u32,
);

impl PartialEq<u8> for UnhardenedIndex {
    fn eq(&self, other: &u8) -> bool { self.0 == *other as u32 }
}

impl SegmentIndexes for UnhardenedIndex {
    #[inline]
    fn zero() -> Self { UnhardenedIndex(0) }

    #[inline]
    fn from_index(index: impl Into<u32>) -> Result<Self, bip32::Error> {
        let index = index.into();
        if index >= HARDENED_INDEX_BOUNDARY {
            Err(bip32::Error::InvalidChildNumber(index))
        } else {
            Ok(Self(index))
        }
    }

    /// Returns unhardened index number.
    #[inline]
    fn first_index(&self) -> u32 { self.0 }

    #[inline]
    fn first_derivation_value(&self) -> u32 { self.0 }

    #[inline]
    fn is_hardened(&self) -> bool { false }
}

impl FromStr for UnhardenedIndex {
    type Err = bip32::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> { parse_index(s).map(Self) }
}

impl TryFrom<ChildNumber> for UnhardenedIndex {
    type Error = UnhardenedIndexExpected;

    fn try_from(value: ChildNumber) -> Result<Self, Self::Error> {
        match value {
            ChildNumber::Normal { index } => Ok(UnhardenedIndex(index)),
            ChildNumber::Hardened { index } => Err(UnhardenedIndexExpected(HardenedIndex(index))),
        }
    }
}

impl From<UnhardenedIndex> for ChildNumber {
    fn from(idx: UnhardenedIndex) -> Self { ChildNumber::Normal { index: idx.0 } }
}

/// Index for hardened children derivation; ensures that the index always >=
/// 2^31.
///
/// Displayed in descriptor notation (`84h`); the alternate form (`{:#}`) uses
/// BIP-32 notation (`84'`).
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default, Display, From)]
#[display("{0}h", alt = "{0}'")]
pub struct HardenedIndex(
    /// The inner index value; always reduced by [`HARDENED_INDEX_BOUNDARY`]
    #[from(u8)]
    #[from(u16)]
    pub(crate) u32,
);

impl PartialEq<u8> for HardenedIndex {
    fn eq(&self, other: &u8) -> bool { self.0 == *other as u32 }
}

impl SegmentIndexes for HardenedIndex {
    #[inline]
    fn zero() -> Self { HardenedIndex(0) }

    #[inline]
    fn from_index(index: impl Into<u32>) -> Result<Self, bip32::Error> {
        let index = index.into();
        if index >= HARDENED_INDEX_BOUNDARY {
            Err(bip32::Error::InvalidChildNumber(index))
        } else {
            Ok(Self(index))
        }
    }

    /// Returns hardened index number offset by [`HARDENED_INDEX_BOUNDARY`]
    /// (i.e. zero-based).
    #[inline]
    fn first_index(&self) -> u32 { self.0 }

    #[inline]
    fn first_derivation_value(&self) -> u32 { self.0 + HARDENED_INDEX_BOUNDARY }

    #[inline]
    fn is_hardened(&self) -> bool { true }
}

impl FromStr for HardenedIndex {
    type Err = bip32::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match PathSegment::from_str(s)? {
            PathSegment::Normal(_) => Err(bip32::Error::InvalidChildNumberFormat),
            PathSegment::Hardened(index) => Ok(index),
        }
    }
}

impl TryFrom<ChildNumber> for HardenedIndex {
    type Error = HardenedIndexExpected;

    fn try_from(value: ChildNumber) -> Result<Self, Self::Error> {
        match value {
            ChildNumber::Hardened { index } => Ok(HardenedIndex(index)),
            ChildNumber::Normal { index } => Err(HardenedIndexExpected(UnhardenedIndex(index))),
        }
    }
}

impl From<HardenedIndex> for ChildNumber {
    fn from(index: HardenedIndex) -> Self { ChildNumber::Hardened { index: index.0 } }
}

// -----------------------------------------------------------------------------

/// Single step of a derivation path, either hardened or not.
///
/// Display follows [`HardenedIndex`]: descriptor notation by default, BIP-32
/// notation in the alternate form. Parsing accepts `'`, `h` and `H` as
/// hardened markers.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
pub enum PathSegment {
    /// Unhardened derivation step
    #[from]
    Normal(UnhardenedIndex),

    /// Hardened derivation step
    #[from]
    Hardened(HardenedIndex),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Normal(index) => Display::fmt(index, f),
            PathSegment::Hardened(index) => Display::fmt(index, f),
        }
    }
}

impl FromStr for PathSegment {
    type Err = bip32::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_suffix(|c| c == '\'' || c == 'h' || c == 'H') {
            Some(index) => parse_index(index).map(HardenedIndex).map(PathSegment::Hardened),
            None => parse_index(s).map(UnhardenedIndex).map(PathSegment::Normal),
        }
    }
}

impl SegmentIndexes for PathSegment {
    #[inline]
    fn zero() -> Self { PathSegment::Normal(UnhardenedIndex::zero()) }

    /// Constructs unhardened segment
    #[inline]
    fn from_index(index: impl Into<u32>) -> Result<Self, bip32::Error> {
        UnhardenedIndex::from_index(index).map(PathSegment::Normal)
    }

    #[inline]
    fn first_index(&self) -> u32 {
        match self {
            PathSegment::Normal(index) => index.first_index(),
            PathSegment::Hardened(index) => index.first_index(),
        }
    }

    #[inline]
    fn first_derivation_value(&self) -> u32 {
        match self {
            PathSegment::Normal(index) => index.first_derivation_value(),
            PathSegment::Hardened(index) => index.first_derivation_value(),
        }
    }

    #[inline]
    fn is_hardened(&self) -> bool { matches!(self, PathSegment::Hardened(_)) }
}

impl From<ChildNumber> for PathSegment {
    fn from(child: ChildNumber) -> Self {
        match child {
            ChildNumber::Normal { index } => PathSegment::Normal(UnhardenedIndex(index)),
            ChildNumber::Hardened { index } => PathSegment::Hardened(HardenedIndex(index)),
        }
    }
}

impl From<PathSegment> for ChildNumber {
    fn from(segment: PathSegment) -> Self {
        match segment {
            PathSegment::Normal(index) => index.into(),
            PathSegment::Hardened(index) => index.into(),
        }
    }
}
