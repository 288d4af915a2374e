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

use core::fmt::{self, Display, Formatter};
use core::str::FromStr;
use std::ops::Deref;

use bitcoin::util::bip32::{self, ChildNumber, DerivationPath};

use crate::{PathSegment, SegmentIndexes};

/// Derivation path from the master key to an account-level extended key,
/// which may mix hardened and unhardened steps.
pub type AccountPath = DerivationSubpath<PathSegment>;

/// Derivation path that consisting only of single type of segments.
///
/// `Display` produces the output descriptor notation (`/84h/0h/0h`), while the
/// alternate form `{:#}` produces BIP-32 notation (`/84'/0'/0'`). These two
/// are the only places where hardened markers are rendered.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
pub struct DerivationSubpath<Segment>(Vec<Segment>)
where
    Segment: SegmentIndexes;

// This is needed to get methods line `len()` and `is_empty()` working.
impl<Segment> Deref for DerivationSubpath<Segment>
where
    Segment: SegmentIndexes,
{
    type Target = Vec<Segment>;

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl<Segment> Default for DerivationSubpath<Segment>
where
    Segment: SegmentIndexes,
{
    fn default() -> Self { Self(vec![]) }
}

impl<Segment> From<&[Segment]> for DerivationSubpath<Segment>
where
    Segment: SegmentIndexes,
{
    fn from(path: &[Segment]) -> Self { Self(path.to_vec()) }
}

impl<Segment> AsRef<[Segment]> for DerivationSubpath<Segment>
where
    Segment: SegmentIndexes,
{
    #[inline]
    fn as_ref(&self) -> &[Segment] { &self.0 }
}

impl<Segment> Display for DerivationSubpath<Segment>
where
    Segment: SegmentIndexes + Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            f.write_str("/")?;
            Display::fmt(segment, f)?;
        }
        Ok(())
    }
}

impl<Segment> FromStr for DerivationSubpath<Segment>
where
    Segment: SegmentIndexes + FromStr,
    bip32::Error: From<<Segment as FromStr>::Err>,
{
    type Err = bip32::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with('/') {
            return Err(bip32::Error::InvalidDerivationPathFormat);
        }
        let inner = s[1..]
            .split('/')
            .map(Segment::from_str)
            .collect::<Result<Vec<_>, Segment::Err>>()?;
        if inner.is_empty() {
            return Err(bip32::Error::InvalidDerivationPathFormat);
        }
        Ok(Self(inner))
    }
}

impl<Segment> IntoIterator for DerivationSubpath<Segment>
where
    Segment: SegmentIndexes,
{
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

impl<'path, Segment> IntoIterator for &'path DerivationSubpath<Segment>
where
    Segment: SegmentIndexes,
{
    type Item = Segment;
    type IntoIter = std::iter::Copied<std::slice::Iter<'path, Segment>>;

    fn into_iter(self) -> Self::IntoIter { self.0.iter().copied() }
}

impl<Segment> FromIterator<Segment> for DerivationSubpath<Segment>
where
    Segment: SegmentIndexes,
{
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<Segment> DerivationSubpath<Segment>
where
    Segment: SegmentIndexes,
{
    /// Constructs empty derivation path.
    pub fn new() -> Self { Self::default() }

    /// Appends a segment to the path, builder-style.
    pub fn with(mut self, segment: impl Into<Segment>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Detects whether all path segments are hardened.
    pub fn is_hardened(&self) -> bool { self.0.iter().all(Segment::is_hardened) }
}

impl<Segment> DerivationSubpath<Segment>
where
    Segment: SegmentIndexes + Into<ChildNumber>,
{
    /// Converts into the BIP-32 derivation path type used by the bitcoin
    /// library for key derivation.
    pub fn to_derivation_path(&self) -> DerivationPath {
        self.0.iter().copied().map(Segment::into).collect()
    }
}

impl AccountPath {
    /// Parses path written in any of the commonly used notations: with or
    /// without leading `m` and `/`, using `'`, `h` or `H` as hardened markers.
    /// A sole `m` (or an empty string) is the empty path.
    pub fn parse_bip32(s: &str) -> Result<Self, bip32::Error> {
        let s = s.trim();
        let s = s.strip_prefix('m').unwrap_or(s);
        let s = s.strip_prefix('/').unwrap_or(s);
        if s.is_empty() {
            return Ok(Self::new());
        }
        s.split('/')
            .map(PathSegment::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Formats the path in BIP-32 notation, e.g. `m/84'/0'/0'`.
    pub fn to_bip32_string(&self) -> String { format!("m{:#}", self) }

    /// Formats the path in output descriptor notation without the leading
    /// separator, e.g. `84h/0h/0h`.
    pub fn to_descriptor_string(&self) -> String {
        let s = self.to_string();
        s.strip_prefix('/').map(str::to_owned).unwrap_or(s)
    }
}

impl From<&DerivationPath> for AccountPath {
    fn from(path: &DerivationPath) -> Self {
        path.into_iter().copied().map(PathSegment::from).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{HardenedIndex, UnhardenedIndex};

    #[test]
    fn hardened_marker_rewrite() {
        let path = AccountPath::new()
            .with(HardenedIndex::from(84u8))
            .with(HardenedIndex::from(0u8))
            .with(HardenedIndex::from(0u8));
        assert_eq!(path.to_bip32_string(), "m/84'/0'/0'");
        assert_eq!(path.to_descriptor_string(), "84h/0h/0h");
        assert_eq!(path.to_string(), "/84h/0h/0h");
        assert!(path.is_hardened());
    }

    #[test]
    fn tolerant_parsing() {
        let expected = AccountPath::new()
            .with(HardenedIndex::from(48u8))
            .with(HardenedIndex::from(1u8))
            .with(HardenedIndex::from(100u8))
            .with(HardenedIndex::from(2u8));
        for s in [
            "m/48'/1'/100'/2'",
            "m/48h/1h/100h/2h",
            "48h/1h/100h/2h",
            "/48'/1h/100H/2'",
            " m/48'/1'/100'/2' ",
        ] {
            assert_eq!(AccountPath::parse_bip32(s).unwrap(), expected);
        }
        assert_eq!(AccountPath::parse_bip32("m").unwrap(), AccountPath::new());
        assert!(AccountPath::parse_bip32("m/48'/x'").is_err());
        assert!(AccountPath::parse_bip32("m//1").is_err());
    }

    #[test]
    fn mixed_paths() {
        let path = AccountPath::parse_bip32("m/45'/0/7").unwrap();
        assert!(!path.is_hardened());
        assert_eq!(path.to_descriptor_string(), "45h/0/7");
        assert_eq!(path[1], PathSegment::Normal(UnhardenedIndex::from(0u8)));
        assert_eq!(path.to_derivation_path().to_string(), "m/45'/0/7");
        assert_eq!(AccountPath::from(&path.to_derivation_path()), path);
    }

    #[test]
    fn subpath_from_str() {
        let path = AccountPath::from_str("/86h/1h/0h").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "/86h/1h/0h");
        assert!(AccountPath::from_str("86h/1h/0h").is_err());
    }
}
