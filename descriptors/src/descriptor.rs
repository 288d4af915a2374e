// Descriptor wallet library extending bitcoin & miniscript functionality
// by LNP/BP Association (https://lnp-bp.org)
// Written in 2020-2021 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use bitcoin::Network;
use bitcoin_hd::{DerivationBlockchain, DescriptorType};
use miniscript::descriptor::{ShInner, WshInner};
use miniscript::expression::Tree;
use miniscript::{Descriptor, ScriptContext, Terminal};

use crate::{ChainStep, KeyExpression};

/// Errors constructing descriptors out of templates and key sets
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum TemplateError {
    /// descriptor type {0} is a multisig template and requires a set of keys
    MultisigTemplate(DescriptorType),

    /// descriptor type {0} is a single-key template
    SingleSigTemplate(DescriptorType),

    /// multisig descriptor requires at least one key
    NoKeys,

    /// quorum {quorum} is out of range for {keys} keys; it must be at least 1
    /// and not exceed the number of keys
    QuorumOutOfRange {
        /// Requested quorum
        quorum: usize,
        /// Number of keys
        keys: usize,
    },

    /// {keys} keys exceed the limit of {max} keys for {descriptor_type}
    /// descriptors
    TooManyKeys {
        /// Multisig descriptor type
        descriptor_type: DescriptorType,
        /// Number of keys
        keys: usize,
        /// Maximal number of keys for the descriptor type
        max: usize,
    },

    /// multisig keys belong to different networks
    MixedNetworks,
}

impl TemplateError {
    fn check_quorum(quorum: usize, keys: usize) -> Result<(), TemplateError> {
        if keys == 0 {
            return Err(TemplateError::NoKeys);
        }
        if quorum == 0 || quorum > keys {
            return Err(TemplateError::QuorumOutOfRange { quorum, keys });
        }
        Ok(())
    }

    fn check_key_count(descriptor_type: DescriptorType, keys: usize) -> Result<(), TemplateError> {
        let max = descriptor_type.max_keys();
        if descriptor_type.is_multisig() && keys > max {
            return Err(TemplateError::TooManyKeys {
                descriptor_type,
                keys,
                max,
            });
        }
        Ok(())
    }
}

/// Errors parsing output descriptor string
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ParseError {
    /// descriptor string is empty
    Empty,

    /// descriptor checksum `{0}` does not match the descriptor
    ChecksumMismatch(String),

    /// unbalanced parentheses in the descriptor
    UnbalancedParentheses,

    /// unexpected data `{0}` after the end of the descriptor
    TrailingData(String),

    /// unknown descriptor function `{0}`
    UnknownFunction(String),

    /// descriptor function `{0}` is not supported
    UnsupportedFunction(String),

    /// descriptor function `{0}` requires a single argument
    ArgumentCount(String),

    /// unsorted `multi` is not supported; multisig descriptors must use
    /// `sortedmulti`
    UnsortedMulti,

    /// `{inner}` can't be used inside `{outer}`
    InvalidNesting {
        /// Wrapping function
        outer: String,
        /// Nested function or expression
        inner: String,
    },

    /// missing key expression
    MissingKey,

    /// key expression `{0}` contains whitespace
    UnexpectedWhitespace(String),

    /// key origin in `{0}` is missing closing bracket
    UnclosedOrigin(String),

    /// invalid master key fingerprint `{0}`; it must be 8 hex digits
    InvalidFingerprint(String),

    /// invalid key origin derivation path `{0}`
    InvalidOriginPath(String),

    /// invalid extended public key: {0}
    #[from]
    InvalidXpub(slip132::Error),

    /// invalid multisig quorum `{0}`; it must be a decimal number without
    /// sign or leading zeros
    InvalidQuorum(String),

    /// unsupported key derivation terminal `{0}`; only `/0/*`, `/1/*` and
    /// `/<0;1>/*` are allowed
    UnsupportedTerminal(String),

    /// descriptor keys derive from chain {chain} and can't produce addresses
    /// on chain {requested}
    ChainMismatch {
        /// Chain step of the descriptor keys
        chain: ChainStep,
        /// Requested chain
        requested: ChainStep,
    },

    /// {0}
    #[from]
    Template(TemplateError),

    /// invalid descriptor: {0}
    Miniscript(String),
}

impl From<miniscript::Error> for ParseError {
    fn from(err: miniscript::Error) -> Self { ParseError::Miniscript(err.to_string()) }
}

/// Sorted multisig (BIP-67) key set with a quorum.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SortedMulti {
    quorum: usize,
    keys: Vec<KeyExpression>,
    network: Network,
}

impl SortedMulti {
    /// Constructs multisig key set, checking that `1 <= quorum <= keys.len()`
    /// and that all keys belong to the same network family.
    pub fn new(quorum: usize, keys: Vec<KeyExpression>) -> Result<Self, TemplateError> {
        TemplateError::check_quorum(quorum, keys.len())?;
        let network = keys
            .first()
            .map(|key| key.xpub.network)
            .ok_or(TemplateError::NoKeys)?;
        if keys.iter().any(|key| {
            DerivationBlockchain::from(key.xpub.network) != DerivationBlockchain::from(network)
        }) {
            return Err(TemplateError::MixedNetworks);
        }
        Ok(SortedMulti {
            quorum,
            keys,
            network,
        })
    }

    /// Number of signatures required to spend.
    #[inline]
    pub fn quorum(&self) -> usize { self.quorum }

    /// Key expressions in the order they appear in the descriptor.
    #[inline]
    pub fn keys(&self) -> &[KeyExpression] { &self.keys }
}

impl Display for SortedMulti {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "sortedmulti({}", self.quorum)?;
        for key in &self.keys {
            f.write_str(",")?;
            Display::fmt(key, f)?;
        }
        f.write_str(")")
    }
}

/// Output descriptor for one of the supported custody script types.
///
/// `Display` produces descriptor text with `h` hardened markers in key
/// origins; the alternate form (`{:#}`) uses `'` markers. `FromStr` accepts
/// both, an optional `#checksum` suffix and SLIP-132 extended keys.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ScriptDescriptor {
    /// `pkh(KEY)`
    Pkh(KeyExpression),

    /// `sh(wpkh(KEY))`
    ShWpkh(KeyExpression),

    /// `wpkh(KEY)`
    Wpkh(KeyExpression),

    /// `tr(KEY)`
    Tr(KeyExpression),

    /// `sh(sortedmulti(M,KEY,...))`
    ShSortedMulti(SortedMulti),

    /// `sh(wsh(sortedmulti(M,KEY,...)))`
    ShWshSortedMulti(SortedMulti),

    /// `wsh(sortedmulti(M,KEY,...))`
    WshSortedMulti(SortedMulti),
}

impl ScriptDescriptor {
    /// Constructs single-key descriptor of the given type.
    pub fn single_sig(
        descriptor_type: DescriptorType,
        key: KeyExpression,
    ) -> Result<Self, TemplateError> {
        Ok(match descriptor_type {
            DescriptorType::Pkh => ScriptDescriptor::Pkh(key),
            DescriptorType::ShWpkh => ScriptDescriptor::ShWpkh(key),
            DescriptorType::Wpkh => ScriptDescriptor::Wpkh(key),
            DescriptorType::Tr => ScriptDescriptor::Tr(key),
            multisig => return Err(TemplateError::MultisigTemplate(multisig)),
        })
    }

    /// Constructs multisig descriptor of the given type, checking the number
    /// of keys against the script limits.
    pub fn multisig(
        descriptor_type: DescriptorType,
        multi: SortedMulti,
    ) -> Result<Self, TemplateError> {
        TemplateError::check_key_count(descriptor_type, multi.keys.len())?;
        Ok(match descriptor_type {
            DescriptorType::ShSortedMulti => ScriptDescriptor::ShSortedMulti(multi),
            DescriptorType::ShWshSortedMulti => ScriptDescriptor::ShWshSortedMulti(multi),
            DescriptorType::WshSortedMulti => ScriptDescriptor::WshSortedMulti(multi),
            single => return Err(TemplateError::SingleSigTemplate(single)),
        })
    }

    /// Returns descriptor template type.
    pub fn descriptor_type(&self) -> DescriptorType {
        match self {
            ScriptDescriptor::Pkh(_) => DescriptorType::Pkh,
            ScriptDescriptor::ShWpkh(_) => DescriptorType::ShWpkh,
            ScriptDescriptor::Wpkh(_) => DescriptorType::Wpkh,
            ScriptDescriptor::Tr(_) => DescriptorType::Tr,
            ScriptDescriptor::ShSortedMulti(_) => DescriptorType::ShSortedMulti,
            ScriptDescriptor::ShWshSortedMulti(_) => DescriptorType::ShWshSortedMulti,
            ScriptDescriptor::WshSortedMulti(_) => DescriptorType::WshSortedMulti,
        }
    }

    /// Returns multisig key set, if this is a multisig descriptor.
    pub fn sorted_multi(&self) -> Option<&SortedMulti> {
        match self {
            ScriptDescriptor::ShSortedMulti(multi)
            | ScriptDescriptor::ShWshSortedMulti(multi)
            | ScriptDescriptor::WshSortedMulti(multi) => Some(multi),
            _ => None,
        }
    }

    /// Key expressions used by the descriptor, in the descriptor order.
    pub fn keys(&self) -> &[KeyExpression] {
        match self {
            ScriptDescriptor::Pkh(key)
            | ScriptDescriptor::ShWpkh(key)
            | ScriptDescriptor::Wpkh(key)
            | ScriptDescriptor::Tr(key) => std::slice::from_ref(key),
            ScriptDescriptor::ShSortedMulti(multi)
            | ScriptDescriptor::ShWshSortedMulti(multi)
            | ScriptDescriptor::WshSortedMulti(multi) => multi.keys(),
        }
    }

    /// Multisig quorum; `None` for single-key descriptors.
    pub fn quorum(&self) -> Option<usize> { self.sorted_multi().map(SortedMulti::quorum) }

    /// Network of the descriptor keys: [`Network::Bitcoin`] for `xpub`s and
    /// [`Network::Testnet`] for `tpub`s.
    pub fn network(&self) -> Network {
        match self {
            ScriptDescriptor::Pkh(key)
            | ScriptDescriptor::ShWpkh(key)
            | ScriptDescriptor::Wpkh(key)
            | ScriptDescriptor::Tr(key) => key.xpub.network,
            ScriptDescriptor::ShSortedMulti(multi)
            | ScriptDescriptor::ShWshSortedMulti(multi)
            | ScriptDescriptor::WshSortedMulti(multi) => multi.network,
        }
    }

    /// Converts into miniscript descriptor over the same key expressions.
    pub fn to_miniscript(&self) -> Result<Descriptor<KeyExpression>, miniscript::Error> {
        Ok(match self {
            ScriptDescriptor::Pkh(key) => Descriptor::new_pkh(key.clone()),
            ScriptDescriptor::ShWpkh(key) => Descriptor::new_sh_wpkh(key.clone())?,
            ScriptDescriptor::Wpkh(key) => Descriptor::new_wpkh(key.clone())?,
            ScriptDescriptor::Tr(key) => Descriptor::new_tr(key.clone(), None)?,
            ScriptDescriptor::ShSortedMulti(multi) => {
                Descriptor::new_sh_sortedmulti(multi.quorum, multi.keys.clone())?
            }
            ScriptDescriptor::ShWshSortedMulti(multi) => {
                Descriptor::new_sh_wsh_sortedmulti(multi.quorum, multi.keys.clone())?
            }
            ScriptDescriptor::WshSortedMulti(multi) => {
                Descriptor::new_wsh_sortedmulti(multi.quorum, multi.keys.clone())?
            }
        })
    }

    /// Renders descriptor with `#checksum` suffix.
    pub fn to_string_with_checksum(&self) -> Result<String, ParseError> {
        Ok(self.to_miniscript()?.to_string())
    }
}

impl Display for ScriptDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (prefix, suffix) = match self.descriptor_type() {
            DescriptorType::Pkh => ("pkh(", ")"),
            DescriptorType::ShWpkh => ("sh(wpkh(", "))"),
            DescriptorType::Wpkh => ("wpkh(", ")"),
            DescriptorType::Tr => ("tr(", ")"),
            DescriptorType::ShSortedMulti => ("sh(", ")"),
            DescriptorType::ShWshSortedMulti => ("sh(wsh(", "))"),
            DescriptorType::WshSortedMulti => ("wsh(", ")"),
        };
        f.write_str(prefix)?;
        match self.sorted_multi() {
            Some(multi) => Display::fmt(multi, f)?,
            None => {
                for key in self.keys() {
                    Display::fmt(key, f)?;
                }
            }
        }
        f.write_str(suffix)
    }
}

fn unsupported_miniscript<Ctx: ScriptContext>(node: &Terminal<KeyExpression, Ctx>) -> ParseError {
    match node {
        Terminal::Multi(..) => ParseError::UnsortedMulti,
        _ => ParseError::UnsupportedFunction(s!("miniscript")),
    }
}

impl TryFrom<Descriptor<KeyExpression>> for ScriptDescriptor {
    type Error = ParseError;

    fn try_from(descriptor: Descriptor<KeyExpression>) -> Result<Self, Self::Error> {
        let multisig = |descriptor_type, quorum, keys: &[KeyExpression]| {
            SortedMulti::new(quorum, keys.to_vec())
                .and_then(|multi| ScriptDescriptor::multisig(descriptor_type, multi))
                .map_err(ParseError::from)
        };
        Ok(match descriptor {
            Descriptor::Pkh(pkh) => ScriptDescriptor::Pkh(pkh.as_inner().clone()),
            Descriptor::Wpkh(wpkh) => ScriptDescriptor::Wpkh(wpkh.as_inner().clone()),
            Descriptor::Tr(tr) if tr.taptree().is_some() => {
                return Err(ParseError::UnsupportedFunction(s!("tr with script tree")))
            }
            Descriptor::Tr(tr) => ScriptDescriptor::Tr(tr.internal_key().clone()),
            Descriptor::Sh(sh) => match sh.as_inner() {
                ShInner::Wpkh(wpkh) => ScriptDescriptor::ShWpkh(wpkh.as_inner().clone()),
                ShInner::SortedMulti(smv) => {
                    multisig(DescriptorType::ShSortedMulti, smv.k, &smv.pks)?
                }
                ShInner::Wsh(wsh) => match wsh.as_inner() {
                    WshInner::SortedMulti(smv) => {
                        multisig(DescriptorType::ShWshSortedMulti, smv.k, &smv.pks)?
                    }
                    WshInner::Ms(ms) => return Err(unsupported_miniscript(&ms.node)),
                },
                ShInner::Ms(ms) => return Err(unsupported_miniscript(&ms.node)),
            },
            Descriptor::Wsh(wsh) => match wsh.as_inner() {
                WshInner::SortedMulti(smv) => {
                    multisig(DescriptorType::WshSortedMulti, smv.k, &smv.pks)?
                }
                WshInner::Ms(ms) => return Err(unsupported_miniscript(&ms.node)),
            },
            Descriptor::Bare(bare) => return Err(unsupported_miniscript(&bare.as_inner().node)),
        })
    }
}

fn expression_error(err: miniscript::Error) -> ParseError {
    match err {
        miniscript::Error::ExpectedChar(_) => ParseError::UnbalancedParentheses,
        miniscript::Error::Unexpected(rest) => ParseError::TrailingData(rest),
        err => err.into(),
    }
}

fn single_arg<'t, 'a>(tree: &'t Tree<'a>) -> Result<&'t Tree<'a>, ParseError> {
    match tree.args.as_slice() {
        [arg] => Ok(arg),
        _ => Err(ParseError::ArgumentCount(tree.name.to_owned())),
    }
}

fn parse_quorum(s: &str) -> Result<usize, ParseError> {
    let canonical = !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s == "0" || !s.starts_with('0'));
    if !canonical {
        return Err(ParseError::InvalidQuorum(s.to_owned()));
    }
    s.parse().map_err(|_| ParseError::InvalidQuorum(s.to_owned()))
}

fn check_key(outer: &str, tree: &Tree) -> Result<(), ParseError> {
    if !tree.args.is_empty() {
        return Err(ParseError::InvalidNesting {
            outer: outer.to_owned(),
            inner: tree.name.to_owned(),
        });
    }
    KeyExpression::from_str(tree.name).map(|_| ())
}

fn check_sorted_multi(
    outer: &str,
    tree: &Tree,
    descriptor_type: DescriptorType,
) -> Result<(), ParseError> {
    match tree.name {
        "sortedmulti" => {}
        "multi" => return Err(ParseError::UnsortedMulti),
        inner => {
            return Err(ParseError::InvalidNesting {
                outer: outer.to_owned(),
                inner: inner.to_owned(),
            })
        }
    }
    let (quorum, keys) = tree.args.split_first().ok_or(ParseError::MissingKey)?;
    if !quorum.args.is_empty() {
        return Err(ParseError::InvalidQuorum(quorum.name.to_owned()));
    }
    let quorum = parse_quorum(quorum.name)?;
    if keys.is_empty() {
        return Err(ParseError::MissingKey);
    }
    for key in keys {
        check_key(tree.name, key)?;
    }
    TemplateError::check_quorum(quorum, keys.len())?;
    TemplateError::check_key_count(descriptor_type, keys.len())?;
    Ok(())
}

/// Checks function names, nesting, quorum and key expressions of the
/// descriptor expression tree, reporting the first unsupported construct.
fn check_expression(tree: &Tree) -> Result<(), ParseError> {
    match tree.name {
        "pkh" | "wpkh" => check_key(tree.name, single_arg(tree)?),
        "tr" if tree.args.len() > 1 => {
            Err(ParseError::UnsupportedFunction(s!("tr with script tree")))
        }
        "tr" => check_key(tree.name, single_arg(tree)?),
        "sh" => {
            let inner = single_arg(tree)?;
            match inner.name {
                "wpkh" => check_key(inner.name, single_arg(inner)?),
                "wsh" => check_sorted_multi(
                    inner.name,
                    single_arg(inner)?,
                    DescriptorType::ShWshSortedMulti,
                ),
                _ => check_sorted_multi(tree.name, inner, DescriptorType::ShSortedMulti),
            }
        }
        "wsh" => check_sorted_multi(tree.name, single_arg(tree)?, DescriptorType::WshSortedMulti),
        "multi" => Err(ParseError::UnsortedMulti),
        "sortedmulti" | "pk" | "combo" | "addr" | "raw" | "rawtr" | "multi_a"
        | "sortedmulti_a" => Err(ParseError::UnsupportedFunction(tree.name.to_owned())),
        unknown => Err(ParseError::UnknownFunction(unknown.to_owned())),
    }
}

impl FromStr for ScriptDescriptor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }
        let (desc, checksum) = match s.split_once('#') {
            Some((desc, checksum)) => (desc, Some(checksum)),
            None => (s, None),
        };
        if desc.starts_with("tr(") && desc.contains(',') {
            return Err(ParseError::UnsupportedFunction(s!("tr with script tree")));
        }
        let tree = Tree::from_str(desc).map_err(expression_error)?;
        check_expression(&tree)?;

        let descriptor = Descriptor::<KeyExpression>::from_str(s).map_err(|err| match checksum {
            // the text before `#` parses, so miniscript rejected the checksum
            Some(checksum) if Descriptor::<KeyExpression>::from_str(desc).is_ok() => {
                ParseError::ChecksumMismatch(checksum.to_owned())
            }
            _ => ParseError::from(err),
        })?;
        ScriptDescriptor::try_from(descriptor)
    }
}

#[cfg(feature = "serde")]
mod _serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_with::{DeserializeAs, DisplayFromStr, SerializeAs};

    use super::ScriptDescriptor;

    impl Serialize for ScriptDescriptor {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            DisplayFromStr::serialize_as(self, serializer)
        }
    }

    impl<'de> Deserialize<'de> for ScriptDescriptor {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            DisplayFromStr::deserialize_as(deserializer)
        }
    }
}

#[cfg(test)]
mod test {
    use bitcoin::util::bip32::Fingerprint;

    use super::*;
    use crate::ChainStep;

    const X1: &str = "xpub6CCHViYn5VzPfSR7baop9FtGcbm3UnqHwa54Z2eNvJnRFCJCdo9HtCYoLJKZCoATMLUowDDA1BMGfQGauY3fDYU3HyMzX4NDkoLYCSkLpbH";
    const X2: &str = "xpub6Ca5CwTgRASgkXbXE5TeddTP9mPCbYHreCpmGt9dhz9y6femstHGCoFESHHKKRcm414xMKnuLjP9LDS7TwaJC9n5gxua6XB1rwPcC6hqDub";
    const W1: &str = "xpub6EwJjKaiocGvqSuM2jRZSuQ9HEddiFUFu9RdjE47zG7kXVNDQpJ3GyvskwYiLmvU4SBTNZyv8UH53QcmFEE23YwozE61V3dwzZJEFQr6H2b";
    const W2: &str = "xpub6DcqYQxnbefzFkaRBK63FSE2GzNuNnNhFGw1xV9RioVG7av6r3JDf1aELqBSq5gt5487CtNxvVtaiJjQU2HQWzgG5NzLyTPbYav6otW8qEc";
    const T1: &str = "tpubDFc9Mm4tw6EkgR4YTC1GrU6CGEd9yw7KSBnSssL4LXAXh89D4uMZigRyv3csdXbeU3BhLQc4vWKTLewboA1Pt8Fu6fbHKu81MZ6VGdc32eM";
    const ZPUB: &str = "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs";
    const XPUB84: &str = "xpub6CatWdiZiodmUeTDp8LT5or8nmbKNcuyvz7WyksVFkKB4RHwCD3XyuvPEbvqAQY3rAPshWcMLoP2fMFMKHPJ4ZeZXYVUhLv1VMrjPC7PW6V";

    fn caravan_p2sh(marker: char) -> String {
        format!(
            "sh(sortedmulti(2,[f57ec65d/45{m}/0{m}/100{m}]{}/0/*,[efa5d916/45{m}/0{m}/100{m}]{}/0/*))",
            X1,
            X2,
            m = marker
        )
    }

    #[test]
    fn caravan_p2sh_round_trip() {
        let descriptor =
            ScriptDescriptor::from_str(&format!("{}#uxj9xxul", caravan_p2sh('\''))).unwrap();
        assert_eq!(descriptor.descriptor_type(), DescriptorType::ShSortedMulti);
        assert_eq!(descriptor.quorum(), Some(2));
        assert_eq!(descriptor.network(), Network::Bitcoin);

        let keys = descriptor.keys();
        assert_eq!(keys.len(), 2);
        let origin = keys[0].origin.as_ref().unwrap();
        assert_eq!(origin.fingerprint, Fingerprint::from_str("f57ec65d").unwrap());
        assert_eq!(origin.path.to_bip32_string(), "m/45'/0'/100'");
        assert_eq!(keys[1].xpub.to_string(), X2);

        assert_eq!(descriptor.to_string(), caravan_p2sh('h'));
        assert_eq!(format!("{:#}", descriptor), caravan_p2sh('\''));
        assert_eq!(
            descriptor.to_string_with_checksum().unwrap(),
            format!("{}#9sy0gup9", caravan_p2sh('h'))
        );
    }

    #[test]
    fn caravan_p2wsh_checksum() {
        let descriptor = format!(
            "wsh(sortedmulti(2,[efa5d916/48'/0'/100'/2']{}/0/*,[f57ec65d/48'/0'/100'/2']{}/0/*))",
            W1, W2
        );
        let parsed = ScriptDescriptor::from_str(&format!("{}#decr929e", descriptor)).unwrap();
        assert_eq!(parsed.descriptor_type(), DescriptorType::WshSortedMulti);
        assert!(parsed.to_string_with_checksum().unwrap().ends_with("#v5eut5q7"));
        assert_eq!(
            ScriptDescriptor::from_str(&format!("{}#decr929f", descriptor)),
            Err(ParseError::ChecksumMismatch(s!("decr929f")))
        );
        assert_eq!(
            ScriptDescriptor::from_str(&format!("{}#", descriptor)),
            Err(ParseError::ChecksumMismatch(s!("")))
        );
    }

    #[test]
    fn single_sig_round_trip() {
        let text = format!("wpkh([73c5da0a/84h/0h/0h]{}/0/*)", XPUB84);
        let descriptor = ScriptDescriptor::from_str(&text).unwrap();
        assert_eq!(descriptor.to_string(), text);
        assert_eq!(descriptor.quorum(), None);
        assert_eq!(
            descriptor.to_string_with_checksum().unwrap(),
            format!("{}#afwvtk2s", text)
        );

        // SLIP-132 keys are normalized on input
        let zpub = format!("wpkh([73c5da0a/84'/0'/0']{}/<0;1>/*)", ZPUB);
        let descriptor = ScriptDescriptor::from_str(&zpub).unwrap();
        assert_eq!(descriptor.keys()[0].chain, ChainStep::Multipath);
        assert_eq!(
            descriptor.to_string_with_checksum().unwrap(),
            format!("wpkh([73c5da0a/84h/0h/0h]{}/<0;1>/*)#qf45pmyh", XPUB84)
        );

        for (text, descriptor_type) in [
            (format!("pkh({}/0/*)", XPUB84), DescriptorType::Pkh),
            (format!("sh(wpkh({}/1/*))", XPUB84), DescriptorType::ShWpkh),
            (format!("tr({}/0/*)", XPUB84), DescriptorType::Tr),
        ] {
            let descriptor = ScriptDescriptor::from_str(&text).unwrap();
            assert_eq!(descriptor.descriptor_type(), descriptor_type);
            assert_eq!(descriptor.to_string(), text);
        }
    }

    #[test]
    fn nested_multisig() {
        let text = format!(
            "sh(wsh(sortedmulti(1,[f57ec65d/48h/0h/100h/1h]{}/0/*,{}/1/*)))",
            W1, W2
        );
        let descriptor = ScriptDescriptor::from_str(&text).unwrap();
        assert_eq!(descriptor.descriptor_type(), DescriptorType::ShWshSortedMulti);
        assert_eq!(descriptor.quorum(), Some(1));
        assert_eq!(descriptor.keys()[1].origin, None);
        assert_eq!(descriptor.to_string(), text);
    }

    #[test]
    fn malformed_descriptors() {
        let key = format!("[f57ec65d/45h/0h/100h]{}/0/*", X1);
        let cases = [
            (s!(""), ParseError::Empty),
            (s!("   "), ParseError::Empty),
            (format!("wpkh({}", key), ParseError::UnbalancedParentheses),
            (format!("wpkh({}))", key), ParseError::TrailingData(s!(")"))),
            (format!("wpkh({})x", key), ParseError::TrailingData(s!("x"))),
            (format!("foo({})", key), ParseError::UnknownFunction(s!("foo"))),
            (key.clone(), ParseError::UnknownFunction(key.clone())),
            (format!("sh(multi(1,{}))", key), ParseError::UnsortedMulti),
            (format!("wsh(multi(1,{}))", key), ParseError::UnsortedMulti),
            (format!("multi(1,{})", key), ParseError::UnsortedMulti),
            (
                format!("sortedmulti(1,{})", key),
                ParseError::UnsupportedFunction(s!("sortedmulti")),
            ),
            (
                format!("sh(pkh({}))", key),
                ParseError::InvalidNesting {
                    outer: s!("sh"),
                    inner: s!("pkh"),
                },
            ),
            (
                format!("wsh(wpkh({}))", key),
                ParseError::InvalidNesting {
                    outer: s!("wsh"),
                    inner: s!("wpkh"),
                },
            ),
            (
                format!("wpkh(wpkh({}))", key),
                ParseError::InvalidNesting {
                    outer: s!("wpkh"),
                    inner: s!("wpkh"),
                },
            ),
            (
                format!("sh({})", key),
                ParseError::InvalidNesting {
                    outer: s!("sh"),
                    inner: key.clone(),
                },
            ),
            (s!("wpkh()"), ParseError::MissingKey),
            (format!("wpkh({},{})", key, key), ParseError::ArgumentCount(s!("wpkh"))),
            (
                format!("wpkh( {})", key),
                ParseError::UnexpectedWhitespace(format!(" {}", key)),
            ),
            (
                format!("wsh(sortedmulti(1, {}))", key),
                ParseError::UnexpectedWhitespace(format!(" {}", key)),
            ),
            (format!("wsh(sortedmulti(+1,{}))", key), ParseError::InvalidQuorum(s!("+1"))),
            (format!("wsh(sortedmulti(01,{}))", key), ParseError::InvalidQuorum(s!("01"))),
            (format!("wsh(sortedmulti(,{}))", key), ParseError::InvalidQuorum(s!(""))),
            (s!("wsh(sortedmulti(1))"), ParseError::MissingKey),
            (format!("wsh(sortedmulti(1,{},))", key), ParseError::MissingKey),
            (
                format!("wpkh([f57ec65d/45h{}/0/*)", X1),
                ParseError::UnclosedOrigin(format!("[f57ec65d/45h{}/0/*", X1)),
            ),
            (
                format!("wpkh([f57ec65z/45h]{}/0/*)", X1),
                ParseError::InvalidFingerprint(s!("f57ec65z")),
            ),
            (
                format!("wsh(sortedmulti(x,{}))", key),
                ParseError::InvalidQuorum(s!("x")),
            ),
            (
                format!("wsh(sortedmulti(3,{},{}))", key, key),
                ParseError::Template(TemplateError::QuorumOutOfRange { quorum: 3, keys: 2 }),
            ),
            (
                format!("wsh(sortedmulti(0,{}))", key),
                ParseError::Template(TemplateError::QuorumOutOfRange { quorum: 0, keys: 1 }),
            ),
            (
                format!("wsh(sortedmulti(1,{},{}/0/*))", key, T1),
                ParseError::Template(TemplateError::MixedNetworks),
            ),
            (
                format!("wpkh({}/0/1/*)", X1),
                ParseError::UnsupportedTerminal(s!("/0/1/*")),
            ),
            (
                format!("tr({},pk({}))", key, key),
                ParseError::UnsupportedFunction(s!("tr with script tree")),
            ),
        ];
        for (text, err) in cases {
            assert_eq!(ScriptDescriptor::from_str(&text), Err(err), "{}", text);
        }
    }

    #[test]
    fn miniscript_shapes() {
        let key = format!("[f57ec65d/45h/0h/100h]{}/0/*", X1);
        let parse = |text: String| Descriptor::<KeyExpression>::from_str(&text).unwrap();
        for text in [format!("wsh(multi(1,{}))", key), format!("sh(multi(1,{}))", key)] {
            assert_eq!(ScriptDescriptor::try_from(parse(text)), Err(ParseError::UnsortedMulti));
        }
        assert_eq!(
            ScriptDescriptor::try_from(parse(format!("pk({})", key))),
            Err(ParseError::UnsupportedFunction(s!("miniscript")))
        );

        let text = format!("sh(wsh(sortedmulti(1,{},{}/1/*)))", key, W2);
        let descriptor = ScriptDescriptor::from_str(&text).unwrap();
        let miniscript = descriptor.to_miniscript().unwrap();
        assert_eq!(ScriptDescriptor::try_from(miniscript.clone()).unwrap(), descriptor);
        assert_eq!(
            miniscript.to_string(),
            descriptor.to_string_with_checksum().unwrap()
        );
        assert!(descriptor
            .to_string_with_checksum()
            .unwrap()
            .starts_with(&format!("{}#", descriptor)));
    }

    #[test]
    fn key_limits() {
        let key = KeyExpression::from_str(&format!("{}/0/*", X1)).unwrap();
        let keys = vec![key.clone(); 16];
        let multi = SortedMulti::new(2, keys.clone()).unwrap();
        assert_eq!(
            ScriptDescriptor::multisig(DescriptorType::ShSortedMulti, multi.clone()),
            Err(TemplateError::TooManyKeys {
                descriptor_type: DescriptorType::ShSortedMulti,
                keys: 16,
                max: 15
            })
        );
        assert!(ScriptDescriptor::multisig(DescriptorType::WshSortedMulti, multi.clone()).is_ok());
        assert_eq!(
            ScriptDescriptor::multisig(DescriptorType::Wpkh, multi),
            Err(TemplateError::SingleSigTemplate(DescriptorType::Wpkh))
        );
        assert_eq!(
            ScriptDescriptor::single_sig(DescriptorType::WshSortedMulti, key),
            Err(TemplateError::MultisigTemplate(DescriptorType::WshSortedMulti))
        );
        assert_eq!(SortedMulti::new(1, vec![]), Err(TemplateError::NoKeys));
    }
}
