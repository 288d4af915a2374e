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

use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::util::bip32::{ChildNumber, ExtendedPubKey, Fingerprint};
use bitcoin::PublicKey;
use bitcoin_hd::{AccountPath, UnhardenedIndex};
use miniscript::MiniscriptKey;
use slip132::FromSlip132;

use crate::{DeriveError, ParseError};

/// Origin of an account-level extended key: fingerprint of the master key and
/// derivation path from it.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct KeyOrigin {
    /// Master key fingerprint
    pub fingerprint: Fingerprint,

    /// Derivation path from the master key to the account key
    pub path: AccountPath,
}

impl KeyOrigin {
    /// Constructs key origin from its parts.
    pub fn new(fingerprint: Fingerprint, path: AccountPath) -> KeyOrigin {
        KeyOrigin { fingerprint, path }
    }
}

impl Display for KeyOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fingerprint)?;
        Display::fmt(&self.path, f)
    }
}

impl FromStr for KeyOrigin {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (fingerprint, path) = s.split_at(s.find('/').unwrap_or(s.len()));
        if fingerprint.len() != 8 || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseError::InvalidFingerprint(fingerprint.to_owned()));
        }
        let fingerprint = Fingerprint::from_str(fingerprint)
            .map_err(|_| ParseError::InvalidFingerprint(fingerprint.to_owned()))?;
        let path = match path {
            "" => AccountPath::new(),
            path => AccountPath::from_str(path)
                .map_err(|_| ParseError::InvalidOriginPath(path.to_owned()))?,
        };
        Ok(KeyOrigin { fingerprint, path })
    }
}

/// Chain step following the account-level extended key in a key expression.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
pub enum ChainStep {
    /// Receive chain, `/0`
    #[display("0")]
    Receive,

    /// Change chain, `/1`
    #[display("1")]
    Change,

    /// Both chains at once, `/<0;1>` (BIP-389)
    #[display("<0;1>")]
    Multipath,
}

impl ChainStep {
    /// Constructs fixed chain step for a receive or change chain.
    pub fn with_change(change: bool) -> ChainStep {
        if change {
            ChainStep::Change
        } else {
            ChainStep::Receive
        }
    }

    /// Index of the chain which is used for derivation.
    ///
    /// The multipath step selects its first (receive) or second (change)
    /// element. A fixed step must match the requested chain.
    pub fn index(self, change: bool) -> Result<UnhardenedIndex, ParseError> {
        match (self, change) {
            (ChainStep::Receive, false) | (ChainStep::Change, true) | (ChainStep::Multipath, _) => {
                Ok(UnhardenedIndex::from(change as u8))
            }
            (chain, change) => Err(ParseError::ChainMismatch {
                chain,
                requested: ChainStep::with_change(change),
            }),
        }
    }
}

impl FromStr for ChainStep {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(ChainStep::Receive),
            "1" => Ok(ChainStep::Change),
            "<0;1>" => Ok(ChainStep::Multipath),
            other => Err(ParseError::UnsupportedTerminal(format!("/{}/*", other))),
        }
    }
}

/// Key expression of a descriptor: `[fingerprint/path]xpub/chain/*`.
///
/// The origin is optional when parsing. Extended keys may use any SLIP-132
/// version on input and are always rendered as `xpub` or `tpub`.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct KeyExpression {
    /// Key origin information
    pub origin: Option<KeyOrigin>,

    /// Account-level extended public key
    pub xpub: ExtendedPubKey,

    /// Chain step preceding the address index wildcard
    pub chain: ChainStep,
}

impl Display for KeyExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(origin) = &self.origin {
            f.write_str("[")?;
            Display::fmt(origin, f)?;
            f.write_str("]")?;
        }
        write!(f, "{}/", self.xpub)?;
        Display::fmt(&self.chain, f)?;
        f.write_str("/*")
    }
}

impl FromStr for KeyExpression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(char::is_whitespace) {
            return Err(ParseError::UnexpectedWhitespace(s.to_owned()));
        }
        let (origin, rest) = match s.strip_prefix('[') {
            Some(rest) => {
                let (origin, rest) = rest
                    .split_once(']')
                    .ok_or_else(|| ParseError::UnclosedOrigin(s.to_owned()))?;
                (Some(KeyOrigin::from_str(origin)?), rest)
            }
            None => (None, s),
        };

        let (xpub, terminal) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
        if xpub.is_empty() {
            return Err(ParseError::MissingKey);
        }
        let xpub = ExtendedPubKey::from_slip132_str(xpub)?;

        let chain = terminal
            .strip_prefix('/')
            .and_then(|terminal| terminal.strip_suffix("/*"))
            .ok_or_else(|| ParseError::UnsupportedTerminal(terminal.to_owned()))?;
        let chain = ChainStep::from_str(chain)?;

        Ok(KeyExpression {
            origin,
            xpub,
            chain,
        })
    }
}

impl MiniscriptKey for KeyExpression {
    type Sha256 = Self;
    type Hash256 = Self;
    type Ripemd160 = Self;
    type Hash160 = Self;
}

impl KeyExpression {
    /// Derives public key at `chain/index`, where the chain is selected by
    /// `change` flag. Fails if the key has a fixed chain step other than the
    /// requested one.
    pub fn derive_public_key<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        change: bool,
        index: UnhardenedIndex,
    ) -> Result<PublicKey, DeriveError> {
        let path = [
            ChildNumber::from(self.chain.index(change)?),
            ChildNumber::from(index),
        ];
        let derived = self.xpub.derive_pub(secp, &path)?;
        Ok(PublicKey::new(derived.public_key))
    }
}
