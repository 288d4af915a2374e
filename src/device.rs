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

use bitcoin::util::bip32::{ExtendedPubKey, Fingerprint};
use bitcoin::Network;
use bitcoin_hd::{AccountPath, Bip43, DerivationBlockchain};
use descriptors::{ChainStep, KeyExpression, KeyOrigin};
use slip132::FromSlip132;
use tracing::warn;

use crate::{Error, KeyMaterialError};

/// Key material exported by a signing device for a single account.
///
/// Fields keep the form in which the device record stores them; they are
/// validated when a descriptor is built.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DeviceKeyInfo {
    /// Master key fingerprint, 8 hex digits
    pub fingerprint: String,

    /// Account-level extended public key in any SLIP-132 encoding
    pub xpub: String,

    /// Derivation path of the account key, if known to the device record
    #[cfg_attr(feature = "serde", serde(default))]
    pub derivation_path: Option<String>,
}

impl DeviceKeyInfo {
    /// Constructs device key record without a derivation path.
    pub fn new(fingerprint: impl ToString, xpub: impl ToString) -> DeviceKeyInfo {
        DeviceKeyInfo {
            fingerprint: fingerprint.to_string(),
            xpub: xpub.to_string(),
            derivation_path: None,
        }
    }

    /// Adds a derivation path to the device key record.
    pub fn with_derivation_path(mut self, path: impl ToString) -> DeviceKeyInfo {
        self.derivation_path = Some(path.to_string());
        self
    }

    /// Parses master key fingerprint.
    pub fn master_fingerprint(&self) -> Result<Fingerprint, KeyMaterialError> {
        let fingerprint = self.fingerprint.trim();
        if fingerprint.len() != 8 || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(KeyMaterialError::Fingerprint(self.fingerprint.clone()));
        }
        Fingerprint::from_str(fingerprint)
            .map_err(|_| KeyMaterialError::Fingerprint(self.fingerprint.clone()))
    }

    /// Parses device derivation path, if present.
    pub fn account_path(&self) -> Result<Option<AccountPath>, KeyMaterialError> {
        self.derivation_path
            .as_deref()
            .map(|path| {
                AccountPath::parse_bip32(path)
                    .map_err(|_| KeyMaterialError::DerivationPath(path.to_owned()))
            })
            .transpose()
    }

    /// Builds descriptor key expression for the device.
    ///
    /// The device derivation path takes priority over `default_path`. A
    /// device path or a SLIP-132 key version which does not match `standard`
    /// is accepted and only logged. The extended key must belong to the
    /// network family of `network`.
    pub fn key_expression(
        &self,
        standard: Bip43,
        default_path: AccountPath,
        network: Network,
        chain: ChainStep,
    ) -> Result<KeyExpression, Error> {
        let fingerprint = self.master_fingerprint()?;
        let (xpub, version) = ExtendedPubKey::from_slip132_str_versioned(&self.xpub)
            .map_err(KeyMaterialError::from)?;

        if DerivationBlockchain::from(xpub.network) != DerivationBlockchain::from(network) {
            return Err(KeyMaterialError::NetworkMismatch {
                key: xpub.network,
                requested: network,
            }
            .into());
        }

        if let Some(application) = version.application() {
            if !standard.check_slip_application(application) {
                warn!(
                    "device {} provides {} key which does not match {} standard",
                    fingerprint, application, standard
                );
            }
        }

        let path = match self.account_path()? {
            Some(path) => {
                if path != default_path {
                    warn!(
                        "device {} derivation path {} overrides standard path {}",
                        fingerprint,
                        path.to_bip32_string(),
                        default_path.to_bip32_string()
                    );
                }
                path
            }
            None => default_path,
        };

        Ok(KeyExpression {
            origin: Some(KeyOrigin::new(fingerprint, path)),
            xpub,
            chain,
        })
    }
}
