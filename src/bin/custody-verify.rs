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

#[macro_use]
extern crate clap;
#[macro_use]
extern crate amplify;
extern crate serde_crate as serde;

use std::process::ExitCode;
use std::str::FromStr;

use bitcoin::util::bip32;
use bitcoin::Network;
use clap::{ArgAction, Parser, ValueEnum};
use colored::Colorize;
use custody::hd::{HardenedIndex, SegmentIndexes};
use custody::{
    AddressDerivationEngine, AddressOptions, DescriptorAddressOptions, DescriptorBuildOptions,
    DeviceKeyInfo, MultiSigBuildOptions, ScriptTypeRegistry,
};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command-line arguments
#[derive(Parser)]
#[derive(Clone, Eq, PartialEq, Debug)]
#[clap(
    author,
    version,
    name = "custody-verify",
    about = "Derivation paths, output descriptors and addresses for custody wallets"
)]
pub struct Args {
    /// Command to execute
    #[clap(subcommand)]
    pub command: Command,

    /// Network to derive addresses for: bitcoin (mainnet), testnet, signet or
    /// regtest.
    #[clap(short, long, global = true, default_value = "bitcoin", value_parser = parse_network)]
    pub network: Network,

    /// Output format.
    #[clap(short, long, global = true, value_enum, default_value = "json")]
    pub format: Format,

    /// Increase logging verbosity; may be repeated.
    #[clap(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Command to execute
#[derive(Subcommand)]
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Command {
    /// Derive single-key address from an account-level extended public key
    Single {
        /// Extended public key in any SLIP-132 encoding
        xpub: String,

        /// Address index
        index: u32,

        /// Script type id or alias, like `native_segwit` or `p2wpkh`
        script_type: String,

        /// Derive address from the change chain
        #[clap(long)]
        change: bool,
    },

    /// Derive sorted multisig address from account-level extended public keys
    Multi {
        /// Number of signatures required to spend
        threshold: usize,

        /// Address index
        index: u32,

        /// Multisig wrapping (`p2sh`, `p2wsh`, `p2sh_p2wsh`) or a script type
        /// id or alias
        script_type: String,

        /// Extended public keys of the signers
        #[clap(required = true)]
        xpubs: Vec<String>,

        /// Derive address from the change chain
        #[clap(long)]
        change: bool,
    },

    /// Derive addresses from an output descriptor
    Descriptor {
        /// Output descriptor, with or without checksum
        descriptor: String,

        /// First address index
        index: u32,

        /// Derive addresses from the change chain
        #[clap(long)]
        change: bool,

        /// Number of consecutive addresses to derive
        #[clap(short, long, default_value = "1")]
        count: u32,
    },

    /// Print standard account derivation path for a script type
    Path {
        /// Script type id or alias
        script_type: String,

        /// Account number
        #[clap(short, long, default_value = "0")]
        account: u32,

        /// Use multisig derivation standard (BIP-45 or BIP-48)
        #[clap(long)]
        multisig: bool,
    },

    /// Build output descriptor from device keys
    Build {
        /// Script type id or alias
        script_type: String,

        /// Device keys in `fingerprint:xpub[:path]` form; exactly one unless
        /// `--quorum` is given
        #[clap(required = true, value_parser = parse_device)]
        keys: Vec<DeviceKeyInfo>,

        /// Build multisig descriptor with the given quorum
        #[clap(short, long)]
        quorum: Option<usize>,

        /// Use change chain
        #[clap(long)]
        change: bool,
    },
}

/// Output format
#[derive(ValueEnum)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Format {
    /// JSON
    Json,
    /// YAML
    Yaml,
}

fn parse_network(s: &str) -> Result<Network, String> {
    match s.to_lowercase().as_str() {
        "mainnet" => Ok(Network::Bitcoin),
        other => Network::from_str(other).map_err(|err| err.to_string()),
    }
}

fn parse_device(s: &str) -> Result<DeviceKeyInfo, String> {
    let mut parts = s.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(fingerprint), Some(xpub), path) if !xpub.is_empty() => {
            let device = DeviceKeyInfo::new(fingerprint, xpub);
            Ok(match path {
                Some(path) => device.with_derivation_path(path),
                None => device,
            })
        }
        _ => Err(format!("device key `{}` must have `fingerprint:xpub[:path]` form", s)),
    }
}

#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// {0}
    #[from]
    Custody(custody::Error),

    /// invalid account number: {0}
    #[from]
    Account(bip32::Error),

    /// unable to serialize JSON output: {0}
    #[from]
    Json(serde_json::Error),

    /// unable to serialize YAML output: {0}
    #[from]
    Yaml(serde_yaml::Error),

    /// single-key descriptor takes exactly one device key, {0} given; use
    /// `--quorum` for multisig
    SingleKeyCount(usize),
}

#[derive(Serialize)]
#[serde(crate = "serde_crate", rename_all = "camelCase")]
struct PathReport {
    script_type: String,
    path: String,
    descriptor_path: String,
}

#[derive(Serialize)]
#[serde(crate = "serde_crate")]
struct DescriptorReport {
    descriptor: String,
}

#[derive(Serialize)]
#[serde(crate = "serde_crate")]
struct ErrorReport {
    error: String,
}

impl Format {
    fn render(self, value: &impl Serialize) -> Result<String, Error> {
        Ok(match self {
            Format::Json => serde_json::to_string_pretty(value)?,
            Format::Yaml => serde_yaml::to_string(value)?,
        })
    }
}

impl Args {
    pub fn exec(&self) -> Result<String, Error> {
        let registry = ScriptTypeRegistry::with_builtin();
        let engine = AddressDerivationEngine::new(&registry);
        let network = self.network;

        match &self.command {
            Command::Single {
                xpub,
                index,
                script_type,
                change,
            } => {
                let opts = AddressOptions::new(script_type, network).with_change(*change);
                let address = engine.derive_address(xpub, *index, &opts)?;
                self.format.render(&address)
            }
            Command::Multi {
                threshold,
                index,
                script_type,
                xpubs,
                change,
            } => {
                let opts = AddressOptions::new(script_type, network).with_change(*change);
                let address =
                    engine.derive_multisig_address(xpubs.as_slice(), *threshold, *index, &opts)?;
                self.format.render(&address)
            }
            Command::Descriptor {
                descriptor,
                index,
                change,
                count,
            } => {
                let opts = DescriptorAddressOptions {
                    network,
                    change: *change,
                };
                if *count == 1 {
                    let address =
                        engine.derive_address_from_descriptor(descriptor, *index, &opts)?;
                    self.format.render(&address)
                } else {
                    let addresses =
                        engine.derive_address_range(descriptor, *index, *count, &opts)?;
                    self.format.render(&addresses)
                }
            }
            Command::Path {
                script_type,
                account,
                multisig,
            } => {
                let account = HardenedIndex::from_index(*account)?;
                let handler = registry.resolve(script_type)?;
                let path = if *multisig {
                    registry.multisig_derivation_path(script_type, network, account)?
                } else {
                    registry.derivation_path(script_type, network, account)?
                };
                self.format.render(&PathReport {
                    script_type: handler.id().to_owned(),
                    path: path.to_bip32_string(),
                    descriptor_path: path.to_descriptor_string(),
                })
            }
            Command::Build {
                script_type,
                keys,
                quorum,
                change,
            } => {
                let descriptor = match quorum {
                    Some(quorum) => {
                        let opts = MultiSigBuildOptions::new(network, *quorum).with_change(*change);
                        registry.build_multisig_descriptor(script_type, keys, &opts)?
                    }
                    None => {
                        let opts = DescriptorBuildOptions {
                            network,
                            change: *change,
                        };
                        let device = match keys.as_slice() {
                            [device] => device,
                            keys => return Err(Error::SingleKeyCount(keys.len())),
                        };
                        registry.build_single_sig_descriptor(script_type, device, &opts)?
                    }
                };
                let descriptor = descriptor
                    .to_string_with_checksum()
                    .map_err(custody::Error::from)?;
                self.format.render(&DescriptorReport { descriptor })
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.exec() {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let report = ErrorReport {
                error: err.to_string(),
            };
            if let Ok(output) = args.format.render(&report) {
                println!("{}", output);
            }
            eprintln!("{}: {}\n", "Error".bright_red(), err);
            ExitCode::FAILURE
        }
    }
}
