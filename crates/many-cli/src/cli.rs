//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use many_client::modules::{account, kvstore};
use many_client::{Client, ClientError};
use many_identity::cbor::{self, Value};
use many_identity::{generate_mnemonic, Address, AnonymousIdentity, Ed25519Identity, Identity};
use many_message::RequestOptions;
use tracing::{debug, info};

use crate::config::{CliOverrides, Config};
use crate::identity::{self, IdentitySource};
use crate::output::{IdentityOutput, OutputFormat, OutputFormatter};
use crate::ExitCode;

/// Client for MANY protocol servers
#[derive(Parser, Debug)]
#[command(name = "many")]
#[command(version, about = "Client for MANY protocol servers")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Server URL
    #[arg(short, long, global = true, env = "MANY_SERVER")]
    pub server: Option<String>,

    /// PKCS#8 PEM file holding the Ed25519 key to sign with
    #[arg(long, global = true)]
    pub pem: Option<PathBuf>,

    /// BIP-39 mnemonic of the key to sign with
    #[arg(long, global = true, env = "MANY_MNEMONIC", hide_env_values = true)]
    pub mnemonic: Option<String>,

    /// Output format: table, json, quiet
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug mode (logs encoded requests and poll steps)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Stop waiting for an async result after this many seconds
    #[arg(long = "poll-deadline", global = true)]
    pub poll_deadline: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new 12-word mnemonic
    Mnemonic,

    /// Show the address of the selected identity
    Id(IdArgs),

    /// Send a request and print its result, waiting on async results
    Call(CallArgs),

    /// Key-value store commands
    Kv {
        #[command(subcommand)]
        command: KvCommands,
    },

    /// Account commands
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Write the selected key to this path as PKCS#8 PEM
    #[arg(long = "export-pem")]
    pub export_pem: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Method name, e.g. `ledger.balance`
    pub method: String,

    /// CBOR-encoded argument, as hex
    #[arg(long = "data-hex")]
    pub data_hex: Option<String>,

    /// Destination address
    #[arg(long)]
    pub to: Option<Address>,
}

#[derive(Subcommand, Debug)]
pub enum KvCommands {
    /// Show the store hash
    Info,

    /// Read a value
    Get {
        key: String,

        /// Key is given as hex
        #[arg(long)]
        hex: bool,
    },

    /// Store a value
    Put {
        key: String,
        value: String,

        /// Key and value are given as hex
        #[arg(long)]
        hex: bool,

        /// Store on behalf of this account
        #[arg(long)]
        owner: Option<Address>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AccountCommands {
    /// Show an account's name, roles and features
    Info {
        account: Address,
    },
}

impl Cli {
    /// Flags that take precedence over the config file.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            server_url: self.server.clone(),
            timeout_seconds: self.timeout,
            poll_deadline_seconds: self.poll_deadline,
            output_format: self.output.map(|f| f.to_string()),
            debug: if self.debug { Some(true) } else { None },
        }
    }

    /// Execute the CLI command with a pre-loaded configuration
    pub async fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        let format = config.output.format.parse().unwrap_or_default();
        let formatter = OutputFormatter::new(format, self.verbose);

        let source = IdentitySource::resolve(
            self.pem.as_deref(),
            self.mnemonic.as_deref(),
            &config.identity,
        );
        debug!(?source, "selected identity");

        let client = Client::connect(config.server.url.clone(), &config.http_config())?
            .with_poll_config(config.poll_config());
        let session = Session {
            client,
            key: source.load_key()?,
            formatter,
        };

        let cancel = session.client.cancellation_token();
        let on_interrupt = cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling");
                on_interrupt.cancel();
            }
        });

        let result = tokio::select! {
            result = self.command.run(&session) => result,
            _ = cancel.cancelled() => Err(ClientError::Cancelled.into()),
        };
        interrupt.abort();

        let output = result?;
        if !output.is_empty() {
            println!("{output}");
        }
        Ok(ExitCode::Success)
    }
}

/// What a command runs against: the client, the signing key and the formatter.
pub struct Session {
    pub client: Client,
    /// `None` sends as the anonymous identity.
    pub key: Option<Ed25519Identity>,
    pub formatter: OutputFormatter,
}

impl Session {
    pub fn identity(&self) -> &dyn Identity {
        match &self.key {
            Some(key) => key,
            None => &AnonymousIdentity,
        }
    }
}

impl Commands {
    /// Run the command and return what should be printed.
    pub async fn run(self, session: &Session) -> anyhow::Result<String> {
        let formatter = &session.formatter;
        let caller = session.client.as_identity(session.identity());

        match self {
            Commands::Mnemonic => Ok(match formatter.format() {
                OutputFormat::Json => serde_json::to_string_pretty(&crate::JsonResponse::success_with_command(
                    generate_mnemonic(),
                    "mnemonic",
                ))?,
                // Printed in quiet mode too.
                _ => generate_mnemonic(),
            }),

            Commands::Id(args) => {
                if let Some(path) = &args.export_pem {
                    let key = session
                        .key
                        .as_ref()
                        .ok_or_else(|| anyhow::anyhow!("the anonymous identity has no key to export"))?;
                    identity::write_pem(key, path)?;
                    formatter.progress(&format!("wrote {}", path.display()));
                }
                let info = IdentityOutput {
                    address: caller.address().to_string(),
                    public_key: session.key.as_ref().map(|k| hex::encode(k.public_key_bytes())),
                };
                Ok(formatter.format_identity(&info))
            }

            Commands::Call(args) => {
                let data = match &args.data_hex {
                    Some(text) => cbor::from_slice(&hex::decode(text.trim())?)?,
                    None => Value::Null,
                };
                let options = RequestOptions {
                    to: args.to,
                    ..Default::default()
                };
                formatter.progress(&format!("calling {}", args.method));
                let outcome = caller.call_with(&args.method, data, options).await?;
                Ok(formatter.format_value(outcome.into_value().as_ref(), "call"))
            }

            Commands::Kv { command } => match command {
                KvCommands::Info => {
                    let info = kvstore::info(&caller).await?;
                    Ok(formatter.format_kv_info(&info))
                }
                KvCommands::Get { key, hex } => {
                    let key = parse_bytes(&key, hex)?;
                    let value = kvstore::get(&caller, &key).await?;
                    Ok(formatter.format_kv_value(&key, value.as_deref()))
                }
                KvCommands::Put {
                    key,
                    value,
                    hex,
                    owner,
                } => {
                    let key = parse_bytes(&key, hex)?;
                    let value = parse_bytes(&value, hex)?;
                    kvstore::put(&caller, &key, &value, owner.as_ref()).await?;
                    Ok(formatter.format_done("stored", "kv put"))
                }
            },

            Commands::Account { command } => match command {
                AccountCommands::Info { account: address } => {
                    let info = account::info(&caller, &address).await?;
                    Ok(formatter.format_account(&address.to_string(), &info))
                }
            },
        }
    }
}

fn parse_bytes(text: &str, is_hex: bool) -> Result<Vec<u8>, hex::FromHexError> {
    if is_hex {
        hex::decode(text)
    } else {
        Ok(text.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_call() {
        let cli = Cli::try_parse_from([
            "many",
            "--server",
            "http://example.org:8000",
            "call",
            "ledger.info",
            "--data-hex",
            "a0",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://example.org:8000"));
        match cli.command {
            Commands::Call(args) => {
                assert_eq!(args.method, "ledger.info");
                assert_eq!(args.data_hex.as_deref(), Some("a0"));
                assert!(args.to.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["many", "kv", "get", "k", "--output", "json", "--timeout", "5"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert_eq!(cli.timeout, Some(5));
        assert!(matches!(
            cli.command,
            Commands::Kv {
                command: KvCommands::Get { hex: false, .. }
            }
        ));
    }

    #[test]
    fn test_cli_parse_account_address() {
        let cli = Cli::try_parse_from(["many", "account", "info", "maa"]).unwrap();
        match cli.command {
            Commands::Account {
                command: AccountCommands::Info { account },
            } => assert!(account.is_anonymous()),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["many", "account", "info", "not-an-address"]).is_err());
    }

    #[test]
    fn test_overrides_from_flags() {
        let cli = Cli::try_parse_from(["many", "--debug", "--poll-deadline", "30", "mnemonic"]).unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.debug, Some(true));
        assert_eq!(overrides.poll_deadline_seconds, Some(30));
        assert!(overrides.output_format.is_none());
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(parse_bytes("abc", false).unwrap(), b"abc");
        assert_eq!(parse_bytes("0aff", true).unwrap(), vec![0x0a, 0xff]);
        assert!(parse_bytes("zz", true).is_err());
    }
}
