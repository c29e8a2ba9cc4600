use clap::{Args, Parser, Subcommand, ValueEnum};
use rfc2136::{
    OwnerScope, ProviderConfig, Protocol, Record, RecordProvider, Rfc2136Error, Rfc2136Provider,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Manage DNS records on a nameserver through RFC 2136 dynamic updates
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file; RFC2136_* environment variables are used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Nameserver address (host or host:port)
    #[arg(short, long)]
    nameserver: Option<String>,

    /// TSIG key name
    #[arg(long)]
    key_name: Option<String>,

    /// TSIG algorithm (hmac-sha1, hmac-sha256, hmac-sha384, hmac-sha512)
    #[arg(long)]
    key_algorithm: Option<String>,

    /// Base64 TSIG secret (prefer RFC2136_TSIG_SECRET to keep it out of the process list)
    #[arg(long)]
    secret: Option<String>,

    /// Exchange timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Send over TCP only
    #[arg(long)]
    tcp: bool,

    /// Write records under their own name instead of the zone apex
    #[arg(long)]
    record_names: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every record of a zone
    List {
        /// Zone name
        zone: String,
    },
    /// Add a record, keeping existing records of the same name and type
    Append(RecordArgs),
    /// Replace the records of a name and type with one record
    Set(RecordArgs),
    /// Delete a record matching name, type and value
    Delete(RecordArgs),
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Zone name
    zone: String,
    /// Owner name
    name: String,
    /// Record type mnemonic (A, AAAA, CNAME, MX, TXT)
    #[arg(value_name = "TYPE")]
    rtype: String,
    /// Record value in presentation format
    value: String,
    /// TTL in seconds
    #[arg(long, default_value = "300")]
    ttl: u64,
}

impl RecordArgs {
    fn record(&self) -> Record {
        Record::new(
            &self.name,
            &self.rtype,
            &self.value,
            Duration::from_secs(self.ttl),
        )
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One record per line
    Human,
    /// JSON array of records
    Json,
}

impl Cli {
    fn provider_config(&self) -> Result<ProviderConfig, Rfc2136Error> {
        let mut config = match &self.config {
            Some(path) => ProviderConfig::from_file(path)?,
            None => ProviderConfig::from_env()?,
        };

        if let Some(nameserver) = &self.nameserver {
            config.nameserver = nameserver.clone();
        }
        if let Some(key_name) = &self.key_name {
            config.tsig_keyname = key_name.clone();
        }
        if let Some(algorithm) = &self.key_algorithm {
            config.tsig_algorithm = algorithm.clone();
        }
        if let Some(secret) = &self.secret {
            config.tsig_secret = secret.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if self.tcp {
            config.protocol = Protocol::Tcp;
        }
        if self.record_names {
            config.owner_scope = OwnerScope::RecordName;
        }

        config.validate()?;
        Ok(config)
    }
}

fn print_records(records: &[Record], output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Human => {
            for record in records {
                println!("{}", record);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let provider = Rfc2136Provider::new(cli.provider_config()?)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c.cancel();
        }
    });

    let result = match &cli.command {
        Command::List { zone } => provider.get_records(zone, &cancel).await,
        Command::Append(args) => {
            provider
                .append_records(&args.zone, &[args.record()], &cancel)
                .await
        }
        Command::Set(args) => {
            provider
                .set_records(&args.zone, &[args.record()], &cancel)
                .await
        }
        Command::Delete(args) => {
            provider
                .delete_records(&args.zone, &[args.record()], &cancel)
                .await
        }
    };

    match result {
        Ok(records) => print_records(&records, cli.output),
        Err(e) => {
            error!("{}", e);
            if !e.applied().is_empty() {
                print_records(e.applied(), cli.output)?;
            }
            Err(e.into())
        }
    }
}
