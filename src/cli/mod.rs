//! # Command Line Interface
//!
//! `pkiproxy issue` requests one certificate from the configured issuer and
//! prints the PEM bundle; `pkiproxy check-config` only validates the
//! configuration. Both read the same `PKIPROXY_*` environment the proxy uses.

use crate::config::{LoggingConfig, Settings};
use crate::issuers::encoding::parse_duration;
use crate::issuers::{CertificateRequest, Issuer};
use crate::observability::{init_logging, log_config_info};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pkiproxy")]
#[command(about = "Issue certificates from Vault PKI, CFSSL or AWS ACM PCA")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Issue a single certificate and print it
    Issue(IssueArgs),

    /// Validate the configuration without contacting the CA
    CheckConfig,
}

#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Common name of the certificate
    #[arg(long)]
    pub common_name: String,

    /// URI SAN, may be repeated
    #[arg(long = "uri-san")]
    pub uri_sans: Vec<String>,

    /// OID/UTF8 SAN in `<oid>;UTF8:<value>` form, may be repeated
    #[arg(long = "other-san")]
    pub other_sans: Vec<String>,

    /// Requested lifetime, e.g. `24h` or `1h30m`
    #[arg(long, value_parser = parse_ttl)]
    pub ttl: Option<Duration>,

    /// Keep the common name out of the SANs
    #[arg(long)]
    pub exclude_cn_from_sans: bool,

    /// PEM CSR to sign instead of letting the CA generate a key
    #[arg(long)]
    pub csr: Option<PathBuf>,
}

fn parse_ttl(value: &str) -> Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

impl IssueArgs {
    fn into_request(self) -> anyhow::Result<CertificateRequest> {
        let mut request = CertificateRequest::new(self.common_name);
        request.uri_sans = self.uri_sans;
        request.other_sans = self.other_sans;
        request.exclude_cn_from_sans = self.exclude_cn_from_sans;
        if let Some(ttl) = self.ttl {
            request = request.with_ttl(ttl);
        }
        if let Some(path) = self.csr {
            let csr = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read CSR from {}", path.display()))?;
            request = request.with_csr(csr);
        }
        Ok(request)
    }
}

/// Load `.env` if present. A missing file is not an error.
fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let settings = Settings::from_env().context("failed to load configuration")?;
    let logging = if cli.verbose {
        LoggingConfig { level: "debug".to_string(), ..settings.logging.clone() }
    } else {
        settings.logging.clone()
    };
    init_logging(&logging)?;
    info!(app_name = crate::APP_NAME, version = crate::VERSION, "Starting pkiproxy");
    log_config_info(&settings);

    match cli.command {
        Commands::CheckConfig => {
            settings.issuer.validate().context("invalid configuration")?;
            println!("configuration OK ({} issuer)", settings.issuer.kind());
        }
        Commands::Issue(args) => issue(args, &settings).await?,
    }

    Ok(())
}

async fn issue(args: IssueArgs, settings: &Settings) -> anyhow::Result<()> {
    let request = args.into_request()?;
    let shutdown = CancellationToken::new();
    let issuer = Issuer::connect(&settings.issuer, &shutdown).await?;

    let result = tokio::select! {
        result = issuer.issue(&request) => result.context("certificate issuance failed"),
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };
    shutdown.cancel();
    let certificate = result?;

    info!(
        issuer = %issuer.kind(),
        serial_number = ?certificate.serial_number,
        "Certificate issued"
    );

    print!("{}", certificate.full_chain_pem());
    if let Some(key) = &certificate.private_key {
        println!("{}", key.expose_secret().trim_end());
    }
    Ok(())
}
