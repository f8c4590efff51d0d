use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use cobranca_providers::{PaymentMethod, ProviderId};

#[derive(Parser, Debug)]
#[command(author, version, about = "Brazilian bank charge adapters from the command line", long_about = None)]
pub struct Args {
    /// Fallback log filter when RUST_LOG is unset
    #[arg(long, global = true, env = "COBRANCA_LOG")]
    pub log_filter: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Seal a JSON file into a credential envelope
    Encrypt {
        /// JSON file to seal
        input: PathBuf,
    },

    /// Open a credential envelope and print its JSON
    Decrypt {
        /// Envelope string; read from --file when omitted
        envelope: Option<String>,

        /// File holding the envelope
        #[arg(long, conflicts_with = "envelope")]
        file: Option<PathBuf>,
    },

    /// Print the deterministic session id for a set of credentials
    SessionId {
        #[command(flatten)]
        target: Target,
    },

    /// Resolve (and cache) a session, printing the stored entry
    Session {
        #[command(flatten)]
        target: Target,

        /// Provider config applied to this resolution only
        #[arg(long)]
        config_override: Option<PathBuf>,

        /// Drop any cached entry first
        #[arg(long)]
        force_refresh: bool,
    },

    /// List the supported providers and their capabilities
    Providers,

    /// Operations these credentials are authorized for
    Operations {
        #[command(flatten)]
        target: Target,
    },

    /// Create, retrieve or cancel a charge
    Charge {
        #[command(subcommand)]
        action: ChargeAction,
    },

    /// Fetch one page of the account statement
    Statement {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        page_size: Option<u32>,

        #[arg(long)]
        agency: Option<String>,

        #[arg(long)]
        account: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChargeAction {
    Create {
        #[command(flatten)]
        target: Target,

        /// Charge request JSON file
        #[arg(long)]
        request: PathBuf,
    },

    Get {
        #[command(flatten)]
        target: Target,

        /// Provider-side charge id
        id: String,
    },

    Cancel {
        #[command(flatten)]
        target: Target,

        /// Provider-side charge id
        id: String,

        /// Restrict the attempt to one rail
        #[arg(long, value_enum)]
        method: Option<MethodArg>,

        #[arg(long)]
        reason: Option<String>,
    },
}

/// Which provider to talk to and with what material.
#[derive(ClapArgs, Debug, Clone)]
pub struct Target {
    #[arg(long, value_parser = parse_provider)]
    pub provider: ProviderId,

    /// Plaintext credentials JSON file
    #[arg(long)]
    pub credentials: PathBuf,

    /// Provider config JSON file
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub tenant: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodArg {
    Boleto,
    Pix,
}

impl From<MethodArg> for PaymentMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Boleto => PaymentMethod::Boleto,
            MethodArg::Pix => PaymentMethod::Pix,
        }
    }
}

fn parse_provider(s: &str) -> Result<ProviderId, String> {
    s.parse().map_err(|e: cobranca_providers::ProviderError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_charge_cancel() {
        let args = Args::try_parse_from([
            "cobranca",
            "charge",
            "cancel",
            "--provider",
            "bb",
            "--credentials",
            "creds.json",
            "--method",
            "pix",
            "tx-1",
        ])
        .unwrap();
        match args.command {
            Commands::Charge {
                action: ChargeAction::Cancel { target, id, method, .. },
            } => {
                assert_eq!(target.provider, ProviderId::BancoDoBrasil);
                assert_eq!(id, "tx-1");
                assert_eq!(method, Some(MethodArg::Pix));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result = Args::try_parse_from([
            "cobranca",
            "operations",
            "--provider",
            "nubank",
            "--credentials",
            "creds.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_statement_dates() {
        let args = Args::try_parse_from([
            "cobranca",
            "--pretty",
            "statement",
            "--provider",
            "banco_do_brasil",
            "--credentials",
            "creds.json",
            "--start",
            "2026-10-01",
            "--end",
            "2026-10-15",
            "--page-size",
            "100",
        ])
        .unwrap();
        assert!(args.pretty);
        match args.command {
            Commands::Statement { start, end, page_size, .. } => {
                assert_eq!(start, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
                assert_eq!(end, NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
                assert_eq!(page_size, Some(100));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
