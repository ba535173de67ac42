//! SID lookup command implementation

use super::{load_service, report_failure, write_json, EXIT_BAD_REQUEST};
use chrono::NaiveDate;
use clap::Args;

/// Arguments for the lookup-sid command
#[derive(Args, Debug)]
pub struct LookupSidArgs {
    /// FNR to map to its SNR
    #[arg(long, conflicts_with = "snr", required_unless_present = "snr")]
    pub fnr: Option<String>,

    /// SNR to map back to its FNR
    #[arg(long)]
    pub snr: Option<String>,

    /// Snapshot date (YYYY-MM-DD), latest when omitted
    #[arg(long)]
    pub snapshot: Option<String>,
}

impl LookupSidArgs {
    /// Execute the lookup-sid command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let snapshot = match self.snapshot.as_deref().map(str::parse::<NaiveDate>).transpose() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Invalid snapshot date: {e}");
                return Ok(EXIT_BAD_REQUEST);
            }
        };

        let service = match load_service(config_path) {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let result = match (&self.fnr, &self.snr) {
            (Some(fnr), _) => service.lookup_fnr(fnr, snapshot),
            (None, Some(snr)) => service.lookup_snr(snr, snapshot),
            (None, None) => {
                eprintln!("❌ One of --fnr or --snr is required");
                return Ok(EXIT_BAD_REQUEST);
            }
        };

        match result {
            Ok(lookup) => {
                tracing::info!(
                    found = lookup.value.is_some(),
                    snapshot_date = %lookup.snapshot_date,
                    "SID lookup completed"
                );
                write_json(&lookup, None)?;
                Ok(0)
            }
            Err(e) => Ok(report_failure(&e, "SID lookup failed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_parse_lookup_fnr() {
        let cli = Cli::parse_from([
            "pseudo-service",
            "lookup-sid",
            "--fnr",
            "11854898347",
            "--snapshot",
            "2023-04-25",
        ]);
        match cli.command {
            Commands::LookupSid(args) => {
                assert_eq!(args.fnr.as_deref(), Some("11854898347"));
                assert_eq!(args.snapshot.as_deref(), Some("2023-04-25"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_fnr_and_snr_conflict() {
        let result = Cli::try_parse_from([
            "pseudo-service",
            "lookup-sid",
            "--fnr",
            "1",
            "--snr",
            "2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_lookup_requires_identifier() {
        assert!(Cli::try_parse_from(["pseudo-service", "lookup-sid"]).is_err());
    }
}
