use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use docx_fill_core::{FillOptions, LedgerBackend};

/// Command line of the `docx-fill` binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "docx-fill")]
#[command(version, about = "Fill #placeholders# in .docx documents, and fill them again later")]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fill one document, or every document under a directory
    Fill(FillArgs),
    /// List the keys a filled document tracks
    Keys(KeysArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FillArgs {
    /// JSON keyword file
    #[arg(long, short = 'k', env = "DOCX_FILL_CONFIG")]
    pub keywords: PathBuf,

    /// Input .docx file or directory
    #[arg(long, short)]
    pub input: PathBuf,

    /// Output file or directory
    #[arg(long, short, env = "DOCX_FILL_OUTPUT")]
    pub output: PathBuf,

    /// Report what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Where the replacement ledger is stored (overrides the keyword file)
    #[arg(long, value_enum)]
    pub ledger: Option<BackendArg>,

    /// Also fill headers and footers
    #[arg(long)]
    pub headers_footers: bool,

    /// Forget ledger entries for keys missing from the keyword file
    #[arg(long)]
    pub cleanup_orphans: bool,

    /// Check tag balance of every rewritten part
    #[arg(long)]
    pub verify_balance: bool,
}

impl FillArgs {
    /// Flags given on the command line win over the keyword file's options.
    pub fn apply_to(&self, mut options: FillOptions) -> FillOptions {
        if let Some(ledger) = self.ledger {
            options.ledger_backend = ledger.into();
        }
        options.include_headers_footers |= self.headers_footers;
        options.cleanup_orphans |= self.cleanup_orphans;
        options.verify_balance |= self.verify_balance;
        options
    }
}

#[derive(Args, Debug, Clone)]
pub struct KeysArgs {
    /// Filled .docx document
    pub document: PathBuf,

    #[arg(long, value_enum, default_value_t = BackendArg::CustomProperty)]
    pub ledger: BackendArg,

    /// Print the ledger entries as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    CustomProperty,
    BodyMarker,
}

impl From<BackendArg> for LedgerBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::CustomProperty => LedgerBackend::CustomProperty,
            BackendArg::BodyMarker => LedgerBackend::BodyMarker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_fill_with_overrides() {
        let cli = Cli::try_parse_from([
            "docx-fill",
            "fill",
            "-k",
            "keywords.json",
            "-i",
            "in",
            "-o",
            "out",
            "--ledger",
            "body-marker",
            "--headers-footers",
        ])
        .unwrap();
        let Command::Fill(args) = cli.command else {
            panic!("expected fill");
        };
        let options = args.apply_to(FillOptions {
            verify_balance: true,
            ..FillOptions::default()
        });
        assert_eq!(options.ledger_backend, LedgerBackend::BodyMarker);
        assert!(options.include_headers_footers);
        assert!(options.verify_balance);
        assert!(!options.cleanup_orphans);
    }

    #[test]
    fn test_keys_defaults_to_custom_property() {
        let cli = Cli::try_parse_from(["docx-fill", "keys", "doc.docx", "--verbose"]).unwrap();
        assert!(cli.verbose);
        let Command::Keys(args) = cli.command else {
            panic!("expected keys");
        };
        assert_eq!(args.ledger, BackendArg::CustomProperty);
        assert!(!args.json);
    }
}
