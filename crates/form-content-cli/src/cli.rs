use std::io;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;

use crate::cmd::{
    self,
    content::{FlattenArgs, NormalizeArgs, SaveArgs},
    export::ExportArgs,
    translations::{PromoteArgs, RenameArgs, SetTranslationsArgs},
};

#[derive(Parser, Debug)]
#[command(
    name = "form-content",
    about = "Normalize, translate, and export multi-language form content",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a content document and assign row keys
    Normalize(NormalizeArgs),
    /// Replace the translation list, moving translated values to match
    Translations(SetTranslationsArgs),
    /// Move the `default_language` translation to the front
    PromoteDefault(PromoteArgs),
    /// Rename one translation in place
    RenameTranslation(RenameArgs),
    /// Project the document into flat per-sheet rows
    Flatten(FlattenArgs),
    /// Run the save-time preparation pipeline
    Save(SaveArgs),
    /// Write the document as a spreadsheet
    Export(ExportArgs),
    /// Print the JSON schema of the export configuration
    Schema,
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Normalize(args) => cmd::content::normalize(&args),
        Commands::Translations(args) => cmd::translations::set(&args),
        Commands::PromoteDefault(args) => cmd::translations::promote(&args),
        Commands::RenameTranslation(args) => cmd::translations::rename(&args),
        Commands::Flatten(args) => cmd::content::flatten(&args),
        Commands::Save(args) => cmd::content::save(&args),
        Commands::Export(args) => cmd::export::run(&args),
        Commands::Schema => cmd::export::schema(),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::cmd::export::ExportFormat;

    #[test]
    fn parses_translations_subcommand() {
        let cli = Cli::try_parse_from([
            "form-content",
            "-vv",
            "translations",
            "form.json",
            "--set",
            r#"["French", "English"]"#,
        ])
        .expect("expected CLI to parse");
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Translations(args) => {
                assert_eq!(args.io.input, Path::new("form.json"));
                assert_eq!(args.set, r#"["French", "English"]"#);
                assert!(args.io.out.is_none());
            }
            _ => panic!("expected translations args"),
        }
    }

    #[test]
    fn input_defaults_to_stdin() {
        let cli =
            Cli::try_parse_from(["form-content", "normalize"]).expect("expected CLI to parse");
        match cli.command {
            Commands::Normalize(args) => assert_eq!(args.io.input, Path::new("-")),
            _ => panic!("expected normalize args"),
        }
    }

    #[test]
    fn parses_export_flags() {
        let cli = Cli::try_parse_from([
            "form-content",
            "export",
            "form.json",
            "--out",
            "form.xlsx",
            "--format",
            "json",
            "--kobo-specific",
            "--form-title",
            "Visit",
        ])
        .expect("expected CLI to parse");
        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.format, ExportFormat::Json);
                assert!(args.kobo_specific);
                assert_eq!(args.form_title.as_deref(), Some("Visit"));
                assert!(args.config.is_none());
            }
            _ => panic!("expected export args"),
        }
    }

    #[test]
    fn export_requires_an_output_path() {
        let err = Cli::try_parse_from(["form-content", "export", "form.json"])
            .expect_err("--out is required");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rename_requires_both_names() {
        Cli::try_parse_from(["form-content", "rename-translation", "--from", "English"])
            .expect_err("--to is required");
        let cli = Cli::try_parse_from([
            "form-content",
            "rename-translation",
            "--from",
            "English",
            "--to",
            "English (en)",
        ])
        .expect("expected CLI to parse");
        assert!(matches!(cli.command, Commands::RenameTranslation(_)));
    }
}
