use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use form_content::{
    ExportOptions, SheetStandardizer, TableCollector, TabularWriter, XlsxWriter, export,
};

use super::{STDIN, emit_json, load_document, write_output};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Excel workbook
    Xlsx,
    /// The exported sheets as JSON tables
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Content document as JSON; `-` reads stdin
    #[arg(value_name = "CONTENT", default_value = STDIN)]
    pub input: PathBuf,
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,
    #[arg(long, value_enum, default_value = "xlsx")]
    pub format: ExportFormat,
    /// TOML file holding export options; flags take precedence
    #[arg(long, value_name = "export.toml")]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub kobo_specific: bool,
    #[arg(long, value_name = "TITLE")]
    pub form_title: Option<String>,
}

pub fn run(args: &ExportArgs) -> Result<()> {
    let document = load_document(&args.input)?;
    let options = resolve_options(args)?;
    let mut writer: Box<dyn TabularWriter> = match args.format {
        ExportFormat::Xlsx => Box::new(XlsxWriter::new()),
        ExportFormat::Json => Box::new(TableCollector::new()),
    };
    let bytes = export(&document, &SheetStandardizer, &options, writer.as_mut())
        .with_context(|| format!("failed to export {}", args.input.display()))?;
    write_output(&bytes, Some(args.out.as_path()))?;
    tracing::info!(path = %args.out.display(), format = ?args.format, "wrote export");
    Ok(())
}

pub fn schema() -> Result<()> {
    let schema = schemars::schema_for!(ExportOptions);
    emit_json(&schema, None)
}

fn resolve_options(args: &ExportArgs) -> Result<ExportOptions> {
    let mut options = match &args.config {
        Some(path) => load_options(path)?,
        None => ExportOptions::default(),
    };
    if args.kobo_specific {
        options.kobo_specific = true;
    }
    if let Some(title) = &args.form_title {
        options.form_title = Some(title.clone());
    }
    Ok(options)
}

pub fn load_options(path: &Path) -> Result<ExportOptions> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read export config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid export config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_fills_unset_fields_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("export.toml");
        fs::write(
            &path,
            r#"
form_title = "From config"

[[append.survey]]
type = "note"
name = "footer"
"#,
        )
        .expect("write config");
        let options = load_options(&path).expect("load config");
        assert_eq!(options.form_title.as_deref(), Some("From config"));
        assert_eq!(options.append.survey.len(), 1);
        assert_eq!(
            options.settings_defaults,
            ExportOptions::default().settings_defaults
        );
    }

    #[test]
    fn flags_override_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("export.toml");
        fs::write(&path, "form_title = \"From config\"\nkobo_specific = false\n")
            .expect("write config");
        let args = ExportArgs {
            input: PathBuf::from(STDIN),
            out: dir.path().join("out.xlsx"),
            format: ExportFormat::Xlsx,
            config: Some(path),
            kobo_specific: true,
            form_title: Some("From flag".into()),
        };
        let options = resolve_options(&args).expect("resolve");
        assert!(options.kobo_specific);
        assert_eq!(options.form_title.as_deref(), Some("From flag"));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("export.toml");
        fs::write(&path, "kobo = true\n").expect("write config");
        let err = load_options(&path).expect_err("unknown key");
        assert!(format!("{err:#}").contains("invalid export config"));
    }
}
