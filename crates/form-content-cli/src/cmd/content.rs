use anyhow::{Context, Result};
use clap::Args;
use form_content::{
    ContentDocument, FlattenOptions, SaveContext, SaveOutcome, SheetStandardizer,
    adjust_content_on_save,
};
use serde::Serialize;

use super::{IoArgs, emit_json, load_document, read_raw};

#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub io: IoArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FlattenArgs {
    #[command(flatten)]
    pub io: IoArgs,
    /// Keep `$kuid`, `$autoname` and `$autovalue` columns
    #[arg(long)]
    pub kobo_specific: bool,
    /// Do not require the document's key order to be preserved
    #[arg(long)]
    pub unordered: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SaveArgs {
    #[command(flatten)]
    pub io: IoArgs,
    /// Name of the file the content was imported from
    #[arg(long, value_name = "NAME")]
    pub filename: Option<String>,
}

#[derive(Serialize)]
struct SavedContent<'a> {
    #[serde(flatten)]
    outcome: &'a SaveOutcome,
    content: &'a ContentDocument,
}

pub fn normalize(args: &NormalizeArgs) -> Result<()> {
    let raw = read_raw(&args.io.input)?;
    let document = ContentDocument::normalize(raw)
        .with_context(|| format!("invalid content document {}", args.io.input.display()))?;
    emit_json(&document, args.io.out.as_deref())
}

pub fn flatten(args: &FlattenArgs) -> Result<()> {
    let mut document = load_document(&args.io.input)?;
    if !args.unordered {
        // serde_json keeps object order, so parsed key order is meaningful.
        document = document.into_ordered();
    }
    let options = FlattenOptions {
        ordered: !args.unordered,
        kobo_specific: args.kobo_specific,
        ..FlattenOptions::default()
    };
    let content =
        form_content::flatten(&document, &options).context("failed to flatten content")?;
    emit_json(&content, args.io.out.as_deref())
}

pub fn save(args: &SaveArgs) -> Result<()> {
    let mut document = load_document(&args.io.input)?;
    let context = SaveContext {
        filename: args.filename.clone(),
    };
    let outcome = adjust_content_on_save(&mut document, &SheetStandardizer, &context)
        .context("failed to prepare content for save")?;
    for skip in &outcome.skipped {
        tracing::warn!(
            sheet = %skip.sheet,
            row = skip.row,
            column = %skip.column,
            reason = ?skip.reason,
            "translated cell left unchanged"
        );
    }
    emit_json(
        &SavedContent {
            outcome: &outcome,
            content: &document,
        },
        args.io.out.as_deref(),
    )
}
