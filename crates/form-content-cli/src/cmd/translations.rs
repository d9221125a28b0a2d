use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use form_content::{
    ContentDocument, Translation, TranslationOutcome, apply_translation_list_change,
    promote_default_language, rename_translation,
};

use super::{IoArgs, emit_json, load_document};

#[derive(Args, Debug, Clone)]
pub struct SetTranslationsArgs {
    #[command(flatten)]
    pub io: IoArgs,
    /// New translation list as a JSON array of names; `null` is the unnamed translation
    #[arg(long = "set", value_name = "JSON")]
    pub set: String,
}

#[derive(Args, Debug, Clone)]
pub struct PromoteArgs {
    #[command(flatten)]
    pub io: IoArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RenameArgs {
    #[command(flatten)]
    pub io: IoArgs,
    #[arg(long, value_name = "NAME")]
    pub from: String,
    #[arg(long, value_name = "NAME")]
    pub to: String,
}

pub fn set(args: &SetTranslationsArgs) -> Result<()> {
    let proposed: Vec<Translation> = serde_json::from_str(&args.set)
        .context("--set expects a JSON array of translation names or null")?;
    let mut document = load_document(&args.io.input)?;
    let outcome = apply_translation_list_change(&mut document, &proposed)
        .context("failed to change translations")?;
    finish(&document, &outcome, args.io.out.as_deref())
}

pub fn promote(args: &PromoteArgs) -> Result<()> {
    let mut document = load_document(&args.io.input)?;
    let outcome =
        promote_default_language(&mut document).context("failed to promote default language")?;
    finish(&document, &outcome, args.io.out.as_deref())
}

pub fn rename(args: &RenameArgs) -> Result<()> {
    let mut document = load_document(&args.io.input)?;
    rename_translation(
        &mut document,
        &Translation::named(args.from.as_str()),
        &Translation::named(args.to.as_str()),
    )
    .with_context(|| format!("failed to rename translation '{}'", args.from))?;
    tracing::info!(from = %args.from, to = %args.to, "translation renamed");
    emit_json(&document, args.io.out.as_deref())
}

fn finish(
    document: &ContentDocument,
    outcome: &TranslationOutcome,
    out: Option<&Path>,
) -> Result<()> {
    tracing::info!(
        change = ?outcome.applied,
        skipped = outcome.skipped.len(),
        "translations updated"
    );
    for skip in &outcome.skipped {
        tracing::warn!(
            sheet = %skip.sheet,
            row = skip.row,
            column = %skip.column,
            reason = ?skip.reason,
            "translated cell left unchanged"
        );
    }
    emit_json(document, out)
}
