pub mod content;
pub mod export;
pub mod translations;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use form_content::ContentDocument;
use serde::Serialize;
use serde_json::Value;

pub const STDIN: &str = "-";

#[derive(Args, Debug, Clone)]
pub struct IoArgs {
    /// Content document as JSON; `-` reads stdin
    #[arg(value_name = "CONTENT", default_value = STDIN)]
    pub input: PathBuf,
    /// Write the result to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

pub fn read_raw(path: &Path) -> Result<Value> {
    let text = if path.as_os_str() == STDIN {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read content from stdin")?;
        buffer
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Parses and validates without assigning row keys.
pub fn load_document(path: &Path) -> Result<ContentDocument> {
    let raw = read_raw(path)?;
    ContentDocument::from_value(raw)
        .with_context(|| format!("invalid content document {}", path.display()))
}

pub fn emit_json<T: Serialize + ?Sized>(value: &T, out: Option<&Path>) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    payload.push('\n');
    write_output(payload.as_bytes(), out)
}

pub fn write_output(bytes: &[u8], out: Option<&Path>) -> Result<()> {
    let Some(path) = out else {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(bytes)
            .context("failed to write to stdout")?;
        return stdout.flush().context("failed to flush stdout");
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
