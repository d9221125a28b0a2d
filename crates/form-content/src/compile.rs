//! Hand-off to an external form compiler.

use serde::Serialize;
use thiserror::Error;

use crate::autoname;
use crate::columns::{FORM_TITLE, ID_STRING};
use crate::document::ContentDocument;
use crate::identity;
use crate::save::{self, SaveError};
use crate::standardize::Standardizer;
use crate::translations::RowSkip;

pub const DEFAULT_ROOT_NODE: &str = "data";

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("failed to prepare content for compilation: {0}")]
    Prepare(#[from] SaveError),
    #[error("form compiler rejected content: {message}")]
    Rejected { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileOptions {
    pub form_title: Option<String>,
    pub id_string: Option<String>,
    pub root_node_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            form_title: None,
            id_string: None,
            root_node_name: DEFAULT_ROOT_NODE.to_string(),
        }
    }
}

/// Renders a prepared document into a form definition.
pub trait FormCompiler {
    fn compile(
        &self,
        source: &ContentDocument,
        options: &CompileOptions,
    ) -> Result<String, CompileError>;

    /// Whether the compiler understands row keys and the `$prev` chain.
    fn wants_internal_fields(&self) -> bool {
        false
    }
}

/// Prepared source plus its rendered form.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub source: ContentDocument,
    pub rendered: String,
    pub skipped: Vec<RowSkip>,
}

/// Prepares a copy of `document` the way a save would (without assigning
/// keys) and hands it to `compiler`. The input is left untouched.
pub fn compile_snapshot(
    document: &ContentDocument,
    standardizer: &dyn Standardizer,
    compiler: &dyn FormCompiler,
) -> Result<Snapshot, CompileError> {
    let mut source = document.clone();
    let skipped = save::prepare_content(&mut source, standardizer)?;
    autoname::autoname_fields(&mut source);
    autoname::autovalue_choices(&mut source);
    save::remove_empty_expressions(&mut source);
    if !compiler.wants_internal_fields() {
        identity::strip_keys(&mut source);
        identity::unlink(&mut source);
    }

    let options = CompileOptions {
        form_title: source.setting_str(FORM_TITLE).map(str::to_string),
        id_string: source.setting_str(ID_STRING).map(str::to_string),
        ..CompileOptions::default()
    };
    let rendered = compiler.compile(&source, &options)?;
    tracing::info!(bytes = rendered.len(), "compiled snapshot");
    Ok(Snapshot {
        source,
        rendered,
        skipped,
    })
}
