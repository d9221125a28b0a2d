#![allow(missing_docs)]

pub mod autoname;
pub mod codec;
pub mod columns;
pub mod compile;
pub mod document;
pub mod export;
pub mod flatten;
pub mod identity;
pub mod row;
pub mod save;
pub mod standardize;
pub mod translations;
#[cfg(feature = "xlsx")]
pub mod xlsx;

pub use autoname::{autoname_fields, autovalue_choices, replace_with_autofields, slugify};
pub use codec::{
    adjust_readonly_for_save, decode_custom_columns, encode_custom_columns,
    namespace_media_columns, restore_media_columns, revert_readonly_after_save,
};
pub use compile::{CompileError, CompileOptions, FormCompiler, Snapshot, compile_snapshot};
pub use document::{ContentDocument, DocumentError, KeyOrder, Settings, SheetKind, Translation};
pub use export::{
    AppendRows, ExportError, ExportOptions, SheetTable, TableCollector, TabularWriter,
    WriterError, export, ordered_content,
};
pub use flatten::{FlatRow, FlattenError, FlattenOptions, SpreadsheetContent, flatten};
pub use identity::{assign_keys, link, random_id, strip_keys, unlink};
pub use row::{Cell, Row, Scalar};
pub use save::{SaveContext, SaveError, SaveOutcome, adjust_content_on_save};
pub use standardize::{SheetStandardizer, StandardizeError, Standardizer};
pub use translations::{
    RowSkip, SkipReason, TranslationDiff, TranslationError, TranslationOutcome,
    UnsupportedChange, apply_translation_list_change, compare_translations, has_translations,
    name_unnamed_translation, promote_default_language, promote_translation,
    rename_translation,
};
#[cfg(feature = "xlsx")]
pub use xlsx::XlsxWriter;
