//! Orange `.tab` interchange: a names row, a types row, a roles row, then data.

pub mod export;
pub mod import;

pub use export::{export_bytes, export_file_name, export_text, write_export, ExportArtifact};
pub use import::{
    import_into, inspect_document, is_supported_path, parse_document, read_document,
    CoercedToken, ParsedDocument, SUPPORTED_EXTENSIONS,
};
