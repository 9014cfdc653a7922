//! Unified error taxonomy for the symbolic code-intelligence core.
//!
//! Framing and I/O errors are contained and logged at their origin; everything
//! that should surface to a tool caller is one of these variants.

use std::path::PathBuf;

use crate::symbol::Location;

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// The LSP child process exited while a request was outstanding.
    #[error("language server terminated: {0}")]
    LanguageServerTerminated(String),

    /// A structured error returned by the LSP server itself.
    #[error("LSP error {code}: {message}")]
    Lsp { code: i32, message: String },

    /// A request exceeded `request_timeout`.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// A reference/definition resolved outside the project root.
    #[error("path outside project: {}", .0.display())]
    PathOutsideProject(PathBuf),

    #[error("No symbol found with name path '{0}'")]
    SymbolNotFound(String),

    #[error("Multiple symbols found matching name path '{name_path}', locations: {}", format_locations(.locations))]
    AmbiguousSymbol {
        name_path: String,
        locations: Vec<Location>,
    },

    #[error("invalid UTF-8 body in JSON-RPC message")]
    InvalidEncoding,

    #[error("invalid JSON-RPC frame: {0}")]
    InvalidFrame(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

fn format_locations(locations: &[Location]) -> String {
    serde_json::to_string(locations).unwrap_or_else(|_| "[]".to_string())
}

impl CoreError {
    pub fn is_language_server_terminated(&self) -> bool {
        matches!(self, CoreError::LanguageServerTerminated(_))
    }

    /// Maps an LSP error response onto the taxonomy, remapping the ambiguous
    /// `InternalError` (-32603) only where a caller tells us the request was
    /// on the references path, where the original code is known to mislead.
    pub fn from_lsp_response(code: i32, message: String, is_references_path: bool) -> Self {
        const INTERNAL_ERROR: i32 = -32603;
        if is_references_path && code == INTERNAL_ERROR {
            CoreError::Lsp {
                code,
                message: format!(
                    "references request failed ({message}); the language server may not \
                     support textDocument/references for this file type"
                ),
            }
        } else {
            CoreError::Lsp { code, message }
        }
    }
}
