//! CLI entry point configuration.
//!
//! The MCP transport, prompt templates, and every other agent-facing
//! surface are external collaborators to this crate (see the crate-level
//! scope note): this module only parses enough to pick a project root, a
//! `.codecore/project.toml`-configured language server, and which core
//! operation to run against it.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "universal-lsp")]
#[command(about = "Language-agnostic LSP host, symbol model, and symbol-aware editor", long_about = None)]
#[command(version)]
pub struct CliArgs {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Project root (defaults to the current directory's nearest ancestor
    /// containing `.codecore/project.toml`)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the document-symbol tree for a file
    Symbols {
        /// Path relative to the project root
        path: String,
        /// Include each symbol's body text
        #[arg(long)]
        include_body: bool,
    },
    /// Resolve a name-path to its symbol(s)
    Find {
        /// Slash-separated name-path, e.g. "MyClass/my_method"
        name_path: String,
        /// Restrict the search to one file, relative to the project root
        #[arg(long)]
        within: Option<String>,
    },
    /// List references to the symbol at a position
    References {
        path: String,
        line: u32,
        character: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        CliArgs::command().debug_assert();
    }
}
