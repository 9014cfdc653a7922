//! Symbol retriever (component E): a thin façade over the host exposing
//! the name-path lookup and overview helpers every tool is actually built
//! on, independent of whether the backing implementation is a real LSP
//! host or (per `original_source`) a JetBrains-plugin-backed one. This
//! crate ships the language-server-backed implementation; a JetBrains
//! bridge would implement the same `SymbolRetriever` trait.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::host::Host;
use crate::symbol::UnifiedSymbol;

/// Shared interface for anything that can resolve name-paths and references
/// over a project's symbol tree, whether backed by a spawned LSP process or
/// an external IDE plugin bridge.
#[async_trait]
pub trait SymbolRetriever: Send + Sync {
    async fn find_by_name(
        &self,
        name_path: &str,
        within_relative_path: Option<&str>,
    ) -> Result<Vec<UnifiedSymbol>, CoreError>;

    async fn request_references(
        &self,
        relative_path: &str,
        line: u32,
        character: u32,
    ) -> Result<Vec<crate::symbol::Location>, CoreError>;

    async fn request_document_symbols(
        &self,
        relative_path: &str,
        include_body: bool,
    ) -> Result<(Vec<UnifiedSymbol>, Vec<UnifiedSymbol>), CoreError>;

    /// A flat, depth-first line listing suitable for an LLM-facing "give me
    /// the shape of this file" overview: `name (kind) @ line`.
    async fn overview(&self, relative_path: &str) -> Result<Vec<String>, CoreError>;
}

/// The language-server-backed retriever: every operation is a direct call
/// through to the host.
pub struct LanguageServerRetriever<'h> {
    host: &'h Host,
}

impl<'h> LanguageServerRetriever<'h> {
    pub fn new(host: &'h Host) -> Self {
        Self { host }
    }
}

#[async_trait]
impl<'h> SymbolRetriever for LanguageServerRetriever<'h> {
    /// Resolves `name_path` against either a single file's symbol tree
    /// (`within_relative_path = Some(path)`) or the whole project tree.
    /// Per §4.D, zero or multiple matches are returned as-is — it's the
    /// *editor*'s job to treat that as an error, not the retriever's.
    async fn find_by_name(
        &self,
        name_path: &str,
        within_relative_path: Option<&str>,
    ) -> Result<Vec<UnifiedSymbol>, CoreError> {
        let roots = match within_relative_path {
            Some(path) => self.host.request_document_symbols(path, false).await?.1,
            None => self.host.request_full_symbol_tree(None, false).await?,
        };

        let mut matches = Vec::new();
        for root in &roots {
            matches.extend(root.resolve_name_path(name_path).into_iter().cloned());
        }
        Ok(matches)
    }

    async fn request_references(
        &self,
        relative_path: &str,
        line: u32,
        character: u32,
    ) -> Result<Vec<crate::symbol::Location>, CoreError> {
        self.host.request_references(relative_path, line, character).await
    }

    async fn request_document_symbols(
        &self,
        relative_path: &str,
        include_body: bool,
    ) -> Result<(Vec<UnifiedSymbol>, Vec<UnifiedSymbol>), CoreError> {
        self.host.request_document_symbols(relative_path, include_body).await
    }

    async fn overview(&self, relative_path: &str) -> Result<Vec<String>, CoreError> {
        let (flat, _) = self.host.request_document_symbols(relative_path, false).await?;
        Ok(flat
            .iter()
            .map(|s| format!("{} ({:?}) @ {}", s.name, s.kind, s.selection_range.start.line))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Location, Position, Range};
    use std::path::PathBuf;
    use tower_lsp::lsp_types::SymbolKind;

    fn leaf(name: &str, line: u32) -> UnifiedSymbol {
        let range = Range {
            start: Position { line, character: 0 },
            end: Position { line, character: 10 },
        };
        UnifiedSymbol {
            name: name.to_string(),
            kind: SymbolKind::FUNCTION,
            location: Location::new(PathBuf::from("/p/m.py"), "m.py".into(), range),
            selection_range: range,
            body: None,
            children: vec![],
        }
    }

    #[test]
    fn overview_formatting_includes_kind_and_line() {
        let symbol = leaf("foo", 2);
        let line = format!("{} ({:?}) @ {}", symbol.name, symbol.kind, symbol.selection_range.start.line);
        assert_eq!(line, "foo (FUNCTION) @ 2");
    }
}
