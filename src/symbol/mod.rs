//! The unified symbol model: positions, ranges, locations, and the
//! normalized symbol tree produced from heterogeneous LSP responses.
//!
//! `Position`/`Range` are re-exported from the LSP wire types directly since
//! their semantics (0-based, UTF-16 code units, exclusive range end) already
//! match this crate's contract; `Location` and `UnifiedSymbol` are this
//! crate's own normalized shapes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{self, SymbolKind};

pub use lsp_types::{Position, Range};

/// A location inside the project, always carrying both the LSP URI and the
/// derived absolute/relative filesystem paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
    pub absolute_path: PathBuf,
    pub relative_path: String,
}

impl Location {
    pub fn new(absolute_path: PathBuf, relative_path: String, range: Range) -> Self {
        let uri = path_to_file_uri(&absolute_path);
        Self {
            uri,
            range,
            absolute_path,
            relative_path,
        }
    }
}

pub fn path_to_file_uri(path: &Path) -> String {
    url::Url::from_file_path(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("file://{}", path.display()))
}

/// The canonical symbol, normalizing LSP `DocumentSymbol` and
/// `SymbolInformation` into one shape.
///
/// `children` is owned and in source order. There is deliberately no `parent`
/// back-pointer on this type: owned trees with back-pointers require either
/// `Rc`/`Weak` machinery or an arena, and nothing in the public API actually
/// needs "get this symbol's parent" on a *returned* tree — containing-symbol
/// lookups (`Host::request_containing_symbol`) work over the flat list
/// produced alongside the tree and pick the innermost enclosing range
/// directly, with no parent pointers involved. The returned `UnifiedSymbol`
/// stays a plain, cheaply-serializable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
    pub selection_range: Range,
    pub body: Option<String>,
    pub children: Vec<UnifiedSymbol>,
}

impl UnifiedSymbol {
    /// Synthesizes a File(1) symbol spanning the whole document, wrapping the
    /// document's own top-level symbols as children.
    pub fn synthetic_file(
        relative_path: String,
        absolute_path: PathBuf,
        line_count: usize,
        last_line_len: usize,
        children: Vec<UnifiedSymbol>,
    ) -> Self {
        let end = Position {
            line: line_count as u32,
            character: last_line_len as u32,
        };
        let range = Range {
            start: Position { line: 0, character: 0 },
            end,
        };
        let name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&relative_path)
            .to_string();
        Self {
            name,
            kind: SymbolKind::FILE,
            location: Location::new(absolute_path, relative_path, range),
            selection_range: range,
            body: None,
            children,
        }
    }

    /// Synthesizes a Package(4) symbol for a directory, wrapping its files
    /// and sub-packages.
    pub fn synthetic_package(
        relative_path: String,
        absolute_path: PathBuf,
        children: Vec<UnifiedSymbol>,
    ) -> Self {
        let range = Range {
            start: Position { line: 0, character: 0 },
            end: Position { line: 0, character: 0 },
        };
        let name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&relative_path)
            .to_string();
        Self {
            name,
            kind: SymbolKind::PACKAGE,
            location: Location::new(absolute_path, relative_path, range),
            selection_range: range,
            body: None,
            children,
        }
    }

    /// Walks this subtree depth-first, visiting this node before its children.
    pub fn walk_preorder<'a>(&'a self, visit: &mut impl FnMut(&'a UnifiedSymbol)) {
        visit(self);
        for child in &self.children {
            child.walk_preorder(visit);
        }
    }

    /// Resolves a name-path against this symbol's subtree (inclusive of
    /// this symbol). A leading slash anchors matching at this symbol's
    /// direct children ("roots") rather than at any descendant depth.
    pub fn resolve_name_path(&self, name_path: &str) -> Vec<&UnifiedSymbol> {
        let anchored = name_path.starts_with('/');
        let segments: Vec<&str> = name_path.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Vec::new();
        }
        if anchored {
            resolve_anchored(&self.children, &segments)
        } else {
            let mut found = Vec::new();
            collect_unanchored_matches(self, &segments, &mut found);
            found
        }
    }
}

fn resolve_anchored<'a>(roots: &'a [UnifiedSymbol], segments: &[&str]) -> Vec<&'a UnifiedSymbol> {
    let mut current: Vec<&UnifiedSymbol> = roots.iter().filter(|s| s.name == segments[0]).collect();
    for seg in &segments[1..] {
        let mut next = Vec::new();
        for sym in current {
            next.extend(sym.children.iter().filter(|c| c.name == *seg));
        }
        current = next;
    }
    current
}

/// Finds every descendant (at any depth) whose name matches `segments[0]`
/// and whose descendants then match the remaining segments consecutively.
fn collect_unanchored_matches<'a>(node: &'a UnifiedSymbol, segments: &[&str], out: &mut Vec<&'a UnifiedSymbol>) {
    if node.name == segments[0] {
        if segments.len() == 1 {
            out.push(node);
        } else {
            let rest = resolve_anchored(&node.children, &segments[1..]);
            out.extend(rest);
        }
    }
    for child in &node.children {
        collect_unanchored_matches(child, segments, out);
    }
}

/// Checks invariant 3: a parent's body range strictly encloses the child's
/// selection range.
pub fn encloses_strictly(parent: Range, child: Range) -> bool {
    position_lt(parent.start, child.start) && position_lt(child.end, parent.end)
}

fn position_lt(a: Position, b: Position) -> bool {
    (a.line, a.character) < (b.line, b.character)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_range() -> Range {
        Range {
            start: Position { line: 0, character: 0 },
            end: Position { line: 0, character: 0 },
        }
    }

    fn leaf(name: &str) -> UnifiedSymbol {
        UnifiedSymbol {
            name: name.to_string(),
            kind: SymbolKind::FUNCTION,
            location: Location::new(PathBuf::from("/p/m.py"), "m.py".to_string(), zero_range()),
            selection_range: zero_range(),
            body: None,
            children: Vec::new(),
        }
    }

    #[test]
    fn resolve_simple_name_path() {
        let class_sym = UnifiedSymbol {
            children: vec![leaf("bar")],
            ..leaf("Foo")
        };
        let found = class_sym.resolve_name_path("Foo/bar");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "bar");
    }

    #[test]
    fn resolve_unanchored_matches_any_depth() {
        let inner = UnifiedSymbol { children: vec![leaf("target")], ..leaf("Inner") };
        let outer = UnifiedSymbol { children: vec![inner], ..leaf("Outer") };
        let found = outer.resolve_name_path("target");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn encloses_strictly_rejects_equal_bounds() {
        let r = Range {
            start: Position { line: 0, character: 0 },
            end: Position { line: 5, character: 0 },
        };
        assert!(!encloses_strictly(r, r));
    }
}
