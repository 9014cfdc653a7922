//! The symbol-aware editor (component F): structural edits keyed by
//! name-path resolution rather than raw line offsets.
//!
//! Every operation resolves a name-path against the host's document-symbol
//! tree to a *unique* symbol before touching a buffer — zero or more than
//! one match is a hard error, never a best-effort guess. All edits go
//! through `with_edited_file`, grounded on `original_source`'s
//! `code_editor.py::_edited_file_context`: open the buffer, run the
//! mutation, and only write through to disk once the mutation succeeds —
//! an error leaves the on-disk file untouched.

use tower_lsp::lsp_types::Position;

use crate::error::CoreError;
use crate::executor::LinesRead;
use crate::host::Host;
use crate::symbol::UnifiedSymbol;

/// Resolves `name_path` within `relative_path`'s document-symbol tree to a
/// single symbol, failing on zero or multiple matches.
async fn resolve_unique(
    host: &Host,
    name_path: &str,
    relative_path: &str,
) -> Result<UnifiedSymbol, CoreError> {
    let (_, roots) = host.request_document_symbols(relative_path, false).await?;
    let mut matches: Vec<&UnifiedSymbol> = Vec::new();
    for root in &roots {
        matches.extend(root.resolve_name_path(name_path));
    }

    match matches.len() {
        0 => Err(CoreError::SymbolNotFound(name_path.to_string())),
        1 => Ok(matches[0].clone()),
        _ => Err(CoreError::AmbiguousSymbol {
            name_path: name_path.to_string(),
            locations: matches.iter().map(|s| s.location.clone()).collect(),
        }),
    }
}

/// The symbol's body-start position: its `selectionRange` start falls back
/// to `location.range` start when a response didn't carry a selection
/// range of its own.
fn body_start(symbol: &UnifiedSymbol) -> Position {
    symbol.location.range.start
}

fn body_end(symbol: &UnifiedSymbol) -> Position {
    symbol.location.range.end
}

/// Runs `mutate` against the named file's open buffer, flushing the result
/// to disk only if `mutate` succeeds, then invalidating `lines_read`'s
/// recorded ranges for that file so the "must read before edit"
/// precondition must be re-earned before the next edit.
async fn with_edited_file<T, F, Fut>(
    host: &Host,
    lines_read: &LinesRead,
    relative_path: &str,
    mutate: F,
) -> Result<T, CoreError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, CoreError>>,
{
    let result = mutate().await;
    if result.is_ok() {
        host.flush_to_disk(relative_path)?;
        lines_read.invalidate(relative_path);
    }
    result
}

/// Normalizes trailing whitespace in a body to exactly one newline.
fn normalize_trailing_newline(body: &str) -> String {
    format!("{}\n", body.trim_end_matches(['\n', '\r', ' ', '\t']))
}

/// Counts leading blank lines (lines containing only whitespace before the
/// first non-blank line) in `body`.
fn leading_blank_lines(body: &str) -> usize {
    body.lines().take_while(|l| l.trim().is_empty()).count()
}

/// Counts trailing newline characters (`\n` or `\r`) at the very end of
/// `body`, mirroring `_count_leading_newlines` run over the reversed text.
fn count_trailing_newlines(body: &str) -> usize {
    body.chars().rev().take_while(|&c| c == '\n' || c == '\r').filter(|&c| c == '\n').count()
}

/// Whether the active language conventionally separates neighboring
/// top-level definitions with a blank line. Most C-family and scripting
/// languages do; a handful of terse languages don't enforce it.
fn separates_definitions_with_blank_line(language_id: &str) -> bool {
    !matches!(language_id, "json" | "yaml" | "toml")
}

/// `replace_body(name_path, path, body)` — strips the incoming body, then
/// deletes the resolved symbol's body range and inserts the new body at its
/// start.
pub async fn replace_body(
    host: &Host,
    lines_read: &LinesRead,
    name_path: &str,
    relative_path: &str,
    body: &str,
) -> Result<(), CoreError> {
    let symbol = resolve_unique(host, name_path, relative_path).await?;
    let start = body_start(&symbol);
    let end = body_end(&symbol);
    let stripped = body.trim();

    with_edited_file(host, lines_read, relative_path, || async {
        host.delete_text_between_positions(relative_path, start, end).await?;
        host.insert_text_at_position(relative_path, start, stripped).await?;
        Ok(())
    })
    .await
}

/// `insert_after_symbol(name_path, path, body)` — inserts at the line
/// following the symbol's body end, column 0. Ensures at least one leading
/// blank line when the language separates top-level definitions that way,
/// and normalizes the body's trailing whitespace to exactly one newline.
pub async fn insert_after_symbol(
    host: &Host,
    lines_read: &LinesRead,
    name_path: &str,
    relative_path: &str,
    body: &str,
    language_id: &str,
) -> Result<(), CoreError> {
    let symbol = resolve_unique(host, name_path, relative_path).await?;
    let end = body_end(&symbol);
    let insert_line = end.line + 1;
    let position = Position { line: insert_line, character: 0 };

    let mut text = body.to_string();
    if separates_definitions_with_blank_line(language_id) && leading_blank_lines(&text) == 0 {
        text = format!("\n{text}");
    }
    let text = normalize_trailing_newline(&text);

    with_edited_file(host, lines_read, relative_path, || async {
        host.insert_text_at_position(relative_path, position, &text).await?;
        Ok(())
    })
    .await
}

/// `insert_before_symbol(name_path, path, body)` — the mirror image of
/// `insert_after_symbol`: appends newlines *after* the rstripped body
/// instead of before it, so the separating blank line lands between the
/// inserted body and the symbol that follows it rather than above the body.
pub async fn insert_before_symbol(
    host: &Host,
    lines_read: &LinesRead,
    name_path: &str,
    relative_path: &str,
    body: &str,
    language_id: &str,
) -> Result<(), CoreError> {
    let symbol = resolve_unique(host, name_path, relative_path).await?;
    let start = body_start(&symbol);
    let position = Position { line: start.line, character: 0 };

    let original_trailing_empty_lines = count_trailing_newlines(body).saturating_sub(1);
    let mut text = normalize_trailing_newline(body);

    let min_trailing_empty_lines = if separates_definitions_with_blank_line(language_id) { 1 } else { 0 };
    let num_trailing_newlines = min_trailing_empty_lines.max(original_trailing_empty_lines);
    text.push_str(&"\n".repeat(num_trailing_newlines));

    with_edited_file(host, lines_read, relative_path, || async {
        host.insert_text_at_position(relative_path, position, &text).await?;
        Ok(())
    })
    .await
}

/// `insert_at_line(path, line, content)` — raw line insertion, no symbol
/// resolution involved.
pub async fn insert_at_line(
    host: &Host,
    lines_read: &LinesRead,
    relative_path: &str,
    line: u32,
    content: &str,
) -> Result<(), CoreError> {
    let position = Position { line, character: 0 };
    with_edited_file(host, lines_read, relative_path, || async {
        host.insert_text_at_position(relative_path, position, content).await?;
        Ok(())
    })
    .await
}

/// `delete_lines(path, start_line, end_line)` — deletes `[start_line,0) ..
/// [end_line+1,0)`, i.e. both ends inclusive.
pub async fn delete_lines(
    host: &Host,
    lines_read: &LinesRead,
    relative_path: &str,
    start_line: u32,
    end_line: u32,
) -> Result<String, CoreError> {
    let start = Position { line: start_line, character: 0 };
    let end = Position { line: end_line + 1, character: 0 };
    with_edited_file(host, lines_read, relative_path, || async {
        host.delete_text_between_positions(relative_path, start, end).await
    })
    .await
}

/// `delete_symbol(name_path, path)` — deletes the resolved symbol's full
/// body range.
pub async fn delete_symbol(
    host: &Host,
    lines_read: &LinesRead,
    name_path: &str,
    relative_path: &str,
) -> Result<String, CoreError> {
    let symbol = resolve_unique(host, name_path, relative_path).await?;
    let start = body_start(&symbol);
    let end = body_end(&symbol);
    with_edited_file(host, lines_read, relative_path, || async {
        host.delete_text_between_positions(relative_path, start, end).await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trailing_newline_strips_extra_whitespace() {
        assert_eq!(normalize_trailing_newline("class B:\n    pass\n\n\n"), "class B:\n    pass\n");
        assert_eq!(normalize_trailing_newline("class B:\n    pass"), "class B:\n    pass\n");
    }

    #[test]
    fn leading_blank_lines_counts_correctly() {
        assert_eq!(leading_blank_lines("\nclass B:\n"), 1);
        assert_eq!(leading_blank_lines("class B:\n"), 0);
        assert_eq!(leading_blank_lines("\n\nclass B:\n"), 2);
    }

    #[test]
    fn count_trailing_newlines_counts_correctly() {
        assert_eq!(count_trailing_newlines("class B:\n    pass\n"), 1);
        assert_eq!(count_trailing_newlines("class B:\n    pass\n\n\n"), 3);
        assert_eq!(count_trailing_newlines("class B:\n    pass"), 0);
    }

    #[test]
    fn definitions_separator_policy_excludes_data_formats() {
        assert!(separates_definitions_with_blank_line("python"));
        assert!(separates_definitions_with_blank_line("rust"));
        assert!(!separates_definitions_with_blank_line("json"));
    }
}
