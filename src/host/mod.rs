//! The language-server host: the public façade every tool and the editor
//! go through. One instance per active project/language pair.

pub mod buffer;
pub mod cache;
pub mod ignore_rules;
pub mod project_config;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};
use tower_lsp::lsp_types::{Position, Range, SymbolKind};

use crate::error::CoreError;
use crate::lsp_handler::{LaunchInfo, LspHandler};
use crate::symbol::{Location, UnifiedSymbol};

use buffer::LspFileBuffer;
use cache::DocumentSymbolCache;
use ignore_rules::IgnoreSpec;
use project_config::ProjectConfig;

pub struct Host {
    pub project_root: PathBuf,
    pub language_id: String,
    handler: LspHandler,
    buffers: DashMap<String, LspFileBuffer>,
    ignore_spec: IgnoreSpec,
    cache: DocumentSymbolCache,
    cross_file_wait_seconds: f64,
    cross_file_waited: AtomicBool,
    registered_workspace_symbol: AtomicBool,
}

impl Host {
    pub fn new(project_root: PathBuf, config: &ProjectConfig) -> Self {
        let ignore_spec = IgnoreSpec::build(&project_root, &config.ignored_paths, &config.language);
        let cache = DocumentSymbolCache::load(&project_root, &config.language);
        let handler = LspHandler::new(config.language.clone());
        Self {
            project_root,
            language_id: config.language.clone(),
            handler,
            buffers: DashMap::new(),
            ignore_spec,
            cache,
            cross_file_wait_seconds: config.cross_file_wait(),
            cross_file_waited: AtomicBool::new(false),
            registered_workspace_symbol: AtomicBool::new(false),
        }
    }

    pub async fn start(&self, config: &ProjectConfig) -> Result<(), CoreError> {
        let command = config
            .server_command
            .first()
            .ok_or_else(|| CoreError::ConfigError("server_command must name an executable".into()))?;
        let args = config.server_command[1..].to_vec();
        self.handler
            .set_request_timeout(config.read_timeout())
            .await;
        self.handler
            .start(LaunchInfo {
                command: command.clone(),
                args,
                cwd: self.project_root.clone(),
                env: project_config::env_for_language(&config.language),
            })
            .await?;
        self.initialize_handshake().await
    }

    async fn initialize_handshake(&self) -> Result<(), CoreError> {
        let root_uri = Location::new(self.project_root.clone(), String::new(), zero_range()).uri;
        let params = json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "capabilities": {
                "textDocument": {
                    "synchronization": { "dynamicRegistration": false },
                    "documentSymbol": { "hierarchicalDocumentSymbolSupport": true },
                    "definition": { "linkSupport": true },
                    "references": {},
                    "hover": {},
                },
                "workspace": { "symbol": { "dynamicRegistration": true } },
                "general": { "positionEncodings": ["utf-16"] },
            },
            "workspaceFolders": [{ "uri": root_uri, "name": "root" }],
        });
        self.handler.send_request("initialize", params, false).await?;
        self.handler.send_notification("initialized", json!({})).await?;
        Ok(())
    }

    pub async fn shutdown(&self) {
        let _ = self.cache.save();
        self.handler.shutdown().await;
    }

    // ---- path / ignore helpers -------------------------------------------------

    pub fn is_ignored_path(&self, relative_path: &str, ignore_unsupported_files: bool) -> bool {
        self.ignore_spec
            .is_ignored(&self.project_root, relative_path, ignore_unsupported_files)
    }

    pub fn to_absolute(&self, relative_path: &str) -> Result<PathBuf, CoreError> {
        let rel = Path::new(relative_path);
        if rel.is_absolute() {
            return Err(CoreError::PathOutsideProject(rel.to_path_buf()));
        }
        Ok(self.project_root.join(rel))
    }

    fn is_inside_project(&self, absolute: &Path) -> bool {
        absolute.starts_with(&self.project_root)
    }

    // ---- buffer lifecycle --------------------------------------------------

    async fn open_file(&self, relative_path: &str) -> Result<(), CoreError> {
        if let Some(mut buf) = self.buffers.get_mut(relative_path) {
            buf.ref_count += 1;
            return Ok(());
        }

        let absolute = self.to_absolute(relative_path)?;
        let contents = std::fs::read_to_string(&absolute)
            .map_err(|_| CoreError::FileNotFound(absolute.clone()))?;
        let uri = Location::new(absolute, relative_path.to_string(), zero_range()).uri;
        let mut buf = LspFileBuffer::new(uri.clone(), contents.clone(), self.language_id.clone());
        buf.ref_count = 1;

        self.handler
            .send_notification(
                "textDocument/didOpen",
                json!({
                    "textDocument": {
                        "uri": uri,
                        "languageId": self.language_id,
                        "version": buf.version,
                        "text": contents,
                    }
                }),
            )
            .await?;

        self.buffers.insert(relative_path.to_string(), buf);
        Ok(())
    }

    async fn close_file(&self, relative_path: &str) -> Result<(), CoreError> {
        let should_close = {
            match self.buffers.get_mut(relative_path) {
                Some(mut buf) => {
                    buf.ref_count = buf.ref_count.saturating_sub(1);
                    buf.ref_count == 0
                }
                None => return Ok(()),
            }
        };
        if should_close {
            if let Some((_, buf)) = self.buffers.remove(relative_path) {
                self.handler
                    .send_notification(
                        "textDocument/didClose",
                        json!({ "textDocument": { "uri": buf.uri } }),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Runs `f` with the named file open, guaranteeing the matching close
    /// happens even if `f` fails; the on-disk file is not touched here.
    async fn with_open_file<T, F, Fut>(&self, relative_path: &str, f: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        self.open_file(relative_path).await?;
        let result = f().await;
        self.close_file(relative_path).await?;
        result
    }

    /// Core editing primitive: replaces `[start, end)` in the buffer and
    /// propagates a single `didChange` event, returning the removed text.
    pub async fn delete_text_between_positions(
        &self,
        relative_path: &str,
        start: Position,
        end: Position,
    ) -> Result<String, CoreError> {
        self.with_open_file(relative_path, || async {
            self.apply_buffer_edit(relative_path, start, end, "").await
        })
        .await
    }

    pub async fn insert_text_at_position(
        &self,
        relative_path: &str,
        position: Position,
        text: &str,
    ) -> Result<Position, CoreError> {
        self.with_open_file(relative_path, || async {
            self.apply_buffer_edit(relative_path, position, position, text).await?;
            Ok(position)
        })
        .await
    }

    async fn apply_buffer_edit(
        &self,
        relative_path: &str,
        start: Position,
        end: Position,
        new_text: &str,
    ) -> Result<String, CoreError> {
        let (uri, version, removed) = {
            let mut buf = self
                .buffers
                .get_mut(relative_path)
                .ok_or_else(|| CoreError::FileNotFound(PathBuf::from(relative_path)))?;
            let removed = buf
                .splice(start, end, new_text)
                .map_err(|e| CoreError::ConfigError(e.to_string()))?;
            (buf.uri.clone(), buf.version, removed)
        };

        self.handler
            .send_notification(
                "textDocument/didChange",
                json!({
                    "textDocument": { "uri": uri, "version": version },
                    "contentChanges": [{
                        "range": { "start": start, "end": end },
                        "text": new_text,
                    }],
                }),
            )
            .await?;
        Ok(removed)
    }

    /// Writes the buffer's current contents back to disk; used by the
    /// editor after a successful structural edit.
    pub fn flush_to_disk(&self, relative_path: &str) -> Result<(), CoreError> {
        let buf = self
            .buffers
            .get(relative_path)
            .ok_or_else(|| CoreError::FileNotFound(PathBuf::from(relative_path)))?;
        let absolute = self.to_absolute(relative_path)?;
        std::fs::write(&absolute, &buf.contents)
            .map_err(|e| CoreError::ConfigError(format!("writing {}: {e}", absolute.display())))
    }

    pub fn buffer_contents(&self, relative_path: &str) -> Option<String> {
        self.buffers.get(relative_path).map(|b| b.contents.clone())
    }

    // ---- document symbols ---------------------------------------------------

    pub async fn request_document_symbols(
        &self,
        relative_path: &str,
        include_body: bool,
    ) -> Result<(Vec<UnifiedSymbol>, Vec<UnifiedSymbol>), CoreError> {
        self.with_open_file(relative_path, || async {
            let content_hash = {
                let buf = self.buffers.get(relative_path).unwrap();
                buf.content_hash.clone()
            };
            if let Some(cached) = self.cache.get(relative_path, include_body, &content_hash) {
                return Ok(cached);
            }

            let absolute = self.to_absolute(relative_path)?;
            let uri = Location::new(absolute.clone(), relative_path.to_string(), zero_range()).uri;
            let response = self
                .handler
                .send_request(
                    "textDocument/documentSymbol",
                    json!({ "textDocument": { "uri": uri } }),
                    false,
                )
                .await?;

            let items: Vec<Value> = match response {
                Value::Null => Vec::new(),
                Value::Array(items) => items,
                other => {
                    return Err(CoreError::ConfigError(format!(
                        "unexpected documentSymbol response shape: {other}"
                    )))
                }
            };

            let result = self.normalize_document_symbols(relative_path, &absolute, &items, include_body)?;
            self.cache.put(relative_path, include_body, content_hash, result.clone());
            Ok(result)
        })
        .await
    }

    fn normalize_document_symbols(
        &self,
        relative_path: &str,
        absolute_path: &Path,
        items: &[Value],
        include_body: bool,
    ) -> Result<(Vec<UnifiedSymbol>, Vec<UnifiedSymbol>), CoreError> {
        let mut flat = Vec::new();
        let mut roots = Vec::new();
        for item in items {
            let symbol = self.normalize_symbol_node(relative_path, absolute_path, item, include_body, &mut flat)?;
            roots.push(symbol);
        }
        Ok((flat, roots))
    }

    fn normalize_symbol_node(
        &self,
        relative_path: &str,
        absolute_path: &Path,
        item: &Value,
        include_body: bool,
        flat: &mut Vec<UnifiedSymbol>,
    ) -> Result<UnifiedSymbol, CoreError> {
        let name = item
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::ConfigError("document symbol missing name".into()))?
            .to_string();
        let kind_num = item.get("kind").and_then(Value::as_u64).unwrap_or(13) as u32;
        let kind = SymbolKind::from(kind_num);

        // DocumentSymbol carries `range`/`selectionRange`; SymbolInformation
        // carries `location` instead and has no children.
        let (range, selection_range) = if let Some(range_value) = item.get("range") {
            let range: Range = serde_json::from_value(range_value.clone())
                .map_err(|e| CoreError::ConfigError(e.to_string()))?;
            let selection = item
                .get("selectionRange")
                .cloned()
                .map(serde_json::from_value::<Range>)
                .transpose()
                .map_err(|e| CoreError::ConfigError(e.to_string()))?
                .unwrap_or(range);
            (range, selection)
        } else if let Some(location_value) = item.get("location") {
            let range: Range = location_value
                .get("range")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e: serde_json::Error| CoreError::ConfigError(e.to_string()))?
                .ok_or_else(|| CoreError::ConfigError("symbolInformation location missing range".into()))?;
            (range, range)
        } else {
            return Err(CoreError::ConfigError(format!("symbol '{name}' has neither range nor location")));
        };

        let location = Location::new(absolute_path.to_path_buf(), relative_path.to_string(), range);

        let body = if include_body {
            Some(self.extract_body(relative_path, range, selection_range)?)
        } else {
            None
        };

        let mut children = Vec::new();
        if let Some(Value::Array(child_items)) = item.get("children") {
            for child in child_items {
                let child_symbol =
                    self.normalize_symbol_node(relative_path, absolute_path, child, include_body, flat)?;
                children.push(child_symbol);
            }
        }

        let symbol = UnifiedSymbol {
            name,
            kind,
            location,
            selection_range,
            body,
            children,
        };
        flat.push(symbol.clone());
        Ok(symbol)
    }

    /// Extracts and dedents a symbol's body text from its buffer.
    ///
    /// Dedents by the minimum common leading whitespace across all
    /// non-blank lines rather than only subtracting the selection range's
    /// starting column from the first line, so continuation lines in
    /// languages with irregular indentation dedent correctly too.
    pub fn extract_body(&self, relative_path: &str, range: Range, selection_range: Range) -> Result<String, CoreError> {
        let buf = self
            .buffers
            .get(relative_path)
            .ok_or_else(|| CoreError::FileNotFound(PathBuf::from(relative_path)))?;
        let start = buf
            .position_to_offset(range.start)
            .ok_or_else(|| CoreError::ConfigError("symbol range start out of bounds".into()))?;
        let end = buf
            .position_to_offset(range.end)
            .ok_or_else(|| CoreError::ConfigError("symbol range end out of bounds".into()))?;
        let raw = &buf.contents[start..end.max(start)];
        let _ = selection_range;
        Ok(dedent_minimum_common_indentation(raw))
    }

    // ---- full project symbol tree -------------------------------------------

    pub async fn request_full_symbol_tree(
        &self,
        within_relative_path: Option<&str>,
        include_body: bool,
    ) -> Result<Vec<UnifiedSymbol>, CoreError> {
        let start_dir = match within_relative_path {
            Some(p) => self.project_root.join(p),
            None => self.project_root.clone(),
        };
        self.build_package_tree(start_dir, include_body).await
    }

    /// Boxed to allow recursion through an `async fn` (an unboxed recursive
    /// async function would need an infinitely-sized future).
    fn build_package_tree<'a>(
        &'a self,
        dir: PathBuf,
        include_body: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<UnifiedSymbol>, CoreError>> + 'a>> {
        Box::pin(async move {
            let mut out = Vec::new();
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(_) => return Ok(out),
            };
            let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
            entries.sort_by_key(|e| e.file_name());

            for entry in entries {
                let path = entry.path();
                let relative = path
                    .strip_prefix(&self.project_root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");

                if path.is_dir() {
                    if self.is_ignored_path(&relative, false) {
                        continue;
                    }
                    let children = self.build_package_tree(path.clone(), include_body).await?;
                    if !children.is_empty() {
                        out.push(UnifiedSymbol::synthetic_package(relative, path, children));
                    }
                } else {
                    if self.is_ignored_path(&relative, true) {
                        continue;
                    }
                    let (_, roots) = self.request_document_symbols(&relative, include_body).await?;
                    let buf_meta = self.buffers.get(&relative);
                    let (line_count, last_line_len) = match buf_meta {
                        Some(b) => (b.line_count(), b.last_line_len()),
                        None => (0, 0),
                    };
                    out.push(UnifiedSymbol::synthetic_file(relative, path, line_count, last_line_len, roots));
                }
            }
            Ok(out)
        })
    }

    // ---- definition / references --------------------------------------------

    async fn maybe_cross_file_wait(&self) {
        if !self.cross_file_waited.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_secs_f64(self.cross_file_wait_seconds)).await;
        }
    }

    pub async fn request_definition(
        &self,
        relative_path: &str,
        line: u32,
        character: u32,
    ) -> Result<Vec<Location>, CoreError> {
        self.maybe_cross_file_wait().await;
        self.with_open_file(relative_path, || async {
            let absolute = self.to_absolute(relative_path)?;
            let uri = Location::new(absolute, relative_path.to_string(), zero_range()).uri;
            let response = self
                .handler
                .send_request(
                    "textDocument/definition",
                    json!({
                        "textDocument": { "uri": uri },
                        "position": { "line": line, "character": character },
                    }),
                    false,
                )
                .await?;
            self.normalize_locations(response)
        })
        .await
    }

    pub async fn request_references(
        &self,
        relative_path: &str,
        line: u32,
        character: u32,
    ) -> Result<Vec<Location>, CoreError> {
        self.maybe_cross_file_wait().await;
        let locations = self
            .with_open_file(relative_path, || async {
                let absolute = self.to_absolute(relative_path)?;
                let uri = Location::new(absolute, relative_path.to_string(), zero_range()).uri;
                let response = self
                    .handler
                    .send_request(
                        "textDocument/references",
                        json!({
                            "textDocument": { "uri": uri },
                            "position": { "line": line, "character": character },
                            "context": { "includeDeclaration": true },
                        }),
                        true,
                    )
                    .await?;
                self.normalize_locations(response)
            })
            .await?;

        Ok(locations
            .into_iter()
            .filter(|loc| {
                let inside = self.is_inside_project(&loc.absolute_path);
                if !inside {
                    tracing::warn!(path = %loc.absolute_path.display(), "dropping reference outside project root");
                }
                inside && !self.is_ignored_path(&loc.relative_path, true)
            })
            .collect())
    }

    /// Handles both `Location[]` and `LocationLink[]` response shapes,
    /// treating `null` as an empty result.
    fn normalize_locations(&self, response: Value) -> Result<Vec<Location>, CoreError> {
        let items = match response {
            Value::Null => return Ok(Vec::new()),
            Value::Array(items) => items,
            single @ Value::Object(_) => vec![single],
            _ => return Ok(Vec::new()),
        };

        let mut out = Vec::new();
        for item in items {
            let (uri, range) = if let Some(target_uri) = item.get("targetUri") {
                let range: Range = item
                    .get("targetRange")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e: serde_json::Error| CoreError::ConfigError(e.to_string()))?
                    .unwrap_or(zero_range());
                (target_uri.as_str().unwrap_or_default().to_string(), range)
            } else {
                let uri = item.get("uri").and_then(Value::as_str).unwrap_or_default().to_string();
                let range: Range = item
                    .get("range")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e: serde_json::Error| CoreError::ConfigError(e.to_string()))?
                    .unwrap_or(zero_range());
                (uri, range)
            };

            let absolute = uri_to_path(&uri);
            let relative = absolute
                .strip_prefix(&self.project_root)
                .unwrap_or(&absolute)
                .to_string_lossy()
                .replace('\\', "/");
            out.push(Location {
                uri,
                range,
                absolute_path: absolute,
                relative_path: relative,
            });
        }
        Ok(out)
    }

    // ---- containing / defining / referencing symbol -------------------------

    const CONTAINER_KINDS: [SymbolKind; 3] = [SymbolKind::METHOD, SymbolKind::FUNCTION, SymbolKind::CLASS];

    /// Rejects a blank target line rather than returning whatever symbol
    /// happens to enclose it: requesting the containing symbol of a blank
    /// line is not currently supported.
    async fn line_is_blank(&self, relative_path: &str, line: u32) -> Result<bool, CoreError> {
        self.with_open_file(relative_path, || async {
            let contents = self
                .buffers
                .get(relative_path)
                .map(|b| b.contents.clone())
                .unwrap_or_default();
            let target = contents.split('\n').nth(line as usize).unwrap_or("");
            Ok(target.trim().is_empty())
        })
        .await
    }

    pub async fn request_containing_symbol(
        &self,
        relative_path: &str,
        line: u32,
        character: Option<u32>,
        strict: bool,
        include_body: bool,
    ) -> Result<Option<UnifiedSymbol>, CoreError> {
        if self.line_is_blank(relative_path, line).await? {
            tracing::error!(
                %relative_path,
                line,
                "request_containing_symbol on a blank line is not currently supported"
            );
            return Ok(None);
        }

        let (flat, _) = self.request_document_symbols(relative_path, include_body).await?;
        let position = Position {
            line,
            character: character.unwrap_or(0),
        };

        let mut candidates: Vec<&UnifiedSymbol> = flat
            .iter()
            .filter(|s| Self::CONTAINER_KINDS.contains(&s.kind) || s.kind == SymbolKind::VARIABLE)
            .filter(|s| position_in_range(position, s.location.range, strict))
            .collect();

        // Prefer non-Variable kinds; Variable is only a fallback.
        if candidates.iter().any(|s| s.kind != SymbolKind::VARIABLE) {
            candidates.retain(|s| s.kind != SymbolKind::VARIABLE);
        }

        Ok(candidates
            .into_iter()
            .max_by_key(|s| (s.location.range.start.line, s.location.range.start.character))
            .cloned())
    }

    pub async fn request_defining_symbol(
        &self,
        relative_path: &str,
        line: u32,
        character: u32,
        include_body: bool,
    ) -> Result<Option<UnifiedSymbol>, CoreError> {
        let definitions = self.request_definition(relative_path, line, character).await?;
        let Some(def) = definitions.into_iter().next() else {
            return Ok(None);
        };
        self.request_containing_symbol(
            &def.relative_path,
            def.range.start.line,
            Some(def.range.start.character),
            false,
            include_body,
        )
        .await
    }

    /// Reference-line fallback (a): a container-less reference of the shape
    /// `ident.attr` is heuristically attributed to a `Variable` symbol named
    /// `ident` in the referenced file, with its location replaced by the
    /// reference site itself. Python-only and admittedly a hack, matching
    /// `original_source`'s own caveat at the call site this mirrors.
    async fn containing_symbol_via_ident_heuristic(
        &self,
        reference: &Location,
    ) -> Result<Option<UnifiedSymbol>, CoreError> {
        let ref_line_text = self
            .with_open_file(&reference.relative_path, || async {
                let contents = self
                    .buffers
                    .get(&reference.relative_path)
                    .map(|b| b.contents.clone())
                    .unwrap_or_default();
                Ok(contents.split('\n').nth(reference.range.start.line as usize).unwrap_or("").to_string())
            })
            .await?;

        let Some(dot_idx) = ref_line_text.find('.') else {
            return Ok(None);
        };
        let ident = ref_line_text[..dot_idx].trim();

        let (all_symbols, _) = self.request_document_symbols(&reference.relative_path, false).await?;
        Ok(all_symbols
            .into_iter()
            .find(|s| s.name == ident && s.kind == SymbolKind::VARIABLE)
            .map(|mut sym| {
                sym.location = reference.clone();
                sym.selection_range = reference.range;
                sym
            }))
    }

    /// Reference-line fallback (b): when no symbol could be resolved for a
    /// reference at all, synthesize a File symbol for the referenced file so
    /// the caller at least learns which file it landed in.
    async fn synthetic_file_symbol_for(&self, relative_path: &str, include_body: bool) -> Result<UnifiedSymbol, CoreError> {
        self.with_open_file(relative_path, || async {
            let absolute = self.to_absolute(relative_path)?;
            let (line_count, last_line_len, contents) = {
                let buf = self
                    .buffers
                    .get(relative_path)
                    .ok_or_else(|| CoreError::FileNotFound(absolute.clone()))?;
                (buf.line_count(), buf.last_line_len(), buf.contents.clone())
            };
            let mut symbol = UnifiedSymbol::synthetic_file(relative_path.to_string(), absolute, line_count, last_line_len, Vec::new());
            if include_body {
                symbol.body = Some(contents);
            }
            Ok(symbol)
        })
        .await
    }

    pub async fn request_referencing_symbols(
        &self,
        relative_path: &str,
        line: u32,
        character: u32,
        include_self: bool,
        include_imports: bool,
        include_file_symbols: bool,
    ) -> Result<Vec<(UnifiedSymbol, u32, u32)>, CoreError> {
        let (origin_flat, _) = self.request_document_symbols(relative_path, false).await?;
        let origin_name = origin_flat
            .iter()
            .find(|s| position_in_range(Position { line, character }, s.selection_range, true))
            .map(|s| (s.name.clone(), s.kind));

        let references = self.request_references(relative_path, line, character).await?;
        let mut out = Vec::new();
        for reference in references {
            if !include_self && reference.relative_path == relative_path && reference.range.start.line == line {
                continue;
            }

            let mut containing = self
                .request_containing_symbol(
                    &reference.relative_path,
                    reference.range.start.line,
                    Some(reference.range.start.character),
                    false,
                    false,
                )
                .await?;

            if containing.is_none() {
                containing = self.containing_symbol_via_ident_heuristic(&reference).await?;
            }

            if containing.is_none() && include_file_symbols {
                containing = Some(self.synthetic_file_symbol_for(&reference.relative_path, false).await?);
            }

            let Some(containing) = containing else { continue };
            if !include_file_symbols && containing.kind == SymbolKind::FILE {
                continue;
            }

            if !include_imports {
                if let Some((ref name, kind)) = origin_name {
                    if containing.name == *name && containing.kind == kind {
                        continue;
                    }
                }
            }

            out.push((containing, reference.range.start.line, reference.range.start.character));
        }
        Ok(out)
    }
}

fn position_in_range(position: Position, range: Range, strict: bool) -> bool {
    let after_start = (position.line, position.character) >= (range.start.line, range.start.character);
    let before_end = if strict {
        (position.line, position.character) < (range.end.line, range.end.character)
    } else {
        (position.line, position.character) <= (range.end.line, range.end.character)
    };
    after_start && before_end
}

fn zero_range() -> Range {
    Range {
        start: Position { line: 0, character: 0 },
        end: Position { line: 0, character: 0 },
    }
}

fn uri_to_path(uri: &str) -> PathBuf {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(uri))
}

/// Dedents by the minimum common leading whitespace across non-blank lines.
fn dedent_minimum_common_indentation(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let min_indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    if min_indent == 0 {
        return text.to_string();
    }
    lines
        .iter()
        .map(|l| if l.len() >= min_indent { &l[min_indent..] } else { l.trim_start() })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedent_uses_minimum_common_indentation() {
        let body = "    def foo(x):\n        return x + 1\n";
        let dedented = dedent_minimum_common_indentation(body);
        assert_eq!(dedented, "def foo(x):\n    return x + 1\n");
    }

    #[test]
    fn position_in_range_strict_excludes_end() {
        let range = Range {
            start: Position { line: 0, character: 0 },
            end: Position { line: 5, character: 0 },
        };
        assert!(position_in_range(Position { line: 4, character: 9 }, range, true));
        assert!(!position_in_range(Position { line: 5, character: 0 }, range, true));
        assert!(position_in_range(Position { line: 5, character: 0 }, range, false));
    }
}
