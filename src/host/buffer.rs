//! In-memory mirror of an open file, synchronized with the LSP child via
//! `didOpen`/`didChange`/`didClose`. Adapted from the line-offset arithmetic
//! this crate already used for incremental text sync, simplified to the
//! buffer shape the host actually needs: the host itself originates every
//! edit (via the editor's insert/delete primitives), so there is no
//! external `TextDocumentContentChangeEvent` stream to replay here.

use tower_lsp::lsp_types::Position;

#[derive(Debug, Clone)]
pub struct LspFileBuffer {
    pub uri: String,
    pub contents: String,
    pub version: i32,
    pub language_id: String,
    pub ref_count: usize,
    pub content_hash: String,
    line_offsets: Vec<usize>,
}

impl LspFileBuffer {
    pub fn new(uri: String, contents: String, language_id: String) -> Self {
        let line_offsets = compute_line_offsets(&contents);
        let content_hash = hash_contents(&contents);
        Self {
            uri,
            contents,
            version: 0,
            language_id,
            ref_count: 0,
            content_hash,
            line_offsets,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    pub fn last_line_len(&self) -> usize {
        let start = *self.line_offsets.last().unwrap_or(&0);
        self.contents[start..].chars().count()
    }

    pub fn position_to_offset(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let line_start = *self.line_offsets.get(line)?;
        let line_end = self
            .line_offsets
            .get(line + 1)
            .map(|&next| next.saturating_sub(1).max(line_start))
            .unwrap_or(self.contents.len());

        let mut char_count = 0;
        let mut byte_offset = line_start;
        for ch in self.contents[line_start..line_end].chars() {
            if char_count == position.character as usize {
                return Some(byte_offset);
            }
            byte_offset += ch.len_utf8();
            char_count += 1;
        }
        if char_count == position.character as usize {
            Some(byte_offset)
        } else {
            None
        }
    }

    pub fn offset_to_position(&self, offset: usize) -> Position {
        let line = match self.line_offsets.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line_start = self.line_offsets[line];
        let character = self.contents[line_start..offset.min(self.contents.len())].chars().count();
        Position {
            line: line as u32,
            character: character as u32,
        }
    }

    /// Replaces the text in `[start, end)` with `new_text`, recomputing line
    /// offsets and content hash, and bumping the version. Returns the text
    /// that was replaced.
    pub fn splice(&mut self, start: Position, end: Position, new_text: &str) -> anyhow::Result<String> {
        let start_offset = self
            .position_to_offset(start)
            .ok_or_else(|| anyhow::anyhow!("start position {start:?} out of bounds"))?;
        let end_offset = self
            .position_to_offset(end)
            .ok_or_else(|| anyhow::anyhow!("end position {end:?} out of bounds"))?;
        anyhow::ensure!(start_offset <= end_offset, "start position after end position");

        let removed = self.contents[start_offset..end_offset].to_string();
        let mut new_contents = String::with_capacity(self.contents.len() - removed.len() + new_text.len());
        new_contents.push_str(&self.contents[..start_offset]);
        new_contents.push_str(new_text);
        new_contents.push_str(&self.contents[end_offset..]);

        self.contents = new_contents;
        self.line_offsets = compute_line_offsets(&self.contents);
        self.content_hash = hash_contents(&self.contents);
        self.version += 1;
        Ok(removed)
    }
}

pub fn hash_contents(contents: &str) -> String {
    format!("{:x}", md5::compute(contents.as_bytes()))
}

fn compute_line_offsets(content: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    let mut offset = 0;
    for ch in content.chars() {
        offset += ch.len_utf8();
        if ch == '\n' {
            offsets.push(offset);
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_replaces_range_and_bumps_version() {
        let mut buf = LspFileBuffer::new("file:///m.py".into(), "line1\nline2\nline3".into(), "python".into());
        let start = Position { line: 1, character: 0 };
        let end = Position { line: 1, character: 5 };
        let removed = buf.splice(start, end, "HELLO").unwrap();
        assert_eq!(removed, "line2");
        assert_eq!(buf.contents, "line1\nHELLO\nline3");
        assert_eq!(buf.version, 1);
    }

    #[test]
    fn empty_splice_is_a_no_op_on_contents() {
        let mut buf = LspFileBuffer::new("file:///m.py".into(), "abc".into(), "python".into());
        let p = Position { line: 0, character: 1 };
        let removed = buf.splice(p, p, "").unwrap();
        assert_eq!(removed, "");
        assert_eq!(buf.contents, "abc");
    }

    #[test]
    fn content_hash_changes_when_contents_change() {
        let mut buf = LspFileBuffer::new("file:///m.py".into(), "abc".into(), "python".into());
        let before = buf.content_hash.clone();
        let p0 = Position { line: 0, character: 0 };
        buf.splice(p0, p0, "x").unwrap();
        assert_ne!(before, buf.content_hash);
    }
}
