//! Pack content access and raw source ingestion.
//!
//! Types:
//!
//! - `ContentProvider` abstracts where a pack's files live; `DirProvider`
//!   serves a directory tree, `MemProvider` serves an in-memory file map
//!   (embedded packs and tests).
//! - `TaggedLine` is one physical source line with provenance (file index +
//!   line number) that survives include expansion, so emitted code can carry
//!   `#line` resync directives pointing at the real origin.
//! - `Includer` performs recursive, depth-first `#include "..."` expansion
//!   into a flat tagged-line list.
//!
//! Functions:
//!
//! - `mark_multiline_comments` retags lines inside `/* ... */` blocks,
//!   splitting lines where a block opens or closes mid-line.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{error, trace, warn};

/// Name recorded at file index 0 for lines injected by the engine rather
/// than read from the pack.
pub const INTERNAL_SOURCE: &str = "<internal>";

/// Read access to a shaderpack's files. Paths are pack-absolute
/// (`/shaders/composite.fsh`) with `/` separators on every platform.
pub trait ContentProvider {
    fn open(&self, path: &str) -> io::Result<Vec<u8>>;

    fn exists(&self, path: &str) -> bool;

    /// Resolves `path` as written in an `#include` inside `source`.
    /// Absolute paths pass through; relative paths resolve against the
    /// including file's directory with `.` and `..` consumed, never
    /// escaping the pack root.
    fn absolutize(&self, source: Option<&str>, path: &str) -> String {
        if path.starts_with('/') {
            return path.to_string();
        }
        let Some(source) = source else {
            return format!("/{path}");
        };
        let mut segments: Vec<&str> = source
            .trim_start_matches('/')
            .split('/')
            .collect();
        // Last segment is the including file itself.
        segments.pop();
        for elem in path.split('/') {
            match elem {
                "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        format!("/{}", segments.join("/"))
    }
}

/// Serves pack files from a filesystem directory.
#[derive(Debug, Clone)]
pub struct DirProvider {
    root: PathBuf,
}

impl DirProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut out = self.root.clone();
        for seg in path.split('/').filter(|s| !s.is_empty() && *s != "." && *s != "..") {
            out.push(seg);
        }
        out
    }
}

impl ContentProvider for DirProvider {
    fn open(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }
}

/// Serves pack files from an in-memory map.
#[derive(Debug, Default, Clone)]
pub struct MemProvider {
    files: HashMap<String, Vec<u8>>,
}

impl MemProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, content: impl Into<Vec<u8>>) -> &mut Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        self.files.insert(path, content.into());
        self
    }

    pub fn with(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }
}

impl ContentProvider for MemProvider {
    fn open(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Standard,
    MultilineComment,
    /// First non-whitespace character is `#`.
    Macro,
}

/// One source line with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedLine {
    /// Index into the includer's source-file table.
    pub file: usize,
    pub line: u32,
    pub text: String,
    /// False on the leading half of a mid-line comment split, so the two
    /// halves re-join on emission.
    pub line_break: bool,
    pub tag: Tag,
}

impl TaggedLine {
    pub fn injected(text: impl Into<String>) -> Self {
        let text = text.into();
        let tag = detect_tag(&text);
        Self {
            file: 0,
            line: 0,
            text,
            line_break: true,
            tag,
        }
    }
}

fn detect_tag(text: &str) -> Tag {
    match text.find('#') {
        None => Tag::Standard,
        Some(idx) => {
            if text[..idx].chars().all(char::is_whitespace) {
                Tag::Macro
            } else {
                Tag::Standard
            }
        }
    }
}

fn is_include(line: &str) -> bool {
    line.contains("#include") && line.trim_start().starts_with("#include")
}

/// Recursive `#include` expander. Cycles are skipped with a warning; a
/// missing file fails the whole read, leaving the caller to decide severity.
pub struct Includer<'a> {
    fs: &'a dyn ContentProvider,
    include_stack: Vec<String>,
    source_files: Vec<String>,
    lines: Vec<TaggedLine>,
}

impl<'a> Includer<'a> {
    pub fn new(fs: &'a dyn ContentProvider) -> Self {
        Self {
            fs,
            include_stack: Vec::new(),
            source_files: vec![INTERNAL_SOURCE.to_string()],
            lines: Vec::new(),
        }
    }

    pub fn read(&mut self, path: &str) -> bool {
        self.read_from(None, path)
    }

    pub fn source_files(&self) -> &[String] {
        &self.source_files
    }

    pub fn lines(&self) -> &[TaggedLine] {
        &self.lines
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<TaggedLine>) {
        (self.source_files, self.lines)
    }

    fn read_from(&mut self, source: Option<&str>, path: &str) -> bool {
        let abs = self.fs.absolutize(source, path);
        if self.include_stack.contains(&abs) {
            warn!(path = %abs, "include cycle skipped");
            return true;
        }
        let file_index = match self.source_files.iter().position(|p| p == &abs) {
            Some(idx) => idx,
            None => {
                self.source_files.push(abs.clone());
                self.source_files.len() - 1
            }
        };
        let content = match self.fs.open(&abs) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(path = %abs, "file not found");
                return false;
            }
            Err(e) => {
                warn!(path = %abs, error = %e, "failed to read file");
                return false;
            }
        };
        let content = String::from_utf8_lossy(&content);
        self.include_stack.push(abs.clone());
        let mut ok = true;
        for (line_no, line) in content.lines().enumerate() {
            let line_no = line_no as u32 + 1;
            if is_include(line) {
                if !self.parse_include(line, &abs, line_no) {
                    ok = false;
                    break;
                }
                continue;
            }
            self.lines.push(TaggedLine {
                file: file_index,
                line: line_no,
                text: line.to_string(),
                line_break: true,
                tag: detect_tag(line),
            });
        }
        self.include_stack.pop();
        ok
    }

    fn parse_include(&mut self, line: &str, file: &str, line_no: u32) -> bool {
        let start = line.find('"');
        let end = line.rfind('"');
        match (start, end) {
            (Some(s), Some(e)) if s != e => self.read_from(Some(file), &line[s + 1..e]),
            _ => {
                error!(file = %file, line = line_no, "invalid include statement");
                false
            }
        }
    }
}

/// Retags lines inside `/* ... */` blocks as `MultilineComment`. Lines where
/// a block opens or closes mid-line are split in two; the halves share
/// provenance and the first half drops its line break.
pub fn mark_multiline_comments(mut lines: Vec<TaggedLine>) -> Vec<TaggedLine> {
    let mut in_comment = false;
    let mut new_comment = false;
    let mut i = 0;
    while i < lines.len() {
        let txt = lines[i].text.clone();
        if in_comment {
            let mut end = match txt.find("*/") {
                Some(e) => e,
                None => {
                    lines[i].tag = Tag::MultilineComment;
                    new_comment = false;
                    i += 1;
                    continue;
                }
            };
            if new_comment {
                new_comment = false;
                // A `*/` overlapping the opening `/*` is not a terminator.
                if end == 1 && txt.as_bytes()[0] == b'/' {
                    match txt[end + 2..].find("*/") {
                        Some(next) => end = end + 2 + next,
                        None => {
                            lines[i].tag = Tag::MultilineComment;
                            i += 1;
                            continue;
                        }
                    }
                }
            }
            in_comment = false;
            let tail = &txt[end + 2..];
            if tail.trim().is_empty() {
                lines[i].text.truncate(end + 2);
                lines[i].tag = Tag::MultilineComment;
                i += 1;
                continue;
            }
            let rest = TaggedLine {
                text: tail.to_string(),
                ..lines[i].clone()
            };
            lines[i].text.truncate(end + 2);
            lines[i].line_break = false;
            lines[i].tag = Tag::MultilineComment;
            lines.insert(i + 1, rest);
            i += 1;
        } else {
            let start = match txt.find("/*") {
                Some(s) => s,
                None => {
                    i += 1;
                    continue;
                }
            };
            if start == 0 {
                in_comment = true;
                new_comment = true;
                // Reprocess this line in the in-comment branch.
                continue;
            }
            if txt.as_bytes()[start - 1] == b'/' {
                // `//*` is a line comment, not a block opener.
                i += 1;
                continue;
            }
            in_comment = true;
            new_comment = true;
            let rest = TaggedLine {
                text: txt[start..].to_string(),
                ..lines[i].clone()
            };
            lines[i].text.truncate(start);
            lines[i].line_break = false;
            lines.insert(i + 1, rest);
            i += 1;
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullProvider;

    impl ContentProvider for NullProvider {
        fn open(&self, path: &str) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        }

        fn exists(&self, _path: &str) -> bool {
            false
        }
    }

    #[test]
    fn absolutize_rules() {
        let fs = NullProvider;
        assert_eq!(fs.absolutize(None, "shaders/a.vsh"), "/shaders/a.vsh");
        assert_eq!(fs.absolutize(Some("/shaders/a.vsh"), "/lib/b.glsl"), "/lib/b.glsl");
        assert_eq!(fs.absolutize(Some("/shaders/a.vsh"), "b.glsl"), "/shaders/b.glsl");
        assert_eq!(
            fs.absolutize(Some("/shaders/a.vsh"), "./lib/b.glsl"),
            "/shaders/lib/b.glsl"
        );
        assert_eq!(
            fs.absolutize(Some("/shaders/world0/a.vsh"), "../common.glsl"),
            "/shaders/common.glsl"
        );
        assert_eq!(
            fs.absolutize(Some("/a.vsh"), "../../b.glsl"),
            "/b.glsl"
        );
    }

    #[test]
    fn expands_nested_includes() {
        let fs = MemProvider::new()
            .with("/shaders/root.fsh", "top\n#include \"/lib/a.glsl\"\nbottom\n")
            .with("/lib/a.glsl", "alpha\n#include \"b.glsl\"\n")
            .with("/lib/b.glsl", "beta\n");
        let mut inc = Includer::new(&fs);
        assert!(inc.read("/shaders/root.fsh"));
        let texts: Vec<&str> = inc.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["top", "alpha", "beta", "bottom"]);
        assert_eq!(inc.source_files()[0], INTERNAL_SOURCE);
        assert_eq!(inc.lines()[0].file, 1);
        assert_eq!(inc.lines()[2].file, 3);
        assert_eq!(inc.lines()[3].line, 3);
    }

    #[test]
    fn include_cycle_is_skipped() {
        let fs = MemProvider::new()
            .with("/a.glsl", "one\n#include \"b.glsl\"\n")
            .with("/b.glsl", "two\n#include \"a.glsl\"\nthree\n");
        let mut inc = Includer::new(&fs);
        assert!(inc.read("/a.glsl"));
        let texts: Vec<&str> = inc.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn missing_include_fails_the_read() {
        let fs = MemProvider::new().with("/a.glsl", "#include \"gone.glsl\"\n");
        let mut inc = Includer::new(&fs);
        assert!(!inc.read("/a.glsl"));
    }

    #[test]
    fn tags_macro_lines() {
        let fs = MemProvider::new().with("/a.glsl", "  #version 120\nint x;\nfoo #bar\n");
        let mut inc = Includer::new(&fs);
        assert!(inc.read("/a.glsl"));
        assert_eq!(inc.lines()[0].tag, Tag::Macro);
        assert_eq!(inc.lines()[1].tag, Tag::Standard);
        assert_eq!(inc.lines()[2].tag, Tag::Standard);
    }

    #[test]
    fn dir_provider_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let shaders = dir.path().join("shaders");
        fs::create_dir_all(&shaders).unwrap();
        fs::write(shaders.join("a.vsh"), "void main() {}\n").unwrap();
        let provider = DirProvider::new(dir.path());
        assert!(provider.exists("/shaders/a.vsh"));
        assert!(!provider.exists("/shaders/b.vsh"));
        assert_eq!(
            provider.open("/shaders/a.vsh").unwrap(),
            b"void main() {}\n"
        );
    }

    fn line(text: &str) -> TaggedLine {
        TaggedLine {
            file: 1,
            line: 1,
            text: text.to_string(),
            line_break: true,
            tag: detect_tag(text),
        }
    }

    #[test]
    fn marks_whole_comment_lines() {
        let marked = mark_multiline_comments(vec![
            line("code;"),
            line("/* start"),
            line("middle"),
            line("end */"),
            line("more;"),
        ]);
        let tags: Vec<Tag> = marked.iter().map(|l| l.tag).collect();
        assert_eq!(
            tags,
            vec![
                Tag::Standard,
                Tag::MultilineComment,
                Tag::MultilineComment,
                Tag::MultilineComment,
                Tag::Standard,
            ]
        );
    }

    #[test]
    fn splits_mid_line_open_and_close() {
        let marked = mark_multiline_comments(vec![line("code; /* note */ tail;")]);
        assert_eq!(marked.len(), 3);
        assert_eq!(marked[0].text, "code; ");
        assert!(!marked[0].line_break);
        assert_eq!(marked[0].tag, Tag::Standard);
        assert_eq!(marked[1].text, "/* note */");
        assert!(!marked[1].line_break);
        assert_eq!(marked[1].tag, Tag::MultilineComment);
        assert_eq!(marked[2].text, " tail;");
        assert!(marked[2].line_break);
        assert_eq!(marked[2].tag, Tag::Standard);
        assert!(marked.iter().all(|l| l.line == 1));
    }

    #[test]
    fn line_comment_does_not_open_a_block() {
        let marked = mark_multiline_comments(vec![line("x; //* not a block")]);
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].tag, Tag::Standard);
    }

    #[test]
    fn overlapping_terminator_is_not_a_close() {
        let marked = mark_multiline_comments(vec![line("/*/ still open"), line("closed */")]);
        assert_eq!(marked[0].tag, Tag::MultilineComment);
        assert_eq!(marked[1].tag, Tag::MultilineComment);
    }
}
