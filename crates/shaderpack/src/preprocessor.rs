//! Two-stage shader source preprocessor.
//!
//! Stage 1 (`Preprocessor::stage1`) expands includes, tags comments and
//! discovers the option set; the caller then applies its persisted option
//! values and injects build-fact macros. Stage 2 (`Stage1::configure`)
//! resolves conditional compilation against that state, builds the
//! `#version`/`#extension`/macro prelude, re-harvests the surviving consts
//! and extracts render targets. `Stage2` materializes compilable text.
//!
//! Types:
//!
//! - `Preprocessor` is the entry point, bound to a `ContentProvider`.
//! - `MacroBuilder` is the insertion-ordered build-fact macro slot.
//! - `Stage1` holds the discovered, still-configurable option state.
//! - `Stage2` is one configured compilation unit; `configure` may be called
//!   repeatedly with different option state on one `Stage1`.
//! - `NativeBuffer` is the reusable output buffer for the hot compile path.

use std::collections::HashMap;

use tracing::{error, warn};

use crate::interp::{self, InterpretOutput};
use crate::option::{parse_const, parse_define, value_matches, ShaderOption, Value};
use crate::source::{mark_multiline_comments, ContentProvider, Includer, Tag, TaggedLine};

pub struct Preprocessor<'fs> {
    fs: &'fs dyn ContentProvider,
}

impl<'fs> Preprocessor<'fs> {
    pub fn new(fs: &'fs dyn ContentProvider) -> Self {
        Self { fs }
    }

    /// Runs include expansion, comment marking and option discovery on one
    /// compilation unit. `typed` marks GLSL sources, which additionally get
    /// const discovery and `#version`/`#extension` handling. Returns None
    /// when the root file or any include is unreadable.
    pub fn stage1(&self, path: &str, typed: bool) -> Option<Stage1> {
        let mut includer = Includer::new(self.fs);
        if !includer.read(path) {
            return None;
        }
        let (source_files, raw) = includer.into_parts();
        let raw_code = mark_multiline_comments(raw);

        let (defines, define_lines) = dedup_lines(find_defines(&raw_code));
        let (consts, _) = if typed {
            dedup_lines(find_consts(&raw_code, false))
        } else {
            (Vec::new(), HashMap::new())
        };

        Some(Stage1 {
            typed,
            source_files,
            raw_code,
            defines,
            define_lines,
            consts,
            macros: MacroBuilder::new(),
        })
    }
}

/// Insertion-ordered macro table for injected build facts. The order is
/// preserved into the emitted prelude.
#[derive(Debug, Default, Clone)]
pub struct MacroBuilder {
    macros: Vec<(String, Value)>,
}

impl MacroBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a valueless macro (`#define NAME`).
    pub fn flag(&mut self, name: impl Into<String>) {
        self.set(name, Value::Toggle(true));
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.macros.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.macros.push((name, value)),
        }
    }

    /// Parses the value with `Value::detect`.
    pub fn set_detect(&mut self, name: impl Into<String>, raw: &str) {
        self.set(name, Value::detect(raw));
    }

    pub fn extend(&mut self, other: &MacroBuilder) {
        for (name, value) in &other.macros {
            self.set(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.macros.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn to_env(&self) -> HashMap<String, Value> {
        self.macros.iter().cloned().collect()
    }
}

/// Discovery result for one compilation unit. Defines stay mutable here so
/// the caller can apply its option snapshot before configuring.
pub struct Stage1 {
    typed: bool,
    source_files: Vec<String>,
    raw_code: Vec<TaggedLine>,
    defines: Vec<ShaderOption>,
    define_lines: HashMap<usize, usize>,
    consts: Vec<ShaderOption>,
    macros: MacroBuilder,
}

impl Stage1 {
    pub fn source_files(&self) -> &[String] {
        &self.source_files
    }

    pub fn defines(&self) -> &[ShaderOption] {
        &self.defines
    }

    pub fn define_mut(&mut self, name: &str) -> Option<&mut ShaderOption> {
        self.defines.iter_mut().find(|o| o.name == name)
    }

    /// Consts discovered before conditional resolution, including ones
    /// inside block comments.
    pub fn consts(&self) -> &[ShaderOption] {
        &self.consts
    }

    /// Build-fact macro slot. Must be populated before `configure`.
    pub fn macros_mut(&mut self) -> &mut MacroBuilder {
        &mut self.macros
    }

    /// Resolves conditional compilation against the current define values
    /// plus the injected macros. Borrows immutably: repeated calls with
    /// different option state between them are independent.
    pub fn configure(&self) -> Stage2 {
        let env = self.macros.to_env();
        let line_options: HashMap<usize, ShaderOption> = self
            .define_lines
            .iter()
            .map(|(&line, &idx)| (line, self.defines[idx].clone()))
            .collect();

        let InterpretOutput {
            version,
            extensions,
            render_targets,
            code,
            options,
        } = interp::interpret(
            &line_options,
            &self.raw_code,
            &self.source_files,
            &env,
            self.typed,
        );

        let mut prelude = Vec::with_capacity(1 + extensions.len() + self.macros.macros.len());
        if self.typed {
            match version {
                Some(v) => prelude.push(v),
                None => error!("missing #version directive in typed source"),
            }
            prelude.extend(extensions);
        }
        for (name, value) in self.macros.iter() {
            match value {
                Value::Toggle(true) => prelude.push(format!("#define {name}")),
                Value::Toggle(false) => {}
                other => prelude.push(format!("#define {name} {other}")),
            }
        }

        let (defines, _) = dedup_lines(options.iter().map(|(&l, o)| (l, o.clone())).collect());
        let (consts, const_lines) = if self.typed {
            dedup_lines(find_consts(&code, true))
        } else {
            (Vec::new(), HashMap::new())
        };

        Stage2 {
            prelude,
            code,
            define_lines: options,
            defines,
            consts,
            const_lines,
            render_targets,
        }
    }
}

/// One configured compilation unit, ready for emission.
pub struct Stage2 {
    prelude: Vec<String>,
    code: Vec<TaggedLine>,
    define_lines: HashMap<usize, ShaderOption>,
    defines: Vec<ShaderOption>,
    consts: Vec<ShaderOption>,
    const_lines: HashMap<usize, usize>,
    render_targets: Option<Vec<i32>>,
}

impl Stage2 {
    /// Render targets declared by the last live directive, if any.
    pub fn render_targets(&self) -> Option<&[i32]> {
        self.render_targets.as_deref()
    }

    /// Defines that survived conditional resolution.
    pub fn defines(&self) -> &[ShaderOption] {
        &self.defines
    }

    /// Consts that survived conditional resolution. Mutable outside block
    /// comments, so the caller's snapshot applies before emission.
    pub fn consts(&self) -> &[ShaderOption] {
        &self.consts
    }

    pub fn const_mut(&mut self, name: &str) -> Option<&mut ShaderOption> {
        self.consts.iter_mut().find(|o| o.name == name)
    }

    pub fn to_text(&self) -> String {
        let mut opts = self.define_lines.clone();
        for (&line, &idx) in &self.const_lines {
            opts.insert(line, self.consts[idx].clone());
        }
        CodePrinter::print(&self.prelude, &self.code, &opts)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_text().into_bytes()
    }

    /// Writes to the caller's reusable buffer, replacing its previous
    /// contents.
    pub fn write_native(&self, buf: &mut NativeBuffer, null_terminated: bool) {
        buf.bytes.clear();
        buf.bytes.extend_from_slice(self.to_text().as_bytes());
        if null_terminated {
            buf.bytes.push(0);
        }
    }
}

/// Reusable byte buffer for handing sources to a native compiler without
/// reallocating per shader.
#[derive(Debug, Default)]
pub struct NativeBuffer {
    bytes: Vec<u8>,
}

impl NativeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn find_defines(code: &[TaggedLine]) -> Vec<(usize, ShaderOption)> {
    code.iter()
        .enumerate()
        .filter(|(_, line)| line.tag != Tag::MultilineComment)
        .filter_map(|(i, line)| {
            parse_define(&line.text).map(|o| (i, o.copy_with_mutability(false)))
        })
        .collect()
}

/// Finds const declarations. Lines inside block comments are always
/// harvested read-only; `mutable` applies to regular code lines.
fn find_consts(code: &[TaggedLine], mutable: bool) -> Vec<(usize, ShaderOption)> {
    code.iter()
        .enumerate()
        .filter_map(|(i, line)| match line.tag {
            Tag::Standard => parse_const(&line.text, false).map(|o| {
                if mutable {
                    (i, o.copy_with_mutability(false))
                } else {
                    (i, o)
                }
            }),
            Tag::MultilineComment => parse_const(&line.text, true).map(|o| (i, o)),
            Tag::Macro => None,
        })
        .collect()
}

/// Collapses same-named finds onto one canonical instance, remapping line
/// indices onto the canonical list.
fn dedup_lines(found: Vec<(usize, ShaderOption)>) -> (Vec<ShaderOption>, HashMap<usize, usize>) {
    let mut canonical: Vec<ShaderOption> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut lines = HashMap::new();
    for (line, opt) in found {
        let idx = match by_name.get(&opt.unique_name()) {
            Some(&idx) => {
                let existing = &canonical[idx];
                if existing.legal_values() == opt.legal_values()
                    && !value_matches(existing.current_value(), opt.current_value())
                {
                    warn!(name = %opt.name, "mismatched option values across occurrences");
                }
                idx
            }
            None => {
                by_name.insert(opt.unique_name(), canonical.len());
                canonical.push(opt);
                canonical.len() - 1
            }
        };
        lines.insert(line, idx);
    }
    (canonical, lines)
}

/// Emits prelude plus code with `#line` provenance resync: a file change
/// emits `#line <line> <file-index>`; a forward jump inside one file pads
/// with newlines when short, `#line` when 7+ lines. Blank and `//` lines
/// are compacted away; option lines re-emit from their current value, with
/// disabled toggle defines dropped entirely.
struct CodePrinter<'a> {
    opts: &'a HashMap<usize, ShaderOption>,
    out: String,
    file: i64,
    line: i64,
    last_content: Option<usize>,
    fragments: Vec<String>,
}

impl<'a> CodePrinter<'a> {
    fn print(prelude: &[String], code: &[TaggedLine], opts: &'a HashMap<usize, ShaderOption>) -> String {
        let mut printer = CodePrinter {
            opts,
            out: String::new(),
            file: -1,
            line: -1,
            last_content: None,
            fragments: Vec::new(),
        };
        for p in prelude {
            printer.out.push_str(p);
            printer.out.push('\n');
        }
        for (i, tagged) in code.iter().enumerate() {
            printer.emit(i, tagged);
        }
        printer.out
    }

    fn emit(&mut self, index: usize, tagged: &TaggedLine) {
        let opt = self.opts.get(&index);
        let text = match opt {
            Some(opt) => {
                if opt.is_toggle() && !opt.is_enabled() {
                    return;
                }
                opt.to_source()
            }
            None => {
                if self.skip_whitespace(tagged.line_break, &tagged.text) {
                    return;
                }
                tagged.text.clone()
            }
        };
        self.fix_line_numbers(tagged);
        if tagged.tag != Tag::MultilineComment {
            self.last_content = Some(self.fragments.len());
        }
        self.fragments.push(text);
        if tagged.line_break {
            self.flush_line();
        }
    }

    fn skip_whitespace(&mut self, line_break: bool, text: &str) -> bool {
        let stripped = text.trim_start();
        if stripped.is_empty() {
            if line_break {
                self.flush_line();
            } else {
                self.fragments.push(text.to_string());
            }
            return true;
        }
        stripped.starts_with("//")
    }

    fn fix_line_numbers(&mut self, tagged: &TaggedLine) {
        let t_file = tagged.file as i64;
        let t_line = i64::from(tagged.line);
        if t_file != self.file {
            self.flush_line();
            self.out.push_str(&format!("#line {t_line} {t_file}\n"));
            self.line = t_line;
            self.file = t_file;
        } else if t_line != self.line {
            self.flush_line();
            let delta = t_line - self.line;
            if delta < 7 {
                for _ in 0..delta.max(0) {
                    self.out.push('\n');
                }
            } else {
                self.out.push_str(&format!("#line {t_line}\n"));
            }
            self.line = t_line;
        }
    }

    fn flush_line(&mut self) {
        let Some(last_content) = self.last_content.take() else {
            // Only comment fragments pending; drop them.
            self.fragments.clear();
            return;
        };
        let max = last_content.min(self.fragments.len() - 1);
        self.line += 1;
        for (i, fragment) in self.fragments.iter().take(max + 1).enumerate() {
            if i == max {
                let trimmed = fragment.trim_end();
                if trimmed.is_empty() {
                    continue;
                }
                self.out.push_str(trimmed);
            } else {
                self.out.push_str(fragment);
            }
        }
        self.fragments.clear();
        self.out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemProvider;

    const BASIC: &str = "#version 120\n\
                         const float sunPathRotation = -40.0; // [-60.0 -40.0 0.0]\n\
                         #define FANCY\n\
                         #ifdef FANCY\n\
                         vec3 lit;\n\
                         #else\n\
                         vec3 unlit;\n\
                         #endif\n\
                         void main() {}\n";

    fn pack() -> MemProvider {
        MemProvider::new().with("/shaders/t.fsh", BASIC)
    }

    #[test]
    fn full_pipeline_emission() {
        let fs = pack();
        let pre = Preprocessor::new(&fs);
        let mut stage1 = pre.stage1("/shaders/t.fsh", true).unwrap();
        assert_eq!(stage1.defines().len(), 1);
        assert_eq!(stage1.consts().len(), 1);
        stage1.macros_mut().set("MC_VERSION", 10809);
        let stage2 = stage1.configure();
        assert_eq!(
            stage2.to_text(),
            "#version 120\n\
             #define MC_VERSION 10809\n\
             #line 2 1\n\
             const float sunPathRotation = -40.0;\n\
             #define FANCY\n\
             \n\
             vec3 lit;\n\
             \n\n\n\
             void main() {}\n"
        );
    }

    #[test]
    fn disabled_toggle_flips_branches_and_leaves_output() {
        let fs = pack();
        let pre = Preprocessor::new(&fs);
        let mut stage1 = pre.stage1("/shaders/t.fsh", true).unwrap();
        stage1.macros_mut().set("MC_VERSION", 10809);
        stage1
            .define_mut("FANCY")
            .unwrap()
            .set_current_value(&Value::Toggle(false));
        let text = stage1.configure().to_text();
        assert!(text.contains("vec3 unlit;"));
        assert!(!text.contains("vec3 lit;"));
        assert!(!text.contains("#define FANCY"));
    }

    #[test]
    fn repeated_configure_is_independent() {
        let fs = pack();
        let pre = Preprocessor::new(&fs);
        let mut stage1 = pre.stage1("/shaders/t.fsh", true).unwrap();
        stage1.macros_mut().set("MC_VERSION", 10809);
        let first = stage1.configure().to_text();
        stage1
            .define_mut("FANCY")
            .unwrap()
            .set_current_value(&Value::Toggle(false));
        let second = stage1.configure().to_text();
        stage1
            .define_mut("FANCY")
            .unwrap()
            .set_current_value(&Value::Toggle(true));
        let third = stage1.configure().to_text();
        assert_eq!(first, third);
        assert_ne!(first, second);
    }

    #[test]
    fn const_snapshot_applies_before_emission() {
        let fs = pack();
        let pre = Preprocessor::new(&fs);
        let mut stage1 = pre.stage1("/shaders/t.fsh", true).unwrap();
        stage1.macros_mut().set("MC_VERSION", 10809);
        let mut stage2 = stage1.configure();
        stage2
            .const_mut("sunPathRotation")
            .unwrap()
            .set_current_value(&Value::Double(0.0));
        assert!(stage2
            .to_text()
            .contains("const float sunPathRotation = 0.0;"));
    }

    #[test]
    fn long_jump_resyncs_with_line_directive() {
        let body = format!("#version 120\nfirst;\n{}last;\n", "// pad\n".repeat(10));
        let fs = MemProvider::new().with("/t.fsh", body);
        let pre = Preprocessor::new(&fs);
        let stage1 = pre.stage1("/t.fsh", true).unwrap();
        let text = stage1.configure().to_text();
        assert!(text.contains("#line 13\n"), "got: {text}");
    }

    #[test]
    fn untyped_sources_have_no_prelude() {
        let fs = MemProvider::new().with("/p.properties", "key=value\n#ifdef X\ndead=1\n#endif\n");
        let pre = Preprocessor::new(&fs);
        let stage1 = pre.stage1("/p.properties", false).unwrap();
        let stage2 = stage1.configure();
        assert!(stage2.render_targets().is_none());
        let text = stage2.to_text();
        assert!(text.contains("key=value"));
        assert!(!text.contains("dead=1"));
    }

    #[test]
    fn render_targets_surface_on_stage2() {
        let fs = MemProvider::new()
            .with("/t.fsh", "#version 120\n/* DRAWBUFFERS:025 */\nvoid main() {}\n");
        let pre = Preprocessor::new(&fs);
        let stage2 = pre.stage1("/t.fsh", true).unwrap().configure();
        assert_eq!(stage2.render_targets(), Some(&[0, 2, 5][..]));
    }

    #[test]
    fn commented_consts_are_discovered_but_not_emitted_mutable() {
        let src = "#version 120\n/*\nconst int shadowMapResolution = 1024; // [512 1024 2048]\n*/\nvoid main() {}\n";
        let fs = MemProvider::new().with("/t.fsh", src);
        let pre = Preprocessor::new(&fs);
        let stage1 = pre.stage1("/t.fsh", true).unwrap();
        let c = stage1
            .consts()
            .iter()
            .find(|c| c.name == "shadowMapResolution")
            .unwrap();
        assert!(c.is_readonly());
        let stage2 = stage1.configure();
        let c2 = stage2
            .consts()
            .iter()
            .find(|c| c.name == "shadowMapResolution")
            .unwrap();
        assert!(c2.is_readonly());
    }

    #[test]
    fn native_buffer_reuse_and_terminator() {
        let fs = pack();
        let pre = Preprocessor::new(&fs);
        let mut stage1 = pre.stage1("/shaders/t.fsh", true).unwrap();
        stage1.macros_mut().set("MC_VERSION", 10809);
        let stage2 = stage1.configure();
        let mut buf = NativeBuffer::new();
        stage2.write_native(&mut buf, true);
        assert_eq!(buf.as_bytes().last(), Some(&0));
        let len_terminated = buf.as_bytes().len();
        stage2.write_native(&mut buf, false);
        assert_eq!(buf.as_bytes().len(), len_terminated - 1);
        assert_eq!(buf.as_bytes(), stage2.to_bytes().as_slice());
    }

    #[test]
    fn macro_builder_keeps_insertion_order() {
        let mut m = MacroBuilder::new();
        m.set("B", 2);
        m.flag("A");
        m.set("B", 3);
        m.set_detect("C", "0.5");
        let keys: Vec<&str> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["B", "A", "C"]);
        assert_eq!(m.to_env().get("B"), Some(&Value::Int(3)));
    }
}
