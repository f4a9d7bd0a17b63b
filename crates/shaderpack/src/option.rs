//! Typed, discoverable configuration options harvested from shader source.
//!
//! Two kinds of option share one shape: *defines* (`#define NAME`,
//! `//#define NAME`, `#define NAME 0.5 // [0.0 0.5 1.0]`) act as
//! conditional-compilation markers, and *consts*
//! (`const float NAME = 0.5; // [0.0 0.5 1.0]`) are typed constant
//! declarations. Both carry an ordered legal-value list, a default index and
//! a current index; the trailing `[...]` annotation enumerates the legal
//! values a user may pick from.
//!
//! Types:
//!
//! - `Value` is the closed sum of everything an option or macro can hold.
//!   Equality across variants is deliberately coercive (`value_matches`):
//!   a toggle compares equal to 0/1, ints compare equal to doubles by
//!   numeric value, strings only to strings.
//! - `Mutability` gates mutation: `Readonly` and `Unconfigurable` options
//!   silently ignore all mutators.
//! - `ShaderOption` is the shared option shape; `OptionKind` distinguishes
//!   defines from consts.
//! - `DedupOptionList` collapses same-named options discovered across files
//!   onto a single backing instance.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

/// A single typed value inside an option's legal-value list.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Double(f64),
    Str(String),
    Toggle(bool),
}

impl Value {
    /// Parses a raw token the way option discovery does: booleans first,
    /// then integers (only when no decimal point is present), then floats,
    /// and finally a verbatim string.
    pub fn detect(raw: &str) -> Value {
        if raw.eq_ignore_ascii_case("true") {
            return Value::Toggle(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Value::Toggle(false);
        }
        if !raw.contains('.') {
            if let Ok(v) = raw.parse::<i32>() {
                return Value::Int(v);
            }
        }
        if let Ok(v) = raw.parse::<f64>() {
            return Value::Double(v);
        }
        Value::Str(raw.to_string())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Toggle(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64_clamped(&self, min: f64, max: f64) -> Option<f64> {
        self.as_f64().map(|v| v.clamp(min, max))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Toggle(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Double(v) => {
                // Round-trips `1.0` as `1.0` rather than `1`, matching the
                // annotated source text for whole doubles.
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Str(v) => f.write_str(v),
            Value::Toggle(true) => f.write_str("true"),
            Value::Toggle(false) => f.write_str("false"),
        }
    }
}

/// Coercive cross-variant equality: toggles match 0/1, ints match doubles by
/// numeric value, strings only ever match strings.
pub fn value_matches(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Toggle(x), Value::Toggle(y)) => x == y,
        (Value::Toggle(x), Value::Int(y)) | (Value::Int(y), Value::Toggle(x)) => {
            i32::from(*x) == *y
        }
        (Value::Toggle(x), Value::Double(y)) | (Value::Double(y), Value::Toggle(x)) => {
            f64::from(i32::from(*x)) == *y
        }
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Int(x), Value::Double(y)) | (Value::Double(y), Value::Int(x)) => {
            f64::from(*x) == *y
        }
        (Value::Double(x), Value::Double(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Mutable,
    Readonly,
    Unconfigurable,
}

/// Distinguishes the two option kinds sharing `ShaderOption`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKind {
    Define,
    Const {
        /// GLSL type token (`int`, `float`, `vec4`, ...), kept verbatim for
        /// re-emission.
        glsl_type: String,
        /// Consts inside block comments stay discoverable but never reach
        /// compiled output.
        in_comment: bool,
    },
}

/// One discovered option: a cursor over an immutable legal-value list.
#[derive(Debug, Clone)]
pub struct ShaderOption {
    pub name: String,
    kind: OptionKind,
    mutability: Mutability,
    legal_values: Arc<[Value]>,
    default_index: usize,
    current_index: usize,
}

impl ShaderOption {
    fn new(
        name: String,
        kind: OptionKind,
        mutability: Mutability,
        legal_values: Arc<[Value]>,
        index: usize,
    ) -> Self {
        Self {
            name,
            kind,
            mutability,
            legal_values,
            default_index: index,
            current_index: index,
        }
    }

    pub fn kind(&self) -> &OptionKind {
        &self.kind
    }

    pub fn current_value(&self) -> &Value {
        &self.legal_values[self.current_index]
    }

    pub fn default_value(&self) -> &Value {
        &self.legal_values[self.default_index]
    }

    pub fn is_default(&self) -> bool {
        self.current_index == self.default_index
    }

    pub fn value_count(&self) -> usize {
        self.legal_values.len()
    }

    pub fn value_index(&self) -> usize {
        self.current_index
    }

    pub fn value_at(&self, index: usize) -> &Value {
        &self.legal_values[index]
    }

    pub fn legal_values(&self) -> &[Value] {
        &self.legal_values
    }

    pub fn is_readonly(&self) -> bool {
        self.mutability != Mutability::Mutable
    }

    pub fn is_configurable(&self) -> bool {
        self.mutability != Mutability::Unconfigurable
    }

    /// True when the legal values are exactly the canonical `[false, true]`
    /// pair.
    pub fn is_toggle(&self) -> bool {
        self.legal_values.len() == 2
            && self.legal_values[0] == Value::Toggle(false)
            && self.legal_values[1] == Value::Toggle(true)
    }

    /// Current state of a toggle option. Calling this on a non-toggle is an
    /// engine bug.
    pub fn is_enabled(&self) -> bool {
        assert!(self.is_toggle(), "is_enabled on non-toggle option {}", self.name);
        self.current_value() == &Value::Toggle(true)
    }

    pub fn set_current_value(&mut self, value: &Value) {
        if self.is_readonly() {
            return;
        }
        self.current_index = value_index_of(value, &self.legal_values);
    }

    pub fn next_value(&mut self) {
        if self.is_readonly() {
            return;
        }
        self.current_index = (self.current_index + 1) % self.legal_values.len();
    }

    pub fn prev_value(&mut self) {
        if self.is_readonly() {
            return;
        }
        let n = self.legal_values.len();
        self.current_index = (self.current_index + n - 1) % n;
    }

    pub fn reset_to_default(&mut self) {
        if self.is_readonly() {
            return;
        }
        self.current_index = self.default_index;
    }

    /// Bounds-checked index assignment. An out-of-range index is an
    /// instrumentation error, not data-driven, and panics.
    pub fn set_value_index(&mut self, index: usize) {
        assert!(
            index < self.legal_values.len(),
            "option {} index {index} out of range 0..{}",
            self.name,
            self.legal_values.len()
        );
        if self.is_readonly() {
            return;
        }
        self.current_index = index;
    }

    /// Produces an independent index cursor over the same shared legal-value
    /// list. `readonly = false` yields the one user-facing mutable view;
    /// `readonly = true` the apply-time snapshot view. Unconfigurable (and
    /// already-readonly, when readonly is requested) options need no new
    /// cursor.
    pub fn copy_with_mutability(&self, readonly: bool) -> ShaderOption {
        if self.mutability == Mutability::Unconfigurable {
            return self.clone();
        }
        if readonly && self.mutability == Mutability::Readonly {
            return self.clone();
        }
        let mut copy = self.clone();
        copy.mutability = if readonly {
            Mutability::Readonly
        } else {
            Mutability::Mutable
        };
        copy
    }

    /// Re-emits the option as a compilable source line reflecting the
    /// current value.
    pub fn to_source(&self) -> String {
        match &self.kind {
            OptionKind::Define => {
                if self.is_toggle() {
                    if self.is_enabled() {
                        format!("#define {}", self.name)
                    } else {
                        format!("//#define {}", self.name)
                    }
                } else {
                    format!("#define {} {}", self.name, self.current_value())
                }
            }
            OptionKind::Const { glsl_type, .. } => {
                format!("const {} {} = {};", glsl_type, self.name, self.current_value())
            }
        }
    }

    /// `name=value` line for the persisted user option snapshot.
    pub fn to_props(&self) -> String {
        format!("{}={}", self.name, self.current_value())
    }

    /// Disambiguates a define and a const sharing a name.
    pub fn unique_name(&self) -> String {
        match self.kind {
            OptionKind::Define => format!("D\u{1}{}", self.name),
            OptionKind::Const { .. } => format!("C\u{1}{}", self.name),
        }
    }
}

fn value_index_of(expect: &Value, values: &[Value]) -> usize {
    values
        .iter()
        .position(|v| value_matches(expect, v))
        .unwrap_or(0)
}

/// Parses the trailing `// ... [v0 v1 v2]` annotation. Returns the legal
/// list, prepending the initial value if the annotation omitted it.
fn parse_allowed(initial: &Value, annotation: Option<&str>) -> Option<Arc<[Value]>> {
    let raw = annotation?.trim();
    if raw.is_empty() {
        return None;
    }
    let mut values: Vec<Value> = Vec::new();
    let mut any_match = false;
    for token in raw.split_whitespace() {
        let v = Value::detect(token);
        if !any_match {
            any_match = value_matches(&v, initial);
        }
        values.push(v);
    }
    if values.len() == 2 && values[0] == Value::Toggle(false) && values[1] == Value::Toggle(true) {
        return Some(toggle_values());
    }
    if !any_match {
        values.insert(0, initial.clone());
    }
    Some(values.into())
}

fn toggle_values() -> Arc<[Value]> {
    Arc::from(vec![Value::Toggle(false), Value::Toggle(true)])
}

/// Splits `code` at a trailing `// comment`, returning the code part and the
/// bracketed legal-value annotation if the comment carries one.
fn split_annotation(code: &str) -> (&str, Option<&str>) {
    match code.find("//") {
        Some(idx) => {
            let comment = &code[idx + 2..];
            let annotation = comment
                .find('[')
                .and_then(|open| comment[open + 1..].find(']').map(|close| &comment[open + 1..open + 1 + close]));
            (&code[..idx], annotation)
        }
        None => (code, None),
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_value_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

/// Tries to read a define option out of one source line. Handles the three
/// documented shapes, including the commented-out toggle form.
pub fn parse_define(line: &str) -> Option<ShaderOption> {
    let trimmed = line.trim_start();
    let (disabled, rest) = match trimmed.strip_prefix("//") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let rest = rest.strip_prefix("#define")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (body, annotation) = split_annotation(rest);
    let mut tokens = body.split_whitespace();
    let name = tokens.next()?;
    if !is_ident(name) {
        return None;
    }
    let value_token = tokens.next();
    if tokens.next().is_some() {
        return None;
    }
    match value_token {
        Some(token) => {
            // A commented-out define with a value is plain dead code, not a
            // disabled option.
            if disabled || !is_value_token(token) {
                return None;
            }
            let value = Value::detect(token);
            match parse_allowed(&value, annotation) {
                Some(allowed) => {
                    let idx = value_index_of(&value, &allowed);
                    Some(ShaderOption::new(
                        name.to_string(),
                        OptionKind::Define,
                        Mutability::Readonly,
                        allowed,
                        idx,
                    ))
                }
                None => Some(ShaderOption::new(
                    name.to_string(),
                    OptionKind::Define,
                    Mutability::Unconfigurable,
                    Arc::from(vec![value]),
                    0,
                )),
            }
        }
        None => {
            let idx = if disabled { 0 } else { 1 };
            Some(ShaderOption::new(
                name.to_string(),
                OptionKind::Define,
                Mutability::Readonly,
                toggle_values(),
                idx,
            ))
        }
    }
}

/// Tries to read a const option out of one source line:
/// `const <type> NAME = VALUE; // [legal values]`.
pub fn parse_const(line: &str, in_comment: bool) -> Option<ShaderOption> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix("const")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (body, annotation) = split_annotation(rest);
    let body = body.trim();
    let semi = body.find(';')?;
    if !body[semi + 1..].trim().is_empty() {
        return None;
    }
    let decl = &body[..semi];
    let (lhs, value_token) = {
        let eq = decl.find('=')?;
        (decl[..eq].trim(), decl[eq + 1..].trim())
    };
    if !is_value_token(value_token) {
        return None;
    }
    let mut lhs_tokens = lhs.split_whitespace();
    let glsl_type = lhs_tokens.next()?;
    let name = lhs_tokens.next()?;
    if lhs_tokens.next().is_some() || !is_ident(glsl_type) || !is_ident(name) {
        return None;
    }
    let value = Value::detect(value_token);
    let kind = OptionKind::Const {
        glsl_type: glsl_type.to_string(),
        in_comment,
    };
    match parse_allowed(&value, annotation) {
        Some(allowed) => {
            let idx = value_index_of(&value, &allowed);
            Some(ShaderOption::new(
                name.to_string(),
                kind,
                Mutability::Readonly,
                allowed,
                idx,
            ))
        }
        None => {
            if let Value::Toggle(v) = value {
                let idx = usize::from(v);
                Some(ShaderOption::new(
                    name.to_string(),
                    kind,
                    Mutability::Unconfigurable,
                    toggle_values(),
                    idx,
                ))
            } else {
                Some(ShaderOption::new(
                    name.to_string(),
                    kind,
                    Mutability::Unconfigurable,
                    Arc::from(vec![value]),
                    0,
                ))
            }
        }
    }
}

/// Collapses same-named options discovered across files onto one backing
/// instance, so runtime reads are consistent wherever the option appeared.
#[derive(Debug, Default)]
pub struct DedupOptionList {
    options: Vec<ShaderOption>,
    indices: std::collections::HashMap<String, usize>,
}

impl DedupOptionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, option: ShaderOption) {
        match self.indices.get(&option.unique_name()) {
            Some(&idx) => {
                let existing = &self.options[idx];
                if existing.legal_values() == option.legal_values()
                    && !value_matches(existing.current_value(), option.current_value())
                {
                    warn!(name = %option.name, "mismatched option values across files");
                }
                self.options[idx] = option;
            }
            None => {
                self.indices.insert(option.unique_name(), self.options.len());
                self.options.push(option);
            }
        }
    }

    pub fn add_all(&mut self, options: impl IntoIterator<Item = ShaderOption>) {
        for option in options {
            self.add(option);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ShaderOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn options(&self) -> &[ShaderOption] {
        &self.options
    }

    pub fn into_options(self) -> Vec<ShaderOption> {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_value_variants() {
        assert_eq!(Value::detect("true"), Value::Toggle(true));
        assert_eq!(Value::detect("FALSE"), Value::Toggle(false));
        assert_eq!(Value::detect("42"), Value::Int(42));
        assert_eq!(Value::detect("-7"), Value::Int(-7));
        assert_eq!(Value::detect("0.5"), Value::Double(0.5));
        assert_eq!(Value::detect("fancy"), Value::Str("fancy".into()));
    }

    #[test]
    fn coercive_equality() {
        assert!(value_matches(&Value::Int(1), &Value::Toggle(true)));
        assert!(value_matches(&Value::Toggle(false), &Value::Int(0)));
        assert!(value_matches(&Value::Int(1), &Value::Double(1.0)));
        assert!(value_matches(&Value::Double(0.0), &Value::Toggle(false)));
        assert!(!value_matches(&Value::Str("1".into()), &Value::Int(1)));
        assert!(!value_matches(&Value::Str("true".into()), &Value::Toggle(true)));
        assert!(value_matches(&Value::Str("a".into()), &Value::Str("a".into())));
    }

    #[test]
    fn parses_toggle_define() {
        let opt = parse_define("#define SHADOWS").unwrap();
        assert!(opt.is_toggle());
        assert!(opt.is_enabled());
        assert_eq!(opt.mutability, Mutability::Readonly);

        let off = parse_define("  // #define SHADOWS").unwrap();
        assert!(!off.is_enabled());
    }

    #[test]
    fn parses_valued_define_with_annotation() {
        let opt = parse_define("#define QUALITY 2 // fancy levels [0 1 2 4]").unwrap();
        assert_eq!(opt.current_value(), &Value::Int(2));
        assert_eq!(opt.value_count(), 4);
        assert_eq!(opt.mutability, Mutability::Readonly);
        assert_eq!(opt.to_source(), "#define QUALITY 2");
    }

    #[test]
    fn valued_define_without_annotation_is_unconfigurable() {
        let opt = parse_define("#define PI 3.14159").unwrap();
        assert!(!opt.is_configurable());
        assert_eq!(opt.value_count(), 1);
    }

    #[test]
    fn commented_valued_define_is_not_an_option() {
        assert!(parse_define("//#define QUALITY 2").is_none());
        assert!(parse_define("int x = 0;").is_none());
    }

    #[test]
    fn initial_value_prepended_when_missing_from_annotation() {
        let opt = parse_define("#define LEVEL 3 // [0 1 2]").unwrap();
        assert_eq!(opt.value_count(), 4);
        assert_eq!(opt.current_value(), &Value::Int(3));
        assert_eq!(opt.value_index(), 0);
    }

    #[test]
    fn parses_const_declaration() {
        let opt = parse_const("const float sunPathRotation = -40.0; // [-60.0 -40.0 0.0]", false)
            .unwrap();
        assert_eq!(opt.name, "sunPathRotation");
        assert_eq!(opt.current_value(), &Value::Double(-40.0));
        assert_eq!(opt.value_count(), 3);
        assert_eq!(
            opt.to_source(),
            "const float sunPathRotation = -40.0;"
        );
    }

    #[test]
    fn const_toggle_without_annotation_keeps_both_states() {
        let opt = parse_const("const bool shadowtex0Mipmap = true;", false).unwrap();
        assert!(opt.is_toggle());
        assert!(opt.is_enabled());
        assert!(!opt.is_configurable());
    }

    #[test]
    fn cyclic_next_prev_round_trip() {
        let mut opt = parse_define("#define Q 1 // [0 1 2]")
            .unwrap()
            .copy_with_mutability(false);
        let start = opt.value_index();
        for _ in 0..opt.value_count() {
            opt.next_value();
        }
        assert_eq!(opt.value_index(), start);
        opt.prev_value();
        opt.next_value();
        assert_eq!(opt.value_index(), start);
    }

    #[test]
    fn readonly_mutation_is_noop() {
        let mut opt = parse_define("#define Q 1 // [0 1 2]").unwrap();
        assert!(opt.is_readonly());
        let idx = opt.value_index();
        opt.next_value();
        opt.set_value_index(0);
        opt.set_current_value(&Value::Int(2));
        assert_eq!(opt.value_index(), idx);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_index_panics() {
        let mut opt = parse_define("#define Q 1 // [0 1 2]")
            .unwrap()
            .copy_with_mutability(false);
        opt.set_value_index(3);
    }

    #[test]
    fn copies_share_legal_values_with_independent_cursors() {
        let discovered = parse_define("#define Q 1 // [0 1 2]").unwrap();
        let mut user = discovered.copy_with_mutability(false);
        let snapshot = discovered.copy_with_mutability(true);
        user.next_value();
        assert_ne!(user.value_index(), snapshot.value_index());
        assert!(Arc::ptr_eq(&user.legal_values, &snapshot.legal_values));
    }

    #[test]
    fn dedup_keeps_single_backing_instance() {
        let mut list = DedupOptionList::new();
        list.add(parse_define("#define Q 1 // [0 1 2]").unwrap());
        list.add(parse_define("#define Q 1 // [0 1 2]").unwrap());
        list.add(parse_define("#define R 0.5").unwrap());
        assert_eq!(list.options().len(), 2);
    }

    #[test]
    fn snapshot_line_round_trip() {
        let opt = parse_define("#define Q 1 // [0 1 2]").unwrap();
        assert_eq!(opt.to_props(), "Q=1");
    }
}
