//! Conditional-compilation interpreter.
//!
//! Walks a tagged-line list and resolves `#ifdef`/`#if`/`#elif`/`#else`/
//! `#endif` nesting against a macro environment seeded from injected build
//! facts and the pack's own option lines. Dead lines are kept, commented
//! out, so downstream line numbering is unaffected. The walk is pure with
//! respect to its inputs: two runs over the same line list with different
//! environments are fully independent.
//!
//! Types:
//!
//! - `InterpretOutput` carries the surviving code, the re-keyed option map,
//!   and (for typed sources) the `#version`/`#extension` prelude inputs plus
//!   the declared render-target list.
//! - `Num` is the expression evaluator's int/float value.
//!
//! Functions:
//!
//! - `interpret` runs the walk.
//! - `eval_expr` evaluates one `#if`/`#elif` expression.
//! - `parse_render_targets` reads `DRAWBUFFERS:`/`RENDERTARGETS:` block
//!   comments.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{error, trace};

use crate::option::{ShaderOption, Value};
use crate::source::{Tag, TaggedLine};

/// Result of interpreting one compilation unit.
#[derive(Debug)]
pub struct InterpretOutput {
    /// Full `#version ...` line, when the source is typed and declares one.
    pub version: Option<String>,
    /// Live `#extension ...` lines in order of appearance.
    pub extensions: Vec<String>,
    /// Last live render-target directive, if any.
    pub render_targets: Option<Vec<i32>>,
    pub code: Vec<TaggedLine>,
    /// Surviving options, keyed by *output* line index.
    pub options: HashMap<usize, ShaderOption>,
}

/// Per-nesting-level bit state. Level 0 is the top of the file and is never
/// set; `#if` pushes level `depth`.
#[derive(Debug, Default)]
struct Levels {
    bits: Vec<bool>,
}

impl Levels {
    fn get(&self, level: usize) -> bool {
        self.bits.get(level).copied().unwrap_or(false)
    }

    fn set(&mut self, level: usize, value: bool) {
        if self.bits.len() <= level {
            self.bits.resize(level + 1, false);
        }
        self.bits[level] = value;
    }

    fn any_below(&self, level: usize) -> bool {
        self.bits.iter().take(level).any(|b| *b)
    }

    fn none_set(&self) -> bool {
        !self.bits.iter().any(|b| *b)
    }
}

struct Interpreter<'a> {
    in_options: &'a HashMap<usize, ShaderOption>,
    source_files: &'a [String],
    typed: bool,
    defines: HashMap<String, Value>,
    disabled: Levels,
    elif_taken: Levels,
    depth: usize,
    out: InterpretOutput,
}

/// Interprets `code` against `external_defines` plus the option lines named
/// by `in_options` (keyed by input line index). `typed` enables
/// `#version`/`#extension` handling and render-target harvesting.
pub fn interpret(
    in_options: &HashMap<usize, ShaderOption>,
    code: &[TaggedLine],
    source_files: &[String],
    external_defines: &HashMap<String, Value>,
    typed: bool,
) -> InterpretOutput {
    let mut interp = Interpreter {
        in_options,
        source_files,
        typed,
        defines: external_defines.clone(),
        disabled: Levels::default(),
        elif_taken: Levels::default(),
        depth: 0,
        out: InterpretOutput {
            version: None,
            extensions: Vec::new(),
            render_targets: None,
            code: Vec::with_capacity(code.len()),
            options: HashMap::new(),
        },
    };
    for (i, line) in code.iter().enumerate() {
        interp.step(i, line);
    }
    interp.out
}

impl Interpreter<'_> {
    fn step(&mut self, index: usize, line: &TaggedLine) {
        let hide = match line.tag {
            Tag::Macro => self.directive(line.text.trim(), line, index),
            Tag::Standard => {
                self.option_line(index);
                false
            }
            Tag::MultilineComment => false,
        };
        if hide || !self.disabled.none_set() {
            let mut dead = line.clone();
            dead.text = format!("// {}", line.text);
            self.out.code.push(dead);
            return;
        }
        if line.tag == Tag::MultilineComment {
            if let Some(rt) = parse_render_targets(&line.text) {
                self.out.render_targets = Some(rt);
            }
        }
        self.out.code.push(line.clone());
    }

    /// Returns true when the directive line itself must be commented out of
    /// the output.
    fn directive(&mut self, macro_text: &str, line: &TaggedLine, index: usize) -> bool {
        if let Some(arg) = macro_text.strip_prefix("#ifdef ") {
            self.open_level(|s| s.defines.contains_key(arg.trim()), line);
            true
        } else if let Some(arg) = macro_text.strip_prefix("#ifndef ") {
            self.open_level(|s| !s.defines.contains_key(arg.trim()), line);
            true
        } else if let Some(expr) = macro_text.strip_prefix("#if ") {
            self.open_expr_level(expr, line);
            true
        } else if let Some(expr) = macro_text.strip_prefix("#elif ") {
            self.elif(expr, line);
            true
        } else if macro_text.starts_with("#else") {
            self.alt(line);
            true
        } else if macro_text.starts_with("#endif") {
            self.close_level(line);
            true
        } else if let Some(arg) = macro_text.strip_prefix("#undef ") {
            if self.disabled.none_set() {
                self.defines.remove(arg.trim());
            }
            true
        } else if self.typed && macro_text.starts_with("#version ") {
            if self.disabled.none_set() {
                if self.out.version.is_some() {
                    trace!(
                        file = %self.file_name(line),
                        line = line.line,
                        "multiple version directives"
                    );
                }
                self.out.version = Some(macro_text.to_string());
            }
            true
        } else if self.typed && macro_text.starts_with("#extension ") {
            if self.disabled.none_set() {
                self.out.extensions.push(macro_text.to_string());
            } else {
                trace!(file = %self.file_name(line), line = line.line, "disabled extension");
            }
            true
        } else {
            self.option_line(index);
            false
        }
    }

    fn open_level(&mut self, cond: impl FnOnce(&Self) -> bool, _line: &TaggedLine) {
        self.depth += 1;
        if self.disabled.any_below(self.depth) {
            return;
        }
        let res = cond(self);
        self.elif_taken.set(self.depth, res);
        self.disabled.set(self.depth, !res);
    }

    fn open_expr_level(&mut self, expr: &str, line: &TaggedLine) {
        self.depth += 1;
        if self.disabled.any_below(self.depth) {
            return;
        }
        match eval_expr(expr, &self.defines) {
            Ok(v) => {
                let res = v.as_bool();
                self.elif_taken.set(self.depth, res);
                self.disabled.set(self.depth, !res);
            }
            Err(e) => {
                self.elif_taken.set(self.depth, false);
                self.disabled.set(self.depth, true);
                error!(
                    file = %self.file_name(line),
                    line = line.line,
                    error = %e,
                    "malformed #if expression"
                );
            }
        }
    }

    fn elif(&mut self, expr: &str, line: &TaggedLine) {
        if self.depth == 0 {
            error!(file = %self.file_name(line), line = line.line, "dangling #elif");
            return;
        }
        if self.disabled.any_below(self.depth) {
            return;
        }
        if self.elif_taken.get(self.depth) {
            self.disabled.set(self.depth, true);
            return;
        }
        match eval_expr(expr, &self.defines) {
            Ok(v) => {
                let res = v.as_bool();
                self.elif_taken.set(self.depth, res);
                self.disabled.set(self.depth, !res);
            }
            Err(e) => {
                self.disabled.set(self.depth, true);
                error!(
                    file = %self.file_name(line),
                    line = line.line,
                    error = %e,
                    "malformed #elif expression"
                );
            }
        }
    }

    fn alt(&mut self, line: &TaggedLine) {
        if self.depth == 0 {
            error!(file = %self.file_name(line), line = line.line, "dangling #else");
            return;
        }
        if self.disabled.any_below(self.depth) {
            return;
        }
        if self.elif_taken.get(self.depth) {
            self.disabled.set(self.depth, true);
        } else {
            let flipped = !self.disabled.get(self.depth);
            self.disabled.set(self.depth, flipped);
            self.elif_taken.set(self.depth, true);
        }
    }

    fn close_level(&mut self, line: &TaggedLine) {
        if self.depth == 0 {
            error!(file = %self.file_name(line), line = line.line, "dangling #endif");
            return;
        }
        self.disabled.set(self.depth, false);
        self.elif_taken.set(self.depth, false);
        self.depth -= 1;
    }

    /// Records an option at this line, if one was discovered here, and feeds
    /// its value into the macro environment. Disabled toggles contribute
    /// nothing.
    fn option_line(&mut self, index: usize) {
        let Some(opt) = self.in_options.get(&index) else {
            return;
        };
        if !self.disabled.none_set() {
            return;
        }
        let opt = opt.copy_with_mutability(true);
        if !opt.is_toggle() || opt.is_enabled() {
            self.defines
                .insert(opt.name.clone(), opt.current_value().clone());
        }
        self.out.options.insert(self.out.code.len(), opt);
    }

    fn file_name(&self, line: &TaggedLine) -> &str {
        self.source_files
            .get(line.file)
            .map(String::as_str)
            .unwrap_or("?")
    }
}

/// Reads a `/* DRAWBUFFERS:0257 */` or `/* RENDERTARGETS:0,2,13 */`
/// directive out of a comment line. Returns None for anything else.
pub fn parse_render_targets(line: &str) -> Option<Vec<i32>> {
    let open = line.find("/*")?;
    let close = line.find("*/")?;
    if close < open + 2 {
        return None;
    }
    let body = line[open + 2..close].trim();
    if let Some(digits) = body.strip_prefix("DRAWBUFFERS:") {
        let digits = digits.trim();
        if digits.is_empty() {
            return None;
        }
        digits
            .chars()
            .map(|c| c.to_digit(10).map(|d| d as i32))
            .collect()
    } else if let Some(list) = body.strip_prefix("RENDERTARGETS:") {
        let list = list.trim();
        if list.is_empty() {
            return None;
        }
        list.split(',').map(|n| n.trim().parse().ok()).collect()
    } else {
        None
    }
}

/// Int/float value inside macro expressions. Binary arithmetic upcasts to
/// float when either side is one; comparisons and logic yield int 0/1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i32),
    Double(f64),
}

impl Num {
    pub fn as_bool(self) -> bool {
        match self {
            Num::Int(v) => v != 0,
            Num::Double(v) => v != 0.0,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => f64::from(v),
            Num::Double(v) => v,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("functional macros are not supported")]
    FunctionCall,
    #[error("division by zero")]
    DivisionByZero,
    #[error("macro expansion too deep")]
    TooDeep,
    #[error("invalid number {0:?}")]
    BadNumber(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Num),
    Ident(String),
    Op(&'static str),
}

fn lex(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if !c.is_ascii() {
            return Err(ExprError::UnexpectedChar(c));
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit())
        {
            let start = i;
            let mut seen_dot = false;
            while i < bytes.len() {
                let d = bytes[i] as char;
                if d.is_ascii_digit() {
                    i += 1;
                } else if d == '.' && !seen_dot {
                    seen_dot = true;
                    i += 1;
                } else {
                    break;
                }
            }
            // Literal suffixes (1L, 2u, 0.5f) are accepted and ignored.
            while i < bytes.len() && (bytes[i] as char).is_ascii_alphabetic() {
                i += 1;
            }
            let text = &src[start..i];
            let trimmed = text.trim_end_matches(|c: char| c.is_ascii_alphabetic());
            let num = if seen_dot {
                trimmed
                    .parse::<f64>()
                    .map(Num::Double)
                    .map_err(|_| ExprError::BadNumber(text.to_string()))?
            } else {
                trimmed
                    .parse::<i32>()
                    .map(Num::Int)
                    .map_err(|_| ExprError::BadNumber(text.to_string()))?
            };
            tokens.push(Token::Num(num));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() {
                let d = bytes[i] as char;
                if d.is_ascii_alphanumeric() || d == '_' {
                    i += 1;
                } else {
                    break;
                }
            }
            tokens.push(Token::Ident(src[start..i].to_string()));
            continue;
        }
        let two = if i + 1 < bytes.len() { &src[i..i + 2] } else { "" };
        let op = match two {
            "&&" => Some("&&"),
            "||" => Some("||"),
            "==" => Some("=="),
            "!=" => Some("!="),
            "<=" => Some("<="),
            ">=" => Some(">="),
            _ => None,
        };
        if let Some(op) = op {
            tokens.push(Token::Op(op));
            i += 2;
            continue;
        }
        let op = match c {
            '!' => "!",
            '<' => "<",
            '>' => ">",
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            '%' => "%",
            '(' => "(",
            ')' => ")",
            '.' => ".",
            _ => return Err(ExprError::UnexpectedChar(c)),
        };
        tokens.push(Token::Op(op));
        i += 1;
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    defines: &'a HashMap<String, Value>,
    depth: u32,
}

const MAX_MACRO_DEPTH: u32 = 32;

/// Evaluates a `#if`/`#elif` expression. Undefined identifiers are 0;
/// defined identifiers re-evaluate their value text. Trailing `//` comments
/// are stripped.
pub fn eval_expr(src: &str, defines: &HashMap<String, Value>) -> Result<Num, ExprError> {
    eval_expth(src, defines, 0)
}

fn eval_expth(src: &str, defines: &HashMap<String, Value>, depth: u32) -> Result<Num, ExprError> {
    if depth > MAX_MACRO_DEPTH {
        return Err(ExprError::TooDeep);
    }
    let src = match src.find("//") {
        Some(idx) => &src[..idx],
        None => src,
    };
    let mut parser = ExprParser {
        tokens: lex(src)?,
        pos: 0,
        defines,
        depth,
    };
    let value = parser.or_expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(t) => Err(ExprError::UnexpectedToken(format!("{t:?}"))),
    }
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<Num, ExprError> {
        let mut left = self.and_expr()?;
        while self.eat_op("||") {
            let right = self.and_expr()?;
            left = Num::Int(i32::from(left.as_bool() || right.as_bool()));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Num, ExprError> {
        let mut left = self.cmp_expr()?;
        while self.eat_op("&&") {
            let right = self.cmp_expr()?;
            left = Num::Int(i32::from(left.as_bool() && right.as_bool()));
        }
        Ok(left)
    }

    fn cmp_expr(&mut self) -> Result<Num, ExprError> {
        let mut left = self.add_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(o @ ("==" | "!=" | "<" | "<=" | ">" | ">="))) => *o,
                _ => break,
            };
            self.pos += 1;
            let right = self.add_expr()?;
            let (l, r) = (left.as_f64(), right.as_f64());
            let res = match op {
                "==" => l == r,
                "!=" => l != r,
                "<" => l < r,
                "<=" => l <= r,
                ">" => l > r,
                _ => l >= r,
            };
            left = Num::Int(i32::from(res));
        }
        Ok(left)
    }

    fn add_expr(&mut self) -> Result<Num, ExprError> {
        let mut left = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(o @ ("+" | "-"))) => *o,
                _ => break,
            };
            self.pos += 1;
            let right = self.mul_expr()?;
            left = arith(left, right, op)?;
        }
        Ok(left)
    }

    fn mul_expr(&mut self) -> Result<Num, ExprError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(o @ ("*" | "/" | "%"))) => *o,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = arith(left, right, op)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Num, ExprError> {
        if self.eat_op("!") {
            let v = self.unary()?;
            return Ok(Num::Int(i32::from(!v.as_bool())));
        }
        if self.eat_op("-") {
            return Ok(match self.unary()? {
                Num::Int(v) => Num::Int(v.wrapping_neg()),
                Num::Double(v) => Num::Double(-v),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Num, ExprError> {
        match self.peek().cloned() {
            Some(Token::Num(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Token::Op("(")) => {
                self.pos += 1;
                let v = self.or_expr()?;
                if !self.eat_op(")") {
                    return Err(ExprError::UnexpectedEnd);
                }
                Ok(v)
            }
            Some(Token::Ident(name)) => {
                self.pos += 1;
                if name == "defined" {
                    return self.defined();
                }
                if matches!(self.peek(), Some(Token::Op("("))) {
                    return Err(ExprError::FunctionCall);
                }
                if matches!(self.peek(), Some(Token::Op("."))) {
                    return Err(ExprError::UnexpectedToken(".".to_string()));
                }
                match self.defines.get(&name) {
                    None => Ok(Num::Int(0)),
                    Some(Value::Int(v)) => Ok(Num::Int(*v)),
                    Some(Value::Double(v)) => Ok(Num::Double(*v)),
                    Some(Value::Toggle(v)) => Ok(Num::Int(i32::from(*v))),
                    Some(Value::Str(text)) => {
                        eval_expth(text, self.defines, self.depth + 1)
                    }
                }
            }
            Some(t) => Err(ExprError::UnexpectedToken(format!("{t:?}"))),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn defined(&mut self) -> Result<Num, ExprError> {
        let parens = self.eat_op("(");
        let name = match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                name
            }
            Some(t) => return Err(ExprError::UnexpectedToken(format!("{t:?}"))),
            None => return Err(ExprError::UnexpectedEnd),
        };
        if parens && !self.eat_op(")") {
            return Err(ExprError::UnexpectedEnd);
        }
        Ok(Num::Int(i32::from(self.defines.contains_key(&name))))
    }
}

fn arith(left: Num, right: Num, op: &str) -> Result<Num, ExprError> {
    if let (Num::Int(l), Num::Int(r)) = (left, right) {
        let v = match op {
            "+" => l.wrapping_add(r),
            "-" => l.wrapping_sub(r),
            "*" => l.wrapping_mul(r),
            "/" => l.checked_div(r).ok_or(ExprError::DivisionByZero)?,
            _ => l.checked_rem(r).ok_or(ExprError::DivisionByZero)?,
        };
        return Ok(Num::Int(v));
    }
    let (l, r) = (left.as_f64(), right.as_f64());
    let v = match op {
        "+" => l + r,
        "-" => l - r,
        "*" => l * r,
        "/" => l / r,
        _ => l % r,
    };
    Ok(Num::Double(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::parse_define;
    use crate::source::mark_multiline_comments;

    fn env(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn arithmetic_and_precedence() {
        let e = env(&[]);
        assert_eq!(eval_expr("1 + 2 * 3", &e).unwrap(), Num::Int(7));
        assert_eq!(eval_expr("(1 + 2) * 3", &e).unwrap(), Num::Int(9));
        assert_eq!(eval_expr("7 % 4", &e).unwrap(), Num::Int(3));
        assert_eq!(eval_expr("1 + 0.5", &e).unwrap(), Num::Double(1.5));
        assert_eq!(eval_expr("-3 + 1", &e).unwrap(), Num::Int(-2));
    }

    #[test]
    fn comparisons_and_logic() {
        let e = env(&[("A", Value::Int(2))]);
        assert_eq!(eval_expr("A >= 2", &e).unwrap(), Num::Int(1));
        assert_eq!(eval_expr("A == 2 && A < 3", &e).unwrap(), Num::Int(1));
        assert_eq!(eval_expr("A > 2 || A != 2", &e).unwrap(), Num::Int(0));
        assert_eq!(eval_expr("!A", &e).unwrap(), Num::Int(0));
    }

    #[test]
    fn undefined_identifier_is_zero() {
        let e = env(&[]);
        assert_eq!(eval_expr("MISSING", &e).unwrap(), Num::Int(0));
        assert_eq!(eval_expr("MISSING + 1", &e).unwrap(), Num::Int(1));
    }

    #[test]
    fn defined_both_forms() {
        let e = env(&[("A", Value::Int(0))]);
        assert_eq!(eval_expr("defined A", &e).unwrap(), Num::Int(1));
        assert_eq!(eval_expr("defined(A)", &e).unwrap(), Num::Int(1));
        assert_eq!(eval_expr("defined(B)", &e).unwrap(), Num::Int(0));
    }

    #[test]
    fn string_defines_evaluate_recursively() {
        let e = env(&[("A", Value::Str("B + 1".into())), ("B", Value::Int(2))]);
        assert_eq!(eval_expr("A", &e).unwrap(), Num::Int(3));
    }

    #[test]
    fn rejects_functional_macros_and_garbage() {
        let e = env(&[]);
        assert!(matches!(eval_expr("f(1)", &e), Err(ExprError::FunctionCall)));
        assert!(eval_expr("1 +", &e).is_err());
        assert!(eval_expr("@", &e).is_err());
        assert!(matches!(eval_expr("1 / 0", &e), Err(ExprError::DivisionByZero)));
    }

    #[test]
    fn trailing_comment_is_stripped() {
        let e = env(&[]);
        assert_eq!(eval_expr("1 + 1 // why", &e).unwrap(), Num::Int(2));
    }

    #[test]
    fn parses_drawbuffers() {
        assert_eq!(
            parse_render_targets("/* DRAWBUFFERS:0257 */"),
            Some(vec![0, 2, 5, 7])
        );
        assert_eq!(
            parse_render_targets("/* RENDERTARGETS:0,2,13 */"),
            Some(vec![0, 2, 13])
        );
        assert_eq!(parse_render_targets("/* DRAWBUFFERS:0x */"), None);
        assert_eq!(parse_render_targets("/* something else */"), None);
        assert_eq!(parse_render_targets("int x;"), None);
    }

    fn lines(src: &str) -> Vec<TaggedLine> {
        let fs = crate::source::MemProvider::new().with("/t.fsh", src);
        let mut inc = crate::source::Includer::new(&fs);
        assert!(inc.read("/t.fsh"));
        mark_multiline_comments(inc.into_parts().1)
    }

    fn texts(out: &InterpretOutput) -> Vec<&str> {
        out.code.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn ifdef_else_nesting() {
        let src = "#ifdef A\nyes_a\n#ifdef B\nyes_b\n#else\nno_b\n#endif\n#else\nno_a\n#endif\n";
        let code = lines(src);
        let files = vec!["<internal>".to_string(), "/t.fsh".to_string()];
        let out = interpret(
            &HashMap::new(),
            &code,
            &files,
            &env(&[("A", Value::Int(1))]),
            true,
        );
        assert_eq!(
            texts(&out),
            vec![
                "// #ifdef A",
                "yes_a",
                "// #ifdef B",
                "// yes_b",
                "// #else",
                "no_b",
                "// #endif",
                "// #else",
                "// no_a",
                "// #endif",
            ]
        );
    }

    #[test]
    fn elif_chain_takes_first_true_branch() {
        let src = "#if A == 1\none\n#elif A == 2\ntwo\n#elif A == 2\ndup\n#else\nother\n#endif\n";
        let code = lines(src);
        let files = vec!["<internal>".to_string(), "/t.fsh".to_string()];
        let out = interpret(
            &HashMap::new(),
            &code,
            &files,
            &env(&[("A", Value::Int(2))]),
            true,
        );
        let live: Vec<&str> = texts(&out)
            .into_iter()
            .filter(|t| !t.starts_with("// "))
            .collect();
        assert_eq!(live, vec!["two"]);
    }

    #[test]
    fn malformed_expression_kills_the_branch() {
        let src = "#if 1 +\ndead\n#endif\nalive\n";
        let code = lines(src);
        let files = vec!["<internal>".to_string(), "/t.fsh".to_string()];
        let out = interpret(&HashMap::new(), &code, &files, &env(&[]), true);
        let live: Vec<&str> = texts(&out)
            .into_iter()
            .filter(|t| !t.starts_with("// "))
            .collect();
        assert_eq!(live, vec!["alive"]);
    }

    #[test]
    fn undef_removes_from_environment() {
        let src = "#undef A\n#ifdef A\ndead\n#endif\n";
        let code = lines(src);
        let files = vec!["<internal>".to_string(), "/t.fsh".to_string()];
        let out = interpret(
            &HashMap::new(),
            &code,
            &files,
            &env(&[("A", Value::Int(1))]),
            true,
        );
        let live: Vec<&str> = texts(&out)
            .into_iter()
            .filter(|t| !t.starts_with("// "))
            .collect();
        assert!(live.is_empty());
    }

    #[test]
    fn collects_version_and_extensions() {
        let src = "#version 120\n#extension GL_ARB_shader_texture_lod : enable\nvoid main() {}\n";
        let code = lines(src);
        let files = vec!["<internal>".to_string(), "/t.fsh".to_string()];
        let out = interpret(&HashMap::new(), &code, &files, &env(&[]), true);
        assert_eq!(out.version.as_deref(), Some("#version 120"));
        assert_eq!(
            out.extensions,
            vec!["#extension GL_ARB_shader_texture_lod : enable"]
        );
        // Directive lines leave the code stream.
        assert!(texts(&out)[0].starts_with("// "));
    }

    #[test]
    fn last_live_render_target_directive_wins() {
        let src = "/* DRAWBUFFERS:01 */\n#if 0\n/* DRAWBUFFERS:567 */\n#endif\n/* RENDERTARGETS:3,4 */\n";
        let code = lines(src);
        let files = vec!["<internal>".to_string(), "/t.fsh".to_string()];
        let out = interpret(&HashMap::new(), &code, &files, &env(&[]), true);
        assert_eq!(out.render_targets, Some(vec![3, 4]));
    }

    #[test]
    fn option_lines_feed_the_environment() {
        let src = "#define FANCY\n#ifdef FANCY\nlit\n#endif\n//#define EXTRA\n#ifdef EXTRA\ndead\n#endif\n";
        let code = lines(src);
        let files = vec!["<internal>".to_string(), "/t.fsh".to_string()];
        let mut opts = HashMap::new();
        opts.insert(0, parse_define("#define FANCY").unwrap());
        opts.insert(4, parse_define("//#define EXTRA").unwrap());
        let out = interpret(&opts, &code, &files, &env(&[]), true);
        let live: Vec<&str> = texts(&out)
            .into_iter()
            .filter(|t| !t.starts_with("// "))
            .collect();
        assert_eq!(live, vec!["#define FANCY", "lit", "//#define EXTRA"]);
        assert_eq!(out.options.len(), 2);
        assert!(out.options.values().all(|o| o.is_readonly()));
    }

    #[test]
    fn two_runs_over_one_line_list_are_independent() {
        let src = "#ifdef A\na_on\n#else\na_off\n#endif\n";
        let code = lines(src);
        let files = vec!["<internal>".to_string(), "/t.fsh".to_string()];
        let on = interpret(&HashMap::new(), &code, &files, &env(&[("A", Value::Int(1))]), true);
        let off = interpret(&HashMap::new(), &code, &files, &env(&[]), true);
        assert!(texts(&on).contains(&"a_on"));
        assert!(texts(&off).contains(&"a_off"));
    }
}
