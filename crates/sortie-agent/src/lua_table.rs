//! Reader/writer for the Lua table literals DCS uses for its settings files,
//! e.g. `cfg = { ["name"] = "server", ["missionList"] = { [1] = "a.miz" } }`.
//!
//! Only the data subset is understood: nested table constructors, strings,
//! numbers, booleans, `nil` and comments. Entry order is preserved so a
//! rewrite stays diffable against the original.

use std::fmt::Write as _;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum LuaValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Table(LuaTable),
}

impl From<&str> for LuaValue {
    fn from(value: &str) -> Self {
        LuaValue::Str(value.to_string())
    }
}

impl From<String> for LuaValue {
    fn from(value: String) -> Self {
        LuaValue::Str(value)
    }
}

impl From<i64> for LuaValue {
    fn from(value: i64) -> Self {
        LuaValue::Int(value)
    }
}

impl From<bool> for LuaValue {
    fn from(value: bool) -> Self {
        LuaValue::Bool(value)
    }
}

impl From<LuaTable> for LuaValue {
    fn from(value: LuaTable) -> Self {
        LuaValue::Table(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LuaKey {
    Int(i64),
    Str(String),
}

impl From<&str> for LuaKey {
    fn from(value: &str) -> Self {
        LuaKey::Str(value.to_string())
    }
}

impl From<i64> for LuaKey {
    fn from(value: i64) -> Self {
        LuaKey::Int(value)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LuaTable {
    entries: Vec<(LuaKey, LuaValue)>,
}

impl LuaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Array-style table with keys `1..=n`.
    pub fn from_list(items: impl IntoIterator<Item = LuaValue>) -> Self {
        Self {
            entries: items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (LuaKey::Int(i as i64 + 1), v))
                .collect(),
        }
    }

    pub fn get(&self, key: &LuaKey) -> Option<&LuaValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&LuaValue> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, LuaKey::Str(s) if s == key))
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get_str(key).is_some()
    }

    /// Replaces an existing entry in place, or appends a new one.
    pub fn set(&mut self, key: impl Into<LuaKey>, value: impl Into<LuaValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn entries(&self) -> &[(LuaKey, LuaValue)] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A file of the form `<name> = <table>`.
#[derive(Debug, Clone, PartialEq)]
pub struct LuaAssignment {
    pub name: String,
    pub table: LuaTable,
}

impl LuaAssignment {
    pub fn parse(src: &str) -> Result<Self, LuaParseError> {
        Parser::new(src).assignment()
    }

    /// Serializes with one entry per line and `indent` per nesting level.
    pub fn to_lua(&self, indent: &str) -> String {
        let mut out = String::new();
        out.push_str(&self.name);
        out.push_str(" = ");
        write_table(&mut out, &self.table, indent, 0);
        out.push('\n');
        out
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("lua parse error at line {line}: {message}")]
pub struct LuaParseError {
    pub line: usize,
    pub message: String,
}

// ============================================================================
// Writer
// ============================================================================

fn write_table(out: &mut String, t: &LuaTable, indent: &str, level: usize) {
    if t.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{\n");
    for (k, v) in &t.entries {
        push_indent(out, indent, level + 1);
        match k {
            LuaKey::Int(i) => {
                let _ = write!(out, "[{i}]");
            }
            LuaKey::Str(s) => {
                out.push('[');
                write_string(out, s);
                out.push(']');
            }
        }
        out.push_str(" = ");
        write_value(out, v, indent, level + 1);
        out.push_str(",\n");
    }
    push_indent(out, indent, level);
    out.push('}');
}

fn write_value(out: &mut String, v: &LuaValue, indent: &str, level: usize) {
    match v {
        LuaValue::Nil => out.push_str("nil"),
        LuaValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        LuaValue::Int(i) => {
            let _ = write!(out, "{i}");
        }
        LuaValue::Float(f) if f.is_nan() => out.push_str("0/0"),
        LuaValue::Float(f) if f.is_infinite() => {
            out.push_str(if *f > 0.0 { "math.huge" } else { "-math.huge" })
        }
        LuaValue::Float(f) => {
            let _ = write!(out, "{f:?}");
        }
        LuaValue::Str(s) => write_string(out, s),
        LuaValue::Table(t) => write_table(out, t, indent, level),
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                let _ = write!(out, "\\{:03}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn push_indent(out: &mut String, indent: &str, level: usize) {
    for _ in 0..level {
        out.push_str(indent);
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Self {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn err(&self, message: impl Into<String>) -> LuaParseError {
        LuaParseError {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    fn expect(&mut self, want: u8) -> Result<(), LuaParseError> {
        self.skip_trivia()?;
        match self.peek() {
            Some(b) if b == want => {
                self.bump();
                Ok(())
            }
            Some(b) => Err(self.err(format!(
                "expected '{}', found '{}'",
                want as char, b as char
            ))),
            None => Err(self.err(format!("expected '{}', found end of input", want as char))),
        }
    }

    fn assignment(mut self) -> Result<LuaAssignment, LuaParseError> {
        self.skip_trivia()?;
        let name = self
            .ident()
            .ok_or_else(|| self.err("expected variable name"))?;
        self.expect(b'=')?;
        self.skip_trivia()?;
        let table = match self.value()? {
            LuaValue::Table(t) => t,
            _ => return Err(self.err(format!("expected a table for '{name}'"))),
        };
        self.skip_trivia()?;
        if self.peek().is_some() {
            return Err(self.err("unexpected trailing content"));
        }
        Ok(LuaAssignment { name, table })
    }

    fn skip_trivia(&mut self) -> Result<(), LuaParseError> {
        loop {
            while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
                self.bump();
            }
            if self.peek() == Some(b'-') && self.peek_at(1) == Some(b'-') {
                self.pos += 2;
                if let Some(level) = self.long_bracket_level() {
                    self.long_bracket_body(level)?;
                } else {
                    while self.peek().is_some_and(|b| b != b'\n') {
                        self.bump();
                    }
                }
                continue;
            }
            return Ok(());
        }
    }

    /// `[[`, `[=[`, `[==[`, ... at the cursor.
    fn long_bracket_level(&self) -> Option<usize> {
        if self.peek() != Some(b'[') {
            return None;
        }
        let mut level = 0;
        while self.peek_at(1 + level) == Some(b'=') {
            level += 1;
        }
        (self.peek_at(1 + level) == Some(b'[')).then_some(level)
    }

    fn long_bracket_body(&mut self, level: usize) -> Result<String, LuaParseError> {
        self.pos += level + 2;
        // A newline directly after the opening bracket is not part of the body.
        if self.peek() == Some(b'\r') {
            self.bump();
        }
        if self.peek() == Some(b'\n') {
            self.bump();
        }
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated long bracket")),
                Some(b']') => {
                    let eqs = (0..level).all(|i| self.peek_at(1 + i) == Some(b'='));
                    if eqs && self.peek_at(1 + level) == Some(b']') {
                        let body = &self.src[start..self.pos];
                        self.pos += level + 2;
                        return String::from_utf8(body.to_vec())
                            .map_err(|_| self.err("invalid utf-8 in long string"));
                    }
                    self.bump();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        match self.peek() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
            _ => return None,
        }
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        Some(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn value(&mut self) -> Result<LuaValue, LuaParseError> {
        self.skip_trivia()?;
        match self.peek() {
            None => Err(self.err("expected a value, found end of input")),
            Some(b'{') => self.table().map(LuaValue::Table),
            Some(b'"') | Some(b'\'') => self.quoted_string().map(LuaValue::Str),
            Some(b'[') => match self.long_bracket_level() {
                Some(level) => self.long_bracket_body(level).map(LuaValue::Str),
                None => Err(self.err("unexpected '['")),
            },
            Some(b) if b == b'-' || b == b'.' || b.is_ascii_digit() => self.number(),
            Some(_) => {
                let word = self.ident().ok_or_else(|| self.err("unexpected character"))?;
                match word.as_str() {
                    "true" => Ok(LuaValue::Bool(true)),
                    "false" => Ok(LuaValue::Bool(false)),
                    "nil" => Ok(LuaValue::Nil),
                    "math" => self.math_huge().map(LuaValue::Float),
                    other => Err(self.err(format!("unsupported expression '{other}'"))),
                }
            }
        }
    }

    fn table(&mut self) -> Result<LuaTable, LuaParseError> {
        self.expect(b'{')?;
        let mut table = LuaTable::new();
        let mut next_index: i64 = 1;
        loop {
            self.skip_trivia()?;
            if self.peek() == Some(b'}') {
                self.bump();
                return Ok(table);
            }

            let (key, value) = if self.peek() == Some(b'[') && self.long_bracket_level().is_none()
            {
                self.bump();
                let key = match self.value()? {
                    LuaValue::Str(s) => LuaKey::Str(s),
                    LuaValue::Int(i) => LuaKey::Int(i),
                    LuaValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                        LuaKey::Int(f as i64)
                    }
                    _ => return Err(self.err("unsupported table key")),
                };
                self.expect(b']')?;
                self.expect(b'=')?;
                (key, self.value()?)
            } else if let Some(name) = self.named_field_key() {
                self.expect(b'=')?;
                (LuaKey::Str(name), self.value()?)
            } else {
                let key = LuaKey::Int(next_index);
                next_index += 1;
                (key, self.value()?)
            };
            table.set(key, value);

            self.skip_trivia()?;
            match self.peek() {
                Some(b',') | Some(b';') => {
                    self.bump();
                }
                Some(b'}') => {}
                Some(b) => {
                    return Err(self.err(format!("expected ',' or '}}', found '{}'", b as char)));
                }
                None => return Err(self.err("unterminated table")),
            }
        }
    }

    /// `name = ...` inside a constructor. Rewinds if the identifier is not
    /// followed by a single `=`.
    fn named_field_key(&mut self) -> Option<String> {
        let (pos, line) = (self.pos, self.line);
        let name = self.ident()?;
        if !matches!(name.as_str(), "true" | "false" | "nil") && self.skip_trivia().is_ok() {
            if self.peek() == Some(b'=') && self.peek_at(1) != Some(b'=') {
                return Some(name);
            }
        }
        self.pos = pos;
        self.line = line;
        None
    }

    /// Rest of `math.huge` once the `math` identifier has been consumed.
    fn math_huge(&mut self) -> Result<f64, LuaParseError> {
        self.expect(b'.')?;
        match self.ident().as_deref() {
            Some("huge") => Ok(f64::INFINITY),
            Some(other) => Err(self.err(format!("unsupported expression 'math.{other}'"))),
            None => Err(self.err("unsupported expression 'math.'")),
        }
    }

    fn number(&mut self) -> Result<LuaValue, LuaParseError> {
        let start = self.pos;
        let negative = self.peek() == Some(b'-');
        if negative {
            self.pos += 1;
            while self.peek().is_some_and(|b| b == b' ' || b == b'\t') {
                self.pos += 1;
            }
            if self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
                return match self.ident().as_deref() {
                    Some("math") => self.math_huge().map(|v| LuaValue::Float(-v)),
                    _ => {
                        self.pos = start;
                        Err(self.err("expected a number"))
                    }
                };
            }
        }

        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = std::str::from_utf8(&self.src[digits_start..self.pos]).unwrap_or("");
            let v = i64::from_str_radix(digits, 16)
                .map_err(|_| self.err(format!("invalid hex number '0x{digits}'")))?;
            return Ok(LuaValue::Int(if negative { -v } else { v }));
        }

        let digits_start = self.pos;
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {}
                b'.' => is_float = true,
                b'e' | b'E' => {
                    is_float = true;
                    if matches!(self.peek_at(1), Some(b'+') | Some(b'-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[digits_start..self.pos]).unwrap_or("");
        if text.is_empty() {
            self.pos = start;
            return Err(self.err("expected a number"));
        }

        // `0/0` is how NaN is written back out.
        if text == "0" && self.peek() == Some(b'/') && self.peek_at(1) == Some(b'0') {
            self.pos += 2;
            return Ok(LuaValue::Float(f64::NAN));
        }

        if !is_float {
            let signed = if negative {
                format!("-{text}")
            } else {
                text.to_string()
            };
            if let Ok(v) = signed.parse::<i64>() {
                return Ok(LuaValue::Int(v));
            }
        }
        let v: f64 = text
            .parse()
            .map_err(|_| self.err(format!("invalid number '{text}'")))?;
        Ok(LuaValue::Float(if negative { -v } else { v }))
    }

    fn quoted_string(&mut self) -> Result<String, LuaParseError> {
        let quote = self.bump().ok_or_else(|| self.err("expected string"))?;
        let mut buf = Vec::<u8>::new();
        loop {
            let b = self.bump().ok_or_else(|| self.err("unterminated string"))?;
            match b {
                b if b == quote => break,
                b'\n' => return Err(self.err("unterminated string")),
                b'\\' => {
                    let e = self.bump().ok_or_else(|| self.err("unterminated escape"))?;
                    match e {
                        b'n' => buf.push(b'\n'),
                        b't' => buf.push(b'\t'),
                        b'r' => buf.push(b'\r'),
                        b'a' => buf.push(0x07),
                        b'b' => buf.push(0x08),
                        b'f' => buf.push(0x0c),
                        b'v' => buf.push(0x0b),
                        b'\\' | b'"' | b'\'' => buf.push(e),
                        b'\n' => buf.push(b'\n'),
                        b'z' => {
                            while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
                                self.bump();
                            }
                        }
                        b'x' => {
                            let hex = [self.bump(), self.bump()];
                            let v = hex
                                .iter()
                                .map(|d| d.map(|d| d as char).and_then(|c| c.to_digit(16)))
                                .try_fold(0u32, |acc, d| d.map(|d| acc * 16 + d))
                                .ok_or_else(|| self.err("invalid \\x escape"))?;
                            buf.push(v as u8);
                        }
                        b'0'..=b'9' => {
                            let mut v = u32::from(e - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'9') => {
                                        v = v * 10 + u32::from(d - b'0');
                                        self.bump();
                                    }
                                    _ => break,
                                }
                            }
                            let byte =
                                u8::try_from(v).map_err(|_| self.err("decimal escape too large"))?;
                            buf.push(byte);
                        }
                        other => {
                            return Err(self.err(format!("invalid escape '\\{}'", other as char)));
                        }
                    }
                }
                b => buf.push(b),
            }
        }
        String::from_utf8(buf).map_err(|_| self.err("invalid utf-8 in string"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DCS_SETTINGS: &str = r#"cfg =
{
    ["description"] = "",
    ["require_pure_textures"] = true,
    ["listStartIndex"] = 3,
    ["advanced"] =
    {
        ["allow_change_tailno"] = true,
        ["event_Connect"] = true,
        ["bluePasswordHash"] = "",
    }, -- end of ["advanced"]
    ["port"] = "10308",
    ["mode"] = 0,
    ["listShuffle"] = false,
    ["password"] = "",
    ["name"] = "Retribution \"test\" server",
    ["missionList"] =
    {
        [1] = "C:\\Users\\pilot\\Saved Games\\DCS.release_server\\Missions\\old.miz",
        [2] = "C:\\Users\\pilot\\Saved Games\\DCS.release_server\\Missions\\other.miz",
    }, -- end of ["missionList"]
    ["maxPlayers"] = "16",
    ["lastSelectedMission"] = "C:\\old.miz",
    ["ratio"] = 0.75,
} -- end of cfg
"#;

    #[test]
    fn parses_dcs_server_settings() {
        let doc = LuaAssignment::parse(DCS_SETTINGS).unwrap();
        assert_eq!(doc.name, "cfg");
        assert_eq!(doc.table.get_str("listStartIndex"), Some(&LuaValue::Int(3)));
        assert_eq!(doc.table.get_str("listShuffle"), Some(&LuaValue::Bool(false)));
        assert_eq!(doc.table.get_str("ratio"), Some(&LuaValue::Float(0.75)));
        assert_eq!(
            doc.table.get_str("name"),
            Some(&LuaValue::Str("Retribution \"test\" server".to_string()))
        );

        let Some(LuaValue::Table(list)) = doc.table.get_str("missionList") else {
            panic!("missionList is not a table");
        };
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.get(&LuaKey::Int(1)),
            Some(&LuaValue::Str(
                r"C:\Users\pilot\Saved Games\DCS.release_server\Missions\old.miz".to_string()
            ))
        );
    }

    #[test]
    fn rewrite_preserves_order_and_reparses_equal() {
        let mut doc = LuaAssignment::parse(DCS_SETTINGS).unwrap();
        doc.table.set("listStartIndex", 1);
        doc.table.set(
            "missionList",
            LuaTable::from_list([LuaValue::from(r"D:\missions\next.miz")]),
        );

        let text = doc.to_lua("    ");
        assert!(text.starts_with("cfg = {\n    [\"description\"] = \"\",\n"));
        assert!(text.contains("    [\"missionList\"] = {\n        [1] = \"D:\\\\missions\\\\next.miz\",\n    },\n"));
        assert!(text.ends_with("}\n"));

        let again = LuaAssignment::parse(&text).unwrap();
        assert_eq!(again, doc);
        let keys: Vec<_> = again.table.entries().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys.first(), Some(&LuaKey::from("description")));
        assert_eq!(keys.last(), Some(&LuaKey::from("ratio")));
    }

    #[test]
    fn positional_and_named_fields() {
        let doc = LuaAssignment::parse("t = { 'a', \"b\"; c = 3, [10] = -4.5e1, nil }").unwrap();
        let t = &doc.table;
        assert_eq!(t.get(&LuaKey::Int(1)), Some(&LuaValue::from("a")));
        assert_eq!(t.get(&LuaKey::Int(2)), Some(&LuaValue::from("b")));
        assert_eq!(t.get_str("c"), Some(&LuaValue::Int(3)));
        assert_eq!(t.get(&LuaKey::Int(10)), Some(&LuaValue::Float(-45.0)));
        assert_eq!(t.get(&LuaKey::Int(3)), Some(&LuaValue::Nil));
    }

    #[test]
    fn escapes_round_trip() {
        let mut t = LuaTable::new();
        t.set("s", "tab\there \"q\" back\\slash\nnl \u{1} é");
        let doc = LuaAssignment {
            name: "cfg".to_string(),
            table: t,
        };
        let text = doc.to_lua("    ");
        assert!(text.contains(r#"\001"#));
        assert_eq!(LuaAssignment::parse(&text).unwrap(), doc);
    }

    #[test]
    fn long_strings_and_block_comments() {
        let doc = LuaAssignment::parse("--[[ header\n comment ]]\ncfg = { [\"k\"] = [==[\nraw ]] text]==] }").unwrap();
        assert_eq!(doc.table.get_str("k"), Some(&LuaValue::from("raw ]] text")));
    }

    #[test]
    fn empty_table_serializes_compactly() {
        let doc = LuaAssignment::parse("cfg = {}").unwrap();
        assert!(doc.table.is_empty());
        assert_eq!(doc.to_lua("    "), "cfg = {}\n");
    }

    #[test]
    fn reports_line_of_error() {
        let err = LuaAssignment::parse("cfg =\n{\n  [\"a\"] = 1\n  [\"b\"] = 2\n}").unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.message.contains("expected ','"));
    }

    #[test]
    fn rejects_non_table_assignment() {
        let err = LuaAssignment::parse("cfg = 5").unwrap_err();
        assert!(err.message.contains("expected a table"));
    }

    #[test]
    fn non_finite_and_extreme_numbers_survive_rewrite() {
        let mut t = LuaTable::new();
        t.set("inf", LuaValue::Float(f64::INFINITY));
        t.set("ninf", LuaValue::Float(f64::NEG_INFINITY));
        t.set("min", LuaValue::Int(i64::MIN));
        t.set("max", LuaValue::Int(i64::MAX));
        t.set("nan", LuaValue::Float(f64::NAN));
        let text = LuaAssignment {
            name: "cfg".to_string(),
            table: t,
        }
        .to_lua("\t");

        let back = LuaAssignment::parse(&text).unwrap().table;
        assert_eq!(back.get_str("inf"), Some(&LuaValue::Float(f64::INFINITY)));
        assert_eq!(back.get_str("ninf"), Some(&LuaValue::Float(f64::NEG_INFINITY)));
        assert_eq!(back.get_str("min"), Some(&LuaValue::Int(i64::MIN)));
        assert_eq!(back.get_str("max"), Some(&LuaValue::Int(i64::MAX)));
        assert!(matches!(back.get_str("nan"), Some(LuaValue::Float(f)) if f.is_nan()));
    }

    #[test]
    fn only_math_huge_is_accepted_from_math() {
        let doc = LuaAssignment::parse("cfg = { a = math.huge, b = - math.huge }").unwrap();
        assert_eq!(doc.table.get_str("a"), Some(&LuaValue::Float(f64::INFINITY)));
        assert_eq!(doc.table.get_str("b"), Some(&LuaValue::Float(f64::NEG_INFINITY)));

        let err = LuaAssignment::parse("cfg = { a = math.pi }").unwrap_err();
        assert!(err.message.contains("math.pi"));
        assert!(LuaAssignment::parse("cfg = { a = -os }").is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        let err = LuaAssignment::parse("cfg = {} x").unwrap_err();
        assert!(err.message.contains("trailing"));
    }
}
