// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::cmp;
use core::fmt::{self, Debug, Formatter};
use core::iter::Peekable;
use core::str::CharIndices;
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};

#[derive(Clone)]
struct SourceInternal {
    pub file: String,
    pub contents: String,
    pub lines: Vec<(u32, u32)>,
}

/// Text of a single expression together with a name used in diagnostics.
#[derive(Clone)]
pub struct Source {
    src: Rc<SourceInternal>,
}

impl cmp::PartialEq for Source {
    fn eq(&self, other: &Source) -> bool {
        Rc::as_ptr(&self.src) == Rc::as_ptr(&other.src)
    }
}

impl cmp::Eq for Source {}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        self.src.file.fmt(f)
    }
}

impl Source {
    pub fn from_contents(file: String, contents: String) -> Result<Source> {
        // Rows and columns start at 1 and Eof takes one more position.
        let max_size = u32::MAX as usize - 2;
        if contents.len() > max_size {
            bail!("{file} exceeds maximum allowed expression size {max_size}");
        }
        let mut lines = vec![];
        let mut prev_ch = ' ';
        let mut prev_pos = 0u32;
        let mut start = 0u32;
        for (i, ch) in contents.char_indices() {
            if ch == '\n' {
                let end = match prev_ch {
                    '\r' => prev_pos,
                    _ => i as u32,
                };
                lines.push((start, end));
                start = i as u32 + 1;
            }
            prev_ch = ch;
            prev_pos = i as u32;
        }

        if (start as usize) < contents.len() {
            lines.push((start, contents.len() as u32));
        } else if contents.is_empty() {
            lines.push((0, 0));
        } else {
            let s = (contents.len() - 1) as u32;
            lines.push((s, s));
        }
        Ok(Self {
            src: Rc::new(SourceInternal {
                file,
                contents,
                lines,
            }),
        })
    }

    pub fn file(&self) -> &String {
        &self.src.file
    }

    pub fn contents(&self) -> &String {
        &self.src.contents
    }

    pub fn line(&self, idx: u32) -> &str {
        let idx = idx as usize;
        if idx < self.src.lines.len() {
            let (start, end) = self.src.lines[idx];
            &self.src.contents[start as usize..end as usize]
        } else {
            ""
        }
    }

    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        if line as usize > self.src.lines.len() || line == 0 {
            return format!("{}: invalid line {} specified", self.src.file, line);
        }

        let line_str = format!("{line}");
        let line_num_width = line_str.len() + 1;
        let col_spaces = (col as usize).saturating_sub(1);

        format!(
            "\n--> {}:{}:{}\n{:<line_num_width$}|\n\
		{:<line_num_width$}| {}\n\
		{:<line_num_width$}| {:<col_spaces$}^\n\
		{}: {}",
            self.src.file,
            line,
            col,
            "",
            line,
            self.line(line - 1),
            "",
            "",
            kind,
            msg
        )
    }

    pub fn error(&self, line: u32, col: u32, msg: &str) -> anyhow::Error {
        anyhow!(self.message(line, col, "error", msg))
    }
}

#[derive(Clone)]
pub struct Span {
    pub source: Source,
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.line, self.col, kind, msg)
    }

    pub fn error(&self, msg: &str) -> anyhow::Error {
        self.source.error(self.line, self.col, msg)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let t = self.text().escape_debug().to_string();
        let max = 32;
        let (txt, trailer) = match t.char_indices().nth(max) {
            Some((cut, _)) => (&t[..cut], "..."),
            None => (t.as_str(), ""),
        };

        f.write_fmt(format_args!(
            "{}:{}:{}:{}, \"{}{}\"",
            self.line, self.col, self.start, self.end, txt, trailer
        ))
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenKind {
    Symbol,
    /// Single quoted string. The span excludes the quotes.
    String,
    /// Backtick delimited identifier. The span excludes the backticks.
    DelimitedIdent,
    Number,
    /// Date, DateTime or Time literal. The span excludes the leading `@`.
    DateTime,
    Ident,
    /// `$this`, `$index` or `$total`.
    Variable,
    /// `%name`, `` %`name` `` or `%'name'`. The span covers the name only.
    Constant,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token(pub TokenKind, pub Span);

#[derive(Clone)]
pub struct Lexer<'source> {
    source: Source,
    iter: Peekable<CharIndices<'source>>,
    line: u32,
    col: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source: source.clone(),
            iter: source.contents().char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some((index, chr)) => (*index, *chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn peekahead(&mut self, n: usize) -> (usize, char) {
        match self.iter.clone().nth(n) {
            Some((index, chr)) => (index, chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn span(&self, line: u32, col: u32, start: usize, end: usize) -> Span {
        Span {
            source: self.source.clone(),
            line,
            col,
            start: start as u32,
            end: end as u32,
        }
    }

    fn read_ident(&mut self) -> Result<Token> {
        let start = self.peek().0;
        let col = self.col;
        loop {
            let ch = self.peek().1;
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.iter.next();
            } else {
                break;
            }
        }
        let end = self.peek().0;
        self.col += (end - start) as u32;
        Ok(Token(TokenKind::Ident, self.span(self.line, col, start, end)))
    }

    fn read_digits(&mut self) {
        while self.peek().1.is_ascii_digit() {
            self.iter.next();
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let (start, _) = self.peek();
        let col = self.col;
        self.read_digits();

        // Fraction. `.` must be followed by at least one digit, otherwise it
        // is an invocation on the number.
        if self.peek().1 == '.' && self.peekahead(1).1.is_ascii_digit() {
            self.iter.next();
            self.read_digits();
        } else if self.peek().1 == 'L' && !is_ident_char(self.peekahead(1).1) {
            // Long number.
            self.iter.next();
        }

        let end = self.peek().0;
        self.col += (end - start) as u32;

        let ch = self.peek().1;
        if ch == '_' || ch.is_ascii_alphanumeric() {
            return Err(self.source.error(self.line, self.col, "invalid number"));
        }

        Ok(Token(TokenKind::Number, self.span(self.line, col, start, end)))
    }

    fn read_datetime(&mut self) -> Result<Token> {
        let (line, col) = (self.line, self.col);
        // Skip @
        self.iter.next();
        self.col += 1;
        let start = self.peek().0;
        loop {
            let ch = self.peek().1;
            if ch.is_ascii_digit() || matches!(ch, '-' | ':' | 'T' | '.' | '+' | 'Z') {
                self.iter.next();
            } else {
                break;
            }
        }
        let end = self.peek().0;
        if !is_temporal(&self.source.contents()[start..end]) {
            return Err(self.source.error(line, col, "invalid date/time literal"));
        }
        self.col += (end - start) as u32;
        Ok(Token(TokenKind::DateTime, self.span(line, col + 1, start, end)))
    }

    // Reads text enclosed in `delim`. Escapes are validated here and decoded
    // by `unescape`.
    fn read_delimited(&mut self, delim: char, kind: TokenKind) -> Result<Token> {
        let (line, col) = (self.line, self.col);
        self.iter.next();
        self.col += 1;
        let (start, _) = self.peek();
        loop {
            let (pos, ch) = self.peek();
            if pos >= self.source.contents().len() {
                return Err(self.source.error(line, col, &format!("unmatched {delim}")));
            }
            match ch {
                c if c == delim => break,
                '\\' => {
                    self.iter.next();
                    self.col += 1;
                    let (_, esc) = self.peek();
                    match esc {
                        '\'' | '"' | '`' | '\\' | '/' | 'f' | 'n' | 'r' | 't' => {
                            self.iter.next();
                            self.col += 1;
                        }
                        'u' => {
                            self.iter.next();
                            self.col += 1;
                            for _i in 0..4 {
                                let (_, ch) = self.peek();
                                if !ch.is_ascii_hexdigit() {
                                    return Err(self.source.error(
                                        self.line,
                                        self.col,
                                        "invalid hex escape sequence",
                                    ));
                                }
                                self.iter.next();
                                self.col += 1;
                            }
                        }
                        _ => {
                            return Err(self.source.error(
                                self.line,
                                self.col,
                                "invalid escape sequence",
                            ))
                        }
                    }
                }
                '\n' => {
                    self.iter.next();
                    self.line += 1;
                    self.col = 1;
                }
                '\t' => {
                    self.iter.next();
                    self.col += 4;
                }
                _ => {
                    self.iter.next();
                    self.col += 1;
                }
            }
        }
        let end = self.peek().0;
        // Closing delimiter.
        self.iter.next();
        self.col += 1;
        Ok(Token(kind, self.span(line, col + 1, start, end)))
    }

    fn read_variable(&mut self) -> Result<Token> {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        self.iter.next();
        self.col += 1;
        let ident = self.read_ident()?;
        match ident.1.text() {
            "this" | "index" | "total" => Ok(Token(
                TokenKind::Variable,
                self.span(line, col, start, ident.1.end as usize),
            )),
            "" => Err(self.source.error(line, col, "expecting variable name after $")),
            v => Err(self
                .source
                .error(line, col, &format!("unknown variable `${v}`"))),
        }
    }

    fn read_constant(&mut self) -> Result<Token> {
        let (line, col) = (self.line, self.col);
        self.iter.next();
        self.col += 1;
        let tok = match self.peek().1 {
            '`' => self.read_delimited('`', TokenKind::Constant)?,
            '\'' => self.read_delimited('\'', TokenKind::Constant)?,
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                let ident = self.read_ident()?;
                Token(TokenKind::Constant, ident.1)
            }
            _ => {
                return Err(self
                    .source
                    .error(line, col, "expecting constant name after %"))
            }
        };
        Ok(tok)
    }

    fn skip_ws(&mut self) -> Result<()> {
        'outer: loop {
            match self.peek().1 {
                ' ' => self.col += 1,
                '\t' => self.col += 4,
                '\r' => (),
                '\n' => {
                    self.col = 1;
                    self.line += 1;
                }
                '/' if self.peekahead(1).1 == '/' => {
                    loop {
                        match self.peek() {
                            (_, '\n') => continue 'outer,
                            (pos, '\x00') if pos >= self.source.contents().len() => {
                                continue 'outer
                            }
                            _ => {
                                self.iter.next();
                            }
                        }
                    }
                }
                '/' if self.peekahead(1).1 == '*' => {
                    let (line, col) = (self.line, self.col);
                    self.iter.next();
                    self.iter.next();
                    self.col += 2;
                    loop {
                        match self.peek() {
                            (_, '*') if self.peekahead(1).1 == '/' => {
                                self.iter.next();
                                self.col += 2;
                                break;
                            }
                            (_, '\n') => {
                                self.line += 1;
                                self.col = 1;
                            }
                            (pos, '\x00') if pos >= self.source.contents().len() => {
                                return Err(self.source.error(line, col, "unterminated comment"));
                            }
                            _ => self.col += 1,
                        }
                        self.iter.next();
                    }
                }
                _ => break,
            }
            self.iter.next();
        }
        Ok(())
    }

    fn symbol(&mut self, len: usize) -> Result<Token> {
        let (start, _) = self.peek();
        let col = self.col;
        for _ in 0..len {
            self.iter.next();
        }
        self.col += len as u32;
        let end = self.peek().0;
        Ok(Token(TokenKind::Symbol, self.span(self.line, col, start, end)))
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_ws()?;

        let (start, chr) = self.peek();
        let col = self.col;

        match chr {
            '\x00' if start >= self.source.contents().len() => Ok(Token(
                TokenKind::Eof,
                self.span(self.line, col, start, start),
            )),
            // grouping characters
            '{' | '}' | '[' | ']' | '(' | ')' |
            // arith operators
            '+' | '-' | '*' | '/' | '&' |
            // union, equality, equivalence
            '|' | '=' | '~' |
            // separators
            ',' | '.' => self.symbol(1),
            '!' if matches!(self.peekahead(1).1, '=' | '~') => self.symbol(2),
            '<' | '>' if self.peekahead(1).1 == '=' => self.symbol(2),
            '<' | '>' => self.symbol(1),
            '\'' => self.read_delimited('\'', TokenKind::String),
            '`' => self.read_delimited('`', TokenKind::DelimitedIdent),
            '@' => self.read_datetime(),
            '$' => self.read_variable(),
            '%' => self.read_constant(),
            _ if chr.is_ascii_digit() => self.read_number(),
            _ if chr.is_ascii_alphabetic() || chr == '_' => self.read_ident(),
            _ => Err(self.source.error(self.line, self.col, "invalid character")),
        }
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

// Consumes exactly `n` digits and returns their value if it lies in `range`.
fn take_number(text: &mut &str, n: usize, range: std::ops::RangeInclusive<u32>) -> bool {
    if text.len() < n || !text.as_bytes()[..n].iter().all(u8::is_ascii_digit) {
        return false;
    }
    let (digits, rest) = text.split_at(n);
    *text = rest;
    digits.parse().is_ok_and(|v| range.contains(&v))
}

// Consumes `sep` followed by a two digit number in `range`. Returns None when
// `sep` is absent and Some(false) when what follows it is malformed.
fn take_part(text: &mut &str, sep: char, range: std::ops::RangeInclusive<u32>) -> Option<bool> {
    let rest = text.strip_prefix(sep)?;
    *text = rest;
    Some(take_number(text, 2, range))
}

// hh(:mm(:ss(.fff)?)?)?
fn take_time(text: &mut &str) -> bool {
    if !take_number(text, 2, 0..=23) {
        return false;
    }
    match take_part(text, ':', 0..=59) {
        None => return true,
        Some(false) => return false,
        Some(true) => (),
    }
    match take_part(text, ':', 0..=59) {
        None => return true,
        Some(false) => return false,
        Some(true) => (),
    }
    if let Some(rest) = text.strip_prefix('.') {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return false;
        }
        *text = &rest[digits..];
    }
    true
}

/// Checks the body of a `@` literal: `YYYY(-MM(-DD)?)?`, optionally followed
/// by `T` and a time with an optional zone (`Z` or `+hh:mm`), or `T` and a
/// time alone. A date followed by a bare `T` is a partial DateTime.
fn is_temporal(mut text: &str) -> bool {
    if let Some(mut time) = text.strip_prefix('T') {
        return take_time(&mut time) && time.is_empty();
    }

    if !take_number(&mut text, 4, 0..=9999) {
        return false;
    }
    if take_part(&mut text, '-', 1..=12) == Some(false) {
        return false;
    }
    if text.starts_with('-') && take_part(&mut text, '-', 1..=31) != Some(true) {
        return false;
    }
    let Some(mut time) = text.strip_prefix('T') else {
        return text.is_empty();
    };
    if time.is_empty() {
        return true;
    }
    if !take_time(&mut time) {
        return false;
    }
    match time.chars().next() {
        None => true,
        Some('Z') => time.len() == 1,
        Some('+' | '-') => {
            let mut zone = &time[1..];
            take_number(&mut zone, 2, 0..=14)
                && take_part(&mut zone, ':', 0..=59) == Some(true)
                && zone.is_empty()
        }
        _ => false,
    }
}

/// Decodes the escape sequences of a string or delimited identifier body.
pub fn unescape(span: &Span) -> Result<String> {
    let text = span.text();
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('f') => out.push('\x0c'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| span.error("invalid hex escape sequence"))?;
                match char::from_u32(code) {
                    Some(c) => out.push(c),
                    None => bail!(span.error("invalid unicode escape")),
                }
            }
            Some(c) => out.push(c),
            None => bail!(span.error("dangling escape")),
        }
    }
    Ok(out)
}
