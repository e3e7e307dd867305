//! Scalar and property scanning.
//!
//! Each scalar style has its own rules for where the scalar ends and how
//! line breaks fold into content:
//! - Quoted: blank runs fold to a space or to N-1 newlines; `"` adds escapes.
//! - Block (`|`, `>`): a header picks chomping and indentation, then the
//!   body is read line by line.
//! - Plain: greedy up to an indicator, continued onto following lines only
//!   when a speculative look at the next line says it belongs to the scalar.

use crate::error::Result;
use crate::lexer::{
    is_blank, is_break, is_flow_indicator, is_separator, Cursor, Lexer, ScalarStyle, Token,
    TokenKind,
};
use std::borrow::Cow;

/// Block scalar chomping indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chomping {
    Strip,
    Clip,
    Keep,
}

/// Append one quoted-scalar line to `out`, preceded by the folding for the
/// line breaks that led to it. Trailing blanks are trimmed unless this is
/// the closing line, never cutting into the first `keep` bytes.
fn flush_quoted_line(
    out: &mut Vec<u8>,
    line: &mut Vec<u8>,
    keep: usize,
    pending_breaks: usize,
    closing: bool,
) {
    if !closing {
        while line.len() > keep && line.last().copied().is_some_and(is_blank) {
            line.pop();
        }
    }
    match pending_breaks {
        0 => {}
        1 => out.push(b' '),
        n => out.extend(std::iter::repeat(b'\n').take(n - 1)),
    }
    out.append(line);
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

impl<'a> Lexer<'a> {
    // ========================================================================
    // Properties and Directives
    // ========================================================================

    pub(crate) fn scan_anchor_or_alias(&mut self, kind: TokenKind) -> Result<Token<'a>> {
        let start = self.cursor;
        self.advance();
        let name_start = self.cursor.offset;
        while !self.at_end() {
            let c = self.peek();
            if is_separator(c) || is_flow_indicator(c) {
                break;
            }
            self.advance();
        }
        let input: &'a str = self.input;
        let name = &input[name_start..self.cursor.offset];
        if name.is_empty() {
            let reason = if kind == TokenKind::Anchor {
                "Anchor name cannot be empty"
            } else {
                "Alias name cannot be empty"
            };
            return Err(self.error_at(reason, start.line, start.column));
        }
        Ok(Token::new(kind, name, start))
    }

    pub(crate) fn scan_tag(&mut self) -> Result<Token<'a>> {
        let start = self.cursor;
        self.advance();
        if self.peek() == b'<' {
            self.advance();
            while !self.at_end() && self.peek() != b'>' && !is_break(self.peek()) {
                self.advance();
            }
            if self.peek() != b'>' {
                return Err(self.error_at("Unterminated verbatim tag", start.line, start.column));
            }
            self.advance();
        } else {
            while !self.at_end() {
                let c = self.peek();
                if is_separator(c) || is_flow_indicator(c) {
                    break;
                }
                self.advance();
            }
        }
        if self.flow_level == 0 && self.peek() == b',' {
            return Err(self.error_here("Invalid character after tag in block context"));
        }
        let input: &'a str = self.input;
        Ok(Token::new(TokenKind::Tag, &input[start.offset..self.cursor.offset], start))
    }

    /// Directives run to the end of the line; the parser interprets the body.
    pub(crate) fn scan_directive(&mut self) -> Token<'a> {
        let start = self.cursor;
        while !self.at_end() && !is_break(self.peek()) {
            self.advance();
        }
        let input: &'a str = self.input;
        let text = input[start.offset..self.cursor.offset].trim_end();
        let kind = if text.starts_with("%YAML") {
            TokenKind::DirectiveYaml
        } else if text.starts_with("%TAG") {
            TokenKind::DirectiveTag
        } else {
            TokenKind::DirectiveReserved
        };
        Token::new(kind, text, start)
    }

    // ========================================================================
    // Quoted Scalars
    // ========================================================================

    pub(crate) fn scan_quoted_scalar(&mut self, style: ScalarStyle) -> Result<Token<'a>> {
        let start = self.cursor;
        let double = style == ScalarStyle::DoubleQuoted;
        let quote = if double { b'"' } else { b'\'' };
        self.advance();
        let content_start = self.cursor.offset;

        let mut out: Vec<u8> = Vec::new();
        let mut line: Vec<u8> = Vec::new();
        let mut keep = 0;
        let mut pending_breaks = 0;
        let mut first_line = true;
        let mut altered = false;
        let mut closed = false;

        while !self.at_end() {
            let c = self.peek();
            if c == quote {
                if !double && self.peek_at(1) == b'\'' {
                    line.push(b'\'');
                    keep = line.len();
                    altered = true;
                    self.advance_by(2);
                    continue;
                }
                closed = true;
                break;
            }
            if double && c == b'\\' {
                self.scan_escape(&mut line)?;
                keep = line.len();
                altered = true;
                continue;
            }
            if is_break(c) {
                flush_quoted_line(&mut out, &mut line, keep, pending_breaks, false);
                keep = 0;
                first_line = false;
                altered = true;
                self.skip_break();
                pending_breaks = 1;
                loop {
                    while is_blank(self.peek()) {
                        self.advance();
                    }
                    if !is_break(self.peek()) {
                        break;
                    }
                    self.skip_break();
                    pending_breaks += 1;
                }
                self.validate_flow_scalar_continuation()?;
                continue;
            }
            line.push(c);
            self.advance();
        }

        if !closed {
            let reason = if double {
                "Missing closing quote in double-quoted scalar"
            } else {
                "Missing closing quote in single-quoted scalar"
            };
            return Err(self.error_at(reason, start.line, start.column));
        }

        let content_end = self.cursor.offset;
        self.advance();

        let text = if altered {
            flush_quoted_line(&mut out, &mut line, keep, pending_breaks, true);
            let text = String::from_utf8(out)
                .map_err(|_| self.error_at("Invalid UTF-8 in quoted scalar", start.line, start.column))?;
            Cow::Owned(text)
        } else {
            let input: &'a str = self.input;
            Cow::Borrowed(&input[content_start..content_end])
        };

        self.validate_trailing_content()?;
        self.last_was_quoted = true;
        Ok(Token::scalar(text, style, !first_line, start))
    }

    /// A quoted scalar's continuation line may not be a document marker and,
    /// inside a block collection, must be indented past it.
    fn validate_flow_scalar_continuation(&self) -> Result<()> {
        if self.cursor.column == 1 && self.at_document_marker() {
            return Err(self.error_here("Document marker inside flow scalar"));
        }
        if self.flow_level == 0 && !self.at_end() {
            if let Some(indent) = self.block_indent {
                if (self.cursor.column - 1) as usize <= indent {
                    return Err(self.error_here("Insufficient indentation in flow scalar"));
                }
            }
        }
        Ok(())
    }

    /// Decode one backslash escape into `out`.
    fn scan_escape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let start = self.cursor;
        self.advance();
        let invalid = |lexer: &Self| {
            lexer.error_at(
                "Invalid escape sequence in double-quoted scalar",
                start.line,
                start.column,
            )
        };
        if self.at_end() {
            return Err(invalid(self));
        }
        let simple = match self.peek() {
            b'0' => Some('\0'),
            b'a' => Some('\u{07}'),
            b'b' => Some('\u{08}'),
            b't' | b'\t' => Some('\t'),
            b'n' => Some('\n'),
            b'v' => Some('\u{0b}'),
            b'f' => Some('\u{0c}'),
            b'r' => Some('\r'),
            b'e' => Some('\u{1b}'),
            b' ' => Some(' '),
            b'"' => Some('"'),
            b'/' => Some('/'),
            b'\\' => Some('\\'),
            b'N' => Some('\u{85}'),
            b'_' => Some('\u{a0}'),
            b'L' => Some('\u{2028}'),
            b'P' => Some('\u{2029}'),
            _ => None,
        };
        if let Some(c) = simple {
            push_char(out, c);
            self.advance();
            return Ok(());
        }
        let digits = match self.peek() {
            b'x' => 2,
            b'u' => 4,
            b'U' => 8,
            b'\n' | b'\r' => {
                self.skip_break();
                while is_blank(self.peek()) {
                    self.advance();
                }
                return Ok(());
            }
            _ => return Err(invalid(self)),
        };
        self.advance();
        let hex_start = self.cursor.offset;
        for _ in 0..digits {
            if !self.peek().is_ascii_hexdigit() {
                return Err(invalid(self));
            }
            self.advance();
        }
        let hex = &self.input[hex_start..self.cursor.offset];
        let c = u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| {
                self.error_at(
                    "Invalid Unicode code point in escape sequence",
                    start.line,
                    start.column,
                )
            })?;
        push_char(out, c);
        Ok(())
    }

    // ========================================================================
    // Block Scalars
    // ========================================================================

    pub(crate) fn scan_block_scalar(&mut self, style: ScalarStyle) -> Result<Token<'a>> {
        let start = self.cursor;
        self.advance();

        let mut chomping = Chomping::Clip;
        let mut explicit_indent = None;
        let mut seen_blank = false;
        while !self.at_end() && !is_break(self.peek()) {
            match self.peek() {
                b'-' => chomping = Chomping::Strip,
                b'+' => chomping = Chomping::Keep,
                c @ b'1'..=b'9' => explicit_indent = Some((c - b'0') as usize),
                b' ' | b'\t' => seen_blank = true,
                b'#' if seen_blank => {
                    while !self.at_end() && !is_break(self.peek()) {
                        self.advance();
                    }
                    break;
                }
                _ => return Err(self.error_here("Invalid content in block scalar header")),
            }
            self.advance();
        }
        self.skip_break();

        let content_indent = match explicit_indent {
            Some(digit) => self.parent_indentation(start.offset) + digit,
            None => self.detect_content_indent(start)?,
        };

        let text = if style == ScalarStyle::Literal {
            self.scan_literal_body(content_indent, chomping)
        } else {
            self.scan_folded_body(content_indent, chomping)
        };
        Ok(Token::scalar(Cow::Owned(text), style, false, start))
    }

    /// Indentation of the node that owns a block scalar whose indicator sits
    /// at `indicator`, found by looking back over the indicator's line.
    fn parent_indentation(&self, indicator: usize) -> usize {
        let line_start = self.input[..indicator].rfind('\n').map_or(0, |at| at + 1);
        let line = &self.bytes[line_start..indicator];
        let spaces = line.iter().take_while(|&&b| b == b' ').count();
        let has_colon = line.contains(&b':');
        if has_colon && line[spaces..].starts_with(b"- ") {
            spaces + 2
        } else if has_colon {
            spaces
        } else {
            0
        }
    }

    /// Peek ahead to the first non-blank line to find the content
    /// indentation. The cursor is left where it was.
    fn detect_content_indent(&mut self, start: Cursor) -> Result<usize> {
        let saved = self.cursor;
        let mut max_blank_indent = 0;
        let mut content_indent = 0;
        while !self.at_end() {
            let mut indent = 0;
            while self.peek() == b' ' {
                indent += 1;
                self.advance();
            }
            if is_break(self.peek()) {
                max_blank_indent = max_blank_indent.max(indent);
                self.skip_break();
                continue;
            }
            if !self.at_end() {
                content_indent = indent;
            }
            break;
        }
        self.cursor = saved;

        if max_blank_indent > content_indent && content_indent > 0 {
            return Err(self.error_at(
                "Leading empty line has more spaces than content indentation",
                start.line,
                start.column,
            ));
        }
        match self.block_indent {
            Some(parent) if self.flow_level == 0 && content_indent <= parent => Ok(parent + 1),
            None if content_indent == 0 && start.column > 5 => Ok(1),
            _ => Ok(content_indent),
        }
    }

    /// Count leading spaces on the current line.
    fn count_indent(&mut self) -> usize {
        let mut indent = 0;
        while self.peek() == b' ' {
            indent += 1;
            self.advance();
        }
        indent
    }

    /// Copy the rest of the current line, stopping before the line break.
    fn rest_of_line(&mut self) -> &'a str {
        let begin = self.cursor.offset;
        while !self.at_end() && !is_break(self.peek()) {
            self.advance();
        }
        let input: &'a str = self.input;
        &input[begin..self.cursor.offset]
    }

    fn scan_literal_body(&mut self, content_indent: usize, chomping: Chomping) -> String {
        let mut out = String::new();
        let mut trailing = String::new();
        while !self.at_end() {
            let indent = self.count_indent();
            if self.at_end() {
                break;
            }
            if is_break(self.peek()) {
                if indent > content_indent {
                    out.push_str(&trailing);
                    trailing.clear();
                    out.push_str(&" ".repeat(indent - content_indent));
                }
                trailing.push('\n');
                self.skip_break();
                continue;
            }
            if indent < content_indent {
                self.rewind_spaces(indent);
                break;
            }
            if indent == 0 && self.at_document_marker() {
                break;
            }
            out.push_str(&trailing);
            trailing.clear();
            out.push_str(&" ".repeat(indent - content_indent));
            out.push_str(self.rest_of_line());
            if is_break(self.peek()) {
                trailing.push('\n');
                self.skip_break();
            }
        }
        match chomping {
            Chomping::Keep => out.push_str(&trailing),
            Chomping::Clip if !out.is_empty() && !trailing.is_empty() => out.push('\n'),
            _ => {}
        }
        out
    }

    fn scan_folded_body(&mut self, content_indent: usize, chomping: Chomping) -> String {
        let mut out = String::new();
        let mut blank_lines = 0;
        let mut previous_more_indented = false;
        let mut previous_starts_blank = false;
        let mut had_line_break = false;
        while !self.at_end() {
            let indent = self.count_indent();
            if self.at_end() {
                break;
            }
            if is_break(self.peek()) {
                blank_lines += 1;
                self.skip_break();
                continue;
            }
            if indent < content_indent {
                self.rewind_spaces(indent);
                break;
            }
            if indent == 0 && self.at_document_marker() {
                break;
            }

            let more_indented = indent > content_indent;
            let starts_blank = is_blank(self.peek());
            if had_line_break {
                let preserve = previous_more_indented
                    || previous_starts_blank
                    || more_indented
                    || starts_blank;
                if blank_lines == 0 && !preserve {
                    out.push(' ');
                } else {
                    if preserve {
                        out.push('\n');
                    }
                    out.push_str(&"\n".repeat(blank_lines));
                }
            } else if blank_lines > 0 {
                out.push_str(&"\n".repeat(blank_lines));
            }
            blank_lines = 0;

            out.push_str(&" ".repeat(indent - content_indent));
            out.push_str(self.rest_of_line());
            previous_more_indented = more_indented;
            previous_starts_blank = starts_blank;
            had_line_break = false;
            if is_break(self.peek()) {
                self.skip_break();
                had_line_break = true;
            }
        }
        match chomping {
            Chomping::Keep => {
                if had_line_break {
                    out.push('\n');
                }
                out.push_str(&"\n".repeat(blank_lines));
            }
            Chomping::Clip if !out.is_empty() && (had_line_break || blank_lines > 0) => {
                out.push('\n');
            }
            _ => {}
        }
        out
    }

    // ========================================================================
    // Plain Scalars
    // ========================================================================

    pub(crate) fn scan_plain_scalar(&mut self) -> Result<Token<'a>> {
        let start = self.cursor;
        let in_flow = self.flow_level > 0;
        if in_flow {
            let c = self.peek();
            let next = self.peek_at(1);
            if matches!(c, b'-' | b'?' | b':') && (is_separator(next) || is_flow_indicator(next)) {
                return Err(self.error_here("Invalid plain scalar start in flow context"));
            }
        }

        let min_indent = if in_flow {
            0
        } else {
            self.block_indent.map_or(0, |indent| indent + 1)
        };
        let input: &'a str = self.input;
        let mut folded: Option<String> = None;
        let mut pending = String::new();
        let mut first_end = start.offset;

        loop {
            let line_start = self.cursor.offset;
            let mut segment_end = line_start;
            while !self.at_end() {
                let c = self.peek();
                if c == b':' {
                    let next = self.peek_at(1);
                    if is_separator(next) || (in_flow && is_flow_indicator(next)) {
                        break;
                    }
                }
                if c == b'#' && self.cursor.offset > line_start && is_blank(self.bytes[self.cursor.offset - 1]) {
                    break;
                }
                if is_break(c) || (in_flow && is_flow_indicator(c)) {
                    break;
                }
                self.advance();
                if !is_blank(c) {
                    segment_end = self.cursor.offset;
                }
            }

            if segment_end > line_start {
                match folded.as_mut() {
                    Some(buffer) => {
                        buffer.push_str(&pending);
                        buffer.push_str(&input[line_start..segment_end]);
                    }
                    None => first_end = segment_end,
                }
            }
            if first_end == start.offset {
                return Err(self.error_at("Unexpected character", start.line, start.column));
            }

            if self.at_end() || !is_break(self.peek()) {
                break;
            }
            let Some(breaks) = self.plain_continuation(start, min_indent, in_flow) else {
                break;
            };
            if folded.is_none() {
                folded = Some(input[start.offset..first_end].to_string());
            }
            pending = if breaks == 1 {
                " ".to_string()
            } else {
                "\n".repeat(breaks - 1)
            };
        }

        Ok(match folded {
            Some(text) => Token::scalar(Cow::Owned(text), ScalarStyle::Plain, true, start),
            None => Token::scalar(
                Cow::Borrowed(&input[start.offset..first_end]),
                ScalarStyle::Plain,
                false,
                start,
            ),
        })
    }

    /// Look past the line break(s) at the cursor. If the next line continues
    /// the plain scalar that began at `start`, leave the cursor at its first
    /// character and return the number of line breaks crossed; otherwise
    /// restore the cursor and return `None`.
    fn plain_continuation(&mut self, start: Cursor, min_indent: usize, in_flow: bool) -> Option<usize> {
        let saved = self.cursor;
        let mut breaks = 0;
        let mut indent = 0;
        while !self.at_end() {
            match self.peek() {
                b'\n' | b'\r' => {
                    self.skip_break();
                    breaks += 1;
                    indent = 0;
                }
                b' ' | b'\t' => {
                    indent += 1;
                    self.advance();
                }
                _ => break,
            }
        }

        if self.continues_plain_scalar(start, indent, min_indent, in_flow) {
            Some(breaks)
        } else {
            self.cursor = saved;
            None
        }
    }

    fn continues_plain_scalar(&self, start: Cursor, indent: usize, min_indent: usize, in_flow: bool) -> bool {
        if self.at_end() || indent < min_indent {
            return false;
        }
        let c = self.peek();
        let next = self.peek_at(1);
        if in_flow && is_flow_indicator(c) {
            return false;
        }
        if matches!(c, b'-' | b'?' | b':') && is_separator(next) {
            let sibling = start
                .column
                .checked_sub(3)
                .map_or(true, |limit| indent as u64 <= limit);
            if indent == 0 || sibling {
                return false;
            }
        }
        if in_flow && c == b':' && is_flow_indicator(next) {
            return false;
        }
        if !in_flow && self.line_contains_mapping_key() {
            return false;
        }
        if indent == 0 && self.at_document_marker() {
            return false;
        }
        c != b'#'
    }

    /// The rest of the current line holds a `: ` value indicator.
    fn line_contains_mapping_key(&self) -> bool {
        let rest = &self.bytes[self.cursor.offset..];
        let line = rest.iter().position(|&b| is_break(b)).map_or(rest, |end| &rest[..end]);
        line.iter().enumerate().any(|(i, &b)| {
            b == b':' && is_separator(line.get(i + 1).copied().unwrap_or(0))
        })
    }
}
