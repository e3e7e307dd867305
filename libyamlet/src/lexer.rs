//! Phase 1: Lexer
//!
//! The lexer is pull based: every call to [`Lexer::next_token`] skips
//! whitespace and comments, then produces exactly one token. It knows about
//! flow nesting on its own, but block indentation is owned by the parser,
//! which communicates it through [`Lexer::set_block_indent`] so that scalar
//! scanning can decide where a multi-line scalar ends.
//!
//! The scalar scanning routines live in `scanner.rs`.

use crate::error::{ParseContext, ParseError, Result};
use std::borrow::Cow;

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    StreamStart,
    StreamEnd,
    /// `---`
    DocumentStart,
    /// `...`
    DocumentEnd,
    /// `{`
    MappingStart,
    /// `}`
    MappingEnd,
    /// `[`
    SequenceStart,
    /// `]`
    SequenceEnd,
    /// `-` in block context.
    BlockSequenceEntry,
    /// `?`
    BlockMappingKey,
    /// `:`
    BlockMappingValue,
    /// `,`
    FlowEntry,
    Scalar,
    /// `&name`; the text excludes the sigil.
    Anchor,
    /// `*name`; the text excludes the sigil.
    Alias,
    /// `!tag`; the text includes the leading `!`.
    Tag,
    DirectiveYaml,
    DirectiveTag,
    DirectiveReserved,
}

impl TokenKind {
    pub fn is_directive(self) -> bool {
        matches!(
            self,
            TokenKind::DirectiveYaml | TokenKind::DirectiveTag | TokenKind::DirectiveReserved
        )
    }

    /// Tokens that close the current document.
    pub fn ends_document(self) -> bool {
        matches!(
            self,
            TokenKind::StreamEnd | TokenKind::DocumentStart | TokenKind::DocumentEnd
        )
    }
}

/// How a scalar was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// `|`
    Literal,
    /// `>`
    Folded,
}

impl ScalarStyle {
    pub fn is_quoted(self) -> bool {
        matches!(self, ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted)
    }

    pub fn is_block(self) -> bool {
        matches!(self, ScalarStyle::Literal | ScalarStyle::Folded)
    }
}

/// A single token.
///
/// `text` borrows from the source unless escaping or line folding changed
/// the scalar's content.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: Cow<'a, str>,
    pub line: u64,
    pub column: u64,
    pub offset: usize,
    pub style: ScalarStyle,
    /// The scalar was assembled from more than one source line.
    pub multiline: bool,
}

impl<'a> Token<'a> {
    pub(crate) fn new(kind: TokenKind, text: impl Into<Cow<'a, str>>, at: Cursor) -> Self {
        Self {
            kind,
            text: text.into(),
            line: at.line,
            column: at.column,
            offset: at.offset,
            style: ScalarStyle::Plain,
            multiline: false,
        }
    }

    pub(crate) fn scalar(
        text: Cow<'a, str>,
        style: ScalarStyle,
        multiline: bool,
        at: Cursor,
    ) -> Self {
        Self {
            style,
            multiline,
            ..Self::new(TokenKind::Scalar, text, at)
        }
    }

    /// Width of the token text in columns.
    pub(crate) fn width(&self) -> u64 {
        self.text.chars().count() as u64
    }
}

/// Position in the source. Saved and restored around speculative scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub offset: usize,
    pub line: u64,
    pub column: u64,
}

impl Cursor {
    fn start() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

pub(crate) fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

pub(crate) fn is_break(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

/// Whitespace, line break, or end of input (read as NUL).
pub(crate) fn is_separator(b: u8) -> bool {
    b == 0 || is_blank(b) || is_break(b)
}

pub(crate) fn is_flow_indicator(b: u8) -> bool {
    matches!(b, b',' | b'[' | b']' | b'{' | b'}')
}

/// Pull-based YAML tokenizer.
pub struct Lexer<'a> {
    pub(crate) input: &'a str,
    pub(crate) bytes: &'a [u8],
    pub(crate) cursor: Cursor,
    pub(crate) flow_level: usize,
    pub(crate) block_indent: Option<usize>,
    pub(crate) last_was_quoted: bool,
    pub(crate) ctx: ParseContext,
    stream_started: bool,
    stream_ended: bool,
    tab_at_line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_context(input, ParseContext::default())
    }

    pub fn with_context(input: &'a str, ctx: ParseContext) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            cursor: Cursor::start(),
            flow_level: 0,
            block_indent: None,
            last_was_quoted: false,
            ctx,
            stream_started: false,
            stream_ended: false,
            tab_at_line_start: false,
        }
    }

    pub fn context(&self) -> &ParseContext {
        &self.ctx
    }

    /// Byte offset of the cursor.
    pub fn position(&self) -> usize {
        self.cursor.offset
    }

    /// Current line. At end of input after a partial line this reports the
    /// line that would follow.
    pub fn line(&self) -> u64 {
        if self.at_end() && self.cursor.column > 1 {
            self.cursor.line + 1
        } else {
            self.cursor.line
        }
    }

    /// Current column, or 0 at end of input.
    pub fn column(&self) -> u64 {
        if self.at_end() {
            0
        } else {
            self.cursor.column
        }
    }

    pub fn flow_level(&self) -> usize {
        self.flow_level
    }

    /// Indentation (0-based column) of the innermost block collection, if any.
    pub fn block_indent(&self) -> Option<usize> {
        self.block_indent
    }

    pub fn set_block_indent(&mut self, indent: Option<usize>) {
        self.block_indent = indent;
    }

    pub fn stream_ended(&self) -> bool {
        self.stream_ended
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    pub(crate) fn at_end(&self) -> bool {
        self.cursor.offset >= self.bytes.len()
    }

    pub(crate) fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    pub(crate) fn peek_at(&self, ahead: usize) -> u8 {
        self.bytes.get(self.cursor.offset + ahead).copied().unwrap_or(0)
    }

    /// Step over one byte, keeping line and column in sync. A lone `\r`
    /// counts as a line break; the `\r` of `\r\n` does not.
    pub(crate) fn advance(&mut self) {
        let Some(&b) = self.bytes.get(self.cursor.offset) else {
            return;
        };
        self.cursor.offset += 1;
        let line_break = b == b'\n' || (b == b'\r' && self.peek() != b'\n');
        if line_break {
            self.cursor.line += 1;
            self.cursor.column = 1;
        } else if b & 0xC0 != 0x80 {
            self.cursor.column += 1;
        }
    }

    pub(crate) fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    /// Consume one line break (`\n`, `\r\n` or `\r`) if present.
    pub(crate) fn skip_break(&mut self) {
        match self.peek() {
            b'\r' => {
                self.advance();
                if self.peek() == b'\n' {
                    self.advance();
                }
            }
            b'\n' => self.advance(),
            _ => {}
        }
    }

    /// Step back over spaces just counted on the current line.
    pub(crate) fn rewind_spaces(&mut self, count: usize) {
        self.cursor.offset -= count;
        self.cursor.column -= count as u64;
    }

    /// `---` or `...` at the cursor, followed by a separator.
    pub(crate) fn at_document_marker(&self) -> bool {
        let c = self.peek();
        (c == b'-' || c == b'.')
            && self.peek_at(1) == c
            && self.peek_at(2) == c
            && is_separator(self.peek_at(3))
    }

    pub(crate) fn error_at(&self, reason: &str, line: u64, column: u64) -> ParseError {
        ParseError::syntax(reason).with_location(&self.ctx, line, column)
    }

    pub(crate) fn error_here(&self, reason: &str) -> ParseError {
        self.error_at(reason, self.cursor.line, self.cursor.column)
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Produce the next token, or `None` once the stream end was delivered.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        self.skip_whitespace_and_comments();
        let start = self.cursor;

        if !self.stream_started {
            self.stream_started = true;
            return Ok(Some(Token::new(TokenKind::StreamStart, "", start)));
        }

        if self.at_end() {
            if self.stream_ended {
                return Ok(None);
            }
            self.stream_ended = true;
            let mut token = Token::new(TokenKind::StreamEnd, "", start);
            token.line = start.line + 1;
            token.column = 0;
            return Ok(Some(token));
        }

        let c = self.peek();
        if self.tab_at_line_start && c != b'{' && c != b'[' {
            return Err(self.error_here("Tab characters cannot be used for indentation"));
        }

        if start.column == 1 && self.at_document_marker() {
            let kind = if c == b'-' {
                TokenKind::DocumentStart
            } else {
                TokenKind::DocumentEnd
            };
            self.advance_by(3);
            if kind == TokenKind::DocumentEnd {
                self.validate_trailing_content()?;
            }
            return Ok(Some(self.indicator(kind, start)));
        }

        let after_quoted = std::mem::replace(&mut self.last_was_quoted, false);

        if self.flow_level > 0 {
            match c {
                b'{' => {
                    self.flow_level += 1;
                    return Ok(Some(self.punct(TokenKind::MappingStart, start)));
                }
                b'[' => {
                    self.flow_level += 1;
                    return Ok(Some(self.punct(TokenKind::SequenceStart, start)));
                }
                b'}' | b']' => {
                    let kind = if c == b'}' {
                        TokenKind::MappingEnd
                    } else {
                        TokenKind::SequenceEnd
                    };
                    let token = self.punct(kind, start);
                    self.flow_level -= 1;
                    if self.flow_level == 0 {
                        self.validate_trailing_content()?;
                    }
                    return Ok(Some(token));
                }
                b',' => return Ok(Some(self.punct(TokenKind::FlowEntry, start))),
                b':' if self.is_value_indicator(after_quoted) => {
                    return Ok(Some(self.punct(TokenKind::BlockMappingValue, start)));
                }
                b'?' if is_separator(self.peek_at(1)) => {
                    return Ok(Some(self.punct(TokenKind::BlockMappingKey, start)));
                }
                _ => {}
            }
        } else {
            match c {
                b'{' => {
                    self.flow_level += 1;
                    return Ok(Some(self.punct(TokenKind::MappingStart, start)));
                }
                b'[' => {
                    self.flow_level += 1;
                    return Ok(Some(self.punct(TokenKind::SequenceStart, start)));
                }
                b'-' if is_separator(self.peek_at(1)) => {
                    return Ok(Some(self.punct(TokenKind::BlockSequenceEntry, start)));
                }
                b'?' if is_separator(self.peek_at(1)) => {
                    return Ok(Some(self.punct(TokenKind::BlockMappingKey, start)));
                }
                b':' if self.is_value_indicator(after_quoted) => {
                    return Ok(Some(self.punct(TokenKind::BlockMappingValue, start)));
                }
                _ => {}
            }
        }

        let token = match c {
            b'&' => self.scan_anchor_or_alias(TokenKind::Anchor)?,
            b'*' => self.scan_anchor_or_alias(TokenKind::Alias)?,
            b'!' => self.scan_tag()?,
            b'%' => self.scan_directive(),
            b'\'' => self.scan_quoted_scalar(ScalarStyle::SingleQuoted)?,
            b'"' => self.scan_quoted_scalar(ScalarStyle::DoubleQuoted)?,
            b'|' => self.scan_block_scalar(ScalarStyle::Literal)?,
            b'>' => self.scan_block_scalar(ScalarStyle::Folded)?,
            b'#' => return Err(self.error_here("Unexpected '#' character")),
            _ => self.scan_plain_scalar()?,
        };
        Ok(Some(token))
    }

    /// Single-character structural token.
    fn punct(&mut self, kind: TokenKind, start: Cursor) -> Token<'a> {
        self.advance();
        self.indicator(kind, start)
    }

    /// Token whose text is the source between `start` and the cursor.
    fn indicator(&self, kind: TokenKind, start: Cursor) -> Token<'a> {
        let input: &'a str = self.input;
        Token::new(kind, &input[start.offset..self.cursor.offset], start)
    }

    /// `:` followed by whitespace or end of input; in flow context also by
    /// `,` `]` `}`, or anywhere directly after a quoted scalar.
    fn is_value_indicator(&self, after_quoted: bool) -> bool {
        let next = self.peek_at(1);
        if self.flow_level > 0 {
            after_quoted || is_separator(next) || matches!(next, b',' | b'}' | b']')
        } else {
            is_separator(next)
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        self.tab_at_line_start = false;
        let mut at_line_start = self.cursor.column == 1;
        while !self.at_end() {
            match self.peek() {
                b' ' => self.advance(),
                b'\t' => {
                    if at_line_start && self.flow_level == 0 {
                        self.tab_at_line_start = true;
                    }
                    self.advance();
                }
                b'\n' | b'\r' => {
                    self.skip_break();
                    at_line_start = true;
                    self.tab_at_line_start = false;
                }
                b'#' => {
                    let offset = self.cursor.offset;
                    let preceded = offset == 0 || is_separator(self.bytes[offset - 1]);
                    if !preceded {
                        break;
                    }
                    while !self.at_end() && !is_break(self.peek()) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// After a quoted scalar, a closed flow collection or `...`, only
    /// whitespace, a comment, a value indicator or (in flow context) a flow
    /// indicator may follow on the same line.
    pub(crate) fn validate_trailing_content(&mut self) -> Result<()> {
        let mut seen_blank = false;
        while !self.at_end() {
            let c = self.peek();
            match c {
                b' ' | b'\t' => {
                    seen_blank = true;
                    self.advance();
                }
                b'\n' | b'\r' | b':' => return Ok(()),
                b'#' if seen_blank => return Ok(()),
                b',' | b'[' | b']' | b'{' | b'}' if self.flow_level > 0 => return Ok(()),
                _ => return Err(self.error_here("Invalid trailing content")),
            }
        }
        Ok(())
    }
}
