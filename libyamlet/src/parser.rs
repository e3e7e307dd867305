//! Phase 2: Parser
//!
//! The parser pulls tokens from the [`Lexer`] and builds one [`Value`] per
//! document. Every node it constructs is bracketed by a `Pre` and a `Post`
//! event sent to the optional callback. Tokens read ahead but not consumed
//! wait in a pending queue that is drained before the lexer is asked again.
//!
//! State survives between [`Parser::parse`] calls, so a stream holding
//! several documents is read one document per call.

use crate::error::{ParseContext, ParseError, Result};
use crate::event::{Callback, CallbackRecord, Context, Event, Phase, ValueKind};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::scalar::interpret_scalar;
use crate::value::Value;
use indexmap::IndexMap;
use log::{debug, trace};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

const CORE_PREFIX: &str = "tag:yaml.org,2002:";
const STR_TAG: &str = "tag:yaml.org,2002:str";

/// The value an anchor is bound to, with the events emitted while it was
/// built so an alias can replay them.
struct AnchoredValue {
    value: Value,
    callbacks: Vec<CallbackRecord>,
}

/// Where a node sits in its parent, and where the key that introduced it
/// was written (line 0 when there is none).
#[derive(Debug, Clone, Copy)]
struct Slot<'k> {
    context: Context,
    index: usize,
    property: &'k str,
    key_line: u64,
    key_column: u64,
    /// Base column of the enclosing block collection, 0 in flow or at the
    /// root.
    block_column: u64,
}

impl<'k> Slot<'k> {
    fn root() -> Self {
        Slot {
            context: Context::Root,
            index: 0,
            property: "",
            key_line: 0,
            key_column: 0,
            block_column: 0,
        }
    }

    fn index(index: usize) -> Self {
        Slot {
            context: Context::Index,
            index,
            ..Slot::root()
        }
    }

    fn block_entry(index: usize, block_column: u64) -> Self {
        Slot {
            block_column,
            ..Slot::index(index)
        }
    }

    fn block_value(key: &'k EntryKey, block_column: u64) -> Self {
        Slot {
            block_column,
            ..key.slot()
        }
    }

    fn property(key: &'k str, key_line: u64, key_column: u64) -> Self {
        Slot {
            context: Context::Property,
            property: key,
            key_line,
            key_column,
            ..Slot::root()
        }
    }

    fn is_keyed(&self) -> bool {
        self.context == Context::Property && self.key_line > 0
    }

    /// `Pre` events of mapping values point at their key.
    fn pre_position(&self, line: u64, column: u64) -> (u64, u64) {
        if self.is_keyed() {
            (self.key_line, self.key_column)
        } else {
            (line, column)
        }
    }

    /// `token`, read after node properties ending on `line`, belongs to the
    /// block collection around this slot rather than to the node. A `-`
    /// lined up with a mapping's keys still starts the value.
    fn is_outside(&self, token: &Token<'_>, line: u64) -> bool {
        if self.block_column == 0 || token.line <= line {
            return false;
        }
        match self.context {
            Context::Property if token.kind == TokenKind::BlockSequenceEntry => {
                token.column < self.block_column
            }
            _ => token.column <= self.block_column,
        }
    }
}

/// A mapping key after resolution.
struct EntryKey {
    text: String,
    line: u64,
    column: u64,
}

impl EntryKey {
    fn slot(&self) -> Slot<'_> {
        Slot::property(&self.text, self.line, self.column)
    }
}

/// Token kinds that can begin a block mapping entry.
fn starts_entry(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Scalar
            | TokenKind::BlockMappingKey
            | TokenKind::BlockMappingValue
            | TokenKind::Anchor
            | TokenKind::Tag
            | TokenKind::Alias
    )
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// YAML document parser.
pub struct Parser<'a, 'c> {
    lexer: Lexer<'a>,
    callback: Option<Callback<'c>>,
    anchors: HashMap<String, Rc<AnchoredValue>>,
    /// One event log per anchor whose node is still being built.
    recordings: Vec<Vec<CallbackRecord>>,
    /// Events are suppressed while this is non-zero.
    muted: usize,
    pending: VecDeque<Token<'a>>,
    tag_directives: HashMap<String, String>,
    document_start_line: u64,
    /// Opening bracket of each enclosing flow collection.
    flow_starts: Vec<(u64, u64)>,
    started: bool,
    /// The previous document was closed with `...`.
    document_ended: bool,
    documents: usize,
}

impl<'a, 'c> Parser<'a, 'c> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            callback: None,
            anchors: HashMap::new(),
            recordings: Vec::new(),
            muted: 0,
            pending: VecDeque::new(),
            tag_directives: HashMap::new(),
            document_start_line: 0,
            flow_starts: Vec::new(),
            started: false,
            document_ended: true,
            documents: 0,
        }
    }

    /// Create a parser that reports every node to `callback`.
    pub fn with_callback<F>(input: &'a str, callback: F) -> Self
    where
        F: FnMut(&Event<'_>) + 'c,
    {
        let mut parser = Self::new(input);
        parser.callback = Some(Box::new(callback));
        parser
    }

    /// Name the source in error locations.
    pub fn with_filename(mut self, filename: &str) -> Self {
        self.lexer.ctx = ParseContext::new(Some(filename));
        self
    }

    /// Byte offset where the next document begins.
    pub fn position(&self) -> usize {
        self.pending
            .front()
            .map_or_else(|| self.lexer.position(), |token| token.offset)
    }

    /// No document remains in the stream.
    pub fn at_end(&self) -> bool {
        match self.pending.front() {
            Some(token) => token.kind == TokenKind::StreamEnd,
            None => self.lexer.stream_ended(),
        }
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Parse the next document of the stream.
    pub fn parse(&mut self) -> Result<Value> {
        self.begin_document();
        let mut token = self.first_document_token()?;
        while token.kind == TokenKind::DocumentEnd {
            token = self.expect_token()?;
            if token.kind == TokenKind::StreamEnd {
                return Err(self.no_document_error());
            }
        }
        trace!("document {} starts at line {}", self.documents + 1, token.line);

        if token.kind.is_directive() {
            token = self.process_directives(token)?;
            self.require_document_start(&token)?;
        }

        let value = if token.kind == TokenKind::DocumentStart {
            self.document_start_line = token.line;
            let next = self.expect_token()?;
            if next.kind.ends_document() {
                self.unread(next);
                self.empty_node(None, None, (token.line, token.column), &Slot::root())
            } else {
                self.parse_value(next, Slot::root())?
            }
        } else {
            self.parse_value(token, Slot::root())?
        };

        self.finish_document()?;
        Ok(value)
    }

    /// Check that everything after the current position is well formed,
    /// without reporting events or keeping values.
    pub fn validate_end_of_stream(&mut self) -> Result<()> {
        if !self.started {
            self.started = true;
            self.expect_stream_start()?;
        }
        self.muted += 1;
        let result = self.validate_remaining();
        self.muted -= 1;
        result
    }

    fn validate_remaining(&mut self) -> Result<()> {
        let mut saw_end = self.document_ended;
        while let Some(token) = self.next_token()? {
            match token.kind {
                TokenKind::StreamEnd => break,
                TokenKind::DocumentEnd => {
                    saw_end = true;
                    continue;
                }
                TokenKind::DocumentStart => {
                    self.begin_document();
                    self.validate_document_body(&token)?;
                }
                kind if kind.is_directive() => {
                    if !saw_end {
                        return Err(self.error_at(
                            "Directive not allowed without preceding document end marker",
                            token.line,
                            token.column,
                        ));
                    }
                    self.begin_document();
                    let start = self.process_directives(token)?;
                    self.require_document_start(&start)?;
                    self.validate_document_body(&start)?;
                }
                _ => {
                    if !saw_end {
                        return Err(self.error_at(
                            "Unexpected content after document",
                            token.line,
                            token.column,
                        ));
                    }
                    self.begin_document();
                    self.parse_value(token, Slot::root())?;
                }
            }
            saw_end = false;
        }
        Ok(())
    }

    /// Parse and drop the body that follows a `---`.
    fn validate_document_body(&mut self, start: &Token<'a>) -> Result<()> {
        self.document_start_line = start.line;
        let next = self.expect_token()?;
        if next.kind.ends_document() {
            self.unread(next);
            return Ok(());
        }
        self.parse_value(next, Slot::root())?;
        Ok(())
    }

    fn begin_document(&mut self) {
        self.tag_directives.clear();
        self.flow_starts.clear();
        self.document_start_line = 0;
        self.lexer.set_block_indent(None);
    }

    fn expect_stream_start(&mut self) -> Result<()> {
        match self.next_token()? {
            Some(token) if token.kind == TokenKind::StreamStart => Ok(()),
            _ => Err(self.error_at("Expected stream start", self.lexer.line(), self.lexer.column())),
        }
    }

    fn first_document_token(&mut self) -> Result<Token<'a>> {
        if !self.started {
            self.started = true;
            self.expect_stream_start()?;
        }
        match self.next_token()? {
            Some(token) if token.kind != TokenKind::StreamEnd => Ok(token),
            _ => Err(self.no_document_error()),
        }
    }

    fn no_document_error(&self) -> ParseError {
        if self.documents == 0 {
            self.error_at("Empty YAML document", 1, 1)
        } else {
            self.error_at("No more documents in stream", self.lexer.line(), self.lexer.column())
        }
    }

    fn require_document_start(&self, token: &Token<'a>) -> Result<()> {
        if token.kind == TokenKind::DocumentStart {
            Ok(())
        } else {
            Err(self.error_at(
                "Missing document start marker after directives",
                token.line,
                token.column,
            ))
        }
    }

    /// Consume `...` markers after a root node and leave the start of the
    /// next document in the pending queue.
    fn finish_document(&mut self) -> Result<()> {
        let mut saw_end = false;
        while let Some(token) = self.next_token()? {
            match token.kind {
                TokenKind::DocumentEnd => saw_end = true,
                TokenKind::StreamEnd => break,
                TokenKind::DocumentStart => {
                    self.unread(token);
                    break;
                }
                _ if saw_end => {
                    self.unread(token);
                    break;
                }
                _ => {
                    return Err(self.error_at(
                        "Unexpected content after document",
                        token.line,
                        token.column,
                    ))
                }
            }
        }
        self.document_ended = saw_end;
        self.documents += 1;
        trace!("document {} ends at offset {}", self.documents, self.position());
        Ok(())
    }

    // ========================================================================
    // Directives and Tags
    // ========================================================================

    /// Apply a run of directives; returns the first token after them.
    fn process_directives(&mut self, first: Token<'a>) -> Result<Token<'a>> {
        let mut token = first;
        let mut seen_yaml = false;
        while token.kind.is_directive() {
            match token.kind {
                TokenKind::DirectiveYaml => {
                    if seen_yaml {
                        return Err(self.error_at("Duplicate %YAML directive", token.line, token.column));
                    }
                    seen_yaml = true;
                    self.yaml_directive(&token)?;
                }
                TokenKind::DirectiveTag => self.tag_directive(&token)?,
                _ => debug!("ignoring reserved directive {:?}", token.text),
            }
            token = self.expect_token()?;
        }
        Ok(token)
    }

    fn yaml_directive(&self, token: &Token<'a>) -> Result<()> {
        let body = token.text.strip_prefix("%YAML").unwrap_or(&token.text);
        let mut words = body.split_whitespace();
        let version = words.next().unwrap_or("");
        let well_formed = version
            .split_once('.')
            .is_some_and(|(major, minor)| is_digits(major) && is_digits(minor));
        if !well_formed {
            return Err(self.error_at("Invalid %YAML directive version", token.line, token.column));
        }
        if words.next().is_some_and(|word| !word.starts_with('#')) {
            return Err(self.error_at("Invalid content in %YAML directive", token.line, token.column));
        }
        debug!("%YAML {}", version);
        Ok(())
    }

    fn tag_directive(&mut self, token: &Token<'a>) -> Result<()> {
        let body = token.text.strip_prefix("%TAG").unwrap_or(&token.text);
        let mut words = body.split_whitespace();
        let (Some(handle), Some(prefix)) = (words.next(), words.next()) else {
            return Err(self.error_at("Invalid %TAG directive", token.line, token.column));
        };
        let well_formed = handle.starts_with('!')
            && handle.ends_with('!')
            && words.next().map_or(true, |word| word.starts_with('#'));
        if !well_formed {
            return Err(self.error_at("Invalid %TAG directive", token.line, token.column));
        }
        debug!("%TAG {} {}", handle, prefix);
        self.tag_directives.insert(handle.to_string(), prefix.to_string());
        Ok(())
    }

    /// Expand a tag token against the document's `%TAG` table.
    fn resolve_tag(&self, token: &Token<'a>) -> Result<String> {
        let raw = token.text.as_ref();
        if let Some(uri) = raw.strip_prefix("!<").and_then(|rest| rest.strip_suffix('>')) {
            return Ok(uri.to_string());
        }
        if raw == "!" {
            return Ok(raw.to_string());
        }
        if let Some(suffix) = raw.strip_prefix("!!") {
            let prefix = self.tag_directives.get("!!").map_or(CORE_PREFIX, String::as_str);
            return Ok(format!("{}{}", prefix, suffix));
        }

        let body = raw.strip_prefix('!').unwrap_or(raw);
        if let Some(bang) = body.find('!') {
            let handle = &raw[..bang + 2];
            let suffix = &body[bang + 1..];
            return match self.tag_directives.get(handle) {
                Some(prefix) => Ok(format!("{}{}", prefix, suffix)),
                None => Err(self.error_at("Undefined tag handle", token.line, token.column)),
            };
        }
        match self.tag_directives.get("!") {
            Some(prefix) => Ok(format!("{}{}", prefix, body)),
            None => Ok(raw.to_string()),
        }
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        match self.pending.pop_front() {
            Some(token) => Ok(Some(token)),
            None => self.lexer.next_token(),
        }
    }

    fn expect_token(&mut self) -> Result<Token<'a>> {
        match self.next_token()? {
            Some(token) => Ok(token),
            None => Err(self.error_at("Unexpected end of input", self.lexer.line(), self.lexer.column())),
        }
    }

    /// Next token inside a flow collection; the end of the document means
    /// the innermost bracket was never closed.
    fn expect_flow_token(&mut self, unterminated: &str) -> Result<Token<'a>> {
        match self.next_token()? {
            Some(token) if !token.kind.ends_document() => Ok(token),
            _ => {
                let (line, column) = self.flow_starts.last().copied().unwrap_or((1, 1));
                Err(self.error_at(unterminated, line, column))
            }
        }
    }

    /// Push a token back so it is read next.
    fn unread(&mut self, token: Token<'a>) {
        self.pending.push_front(token);
    }

    fn in_flow(&self) -> bool {
        !self.flow_starts.is_empty()
    }

    fn error_at(&self, reason: &str, line: u64, column: u64) -> ParseError {
        self.lexer.error_at(reason, line, column)
    }

    fn error_at_token(&self, reason: &str, token: &Token<'_>) -> ParseError {
        self.error_at(reason, token.line, token.column)
    }

    // ========================================================================
    // Events and Anchors
    // ========================================================================

    fn dispatch(&mut self, event: Event<'_>) {
        if self.muted > 0 {
            return;
        }
        for recording in &mut self.recordings {
            recording.push(event.to_record());
        }
        if let Some(callback) = self.callback.as_mut() {
            callback(&event);
        }
    }

    fn emit_pre(&mut self, kind: ValueKind, (line, column): (u64, u64), slot: &Slot<'_>) {
        self.dispatch(Event {
            phase: Phase::Pre,
            kind,
            line,
            column,
            context: slot.context,
            index: slot.index,
            property: slot.property,
        });
    }

    fn emit_post(&mut self, kind: ValueKind, line: u64, column: u64) {
        self.dispatch(Event {
            phase: Phase::Post,
            kind,
            line,
            column,
            context: Context::Root,
            index: 0,
            property: "",
        });
    }

    /// Events for a mapping value that was left out.
    fn emit_implicit_null(&mut self, key: &EntryKey) {
        let end = key.column + key.text.chars().count() as u64;
        self.emit_pre(ValueKind::Null, (key.line, key.column), &key.slot());
        self.emit_post(ValueKind::Null, key.line, end);
    }

    /// Run `parse`, binding its result to `anchor` if there is one.
    fn anchored<F>(&mut self, anchor: Option<String>, parse: F) -> Result<Value>
    where
        F: FnOnce(&mut Self) -> Result<Value>,
    {
        let Some(name) = anchor else {
            return parse(self);
        };
        self.recordings.push(Vec::new());
        let result = parse(self);
        let callbacks = self.recordings.pop().unwrap_or_default();
        let value = result?;
        self.bind(name, value.clone(), callbacks);
        Ok(value)
    }

    /// An anchor placed on a mapping key binds to the key text.
    fn bind_key_anchor(&mut self, name: String, key: &str) {
        self.bind(name, Value::String(key.to_string()), Vec::new());
    }

    fn bind(&mut self, name: String, value: Value, callbacks: Vec<CallbackRecord>) {
        trace!("anchor &{} bound ({} events)", name, callbacks.len());
        self.anchors.insert(name, Rc::new(AnchoredValue { value, callbacks }));
    }

    fn lookup_anchor(&self, token: &Token<'a>) -> Result<Rc<AnchoredValue>> {
        match self.anchors.get(token.text.as_ref()) {
            Some(anchored) => Ok(Rc::clone(anchored)),
            None => Err(ParseError::unknown_anchor(token.text.as_ref()).with_location(
                self.lexer.context(),
                token.line,
                token.column,
            )),
        }
    }

    /// The key text an alias stands for.
    fn alias_key(&self, token: &Token<'a>) -> Result<String> {
        Ok(self.lookup_anchor(token)?.value.to_key_string())
    }

    /// Replay the anchored node's events at the alias site and return a copy
    /// of its value.
    fn resolve_alias(&mut self, token: &Token<'a>, slot: &Slot<'_>) -> Result<Value> {
        let anchored = self.lookup_anchor(token)?;
        let (pre_line, pre_column) = slot.pre_position(token.line, token.column);
        let end_column = token.column + token.width();

        if anchored.callbacks.is_empty() {
            let kind = anchored.value.kind();
            self.emit_pre(kind, (pre_line, pre_column), slot);
            self.emit_post(kind, token.line, end_column);
            return Ok(anchored.value.clone());
        }

        let last = anchored.callbacks.len() - 1;
        let mut first_pre = true;
        for (i, record) in anchored.callbacks.iter().enumerate() {
            let mut event = record.as_event();
            if first_pre && record.phase == Phase::Pre {
                first_pre = false;
                event.line = pre_line;
                event.column = pre_column;
                event.context = slot.context;
                event.index = slot.index;
                event.property = slot.property;
            }
            if i == last && record.phase == Phase::Post {
                event.line = token.line;
                event.column = end_column;
                event.context = Context::Root;
                event.index = 0;
                event.property = "";
            }
            self.dispatch(event);
        }
        Ok(anchored.value.clone())
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn parse_value(&mut self, first: Token<'a>, slot: Slot<'_>) -> Result<Value> {
        let prefix_line = first.line;
        let mut node_start_column = first.column;
        let mut property_at = (first.line, first.column);
        let mut token = first;
        let mut tag: Option<String> = None;
        let mut anchor: Option<String> = None;
        let mut anchor_line = 0;
        let mut anchor_count = 0;

        while matches!(token.kind, TokenKind::Anchor | TokenKind::Tag) {
            if !self.in_flow() && slot.is_keyed() && token.line != slot.key_line {
                if let Some(parent) = self.lexer.block_indent() {
                    if token.column.saturating_sub(1) <= parent as u64 {
                        return Err(self.error_at_token("Node property at wrong indentation level", &token));
                    }
                }
            }
            property_at = (token.line, token.column);
            if token.kind == TokenKind::Anchor {
                anchor_line = token.line;
                anchor_count += 1;
                anchor = Some(token.text.into_owned());
            } else {
                tag = Some(self.resolve_tag(&token)?);
            }

            token = match self.next_token()? {
                Some(next) if !next.kind.ends_document() => next,
                other => {
                    if let Some(next) = other {
                        self.unread(next);
                    }
                    return Ok(self.empty_node(tag.as_deref(), anchor, property_at, &slot));
                }
            };

            if !self.in_flow() && slot.is_outside(&token, property_at.0) {
                self.unread(token);
                return Ok(self.empty_node(tag.as_deref(), anchor, property_at, &slot));
            }
        }

        let has_properties = anchor.is_some() || tag.is_some();
        if has_properties
            && matches!(
                token.kind,
                TokenKind::FlowEntry | TokenKind::MappingEnd | TokenKind::SequenceEnd
            )
        {
            self.unread(token);
            return Ok(self.empty_node(tag.as_deref(), anchor, property_at, &slot));
        }

        if token.line != prefix_line {
            node_start_column = 0;
        }
        if has_properties
            && !self.in_flow()
            && token.line == prefix_line
            && token.kind == TokenKind::BlockSequenceEntry
        {
            return Err(self.error_at_token(
                "Block sequence after node property must start on a new line",
                &token,
            ));
        }

        match token.kind {
            TokenKind::Scalar => match self.next_token()? {
                Some(colon) if colon.kind == TokenKind::BlockMappingValue => {
                    self.check_implicit_key(&token, &colon, &slot, has_properties)?;
                    if anchor_line == token.line {
                        if let Some(name) = anchor.take() {
                            self.bind_key_anchor(name, &token.text);
                        }
                    }
                    self.unread(colon);
                    self.anchored(anchor, move |p| p.parse_block_mapping(token, slot, node_start_column))
                }
                next => {
                    if anchor_count > 1 {
                        return Err(self.error_at_token("Multiple anchors on a scalar node", &token));
                    }
                    let tag = tag.as_deref();
                    let value = self.anchored(anchor, |p| Ok(p.parse_scalar(&token, tag, &slot)))?;
                    if let Some(next) = next {
                        self.unread(next);
                    }
                    Ok(value)
                }
            },
            TokenKind::Alias => match self.next_token()? {
                Some(colon) if colon.kind == TokenKind::BlockMappingValue => {
                    self.unread(colon);
                    self.anchored(anchor, move |p| p.parse_block_mapping(token, slot, node_start_column))
                }
                next => {
                    if anchor.is_some() {
                        return Err(self.error_at_token("Cannot anchor an alias node", &token));
                    }
                    let value = self.resolve_alias(&token, &slot)?;
                    if let Some(next) = next {
                        self.unread(next);
                    }
                    Ok(value)
                }
            },
            TokenKind::MappingStart => {
                self.anchored(anchor, move |p| p.parse_flow_mapping(token, slot))
            }
            TokenKind::SequenceStart => {
                self.anchored(anchor, move |p| p.parse_flow_sequence(token, slot))
            }
            TokenKind::BlockSequenceEntry => {
                self.anchored(anchor, move |p| p.parse_block_sequence(token, slot))
            }
            TokenKind::BlockMappingKey | TokenKind::BlockMappingValue => {
                self.anchored(anchor, move |p| p.parse_block_mapping(token, slot, node_start_column))
            }
            _ => Err(self.error_at_token("Unexpected token", &token)),
        }
    }

    /// Rules for a scalar that turned out to be an implicit mapping key.
    fn check_implicit_key(
        &self,
        key: &Token<'a>,
        colon: &Token<'a>,
        slot: &Slot<'_>,
        has_properties: bool,
    ) -> Result<()> {
        if key.multiline {
            return Err(self.error_at_token("Multi-line implicit mapping key", key));
        }
        if self.in_flow() {
            if colon.line != key.line {
                return Err(self.error_at_token(
                    "Implicit key and value indicator on different lines in flow context",
                    colon,
                ));
            }
            return Ok(());
        }
        if slot.is_keyed() && key.line == slot.key_line {
            return Err(self.error_at_token(
                "Implicit mapping key in block value on same line as parent key",
                key,
            ));
        }
        if has_properties && self.document_start_line > 0 && key.line == self.document_start_line {
            return Err(self.error_at_token(
                "Node properties before implicit mapping key on document start line",
                key,
            ));
        }
        Ok(())
    }

    /// A node with no content: `""` under `!!str`, null otherwise.
    fn empty_node(
        &mut self,
        tag: Option<&str>,
        anchor: Option<String>,
        (line, column): (u64, u64),
        slot: &Slot<'_>,
    ) -> Value {
        let value = if tag == Some(STR_TAG) {
            Value::String(String::new())
        } else {
            Value::Null
        };
        if anchor.is_some() {
            self.recordings.push(Vec::new());
        }
        self.emit_pre(value.kind(), slot.pre_position(line, column), slot);
        self.emit_post(value.kind(), line, column);
        if let Some(name) = anchor {
            let callbacks = self.recordings.pop().unwrap_or_default();
            self.bind(name, value.clone(), callbacks);
        }
        value
    }

    fn parse_scalar(&mut self, token: &Token<'a>, tag: Option<&str>, slot: &Slot<'_>) -> Value {
        let value = interpret_scalar(&token.text, token.style, tag);
        self.emit_pre(value.kind(), slot.pre_position(token.line, token.column), slot);

        let mut end_column = token.column;
        let width = token.width();
        if width > 0 {
            end_column += width - 1;
        }
        if token.style.is_quoted() {
            end_column += 2;
        }
        self.emit_post(value.kind(), token.line, end_column);
        value
    }

    // ========================================================================
    // Flow Collections
    // ========================================================================

    fn parse_flow_mapping(&mut self, start: Token<'a>, slot: Slot<'_>) -> Result<Value> {
        self.emit_pre(ValueKind::Object, slot.pre_position(start.line, start.column), &slot);
        let parent_indent = self.lexer.block_indent();
        self.flow_starts.push((start.line, start.column));

        let mut object = IndexMap::new();
        let mut expect_entry = true;
        let end = loop {
            let token = self.expect_flow_token("Unterminated flow mapping")?;
            self.check_flow_indent(&token, &start, parent_indent)?;
            match token.kind {
                TokenKind::MappingEnd => break token,
                TokenKind::FlowEntry => {
                    if object.is_empty() && expect_entry {
                        return Err(self.error_at_token("Leading comma in flow mapping", &token));
                    }
                    if expect_entry {
                        return Err(self.error_at_token("Empty entry in flow mapping", &token));
                    }
                    expect_entry = true;
                }
                _ if !expect_entry => {
                    return Err(self.error_at_token("Missing comma between flow mapping entries", &token));
                }
                _ => {
                    self.parse_flow_mapping_entry(token, &mut object)?;
                    expect_entry = false;
                }
            }
        };

        self.flow_starts.pop();
        self.emit_post(ValueKind::Object, end.line, end.column);
        Ok(Value::Object(object))
    }

    /// Continuation lines of a flow collection nested in a block must be
    /// indented past the enclosing block.
    fn check_flow_indent(&self, token: &Token<'a>, start: &Token<'a>, parent_indent: Option<usize>) -> Result<()> {
        match parent_indent {
            Some(parent) if token.line != start.line && token.column.saturating_sub(1) <= parent as u64 => {
                Err(self.error_at_token(
                    "Flow content indented less than or equal to parent block level",
                    token,
                ))
            }
            _ => Ok(()),
        }
    }

    fn parse_flow_mapping_entry(
        &mut self,
        first: Token<'a>,
        object: &mut IndexMap<String, Value>,
    ) -> Result<()> {
        let mut token = first;
        let explicit = token.kind == TokenKind::BlockMappingKey;
        if explicit {
            token = self.expect_flow_token("Unterminated flow mapping")?;
        }
        let mut key_anchor = None;
        while matches!(token.kind, TokenKind::Anchor | TokenKind::Tag) {
            if token.kind == TokenKind::Anchor {
                key_anchor = Some(token.text.to_string());
            } else {
                self.resolve_tag(&token)?;
            }
            token = self.expect_flow_token("Unterminated flow mapping")?;
        }

        let (key, colon_seen) = match token.kind {
            TokenKind::Scalar => (
                EntryKey {
                    text: token.text.to_string(),
                    line: token.line,
                    column: token.column,
                },
                false,
            ),
            TokenKind::Alias => (
                EntryKey {
                    text: self.alias_key(&token)?,
                    line: token.line,
                    column: token.column,
                },
                false,
            ),
            TokenKind::BlockMappingValue => (
                EntryKey {
                    text: String::new(),
                    line: token.line,
                    column: token.column,
                },
                true,
            ),
            _ => return Err(self.error_at_token("Expected scalar key in mapping", &token)),
        };
        if let Some(name) = key_anchor {
            self.bind_key_anchor(name, &key.text);
        }
        if object.contains_key(&key.text) {
            return Err(ParseError::duplicate_key(key.text.as_str()).with_location(
                self.lexer.context(),
                key.line,
                key.column,
            ));
        }

        if !colon_seen {
            let next = self.expect_flow_token("Unterminated flow mapping")?;
            match next.kind {
                TokenKind::BlockMappingValue => {
                    if !explicit && next.line != key.line {
                        return Err(self.error_at_token(
                            "Implicit key and value indicator on different lines in flow context",
                            &next,
                        ));
                    }
                }
                TokenKind::FlowEntry | TokenKind::MappingEnd => {
                    self.unread(next);
                    self.emit_implicit_null(&key);
                    object.insert(key.text, Value::Null);
                    return Ok(());
                }
                _ => {
                    let colon_column = key.column + key.text.chars().count() as u64;
                    return Err(self.error_at("Expected ':' after mapping key", key.line, colon_column));
                }
            }
        }

        let next = self.expect_flow_token("Unterminated flow mapping")?;
        let value = if matches!(next.kind, TokenKind::FlowEntry | TokenKind::MappingEnd) {
            self.unread(next);
            self.emit_implicit_null(&key);
            Value::Null
        } else {
            self.parse_value(next, key.slot())?
        };
        object.insert(key.text, value);
        Ok(())
    }

    fn parse_flow_sequence(&mut self, start: Token<'a>, slot: Slot<'_>) -> Result<Value> {
        self.emit_pre(ValueKind::Array, slot.pre_position(start.line, start.column), &slot);
        let parent_indent = self.lexer.block_indent();
        self.flow_starts.push((start.line, start.column));

        let mut items = Vec::new();
        let mut expect_entry = true;
        let end = loop {
            let token = self.expect_flow_token("Unterminated flow sequence")?;
            self.check_flow_indent(&token, &start, parent_indent)?;
            match token.kind {
                TokenKind::SequenceEnd => break token,
                TokenKind::FlowEntry => {
                    if items.is_empty() && expect_entry {
                        return Err(self.error_at_token("Leading comma in flow sequence", &token));
                    }
                    if expect_entry {
                        return Err(self.error_at_token("Empty entry in flow sequence", &token));
                    }
                    expect_entry = true;
                }
                _ if !expect_entry => {
                    return Err(self.error_at_token("Missing comma in flow sequence", &token));
                }
                TokenKind::BlockMappingKey => {
                    let pair = self.parse_flow_pair(token, items.len())?;
                    items.push(pair);
                    expect_entry = false;
                }
                _ => {
                    let value = self.parse_value(token, Slot::index(items.len()))?;
                    items.push(value);
                    expect_entry = false;
                }
            }
        };

        self.flow_starts.pop();
        self.emit_post(ValueKind::Array, end.line, end.column);
        Ok(Value::Array(items))
    }

    /// `? key : value` inside a flow sequence is a single-pair mapping.
    fn parse_flow_pair(&mut self, indicator: Token<'a>, index: usize) -> Result<Value> {
        let slot = Slot::index(index);
        self.emit_pre(ValueKind::Object, (indicator.line, indicator.column), &slot);

        let token = self.expect_flow_token("Unterminated flow sequence")?;
        let (key, next) = match token.kind {
            TokenKind::Scalar => {
                let key = EntryKey {
                    text: token.text.to_string(),
                    line: token.line,
                    column: token.column,
                };
                (key, self.expect_flow_token("Unterminated flow sequence")?)
            }
            TokenKind::BlockMappingValue | TokenKind::FlowEntry | TokenKind::SequenceEnd => {
                let key = EntryKey {
                    text: String::new(),
                    line: indicator.line,
                    column: indicator.column,
                };
                (key, token)
            }
            _ => {
                let key = self.parse_complex_key(token)?;
                (key, self.expect_flow_token("Unterminated flow sequence")?)
            }
        };

        let value = if next.kind == TokenKind::BlockMappingValue {
            let token = self.expect_flow_token("Unterminated flow sequence")?;
            if matches!(token.kind, TokenKind::FlowEntry | TokenKind::SequenceEnd) {
                self.unread(token);
                self.emit_implicit_null(&key);
                Value::Null
            } else {
                self.parse_value(token, key.slot())?
            }
        } else {
            self.unread(next);
            self.emit_implicit_null(&key);
            Value::Null
        };

        let mut object = IndexMap::new();
        object.insert(key.text, value);
        self.emit_post(ValueKind::Object, self.lexer.line(), self.lexer.column());
        Ok(Value::Object(object))
    }

    /// A collection used as a key is stringified; its events are dropped.
    fn parse_complex_key(&mut self, token: Token<'a>) -> Result<EntryKey> {
        let (line, column) = (token.line, token.column);
        self.muted += 1;
        let parsed = self.parse_value(token, Slot::root());
        self.muted -= 1;
        Ok(EntryKey {
            text: parsed?.to_key_string(),
            line,
            column,
        })
    }

    // ========================================================================
    // Block Collections
    // ========================================================================

    fn parse_block_sequence(&mut self, first: Token<'a>, slot: Slot<'_>) -> Result<Value> {
        self.emit_pre(ValueKind::Array, slot.pre_position(first.line, first.column), &slot);
        let base_column = first.column;
        let indent = Some(base_column.saturating_sub(1) as usize);
        let outer_indent = self.lexer.block_indent();

        let mut items = Vec::new();
        let mut entry = first;
        let next = loop {
            if entry.column > base_column {
                if entry.column < base_column + 2 {
                    return Err(self.error_at_token("Wrong indentation for sequence entry", &entry));
                }
                let value = self.parse_value(entry, Slot::index(items.len()))?;
                items.push(value);
            } else {
                self.lexer.set_block_indent(indent);
                let value = self.block_sequence_entry(&entry, base_column, items.len())?;
                items.push(value);
            }

            self.lexer.set_block_indent(indent);
            match self.next_token()? {
                Some(token)
                    if token.kind == TokenKind::BlockSequenceEntry && token.column >= base_column =>
                {
                    entry = token;
                }
                other => break other,
            }
        };

        let (end_line, end_column) = match next {
            Some(token) => {
                let at = (token.line, 0);
                self.unread(token);
                at
            }
            None => (self.lexer.line(), self.lexer.column()),
        };
        self.lexer.set_block_indent(outer_indent);
        self.emit_post(ValueKind::Array, end_line, end_column);
        Ok(Value::Array(items))
    }

    /// The node after one `-`; null when the entry is empty.
    fn block_sequence_entry(&mut self, dash: &Token<'a>, base_column: u64, index: usize) -> Result<Value> {
        let slot = Slot::block_entry(index, base_column);
        let Some(token) = self.next_token()? else {
            return Ok(self.empty_node(None, None, (dash.line, dash.column), &slot));
        };
        let sibling = token.kind == TokenKind::BlockSequenceEntry && token.column == base_column;
        let detached = token.line > dash.line
            && token.column <= base_column
            && token.kind != TokenKind::BlockSequenceEntry;
        if token.kind.ends_document() || sibling || detached {
            self.unread(token);
            return Ok(self.empty_node(None, None, (dash.line, dash.column), &slot));
        }
        self.parse_value(token, slot)
    }

    /// Parse a block mapping whose first entry begins at `first`. A key's
    /// `:` is still in the token stream.
    fn parse_block_mapping(&mut self, first: Token<'a>, slot: Slot<'_>, node_start_column: u64) -> Result<Value> {
        self.emit_pre(ValueKind::Object, slot.pre_position(first.line, first.column), &slot);
        let base_column = if node_start_column > 0 {
            node_start_column
        } else {
            first.column
        };
        let indent = Some(base_column.saturating_sub(1) as usize);
        let outer_indent = self.lexer.block_indent();
        let compact = self.document_start_line > 0 && first.line == self.document_start_line;

        let mut object = IndexMap::new();
        let mut token = first;
        let mut first_entry = true;
        loop {
            if !first_entry {
                if !starts_entry(token.kind) || token.column != base_column {
                    self.unread(token);
                    break;
                }
                if compact && token.line != self.document_start_line {
                    return Err(self.error_at_token(
                        "Block mapping continuation after document start line",
                        &token,
                    ));
                }
            }
            first_entry = false;

            self.lexer.set_block_indent(indent);
            if !self.parse_block_mapping_entry(token, &mut object, base_column, indent)? {
                break;
            }
            self.lexer.set_block_indent(indent);
            token = match self.next_token()? {
                Some(token) => token,
                None => break,
            };
        }

        self.lexer.set_block_indent(outer_indent);
        self.emit_post(ValueKind::Object, self.lexer.line(), self.lexer.column());
        Ok(Value::Object(object))
    }

    /// Parse one entry. Returns `false`, with the tokens pushed back, when
    /// `first` does not begin an entry after all.
    fn parse_block_mapping_entry(
        &mut self,
        first: Token<'a>,
        object: &mut IndexMap<String, Value>,
        base_column: u64,
        indent: Option<usize>,
    ) -> Result<bool> {
        let mut token = first;
        let mut key_anchor = None;
        let mut has_properties = false;
        while matches!(token.kind, TokenKind::Anchor | TokenKind::Tag) {
            has_properties = true;
            if token.kind == TokenKind::Anchor {
                key_anchor = Some(token.text.to_string());
            } else {
                self.resolve_tag(&token)?;
            }
            token = self.expect_token()?;
        }

        let key = match token.kind {
            TokenKind::BlockMappingKey => {
                self.parse_explicit_entry(token, object, base_column, indent, key_anchor)?;
                return Ok(true);
            }
            TokenKind::BlockMappingValue => EntryKey {
                text: String::new(),
                line: token.line,
                column: token.column,
            },
            TokenKind::Scalar | TokenKind::Alias => {
                match self.next_token()? {
                    Some(colon) if colon.kind == TokenKind::BlockMappingValue => {}
                    other => {
                        if has_properties {
                            return Err(self.error_at_token("Expected mapping key", &token));
                        }
                        if let Some(other) = other {
                            self.unread(other);
                        }
                        self.unread(token);
                        return Ok(false);
                    }
                }
                if token.multiline {
                    return Err(self.error_at_token("Multi-line implicit mapping key", &token));
                }
                let text = if token.kind == TokenKind::Alias {
                    self.alias_key(&token)?
                } else {
                    token.text.to_string()
                };
                EntryKey {
                    text,
                    line: token.line,
                    column: token.column,
                }
            }
            _ if has_properties => return Err(self.error_at_token("Expected mapping key", &token)),
            _ => {
                self.unread(token);
                return Ok(false);
            }
        };

        if let Some(name) = key_anchor {
            self.bind_key_anchor(name, &key.text);
        }
        self.insert_block_entry(object, key, base_column, indent, true)?;
        Ok(true)
    }

    /// `? key` followed by an optional `: value`.
    fn parse_explicit_entry(
        &mut self,
        indicator: Token<'a>,
        object: &mut IndexMap<String, Value>,
        base_column: u64,
        indent: Option<usize>,
        key_anchor: Option<String>,
    ) -> Result<()> {
        let empty_key = EntryKey {
            text: String::new(),
            line: indicator.line,
            column: indicator.column,
        };
        self.lexer.set_block_indent(indent);
        let token = self.expect_token()?;
        let (key, after) = match token.kind {
            TokenKind::Scalar => {
                let key = EntryKey {
                    text: token.text.to_string(),
                    line: token.line,
                    column: token.column,
                };
                (key, self.next_token()?)
            }
            TokenKind::BlockMappingValue | TokenKind::BlockMappingKey => (empty_key, Some(token)),
            kind if kind.ends_document() => (empty_key, Some(token)),
            _ => {
                let key = self.parse_complex_key(token)?;
                self.lexer.set_block_indent(indent);
                (key, self.next_token()?)
            }
        };
        if let Some(name) = key_anchor {
            self.bind_key_anchor(name, &key.text);
        }

        let has_value = match after {
            Some(colon) if colon.kind == TokenKind::BlockMappingValue => true,
            other => {
                if let Some(other) = other {
                    self.unread(other);
                }
                false
            }
        };
        self.insert_block_entry(object, key, base_column, indent, has_value)
    }

    fn insert_block_entry(
        &mut self,
        object: &mut IndexMap<String, Value>,
        key: EntryKey,
        base_column: u64,
        indent: Option<usize>,
        has_value: bool,
    ) -> Result<()> {
        if object.contains_key(&key.text) {
            return Err(ParseError::duplicate_key(key.text.as_str()).with_location(
                self.lexer.context(),
                key.line,
                key.column,
            ));
        }
        let value = if has_value {
            self.parse_block_mapping_value(&key, base_column, indent)?
        } else {
            self.emit_implicit_null(&key);
            Value::Null
        };
        object.insert(key.text, value);
        Ok(())
    }

    /// The node after a key's `:`; null when the value is left out.
    fn parse_block_mapping_value(
        &mut self,
        key: &EntryKey,
        base_column: u64,
        indent: Option<usize>,
    ) -> Result<Value> {
        self.lexer.set_block_indent(indent);
        let Some(token) = self.next_token()? else {
            self.emit_implicit_null(key);
            return Ok(Value::Null);
        };

        if token.kind == TokenKind::BlockSequenceEntry && token.line == key.line {
            return Err(self.error_at_token("Block sequence entry on same line as mapping key", &token));
        }
        let detached = !self.in_flow()
            && token.line > key.line
            && (token.column < base_column
                || (token.kind != TokenKind::BlockSequenceEntry && token.column <= base_column));
        let closes_flow = self.in_flow()
            && matches!(
                token.kind,
                TokenKind::FlowEntry | TokenKind::MappingEnd | TokenKind::SequenceEnd
            );
        if token.kind.ends_document() || detached || closes_flow {
            self.unread(token);
            self.emit_implicit_null(key);
            return Ok(Value::Null);
        }
        self.parse_value(token, Slot::block_value(key, base_column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Value> {
        let mut parser = Parser::new(input);
        let value = parser.parse()?;
        parser.validate_end_of_stream()?;
        Ok(value)
    }

    fn reason(input: &str) -> String {
        parse(input).unwrap_err().reason()
    }

    #[test]
    fn test_scalar_root() {
        assert_eq!(parse("1").unwrap(), Value::Integer(1));
        assert_eq!(parse("   1    ").unwrap(), Value::Integer(1));
        assert_eq!(parse("version: 1.29.2").unwrap().get("version"), Some(&Value::from("1.29.2")));
    }

    #[test]
    fn test_empty_input() {
        let err = parse("").unwrap_err();
        assert_eq!(err.reason(), "Empty YAML document");
        assert_eq!((err.line(), err.column()), (1, 1));
        assert_eq!(reason("    "), "Empty YAML document");
        assert_eq!(reason("# only a comment\n"), "Empty YAML document");
    }

    #[test]
    fn test_nested_block_mapping() {
        let value = parse("a:\n  b: 1\n  c: [x, y]\nd: 2\n").unwrap();
        assert_eq!(value.to_string(), r#"{"a":{"b":1,"c":["x","y"]},"d":2}"#);
    }

    #[test]
    fn test_missing_value_does_not_swallow_sibling() {
        assert_eq!(parse("a:\nb: 1").unwrap().to_string(), r#"{"a":null,"b":1}"#);
        assert_eq!(parse("a: !!str\nb: 1").unwrap().to_string(), r#"{"a":"","b":1}"#);
    }

    #[test]
    fn test_property_only_node_ends_at_sibling() {
        assert_eq!(parse("- &x\n- b\n").unwrap().to_string(), r#"[null,"b"]"#);
        assert_eq!(parse("- !!str\n- b\n").unwrap().to_string(), r#"["","b"]"#);
        assert_eq!(parse("a: !!str\n? b\n: c\n").unwrap().to_string(), r#"{"a":"","b":"c"}"#);
        assert_eq!(parse("- &x\n- *x\n").unwrap().to_string(), "[null,null]");
        assert_eq!(parse("a: &x\n*x : 1\n").unwrap().to_string(), r#"{"a":null,"":1}"#);
        assert_eq!(parse("- a: &x\n- b\n").unwrap().to_string(), r#"[{"a":null},"b"]"#);
    }

    #[test]
    fn test_property_applies_to_indented_content() {
        assert_eq!(parse("- &x\n  - b\n- *x\n").unwrap().to_string(), r#"[["b"],["b"]]"#);
        assert_eq!(parse("a: !!seq\n- b\n").unwrap().to_string(), r#"{"a":["b"]}"#);
        assert_eq!(parse("a: &x\n  b: 1\nc: *x\n").unwrap().to_string(), r#"{"a":{"b":1},"c":{"b":1}}"#);
    }

    #[test]
    fn test_compact_sequence_value() {
        let value = parse("a:\n- 1\n- 2\nb: 3").unwrap();
        assert_eq!(value.to_string(), r#"{"a":[1,2],"b":3}"#);
    }

    #[test]
    fn test_sequence_of_mappings() {
        let value = parse("- a: 1\n  b: 2\n- c\n-\n").unwrap();
        assert_eq!(value.to_string(), r#"[{"a":1,"b":2},"c",null]"#);
    }

    #[test]
    fn test_explicit_keys() {
        let value = parse("? a\n: 1\n? b\n? [x, y]\n: 2\n").unwrap();
        assert_eq!(value.to_string(), r#"{"a":1,"b":null,"[\"x\",\"y\"]":2}"#);
    }

    #[test]
    fn test_flow_collections() {
        let value = parse("{a: [1, {b: c}], d, e: }").unwrap();
        assert_eq!(value.to_string(), r#"{"a":[1,{"b":"c"}],"d":null,"e":null}"#);
        let value = parse("[a: 1, ? b : 2, ? c]").unwrap();
        assert_eq!(value.to_string(), r#"[{"a":1},{"b":2},{"c":null}]"#);
    }

    #[test]
    fn test_flow_separator_errors() {
        assert_eq!(reason("[, a]"), "Leading comma in flow sequence");
        assert_eq!(reason("[a, , b]"), "Empty entry in flow sequence");
        assert_eq!(reason("{, a: 1}"), "Leading comma in flow mapping");
        assert_eq!(reason("{a: 1,, b: 2}"), "Empty entry in flow mapping");
        let err = parse("{ xx").unwrap_err();
        assert_eq!(err.to_string(), "Unterminated flow mapping at 1:1");
        assert_eq!(reason("[a"), "Unterminated flow sequence");
    }

    #[test]
    fn test_anchors_and_aliases() {
        let value = parse("base: &b {x: 1}\ncopy: *b\n").unwrap();
        assert_eq!(value.to_string(), r#"{"base":{"x":1},"copy":{"x":1}}"#);
        let value = parse("a: &x 1\na2: *x\nb: &x 2\nb2: *x").unwrap();
        assert_eq!(value.to_string(), r#"{"a":1,"a2":1,"b":2,"b2":2}"#);
    }

    #[test]
    fn test_nested_anchors() {
        let value = parse("outer: &o\n  inner: &i [1]\nx: *i\ny: *o\n").unwrap();
        assert_eq!(
            value.to_string(),
            r#"{"outer":{"inner":[1]},"x":[1],"y":{"inner":[1]}}"#
        );
    }

    #[test]
    fn test_key_anchor_and_alias_key() {
        let value = parse("&k name: 1\n*k : 2\n").unwrap_err();
        assert!(matches!(value, ParseError::DuplicateKey { ref key, .. } if key == "name"));
        let value = parse("&k name: 1\nother: *k\n").unwrap();
        assert_eq!(value.to_string(), r#"{"name":1,"other":"name"}"#);
    }

    #[test]
    fn test_unknown_anchor() {
        let err = parse("alias: *unknown").unwrap_err();
        assert!(matches!(err, ParseError::UnknownAnchor { ref anchor, .. } if anchor == "unknown"));
        assert_eq!((err.line(), err.column()), (1, 8));
    }

    #[test]
    fn test_duplicate_keys() {
        for input in ["{a: 1, a: 2}", "a: 1\na: 2\n"] {
            let err = parse(input).unwrap_err();
            assert!(matches!(err, ParseError::DuplicateKey { ref key, .. } if key == "a"));
        }
    }

    #[test]
    fn test_tags() {
        assert_eq!(parse("!!str 123").unwrap(), Value::from("123"));
        assert_eq!(parse("!!int \"42\"").unwrap(), Value::Integer(42));
        assert_eq!(parse("! 12").unwrap(), Value::from("12"));
        assert_eq!(parse("[!!str , !!null x]").unwrap().to_string(), r#"["",null]"#);
    }

    #[test]
    fn test_tag_directives() {
        let value = parse("%TAG !e! tag:yaml.org,2002:\n--- !e!str 5").unwrap();
        assert_eq!(value, Value::from("5"));
        assert_eq!(reason("--- !e!str 5"), "Undefined tag handle");
        assert_eq!(reason("%TAG !e tag:x\n--- a"), "Invalid %TAG directive");
    }

    #[test]
    fn test_yaml_directive() {
        assert_eq!(parse("%YAML 1.2\n--- a").unwrap(), Value::from("a"));
        assert_eq!(parse("%YAML 1.2 # comment\n--- a").unwrap(), Value::from("a"));
        assert_eq!(reason("%YAML 1.2\n%YAML 1.2\n--- a"), "Duplicate %YAML directive");
        assert_eq!(reason("%YAML 1.2 foo\n--- a"), "Invalid content in %YAML directive");
        assert_eq!(reason("%YAML x\n--- a"), "Invalid %YAML directive version");
        assert_eq!(reason("%YAML 1.2\na"), "Missing document start marker after directives");
    }

    #[test]
    fn test_multi_document_positions() {
        let mut parser = Parser::new("--- 1\n--- 2\n--- 3");
        assert_eq!(parser.parse().unwrap(), Value::Integer(1));
        assert_eq!(parser.position(), 6);
        assert_eq!(parser.parse().unwrap(), Value::Integer(2));
        assert_eq!(parser.position(), 12);
        assert_eq!(parser.parse().unwrap(), Value::Integer(3));
        assert_eq!(parser.position(), 17);
        assert!(parser.at_end());
        assert_eq!(parser.parse().unwrap_err().reason(), "No more documents in stream");
    }

    #[test]
    fn test_empty_documents() {
        let mut parser = Parser::new("---\n--- a\n---\n...\n");
        assert_eq!(parser.parse().unwrap(), Value::Null);
        assert_eq!(parser.parse().unwrap(), Value::from("a"));
        assert_eq!(parser.parse().unwrap(), Value::Null);
        assert!(parser.at_end());
    }

    #[test]
    fn test_content_after_document() {
        assert_eq!(reason("a: 1\nb"), "Unexpected content after document");
        let mut parser = Parser::new("a\n...\nb\n");
        assert_eq!(parser.parse().unwrap(), Value::from("a"));
        assert_eq!(parser.parse().unwrap(), Value::from("b"));
    }

    #[test]
    fn test_validate_end_of_stream() {
        let mut parser = Parser::new("--- 1\n--- !e!x 2\n");
        assert_eq!(parser.parse().unwrap(), Value::Integer(1));
        assert_eq!(parser.validate_end_of_stream().unwrap_err().reason(), "Undefined tag handle");

        let mut parser = Parser::new("a\n...\n%TAG !e! tag:x:\n--- !e!y 2\n");
        parser.parse().unwrap();
        assert!(parser.validate_end_of_stream().is_ok());
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(reason("a: b: c"), "Implicit mapping key in block value on same line as parent key");
        assert_eq!(reason("a: - b"), "Block sequence entry on same line as mapping key");
        assert_eq!(reason("- [a]\n - b"), "Wrong indentation for sequence entry");
        assert_eq!(reason("&a &b x"), "Multiple anchors on a scalar node");
        assert_eq!(reason("a: &x *y"), "Cannot anchor an alias node");
        assert_eq!(reason("!!seq - a"), "Block sequence after node property must start on a new line");
        assert_eq!(reason("--- a: 1\nb: 2"), "Block mapping continuation after document start line");
        assert_eq!(reason("--- &x a: 1"), "Node properties before implicit mapping key on document start line");
        assert_eq!(reason("\"a\nb\": 1"), "Multi-line implicit mapping key");
        assert_eq!(reason("{a\n: 1}"), "Implicit key and value indicator on different lines in flow context");
        assert_eq!(reason("key: [a,\nb]"), "Flow content indented less than or equal to parent block level");
        assert_eq!(reason("key: {a: 1,\nb: 2}"), "Flow content indented less than or equal to parent block level");
    }

    #[test]
    fn test_flow_continuation_lines() {
        let value = parse("key: {a: 1,\n  b: 2}\nlist: [x,\n  y]\n").unwrap();
        assert_eq!(value.to_string(), r#"{"key":{"a":1,"b":2},"list":["x","y"]}"#);
        assert_eq!(parse("{a: 1,\nb: 2}").unwrap().to_string(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_alias_key_with_extreme_exponent() {
        let value = parse("a: &x 12e9223372036854775807\n*x : 1\n").unwrap();
        assert_eq!(
            value.to_string(),
            r#"{"a":1.2e+9223372036854775808,"1.2e+9223372036854775808":1}"#
        );
    }

    #[test]
    fn test_failed_anchor_leaves_no_recording() {
        let mut parser = Parser::new("a: &x [1, *nope]\n");
        assert!(parser.parse().is_err());
        assert!(parser.recordings.is_empty());

        let mut parser = Parser::new("- &x {k: *nope}\n");
        assert!(parser.parse().is_err());
        assert!(parser.recordings.is_empty());
    }

    #[test]
    fn test_error_location_names_file() {
        let mut parser = Parser::new("a: 1\na: 2").with_filename("dup.yaml");
        let err = parser.parse().unwrap_err();
        assert_eq!(err.to_string(), "Duplicate mapping key \"a\" at 2:1 of <dup.yaml>");
    }
}
