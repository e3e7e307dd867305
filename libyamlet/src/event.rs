//! Structural events reported while a document is built.
//!
//! Every node produces a `Pre` event when its construction begins and a
//! `Post` event when it is complete. Aliases replay the events recorded for
//! the anchored node.

/// Which side of a node an event brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    Post,
}

/// How the node is reached from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    /// Document root, or a position that carries no parent information.
    Root,
    /// Element of an array; see `Event::index`.
    Index,
    /// Value of a mapping; see `Event::property`.
    Property,
}

/// The kind of node an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Real,
    Decimal,
    String,
    Array,
    Object,
}

/// A callback invocation, borrowed for the duration of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event<'e> {
    pub phase: Phase,
    pub kind: ValueKind,
    pub line: u64,
    pub column: u64,
    pub context: Context,
    pub index: usize,
    pub property: &'e str,
}

impl Event<'_> {
    /// Copy this event into an owned record.
    pub fn to_record(&self) -> CallbackRecord {
        CallbackRecord {
            phase: self.phase,
            kind: self.kind,
            line: self.line,
            column: self.column,
            context: self.context,
            index: self.index,
            property: self.property.to_string(),
        }
    }
}

/// An owned snapshot of one callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRecord {
    pub phase: Phase,
    pub kind: ValueKind,
    pub line: u64,
    pub column: u64,
    pub context: Context,
    pub index: usize,
    pub property: String,
}

impl CallbackRecord {
    pub fn as_event(&self) -> Event<'_> {
        Event {
            phase: self.phase,
            kind: self.kind,
            line: self.line,
            column: self.column,
            context: self.context,
            index: self.index,
            property: &self.property,
        }
    }
}

/// The sink a `Parser` drives.
pub type Callback<'c> = Box<dyn FnMut(&Event<'_>) + 'c>;
