/*!
A byte-oriented Thompson NFA, as consumed by the lazy DFA and the PikeVM.

The NFA is immutable once compiled and holds no search state, so a single
`Arc<NFA>` may be shared between any number of engines. Everything a search
engine needs is exposed here: the state graph, the anchored and unanchored
start states, the byte equivalence classes induced by the pattern and a few
precomputed facts (`has_word_boundary`, `is_always_anchored`) that let hot
paths skip work.
*/

use core::fmt;

use std::sync::Arc;

use crate::{
    error::Error,
    util::{
        alphabet::ByteClasses,
        look::Look,
    },
};

mod compiler;

pub use self::compiler::{Compiler, Config};

/// An identifier for an NFA state.
///
/// Identifiers are densely allocated from zero, so they double as indices
/// into the state slice.
pub type StateID = u32;

/// A single NFA state.
///
/// Only `ByteRange` and `Sparse` states consume input. Everything else is
/// followed (or not) during epsilon closure.
#[derive(Clone, Eq, PartialEq)]
pub enum State {
    /// An unconditional edge consuming no input.
    Epsilon { next: StateID },
    /// A fork consuming no input. Both branches are alive.
    Split { left: StateID, right: StateID },
    /// A single contiguous range of bytes.
    ByteRange { trans: Transition },
    /// An ordered sequence of non-overlapping byte ranges. Used when a
    /// character class does not reduce to one contiguous range.
    Sparse { transitions: Box<[Transition]> },
    /// A look-around assertion. The edge may only be followed when the
    /// assertion holds at the current position.
    Look { look: Look, next: StateID },
    /// A capture group marker. Carries no meaning for the engines in this
    /// crate; it is traversed exactly like an epsilon edge. It exists so
    /// that patterns using groups determinize correctly without a separate
    /// "strip captures" pass.
    Capture { group: u32, end: bool, next: StateID },
    /// A match state. Reaching it means the pattern has matched ending at
    /// the current position.
    Match,
}

/// A transition consuming one byte in `[start, end]`.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Transition {
    pub start: u8,
    pub end: u8,
    pub next: StateID,
}

impl Transition {
    /// Whether this transition covers the given byte.
    #[inline(always)]
    pub fn matches(&self, byte: u8) -> bool {
        self.start <= byte && byte <= self.end
    }
}

/// A compiled NFA.
#[derive(Clone)]
pub struct NFA {
    states: Vec<State>,
    start_anchored: StateID,
    start_unanchored: StateID,
    byte_classes: ByteClasses,
    has_word_boundary: bool,
    prefix: Option<LiteralPrefix>,
}

/// A mandatory literal prefix extracted from the pattern, if one exists.
///
/// This is the NFA layer's contribution to prefilter construction: the DFA
/// decides whether to actually build a prefilter from it.
#[derive(Clone, Debug)]
pub struct LiteralPrefix {
    /// The literal bytes every match must start with.
    pub bytes: Vec<u8>,
    /// True when the literal is the entire pattern language, i.e., every
    /// occurrence of the literal is a match.
    pub complete: bool,
}

impl NFA {
    /// Compile the given pattern into a forward NFA using a default
    /// configuration.
    pub fn new(pattern: &str) -> Result<Arc<NFA>, Error> {
        Compiler::new().build(pattern)
    }

    /// Compile the given pattern into a reverse NFA: it matches the reversed
    /// strings of the original pattern's language, with start and end
    /// assertions swapped. Feeding a haystack to it backwards finds the
    /// start positions of forward matches.
    pub fn new_reverse(pattern: &str) -> Result<Arc<NFA>, Error> {
        let mut compiler = Compiler::new();
        compiler.configure(Config::new().reverse(true));
        compiler.build(pattern)
    }

    pub(crate) fn from_parts(
        states: Vec<State>,
        start_anchored: StateID,
        start_unanchored: StateID,
        byte_classes: ByteClasses,
        has_word_boundary: bool,
        prefix: Option<LiteralPrefix>,
    ) -> NFA {
        NFA {
            states,
            start_anchored,
            start_unanchored,
            byte_classes,
            has_word_boundary,
            prefix,
        }
    }

    /// The total number of states in this NFA.
    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Borrow the state with the given identifier.
    ///
    /// Panics when the identifier is invalid.
    #[inline(always)]
    pub fn state(&self, id: StateID) -> &State {
        &self.states[id as usize]
    }

    /// All states, indexed by identifier.
    #[inline]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// The start state for anchored searches: no implicit prefix, so any
    /// match must begin exactly where the search begins.
    #[inline]
    pub fn start_anchored(&self) -> StateID {
        self.start_anchored
    }

    /// The start state for unanchored searches. It reaches the anchored
    /// start through an implicit `(?s:.)*?` prefix, letting a match begin
    /// at any later position.
    #[inline]
    pub fn start_unanchored(&self) -> StateID {
        self.start_unanchored
    }

    /// Whether every search with this NFA is necessarily anchored, i.e.,
    /// the pattern begins with `\A` and the compiler elided the implicit
    /// prefix entirely.
    #[inline]
    pub fn is_always_anchored(&self) -> bool {
        self.start_anchored == self.start_unanchored
    }

    /// Whether any state in this NFA is a `\b` or `\B` assertion. When
    /// false, the word boundary resolution steps of subset construction can
    /// be skipped wholesale.
    #[inline]
    pub fn has_word_boundary(&self) -> bool {
        self.has_word_boundary
    }

    /// Whether the given state is a match state.
    #[inline(always)]
    pub fn is_match(&self, id: StateID) -> bool {
        matches!(self.states[id as usize], State::Match)
    }

    /// The byte equivalence classes induced by this NFA's transitions.
    #[inline]
    pub fn byte_classes(&self) -> &ByteClasses {
        &self.byte_classes
    }

    /// The literal prefix extracted at compile time, if any.
    #[inline]
    pub fn literal_prefix(&self) -> Option<&LiteralPrefix> {
        self.prefix.as_ref()
    }
}

impl fmt::Debug for NFA {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "NFA(")?;
        for (id, state) in self.states.iter().enumerate() {
            let mark = if id as StateID == self.start_anchored
                && id as StateID == self.start_unanchored
            {
                "*^"
            } else if id as StateID == self.start_anchored {
                "^"
            } else if id as StateID == self.start_unanchored {
                "*"
            } else {
                " "
            };
            writeln!(f, "{:04} {} {:?}", id, mark, state)?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            State::Epsilon { next } => write!(f, "=> {}", next),
            State::Split { left, right } => {
                write!(f, "split({}, {})", left, right)
            }
            State::ByteRange { trans } => write!(f, "{:?}", trans),
            State::Sparse { ref transitions } => {
                let rs = transitions
                    .iter()
                    .map(|t| format!("{:?}", t))
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "sparse({})", rs)
            }
            State::Look { look, next } => {
                write!(f, "look({:?}) => {}", look, next)
            }
            State::Capture { group, end, next } => {
                let side = if end { "end" } else { "start" };
                write!(f, "capture({}, {}) => {}", group, side, next)
            }
            State::Match => write!(f, "MATCH"),
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use crate::util::DebugByte;

        if self.start == self.end {
            write!(f, "{:?} => {}", DebugByte(self.start), self.next)
        } else {
            write!(
                f,
                "{:?}-{:?} => {}",
                DebugByte(self.start),
                DebugByte(self.end),
                self.next
            )
        }
    }
}
