use std::sync::Arc;

use regex_syntax::{
    hir::{self, literal, Hir, HirKind},
    ParserBuilder,
};

use crate::{
    error::Error,
    nfa::{LiteralPrefix, State, StateID, Transition, NFA},
    util::{alphabet::ByteClassSet, look::Look},
};

/// A sentinel for a `next` pointer that has not been patched yet. Every
/// occurrence is replaced before compilation finishes.
const NONE: StateID = StateID::MAX;

/// The configuration used for compiling an NFA.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    reverse: Option<bool>,
}

impl Config {
    /// Return a new default NFA compiler configuration.
    pub fn new() -> Config {
        Config::default()
    }

    /// Reverse the NFA.
    ///
    /// A reverse NFA matches the reversed strings of the pattern's language,
    /// with its start and end assertions swapped. A DFA built from it and
    /// fed a haystack backwards reports the *start* positions of forward
    /// matches.
    pub fn reverse(mut self, yes: bool) -> Config {
        self.reverse = Some(yes);
        self
    }

    pub fn get_reverse(&self) -> bool {
        self.reverse.unwrap_or(false)
    }

    pub(crate) fn overwrite(self, o: Config) -> Config {
        Config { reverse: o.reverse.or(self.reverse) }
    }
}

/// A compiler from regex patterns to byte-oriented Thompson NFAs.
///
/// The pattern syntax is byte oriented: Unicode mode is disabled, `^` and
/// `$` are the line anchors and `\b`/`\B` are the ASCII word boundaries.
/// Class ranges that cannot be expressed over single bytes are rejected;
/// UTF-8 decomposition is an upstream concern.
#[derive(Clone, Debug)]
pub struct Compiler {
    config: Config,
}

impl Compiler {
    /// Create a new NFA compiler with a default configuration.
    pub fn new() -> Compiler {
        Compiler { config: Config::default() }
    }

    /// Apply the given configuration to this compiler.
    pub fn configure(&mut self, config: Config) -> &mut Compiler {
        self.config = self.config.overwrite(config);
        self
    }

    /// Compile the given pattern into an NFA.
    pub fn build(&self, pattern: &str) -> Result<Arc<NFA>, Error> {
        let hir = ParserBuilder::new()
            .utf8(false)
            .unicode(false)
            .multi_line(true)
            .build()
            .parse(pattern)
            .map_err(Error::syntax)?;
        self.build_from_hir(&hir)
    }

    /// Compile the given high-level intermediate representation into an NFA.
    pub fn build_from_hir(&self, hir: &Hir) -> Result<Arc<NFA>, Error> {
        let reverse = self.config.get_reverse();
        let mut inner = CompilerI::new(reverse);
        let body = inner.c(hir)?;
        let match_id = inner.push(State::Match);
        inner.patch(body.end, match_id);
        let start_anchored = body.start;

        // A pattern that necessarily begins (or, reversed, ends) with `\A`
        // can only ever match at position 0, so the implicit prefix would be
        // dead weight. Eliding it also makes `is_always_anchored` true,
        // which the search entry points use to reject nonzero start
        // positions outright.
        let anchored = if reverse {
            hir.properties().look_set_suffix().contains(hir::Look::End)
        } else {
            hir.properties().look_set_prefix().contains(hir::Look::Start)
        };
        let start_unanchored = if anchored {
            start_anchored
        } else {
            // The prefix loop must occupy the two highest state IDs: the
            // leftmost-longest loop's liveness test relies on being able to
            // separate "prefix machinery" states from "pattern in progress"
            // states by ID alone.
            let scan = inner.states.len() as StateID;
            let split = scan + 1;
            inner.push(State::ByteRange {
                trans: Transition { start: 0x00, end: 0xFF, next: split },
            });
            inner.push(State::Split { left: start_anchored, right: scan });
            split
        };

        if inner.has_line_anchor {
            inner.class_set.set_range(b'\n', b'\n');
        }
        if inner.has_word_boundary {
            inner.class_set.set_range(b'0', b'9');
            inner.class_set.set_range(b'A', b'Z');
            inner.class_set.set_range(b'_', b'_');
            inner.class_set.set_range(b'a', b'z');
        }

        let prefix = if reverse { None } else { literal_prefix(hir) };
        assert_patched(&inner.states);
        Ok(Arc::new(NFA::from_parts(
            inner.states,
            start_anchored,
            start_unanchored,
            inner.class_set.byte_classes(),
            inner.has_word_boundary,
            prefix,
        )))
    }
}

/// A partially compiled sub-expression: its entry state, and the state whose
/// `next` pointer is still dangling and must be patched to whatever follows.
#[derive(Clone, Copy, Debug)]
struct ThompsonRef {
    start: StateID,
    end: StateID,
}

#[derive(Debug)]
struct CompilerI {
    states: Vec<State>,
    class_set: ByteClassSet,
    reverse: bool,
    has_word_boundary: bool,
    has_line_anchor: bool,
}

impl CompilerI {
    fn new(reverse: bool) -> CompilerI {
        CompilerI {
            states: vec![],
            class_set: ByteClassSet::empty(),
            reverse,
            has_word_boundary: false,
            has_line_anchor: false,
        }
    }

    fn c(&mut self, hir: &Hir) -> Result<ThompsonRef, Error> {
        match *hir.kind() {
            HirKind::Empty => Ok(self.c_empty()),
            HirKind::Literal(hir::Literal(ref bytes)) => {
                Ok(self.c_literal(bytes))
            }
            HirKind::Class(hir::Class::Bytes(ref cls)) => {
                let ranges: Vec<(u8, u8)> = cls
                    .ranges()
                    .iter()
                    .map(|r| (r.start(), r.end()))
                    .collect();
                Ok(self.c_class(&ranges))
            }
            HirKind::Class(hir::Class::Unicode(ref cls)) => {
                let mut ranges = Vec::with_capacity(cls.ranges().len());
                for r in cls.ranges() {
                    if r.end() > '\x7F' {
                        return Err(Error::unsupported(
                            "non-ASCII class ranges require UTF-8 \
                             decomposition, which belongs upstream",
                        ));
                    }
                    ranges.push((r.start() as u8, r.end() as u8));
                }
                Ok(self.c_class(&ranges))
            }
            HirKind::Look(ref look) => self.c_look(look),
            HirKind::Repetition(ref rep) => self.c_repetition(rep),
            HirKind::Capture(ref cap) => self.c_capture(cap),
            HirKind::Concat(ref subs) => self.c_concat(subs),
            HirKind::Alternation(ref subs) => self.c_alternation(subs),
        }
    }

    fn c_empty(&mut self) -> ThompsonRef {
        let id = self.add_empty();
        ThompsonRef { start: id, end: id }
    }

    fn c_literal(&mut self, bytes: &[u8]) -> ThompsonRef {
        if bytes.is_empty() {
            return self.c_empty();
        }
        let reverse = self.reverse;
        let mut start = None;
        let mut prev = None;
        for i in 0..bytes.len() {
            let b = if reverse {
                bytes[bytes.len() - 1 - i]
            } else {
                bytes[i]
            };
            let id = self.push(State::ByteRange {
                trans: Transition { start: b, end: b, next: NONE },
            });
            self.class_set.set_range(b, b);
            match prev {
                None => start = Some(id),
                Some(prev) => self.patch(prev, id),
            }
            prev = Some(id);
        }
        ThompsonRef { start: start.unwrap(), end: prev.unwrap() }
    }

    fn c_class(&mut self, ranges: &[(u8, u8)]) -> ThompsonRef {
        for &(start, end) in ranges {
            self.class_set.set_range(start, end);
        }
        let id = match ranges {
            // An empty class can never match. A `Sparse` state with no
            // transitions expresses that directly.
            [] => self.push(State::Sparse { transitions: Box::from([]) }),
            &[(start, end)] => self.push(State::ByteRange {
                trans: Transition { start, end, next: NONE },
            }),
            _ => {
                let transitions = ranges
                    .iter()
                    .map(|&(start, end)| Transition {
                        start,
                        end,
                        next: NONE,
                    })
                    .collect();
                self.push(State::Sparse { transitions })
            }
        };
        ThompsonRef { start: id, end: id }
    }

    fn c_look(&mut self, look: &hir::Look) -> Result<ThompsonRef, Error> {
        let mut look = match *look {
            hir::Look::Start => Look::StartText,
            hir::Look::End => Look::EndText,
            hir::Look::StartLF => Look::StartLine,
            hir::Look::EndLF => Look::EndLine,
            hir::Look::WordAscii => Look::WordBoundary,
            hir::Look::WordAsciiNegate => Look::NotWordBoundary,
            ref unsupported => {
                return Err(Error::unsupported(format!(
                    "look-around assertion {:?}",
                    unsupported,
                )))
            }
        };
        if self.reverse {
            look = look.reversed();
        }
        if look.is_word_boundary() {
            self.has_word_boundary = true;
        } else if matches!(look, Look::StartLine | Look::EndLine) {
            self.has_line_anchor = true;
        }
        let id = self.push(State::Look { look, next: NONE });
        Ok(ThompsonRef { start: id, end: id })
    }

    fn c_repetition(
        &mut self,
        rep: &hir::Repetition,
    ) -> Result<ThompsonRef, Error> {
        match (rep.min, rep.max) {
            (0, Some(0)) => Ok(self.c_empty()),
            (0, Some(1)) => self.c_question(&rep.sub),
            (0, None) => self.c_star(&rep.sub),
            (1, None) => self.c_plus(&rep.sub),
            (min, None) => {
                // x{min,} compiles as min copies with the last one starred.
                let mut refs = Vec::with_capacity(min as usize + 1);
                for _ in 0..min {
                    refs.push(self.c(&rep.sub)?);
                }
                refs.push(self.c_star(&rep.sub)?);
                Ok(self.c_chain(&refs))
            }
            (min, Some(max)) => {
                // x{min,max} compiles as min copies followed by max-min
                // optional copies.
                debug_assert!(min <= max);
                let mut refs = Vec::with_capacity(max as usize);
                for _ in 0..min {
                    refs.push(self.c(&rep.sub)?);
                }
                for _ in min..max {
                    refs.push(self.c_question(&rep.sub)?);
                }
                if refs.is_empty() {
                    return Ok(self.c_empty());
                }
                Ok(self.c_chain(&refs))
            }
        }
    }

    fn c_question(&mut self, sub: &Hir) -> Result<ThompsonRef, Error> {
        let split = self.add_split();
        let body = self.c(sub)?;
        let end = self.add_empty();
        self.patch(body.end, end);
        self.patch_split(split, body.start, end);
        Ok(ThompsonRef { start: split, end })
    }

    fn c_star(&mut self, sub: &Hir) -> Result<ThompsonRef, Error> {
        let split = self.add_split();
        let body = self.c(sub)?;
        self.patch(body.end, split);
        let end = self.add_empty();
        self.patch_split(split, body.start, end);
        Ok(ThompsonRef { start: split, end })
    }

    fn c_plus(&mut self, sub: &Hir) -> Result<ThompsonRef, Error> {
        let body = self.c(sub)?;
        let split = self.add_split();
        self.patch(body.end, split);
        let end = self.add_empty();
        self.patch_split(split, body.start, end);
        Ok(ThompsonRef { start: body.start, end })
    }

    fn c_capture(
        &mut self,
        cap: &hir::Capture,
    ) -> Result<ThompsonRef, Error> {
        let start =
            self.push(State::Capture { group: cap.index, end: false, next: NONE });
        let body = self.c(&cap.sub)?;
        self.patch(start, body.start);
        let end =
            self.push(State::Capture { group: cap.index, end: true, next: NONE });
        self.patch(body.end, end);
        Ok(ThompsonRef { start, end })
    }

    fn c_concat(&mut self, subs: &[Hir]) -> Result<ThompsonRef, Error> {
        if subs.is_empty() {
            return Ok(self.c_empty());
        }
        let mut refs = Vec::with_capacity(subs.len());
        if self.reverse {
            for sub in subs.iter().rev() {
                refs.push(self.c(sub)?);
            }
        } else {
            for sub in subs.iter() {
                refs.push(self.c(sub)?);
            }
        }
        Ok(self.c_chain(&refs))
    }

    fn c_chain(&mut self, refs: &[ThompsonRef]) -> ThompsonRef {
        let mut it = refs.iter();
        let first = *it.next().unwrap();
        let mut end = first.end;
        for r in it {
            self.patch(end, r.start);
            end = r.end;
        }
        ThompsonRef { start: first.start, end }
    }

    fn c_alternation(
        &mut self,
        subs: &[Hir],
    ) -> Result<ThompsonRef, Error> {
        debug_assert!(subs.len() >= 2);
        let mut branches = Vec::with_capacity(subs.len());
        for sub in subs.iter() {
            branches.push(self.c(sub)?);
        }
        // Nest splits right to left so every branch remains reachable
        // through a chain of forks.
        let mut start = branches.last().unwrap().start;
        for branch in branches.iter().rev().skip(1) {
            let split = self.add_split();
            self.patch_split(split, branch.start, start);
            start = split;
        }
        let end = self.add_empty();
        for branch in branches.iter() {
            self.patch(branch.end, end);
        }
        Ok(ThompsonRef { start, end })
    }

    fn push(&mut self, state: State) -> StateID {
        let id = self.states.len() as StateID;
        self.states.push(state);
        id
    }

    fn add_empty(&mut self) -> StateID {
        self.push(State::Epsilon { next: NONE })
    }

    fn add_split(&mut self) -> StateID {
        self.push(State::Split { left: NONE, right: NONE })
    }

    fn patch_split(&mut self, id: StateID, left: StateID, right: StateID) {
        match self.states[id as usize] {
            State::Split { left: ref mut l, right: ref mut r } => {
                *l = left;
                *r = right;
            }
            ref state => unreachable!("expected split, got {:?}", state),
        }
    }

    fn patch(&mut self, from: StateID, to: StateID) {
        match self.states[from as usize] {
            State::Epsilon { ref mut next } => *next = to,
            State::ByteRange { ref mut trans } => trans.next = to,
            State::Sparse { ref mut transitions } => {
                for t in transitions.iter_mut() {
                    t.next = to;
                }
            }
            State::Look { ref mut next, .. } => *next = to,
            State::Capture { ref mut next, .. } => *next = to,
            ref state => {
                unreachable!("cannot patch state {:?}", state)
            }
        }
    }
}

/// Extract a single mandatory prefix literal from the pattern, if there is
/// one. Exactness may only be trusted when the pattern has no look-around:
/// the extractor treats assertions as empty strings, so `\bfoo\b` reports
/// an "exact" `foo` that is anything but.
fn literal_prefix(hir: &Hir) -> Option<LiteralPrefix> {
    let seq = literal::Extractor::new().extract(hir);
    let lits = seq.literals()?;
    if lits.len() != 1 || lits[0].as_bytes().is_empty() {
        return None;
    }
    let complete =
        lits[0].is_exact() && hir.properties().look_set().is_empty();
    Some(LiteralPrefix { bytes: lits[0].as_bytes().to_vec(), complete })
}

#[cfg(debug_assertions)]
fn assert_patched(states: &[State]) {
    for (id, state) in states.iter().enumerate() {
        let ok = match *state {
            State::Epsilon { next } => next != NONE,
            State::Split { left, right } => left != NONE && right != NONE,
            State::ByteRange { trans } => trans.next != NONE,
            State::Sparse { ref transitions } => {
                transitions.iter().all(|t| t.next != NONE)
            }
            State::Look { next, .. } => next != NONE,
            State::Capture { next, .. } => next != NONE,
            State::Match => true,
        };
        assert!(ok, "state {} was never patched: {:?}", id, state);
    }
}

#[cfg(not(debug_assertions))]
fn assert_patched(_: &[State]) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::NFA;

    #[test]
    fn literal_layout() {
        let nfa = NFA::new("ab").unwrap();
        // Two byte states, an epsilon-free match, and the two-state
        // unanchored prefix.
        assert_eq!(nfa.len(), 5);
        assert_eq!(nfa.start_anchored(), 0);
        assert_eq!(nfa.start_unanchored(), 4);
        assert!(!nfa.is_always_anchored());
        assert!(!nfa.has_word_boundary());
        match *nfa.state(0) {
            State::ByteRange { trans } => {
                assert_eq!((trans.start, trans.end, trans.next), (b'a', b'a', 1));
            }
            ref s => panic!("unexpected state: {:?}", s),
        }
    }

    #[test]
    fn prefix_machinery_is_last() {
        let nfa = NFA::new("a+b").unwrap();
        let unanchored = nfa.start_unanchored();
        assert_eq!(unanchored as usize, nfa.len() - 1);
        match *nfa.state(unanchored) {
            State::Split { right, .. } => assert_eq!(right, unanchored - 1),
            ref s => panic!("unexpected state: {:?}", s),
        }
        match *nfa.state(unanchored - 1) {
            State::ByteRange { trans } => {
                assert_eq!((trans.start, trans.end), (0x00, 0xFF));
                assert_eq!(trans.next, unanchored);
            }
            ref s => panic!("unexpected state: {:?}", s),
        }
    }

    #[test]
    fn always_anchored() {
        let nfa = NFA::new(r"\Aabc").unwrap();
        assert!(nfa.is_always_anchored());
        assert_eq!(nfa.start_anchored(), nfa.start_unanchored());

        // A multi-line `^` does not anchor the whole pattern.
        let nfa = NFA::new("^abc").unwrap();
        assert!(!nfa.is_always_anchored());
    }

    #[test]
    fn reverse_swaps_looks_and_bytes() {
        let nfa = NFA::new_reverse(r"\Aab$").unwrap();
        let mut bytes = vec![];
        let mut looks = vec![];
        for state in nfa.states() {
            match *state {
                State::ByteRange { trans } if trans.start == trans.end => {
                    bytes.push(trans.start)
                }
                State::Look { look, .. } => looks.push(look),
                _ => {}
            }
        }
        assert_eq!(bytes, vec![b'b', b'a']);
        assert_eq!(looks, vec![Look::StartLine, Look::EndText]);
    }

    #[test]
    fn word_boundary_splits_classes() {
        let nfa = NFA::new(r"\bfoo").unwrap();
        assert!(nfa.has_word_boundary());
        let classes = nfa.byte_classes();
        assert_ne!(classes.get(b'0'), classes.get(b' '));
        assert_ne!(classes.get(b'_'), classes.get(b'-'));
    }

    #[test]
    fn line_anchor_splits_newline() {
        let nfa = NFA::new("^foo").unwrap();
        let classes = nfa.byte_classes();
        assert_ne!(classes.get(b'\n'), classes.get(b'\r'));
    }

    #[test]
    fn class_compiles_sparse() {
        let nfa = NFA::new("[a-cx-z]").unwrap();
        let sparse = nfa
            .states()
            .iter()
            .find_map(|s| match *s {
                State::Sparse { ref transitions } => Some(transitions.len()),
                _ => None,
            })
            .unwrap();
        assert_eq!(sparse, 2);
    }

    #[test]
    fn counted_repetition_expands() {
        let nfa = NFA::new("a{2,4}").unwrap();
        let count = nfa
            .states()
            .iter()
            .filter(|s| matches!(s, State::ByteRange { trans } if trans.start == b'a'))
            .count();
        assert_eq!(count, 4);
    }

    #[test]
    fn non_ascii_class_is_rejected() {
        assert!(NFA::new("[α-ω]").is_err());
    }

    #[test]
    fn extracts_literal_prefix() {
        let nfa = NFA::new("hello").unwrap();
        let prefix = nfa.literal_prefix().unwrap();
        assert_eq!(prefix.bytes, b"hello");
        assert!(prefix.complete);

        let nfa = NFA::new("hello.*world").unwrap();
        let prefix = nfa.literal_prefix().unwrap();
        assert_eq!(prefix.bytes, b"hello");
        assert!(!prefix.complete);

        // Look-arounds must poison exactness.
        let nfa = NFA::new(r"\bfoo\b").unwrap();
        if let Some(prefix) = nfa.literal_prefix() {
            assert!(!prefix.complete);
        }

        // Alternations do not produce a single mandatory prefix.
        let nfa = NFA::new("foo|bar").unwrap();
        assert!(nfa.literal_prefix().is_none());
    }
}
