/*!
The subset-construction primitives driving lazy determinization: epsilon
closure under a look-set, the per-byte `move`, word boundary resolution and
the end-of-input match check.

Word boundaries get special treatment throughout. `\b` and `\B` depend on
the byte *after* the current position, which a DFA transitioning on the
current byte has not seen yet. So closure never resolves them; the
unresolved `Look` states simply stay in the subset, and they are crossed at
the start of the *next* `move` (when the following byte is in hand), or by
the end-of-input check, or by the search loop's boundary pre-check for
matches that end on a boundary.
*/

use std::sync::Arc;

use crate::{
    dfa::{accel, accel::Accel, start::Start, state::State},
    nfa::{self, State as NfaState, NFA},
    util::{
        alphabet::ByteClasses,
        is_word_byte,
        look::{Look, LookSet},
        pool,
        sparse_set::{SparseSet, SparseSets},
    },
};

/// The determinizer: owns the traversal scratch and the handful of facts
/// about the NFA that the hot paths want without re-deriving.
#[derive(Clone, Debug)]
pub(crate) struct Determinizer {
    nfa: Arc<NFA>,
    /// Cached here so `move` can skip boundary resolution without touching
    /// the NFA.
    has_word_boundary: bool,
    /// The epsilon closure of the anchored start under an empty look-set,
    /// sorted. A subset containing nothing outside this set and the
    /// unanchored prefix machinery holds only fresh restart threads.
    fresh_start: Vec<nfa::StateID>,
    sparses: SparseSets,
    stack: Vec<nfa::StateID>,
}

impl Determinizer {
    pub(crate) fn new(nfa: Arc<NFA>) -> Determinizer {
        let mut sparses = SparseSets::new(nfa.len());
        let mut stack = vec![];
        epsilon_closure(
            &nfa,
            nfa.start_anchored(),
            LookSet::empty(),
            &mut stack,
            &mut sparses.set1,
        );
        let mut fresh_start: Vec<nfa::StateID> =
            sparses.set1.iter().copied().collect();
        fresh_start.sort_unstable();
        sparses.clear();
        let has_word_boundary = nfa.has_word_boundary();
        Determinizer { nfa, has_word_boundary, fresh_start, sparses, stack }
    }

    #[inline]
    pub(crate) fn has_word_boundary(&self) -> bool {
        self.has_word_boundary
    }

    /// Build the start state for the given position classification.
    pub(crate) fn start_state(
        &mut self,
        start: Start,
        anchored: bool,
        alphabet_len: usize,
    ) -> State {
        let Determinizer {
            ref nfa,
            has_word_boundary,
            ref mut sparses,
            ref mut stack,
            ..
        } = *self;
        let from = if anchored {
            nfa.start_anchored()
        } else {
            nfa.start_unanchored()
        };
        sparses.set1.clear();
        epsilon_closure(nfa, from, start.look_set(), stack, &mut sparses.set1);
        let mut ids: Vec<nfa::StateID> =
            sparses.set1.iter().copied().collect();
        ids.sort_unstable();
        let is_from_word = has_word_boundary && start.is_from_word();
        State::new(nfa, &ids, is_from_word, alphabet_len)
    }

    /// The `move` primitive: given a subset and its word-context flag,
    /// produce the sorted subset reached by consuming `byte`.
    ///
    /// Resolves pending word boundaries against `byte` first, then follows
    /// byte transitions, then closes over epsilon edges with `^` satisfied
    /// exactly when the consumed byte was a `\n`. The result is written
    /// into `out`, sorted and deduplicated; empty means dead.
    pub(crate) fn next_set(
        &mut self,
        current: &[nfa::StateID],
        from_word: bool,
        byte: u8,
        out: &mut Vec<nfa::StateID>,
    ) {
        out.clear();
        let Determinizer {
            ref nfa,
            has_word_boundary,
            ref mut sparses,
            ref mut stack,
            ..
        } = *self;
        let SparseSets { ref mut set1, ref mut set2 } = *sparses;
        set2.clear();
        let look = if byte == b'\n' {
            LookSet::empty().insert(Look::StartLine)
        } else {
            LookSet::empty()
        };
        if has_word_boundary {
            set1.clear();
            let satisfied = from_word != is_word_byte(byte);
            resolve_word_boundary(nfa, current, satisfied, stack, set1);
            for &id in set1.iter() {
                byte_step(nfa, id, byte, look, stack, set2);
            }
        } else {
            for &id in current {
                byte_step(nfa, id, byte, look, stack, set2);
            }
        }
        out.extend(set2.iter().copied());
        out.sort_unstable();
    }

    /// Whether resolving word boundaries against the satisfied flag exposes
    /// an accept state. Used by the search loop's pre-check so that a match
    /// ending on a boundary just before the current byte is not lost (the
    /// accept reached through the boundary has no byte transition and would
    /// vanish from the subset in `move`).
    pub(crate) fn boundary_resolves_to_match(
        &mut self,
        current: &[nfa::StateID],
        satisfied: bool,
    ) -> bool {
        let Determinizer { ref nfa, ref mut sparses, ref mut stack, .. } =
            *self;
        sparses.set1.clear();
        resolve_word_boundary(nfa, current, satisfied, stack, &mut sparses.set1);
        sparses.set1.iter().any(|&id| nfa.is_match(id))
    }

    /// The end-of-input check: resolve word boundaries as if the next byte
    /// were a non-word byte, close over the given look-set, and report
    /// whether an accept state is reachable.
    pub(crate) fn eoi_is_match(
        &mut self,
        current: &[nfa::StateID],
        from_word: bool,
        look: LookSet,
    ) -> bool {
        let Determinizer {
            ref nfa,
            has_word_boundary,
            ref mut sparses,
            ref mut stack,
            ..
        } = *self;
        let SparseSets { ref mut set1, ref mut set2 } = *sparses;
        set1.clear();
        set2.clear();
        if has_word_boundary {
            // A non-word "next byte" satisfies \b exactly when the last
            // consumed byte was a word byte.
            resolve_word_boundary(nfa, current, from_word, stack, set1);
            for &id in set1.iter() {
                epsilon_closure(nfa, id, look, stack, set2);
            }
        } else {
            for &id in current {
                epsilon_closure(nfa, id, look, stack, set2);
            }
        }
        set2.iter().any(|&id| nfa.is_match(id))
    }

    /// Whether the subset still contains a thread that is neither a fresh
    /// restart nor part of the unanchored prefix machinery. Once a
    /// leftmost-longest search has committed to a match, a subset with no
    /// such thread cannot extend that match, so the search may stop.
    pub(crate) fn has_in_progress(&self, current: &[nfa::StateID]) -> bool {
        let machinery_low = if self.nfa.is_always_anchored() {
            self.nfa.len() as nfa::StateID
        } else {
            // The compiler lays the prefix out as the two highest IDs.
            self.nfa.start_unanchored() - 1
        };
        current.iter().any(|&id| {
            id < machinery_low && self.fresh_start.binary_search(&id).is_err()
        })
    }

    /// Full acceleration detection: compute the `move` of every equivalence
    /// class and collect the bytes of the classes that leave the state.
    /// Expensive, so reserved for long-lived states (the start states).
    pub(crate) fn accel_full(
        &mut self,
        current: &[nfa::StateID],
        from_word: bool,
        classes: &ByteClasses,
    ) -> Option<Accel> {
        let mut bytes = [0u8; accel::MAX_ACCEL_BYTES];
        let mut len = 0;
        let mut buf = pool::get();
        for (class, rep) in classes.representatives().enumerate() {
            self.next_set(current, from_word, rep, &mut buf);
            if buf.is_empty() {
                // Dead: staying put is exactly what acceleration assumes.
                continue;
            }
            let next_from_word =
                self.has_word_boundary && is_word_byte(rep);
            if buf.as_slice() == current && next_from_word == from_word {
                continue;
            }
            for byte in classes.elements(class as u8) {
                if len == accel::MAX_ACCEL_BYTES {
                    pool::put(buf);
                    return None;
                }
                bytes[len] = byte;
                len += 1;
            }
        }
        pool::put(buf);
        if len == 0 {
            return None;
        }
        Some(Accel::new(&bytes[..len]))
    }
}

/// Compute the epsilon closure of `start` under the given look-set into
/// `set`, leaving states already present untouched. Word boundary edges are
/// never followed here; their `Look` states are simply retained in the set
/// for later resolution.
pub(crate) fn epsilon_closure(
    nfa: &NFA,
    start: nfa::StateID,
    look: LookSet,
    stack: &mut Vec<nfa::StateID>,
    set: &mut SparseSet,
) {
    debug_assert!(stack.is_empty());
    stack.push(start);
    while let Some(id) = stack.pop() {
        if !set.insert(id) {
            continue;
        }
        match *nfa.state(id) {
            NfaState::Epsilon { next } => stack.push(next),
            NfaState::Capture { next, .. } => stack.push(next),
            NfaState::Split { left, right } => {
                stack.push(right);
                stack.push(left);
            }
            NfaState::Look { look: assertion, next } => {
                if !assertion.is_word_boundary() && look.contains(assertion) {
                    stack.push(next);
                }
            }
            NfaState::ByteRange { .. }
            | NfaState::Sparse { .. }
            | NfaState::Match => {}
        }
    }
}

/// Follow the byte transitions of a single NFA state and close over the
/// targets.
fn byte_step(
    nfa: &NFA,
    id: nfa::StateID,
    byte: u8,
    look: LookSet,
    stack: &mut Vec<nfa::StateID>,
    out: &mut SparseSet,
) {
    match *nfa.state(id) {
        NfaState::ByteRange { trans } => {
            if trans.matches(byte) {
                epsilon_closure(nfa, trans.next, look, stack, out);
            }
        }
        NfaState::Sparse { ref transitions } => {
            for t in transitions.iter() {
                if t.matches(byte) {
                    epsilon_closure(nfa, t.next, look, stack, out);
                }
            }
        }
        _ => {}
    }
}

/// Resolve the word boundary assertions of a subset against a known
/// satisfied/unsatisfied verdict.
///
/// The output set receives the entire input subset, plus everything
/// reachable from the targets of crossable boundary edges through epsilon,
/// split, capture and further boundary edges. Non-boundary look edges stop
/// the expansion (their `Look` states are retained unresolved), and the
/// expansion never re-enters the input subset since those states are
/// already present.
pub(crate) fn resolve_word_boundary(
    nfa: &NFA,
    current: &[nfa::StateID],
    satisfied: bool,
    stack: &mut Vec<nfa::StateID>,
    set: &mut SparseSet,
) {
    debug_assert!(stack.is_empty());
    let crossable = |look: Look| match look {
        Look::WordBoundary => satisfied,
        Look::NotWordBoundary => !satisfied,
        _ => false,
    };
    for &id in current {
        set.insert(id);
    }
    for &id in current {
        if let NfaState::Look { look, next } = *nfa.state(id) {
            if crossable(look) {
                stack.push(next);
            }
        }
    }
    while let Some(id) = stack.pop() {
        if !set.insert(id) {
            continue;
        }
        match *nfa.state(id) {
            NfaState::Epsilon { next } => stack.push(next),
            NfaState::Capture { next, .. } => stack.push(next),
            NfaState::Split { left, right } => {
                stack.push(right);
                stack.push(left);
            }
            NfaState::Look { look, next } => {
                if crossable(look) {
                    stack.push(next);
                }
            }
            NfaState::ByteRange { .. }
            | NfaState::Sparse { .. }
            | NfaState::Match => {}
        }
    }
}
