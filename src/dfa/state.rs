use crate::{
    dfa::accel::Accel,
    nfa::{self, NFA},
};

/// An identifier for a lazily built DFA state.
///
/// Identifiers are densely allocated: the canonical start state is always
/// `0` and every state minted afterwards gets the next integer, so the
/// identifier doubles as an index into the cache's state array. Two sentinel
/// values are carved out of the top of the space. Keeping both sentinels
/// above every legitimate identifier lets the hot transition loop detect
/// "something special happened" with a single comparison against `DEAD`.
pub type LazyStateID = u32;

/// A transition that has not been computed yet. Following it triggers
/// determinization.
pub const INVALID: LazyStateID = LazyStateID::MAX;

/// A transition into the dead state: no sequence of future input can lead
/// to a match. The dead state is never materialized as a `State`; it exists
/// only as this sentinel stored in transition slots.
pub const DEAD: LazyStateID = LazyStateID::MAX - 1;

/// A lazily built DFA state: one subset of NFA states plus the word-context
/// flag, with a transition row indexed by byte equivalence class.
#[derive(Clone, Debug)]
pub(crate) struct State {
    /// Transition row, `alphabet_len` slots of `LazyStateID`. A slot holds
    /// `INVALID` until the corresponding class has been determinized.
    trans: Vec<LazyStateID>,
    /// The NFA states this DFA state stands for, sorted ascending. Together
    /// with `is_from_word` this is the state's identity.
    nfa_states: Vec<nfa::StateID>,
    /// Whether this subset contains an NFA match state.
    is_match: bool,
    /// Whether this state was entered by consuming a word byte. This is the
    /// previous-byte context used to resolve `\b`/`\B` on the next
    /// transition. Always false when the NFA has no word boundaries, so an
    /// inert flag never splits otherwise-equal subsets.
    is_from_word: bool,
    /// How many slots of `trans` are populated. Drives the "have we cached
    /// enough to judge acceleration" heuristic.
    trans_count: usize,
    /// Exit bytes for accelerated scanning, when this state qualifies.
    accel: Option<Accel>,
    /// Whether acceleration detection has run for this state, so the search
    /// loop does not re-derive a negative verdict on every visit.
    accel_checked: bool,
}

impl State {
    pub(crate) fn new(
        nfa: &NFA,
        nfa_states: &[nfa::StateID],
        is_from_word: bool,
        alphabet_len: usize,
    ) -> State {
        debug_assert!(nfa_states.windows(2).all(|w| w[0] < w[1]));
        let is_match = nfa_states.iter().any(|&id| nfa.is_match(id));
        State {
            trans: vec![INVALID; alphabet_len],
            nfa_states: nfa_states.to_vec(),
            is_match,
            is_from_word,
            trans_count: 0,
            accel: None,
            accel_checked: false,
        }
    }

    /// The cached transition for the given equivalence class. `INVALID`
    /// means not yet determinized.
    #[inline(always)]
    pub(crate) fn transition(&self, class: usize) -> LazyStateID {
        self.trans[class]
    }

    /// Record the transition for the given class.
    #[inline]
    pub(crate) fn set_transition(&mut self, class: usize, to: LazyStateID) {
        if self.trans[class] == INVALID {
            self.trans_count += 1;
        }
        self.trans[class] = to;
    }

    #[inline(always)]
    pub(crate) fn is_match(&self) -> bool {
        self.is_match
    }

    #[inline(always)]
    pub(crate) fn is_from_word(&self) -> bool {
        self.is_from_word
    }

    #[inline]
    pub(crate) fn nfa_states(&self) -> &[nfa::StateID] {
        &self.nfa_states
    }

    #[inline]
    pub(crate) fn alphabet_len(&self) -> usize {
        self.trans.len()
    }

    #[inline]
    pub(crate) fn trans_count(&self) -> usize {
        self.trans_count
    }

    #[inline(always)]
    pub(crate) fn accel(&self) -> Option<Accel> {
        self.accel
    }

    #[inline]
    pub(crate) fn accel_checked(&self) -> bool {
        self.accel_checked
    }

    /// Record the verdict of acceleration detection.
    #[inline]
    pub(crate) fn set_accel(&mut self, accel: Option<Accel>) {
        self.accel = accel;
        self.accel_checked = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::NFA;

    #[test]
    fn transition_bookkeeping() {
        let nfa = NFA::new("abc").unwrap();
        let mut state = State::new(&nfa, &[0, 1, 2], false, 4);
        assert_eq!(state.transition(0), INVALID);
        assert_eq!(state.trans_count(), 0);

        state.set_transition(0, 7);
        state.set_transition(2, DEAD);
        assert_eq!(state.transition(0), 7);
        assert_eq!(state.transition(2), DEAD);
        assert_eq!(state.trans_count(), 2);

        // Overwriting a populated slot must not double count.
        state.set_transition(0, 9);
        assert_eq!(state.trans_count(), 2);
    }

    #[test]
    fn match_flag_follows_subset() {
        let nfa = NFA::new("a").unwrap();
        let match_id = (0..nfa.len() as u32)
            .find(|&id| nfa.is_match(id))
            .unwrap();
        let state = State::new(&nfa, &[0], false, 2);
        assert!(!state.is_match());
        let state = State::new(&nfa, &[0, match_id], false, 2);
        assert!(state.is_match());
    }

    #[test]
    fn sentinels_are_above_all_ids() {
        assert!(DEAD > 0);
        assert!(INVALID > DEAD);
        // The unrolled loop relies on a single comparison catching both.
        for special in [DEAD, INVALID] {
            assert!(special >= DEAD);
        }
    }
}
