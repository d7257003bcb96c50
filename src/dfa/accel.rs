/*!
Acceleration of "mostly self-looping" DFA states.

A state like the interior of `[^a]*a` spends almost all of its time
transitioning to itself. When at most three raw byte values can take such a
state anywhere interesting, scanning byte-at-a-time is a waste: a vectorized
memchr over those exit bytes lands on the next position worth looking at and
everything skipped is guaranteed to have stayed in place.

Soundness hinges on the exit set being computed over *bytes*, not classes.
The transition table is class-indexed, and a class with several member bytes
can only be hunted by memchr if every member is in the needle set. So exit
classes are expanded to their member bytes and acceleration is declined when
the expansion overflows three.
*/

use crate::{
    dfa::state::{LazyStateID, State, DEAD, INVALID},
    util::{alphabet::ByteClasses, memchr},
};

/// The maximum number of exit bytes: one each for memchr1/2/3.
pub(crate) const MAX_ACCEL_BYTES: usize = 3;

/// How much of a state's transition row must be populated before the
/// cached-transitions heuristic is willing to judge it, and how many
/// unpopulated slots it will tolerate (treating each as an exit). Tuning
/// knobs; the defaults insist on near-complete information.
const MIN_CACHED_FRACTION: f64 = 0.94;
const MAX_UNCACHED_SLOTS: usize = 1;

/// The exit byte set of an accelerable state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Accel {
    bytes: [u8; MAX_ACCEL_BYTES],
    len: u8,
}

impl Accel {
    pub(crate) fn new(bytes: &[u8]) -> Accel {
        assert!(
            !bytes.is_empty() && bytes.len() <= MAX_ACCEL_BYTES,
            "accelerator needs 1 to {} bytes",
            MAX_ACCEL_BYTES,
        );
        let mut accel = Accel { bytes: [0; MAX_ACCEL_BYTES], len: bytes.len() as u8 };
        accel.bytes[..bytes.len()].copy_from_slice(bytes);
        accel
    }

    /// Find the next occurrence of any exit byte at or after `at`,
    /// returning its absolute position.
    #[inline]
    pub(crate) fn find(&self, haystack: &[u8], at: usize) -> Option<usize> {
        let found = match *self.needles() {
            [b0] => memchr::memchr(b0, &haystack[at..]),
            [b0, b1] => memchr::memchr2(b0, b1, &haystack[at..]),
            [b0, b1, b2] => memchr::memchr3(b0, b1, b2, &haystack[at..]),
            _ => unreachable!("accelerator byte count out of range"),
        };
        found.map(|i| at + i)
    }

    fn needles(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// Judge a state's accelerability from its cached transitions alone.
///
/// Returns `None` when too little of the transition row is populated to
/// decide either way; the caller should try again once more transitions
/// have been determinized. Otherwise returns the definitive verdict:
/// `Some(Some(..))` with the exit bytes, or `Some(None)` for a state that
/// does not qualify. Unpopulated slots (at most one is tolerated) are
/// conservatively treated as exits, which can only make the accelerator
/// stop early, never skip past something it should have seen.
pub(crate) fn from_cached(
    state: &State,
    classes: &ByteClasses,
    sid: LazyStateID,
) -> Option<Option<Accel>> {
    let alphabet_len = state.alphabet_len();
    let uncached = alphabet_len - state.trans_count();
    if uncached > MAX_UNCACHED_SLOTS {
        return None;
    }
    if (state.trans_count() as f64)
        < MIN_CACHED_FRACTION * alphabet_len as f64
    {
        return None;
    }
    let mut bytes = [0u8; MAX_ACCEL_BYTES];
    let mut len = 0;
    for class in 0..alphabet_len {
        let next = state.transition(class);
        let is_exit = next == INVALID || (next != DEAD && next != sid);
        if !is_exit {
            continue;
        }
        for byte in classes.elements(class as u8) {
            if len == MAX_ACCEL_BYTES {
                return Some(None);
            }
            bytes[len] = byte;
            len += 1;
        }
    }
    if len == 0 {
        // Nothing ever leaves this state. Technically a candidate for
        // skipping straight to end of input, but there is no needle to
        // hand to memchr, and such states are vanishingly rare.
        return Some(None);
    }
    Some(Some(Accel::new(&bytes[..len])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{nfa::NFA, util::alphabet::ByteClassSet};

    #[test]
    fn finds_exit_bytes() {
        let accel = Accel::new(b"a");
        assert_eq!(accel.find(b"xxxayy", 0), Some(3));
        assert_eq!(accel.find(b"xxxayy", 4), None);

        let accel = Accel::new(b"ab");
        assert_eq!(accel.find(b"xxbxa", 0), Some(2));

        let accel = Accel::new(b"abc");
        assert_eq!(accel.find(b"zzzc", 1), Some(3));
        assert_eq!(accel.find(b"zzz", 0), None);
    }

    fn classes_for(ranges: &[(u8, u8)]) -> ByteClasses {
        let mut set = ByteClassSet::empty();
        for &(s, e) in ranges {
            set.set_range(s, e);
        }
        set.byte_classes()
    }

    #[test]
    fn judges_from_cached_transitions() {
        let nfa = NFA::new("a").unwrap();
        let classes = classes_for(&[(b'a', b'a')]);
        let alphabet_len = classes.alphabet_len();
        assert_eq!(alphabet_len, 3);

        // Not enough cached yet: abstain.
        let state = State::new(&nfa, &[0], false, alphabet_len);
        assert_eq!(from_cached(&state, &classes, 5), None);

        // Self-loops everywhere except the class of 'a': accelerable on
        // exactly the byte 'a'.
        let mut state = State::new(&nfa, &[0], false, alphabet_len);
        for class in 0..alphabet_len {
            state.set_transition(class, 5);
        }
        state.set_transition(classes.get(b'a') as usize, 7);
        let accel = from_cached(&state, &classes, 5).unwrap().unwrap();
        assert_eq!(accel.needles(), b"a");

        // A wide exit class cannot be hunted by memchr: decline.
        let mut state = State::new(&nfa, &[0], false, alphabet_len);
        for class in 0..alphabet_len {
            state.set_transition(class, 5);
        }
        let wide = classes.get(b'z') as usize;
        state.set_transition(wide, 7);
        assert_eq!(from_cached(&state, &classes, 5), Some(None));
    }

    #[test]
    fn uncached_slot_counts_as_exit() {
        // One missing slot is only tolerable when the alphabet is large
        // enough for the rest to clear the 94% bar, so build a fine-grained
        // alphabet out of singleton classes.
        let nfa = NFA::new("a").unwrap();
        let ranges: Vec<(u8, u8)> = (b'0'..=b'9')
            .chain(b'a'..=b'j')
            .map(|b| (b, b))
            .collect();
        let classes = classes_for(&ranges);
        let alphabet_len = classes.alphabet_len();
        assert!(alphabet_len >= 17);

        // Everything self-loops except the class of 'a', which was never
        // determinized. The uncached slot must be treated as an exit.
        let mut state = State::new(&nfa, &[0], false, alphabet_len);
        for class in 0..alphabet_len {
            if class != classes.get(b'a') as usize {
                state.set_transition(class, 5);
            }
        }
        let accel = from_cached(&state, &classes, 5).unwrap().unwrap();
        assert_eq!(accel.needles(), b"a");
    }

    #[test]
    fn dead_transitions_are_not_exits() {
        let nfa = NFA::new("a").unwrap();
        let classes = classes_for(&[(b'a', b'a')]);
        let alphabet_len = classes.alphabet_len();

        let mut state = State::new(&nfa, &[0], false, alphabet_len);
        for class in 0..alphabet_len {
            state.set_transition(class, DEAD);
        }
        state.set_transition(classes.get(b'a') as usize, 7);
        let accel = from_cached(&state, &classes, 5).unwrap().unwrap();
        assert_eq!(accel.needles(), b"a");
    }
}
