/*!
A PikeVM: thread-based simulation of the NFA, used as the correctness
fallback when lazy determinization gives up (cache thrashing, state blowup,
or a mid-search cache clear).

The simulation is deliberately boring: two sparse thread lists, an explicit
stack for epsilon closure, and a spawn of a fresh thread at every position
for unanchored searches. What it is *not* free to be boring about is
semantics: every answer must be byte-for-byte identical to what the lazy DFA
would have produced with an unbounded cache, because callers switch engines
mid-search. That pins down three things:

- Look-around evaluation follows the DFA's resolution rules, not textbook
  multiline rules. In particular `$` and `\z` hold only at the end of the
  haystack, and `^` holds at position 0 or after a `\n` (never after `\r`).
- The match end is the last position at which the live thread set contained
  the match state, exactly like the DFA's `last_match` tracking across
  implicit-prefix restarts.
- The scan stops early under the same condition as the DFA: a match has
  been recorded and no live thread is "in progress" (everything left is a
  fresh restart). Without this, a later-starting match would wrongly extend
  the reported end.
*/

use core::mem;

use std::sync::Arc;

use crate::{
    dfa::determinize::epsilon_closure,
    nfa::{State, StateID, NFA},
    util::{
        is_word_byte,
        look::{Look, LookSet},
        sparse_set::SparseSet,
    },
};

/// An NFA simulation with scratch thread lists.
///
/// Like the DFA, a `PikeVm` is cheap to construct but holds mutable scratch
/// space, so it cannot be shared across concurrent searches. The NFA behind
/// it can.
#[derive(Clone, Debug)]
pub struct PikeVm {
    nfa: Arc<NFA>,
    /// The identifier of the NFA's single match state.
    match_id: StateID,
    /// The epsilon closure of the anchored start under no assertions,
    /// sorted: the thread states that mean "a match attempt just began".
    fresh_start: Vec<StateID>,
    /// The lowest identifier of the implicit-prefix machinery, or the
    /// state count when the NFA is always anchored and has none.
    machinery_low: StateID,
    curr: ThreadList,
    next: ThreadList,
    stack: Vec<StateID>,
}

#[derive(Clone, Debug)]
struct ThreadList {
    set: SparseSet,
    /// The position at which the thread occupying each NFA state was
    /// spawned. Only meaningful for states currently in `set`. Forward
    /// searches report it as the match start; reverse searches ignore it.
    spawns: Vec<usize>,
}

impl ThreadList {
    fn new(len: usize) -> ThreadList {
        ThreadList { set: SparseSet::new(len), spawns: vec![0; len] }
    }

    fn clear(&mut self) {
        self.set.clear();
    }
}

impl PikeVm {
    /// Create a new simulation over the given NFA.
    pub fn new(nfa: Arc<NFA>) -> PikeVm {
        let len = nfa.len();
        let match_id = nfa
            .states()
            .iter()
            .position(|s| matches!(*s, State::Match))
            .expect("compiled NFA always has a match state")
            as StateID;
        let mut stack = vec![];
        let mut set = SparseSet::new(len);
        epsilon_closure(
            &nfa,
            nfa.start_anchored(),
            LookSet::empty(),
            &mut stack,
            &mut set,
        );
        let mut fresh_start: Vec<StateID> = set.iter().copied().collect();
        fresh_start.sort_unstable();
        let machinery_low = if nfa.is_always_anchored() {
            len as StateID
        } else {
            nfa.start_unanchored() - 1
        };
        PikeVm {
            nfa,
            match_id,
            fresh_start,
            machinery_low,
            curr: ThreadList::new(len),
            next: ThreadList::new(len),
            stack,
        }
    }

    /// Find the span of a match, scanning the whole haystack.
    pub fn search(&mut self, haystack: &[u8]) -> Option<(usize, usize)> {
        self.search_at(haystack, 0)
    }

    /// Find the span of a match, scanning from `at`. Positions in the
    /// result are absolute with respect to `haystack`, which is what lets
    /// the DFA hand over a search mid-scan without any coordinate fixups.
    pub fn search_at(
        &mut self,
        haystack: &[u8],
        at: usize,
    ) -> Option<(usize, usize)> {
        self.search_fwd(haystack, at, false, false)
    }

    /// Like `search_at`, but the match must begin exactly at `at`.
    pub fn search_at_anchored(
        &mut self,
        haystack: &[u8],
        at: usize,
    ) -> Option<(usize, usize)> {
        self.search_fwd(haystack, at, true, false)
    }

    /// Whether any match begins at or after `at`. Stops at the first match
    /// state reached.
    pub fn is_match_at(&mut self, haystack: &[u8], at: usize) -> bool {
        self.search_fwd(haystack, at, false, true).is_some()
    }

    /// Scan backward through `haystack[start..end]` and return the smallest
    /// match start found, in forward coordinates.
    pub fn search_reverse(
        &mut self,
        haystack: &[u8],
        start: usize,
        end: usize,
    ) -> Option<usize> {
        self.search_rev(haystack, start, end, false)
    }

    /// Like `search_reverse`, but stops at the first match state reached.
    pub fn is_match_reverse(
        &mut self,
        haystack: &[u8],
        start: usize,
        end: usize,
    ) -> bool {
        self.search_rev(haystack, start, end, true).is_some()
    }

    /// Whether any live thread is neither a fresh restart nor prefix
    /// machinery. Mirrors the DFA's liveness test for leftmost-longest
    /// termination.
    fn has_in_progress(&self, list: &ThreadList) -> bool {
        list.set.iter().any(|&id| {
            id < self.machinery_low
                && self.fresh_start.binary_search(&id).is_err()
        })
    }

    fn search_fwd(
        &mut self,
        h: &[u8],
        at: usize,
        anchored: bool,
        earliest: bool,
    ) -> Option<(usize, usize)> {
        if at > h.len() {
            return None;
        }
        let start = self.nfa.start_anchored();
        self.curr.clear();
        let mut best: Option<(usize, usize)> = None;
        let mut pos = at;
        loop {
            // Unanchored searches spawn a fresh thread at every position,
            // which is precisely what the DFA's implicit prefix does.
            // Threads already in the list claimed their states earlier and
            // therefore have smaller spawns; the sparse set keeps them.
            if !anchored || pos == at {
                let PikeVm {
                    ref nfa, ref mut stack, ref mut curr, ..
                } = *self;
                add_fwd(nfa, stack, curr, start, pos, pos, h);
            }
            if self.curr.set.contains(self.match_id) {
                let claimer = self.curr.spawns[self.match_id as usize];
                best = Some((claimer, pos));
                if earliest {
                    break;
                }
            } else if best.is_some() && !self.has_in_progress(&self.curr) {
                // Committed, and everything still alive is a fresh
                // restart: no longer match can materialize.
                break;
            }
            if pos >= h.len() {
                break;
            }
            if anchored && self.curr.set.is_empty() {
                break;
            }
            let byte = h[pos];
            let PikeVm {
                ref nfa, ref mut stack, ref mut curr, ref mut next, ..
            } = *self;
            next.clear();
            for &id in curr.set.iter() {
                let spawn = curr.spawns[id as usize];
                match *nfa.state(id) {
                    State::ByteRange { trans } => {
                        if trans.matches(byte) {
                            add_fwd(
                                nfa,
                                stack,
                                next,
                                trans.next,
                                spawn,
                                pos + 1,
                                h,
                            );
                        }
                    }
                    State::Sparse { ref transitions } => {
                        for t in transitions.iter() {
                            if t.matches(byte) {
                                add_fwd(
                                    nfa,
                                    stack,
                                    next,
                                    t.next,
                                    spawn,
                                    pos + 1,
                                    h,
                                );
                            }
                        }
                    }
                    _ => {}
                }
            }
            mem::swap(curr, next);
            pos += 1;
        }
        best
    }

    fn search_rev(
        &mut self,
        h: &[u8],
        start: usize,
        end: usize,
        earliest: bool,
    ) -> Option<usize> {
        let end = end.min(h.len());
        if start > end {
            return None;
        }
        let nfa_start = self.nfa.start_anchored();
        self.curr.clear();
        let mut best: Option<usize> = None;
        let mut pos = end;
        loop {
            {
                let PikeVm {
                    ref nfa, ref mut stack, ref mut curr, ..
                } = *self;
                add_rev(nfa, stack, curr, nfa_start, pos, h, start);
            }
            if self.curr.set.contains(self.match_id) {
                // Positions only shrink, so every hit improves on the
                // last: the reverse scan wants the smallest start.
                best = Some(pos);
                if earliest {
                    break;
                }
            }
            if pos <= start {
                break;
            }
            let byte = h[pos - 1];
            let PikeVm {
                ref nfa, ref mut stack, ref mut curr, ref mut next, ..
            } = *self;
            next.clear();
            for &id in curr.set.iter() {
                match *nfa.state(id) {
                    State::ByteRange { trans } => {
                        if trans.matches(byte) {
                            add_rev(
                                nfa,
                                stack,
                                next,
                                trans.next,
                                pos - 1,
                                h,
                                start,
                            );
                        }
                    }
                    State::Sparse { ref transitions } => {
                        for t in transitions.iter() {
                            if t.matches(byte) {
                                add_rev(
                                    nfa,
                                    stack,
                                    next,
                                    t.next,
                                    pos - 1,
                                    h,
                                    start,
                                );
                            }
                        }
                    }
                    _ => {}
                }
            }
            mem::swap(curr, next);
            pos -= 1;
        }
        best
    }
}

/// Add a thread and everything in its epsilon closure to the given list.
/// States already claimed keep their earlier (smaller) spawn.
fn add_fwd(
    nfa: &NFA,
    stack: &mut Vec<StateID>,
    list: &mut ThreadList,
    id: StateID,
    spawn: usize,
    pos: usize,
    h: &[u8],
) {
    stack.push(id);
    while let Some(id) = stack.pop() {
        if !list.set.insert(id) {
            continue;
        }
        list.spawns[id as usize] = spawn;
        match *nfa.state(id) {
            State::Epsilon { next } => stack.push(next),
            State::Capture { next, .. } => stack.push(next),
            State::Split { left, right } => {
                stack.push(right);
                stack.push(left);
            }
            State::Look { look, next } => {
                if look_fwd(look, h, pos) {
                    stack.push(next);
                }
            }
            State::ByteRange { .. }
            | State::Sparse { .. }
            | State::Match => {}
        }
    }
}

fn add_rev(
    nfa: &NFA,
    stack: &mut Vec<StateID>,
    list: &mut ThreadList,
    id: StateID,
    pos: usize,
    h: &[u8],
    floor: usize,
) {
    stack.push(id);
    while let Some(id) = stack.pop() {
        if !list.set.insert(id) {
            continue;
        }
        match *nfa.state(id) {
            State::Epsilon { next } => stack.push(next),
            State::Capture { next, .. } => stack.push(next),
            State::Split { left, right } => {
                stack.push(right);
                stack.push(left);
            }
            State::Look { look, next } => {
                if look_rev(look, h, pos, floor) {
                    stack.push(next);
                }
            }
            State::ByteRange { .. }
            | State::Sparse { .. }
            | State::Match => {}
        }
    }
}

/// Evaluate a look-around assertion at `pos` of a forward scan, using the
/// same resolution rules as the lazy DFA.
fn look_fwd(look: Look, h: &[u8], pos: usize) -> bool {
    match look {
        Look::StartText => pos == 0,
        Look::EndText => pos == h.len(),
        Look::StartLine => pos == 0 || h[pos - 1] == b'\n',
        // The DFA only resolves line ends via its end-of-input check, so a
        // `$` before a mid-haystack `\n` does not hold here either.
        Look::EndLine => pos == h.len(),
        Look::WordBoundary => word_before(h, pos) != word_after(h, pos),
        Look::NotWordBoundary => word_before(h, pos) == word_after(h, pos),
    }
}

/// Evaluate a look-around assertion at `pos` of a reverse scan over a
/// reverse NFA. The table mirrors `look_fwd`: assertions stored as "start"
/// were "end" assertions before reversal and resolve against the right
/// edge, and vice versa. `floor` is the left edge of the scan window; the
/// DFA treats whatever lies below it as non-word, so this does too.
fn look_rev(look: Look, h: &[u8], pos: usize, floor: usize) -> bool {
    match look {
        Look::StartText => pos == h.len(),
        Look::StartLine => pos == h.len() || h[pos] == b'\n',
        Look::EndText => pos == 0,
        // A stored end-of-line is a reversed `^`, which needs the byte the
        // scan has not consumed yet. Like the DFA, it resolves only at the
        // scan floor, through the reverse end-of-input rules.
        Look::EndLine => {
            pos == floor && (pos == 0 || h[pos - 1] == b'\n')
        }
        Look::WordBoundary => {
            (pos > floor && is_word_byte(h[pos - 1])) != word_after(h, pos)
        }
        Look::NotWordBoundary => {
            (pos > floor && is_word_byte(h[pos - 1])) == word_after(h, pos)
        }
    }
}

#[inline(always)]
fn word_before(h: &[u8], pos: usize) -> bool {
    pos > 0 && is_word_byte(h[pos - 1])
}

#[inline(always)]
fn word_after(h: &[u8], pos: usize) -> bool {
    pos < h.len() && is_word_byte(h[pos])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::NFA;

    fn fwd(pattern: &str) -> PikeVm {
        PikeVm::new(NFA::new(pattern).unwrap())
    }

    fn rev(pattern: &str) -> PikeVm {
        PikeVm::new(NFA::new_reverse(pattern).unwrap())
    }

    #[test]
    fn literal() {
        let mut vm = fwd("hello");
        assert_eq!(vm.search(b"say hello world"), Some((4, 9)));
        assert_eq!(vm.search(b"nothing here"), None);
        assert!(vm.is_match_at(b"say hello", 0));
        assert!(!vm.is_match_at(b"say hello", 5));
    }

    #[test]
    fn search_at_is_absolute() {
        let mut vm = fwd("hello");
        assert_eq!(vm.search_at(b"say hello world", 4), Some((4, 9)));
        assert_eq!(vm.search_at(b"say hello world", 5), None);
    }

    #[test]
    fn anchored() {
        let mut vm = fwd("foo");
        assert_eq!(vm.search_at_anchored(b"xfoo", 1), Some((1, 4)));
        assert_eq!(vm.search_at_anchored(b"xfoo", 0), None);
    }

    #[test]
    fn longest_from_same_start() {
        let mut vm = fwd("a+");
        assert_eq!(vm.search(b"xaaay"), Some((1, 4)));
        let mut vm = fwd("ab|abc");
        assert_eq!(vm.search(b"abc"), Some((0, 3)));
    }

    #[test]
    fn later_matches_do_not_extend_the_end() {
        // Once the first match is committed and its threads die, a second
        // occurrence further right must not stretch the reported end.
        let mut vm = fwd("hello");
        assert_eq!(vm.search(b"say hello and hello"), Some((4, 9)));
        let mut vm = fwd("ab|cd");
        assert_eq!(vm.search(b"abXcd"), Some((0, 2)));
    }

    #[test]
    fn restart_matches_advance_the_end() {
        // Mirrors the DFA's last_match tracking: empty-capable patterns
        // keep matching through the implicit prefix restarts, so the
        // reported end is the last position where anything matched.
        let mut vm = fwd("a*");
        assert_eq!(vm.search(b""), Some((0, 0)));
        assert_eq!(vm.search(b"abc"), Some((3, 3)));
    }

    #[test]
    fn line_anchors() {
        let mut vm = fwd("^foo");
        assert_eq!(vm.search(b"foo"), Some((0, 3)));
        assert_eq!(vm.search(b"x\nfoo"), Some((2, 5)));
        assert_eq!(vm.search(b"xfoo"), None);
        assert_eq!(vm.search(b"x\rfoo"), None);

        let mut vm = fwd("foo$");
        assert_eq!(vm.search(b"xfoo"), Some((1, 4)));
        // `$` resolves only at the end of the haystack.
        assert_eq!(vm.search(b"foo\nbar"), None);
    }

    #[test]
    fn text_anchors() {
        let mut vm = fwd(r"\Afoo");
        assert_eq!(vm.search(b"foo bar"), Some((0, 3)));
        assert_eq!(vm.search(b"x\nfoo"), None);
    }

    #[test]
    fn word_boundaries() {
        let mut vm = fwd(r"\bfoo\b");
        assert_eq!(vm.search(b" foo bar"), Some((1, 4)));
        assert_eq!(vm.search(b" xfoox "), None);
        assert_eq!(vm.search(b"foo"), Some((0, 3)));

        let mut vm = fwd(r"\Bfoo");
        assert_eq!(vm.search(b"xfoo"), Some((1, 4)));
        assert_eq!(vm.search(b" foo"), None);
    }

    #[test]
    fn boundary_at_end_of_input() {
        let mut vm = fwd(r"test\b");
        assert_eq!(vm.search(b"test"), Some((0, 4)));
        assert_eq!(vm.search(b"tests"), None);
    }

    #[test]
    fn reverse_finds_match_starts() {
        let mut vm = rev("[a-z]+");
        assert_eq!(vm.search_reverse(b"123abc456", 0, 6), Some(3));
        assert_eq!(vm.search_reverse(b"123abc456", 0, 9), Some(3));
        assert_eq!(vm.search_reverse(b"123456", 0, 6), None);
        assert!(vm.is_match_reverse(b"123abc456", 0, 6));
    }

    #[test]
    fn reverse_optional_prefix() {
        // a?a over "a": the reverse scan's final state must still count.
        let mut vm = rev("a?a");
        assert_eq!(vm.search_reverse(b"a", 0, 1), Some(0));
    }

    #[test]
    fn reverse_anchors() {
        let mut vm = rev(r"\Afoo");
        assert_eq!(vm.search_reverse(b"foo bar", 0, 3), Some(0));
        assert_eq!(vm.search_reverse(b"xfoo", 1, 4), None);
    }
}
