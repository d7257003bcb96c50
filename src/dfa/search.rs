/*!
The search loops. Forward leftmost-longest, forward earliest, forward
anchored, reverse, reverse-limited and the prefilter-coupled variant all
share one skeleton: fetch a context-appropriate start state, take one cached
transition per byte (determinizing on demand), watch for the `DEAD`
sentinel, and finish with the end-of-input check. They differ only in start
selection, scan direction, match bookkeeping and termination.

Errors returned from here are always fallback-class: the public wrappers in
`dfa::mod` translate them into a PikeVM run over the same absolute
positions, so callers never observe them.
*/

use crate::{
    dfa::{
        accel,
        start::Start,
        state::DEAD,
        ReverseLimited, DFA,
    },
    error::Error,
    util::is_word_byte,
};

/// Forward scan. `earliest` stops at the first match state; `anchored`
/// starts without the implicit prefix; `prefiltered` re-queries the
/// prefilter whenever the scan drains back to the canonical start state.
pub(crate) fn find_fwd(
    dfa: &mut DFA,
    h: &[u8],
    at: usize,
    earliest: bool,
    anchored: bool,
    prefiltered: bool,
) -> Result<Option<usize>, Error> {
    if at > h.len() {
        return Ok(None);
    }
    // A pattern with a mandatory \A prefix can only match at position 0.
    if dfa.nfa.is_always_anchored() && at > 0 {
        return Ok(None);
    }
    let kind = Start::from_position_fwd(h, at);
    let mut sid = dfa.start_id(kind, anchored)?;
    let mut last_match = None;
    if dfa.cache.state(sid).is_match() {
        // Empty match at the starting position.
        last_match = Some(at);
        if earliest {
            return Ok(last_match);
        }
    }
    let mut committed = last_match.is_some();
    let has_wb = dfa.determinizer.has_word_boundary();
    let mut pos = at;
    while pos < h.len() {
        // Acceleration. Disabled for NFAs with word boundaries: those need
        // the per-byte boundary pre-check below, which a skip would jump
        // over.
        if !has_wb {
            let accel = {
                let DFA { ref mut cache, ref classes, .. } = *dfa;
                let state = cache.state_mut(sid);
                if !state.accel_checked() {
                    if let Some(verdict) =
                        accel::from_cached(state, classes, sid)
                    {
                        state.set_accel(verdict);
                    }
                }
                state.accel()
            };
            if let Some(accel) = accel {
                match accel.find(h, pos) {
                    Some(next_pos) => {
                        if next_pos > pos && dfa.cache.state(sid).is_match()
                        {
                            // Self-looping in a match state: every skipped
                            // byte extended the match.
                            last_match = Some(next_pos);
                            committed = true;
                        }
                        pos = next_pos;
                    }
                    None => {
                        // No exit byte remains; the state holds to the end
                        // of the haystack.
                        pos = h.len();
                        if dfa.cache.state(sid).is_match() {
                            last_match = Some(pos);
                            committed = true;
                        }
                        break;
                    }
                }
            }
        }
        // Unrolled fast path: plain transitions only, checked four at a
        // time. Bails to the byte-at-a-time path on anything special.
        if !has_wb
            && !committed
            && dfa.cache.state(sid).accel().is_none()
            && pos + 4 <= h.len()
        {
            macro_rules! step {
                ($label:lifetime) => {{
                    let class = dfa.classes.get(h[pos]) as usize;
                    let next = dfa.cache.state(sid).transition(class);
                    if next >= DEAD {
                        break $label;
                    }
                    sid = next;
                    pos += 1;
                    if dfa.cache.state(sid).is_match() {
                        last_match = Some(pos);
                        committed = true;
                        if earliest {
                            return Ok(last_match);
                        }
                        break $label;
                    }
                }};
            }
            'unroll: while pos + 4 <= h.len() {
                step!('unroll);
                step!('unroll);
                step!('unroll);
                step!('unroll);
            }
            if pos >= h.len() {
                break;
            }
        }
        // Word-boundary pre-check: a match that ends on a boundary right
        // here would be silently dropped by the transition (the accept
        // reached through \b has no byte edge), so probe for it first.
        if has_wb {
            let byte = h[pos];
            let resolves = {
                let DFA { ref mut determinizer, ref cache, .. } = *dfa;
                let state = cache.state(sid);
                if state.is_match() {
                    false
                } else {
                    let satisfied =
                        state.is_from_word() != is_word_byte(byte);
                    determinizer.boundary_resolves_to_match(
                        state.nfa_states(),
                        satisfied,
                    )
                }
            };
            if resolves {
                last_match = Some(pos);
                committed = true;
                if earliest {
                    return Ok(last_match);
                }
            }
        }
        // The transition itself.
        let byte = h[pos];
        let next = dfa.next_state(sid, byte)?;
        if next == DEAD {
            return Ok(last_match);
        }
        sid = next;
        pos += 1;
        if dfa.cache.state(sid).is_match() {
            last_match = Some(pos);
            committed = true;
            if earliest {
                return Ok(last_match);
            }
        } else if committed {
            // Once committed, the scan only continues for the sake of a
            // longer match. If every remaining thread is a fresh restart
            // (or prefix machinery), no such match can materialize.
            let DFA { ref determinizer, ref cache, .. } = *dfa;
            if !determinizer.has_in_progress(cache.state(sid).nfa_states())
            {
                return Ok(last_match);
            }
        } else if prefiltered && sid == 0 {
            // Drained back to the canonical start with nothing committed:
            // let the prefilter skip the scan ahead to the next candidate.
            match dfa.prefilter_find(h, pos) {
                None => return Ok(None),
                Some(c) if c > pos => {
                    pos = c;
                    let kind = Start::from_position_fwd(h, pos);
                    sid = dfa.start_id(kind, false)?;
                }
                Some(_) => {}
            }
        }
    }
    if dfa.eoi_fwd_is_match(sid) {
        return Ok(Some(h.len()));
    }
    Ok(last_match)
}

/// Forward scan that first consults the prefilter. Complete prefilters
/// answer directly; incomplete ones position the main loop at the first
/// candidate.
pub(crate) fn find_fwd_prefiltered(
    dfa: &mut DFA,
    h: &[u8],
    at: usize,
) -> Result<Option<usize>, Error> {
    let c = match dfa.prefilter_find(h, at) {
        None => return Ok(None),
        Some(c) => c,
    };
    if let Some(len) = dfa.prefilter_complete_len() {
        return Ok(Some(c + len));
    }
    find_fwd(dfa, h, c, false, false, true)
}

/// Prefiltered `is_match`: anchored earliest verification at each candidate
/// position. Sound because the prefilter literal is a mandatory prefix of
/// every match.
pub(crate) fn is_match_prefiltered(
    dfa: &mut DFA,
    h: &[u8],
    at: usize,
) -> Result<bool, Error> {
    let mut at = at;
    while let Some(c) = dfa.prefilter_find(h, at) {
        if dfa.prefilter_complete_len().is_some() {
            return Ok(true);
        }
        if find_fwd(dfa, h, c, true, true, false)?.is_some() {
            return Ok(true);
        }
        at = c + 1;
    }
    Ok(false)
}

/// Reverse scan over `h[start..end]`, reporting the smallest match start.
/// No acceleration and no word-boundary pre-check apply here; reverse
/// scans exist to find match starts, and the unroll already covers the
/// common case.
pub(crate) fn find_rev(
    dfa: &mut DFA,
    h: &[u8],
    start: usize,
    end: usize,
    earliest: bool,
) -> Result<Option<usize>, Error> {
    let end = end.min(h.len());
    if start > end {
        return Ok(None);
    }
    let kind = Start::from_position_rev(h, end);
    let mut sid = dfa.start_id(kind, false)?;
    let mut last_match = None;
    if dfa.cache.state(sid).is_match() {
        last_match = Some(end);
        if earliest {
            return Ok(last_match);
        }
    }
    let mut pos = end;
    while pos > start {
        if pos >= start + 4 {
            macro_rules! step {
                ($label:lifetime) => {{
                    let class = dfa.classes.get(h[pos - 1]) as usize;
                    let next = dfa.cache.state(sid).transition(class);
                    if next >= DEAD {
                        break $label;
                    }
                    sid = next;
                    pos -= 1;
                    if dfa.cache.state(sid).is_match() {
                        last_match = Some(pos);
                        if earliest {
                            return Ok(last_match);
                        }
                        break $label;
                    }
                }};
            }
            'unroll: while pos >= start + 4 {
                step!('unroll);
                step!('unroll);
                step!('unroll);
                step!('unroll);
            }
            if pos == start {
                break;
            }
        }
        let byte = h[pos - 1];
        let next = dfa.next_state(sid, byte)?;
        if next == DEAD {
            return Ok(last_match);
        }
        sid = next;
        pos -= 1;
        if dfa.cache.state(sid).is_match() {
            last_match = Some(pos);
            if earliest {
                return Ok(last_match);
            }
        }
    }
    if dfa.eoi_rev_is_match(sid, h, start) {
        return Ok(Some(start));
    }
    Ok(last_match)
}

/// Reverse scan with an anti-quadratic floor. The scan refuses to go below
/// `min_start`; if it gets cut off there with the automaton still alive and
/// no match recorded, the caller is told to switch strategy instead of
/// rescanning the same prefix over and over.
pub(crate) fn find_rev_limited(
    dfa: &mut DFA,
    h: &[u8],
    start: usize,
    end: usize,
    min_start: usize,
) -> Result<ReverseLimited, Error> {
    let end = end.min(h.len());
    if start > end {
        return Ok(ReverseLimited::NoMatch);
    }
    let floor = min_start.max(start).min(end);
    let kind = Start::from_position_rev(h, end);
    let mut sid = dfa.start_id(kind, false)?;
    let mut last_match = None;
    if dfa.cache.state(sid).is_match() {
        last_match = Some(end);
    }
    let mut pos = end;
    while pos > floor {
        let byte = h[pos - 1];
        let next = dfa.next_state(sid, byte)?;
        if next == DEAD {
            return Ok(match last_match {
                Some(s) => ReverseLimited::Match(s),
                None => ReverseLimited::NoMatch,
            });
        }
        sid = next;
        pos -= 1;
        if dfa.cache.state(sid).is_match() {
            last_match = Some(pos);
        }
    }
    if floor == start {
        if dfa.eoi_rev_is_match(sid, h, start) {
            return Ok(ReverseLimited::Match(start));
        }
        return Ok(match last_match {
            Some(s) => ReverseLimited::Match(s),
            None => ReverseLimited::NoMatch,
        });
    }
    // Cut off at the floor with live states and nothing found: the caller
    // must not keep paying for ever-longer rescans.
    Ok(match last_match {
        Some(s) => ReverseLimited::Match(s),
        None => ReverseLimited::Quadratic,
    })
}
