/*!
The lazy DFA itself.

A `DFA` pairs an immutable NFA with everything mutable that a search needs:
the bounded state cache, the start state table, the determinizer scratch and
the PikeVM that takes over when determinization stops paying for itself.
Because every uncached transition mutates the cache, a `DFA` cannot be
shared between concurrent searches; build one per execution context and
share the `Arc<NFA>` behind them instead.

States are referred to by 32-bit identifier everywhere, never by pointer.
The cache owns the states outright and the identifier doubles as an index
into a contiguous array, which is what makes the clear-and-continue
recovery a couple of `Vec::clear` calls instead of a graph traversal.
*/

use core::mem;

use std::sync::Arc;

use log::{debug, trace};

use crate::{
    error::Error,
    nfa::NFA,
    pikevm::PikeVm,
    prefilter::Prefilter,
    util::{
        alphabet::ByteClasses,
        is_word_byte,
        look::{Look, LookSet},
    },
};

use self::{
    cache::{Cache, StateKey},
    determinize::Determinizer,
    start::{Start, StartTable},
    state::{LazyStateID, State, DEAD, INVALID},
};

pub(crate) mod accel;
mod cache;
pub(crate) mod determinize;
mod search;
mod start;
mod state;

pub use self::start::Start as StartKind;

/// How many cache key lookups a search must have made before the adaptive
/// hit-rate fallback is willing to judge it.
const MIN_HIT_RATE_SAMPLES: u64 = 64;

/// The configuration of a lazy DFA.
///
/// All knobs are optional; the getters supply the defaults. Validation
/// happens at DFA construction and surfaces `InvalidConfig`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    max_states: Option<usize>,
    max_cache_clears: Option<usize>,
    cache_hit_threshold: Option<f64>,
    use_prefilter: Option<bool>,
    min_prefilter_len: Option<usize>,
    determinization_limit: Option<usize>,
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    /// The cache capacity, counted in states. When the cache is full it is
    /// cleared whole (up to the clear budget); states are never evicted
    /// individually. Must be at least 1.
    pub fn max_states(mut self, n: usize) -> Config {
        self.max_states = Some(n);
        self
    }

    /// How many times a single search may clear the cache before giving up
    /// and finishing on the PikeVM. Zero disables recovery entirely.
    pub fn max_cache_clears(mut self, n: usize) -> Config {
        self.max_cache_clears = Some(n);
        self
    }

    /// An adaptive fallback: when set above zero, a search whose cache key
    /// hit rate drops below this fraction (after a minimum number of
    /// lookups) is handed to the PikeVM. Zero disables the heuristic.
    pub fn cache_hit_threshold(mut self, rate: f64) -> Config {
        self.cache_hit_threshold = Some(rate);
        self
    }

    /// Whether to couple searches to a literal prefilter when the pattern
    /// admits one.
    pub fn use_prefilter(mut self, yes: bool) -> Config {
        self.use_prefilter = Some(yes);
        self
    }

    /// The minimum literal length admitted to prefilter construction.
    /// Shorter literals hit too often to be worth the round trips.
    pub fn min_prefilter_len(mut self, len: usize) -> Config {
        self.min_prefilter_len = Some(len);
        self
    }

    /// The largest NFA subset a single determinization step may produce.
    /// Exceeding it sends the search to the PikeVM instead of building a
    /// pathologically wide state.
    pub fn determinization_limit(mut self, n: usize) -> Config {
        self.determinization_limit = Some(n);
        self
    }

    pub fn get_max_states(&self) -> usize {
        self.max_states.unwrap_or(10_000)
    }

    pub fn get_max_cache_clears(&self) -> usize {
        self.max_cache_clears.unwrap_or(3)
    }

    pub fn get_cache_hit_threshold(&self) -> f64 {
        self.cache_hit_threshold.unwrap_or(0.0)
    }

    pub fn get_use_prefilter(&self) -> bool {
        self.use_prefilter.unwrap_or(true)
    }

    pub fn get_min_prefilter_len(&self) -> usize {
        self.min_prefilter_len.unwrap_or(2)
    }

    pub fn get_determinization_limit(&self) -> usize {
        self.determinization_limit.unwrap_or(250)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.get_max_states() == 0 {
            return Err(Error::invalid_config("max_states must be > 0"));
        }
        if self.get_max_states() as u64 >= DEAD as u64 {
            return Err(Error::invalid_config(
                "max_states must leave room for the sentinel identifiers",
            ));
        }
        let threshold = self.get_cache_hit_threshold();
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::invalid_config(
                "cache_hit_threshold must be in [0, 1]",
            ));
        }
        if self.get_determinization_limit() == 0 {
            return Err(Error::invalid_config(
                "determinization_limit must be > 0",
            ));
        }
        Ok(())
    }
}

/// The result of a floor-limited reverse search.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReverseLimited {
    /// A match starting at the given position.
    Match(usize),
    /// The automaton died (or the window was exhausted) with no match.
    NoMatch,
    /// The scan was cut off at the floor with the automaton still alive
    /// and nothing found. Continuing to issue ever-longer reverse scans
    /// would go quadratic; the caller should switch strategy.
    Quadratic,
}

/// A point-in-time snapshot of the cache counters.
#[derive(Clone, Copy, Debug)]
pub struct CacheStats {
    /// The number of states currently cached.
    pub size: usize,
    /// The configured capacity, in states.
    pub capacity: usize,
    /// Cumulative key-lookup hits across the DFA's lifetime.
    pub hits: u64,
    /// Cumulative key-lookup misses (each minted a state).
    pub misses: u64,
    /// `hits / (hits + misses)`, or zero before any lookup.
    pub hit_rate: f64,
}

/// A lazy DFA over one compiled NFA.
pub struct DFA {
    pub(crate) nfa: Arc<NFA>,
    pub(crate) config: Config,
    pub(crate) classes: ByteClasses,
    pub(crate) alphabet_len: usize,
    pub(crate) determinizer: Determinizer,
    pub(crate) cache: Cache,
    pub(crate) starts: StartTable,
    pub(crate) scratch: Vec<crate::nfa::StateID>,
    pub(crate) pikevm: PikeVm,
    pub(crate) prefilter: Option<Prefilter>,
    pub(crate) fallbacks: u64,
    search_hits_base: u64,
    search_misses_base: u64,
}

impl DFA {
    /// Build a forward lazy DFA for the given pattern with the default
    /// configuration.
    pub fn new(pattern: &str) -> Result<DFA, Error> {
        DFA::with_config(Config::new(), pattern)
    }

    /// Build a reverse lazy DFA for the given pattern: fed a haystack
    /// backwards via the reverse search operations, it reports the start
    /// positions of forward matches.
    pub fn new_reverse(pattern: &str) -> Result<DFA, Error> {
        DFA::from_nfa(Config::new(), NFA::new_reverse(pattern)?)
    }

    /// Build a forward lazy DFA with the given configuration.
    pub fn with_config(config: Config, pattern: &str) -> Result<DFA, Error> {
        DFA::from_nfa(config, NFA::new(pattern)?)
    }

    /// Build a lazy DFA over an already compiled NFA. The DFA scans in
    /// whatever direction the NFA was compiled for; it is entirely
    /// agnostic to reversal.
    pub fn from_nfa(config: Config, nfa: Arc<NFA>) -> Result<DFA, Error> {
        config.validate()?;
        let classes = nfa.byte_classes().clone();
        let alphabet_len = classes.alphabet_len();
        let determinizer = Determinizer::new(Arc::clone(&nfa));
        let cache = Cache::new(config.get_max_states());
        let pikevm = PikeVm::new(Arc::clone(&nfa));
        let prefilter = if config.get_use_prefilter()
            && !nfa.is_always_anchored()
        {
            nfa.literal_prefix().and_then(|p| {
                if p.bytes.len() >= config.get_min_prefilter_len() {
                    debug!(
                        "prefilter over a {} byte literal (complete: {})",
                        p.bytes.len(),
                        p.complete,
                    );
                    Some(Prefilter::new(&p.bytes, p.complete))
                } else {
                    None
                }
            })
        } else {
            None
        };
        let mut dfa = DFA {
            nfa,
            config,
            classes,
            alphabet_len,
            determinizer,
            cache,
            starts: StartTable::new(),
            scratch: vec![],
            pikevm,
            prefilter,
            fallbacks: 0,
            search_hits_base: 0,
            search_misses_base: 0,
        };
        dfa.install_canonical_start();
        debug!(
            "lazy DFA ready: {} NFA states, alphabet length {}, \
             cache capacity {}",
            dfa.nfa.len(),
            dfa.alphabet_len,
            dfa.cache.capacity(),
        );
        Ok(dfa)
    }

    /// Find the end position of the leftmost match, scanning the whole
    /// haystack, with prefilter coupling when one is attached.
    pub fn find(&mut self, haystack: &[u8]) -> Option<usize> {
        self.find_at(haystack, 0)
    }

    /// Like `find`, but scanning from `at`.
    pub fn find_at(&mut self, haystack: &[u8], at: usize) -> Option<usize> {
        self.begin_search();
        let result = if self.prefilter.is_some() {
            search::find_fwd_prefiltered(self, haystack, at)
        } else {
            search::find_fwd(self, haystack, at, false, false, false)
        };
        match result {
            Ok(r) => r,
            Err(err) => {
                self.note_fallback(&err);
                self.pikevm.search_at(haystack, at).map(|(_, end)| end)
            }
        }
    }

    /// Whether any match exists in the haystack.
    pub fn is_match(&mut self, haystack: &[u8]) -> bool {
        self.begin_search();
        let result = if self.prefilter.is_some() {
            search::is_match_prefiltered(self, haystack, 0)
        } else {
            search::find_fwd(self, haystack, 0, true, false, false)
                .map(|r| r.is_some())
        };
        match result {
            Ok(b) => b,
            Err(err) => {
                self.note_fallback(&err);
                self.pikevm.is_match_at(haystack, 0)
            }
        }
    }

    /// The raw leftmost search loop, without prefilter involvement.
    /// Returns the end position of the match.
    pub fn search_at(&mut self, haystack: &[u8], at: usize) -> Option<usize> {
        self.begin_search();
        match search::find_fwd(self, haystack, at, false, false, false) {
            Ok(r) => r,
            Err(err) => {
                self.note_fallback(&err);
                self.pikevm.search_at(haystack, at).map(|(_, end)| end)
            }
        }
    }

    /// Like `search_at`, but the match must begin exactly at `at`.
    pub fn search_at_anchored(
        &mut self,
        haystack: &[u8],
        at: usize,
    ) -> Option<usize> {
        self.begin_search();
        match search::find_fwd(self, haystack, at, false, true, false) {
            Ok(r) => r,
            Err(err) => {
                self.note_fallback(&err);
                self.pikevm
                    .search_at_anchored(haystack, at)
                    .map(|(_, end)| end)
            }
        }
    }

    /// Scan `haystack[start..end]` backwards, returning the smallest match
    /// start in forward coordinates. Only meaningful on a DFA built from a
    /// reverse NFA.
    pub fn search_reverse(
        &mut self,
        haystack: &[u8],
        start: usize,
        end: usize,
    ) -> Option<usize> {
        self.begin_search();
        match search::find_rev(self, haystack, start, end, false) {
            Ok(r) => r,
            Err(err) => {
                self.note_fallback(&err);
                self.pikevm.search_reverse(haystack, start, end)
            }
        }
    }

    /// Like `search_reverse`, but refuses to scan below `min_start`. When
    /// cut off there without an answer, returns
    /// [`ReverseLimited::Quadratic`] so the caller can switch strategy.
    pub fn search_reverse_limited(
        &mut self,
        haystack: &[u8],
        start: usize,
        end: usize,
        min_start: usize,
    ) -> ReverseLimited {
        self.begin_search();
        match search::find_rev_limited(self, haystack, start, end, min_start)
        {
            Ok(r) => r,
            Err(err) => {
                self.note_fallback(&err);
                match self.pikevm.search_reverse(haystack, start, end) {
                    Some(s) => ReverseLimited::Match(s),
                    None => ReverseLimited::NoMatch,
                }
            }
        }
    }

    /// Reverse scan with early termination on the first match state.
    pub fn is_match_reverse(
        &mut self,
        haystack: &[u8],
        start: usize,
        end: usize,
    ) -> bool {
        self.begin_search();
        match search::find_rev(self, haystack, start, end, true) {
            Ok(r) => r.is_some(),
            Err(err) => {
                self.note_fallback(&err);
                self.pikevm.is_match_reverse(haystack, start, end)
            }
        }
    }

    /// A snapshot of the cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            capacity: self.cache.capacity(),
            hits: self.cache.hits(),
            misses: self.cache.misses(),
            hit_rate: self.cache.hit_rate(),
        }
    }

    /// Throw away every cached state and counter and start over, as if the
    /// DFA had just been built.
    pub fn reset_cache(&mut self) {
        self.cache.reset();
        self.starts.clear();
        self.install_canonical_start();
    }

    /// The byte equivalence classes the transition tables are keyed by.
    pub fn byte_classes(&self) -> &ByteClasses {
        &self.classes
    }

    /// The number of equivalence classes, which is the width of every
    /// state's transition table.
    pub fn alphabet_len(&self) -> usize {
        self.alphabet_len
    }

    /// How many searches have been (fully or partially) answered by the
    /// PikeVM instead of the DFA.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks
    }

    /// Fetch the start state for the given position classification,
    /// building and caching it on first use.
    pub(crate) fn start_id(
        &mut self,
        start: Start,
        anchored: bool,
    ) -> Result<LazyStateID, Error> {
        let cached = self.starts.get(start, anchored);
        if cached != INVALID {
            return Ok(cached);
        }
        let state = {
            let DFA { ref mut determinizer, alphabet_len, .. } = *self;
            determinizer.start_state(start, anchored, alphabet_len)
        };
        let key =
            StateKey::new(state.nfa_states().to_vec(), state.is_from_word());
        let id = match self.cache.get(&key) {
            Some(id) => id,
            None => {
                if self.cache.is_full() {
                    self.recover()?;
                    // Recovery reinstalled the canonical start, which may
                    // be exactly the state we were about to add.
                    match self.cache.get(&key) {
                        Some(id) => id,
                        None => self.cache.insert(key, state)?,
                    }
                } else {
                    self.cache.insert(key, state)?
                }
            }
        };
        self.detect_start_accel(id);
        self.starts.set(start, anchored, id);
        Ok(id)
    }

    /// Read the cached transition for `byte` out of `sid`, determinizing
    /// it on demand.
    pub(crate) fn next_state(
        &mut self,
        sid: LazyStateID,
        byte: u8,
    ) -> Result<LazyStateID, Error> {
        let class = self.classes.get(byte) as usize;
        let next = self.cache.state(sid).transition(class);
        if next != INVALID {
            return Ok(next);
        }
        self.determinize_transition(sid, byte, class)
    }

    fn determinize_transition(
        &mut self,
        sid: LazyStateID,
        byte: u8,
        class: usize,
    ) -> Result<LazyStateID, Error> {
        if self.hit_rate_bailout() {
            trace!(
                "cache hit rate fell below {}, delegating search",
                self.config.get_cache_hit_threshold(),
            );
            return Err(Error::nfa_fallback());
        }
        {
            let DFA {
                ref mut determinizer,
                ref cache,
                ref mut scratch,
                ..
            } = *self;
            let state = cache.state(sid);
            determinizer.next_set(
                state.nfa_states(),
                state.is_from_word(),
                byte,
                scratch,
            );
        }
        if self.scratch.is_empty() {
            self.cache.state_mut(sid).set_transition(class, DEAD);
            return Ok(DEAD);
        }
        let limit = self.config.get_determinization_limit();
        if self.scratch.len() > limit {
            let required = self.scratch.len();
            self.scratch.clear();
            return Err(Error::state_limit_exceeded(limit, required));
        }
        let from_word =
            self.determinizer.has_word_boundary() && is_word_byte(byte);
        let key = StateKey::new(mem::take(&mut self.scratch), from_word);
        if let Some(id) = self.cache.get(&key) {
            // Hand the allocation back for the next determinization.
            self.scratch = key.into_states();
            self.cache.state_mut(sid).set_transition(class, id);
            return Ok(id);
        }
        if self.cache.is_full() {
            self.scratch = key.into_states();
            self.recover()?;
            // The cache survived, but every identifier the caller holds
            // (including `sid`) now points at nothing.
            return Err(Error::cache_cleared());
        }
        let state =
            State::new(&self.nfa, key.nfa_states(), from_word, self.alphabet_len);
        let id = self.cache.insert(key, state)?;
        self.cache.state_mut(sid).set_transition(class, id);
        Ok(id)
    }

    /// Clear the cache and reinstall the canonical start state, within the
    /// per-search clear budget.
    fn recover(&mut self) -> Result<(), Error> {
        if self.cache.clear_count() >= self.config.get_max_cache_clears() {
            trace!("cache full and clear budget exhausted");
            return Err(Error::cache_full());
        }
        self.cache.clear_keep_memory();
        trace!(
            "cache cleared (#{} this search), capacity {}",
            self.cache.clear_count(),
            self.cache.capacity(),
        );
        self.starts.clear();
        self.install_canonical_start();
        Ok(())
    }

    fn install_canonical_start(&mut self) {
        let state = {
            let DFA { ref mut determinizer, alphabet_len, .. } = *self;
            determinizer.start_state(Start::Text, false, alphabet_len)
        };
        let key =
            StateKey::new(state.nfa_states().to_vec(), state.is_from_word());
        let id = self.cache.install_start(key, state);
        debug_assert_eq!(id, 0);
        self.detect_start_accel(id);
        self.starts.set(Start::Text, false, id);
    }

    /// Start states are hot and long-lived, so they get the expensive full
    /// acceleration analysis up front instead of waiting for the cached
    /// transition heuristic.
    fn detect_start_accel(&mut self, id: LazyStateID) {
        if self.determinizer.has_word_boundary()
            || self.cache.state(id).accel_checked()
        {
            return;
        }
        let accel = {
            let DFA {
                ref mut determinizer,
                ref cache,
                ref classes,
                ..
            } = *self;
            let state = cache.state(id);
            determinizer.accel_full(
                state.nfa_states(),
                state.is_from_word(),
                classes,
            )
        };
        self.cache.state_mut(id).set_accel(accel);
    }

    /// The forward end-of-input check: does the current state accept once
    /// `\z`/`$` are granted and any trailing word boundary is resolved
    /// against a non-word successor?
    pub(crate) fn eoi_fwd_is_match(&mut self, sid: LazyStateID) -> bool {
        let look = LookSet::empty()
            .insert(Look::EndText)
            .insert(Look::EndLine);
        let DFA { ref mut determinizer, ref cache, .. } = *self;
        let state = cache.state(sid);
        determinizer.eoi_is_match(
            state.nfa_states(),
            state.is_from_word(),
            look,
        )
    }

    /// The reverse end-of-input check at window position `start`. The
    /// stored end assertions are the pattern's original start assertions,
    /// so they are granted by what lies to the *left* of the window edge.
    pub(crate) fn eoi_rev_is_match(
        &mut self,
        sid: LazyStateID,
        haystack: &[u8],
        start: usize,
    ) -> bool {
        let mut look = LookSet::empty();
        if start == 0 {
            look = look.insert(Look::EndText).insert(Look::EndLine);
        } else if haystack[start - 1] == b'\n' {
            look = look.insert(Look::EndLine);
        }
        let DFA { ref mut determinizer, ref cache, .. } = *self;
        let state = cache.state(sid);
        determinizer.eoi_is_match(
            state.nfa_states(),
            state.is_from_word(),
            look,
        )
    }

    pub(crate) fn prefilter_find(
        &self,
        haystack: &[u8],
        at: usize,
    ) -> Option<usize> {
        self.prefilter.as_ref().and_then(|p| p.find(haystack, at))
    }

    /// The literal length when the attached prefilter is complete (its
    /// hits are matches), and `None` otherwise.
    pub(crate) fn prefilter_complete_len(&self) -> Option<usize> {
        self.prefilter
            .as_ref()
            .filter(|p| p.is_complete())
            .map(|p| p.len())
    }

    fn begin_search(&mut self) {
        self.cache.reset_clear_count();
        self.search_hits_base = self.cache.hits();
        self.search_misses_base = self.cache.misses();
    }

    fn hit_rate_bailout(&self) -> bool {
        let threshold = self.config.get_cache_hit_threshold();
        if threshold <= 0.0 {
            return false;
        }
        let hits = self.cache.hits() - self.search_hits_base;
        let misses = self.cache.misses() - self.search_misses_base;
        let total = hits + misses;
        if total < MIN_HIT_RATE_SAMPLES {
            return false;
        }
        (hits as f64) / (total as f64) < threshold
    }

    fn note_fallback(&mut self, err: &Error) {
        debug_assert!(err.is_fallback(), "unexpected search error: {}", err);
        self.fallbacks += 1;
        trace!("delegating to the NFA simulation: {}", err);
    }
}

impl core::fmt::Debug for DFA {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("DFA")
            .field("nfa_states", &self.nfa.len())
            .field("alphabet_len", &self.alphabet_len)
            .field("cache", &self.cache_stats())
            .field("prefilter", &self.prefilter)
            .finish()
    }
}
