use std::collections::HashMap;

use crate::{
    dfa::state::{LazyStateID, State, DEAD},
    error::Error,
    nfa,
};

/// The canonical identity of a DFA state: its sorted NFA subset plus the
/// word-context flag. Permutations of the same subset hash identically
/// because the determinizer sorts before keying; the `debug_assert` in
/// `new` keeps that invariant honest.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct StateKey {
    nfa_states: Vec<nfa::StateID>,
    is_from_word: bool,
}

impl StateKey {
    pub(crate) fn new(
        nfa_states: Vec<nfa::StateID>,
        is_from_word: bool,
    ) -> StateKey {
        debug_assert!(nfa_states.windows(2).all(|w| w[0] < w[1]));
        StateKey { nfa_states, is_from_word }
    }

    pub(crate) fn nfa_states(&self) -> &[nfa::StateID] {
        &self.nfa_states
    }

    /// Recover the backing buffer, for reuse after a cache hit.
    pub(crate) fn into_states(self) -> Vec<nfa::StateID> {
        self.nfa_states
    }
}

/// The bounded state cache: a map from canonical state keys to identifiers,
/// and the contiguous identifier-to-state array behind them.
///
/// States are never evicted individually. When the cache is at capacity the
/// only recourse is `clear_keep_memory`, which throws every state away but
/// keeps the allocations, and relies on the owner to reinstall the
/// canonical start state before anything else happens.
#[derive(Clone, Debug)]
pub(crate) struct Cache {
    map: HashMap<StateKey, LazyStateID>,
    states: Vec<State>,
    max_states: usize,
    hits: u64,
    misses: u64,
    clear_count: usize,
}

impl Cache {
    pub(crate) fn new(max_states: usize) -> Cache {
        assert!(max_states >= 1, "cache capacity must be at least 1");
        Cache {
            map: HashMap::new(),
            states: vec![],
            max_states,
            hits: 0,
            misses: 0,
            clear_count: 0,
        }
    }

    /// Install the canonical start state. The cache must be empty; the
    /// state receives identifier 0.
    pub(crate) fn install_start(
        &mut self,
        key: StateKey,
        state: State,
    ) -> LazyStateID {
        assert!(self.states.is_empty(), "start state must be first");
        self.states.push(state);
        self.map.insert(key, 0);
        0
    }

    /// Look up a state by key, counting a hit or a miss.
    pub(crate) fn get(&mut self, key: &StateKey) -> Option<LazyStateID> {
        match self.map.get(key) {
            Some(&id) => {
                self.hits += 1;
                Some(id)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert a state, assigning the next sequential identifier. If the key
    /// is already present the existing identifier is returned and the given
    /// state is discarded. Fails with `CacheFull` at capacity.
    pub(crate) fn insert(
        &mut self,
        key: StateKey,
        state: State,
    ) -> Result<LazyStateID, Error> {
        if let Some(&id) = self.map.get(&key) {
            return Ok(id);
        }
        if self.is_full() {
            return Err(Error::cache_full());
        }
        let id = self.states.len() as LazyStateID;
        assert!(id < DEAD, "state identifier space exhausted");
        self.states.push(state);
        self.map.insert(key, id);
        Ok(id)
    }

    /// Look up a state and insert it on a miss.
    #[allow(dead_code)]
    pub(crate) fn get_or_insert(
        &mut self,
        key: StateKey,
        state: State,
    ) -> Result<LazyStateID, Error> {
        if let Some(id) = self.get(&key) {
            return Ok(id);
        }
        self.insert(key, state)
    }

    #[inline(always)]
    pub(crate) fn state(&self, id: LazyStateID) -> &State {
        &self.states[id as usize]
    }

    #[inline(always)]
    pub(crate) fn state_mut(&mut self, id: LazyStateID) -> &mut State {
        &mut self.states[id as usize]
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.max_states
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.states.len() >= self.max_states
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits
    }

    pub(crate) fn misses(&self) -> u64 {
        self.misses
    }

    pub(crate) fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// Drop every cached state but keep the allocations. Identifier
    /// assignment restarts from scratch, so every outstanding identifier is
    /// stale after this. Hit and miss counters survive; the clear counter
    /// goes up by one.
    pub(crate) fn clear_keep_memory(&mut self) {
        self.map.clear();
        self.states.clear();
        self.clear_count += 1;
    }

    #[inline]
    pub(crate) fn clear_count(&self) -> usize {
        self.clear_count
    }

    /// Called at the start of every search: the clear budget is per search.
    pub(crate) fn reset_clear_count(&mut self) {
        self.clear_count = 0;
    }

    /// Full reset, counters included. Only the user can ask for this.
    pub(crate) fn reset(&mut self) {
        self.map.clear();
        self.states.clear();
        self.hits = 0;
        self.misses = 0;
        self.clear_count = 0;
    }
}
