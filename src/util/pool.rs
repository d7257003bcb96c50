use std::cell::RefCell;

use crate::nfa::StateID;

/// The maximum capacity of a state ID buffer that will be returned to the
/// pool. Buffers that grew beyond this (from pathologically large NFA
/// subsets) are dropped instead, which keeps the per-thread pool memory
/// bounded regardless of what patterns a thread has seen.
const MAX_POOLED_CAPACITY: usize = 4096;

/// The maximum number of buffers kept per thread.
const MAX_POOLED: usize = 8;

thread_local!(
    static POOL: RefCell<Vec<Vec<StateID>>> = RefCell::new(Vec::new());
);

/// Fetch a cleared state ID buffer from the per-thread pool, or allocate a
/// fresh one when the pool is empty.
///
/// The word boundary and end-of-input probes in the search loops need a
/// short-lived ordered set of NFA states on every byte they examine; going
/// through the pool keeps those probes allocation-free in steady state.
pub fn get() -> Vec<StateID> {
    POOL.with(|pool| pool.borrow_mut().pop()).unwrap_or_default()
}

/// Return a buffer to the per-thread pool. Oversized buffers are dropped.
pub fn put(mut buf: Vec<StateID>) {
    if buf.capacity() > MAX_POOLED_CAPACITY {
        return;
    }
    buf.clear();
    POOL.with(|pool| {
        let mut pool = pool.borrow_mut();
        if pool.len() < MAX_POOLED {
            pool.push(buf);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_buffers() {
        let mut buf = get();
        buf.extend([1, 2, 3]);
        let ptr = buf.as_ptr();
        put(buf);

        let buf = get();
        assert!(buf.is_empty());
        assert_eq!(buf.as_ptr(), ptr);
        put(buf);
    }

    #[test]
    fn drops_oversized_buffers() {
        let mut buf = get();
        buf.reserve(MAX_POOLED_CAPACITY + 1);
        let cap = buf.capacity();
        put(buf);

        let buf = get();
        assert!(buf.capacity() < cap);
        put(buf);
    }
}
