/*!
A lazy DFA regex matching engine.

This crate answers leftmost, earliest, anchored and reverse byte-level
searches by building DFA states *on demand* while scanning: the pattern is
compiled to a Thompson NFA once, and each DFA state is the epsilon closure
of a set of NFA states, minted the first time an input byte requires it and
cached under a bounded memory budget. When the budget runs out the cache is
cleared whole and rebuilt; when clearing stops paying for itself, the search
finishes on a PikeVM that simulates the same NFA with identical semantics.
Callers never see any of this: every search returns a plain position.

```
use lazydfa::DFA;

let mut dfa = DFA::new("a+b+c+").unwrap();
assert_eq!(dfa.find(b"xxxaaabbbcccxxx"), Some(12));
assert!(dfa.is_match(b"xxxaaabbbcccxxx"));
```

Search positions are byte offsets. Forward searches report the *end* of a
match; a DFA built over a reverse NFA (see [`DFA::new_reverse`]) reports
match *starts* through the reverse search operations.

A `DFA` mutates its cache on uncached transitions, so it cannot be shared
between concurrent searches. The compiled [`nfa::NFA`] is immutable and can
back any number of engines.
*/

mod dfa;
mod error;
pub mod nfa;
mod pikevm;
mod prefilter;
pub mod util;

pub use crate::{
    dfa::{CacheStats, Config, ReverseLimited, StartKind, DFA},
    error::{Error, ErrorKind},
    pikevm::PikeVm,
};
