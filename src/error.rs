use core::fmt;

/// An error that can occur while building or driving a lazy DFA.
///
/// The only kinds that ever reach a caller are `Syntax`, `Unsupported` and
/// `InvalidConfig`, all at construction time. The remaining kinds circulate
/// between the determinizer and the search loops, where they are translated
/// into a PikeVM fallback that still produces a correct result.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// The kind of an error, along with any kind-specific details.
#[derive(Debug)]
pub enum ErrorKind {
    /// The pattern could not be parsed.
    Syntax(regex_syntax::Error),
    /// The pattern parsed, but uses a feature this engine does not support,
    /// such as a character class that cannot be expressed over bytes.
    Unsupported(String),
    /// A configuration knob failed validation.
    InvalidConfig(String),
    /// The state cache filled up and the per-search clear budget is
    /// exhausted. Internal: the search loops translate this into a PikeVM
    /// fallback.
    CacheFull,
    /// The state cache was cleared to make room. Every state identifier
    /// held by a search loop is stale after this. Internal.
    CacheCleared,
    /// A single determinization step would have produced a state with more
    /// NFA states than the configured limit. Internal.
    StateLimitExceeded { limit: usize, required: usize },
    /// Not an error condition: a marker used by instrumentation when a
    /// search was handed to the NFA simulation.
    NFAFallback,
}

impl Error {
    /// Return the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub(crate) fn syntax(err: regex_syntax::Error) -> Error {
        Error { kind: ErrorKind::Syntax(err) }
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Error {
        Error { kind: ErrorKind::Unsupported(msg.into()) }
    }

    pub(crate) fn invalid_config(msg: impl Into<String>) -> Error {
        Error { kind: ErrorKind::InvalidConfig(msg.into()) }
    }

    pub(crate) fn cache_full() -> Error {
        Error { kind: ErrorKind::CacheFull }
    }

    pub(crate) fn cache_cleared() -> Error {
        Error { kind: ErrorKind::CacheCleared }
    }

    pub(crate) fn state_limit_exceeded(
        limit: usize,
        required: usize,
    ) -> Error {
        Error { kind: ErrorKind::StateLimitExceeded { limit, required } }
    }

    pub(crate) fn nfa_fallback() -> Error {
        Error { kind: ErrorKind::NFAFallback }
    }

    /// True for the kinds a search loop answers by delegating the rest of
    /// the search to the PikeVM.
    pub(crate) fn is_fallback(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::CacheFull
                | ErrorKind::CacheCleared
                | ErrorKind::StateLimitExceeded { .. }
                | ErrorKind::NFAFallback
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::Syntax(_) => write!(f, "error parsing pattern"),
            ErrorKind::Unsupported(ref msg) => {
                write!(f, "unsupported pattern feature: {}", msg)
            }
            ErrorKind::InvalidConfig(ref msg) => {
                write!(f, "invalid configuration: {}", msg)
            }
            ErrorKind::CacheFull => {
                write!(f, "lazy DFA cache is full and may not be cleared")
            }
            ErrorKind::CacheCleared => {
                write!(f, "lazy DFA cache was cleared")
            }
            ErrorKind::StateLimitExceeded { limit, required } => write!(
                f,
                "determinization requires {} NFA states, \
                 which exceeds the limit of {}",
                required, limit,
            ),
            ErrorKind::NFAFallback => {
                write!(f, "search was delegated to the NFA simulation")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind {
            ErrorKind::Syntax(ref err) => Some(err),
            _ => None,
        }
    }
}
