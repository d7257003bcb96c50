use core::fmt;

/// A look-around assertion attached to an NFA epsilon edge.
///
/// An assertion consumes no input. Its edge may only be followed when the
/// assertion holds at the current position. Everything except the word
/// boundary pair can be decided from the position and the previous byte
/// alone, which is why the DFA resolves word boundaries separately (they
/// also need the *next* byte).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Look {
    /// `\A`, only at position 0.
    StartText = 1 << 0,
    /// `\z`, only at the end of the haystack.
    EndText = 1 << 1,
    /// `^`, at position 0 or immediately after a `\n`.
    StartLine = 1 << 2,
    /// `$`, resolved only at the end of the haystack.
    EndLine = 1 << 3,
    /// `\b`, an ASCII word byte on exactly one side.
    WordBoundary = 1 << 4,
    /// `\B`, word bytes on both sides or on neither side.
    NotWordBoundary = 1 << 5,
}

impl Look {
    /// Flip the direction of this assertion, for compiling reverse NFAs.
    /// Word boundaries are symmetric and map to themselves.
    pub fn reversed(self) -> Look {
        match self {
            Look::StartText => Look::EndText,
            Look::EndText => Look::StartText,
            Look::StartLine => Look::EndLine,
            Look::EndLine => Look::StartLine,
            Look::WordBoundary => Look::WordBoundary,
            Look::NotWordBoundary => Look::NotWordBoundary,
        }
    }

    /// Whether this is `\b` or `\B`.
    #[inline]
    pub fn is_word_boundary(self) -> bool {
        matches!(self, Look::WordBoundary | Look::NotWordBoundary)
    }
}

/// A set of satisfied look-around assertions.
///
/// When taking the epsilon closure of a set of NFA states, a `Look` edge is
/// followed if and only if its assertion is in the closure's look-set. Word
/// boundary assertions never appear in a look-set; they are resolved by the
/// dedicated resolver since they depend on the next byte.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct LookSet(u8);

impl LookSet {
    /// The empty set, where no assertions are satisfied.
    #[inline]
    pub fn empty() -> LookSet {
        LookSet(0)
    }

    /// Returns a new set with the given assertion added.
    #[inline]
    pub fn insert(self, look: Look) -> LookSet {
        LookSet(self.0 | look as u8)
    }

    /// Whether the given assertion is in this set.
    #[inline]
    pub fn contains(self, look: Look) -> bool {
        self.0 & look as u8 != 0
    }

    /// Whether this set is empty.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for LookSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let looks = [
            (Look::StartText, r"\A"),
            (Look::EndText, r"\z"),
            (Look::StartLine, "^"),
            (Look::EndLine, "$"),
            (Look::WordBoundary, r"\b"),
            (Look::NotWordBoundary, r"\B"),
        ];
        write!(f, "LookSet(")?;
        let mut first = true;
        for (look, name) in looks {
            if self.contains(look) {
                if !first {
                    write!(f, "|")?;
                }
                first = false;
                write!(f, "{}", name)?;
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_ops() {
        let set = LookSet::empty();
        assert!(set.is_empty());
        assert!(!set.contains(Look::StartText));

        let set = set.insert(Look::StartText).insert(Look::StartLine);
        assert!(!set.is_empty());
        assert!(set.contains(Look::StartText));
        assert!(set.contains(Look::StartLine));
        assert!(!set.contains(Look::EndText));
        assert!(!set.contains(Look::WordBoundary));
    }

    #[test]
    fn reversed() {
        assert_eq!(Look::StartText.reversed(), Look::EndText);
        assert_eq!(Look::EndLine.reversed(), Look::StartLine);
        assert_eq!(Look::WordBoundary.reversed(), Look::WordBoundary);
        for look in [
            Look::StartText,
            Look::EndText,
            Look::StartLine,
            Look::EndLine,
            Look::WordBoundary,
            Look::NotWordBoundary,
        ] {
            assert_eq!(look.reversed().reversed(), look);
        }
    }
}
