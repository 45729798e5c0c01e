//! The furthest-reach error and the pass/fail discriminator every parser
//! returns.

use crate::position::Position;

/// A parse failure: the furthest position reached, and the set of things
/// that would have been accepted there.
///
/// `expected` is insertion-ordered and deduplicated — a `Vec<String>` with a
/// linear `contains` check rather than a `HashSet`, since expected-sets are
/// tiny (a handful of alternatives at any one position) and insertion order
/// matters for reproducible diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseError {
    pub where_: Position,
    pub expected: Vec<String>,
}

impl ParseError {
    /// The "nothing has failed yet" value: `where_ == Position::NONE` and an
    /// empty expected-set.
    pub fn none() -> Self {
        ParseError::default()
    }

    pub fn at(where_: Position, expected: impl Into<String>) -> Self {
        ParseError {
            where_,
            expected: vec![expected.into()],
        }
    }

    /// `true` iff this error carries real information (a position beyond
    /// `Position::NONE`, or a non-empty expected-set).
    pub fn is_truthy(&self) -> bool {
        self.where_ != Position::NONE || !self.expected.is_empty()
    }

    /// Furthest-reach combination: `other` wins outright if its position is
    /// strictly deeper, its `expected` set is unioned in if the position
    /// ties, and it is discarded if it is shallower.
    pub fn combine(&mut self, other: ParseError) {
        match other.where_.cmp(&self.where_) {
            std::cmp::Ordering::Greater => *self = other,
            std::cmp::Ordering::Equal => {
                for e in other.expected {
                    if !self.expected.contains(&e) {
                        self.expected.push(e);
                    }
                }
            }
            std::cmp::Ordering::Less => {}
        }
    }
}

impl std::ops::AddAssign for ParseError {
    fn add_assign(&mut self, other: Self) {
        self.combine(other);
    }
}

/// The outcome of running a parser: a match bit plus a furthest-reach error
/// that may be populated even on success (to propagate the deepest failure
/// seen while speculatively exploring inside `Optional`/`Star`/`Plus`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseOutcome {
    pub matched: bool,
    pub fail: ParseError,
}

impl ParseOutcome {
    pub fn success() -> Self {
        ParseOutcome {
            matched: true,
            fail: ParseError::none(),
        }
    }

    pub fn failure(fail: ParseError) -> Self {
        ParseOutcome {
            matched: false,
            fail,
        }
    }

    /// Zero the accumulated error, keeping the match bit.
    pub fn clear(mut self) -> Self {
        self.fail = ParseError::none();
        self
    }

    pub fn is_success(&self) -> bool {
        self.matched
    }
}
