//! The ambient, application-facing error type.
//!
//! The engine itself has exactly one failure kind — a recognition failure
//! riding inside [`ParseOutcome`][crate::result::ParseOutcome], never raised
//! as an exception (spec §7). [`Error`] sits above that: it is for the
//! handful of genuinely exceptional conditions a caller needs to `?` past,
//! the way this pack's own grammar/parser crates (`leo-grammar`,
//! `leo-parser`, `apollo-parser`) expose a `thiserror`-derived error type
//! over their otherwise-infallible tree construction.

use crate::position::Position;

/// Exceptional failures of the `peggen` runtime.
///
/// Recognition failure — "the input does not match the grammar" — is
/// deliberately **not** a variant here; see
/// [`ParseOutcome`][crate::result::ParseOutcome].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// [`FileStream::open`][crate::stream::FileStream::open] could not read
    /// its input.
    #[error("failed to read grammar input: {0}")]
    Io(#[from] std::io::Error),

    /// A memoized parser replayed a cached end-position that the current
    /// stream never observed. This is the "stream swapped out from under a
    /// grammar without an intervening `reset()`" precondition violation
    /// spec.md §4.5/§9 calls out; rather than silently mis-replaying, it is
    /// surfaced here.
    #[error("memo table at {at} replayed a position not reachable on the current stream (reset() was not called after switching streams)")]
    UseAfterReset { at: Position },

    /// `Grammar::parse` reached a [`Reference`][crate::arena::ParserKind::Reference]
    /// that was never resolved via
    /// [`Grammar::define_reference`][crate::arena::Grammar::define_reference].
    #[error("dangling forward reference encountered during parse")]
    DanglingReference,
}

pub type Result<T> = std::result::Result<T, Error>;
