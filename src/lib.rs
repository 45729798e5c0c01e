//! `peggen` — a packrat PEG parser-combinator runtime.
//!
//! This crate is the core of a compiler-compiler: a grammar author composes
//! a [`Grammar`] out of primitive parsers (`char`, `word`, `any`, ...),
//! combinators (`sequence`, `choice`, `repeat`, ...), and tree-shaping
//! wrappers (`token`, `name`, `left`, `right`, ...), then runs it against a
//! [`Stream`] to get back a [`Stn`] — a syntax tree already reshaped into
//! something close to an abstract syntax tree, with no separate
//! "build the AST from the parse tree" pass required.
//!
//! The EBNF grammar dialect, the semantic validator (reserved words,
//! duplicate names, undefined references, left recursion), and the code
//! generator that turns a validated grammar into calls against this exact
//! factory surface are treated as external collaborators: clients of this
//! crate, not part of it.
//!
//! ## Example
//!
//! ```rust
//! use peggen::prelude::*;
//!
//! // digit := '0'..'9'
//! // number := Token(Plus(digit))
//! let mut g = Grammar::new();
//! let digit = g.char(CharSet::range(b'0', b'9'));
//! let digits = g.plus(digit);
//! let number = g.token(digits);
//!
//! let mut stream = MemoryStream::new("42!");
//! let (outcome, tree) = g.parse(number, &mut stream).unwrap();
//! assert!(outcome.is_success());
//! assert_eq!(tree.unwrap().data(), "42");
//! ```

pub mod arena;
pub mod charset;
pub mod error;
pub mod options;
pub mod position;
pub mod result;
pub mod stream;
pub mod tree;
pub mod walk;

pub use arena::{Grammar, ParserId, ParserKind};
pub use charset::CharSet;
pub use error::Error;
pub use options::GrammarOptions;
pub use position::Position;
pub use result::{ParseError, ParseOutcome};
pub use stream::{FileStream, MemoryStream, Stream};
pub use tree::Stn;
pub use walk::{in_walk, post_walk, pre_walk};

/// Re-exports the common entry points; `use peggen::prelude::*;` is the
/// expected way to pull in a grammar's worth of factory calls.
pub mod prelude {
    pub use crate::arena::{Grammar, ParserId};
    pub use crate::charset::CharSet;
    pub use crate::error::Error;
    pub use crate::position::Position;
    pub use crate::result::{ParseError, ParseOutcome};
    pub use crate::stream::{FileStream, MemoryStream, Stream};
    pub use crate::tree::Stn;
    pub use crate::walk::{in_walk, post_walk, pre_walk};
}
