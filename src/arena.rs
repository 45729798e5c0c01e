//! The parser graph: a closed tagged sum of parser kinds stored in an arena
//! and addressed by stable indices.
//!
//! Spec.md's design notes model the hierarchy as "better modeled as a
//! tagged sum... than as open virtual dispatch — the set is closed and
//! known," and solve the grammar's mutual recursion by having `Reference`
//! hold a non-owning handle into storage the client (here: the arena
//! itself) owns. An arena of `ParserNode`s addressed by a `Copy` `ParserId`
//! gives both for free: no node can reach itself through an owning edge
//! (every edge is just an integer), and `Reference` is simply a node whose
//! id is resolved after the fact.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::charset::CharSet;
use crate::error::{Error, Result};
use crate::options::GrammarOptions;
use crate::position::Position;
use crate::result::{ParseError, ParseOutcome};
use crate::stream::Stream;
use crate::tree::Stn;

#[cfg(feature = "trace")]
use tracing::trace;

/// A stable handle to a node in a [`Grammar`]'s arena.
///
/// Cheap to copy, meaningless outside the `Grammar` that produced it. Using
/// an index rather than a reference or `Rc` is what lets the grammar's
/// inherent mutual recursion (`SetValue` referencing `SetExpression`
/// referencing `SetValue`...) exist without reference counting or a garbage
/// collector: a cycle of indices is just data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParserId(usize);

/// The closed set of parser kinds. See spec.md §9 "Variant dispatch".
#[derive(Debug, Clone)]
pub enum ParserKind {
    Char(CharSet),
    Word(String),
    Empty,
    Any,
    EndOfInput,
    /// `At`/`NotAt`: `positive = true` is `At`, `false` is `NotAt`.
    Check { positive: bool, inner: ParserId },
    /// `Optional`/`Star`/`Plus` are all sugar over this: `(0, Some(1))`,
    /// `(0, None)`, `(1, None)` respectively. `max = None` means unbounded.
    Repeat {
        min: usize,
        max: Option<usize>,
        inner: ParserId,
    },
    Seq(Vec<ParserId>),
    Alt(Vec<ParserId>),
    /// Forward reference, resolved after construction via
    /// [`Grammar::define_reference`]. `None` until then.
    Reference(Option<ParserId>),
    Token(ParserId),
    Ignore(ParserId),
    Clear(ParserId),
    Name {
        name: String,
        insert: bool,
        inner: ParserId,
    },
    Root {
        idx: isize,
        inner: ParserId,
    },
    Flat {
        idx: isize,
        inner: ParserId,
    },
    Left(ParserId),
    Right(ParserId),
}

/// One packrat cache entry: the outcome, the stream position it left the
/// stream at, and an owned copy of the produced tree.
///
/// Storing an owned `Stn` (rather than, say, `Rc<Stn>`) means every replay
/// below does a real structural clone — matching spec.md §4.5's
/// requirement that "every caller receives an independently-owned
/// subtree" without introducing shared mutable state between callers.
#[derive(Clone)]
struct MemoEntry {
    outcome: ParseOutcome,
    end: Position,
    tree: Option<Stn>,
}

type MemoTable = RefCell<HashMap<Position, MemoEntry>>;

struct ParserNode {
    kind: ParserKind,
    /// `Some` exactly for the kinds spec.md §4.5 lists as memoized:
    /// `Word`, `Check` (At/NotAt), `Repeat` (covers Optional/Star/Plus),
    /// `Seq`, `Alt`. Tree-shaping wrappers and `Reference` are never
    /// memoized.
    memo: Option<MemoTable>,
}

/// The arena owning an entire parser graph.
///
/// All factory methods take `&mut self` (building the graph); [`Grammar::parse`]
/// takes `&self` (memo tables use interior mutability, since a packrat cache
/// is logically read-through even though it physically mutates).
pub struct Grammar {
    nodes: Vec<ParserNode>,
    options: GrammarOptions,
}

fn memoized(kind: ParserKind) -> ParserNode {
    ParserNode {
        kind,
        memo: Some(RefCell::new(HashMap::new())),
    }
}

fn bare(kind: ParserKind) -> ParserNode {
    ParserNode { kind, memo: None }
}

impl Grammar {
    pub fn new() -> Self {
        Grammar::with_options(GrammarOptions::default())
    }

    pub fn with_options(options: GrammarOptions) -> Self {
        Grammar {
            nodes: Vec::new(),
            options,
        }
    }

    pub fn options(&self) -> &GrammarOptions {
        &self.options
    }

    fn push(&mut self, node: ParserNode) -> ParserId {
        self.nodes.push(node);
        ParserId(self.nodes.len() - 1)
    }

    // ---- primitives ----------------------------------------------------

    pub fn char(&mut self, set: CharSet) -> ParserId {
        self.push(bare(ParserKind::Char(set)))
    }

    pub fn word(&mut self, s: impl Into<String>) -> ParserId {
        self.push(memoized(ParserKind::Word(s.into())))
    }

    pub fn empty(&mut self) -> ParserId {
        self.push(bare(ParserKind::Empty))
    }

    pub fn any(&mut self) -> ParserId {
        self.push(bare(ParserKind::Any))
    }

    pub fn end_of_input(&mut self) -> ParserId {
        self.push(bare(ParserKind::EndOfInput))
    }

    // ---- combinators -----------------------------------------------------

    pub fn at(&mut self, inner: ParserId) -> ParserId {
        self.push(memoized(ParserKind::Check {
            positive: true,
            inner,
        }))
    }

    pub fn not_at(&mut self, inner: ParserId) -> ParserId {
        self.push(memoized(ParserKind::Check {
            positive: false,
            inner,
        }))
    }

    pub fn optional(&mut self, inner: ParserId) -> ParserId {
        self.repeat(0, Some(1), inner)
    }

    pub fn star(&mut self, inner: ParserId) -> ParserId {
        self.repeat(0, None, inner)
    }

    pub fn plus(&mut self, inner: ParserId) -> ParserId {
        self.repeat(1, None, inner)
    }

    pub fn repeat(&mut self, min: usize, max: Option<usize>, inner: ParserId) -> ParserId {
        self.push(memoized(ParserKind::Repeat { min, max, inner }))
    }

    pub fn sequence(&mut self, inners: impl IntoIterator<Item = ParserId>) -> ParserId {
        self.push(memoized(ParserKind::Seq(inners.into_iter().collect())))
    }

    pub fn choice(&mut self, inners: impl IntoIterator<Item = ParserId>) -> ParserId {
        self.push(memoized(ParserKind::Alt(inners.into_iter().collect())))
    }

    /// Declares a forward reference. Must be resolved with
    /// [`Grammar::define_reference`] before the graph is parsed, or
    /// [`Grammar::parse`] returns [`Error::DanglingReference`].
    pub fn forward_reference(&mut self) -> ParserId {
        self.push(bare(ParserKind::Reference(None)))
    }

    /// Resolves a forward reference declared with
    /// [`Grammar::forward_reference`] to `target`. This is the "arena of
    /// parsers addressed by stable indices" strategy spec.md §9 describes:
    /// the reference never owns `target`, it just remembers its id, so a
    /// mutually-recursive grammar (`SetValue` ↔ `SetExpression`) is just two
    /// indices pointing at each other.
    pub fn define_reference(&mut self, reference: ParserId, target: ParserId) {
        if let ParserKind::Reference(slot) = &mut self.nodes[reference.0].kind {
            *slot = Some(target);
        } else {
            panic!("define_reference called on a non-Reference ParserId");
        }
    }

    // ---- tree-shaping wrappers --------------------------------------------

    pub fn token(&mut self, inner: ParserId) -> ParserId {
        self.push(bare(ParserKind::Token(inner)))
    }

    pub fn ignore(&mut self, inner: ParserId) -> ParserId {
        self.push(bare(ParserKind::Ignore(inner)))
    }

    pub fn clear(&mut self, inner: ParserId) -> ParserId {
        self.push(bare(ParserKind::Clear(inner)))
    }

    pub fn name(&mut self, name: impl Into<String>, insert: bool, inner: ParserId) -> ParserId {
        self.push(bare(ParserKind::Name {
            name: name.into(),
            insert,
            inner,
        }))
    }

    pub fn root(&mut self, idx: isize, inner: ParserId) -> ParserId {
        self.push(bare(ParserKind::Root { idx, inner }))
    }

    pub fn flat(&mut self, idx: isize, inner: ParserId) -> ParserId {
        self.push(bare(ParserKind::Flat { idx, inner }))
    }

    pub fn left(&mut self, inner: ParserId) -> ParserId {
        self.push(bare(ParserKind::Left(inner)))
    }

    pub fn right(&mut self, inner: ParserId) -> ParserId {
        self.push(bare(ParserKind::Right(inner)))
    }

    // ---- lifecycle ---------------------------------------------------

    /// Clears every memo table in the arena, destroying their cached trees.
    /// Must be called between two top-level [`Grammar::parse`] calls against
    /// different streams (spec.md §4.5/§4.6); skipping it is caught at parse
    /// time as [`Error::UseAfterReset`] rather than silently mis-replaying.
    pub fn reset(&self) {
        for node in &self.nodes {
            if let Some(memo) = &node.memo {
                memo.borrow_mut().clear();
            }
        }
    }

    /// Runs the parser rooted at `root` against `stream` from its current
    /// position.
    pub fn parse(
        &self,
        root: ParserId,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        #[cfg(feature = "trace")]
        let _span = tracing::info_span!("parse", start = ?stream.where_()).entered();
        self.parse_node(root, stream)
    }

    fn node(&self, id: ParserId) -> &ParserNode {
        &self.nodes[id.0]
    }

    fn parse_node(
        &self,
        id: ParserId,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let node = self.node(id);
        match &node.memo {
            None => self.parse_kind(&node.kind, stream),
            Some(table) => self.parse_memoized(id, table, stream),
        }
    }

    fn parse_memoized(
        &self,
        id: ParserId,
        table: &MemoTable,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let start = stream.where_();
        if let Some(entry) = table.borrow().get(&start).cloned() {
            #[cfg(feature = "trace")]
            trace!(?start, "memo hit");
            if stream.where_() != entry.end && !stream.goto(entry.end) {
                return Err(Error::UseAfterReset { at: entry.end });
            }
            return Ok((entry.outcome, entry.tree));
        }
        #[cfg(feature = "trace")]
        trace!(?start, "memo miss");
        let node = self.node(id);
        let (outcome, tree) = self.parse_kind(&node.kind, stream)?;
        let end = stream.where_();
        table.borrow_mut().insert(
            start,
            MemoEntry {
                outcome: outcome.clone(),
                end,
                tree: tree.clone(),
            },
        );
        Ok((outcome, tree))
    }

    fn parse_kind(
        &self,
        kind: &ParserKind,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        match kind {
            ParserKind::Char(set) => Ok(self.parse_char(set, stream)),
            ParserKind::Word(word) => Ok(self.parse_word(word, stream)),
            ParserKind::Empty => Ok((ParseOutcome::success(), None)),
            ParserKind::Any => Ok(self.parse_any(stream)),
            ParserKind::EndOfInput => Ok(self.parse_end_of_input(stream)),
            ParserKind::Check { positive, inner } => self.parse_check(*positive, *inner, stream),
            ParserKind::Repeat { min, max, inner } => {
                self.parse_repeat(*min, *max, *inner, stream)
            }
            ParserKind::Seq(inners) => self.parse_sequence(inners, stream),
            ParserKind::Alt(inners) => self.parse_choice(inners, stream),
            ParserKind::Reference(target) => match target {
                Some(target) => self.parse_node(*target, stream),
                None => Err(Error::DanglingReference),
            },
            ParserKind::Token(inner) => self.parse_token(*inner, stream),
            ParserKind::Ignore(inner) => self.parse_ignore(*inner, stream),
            ParserKind::Clear(inner) => self.parse_clear(*inner, stream),
            ParserKind::Name {
                name,
                insert,
                inner,
            } => self.parse_name(name, *insert, *inner, stream),
            ParserKind::Root { idx, inner } => self.parse_root(*idx, *inner, stream),
            ParserKind::Flat { idx, inner } => self.parse_flat(*idx, *inner, stream),
            ParserKind::Left(inner) => self.parse_binary(*inner, stream, rotate_left),
            ParserKind::Right(inner) => self.parse_binary(*inner, stream, rotate_right),
        }
    }

    // ---- primitive bodies ------------------------------------------------

    fn parse_char(&self, set: &CharSet, stream: &mut dyn Stream) -> (ParseOutcome, Option<Stn>) {
        let start = stream.where_();
        match stream.peek() {
            Some(byte) if set.contains(byte) => {
                stream.advance();
                (
                    ParseOutcome::success(),
                    Some(Stn::leaf(start, char::from(byte).to_string())),
                )
            }
            _ => (
                ParseOutcome::failure(ParseError::at(start, set.name())),
                None,
            ),
        }
    }

    fn parse_word(&self, word: &str, stream: &mut dyn Stream) -> (ParseOutcome, Option<Stn>) {
        let start = stream.where_();
        for expected_byte in word.bytes() {
            let mismatch_at = stream.where_();
            match stream.peek() {
                Some(byte) if byte == expected_byte => stream.advance(),
                _ => {
                    stream.goto(start);
                    return (
                        ParseOutcome::failure(ParseError::at(mismatch_at, word.to_string())),
                        None,
                    );
                }
            }
        }
        (
            ParseOutcome::success(),
            Some(Stn::leaf(start, word.to_string())),
        )
    }

    fn parse_any(&self, stream: &mut dyn Stream) -> (ParseOutcome, Option<Stn>) {
        let start = stream.where_();
        match stream.peek() {
            Some(byte) => {
                stream.advance();
                (
                    ParseOutcome::success(),
                    Some(Stn::leaf(start, char::from(byte).to_string())),
                )
            }
            None => (
                ParseOutcome::failure(ParseError::at(start, "ANY")),
                None,
            ),
        }
    }

    fn parse_end_of_input(&self, stream: &mut dyn Stream) -> (ParseOutcome, Option<Stn>) {
        let start = stream.where_();
        if stream.at_end() {
            (ParseOutcome::success(), None)
        } else {
            (ParseOutcome::failure(ParseError::at(start, "EOI")), None)
        }
    }

    // ---- combinator bodies -------------------------------------------

    fn parse_check(
        &self,
        positive: bool,
        inner: ParserId,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let start = stream.where_();
        let (outcome, _tree) = self.parse_node(inner, stream)?;
        stream.goto(start);
        let matched = if positive {
            outcome.matched
        } else {
            !outcome.matched
        };
        Ok((
            ParseOutcome {
                matched,
                fail: outcome.fail,
            },
            None,
        ))
    }

    fn parse_repeat(
        &self,
        min: usize,
        max: Option<usize>,
        inner: ParserId,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let start = stream.where_();
        let mut agg = Stn::aggregate(start);
        let mut fail = ParseError::none();
        let mut count = 0usize;

        loop {
            if let Some(max) = max {
                if count >= max {
                    break;
                }
            }
            let (outcome, tree) = self.parse_node(inner, stream)?;
            fail.combine(outcome.fail);
            if !outcome.matched {
                break;
            }
            absorb(&mut agg, tree);
            count += 1;
        }

        if count < min {
            stream.goto(start);
            return Ok((ParseOutcome::failure(fail), None));
        }

        Ok((
            ParseOutcome {
                matched: true,
                fail,
            },
            collapse(agg),
        ))
    }

    fn parse_sequence(
        &self,
        inners: &[ParserId],
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let start = stream.where_();
        let mut agg = Stn::aggregate(start);
        let mut fail = ParseError::none();

        for &inner in inners {
            let (outcome, tree) = self.parse_node(inner, stream)?;
            fail.combine(outcome.fail.clone());
            if !outcome.matched {
                stream.goto(start);
                return Ok((ParseOutcome::failure(fail), None));
            }
            absorb(&mut agg, tree);
        }

        Ok((
            ParseOutcome {
                matched: true,
                fail,
            },
            collapse(agg),
        ))
    }

    fn parse_choice(
        &self,
        inners: &[ParserId],
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let mut fail = ParseError::none();
        for &inner in inners {
            let (outcome, tree) = self.parse_node(inner, stream)?;
            fail.combine(outcome.fail);
            if outcome.matched {
                return Ok((ParseOutcome { matched: true, fail }, tree));
            }
        }
        Ok((ParseOutcome::failure(fail), None))
    }

    // ---- shaping wrapper bodies ----------------------------------------

    fn parse_token(
        &self,
        inner: ParserId,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let (outcome, tree) = self.parse_node(inner, stream)?;
        let Some(t) = tree.filter(|_| outcome.matched) else {
            return Ok((outcome, None));
        };
        let start = t.where_();
        let mut data = String::new();
        collect_leaf_data(&t, &mut data);
        Ok((outcome, Some(Stn::leaf(start, data))))
    }

    fn parse_ignore(
        &self,
        inner: ParserId,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let (outcome, _tree) = self.parse_node(inner, stream)?;
        Ok((outcome, None))
    }

    fn parse_clear(
        &self,
        inner: ParserId,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let (outcome, tree) = self.parse_node(inner, stream)?;
        Ok((outcome.clear(), tree))
    }

    fn parse_name(
        &self,
        name: &str,
        insert: bool,
        inner: ParserId,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let start = stream.where_();
        let (outcome, tree) = self.parse_node(inner, stream)?;
        if !outcome.matched {
            return Ok((outcome, tree));
        }
        let shaped = match tree {
            None if insert => Some(Stn::leaf(start, name)),
            None => None,
            Some(t) if t.has_data() && insert => {
                let where_ = t.where_();
                let mut wrapper = Stn::aggregate(where_);
                wrapper.set_data(name);
                wrapper.add_son(t);
                Some(wrapper)
            }
            Some(t) if t.has_data() => Some(t),
            Some(mut t) => {
                t.set_data(name);
                Some(t)
            }
        };
        Ok((outcome, shaped))
    }

    fn parse_root(
        &self,
        idx: isize,
        inner: ParserId,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let (outcome, tree) = self.parse_node(inner, stream)?;
        if !outcome.matched {
            return Ok((outcome, tree));
        }
        let shaped = tree.map(|mut t| {
            if t.has_data() {
                return t;
            }
            let len = t.sons().len();
            let Some(i) = Stn::resolve_index(len, idx) else {
                return t;
            };
            let mut promoted = t.unlink(i);
            let grandchildren = promoted.unlink_all();
            let tail = t.sons_mut().split_off(i);
            t.sons_mut().extend(grandchildren);
            t.sons_mut().extend(tail);
            t.set_data(promoted.data);
            t.set_where(promoted.where_);
            t
        });
        Ok((outcome, shaped))
    }

    fn parse_flat(
        &self,
        idx: isize,
        inner: ParserId,
        stream: &mut dyn Stream,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let (outcome, tree) = self.parse_node(inner, stream)?;
        if !outcome.matched {
            return Ok((outcome, tree));
        }
        Ok((outcome, tree.map(|t| shape_flat(t, idx))))
    }

    fn parse_binary(
        &self,
        inner: ParserId,
        stream: &mut dyn Stream,
        rotate: fn(Vec<Stn>) -> Stn,
    ) -> Result<(ParseOutcome, Option<Stn>)> {
        let (outcome, tree) = self.parse_node(inner, stream)?;
        if !outcome.matched {
            return Ok((outcome, tree));
        }
        let shaped = tree.map(|mut t| {
            if !is_binary_shape(&t) {
                return t;
            }
            rotate(t.unlink_all())
        });
        Ok((outcome, shaped))
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Grammar::new()
    }
}

/// Adds a child result to a `Sequence`/`Repeat` aggregation node in
/// progress. A dataless, non-leaf result is itself a spent aggregation
/// node from a nested `Sequence`/`Repeat` — a transient holder, per
/// spec.md §4.4's "aggregation node" — so its children are spliced in
/// flat rather than kept as a nested node; this is what lets
/// `Left(Sequence(num, Plus(Sequence(op, num))))` (spec.md §8, S5) see the
/// flat `[num, op, num, op, num, ...]` list it requires instead of a tree
/// of one-sided nested pairs.
fn absorb(agg: &mut Stn, tree: Option<Stn>) {
    let Some(mut t) = tree else { return };
    if t.has_data() || t.is_leaf() {
        agg.add_son(t);
    } else {
        agg.sons_mut().extend(t.unlink_all());
    }
}

fn collapse(mut agg: Stn) -> Option<Stn> {
    match agg.sons().len() {
        0 => None,
        1 => Some(agg.unlink(0)),
        _ => Some(agg),
    }
}

fn collect_leaf_data(node: &Stn, out: &mut String) {
    if node.is_leaf() {
        out.push_str(node.data());
    } else {
        for child in node.sons() {
            collect_leaf_data(child, out);
        }
    }
}

fn collect_flat(mut node: Stn, out: &mut Vec<Stn>) {
    if node.has_data() {
        out.push(node);
    } else {
        for child in node.unlink_all() {
            collect_flat(child, out);
        }
    }
}

/// `Flat(idx, p)`'s post-processing: select the child at `idx`, walk its
/// subtree pre-order collecting every data-carrying node into a flat
/// sibling list, and splice that list into `t` in the selected child's
/// place. No-ops (per spec.md §4.3 and `FlatParser::Parse` in the original
/// grammar implementation) whenever `t` itself already has data — same
/// precondition `Root` applies — or whenever the selected child has data,
/// in which case flattening it would destroy a meaningful sub-result
/// rather than a bare skeleton.
fn shape_flat(mut t: Stn, idx: isize) -> Stn {
    if t.has_data() {
        return t;
    }
    let len = t.sons().len();
    let Some(i) = Stn::resolve_index(len, idx) else {
        return t;
    };
    if t.son(i).has_data() {
        return t;
    }
    let selected = t.unlink(i);
    let mut flat = Vec::new();
    collect_flat(selected, &mut flat);
    let tail = t.sons_mut().split_off(i);
    t.sons_mut().extend(flat);
    t.sons_mut().extend(tail);
    t
}

fn is_binary_shape(t: &Stn) -> bool {
    let sons = t.sons();
    !t.has_data()
        && !sons.is_empty()
        && sons.len() % 2 == 1
        && sons.iter().skip(1).step_by(2).all(Stn::is_leaf)
}

fn rotate_left(mut children: Vec<Stn>) -> Stn {
    let mut acc = children.remove(0);
    while !children.is_empty() {
        let op = children.remove(0);
        let operand = children.remove(0);
        let where_ = acc.where_();
        let mut node = Stn::aggregate(where_);
        node.set_data(op.data);
        node.add_son(acc);
        node.add_son(operand);
        acc = node;
    }
    acc
}

fn rotate_right(mut children: Vec<Stn>) -> Stn {
    if children.len() == 1 {
        return children.pop().unwrap();
    }
    let left = children.remove(0);
    let op = children.remove(0);
    let rest = rotate_right(children);
    let mut node = Stn::aggregate(left.where_());
    node.set_data(op.data);
    node.add_son(left);
    node.add_son(rest);
    node
}
