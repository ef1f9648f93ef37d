//! The lazy child parser.
//!
//! A parser owns its lexer and two node arenas. Lists materialize their
//! children only when asked: the lexer hands back the interior token range
//! and [`Parser::parse_range`] walks it *backward*, threading each new node
//! onto the front of a singly linked chain. Walking in reverse means every
//! new head's `next` is the already-built suffix, so the chain comes out in
//! source order without a second pass.

use std::borrow::Cow;
use std::io;
use std::mem;
use std::path::Path;

use crate::arena::ChainedArena;
use crate::diagnostics::{Diagnostic, DiagnosticSet};
use crate::dialect::{DefaultDialect, Dialect};
use crate::lexer::token::{SourceLoc, Token, TokenId, TokenKind};
use crate::lexer::{arena_size_estimate, Lexer};
use crate::source::PaddedSource;
use crate::tree::node::{Auxiliary, AuxiliaryId, Node, NodeId, NodeKind, Shape};

pub struct Parser<D: Dialect = DefaultDialect> {
    lexer: Lexer<D>,
    nodes: ChainedArena<Node>,
    auxiliaries: ChainedArena<Auxiliary>,
    end_of_program: NodeId,
    root: Option<NodeId>,
    parsed: bool,
}

impl<D: Dialect> Parser<D> {
    pub fn from_source(source: PaddedSource, conservative: bool) -> Self {
        Self::new(Lexer::from_source(source, conservative), conservative)
    }

    pub fn with_origin(source: PaddedSource, origin: &str, conservative: bool) -> Self {
        Self::new(Lexer::with_origin(source, origin, conservative), conservative)
    }

    pub fn from_path<P: AsRef<Path>>(path: P, conservative: bool) -> io::Result<Self> {
        let source = PaddedSource::read(&path)?;
        let origin = path.as_ref().display().to_string();
        Ok(Self::with_origin(source, &origin, conservative))
    }

    fn new(lexer: Lexer<D>, conservative: bool) -> Self {
        let estimate = arena_size_estimate(lexer.source().len() / 2, conservative);
        let chunk = (estimate / mem::size_of::<Node>()).max(64);
        let mut nodes = ChainedArena::with_chunk_capacity(chunk);
        let end_of_program = NodeId(nodes.push(Node::atom(
            Lexer::<D>::EOF_TOKEN,
            NodeKind::EndOfProgram,
            None,
        )));
        Parser {
            lexer,
            nodes,
            auxiliaries: ChainedArena::with_chunk_capacity(64),
            end_of_program,
            root: None,
            parsed: false,
        }
    }

    /// Parses the whole input at top level: one root list node with lazy
    /// children. `None` when the input holds no s-expression, in which case
    /// a program-must-start diagnostic has been recorded.
    pub fn parse(&mut self) -> Option<NodeId> {
        if self.parsed {
            return self.root;
        }
        self.lexer.tokenize();
        self.root = self
            .lexer
            .first_sexpr()
            .map(|(open, close)| NodeId(self.nodes.push(Node::list(open, close, None))));
        self.parsed = true;
        self.root
    }

    /// First child of a list or arguments node, materializing and caching
    /// the chain on first call. Repeated calls return the same id.
    pub fn children(&mut self, id: NodeId) -> Option<NodeId> {
        self.children_in_context(id, false)
    }

    /// Like [`children`](Parser::children), but `allow_empty` marks the
    /// empty interior as context-sensitive: no empty-s-expression
    /// diagnostic is emitted for this list even in dialects that forbid
    /// `()`. The flag applies only to the directly requested list.
    pub fn children_in_context(&mut self, id: NodeId, allow_empty: bool) -> Option<NodeId> {
        let node = *self.node(id);
        let (open, cached) = match node.shape {
            Shape::List { open, children, .. } | Shape::Arguments { open, children, .. } => {
                (open, children)
            }
            _ => return None,
        };
        if cached.is_some() {
            return cached;
        }
        match self.lexer.tokenize_sexpr(open) {
            Some((first, last)) => {
                let head = self.parse_range(first, last);
                match &mut self.node_mut(id).shape {
                    Shape::List { children, .. } | Shape::Arguments { children, .. } => {
                        *children = head;
                    }
                    _ => {}
                }
                head
            }
            None => {
                self.report_empty(id, open, allow_empty);
                None
            }
        }
    }

    /// Re-parses the interior on every call and caches nothing. The token
    /// range underneath is still cached, so repeated calls see identical
    /// text and emit no lexical diagnostics; the node ids differ per call.
    pub fn peek_children(&mut self, id: NodeId) -> Option<NodeId> {
        let node = *self.node(id);
        let open = match node.shape {
            Shape::List { open, .. } | Shape::Arguments { open, .. } => open,
            _ => return None,
        };
        match self.lexer.tokenize_sexpr(open) {
            Some((first, last)) => self.parse_range(first, last),
            None => {
                self.report_empty(id, open, false);
                None
            }
        }
    }

    fn report_empty(&mut self, id: NodeId, open: TokenId, allow_empty: bool) {
        if !D::DISALLOW_EMPTY_SEXPR || allow_empty {
            return;
        }
        let already = match self.node(id).shape {
            Shape::List { empty_reported, .. } => empty_reported,
            _ => true,
        };
        if already {
            return;
        }
        let token = *self.lexer.token(open);
        let d = Diagnostic::empty_sexpr(self.lexer.origin(), token.line, token.column);
        self.lexer.diagnostics_mut().push(d);
        if let Shape::List { empty_reported, .. } = &mut self.node_mut(id).shape {
            *empty_reported = true;
        }
    }

    /// Converts the interior token range of one list into a child chain,
    /// walking backward from `last` to `first`.
    fn parse_range(&mut self, first: TokenId, last: TokenId) -> Option<NodeId> {
        let mut head: Option<NodeId> = None;
        let mut index = last.0;
        loop {
            let token = *self.lexer.token(TokenId(index));
            let id = match token.kind {
                TokenKind::RightParen => {
                    // Nested lists always appear as an adjacent open/close
                    // placeholder pair.
                    debug_assert!(index > first.0);
                    let open = index - 1;
                    let node =
                        NodeId(self.nodes.push(Node::list(TokenId(open), TokenId(index), head)));
                    index = open;
                    node
                }
                kind if kind.is_operator() => {
                    NodeId(
                        self.nodes
                            .push(Node::atom(TokenId(index), NodeKind::Operator, head)),
                    )
                }
                kind if kind.is_dialect_special::<D>() => {
                    let node = D::parse_special(self, TokenId(index));
                    self.node_mut(node).next = head;
                    node
                }
                TokenKind::Invalid => {
                    // The scan already reported this token.
                    NodeId(self.nodes.push(Node::error(TokenId(index), head)))
                }
                kind => NodeId(self.nodes.push(Node::atom(
                    TokenId(index),
                    NodeKind::from_token(kind),
                    head,
                ))),
            };
            head = Some(id);
            if index == first.0 {
                break;
            }
            index -= 1;
        }
        head
    }

    /// The node following `id` in traversal order.
    ///
    /// Non-list nodes return their stored link. A list whose successor has
    /// not been discovered consults the index-table successor of its open
    /// paren: the next s-expression is materialized (and cached as the
    /// stored link), or the end-of-program atom is returned at end of input.
    pub fn next_node(&mut self, id: NodeId) -> Option<NodeId> {
        let node = *self.node(id);
        if node.next.is_some() {
            return node.next;
        }
        match node.shape {
            Shape::List { open, .. } | Shape::Arguments { open, .. } => {
                match self.lexer.next_sexpr(open) {
                    Some((next_open, next_close)) => {
                        let next =
                            NodeId(self.nodes.push(Node::list(next_open, next_close, None)));
                        self.node_mut(id).next = Some(next);
                        Some(next)
                    }
                    None => Some(self.end_of_program),
                }
            }
            _ => None,
        }
    }

    /// The trivia run attached to this node's head token, materialized on
    /// first request and cached. `None` when the token carries none.
    pub fn node_trivia(&mut self, id: NodeId) -> Option<AuxiliaryId> {
        let node = *self.node(id);
        if node.aux.is_some() {
            return node.aux;
        }
        let (first, last) = self.lexer.token_trivia(node.head_token())?;
        let aux = AuxiliaryId(self.auxiliaries.push(Auxiliary { first, last }));
        self.node_mut(id).aux = Some(aux);
        Some(aux)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(id.0)
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(id.0)
    }

    #[inline]
    pub fn end_of_program(&self) -> NodeId {
        self.end_of_program
    }

    #[inline]
    pub fn token(&self, id: TokenId) -> &Token {
        self.lexer.token(id)
    }

    #[inline]
    pub fn token_bytes(&self, id: TokenId) -> &[u8] {
        self.lexer.token_bytes(id)
    }

    /// Materializes the trivia attached to one token. Formatters reprint a
    /// file by emitting, for each token, its trivia and then its text.
    pub fn token_trivia(&mut self, id: TokenId) -> Option<(TokenId, TokenId)> {
        self.lexer.token_trivia(id)
    }

    #[inline]
    pub fn auxiliary(&self, id: AuxiliaryId) -> &Auxiliary {
        self.auxiliaries.get(id.0)
    }

    /// Source bytes covered by one auxiliary run, first span through last.
    pub fn auxiliary_bytes(&self, id: AuxiliaryId) -> &[u8] {
        let aux = *self.auxiliary(id);
        let first = self.lexer.token(aux.first);
        let last = self.lexer.token(aux.last);
        let start = first.at as usize;
        let end = (last.at + last.len) as usize;
        &self.lexer.source().padded()[start..end]
    }

    /// Source bytes covered by a node; lists span open paren through close
    /// paren inclusive (clamped to the real input for recovered lists).
    pub fn node_bytes(&self, id: NodeId) -> &[u8] {
        let node = self.node(id);
        let source_len = self.lexer.source().len();
        match node.shape {
            Shape::Atom { token, .. } | Shape::Error { token } => self.lexer.token_bytes(token),
            Shape::List { open, close, .. } | Shape::Arguments { open, close, .. } => {
                let open_token = self.lexer.token(open);
                let close_token = self.lexer.token(close);
                let start = open_token.at as usize;
                let end = ((close_token.at + close_token.len) as usize).min(source_len);
                &self.lexer.source().padded()[start..end]
            }
        }
    }

    pub fn node_text(&self, id: NodeId) -> Cow<'_, str> {
        String::from_utf8_lossy(self.node_bytes(id))
    }

    pub fn source_location(&self, id: NodeId) -> SourceLoc {
        self.lexer.token(self.node(id).head_token()).location()
    }

    #[inline]
    pub fn diagnostics(&self) -> &DiagnosticSet {
        self.lexer.diagnostics()
    }

    #[inline]
    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticSet {
        self.lexer.diagnostics_mut()
    }

    #[inline]
    pub fn origin(&self) -> &str {
        self.lexer.origin()
    }

    #[inline]
    pub fn lexer(&self) -> &Lexer<D> {
        &self.lexer
    }

    // ----- dialect hook surface ---------------------------------------------

    /// Allocates an atom node for a dialect hook. The hook returns the node
    /// to the child parser, which threads the sibling link.
    pub fn alloc_atom(&mut self, token: TokenId, kind: NodeKind) -> NodeId {
        NodeId(self.nodes.push(Node::atom(token, kind, None)))
    }

    /// Allocates an arguments node wrapping a nested list's token pair.
    pub fn alloc_arguments(&mut self, open: TokenId, close: TokenId) -> NodeId {
        NodeId(self.nodes.push(Node::arguments(open, close, None)))
    }

    /// Reports an unrecognized token and produces an error node for it.
    pub fn on_unrecognized(&mut self, token: TokenId) -> NodeId {
        let t = *self.lexer.token(token);
        let text = String::from_utf8_lossy(self.lexer.token_bytes(token)).into_owned();
        let d = Diagnostic::unrecognized_token(self.lexer.origin(), t.line, t.column, &text);
        self.lexer.diagnostics_mut().push(d);
        NodeId(self.nodes.push(Node::error(token, None)))
    }

    /// Rewinds every arena and cache so the same buffer can be re-parsed.
    /// Diagnostics are kept, per the reuse contract.
    pub fn reuse(&mut self) {
        self.lexer.reuse();
        self.nodes.reset();
        self.auxiliaries.reset();
        self.end_of_program = NodeId(self.nodes.push(Node::atom(
            Lexer::<D>::EOF_TOKEN,
            NodeKind::EndOfProgram,
            None,
        )));
        self.root = None;
        self.parsed = false;
    }
}
