//! The lazy parse tree and its entry points.

pub mod node;
pub mod parser;
pub mod visitor;

use std::borrow::Cow;
use std::io;
use std::path::Path;

use crate::diagnostics::DiagnosticSet;
use crate::dialect::{DefaultDialect, Dialect};
use crate::lexer::token::{SourceLoc, Token, TokenId};
use crate::source::PaddedSource;
use node::{Auxiliary, AuxiliaryId, Node, NodeId};
use parser::Parser;
use visitor::Visitor;

/// Outcome of a whole-input parse. `success` is true iff no error-severity
/// diagnostic was produced; the tree is returned either way, possibly
/// partial, so callers can still walk what parsed.
pub struct ParseResult<D: Dialect = DefaultDialect> {
    pub success: bool,
    pub tree: ParseTree<D>,
}

/// A parsed program: the root list plus everything needed to materialize
/// the rest of the tree on demand.
pub struct ParseTree<D: Dialect = DefaultDialect> {
    parser: Parser<D>,
}

impl<D: Dialect> ParseTree<D> {
    /// Parses an in-memory program; diagnostics cite the origin `memory`.
    pub fn parse_str(program: &str, conservative: bool) -> ParseResult<D> {
        Self::parse_source(PaddedSource::from_str(program), "memory", conservative)
    }

    pub fn parse_bytes(program: &[u8], conservative: bool) -> ParseResult<D> {
        Self::parse_source(PaddedSource::from_bytes(program), "memory", conservative)
    }

    pub fn parse_source(source: PaddedSource, origin: &str, conservative: bool) -> ParseResult<D> {
        let mut parser = Parser::with_origin(source, origin, conservative);
        parser.parse();
        let success = !parser.diagnostics().has_errors();
        ParseResult {
            success,
            tree: ParseTree { parser },
        }
    }

    pub fn parse_file<P: AsRef<Path>>(path: P, conservative: bool) -> io::Result<ParseResult<D>> {
        let mut parser = Parser::from_path(path, conservative)?;
        parser.parse();
        let success = !parser.diagnostics().has_errors();
        Ok(ParseResult {
            success,
            tree: ParseTree { parser },
        })
    }

    /// The root list node; `None` when the input held no s-expression.
    #[inline]
    pub fn root(&mut self) -> Option<NodeId> {
        self.parser.parse()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        self.parser.node(id)
    }

    #[inline]
    pub fn token(&self, id: TokenId) -> &Token {
        self.parser.token(id)
    }

    #[inline]
    pub fn token_bytes(&self, id: TokenId) -> &[u8] {
        self.parser.token_bytes(id)
    }

    #[inline]
    pub fn token_trivia(&mut self, id: TokenId) -> Option<(TokenId, TokenId)> {
        self.parser.token_trivia(id)
    }

    #[inline]
    pub fn children(&mut self, id: NodeId) -> Option<NodeId> {
        self.parser.children(id)
    }

    #[inline]
    pub fn children_in_context(&mut self, id: NodeId, allow_empty: bool) -> Option<NodeId> {
        self.parser.children_in_context(id, allow_empty)
    }

    #[inline]
    pub fn peek_children(&mut self, id: NodeId) -> Option<NodeId> {
        self.parser.peek_children(id)
    }

    #[inline]
    pub fn next_node(&mut self, id: NodeId) -> Option<NodeId> {
        self.parser.next_node(id)
    }

    #[inline]
    pub fn end_of_program(&self) -> NodeId {
        self.parser.end_of_program()
    }

    #[inline]
    pub fn node_trivia(&mut self, id: NodeId) -> Option<AuxiliaryId> {
        self.parser.node_trivia(id)
    }

    #[inline]
    pub fn auxiliary(&self, id: AuxiliaryId) -> &Auxiliary {
        self.parser.auxiliary(id)
    }

    #[inline]
    pub fn auxiliary_bytes(&self, id: AuxiliaryId) -> &[u8] {
        self.parser.auxiliary_bytes(id)
    }

    #[inline]
    pub fn node_bytes(&self, id: NodeId) -> &[u8] {
        self.parser.node_bytes(id)
    }

    #[inline]
    pub fn node_text(&self, id: NodeId) -> Cow<'_, str> {
        self.parser.node_text(id)
    }

    #[inline]
    pub fn source_location(&self, id: NodeId) -> SourceLoc {
        self.parser.source_location(id)
    }

    #[inline]
    pub fn diagnostics(&self) -> &DiagnosticSet {
        self.parser.diagnostics()
    }

    #[inline]
    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticSet {
        self.parser.diagnostics_mut()
    }

    #[inline]
    pub fn origin(&self) -> &str {
        self.parser.origin()
    }

    #[inline]
    pub fn parser(&mut self) -> &mut Parser<D> {
        &mut self.parser
    }

    /// Dispatches one node (and its subtree) to the matching visitor entry
    /// point.
    pub fn accept<V: Visitor>(&mut self, id: NodeId, visitor: &mut V) {
        visitor::dispatch(self, id, visitor, true);
    }

    /// Walks the tree with the caching accessor.
    pub fn walk<V: Visitor>(&mut self, visitor: &mut V) {
        visitor::walk(self, visitor);
    }

    /// Walks the tree, re-parsing children without caching.
    pub fn walk_fresh<V: Visitor>(&mut self, visitor: &mut V) {
        visitor::walk_fresh(self, visitor);
    }

    /// Rewinds the parser and re-parses the same buffer. Diagnostics
    /// accumulate across parses unless cleared first. Returns the new
    /// success flag.
    pub fn reparse(&mut self) -> bool {
        self.parser.reuse();
        self.parser.parse();
        !self.parser.diagnostics().has_errors()
    }
}
