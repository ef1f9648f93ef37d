//! # Sibilant
//!
//! A high-throughput, incremental, diagnostic-producing parser for
//! Lisp-family surface syntax.
//!
//! The input is classified once, in 32-byte SIMD tiles, into per-byte
//! masks; a single pass over the masks pairs every `(` with its `)`.
//! Everything after that is lazy: tokens materialize one s-expression
//! interior at a time, and list nodes parse their children only when a
//! caller asks. Whitespace and comments are preserved as trivia attached to
//! the following structural token, so a formatter can reprint a file by
//! emitting, for each token, its trivia and then its text.
//!
//! ## Quick Start
//!
//! ```
//! use sibilant::{walk, AtomView, DefaultDialect, ParseTree, Visitor};
//!
//! let result = ParseTree::<DefaultDialect>::parse_str("(+ 1 (* 2 3))", true);
//! assert!(result.success);
//! let mut tree = result.tree;
//!
//! struct Atoms(Vec<String>);
//! impl Visitor for Atoms {
//!     fn visit_atom(&mut self, atom: &AtomView<'_>) {
//!         self.0.push(atom.text_lossy().into_owned());
//!     }
//! }
//!
//! let mut atoms = Atoms(Vec::new());
//! walk(&mut tree, &mut atoms);
//! assert_eq!(atoms.0, ["+", "1", "*", "2", "3"]);
//! ```
//!
//! ## Architecture
//!
//! 1. **Classifier** - per-tile bitmasks, AVX2 with a bitwise-identical
//!    scalar fallback
//! 2. **Index builder** - paired open/close records with source locations
//! 3. **On-demand tokenizer** - tokens for one list interior at a time
//! 4. **Lazy tree** - arena-allocated nodes over token slices, children
//!    parsed on first access
//!
//! Errors never abort a parse: they accumulate in a [`DiagnosticSet`] and
//! the tree stays walkable, possibly partially.

pub mod arena;
pub mod diagnostics;
pub mod dialect;
pub mod lexer;
pub mod source;
pub mod tree;

pub use diagnostics::{Diagnostic, DiagnosticSet, ErrorCode, Severity};
pub use dialect::{Clojure, CommonLisp, DefaultDialect, Dialect};
pub use lexer::token::{SexprId, SourceLoc, Token, TokenId, TokenKind};
pub use lexer::{arena_size_estimate, Lexer};
pub use source::{PaddedSource, EOF_BYTE, PADDING};
pub use tree::node::{Auxiliary, AuxiliaryId, Node, NodeId, NodeKind, Shape};
pub use tree::parser::Parser;
pub use tree::visitor::{dispatch, walk, walk_fresh, AtomView, ListView, Visitor};
pub use tree::{ParseResult, ParseTree};
