//! Compile-time dialect configuration.
//!
//! A dialect is a set of boolean punctuation switches, keyword spellings,
//! and one overridable parse hook, all resolved at monomorphization time.
//! The classifier's shuffle tables and the SWAR keyword images are derived
//! from the associated consts, so flipping a switch reshapes the lexer with
//! zero runtime dispatch.
//!
//! `let`, `and`, `or`, `not` and `if` keep their fixed spellings in every
//! dialect; only the definer, lambda, boolean and nil spellings vary.

use crate::lexer::classify::ClassTables;
use crate::lexer::token::{keyword_image, TokenId, TokenKind};
use crate::tree::node::{NodeId, NodeKind};
use crate::tree::parser::Parser;

pub trait Dialect: Sized {
    /// `#` is recognized and dialect-special.
    const HASH: bool = false;
    /// `,` is recognized and dialect-special.
    const COMMA: bool = false;
    /// `[` and `]` are recognized as structural atoms.
    const BRACKETS: bool = false;
    /// `` ` `` is recognized and dialect-special.
    const BACKTICK: bool = false;
    /// `:` is recognized and dialect-special.
    const COLON: bool = false;
    /// `@` is recognized and dialect-special.
    const AT_SIGN: bool = false;
    /// `$` is recognized and dialect-special.
    const DOLLAR: bool = false;
    /// `~` is recognized and dialect-special.
    const TILDE: bool = false;
    /// `-` is accepted as an identifier continuation.
    const DASH_IN_IDENTIFIERS: bool = false;
    /// `()` produces an empty-s-expression diagnostic.
    const DISALLOW_EMPTY_SEXPR: bool = false;

    const FUNC_KEYWORD: &'static str = "defun";
    const MACRO_KEYWORD: &'static str = "defmacro";
    const VAR_KEYWORD: &'static str = "defvar";
    const LAMBDA_KEYWORD: &'static str = "lambda";
    const TRUE_LITERAL: &'static str = "true";
    const FALSE_LITERAL: &'static str = "false";
    const NIL_KEYWORD: &'static str = "nil";

    #[doc(hidden)]
    const TABLES: ClassTables = ClassTables::build(
        Self::HASH,
        Self::COMMA,
        Self::BRACKETS,
        Self::BACKTICK,
        Self::COLON,
        Self::AT_SIGN,
        Self::DOLLAR,
        Self::DASH_IN_IDENTIFIERS,
    );

    #[doc(hidden)]
    const FUNC_IMAGE: u64 = keyword_image(Self::FUNC_KEYWORD);
    #[doc(hidden)]
    const MACRO_IMAGE: u64 = keyword_image(Self::MACRO_KEYWORD);
    #[doc(hidden)]
    const VAR_IMAGE: u64 = keyword_image(Self::VAR_KEYWORD);
    #[doc(hidden)]
    const LAMBDA_IMAGE: u64 = keyword_image(Self::LAMBDA_KEYWORD);
    #[doc(hidden)]
    const TRUE_IMAGE: u64 = keyword_image(Self::TRUE_LITERAL);
    #[doc(hidden)]
    const FALSE_IMAGE: u64 = keyword_image(Self::FALSE_LITERAL);
    #[doc(hidden)]
    const NIL_IMAGE: u64 = keyword_image(Self::NIL_KEYWORD);

    /// Turns one dialect-special token into a node while the child parser
    /// walks a list interior. The default accepts backtick, comma and
    /// at-sign as operator atoms and reports anything else as an
    /// unrecognized token.
    fn parse_special(parser: &mut Parser<Self>, token: TokenId) -> NodeId {
        match parser.token(token).kind {
            TokenKind::Backtick | TokenKind::Comma | TokenKind::At => {
                parser.alloc_atom(token, NodeKind::Operator)
            }
            _ => parser.on_unrecognized(token),
        }
    }
}

/// All switches off, classic spellings. The baseline dialect.
pub struct DefaultDialect;

impl Dialect for DefaultDialect {}

/// Common Lisp flavored: `t`/`nil` booleans, dashes in identifiers, reader
/// punctuation for quasiquotation.
pub struct CommonLisp;

impl Dialect for CommonLisp {
    const BACKTICK: bool = true;
    const COMMA: bool = true;
    const AT_SIGN: bool = true;
    const DASH_IN_IDENTIFIERS: bool = true;
    const TRUE_LITERAL: &'static str = "t";
    const FALSE_LITERAL: &'static str = "nil";
}

/// Clojure flavored: `defn`, brackets, keyword colons, hash/comma/at
/// punctuation, dashes in identifiers. The hook widens the base behavior to
/// also accept `:` (the keyword marker) and `#` (reader dispatch) as
/// operator atoms.
pub struct Clojure;

impl Dialect for Clojure {
    const HASH: bool = true;
    const COMMA: bool = true;
    const BRACKETS: bool = true;
    const BACKTICK: bool = true;
    const COLON: bool = true;
    const AT_SIGN: bool = true;
    const DASH_IN_IDENTIFIERS: bool = true;
    const FUNC_KEYWORD: &'static str = "defn";

    fn parse_special(parser: &mut Parser<Self>, token: TokenId) -> NodeId {
        match parser.token(token).kind {
            TokenKind::Colon | TokenKind::Hash => parser.alloc_atom(token, NodeKind::Operator),
            TokenKind::Backtick | TokenKind::Comma | TokenKind::At => {
                parser.alloc_atom(token, NodeKind::Operator)
            }
            _ => parser.on_unrecognized(token),
        }
    }
}
