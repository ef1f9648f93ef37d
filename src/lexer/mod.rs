//! The classifier-lexer.
//!
//! One eager pass runs over the whole input: [`classify`] emits the per-tile
//! masks, then `scan` walks them once, pairing every `(` with its `)` into
//! [`SexprIndex`] records and reporting every lexical problem it meets. No
//! tokens exist yet at that point.
//!
//! Tokens are materialized on demand, one s-expression interior at a time,
//! by [`Lexer::tokenize_sexpr`]. Nested lists appear as a placeholder
//! open/close pair whose own interior stays untokenized until asked for.
//! Whitespace and comment runs become trivia spans attached to the next
//! structural token; the closing paren receives whatever trails the last
//! inner token, which is why its span is patched at the end of the region.
//!
//! Tokenizing the same interior twice returns the identical token range:
//! the produced range is cached in the s-expression record, and lexical
//! diagnostics are only ever emitted by the eager scan.

pub mod classify;
pub mod token;

use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::arena::MonoArena;
use crate::diagnostics::{Diagnostic, DiagnosticSet};
use crate::dialect::{DefaultDialect, Dialect};
use crate::source::{PaddedSource, EOF_BYTE};
use classify::classify;
use token::{
    keyword_image, SexprId, SexprIndex, TileMasks, Token, TokenId, TokenKind, TriviaSpan,
    AUX_UNRESOLVED, INTERIOR_EMPTY, INTERIOR_UNTOKENIZED, TILE,
};

const LET_IMAGE: u64 = keyword_image("let");
const AND_IMAGE: u64 = keyword_image("and");
const NOT_IMAGE: u64 = keyword_image("not");
const OR_IMAGE: u64 = keyword_image("or");
const IF_IMAGE: u64 = keyword_image("if");

/// Suggested arena capacity, in elements, for an input of `input_len` bytes.
///
/// Tiered: small inputs share one small size, mid-size inputs pick between a
/// conservative and a default tier, and large inputs scale with the input so
/// a single parse never exhausts a mono arena.
pub fn arena_size_estimate(input_len: usize, conservative: bool) -> usize {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;

    if input_len <= 16 * KIB {
        return 64 * KIB;
    }
    if input_len <= 256 * KIB {
        return if conservative { 256 * KIB } else { 512 * KIB };
    }
    input_len.max(MIB)
}

#[inline]
fn is_fragment_byte(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

#[inline]
fn low_mask(n: u32) -> u32 {
    if n >= 32 {
        u32::MAX
    } else {
        (1u32 << n) - 1
    }
}

pub struct Lexer<D: Dialect = DefaultDialect> {
    source: PaddedSource,
    origin: Box<str>,
    tiles: MonoArena<TileMasks>,
    sexprs: MonoArena<SexprIndex>,
    tokens: MonoArena<Token>,
    trivia: MonoArena<TriviaSpan>,
    diagnostics: DiagnosticSet,
    pos: u32,
    line: u32,
    column: u32,
    tokenized: bool,
    _dialect: PhantomData<D>,
}

impl<D: Dialect> Lexer<D> {
    /// Token 0 of every lexer: the shared end-of-file token.
    pub const EOF_TOKEN: TokenId = TokenId(0);

    pub fn from_source(source: PaddedSource, conservative: bool) -> Self {
        Self::with_origin(source, "memory", conservative)
    }

    pub fn with_origin(source: PaddedSource, origin: &str, conservative: bool) -> Self {
        let estimate = arena_size_estimate(source.len(), conservative);
        let tile_count = source.padded().len() / TILE as usize + 2;
        let mut lexer = Lexer {
            source,
            origin: origin.into(),
            tiles: MonoArena::with_capacity(tile_count.next_power_of_two()),
            sexprs: MonoArena::with_capacity((estimate / 2).next_power_of_two()),
            tokens: MonoArena::with_capacity(estimate.next_power_of_two()),
            trivia: MonoArena::with_capacity((estimate / 2).next_power_of_two()),
            diagnostics: DiagnosticSet::new(),
            pos: 0,
            line: 1,
            column: 1,
            tokenized: false,
            _dialect: PhantomData,
        };
        // Token 0 is the shared end-of-file token.
        lexer.tokens.push(Token::END_OF_FILE);
        lexer
    }

    /// Runs classification and the eager scan. Returns `true` when no
    /// error-severity diagnostic has been recorded. Idempotent until
    /// [`reuse`](Lexer::reuse).
    pub fn tokenize(&mut self) -> bool {
        if !self.tokenized {
            classify(&self.source, &D::TABLES, &mut self.tiles);
            self.scan();
            self.tokenized = true;
        }
        !self.diagnostics.has_errors()
    }

    /// Open/close token pair for the first top-level s-expression, with any
    /// leading trivia attached to the open paren. Emits
    /// program-must-start-with-s-expression when there is none.
    pub fn first_sexpr(&mut self) -> Option<(TokenId, TokenId)> {
        if self.sexprs.is_empty() {
            let d = Diagnostic::program_must_start_with_sexpr(&self.origin, 1, 1);
            self.diagnostics.push(d);
            return None;
        }
        let first = *self.sexprs.get(0);
        let lead = self.source.byte(0);
        let (aux_at, aux_len) = if first.open > 0 && (lead == b';' || is_fragment_byte(lead)) {
            let span = self.trivia.push(TriviaSpan {
                at: 0,
                len: first.open,
            });
            (span, 1u8)
        } else {
            (0, 0)
        };
        Some(self.push_sexpr_pair(&first, SexprId(0), aux_at, aux_len))
    }

    /// Open/close token pair for the s-expression following the one `open`
    /// belongs to, at the same or a shallower depth. `None` at end of input.
    pub fn next_sexpr(&mut self, open: TokenId) -> Option<(TokenId, TokenId)> {
        let open_token = *self.token(open);
        debug_assert_eq!(open_token.kind, TokenKind::LeftParen);
        let current = *self.sexprs.get(open_token.sexpr);
        if current.next >= self.sexprs.len() {
            return None;
        }
        let next_index = current.next;
        let next = *self.sexprs.get(next_index);
        let gap = current.close + 1;
        let lead = self.source.byte(gap);
        let (aux_at, aux_len) = if next.open > gap && (lead == b';' || is_fragment_byte(lead)) {
            let span = self.trivia.push(TriviaSpan {
                at: gap,
                len: next.open - gap,
            });
            (span, 1u8)
        } else {
            (0, 0)
        };
        Some(self.push_sexpr_pair(&next, SexprId(next_index), aux_at, aux_len))
    }

    fn push_sexpr_pair(
        &mut self,
        record: &SexprIndex,
        id: SexprId,
        aux_at: u32,
        aux_len: u8,
    ) -> (TokenId, TokenId) {
        let open = TokenId(self.tokens.push(Token {
            at: record.open,
            len: 1,
            line: record.open_line,
            column: record.open_column,
            aux_at,
            sexpr: id.0,
            kind: TokenKind::LeftParen,
            aux_len,
        }));
        let close = TokenId(self.tokens.push(Token {
            at: record.close,
            len: 1,
            line: record.close_line,
            column: record.close_column,
            aux_at: 0,
            sexpr: id.0,
            kind: TokenKind::RightParen,
            aux_len: AUX_UNRESOLVED,
        }));
        (open, close)
    }

    /// Materializes the tokens immediately inside the list whose open paren
    /// is `open`, stopping at its paired close. Nested lists contribute one
    /// placeholder open/close pair and are skipped over. Returns `None` for
    /// an empty interior.
    ///
    /// The produced range is cached per s-expression: a second call returns
    /// the same token ids and emits nothing.
    pub fn tokenize_sexpr(&mut self, open: TokenId) -> Option<(TokenId, TokenId)> {
        let open_token = *self.token(open);
        debug_assert_eq!(open_token.kind, TokenKind::LeftParen);
        let sexpr_index = open_token.sexpr;
        let cached = *self.sexprs.get(sexpr_index);
        if cached.tok_first == INTERIOR_EMPTY {
            return None;
        }
        if cached.tok_first != INTERIOR_UNTOKENIZED {
            return Some((TokenId(cached.tok_first), TokenId(cached.tok_last)));
        }

        self.pos = cached.open + 1;
        self.line = cached.open_line;
        self.column = cached.open_column + 1;
        let end = cached.close;
        let mut peek = sexpr_index + 1;
        let first_new = self.tokens.len();
        // Count of trivia runs awaiting the next token.
        let mut pending: u8 = 0;

        while self.pos < end {
            let p = self.pos;
            let b = self.source.byte(p);

            if b == b'(' {
                let nested = *self.sexprs.get(peek);
                self.tokens.push(Token {
                    at: nested.open,
                    len: 1,
                    line: nested.open_line,
                    column: nested.open_column,
                    aux_at: self.trivia.len() - pending as u32,
                    sexpr: peek,
                    kind: TokenKind::LeftParen,
                    aux_len: pending,
                });
                self.tokens.push(Token {
                    at: nested.close,
                    len: 1,
                    line: nested.close_line,
                    column: nested.close_column,
                    aux_at: 0,
                    sexpr: peek,
                    kind: TokenKind::RightParen,
                    aux_len: AUX_UNRESOLVED,
                });
                self.pos = nested.close + 1;
                self.line = nested.close_line;
                self.column = nested.close_column + 1;
                peek = nested.next;
                pending = 0;
                continue;
            }
            if b == b';' {
                let (span, newline) = self.comment_span(p);
                self.trivia.push(TriviaSpan { at: p, len: span });
                self.pos = p + span;
                if newline {
                    self.line += 1;
                    self.column = 1;
                } else {
                    self.column += span;
                }
                pending = pending.saturating_add(1).min(AUX_UNRESOLVED - 1);
                continue;
            }
            if self.tile_bit(p, |t| t.fragment) {
                let span = self.mask_run(p, |t| t.fragment);
                self.trivia.push(TriviaSpan { at: p, len: span });
                self.advance_over(p, span);
                pending = pending.saturating_add(1).min(AUX_UNRESOLVED - 1);
                continue;
            }

            let aux_at = self.trivia.len() - pending as u32;
            let line = self.line;
            let column = self.column;
            if self.tile_bit(p, |t| t.structural) {
                self.tokens.push(Token {
                    at: p,
                    len: 1,
                    line,
                    column,
                    aux_at,
                    sexpr: 0,
                    kind: TokenKind::from_byte(b),
                    aux_len: pending,
                });
                self.pos += 1;
                self.column += 1;
            } else if self.tile_bit(p, |t| t.digit) {
                let (span, _) = self.real_span(p);
                self.tokens.push(Token {
                    at: p,
                    len: span,
                    line,
                    column,
                    aux_at,
                    sexpr: 0,
                    kind: TokenKind::RealLiteral,
                    aux_len: pending,
                });
                self.pos += span;
                self.column += span;
            } else if self.tile_bit(p, |t| t.ident) {
                let span = self.mask_run(p, |t| t.ident);
                let kind = self.keyword_kind(p, span);
                self.tokens.push(Token {
                    at: p,
                    len: span,
                    line,
                    column,
                    aux_at,
                    sexpr: 0,
                    kind,
                    aux_len: pending,
                });
                self.pos += span;
                self.column += span;
            } else if self.tile_bit(p, |t| t.string) {
                let (span, _) = self.string_span(p);
                self.tokens.push(Token {
                    at: p,
                    len: span,
                    line,
                    column,
                    aux_at,
                    sexpr: 0,
                    kind: TokenKind::StringLiteral,
                    aux_len: pending,
                });
                self.advance_over(p, span);
            } else if Self::is_fallback_operator(b) {
                let (kind, op_len) = self.op_token(p);
                self.tokens.push(Token {
                    at: p,
                    len: op_len,
                    line,
                    column,
                    aux_at,
                    sexpr: 0,
                    kind,
                    aux_len: pending,
                });
                self.pos += op_len;
                self.column += op_len;
            } else if b == EOF_BYTE || b == 0 {
                self.tokens.push(Token {
                    at: p,
                    len: 1,
                    line,
                    column,
                    aux_at,
                    sexpr: 0,
                    kind: TokenKind::EndOfFile,
                    aux_len: pending,
                });
                pending = 0;
                break;
            } else {
                // The scan already reported this byte.
                self.tokens.push(Token {
                    at: p,
                    len: 1,
                    line,
                    column,
                    aux_at,
                    sexpr: 0,
                    kind: TokenKind::Invalid,
                    aux_len: pending,
                });
                self.pos += 1;
                self.column += 1;
            }
            pending = 0;
        }

        // The close paren owns the trivia after the last inner token. This
        // must happen before the empty check so a trivia-only interior still
        // resolves the close paren's sentinel.
        let close = open.0 + 1;
        let trivia_len = self.trivia.len();
        let close_token = self.tokens.get_mut(close);
        close_token.aux_at = trivia_len - pending as u32;
        close_token.aux_len = pending;

        let token_len = self.tokens.len();
        let record = self.sexprs.get_mut(sexpr_index);
        if first_new == token_len {
            record.tok_first = INTERIOR_EMPTY;
            record.tok_last = INTERIOR_EMPTY;
            return None;
        }
        record.tok_first = first_new;
        record.tok_last = token_len - 1;
        Some((TokenId(first_new), TokenId(token_len - 1)))
    }

    /// Materializes the trivia attached to `token` as comment/fragment
    /// tokens. `None` when the token carries no trivia; fetching trivia of a
    /// close paren whose list has not been tokenized yet is an error.
    pub fn token_trivia(&mut self, id: TokenId) -> Option<(TokenId, TokenId)> {
        let token = *self.token(id);
        if token.aux_len == AUX_UNRESOLVED {
            let text = String::from_utf8_lossy(self.token_bytes(id)).into_owned();
            let d = Diagnostic::auxiliary_of_lazy_token(&self.origin, token.line, token.column, &text);
            self.diagnostics.push(d);
            return None;
        }
        if token.aux_len == 0 {
            return None;
        }
        let first = self.tokens.len();
        for i in 0..token.aux_len as u32 {
            let span = *self.trivia.get(token.aux_at + i);
            let kind = if self.source.byte(span.at) == b';' {
                TokenKind::Comment
            } else {
                TokenKind::Fragment
            };
            self.tokens.push(Token {
                at: span.at,
                len: span.len,
                line: 0,
                column: 0,
                aux_at: 0,
                sexpr: 0,
                kind,
                aux_len: 0,
            });
        }
        Some((TokenId(first), TokenId(self.tokens.len() - 1)))
    }

    #[inline]
    pub fn token(&self, id: TokenId) -> &Token {
        self.tokens.get(id.0)
    }

    pub fn token_bytes(&self, id: TokenId) -> &[u8] {
        let token = self.token(id);
        let start = token.at as usize;
        let end = (token.at + token.len) as usize;
        &self.source.padded()[start..end]
    }

    #[inline]
    pub fn token_count(&self) -> u32 {
        self.tokens.len()
    }

    #[inline]
    pub fn sexpr(&self, id: SexprId) -> &SexprIndex {
        self.sexprs.get(id.0)
    }

    #[inline]
    pub fn sexpr_count(&self) -> u32 {
        self.sexprs.len()
    }

    #[inline]
    pub fn source(&self) -> &PaddedSource {
        &self.source
    }

    #[inline]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[inline]
    pub fn diagnostics(&self) -> &DiagnosticSet {
        &self.diagnostics
    }

    #[inline]
    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticSet {
        &mut self.diagnostics
    }

    /// Rewinds every arena and cache so the same buffer can be re-lexed.
    /// Diagnostics are kept; clear them through
    /// [`diagnostics_mut`](Lexer::diagnostics_mut) if a clean slate is wanted.
    pub fn reuse(&mut self) {
        self.tiles.reset();
        self.sexprs.reset();
        self.tokens.reset();
        self.trivia.reset();
        self.tokens.push(Token::END_OF_FILE);
        self.pos = 0;
        self.line = 1;
        self.column = 1;
        self.tokenized = false;
    }

    // ----- the eager pass ---------------------------------------------------

    /// Walks the masks once, recording paired open/close positions with
    /// their source locations and reporting every lexical problem. Apart
    /// from parens, only whitespace and comments may appear at depth zero.
    fn scan(&mut self) {
        let len = self.source.len() as u32;
        let mut stack: SmallVec<[u32; 32]> = SmallVec::new();
        self.pos = 0;
        self.line = 1;
        self.column = 1;

        loop {
            let p = self.pos;
            if p >= len {
                break;
            }
            let b = self.source.byte(p);
            if b == EOF_BYTE || b == 0 {
                break;
            }

            match b {
                b'(' => {
                    stack.push(self.sexprs.len());
                    self.sexprs
                        .push(SexprIndex::opened_at(p, self.line, self.column));
                    self.pos += 1;
                    self.column += 1;
                    continue;
                }
                b')' => {
                    if let Some(open_index) = stack.pop() {
                        let next = self.sexprs.len();
                        let record = self.sexprs.get_mut(open_index);
                        record.close = p;
                        record.close_line = self.line;
                        record.close_column = self.column;
                        record.next = next;
                    } else {
                        let d =
                            Diagnostic::no_matching_open(&self.origin, self.line, self.column);
                        self.diagnostics.push(d);
                    }
                    self.pos += 1;
                    self.column += 1;
                    continue;
                }
                _ => {}
            }

            let at_top_level = stack.is_empty();
            let line = self.line;
            let column = self.column;

            if b == b';' {
                let (span, newline) = self.comment_span(p);
                self.pos = p + span;
                if newline {
                    self.line += 1;
                    self.column = 1;
                } else {
                    self.column += span;
                }
                continue;
            }
            if self.tile_bit(p, |t| t.fragment) {
                let span = self.mask_run(p, |t| t.fragment);
                self.advance_over(p, span);
                continue;
            }

            if self.tile_bit(p, |t| t.structural) {
                self.pos += 1;
                self.column += 1;
            } else if self.tile_bit(p, |t| t.digit) {
                let (span, malformed) = self.real_span(p);
                if malformed {
                    let text = String::from_utf8_lossy(
                        &self.source.padded()[p as usize..(p + span) as usize],
                    )
                    .into_owned();
                    let d =
                        Diagnostic::malformed_float(&self.origin, line, column + span, &text);
                    self.diagnostics.push(d);
                }
                self.pos += span;
                self.column += span;
            } else if self.tile_bit(p, |t| t.ident) {
                let span = self.mask_run(p, |t| t.ident);
                self.pos += span;
                self.column += span;
            } else if self.tile_bit(p, |t| t.string) {
                let (span, terminated) = self.string_span(p);
                if !terminated {
                    let d = Diagnostic::unterminated_string(&self.origin, line, column);
                    self.diagnostics.push(d);
                }
                self.advance_over(p, span);
            } else if Self::is_fallback_operator(b) {
                let (_, op_len) = self.op_token(p);
                self.pos += op_len;
                self.column += op_len;
            } else {
                let text =
                    String::from_utf8_lossy(&self.source.padded()[p as usize..p as usize + 1])
                        .into_owned();
                let d = Diagnostic::unrecognized_token(&self.origin, line, column, &text);
                self.diagnostics.push(d);
                self.pos += 1;
                self.column += 1;
            }

            if at_top_level {
                let d = Diagnostic::unexpected_top_level_token(&self.origin, line, column);
                self.diagnostics.push(d);
            }
        }

        // Unmatched opens, innermost first. Each gets a virtual close at end
        // of input so the partial tree stays walkable.
        while let Some(open_index) = stack.pop() {
            let next = self.sexprs.len();
            let (open_line, open_column) = {
                let record = self.sexprs.get(open_index);
                (record.open_line, record.open_column)
            };
            let d = Diagnostic::no_matching_close(&self.origin, open_line, open_column);
            self.diagnostics.push(d);
            let end_line = self.line;
            let end_column = self.column;
            let record = self.sexprs.get_mut(open_index);
            record.close = len;
            record.close_line = end_line;
            record.close_column = end_column;
            record.next = next;
        }
    }

    // ----- mask-driven region spans -----------------------------------------

    #[inline]
    fn tile_bit(&self, p: u32, select: fn(&TileMasks) -> u32) -> bool {
        match self.tiles.try_get(p / TILE) {
            Some(tile) => select(tile) >> (p % TILE) & 1 != 0,
            None => false,
        }
    }

    /// Length of the contiguous run of set bits in `select`'s mask starting
    /// at `start`, crossing tiles as needed.
    fn mask_run(&self, start: u32, select: fn(&TileMasks) -> u32) -> u32 {
        let mut len = 0u32;
        let mut p = start;
        loop {
            let Some(tile) = self.tiles.try_get(p / TILE) else {
                break;
            };
            let offset = p % TILE;
            let run = (select(tile) >> offset).trailing_ones();
            len += run;
            p += run;
            if run < TILE - offset {
                break;
            }
        }
        len
    }

    fn newlines_in(&self, start: u32, len: u32) -> u32 {
        let mut count = 0u32;
        let mut p = start;
        let end = start + len;
        while p < end {
            let offset = p % TILE;
            let take = (TILE - offset).min(end - p);
            if let Some(tile) = self.tiles.try_get(p / TILE) {
                count += (tile.newline >> offset & low_mask(take)).count_ones();
            }
            p += take;
        }
        count
    }

    fn last_newline_in(&self, start: u32, len: u32) -> Option<u32> {
        let end = start + len;
        let mut p = end;
        while p > start {
            let tile_start = (p - 1) / TILE * TILE;
            let from = tile_start.max(start);
            let offset = from % TILE;
            let width = p - from;
            if let Some(tile) = self.tiles.try_get(from / TILE) {
                let bits = tile.newline >> offset & low_mask(width);
                if bits != 0 {
                    return Some(from + (31 - bits.leading_zeros()));
                }
            }
            p = from;
        }
        None
    }

    /// Skips over the region `[start, start + len)`, updating line and
    /// column from the newline mask. The column after a newline counts from
    /// the byte following the region's last newline, wherever its tile is.
    fn advance_over(&mut self, start: u32, len: u32) {
        let newlines = self.newlines_in(start, len);
        if newlines == 0 {
            self.column += len;
        } else {
            self.line += newlines;
            let last = self.last_newline_in(start, len).unwrap_or(start);
            self.column = start + len - last;
        }
        self.pos = start + len;
    }

    /// Comment length from `;` through its newline. A comment cut off by end
    /// of input keeps no trailing newline and reports `false`.
    fn comment_span(&self, start: u32) -> (u32, bool) {
        let len = self.source.len() as u32;
        let mut p = start + 1;
        loop {
            let Some(tile) = self.tiles.try_get(p / TILE) else {
                return (len - start, false);
            };
            let offset = p % TILE;
            let bits = tile.newline >> offset;
            if bits != 0 {
                p += bits.trailing_zeros();
                if p >= len {
                    // The sentinel tile's newline lies in the padding.
                    return (len - start, false);
                }
                return (p - start + 1, true);
            }
            p += TILE - offset;
        }
    }

    /// String length including both delimiters. Reports `false` when no
    /// unescaped closing quote exists before end of input.
    fn string_span(&self, start: u32) -> (u32, bool) {
        let mut p = start + 1;
        loop {
            let Some(tile) = self.tiles.try_get(p / TILE) else {
                return ((self.source.len() as u32).saturating_sub(start), false);
            };
            let offset = p % TILE;
            let bits = tile.string >> offset;
            if bits != 0 {
                p += bits.trailing_zeros();
                return (p - start + 1, true);
            }
            p += TILE - offset;
        }
    }

    /// Real-literal length: digits, optional `.` mantissa, optional
    /// `e`/`E` exponent with sign. A malformed exponent reports `true` and
    /// the length covers only the valid prefix (through the mantissa), so
    /// the bytes after it tokenize normally.
    fn real_span(&self, start: u32) -> (u32, bool) {
        let int_len = self.mask_run(start, |t| t.digit);
        let mut p = start + int_len;
        if self.source.byte(p) != b'.' {
            return (int_len, false);
        }
        p += 1;
        p += self.mask_run(p, |t| t.digit);
        let mantissa_end = p;
        let e = self.source.byte(p);
        if e == b'e' || e == b'E' {
            p += 1;
            let sign = self.source.byte(p);
            if sign == b'+' || sign == b'-' {
                p += 1;
            }
            let exponent = self.mask_run(p, |t| t.digit);
            if exponent == 0 {
                return (mantissa_end - start, true);
            }
            p += exponent;
        }
        (p - start, false)
    }

    // ----- small classifiers ------------------------------------------------

    /// Operators that cannot live in the shuffle tables: `< >` need
    /// lookahead, `^ \ |`-adjacent bytes collide under the table hash, and
    /// `~` joins them when the dialect enables it.
    #[inline]
    fn is_fallback_operator(b: u8) -> bool {
        matches!(b, b'^' | b'|' | b'<' | b'>' | b'\\') || (D::TILDE && b == b'~')
    }

    fn op_token(&self, p: u32) -> (TokenKind, u32) {
        match self.source.byte(p) {
            b'<' => match self.source.byte(p + 1) {
                b'=' => (TokenKind::LessEqual, 2),
                b'<' => (TokenKind::ShiftLeft, 2),
                _ => (TokenKind::LessThan, 1),
            },
            b'>' => match self.source.byte(p + 1) {
                b'=' => (TokenKind::GreaterEqual, 2),
                b'>' => (TokenKind::ShiftRight, 2),
                _ => (TokenKind::GreaterThan, 1),
            },
            b'\\' => (TokenKind::Backslash, 1),
            b'^' => (TokenKind::Caret, 1),
            b'|' => (TokenKind::Pipe, 1),
            _ => (TokenKind::Tilde, 1),
        }
    }

    /// SWAR keyword dispatch. Identifiers of up to eight bytes widen to a
    /// masked 64-bit load (the tail padding guarantees the readable bytes)
    /// and compare against precomputed images; longer dialect spellings fall
    /// through to byte-string compares.
    fn keyword_kind(&self, at: u32, len: u32) -> TokenKind {
        let bytes = self.source.padded();
        if len <= 8 {
            let mut window = [0u8; 8];
            window.copy_from_slice(&bytes[at as usize..at as usize + 8]);
            let raw = u64::from_le_bytes(window);
            let masked = if len == 8 {
                raw
            } else {
                raw & ((1u64 << (len * 8)) - 1)
            };
            if masked == LET_IMAGE {
                return TokenKind::Let;
            }
            if masked == AND_IMAGE {
                return TokenKind::And;
            }
            if masked == NOT_IMAGE {
                return TokenKind::Not;
            }
            if masked == OR_IMAGE {
                return TokenKind::Or;
            }
            if masked == IF_IMAGE {
                return TokenKind::If;
            }
            // Booleans before nil: a dialect may spell false "nil", and the
            // boolean reading wins there.
            if masked == D::TRUE_IMAGE && D::TRUE_LITERAL.len() <= 8 {
                return TokenKind::BooleanLiteral;
            }
            if masked == D::FALSE_IMAGE && D::FALSE_LITERAL.len() <= 8 {
                return TokenKind::BooleanLiteral;
            }
            if masked == D::NIL_IMAGE && D::NIL_KEYWORD.len() <= 8 {
                return TokenKind::Nil;
            }
            if masked == D::FUNC_IMAGE && D::FUNC_KEYWORD.len() <= 8 {
                return TokenKind::Defun;
            }
            if masked == D::MACRO_IMAGE && D::MACRO_KEYWORD.len() <= 8 {
                return TokenKind::Defmacro;
            }
            if masked == D::VAR_IMAGE && D::VAR_KEYWORD.len() <= 8 {
                return TokenKind::Defvar;
            }
            if masked == D::LAMBDA_IMAGE && D::LAMBDA_KEYWORD.len() <= 8 {
                return TokenKind::Lambda;
            }
            return TokenKind::Identifier;
        }
        let identifier = &bytes[at as usize..(at + len) as usize];
        if identifier == D::TRUE_LITERAL.as_bytes() || identifier == D::FALSE_LITERAL.as_bytes() {
            return TokenKind::BooleanLiteral;
        }
        if identifier == D::NIL_KEYWORD.as_bytes() {
            return TokenKind::Nil;
        }
        if identifier == D::FUNC_KEYWORD.as_bytes() {
            return TokenKind::Defun;
        }
        if identifier == D::MACRO_KEYWORD.as_bytes() {
            return TokenKind::Defmacro;
        }
        if identifier == D::VAR_KEYWORD.as_bytes() {
            return TokenKind::Defvar;
        }
        if identifier == D::LAMBDA_KEYWORD.as_bytes() {
            return TokenKind::Lambda;
        }
        TokenKind::Identifier
    }
}
