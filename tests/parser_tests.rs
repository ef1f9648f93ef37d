// DEFENSE: the tree layer must stay lazy, cache exactly where it promises
// to, and keep working on inputs that did not parse cleanly.
use sibilant::{
    walk, walk_fresh, AtomView, CommonLisp, DefaultDialect, Dialect, ErrorCode, ListView,
    NodeId, NodeKind, ParseTree, Parser, Shape, TokenId, TokenKind, Visitor,
};

fn parse(program: &str) -> ParseTree<DefaultDialect> {
    ParseTree::parse_str(program, true).tree
}

fn child_ids(tree: &mut ParseTree<DefaultDialect>, list: NodeId) -> Vec<NodeId> {
    let mut ids = Vec::new();
    let mut child = tree.children(list);
    while let Some(id) = child {
        ids.push(id);
        child = tree.node(id).next();
    }
    ids
}

#[derive(Default)]
struct Trace {
    events: Vec<String>,
}

impl Visitor for Trace {
    fn visit_atom(&mut self, atom: &AtomView<'_>) {
        self.events.push(format!("atom:{}", atom.text_lossy()));
    }
    fn visit_list(&mut self, list: &ListView<'_>) {
        self.events.push(format!("list:{}", list.open_at));
    }
    fn visit_arguments(&mut self, arguments: &ListView<'_>) {
        self.events.push(format!("args:{}", arguments.open_at));
    }
    fn visit_error(&mut self, error: &AtomView<'_>) {
        self.events.push(format!("error:{}", error.text_lossy()));
    }
}

#[test]
fn smallest_valid_program_tree() {
    let mut tree = parse("(+ 1 2)");
    assert!(tree.diagnostics().is_empty());
    let root = tree.root().unwrap();
    assert_eq!(tree.node(root).kind(), NodeKind::Sexpr);
    assert_eq!(tree.source_location(root).line, 1);
    assert_eq!(tree.source_location(root).column, 1);

    let children = child_ids(&mut tree, root);
    assert_eq!(children.len(), 3);
    assert_eq!(tree.node(children[0]).kind(), NodeKind::Operator);
    assert_eq!(tree.node_text(children[0]), "+");
    assert_eq!(tree.node(children[1]).kind(), NodeKind::RealLiteral);
    assert_eq!(tree.node_text(children[1]), "1");
    assert_eq!(tree.node(children[2]).kind(), NodeKind::RealLiteral);
    assert_eq!(tree.node_text(children[2]), "2");
}

#[test]
fn nested_arithmetic_tree() {
    let mut tree = parse("(+ (* 2 3) 4)");
    let root = tree.root().unwrap();
    let children = child_ids(&mut tree, root);
    assert_eq!(children.len(), 3);
    assert_eq!(tree.node(children[0]).kind(), NodeKind::Operator);
    assert_eq!(tree.node(children[1]).kind(), NodeKind::Sexpr);
    assert_eq!(tree.node(children[2]).kind(), NodeKind::RealLiteral);

    let nested = children[1];
    assert_eq!(tree.node_text(nested), "(* 2 3)");
    let inner = child_ids(&mut tree, nested);
    let texts: Vec<String> = inner
        .iter()
        .map(|&id| tree.node_text(id).into_owned())
        .collect();
    assert_eq!(texts, vec!["*", "2", "3"]);
}

#[test]
fn unbalanced_close_still_yields_a_tree() {
    let result = ParseTree::<DefaultDialect>::parse_str("(+ 1 2", true);
    assert!(!result.success);
    let mut tree = result.tree;
    assert_eq!(tree.diagnostics().len(), 1);
    let d = tree.diagnostics().get(0);
    assert_eq!(d.code(), ErrorCode::NoMatchingCloseParenthesis);
    assert_eq!(d.line(), "1");
    assert_eq!(d.column(), "1");

    let root = tree.root().expect("partial tree is still walkable");
    let texts: Vec<String> = child_ids(&mut tree, root)
        .iter()
        .map(|&id| tree.node_text(id).into_owned())
        .collect();
    assert_eq!(texts, vec!["+", "1", "2"]);
}

#[test]
fn string_literal_keeps_raw_bytes() {
    let mut tree = parse(r#"("say \"hi\"")"#);
    assert!(tree.diagnostics().is_empty());
    let root = tree.root().unwrap();
    let children = child_ids(&mut tree, root);
    assert_eq!(children.len(), 1);
    assert_eq!(tree.node(children[0]).kind(), NodeKind::StringLiteral);
    assert_eq!(tree.node_bytes(children[0]), br#""say \"hi\"""#);
}

#[test]
fn leading_comment_trivia_on_root() {
    let mut tree = parse("; hello\n(+ 1)");
    let root = tree.root().unwrap();
    let aux = tree.node_trivia(root).expect("root carries the comment");
    assert_eq!(tree.auxiliary_bytes(aux), b"; hello\n");

    for id in child_ids(&mut tree, root) {
        assert!(tree.node_trivia(id).is_none());
    }
}

#[test]
fn float_exponent_node() {
    let mut tree = parse("(* 1.5e+5)");
    let root = tree.root().unwrap();
    let children = child_ids(&mut tree, root);
    assert_eq!(tree.node(children[1]).kind(), NodeKind::RealLiteral);
    assert_eq!(tree.node_text(children[1]), "1.5e+5");
}

#[test]
fn children_cache_is_stable() {
    let mut tree = parse("(a (b) c)");
    let root = tree.root().unwrap();
    let first = tree.children(root);
    let count = tree.diagnostics().len();
    let second = tree.children(root);
    assert_eq!(first, second);
    assert_eq!(tree.diagnostics().len(), count);
}

#[test]
fn peek_children_reparses_without_caching() {
    let mut tree = parse("(a b)");
    let root = tree.root().unwrap();
    let first = tree.peek_children(root).unwrap();
    let second = tree.peek_children(root).unwrap();
    assert_ne!(first, second);
    // Same underlying tokens though.
    assert_eq!(tree.node_text(first), tree.node_text(second));
    // The caching path is independent of earlier peeks.
    let cached = tree.children(root).unwrap();
    assert_eq!(tree.children(root), Some(cached));
}

#[test]
fn keyword_atoms_get_semantic_kinds() {
    let mut tree = parse("(let lambda if defun not true nil sym)");
    let root = tree.root().unwrap();
    let kinds: Vec<NodeKind> = child_ids(&mut tree, root)
        .iter()
        .map(|&id| tree.node(id).kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Let,
            NodeKind::Lambda,
            NodeKind::If,
            NodeKind::Defun,
            NodeKind::Operator, // `not` reads as an operator atom
            NodeKind::BooleanLiteral,
            NodeKind::Nil,
            NodeKind::Symbol,
        ]
    );
}

#[test]
fn next_node_walks_top_level_siblings() {
    let mut tree = parse("(a) (b) (c)");
    let root = tree.root().unwrap();
    let second = tree.next_node(root).unwrap();
    assert_eq!(tree.node_text(second), "(b)");
    let third = tree.next_node(second).unwrap();
    assert_eq!(tree.node_text(third), "(c)");
    let sentinel = tree.next_node(third).unwrap();
    assert_eq!(tree.node(sentinel).kind(), NodeKind::EndOfProgram);
    assert_eq!(sentinel, tree.end_of_program());

    // Discovered siblings are cached on the stored link.
    assert_eq!(tree.node(root).next(), Some(second));
}

#[test]
fn walker_visits_in_source_order() {
    let mut tree = parse("(+ (* 2 3) 4) (f)");
    let mut trace = Trace::default();
    walk(&mut tree, &mut trace);
    assert_eq!(
        trace.events,
        vec![
            "list:0", "atom:+", "list:3", "atom:*", "atom:2", "atom:3", "atom:4", "list:14",
            "atom:f",
        ]
    );
}

#[test]
fn walker_fresh_leaves_cache_untouched() {
    let mut tree = parse("(a (b))");
    let mut trace = Trace::default();
    walk_fresh(&mut tree, &mut trace);
    assert_eq!(trace.events, vec!["list:0", "atom:a", "list:3", "atom:b"]);
    // The caching accessor starts from scratch afterwards.
    let root = tree.root().unwrap();
    assert!(tree.children(root).is_some());
}

#[test]
fn error_nodes_for_invalid_tokens() {
    let mut tree = parse("(a ? b)");
    let root = tree.root().unwrap();
    let children = child_ids(&mut tree, root);
    assert_eq!(children.len(), 3);
    assert_eq!(tree.node(children[1]).kind(), NodeKind::Error);
    // One diagnostic from the scan; materialization adds none.
    assert_eq!(tree.diagnostics().len(), 1);
    assert_eq!(
        tree.diagnostics().get(0).code(),
        ErrorCode::UnrecognizedToken
    );

    let mut trace = Trace::default();
    walk(&mut tree, &mut trace);
    assert!(trace.events.contains(&"error:?".to_string()));
}

#[test]
fn diagnostics_cite_memory_origin() {
    let tree = parse(")");
    let d = tree.diagnostics().get(0);
    assert_eq!(d.file(), "memory");
    assert_eq!(
        d.as_str(),
        "memory(1,1): error LISP1007: closing parenthesis at (1,1) does not have an opening parenthesis"
    );
}

#[test]
fn reparse_is_deterministic() {
    let mut tree = parse("(add 1 (mul 2 3)) ; tail\n(next)");
    let before = collect_spans(&mut tree);

    assert!(tree.reparse());
    let after = collect_spans(&mut tree);
    assert_eq!(before, after);
    // Diagnostics were clean both times and did not accumulate.
    assert!(tree.diagnostics().is_empty());
}

fn collect_spans(tree: &mut ParseTree<DefaultDialect>) -> Vec<(u32, String)> {
    struct Spans(Vec<(u32, String)>);
    impl Visitor for Spans {
        fn visit_atom(&mut self, atom: &AtomView<'_>) {
            self.0.push((atom.at, atom.text_lossy().into_owned()));
        }
        fn visit_list(&mut self, list: &ListView<'_>) {
            self.0.push((list.open_at, "(".into()));
            self.0.push((list.close_at, ")".into()));
        }
    }
    let mut spans = Spans(Vec::new());
    walk(tree, &mut spans);
    spans.0.sort_by_key(|(at, _)| *at);
    spans.0
}

#[test]
fn reparse_accumulates_diagnostics_until_cleared() {
    let result = ParseTree::<DefaultDialect>::parse_str("(a", true);
    let mut tree = result.tree;
    assert_eq!(tree.diagnostics().len(), 1);
    assert!(!tree.reparse());
    assert_eq!(tree.diagnostics().len(), 2);
    let first = tree.diagnostics().get(0).as_str().to_string();
    assert_eq!(tree.diagnostics().get(1).as_str(), first);

    tree.diagnostics_mut().clear();
    assert!(!tree.reparse());
    assert_eq!(tree.diagnostics().len(), 1);
}

// ---- dialect hooks ---------------------------------------------------------

/// A dialect that forbids `()` entirely.
struct Strict;

impl Dialect for Strict {
    const DISALLOW_EMPTY_SEXPR: bool = true;
}

#[test]
fn empty_sexpr_reported_once_per_list() {
    let result = ParseTree::<Strict>::parse_str("(a ())", true);
    let mut tree = result.tree;
    let root = tree.root().unwrap();
    let children: Vec<NodeId> = {
        let mut ids = Vec::new();
        let mut child = tree.children(root);
        while let Some(id) = child {
            ids.push(id);
            child = tree.node(id).next();
        }
        ids
    };
    let empty = children[1];
    assert!(tree.children(empty).is_none());
    assert_eq!(tree.diagnostics().len(), 1);
    assert_eq!(tree.diagnostics().get(0).code(), ErrorCode::EmptySexpr);
    // A second request does not re-report.
    assert!(tree.children(empty).is_none());
    assert_eq!(tree.diagnostics().len(), 1);
}

#[test]
fn context_sensitive_empty_suppresses_the_diagnostic() {
    let result = ParseTree::<Strict>::parse_str("(a ())", true);
    let mut tree = result.tree;
    let root = tree.root().unwrap();
    tree.children(root);
    let empty = {
        let first = tree.children(root).unwrap();
        tree.node(first).next().unwrap()
    };
    assert!(tree.children_in_context(empty, true).is_none());
    assert!(tree.diagnostics().is_empty());
}

#[test]
fn default_dialect_allows_empty_sexpr() {
    let mut tree = parse("(a ())");
    let root = tree.root().unwrap();
    let children = child_ids(&mut tree, root);
    assert!(tree.children(children[1]).is_none());
    assert!(tree.diagnostics().is_empty());
}

/// A dialect where `$name` marks a formal-parameter list: the hook wraps
/// the *preceding* placeholder pair it is handed into an arguments node.
struct Dollarish;

impl Dialect for Dollarish {
    const DOLLAR: bool = true;

    fn parse_special(parser: &mut Parser<Self>, token: TokenId) -> NodeId {
        match parser.token(token).kind {
            TokenKind::Dollar => parser.alloc_atom(token, NodeKind::Operator),
            _ => parser.on_unrecognized(token),
        }
    }
}

#[test]
fn dialect_hook_produces_operator_atoms() {
    let result = ParseTree::<Dollarish>::parse_str("($ x)", true);
    assert!(result.success);
    let mut tree = result.tree;
    let root = tree.root().unwrap();
    let first = tree.children(root).unwrap();
    assert_eq!(tree.node(first).kind(), NodeKind::Operator);
    assert_eq!(tree.node_text(first), "$");
}

/// Colon enabled but not handled by the hook: the default path reports it.
struct ColonButUnhandled;

impl Dialect for ColonButUnhandled {
    const COLON: bool = true;
}

#[test]
fn unhandled_special_becomes_error_node() {
    // The scan accepts an enabled `:`; only the hook rejects it, so the
    // parse itself starts out clean.
    let result = ParseTree::<ColonButUnhandled>::parse_str("(a : b)", true);
    assert!(result.success);
    let mut tree = result.tree;
    let root = tree.root().unwrap();
    let second = {
        let first = tree.children(root).unwrap();
        tree.node(first).next().unwrap()
    };
    assert_eq!(tree.node(second).kind(), NodeKind::Error);
    assert_eq!(tree.diagnostics().len(), 1);
    assert_eq!(
        tree.diagnostics().get(0).code(),
        ErrorCode::UnrecognizedToken
    );
}

/// A dialect that promotes the first nested list of a `lambda` form into an
/// arguments node by post-processing the child chain.
struct LambdaArgs;

impl Dialect for LambdaArgs {}

#[test]
fn arguments_nodes_traverse_like_lists() {
    let result = ParseTree::<LambdaArgs>::parse_str("(lambda (x y) x)", true);
    let mut tree = result.tree;
    let root = tree.root().unwrap();
    let children = {
        let mut ids = Vec::new();
        let mut child = tree.children(root);
        while let Some(id) = child {
            ids.push(id);
            child = tree.node(id).next();
        }
        ids
    };
    // Rewrap the parameter list through the public hook surface.
    let (open, close) = match tree.node(children[1]).shape {
        Shape::List { open, close, .. } => (open, close),
        _ => panic!("expected the parameter list"),
    };
    let arguments = tree.parser().alloc_arguments(open, close);
    assert_eq!(tree.node(arguments).kind(), NodeKind::Arguments);

    let mut trace = Trace::default();
    sibilant::dispatch(&mut tree, arguments, &mut trace, true);
    assert_eq!(trace.events, vec!["args:8", "atom:x", "atom:y"]);
}

#[test]
fn common_lisp_quasiquote_operators() {
    let result = ParseTree::<CommonLisp>::parse_str("(f `(a ,b ,@c))", true);
    assert!(result.success, "{:?}", result.tree.diagnostics().get(0).as_str());
    let mut tree = result.tree;
    let mut trace = Trace::default();
    walk(&mut tree, &mut trace);
    assert!(trace.events.contains(&"atom:`".to_string()));
    assert!(trace.events.contains(&"atom:,".to_string()));
    assert!(trace.events.contains(&"atom:@".to_string()));
}

#[test]
fn program_must_start_with_sexpr() {
    let result = ParseTree::<DefaultDialect>::parse_str("   \n", true);
    assert!(!result.success);
    let mut tree = result.tree;
    assert!(tree.root().is_none());
    assert_eq!(
        tree.diagnostics().get(0).code(),
        ErrorCode::ProgramMustStartWithSexpr
    );
}

#[test]
fn parse_file_round_trip() {
    let dir = std::env::temp_dir();
    let path = dir.join("sibilant_parser_test.lsp");
    std::fs::write(&path, "(defvar answer 42)\n").unwrap();
    let result = ParseTree::<DefaultDialect>::parse_file(&path, true).unwrap();
    assert!(result.success);
    let mut tree = result.tree;
    let root = tree.root().unwrap();
    let kinds: Vec<NodeKind> = child_ids_generic(&mut tree, root);
    assert_eq!(
        kinds,
        vec![NodeKind::Defvar, NodeKind::Symbol, NodeKind::RealLiteral]
    );
    assert!(tree.origin().ends_with("sibilant_parser_test.lsp"));
    std::fs::remove_file(&path).ok();
}

fn child_ids_generic(tree: &mut ParseTree<DefaultDialect>, list: NodeId) -> Vec<NodeKind> {
    let mut kinds = Vec::new();
    let mut child = tree.children(list);
    while let Some(id) = child {
        kinds.push(tree.node(id).kind());
        child = tree.node(id).next();
    }
    kinds
}

#[test]
fn missing_file_is_an_io_error() {
    let missing = std::env::temp_dir().join("sibilant_definitely_missing.lsp");
    assert!(ParseTree::<DefaultDialect>::parse_file(&missing, true).is_err());
}

// DEFENSE: trivia attachment exists so a formatter can reprint the file by
// emitting, for each token, its trivia and then its text. Prove it.
fn reprint(tree: &mut ParseTree<DefaultDialect>, id: NodeId, out: &mut Vec<u8>) {
    if let Some(aux) = tree.node_trivia(id) {
        out.extend_from_slice(tree.auxiliary_bytes(aux));
    }
    match tree.node(id).shape {
        Shape::Atom { .. } | Shape::Error { .. } => {
            out.extend_from_slice(tree.node_bytes(id));
        }
        Shape::List { close, .. } | Shape::Arguments { close, .. } => {
            out.push(b'(');
            let mut child = tree.children(id);
            while let Some(current) = child {
                reprint(tree, current, out);
                child = tree.node(current).next();
            }
            if let Some((first, last)) = tree.token_trivia(close) {
                for token in first.0..=last.0 {
                    out.extend_from_slice(tree.token_bytes(TokenId(token)));
                }
            }
            out.push(b')');
        }
    }
}

#[test]
fn reprinting_trivia_then_tokens_reproduces_the_source() {
    let source = "; header\n(a ; note\n  (b 1.5)\t\"str\" )\n( c )";
    let mut tree = parse(source);
    let mut out = Vec::new();
    let mut current = tree.root().unwrap();
    loop {
        if tree.node(current).kind() == NodeKind::EndOfProgram {
            break;
        }
        reprint(&mut tree, current, &mut out);
        match tree.next_node(current) {
            Some(next) => current = next,
            None => break,
        }
    }
    assert_eq!(String::from_utf8(out).unwrap(), source);
}

#[test]
fn close_paren_trivia_via_tree() {
    let mut tree = parse("(a ; last\n)");
    let root = tree.root().unwrap();
    // Materializing the interior resolves the close paren's trivia: the
    // space and the comment both belong to `)`.
    tree.children(root);
    let close = match tree.node(root).shape {
        Shape::List { close, .. } => close,
        _ => unreachable!(),
    };
    assert_eq!(tree.token(close).aux_len, 2);
}
