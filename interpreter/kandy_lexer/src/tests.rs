#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![expect(clippy::expect_used, reason = "Tests use expect for clarity")]

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use kandy_ir::{StrFlavor, TokenKind};

use crate::Lexer;

fn lex_all(source: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new();
    lexer.load(source);
    let mut kinds = Vec::new();
    loop {
        let token = lexer.next_token().expect("lex error");
        let done = token.kind == TokenKind::Eof;
        kinds.push(token.kind);
        if done {
            break;
        }
    }
    kinds
}

#[test]
fn scans_operators_longest_first() {
    assert_eq!(
        lex_all("** * // / %% % := : ?= ?"),
        vec![
            TokenKind::StarStar,
            TokenKind::Star,
            TokenKind::SlashSlash,
            TokenKind::Slash,
            TokenKind::PercentPercent,
            TokenKind::Percent,
            TokenKind::ExprAssign,
            TokenKind::Colon,
            TokenKind::QuestionAssign,
            TokenKind::Question,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn scans_numbers_in_all_bases() {
    assert_eq!(
        lex_all("0x1F 0o17 0b1010 0d42 1_000 3.5 .5 1e3 2.5e-2"),
        vec![
            TokenKind::Int(31),
            TokenKind::Int(15),
            TokenKind::Int(10),
            TokenKind::Int(42),
            TokenKind::Int(1000),
            TokenKind::Float(3.5),
            TokenKind::Float(0.5),
            TokenKind::Float(1000.0),
            TokenKind::Float(0.025),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn keywords_and_special_names() {
    assert_eq!(
        lex_all("while x None True Undefined"),
        vec![
            TokenKind::While,
            TokenKind::Ident("x".to_string()),
            TokenKind::NoneLit,
            TokenKind::Bool(true),
            TokenKind::UndefinedLit,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn comments_are_skipped() {
    assert_eq!(
        lex_all("1 # line comment\n2 #* block\ncomment *# 3"),
        vec![
            TokenKind::Int(1),
            TokenKind::Int(2),
            TokenKind::Int(3),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn string_escapes() {
    let kinds = lex_all(r#"n"a\tb\x41\u0042""#);
    match &kinds[0] {
        TokenKind::Str(lit) => {
            assert_eq!(lit.flavor, StrFlavor::Normal);
            assert_eq!(lit.content, "a\tbAB");
            assert!(lit.exprs.is_empty());
        }
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn format_string_captures_slots() {
    let kinds = lex_all(r#""a $name b { x + 1 } c""#);
    match &kinds[0] {
        TokenKind::Str(lit) => {
            assert_eq!(lit.content, "a {expr0} b {expr1} c");
            assert_eq!(lit.exprs[0], ("expr0".to_string(), "name".to_string()));
            assert_eq!(lit.exprs[1], ("expr1".to_string(), " x + 1 ".to_string()));
        }
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn nested_braces_balance() {
    let kinds = lex_all(r#"'{ d["k"] }'"#);
    match &kinds[0] {
        TokenKind::Str(lit) => {
            assert_eq!(lit.exprs[0].1, r#" d["k"] "#);
        }
        other => panic!("expected string, got {other:?}"),
    }

    let kinds = lex_all(r#"'{ ${"a": 1} }'"#);
    match &kinds[0] {
        TokenKind::Str(lit) => {
            assert_eq!(lit.exprs[0].1, r#" ${"a": 1} "#);
        }
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn raw_string_keeps_backslashes_and_braces() {
    let kinds = lex_all(r#"r"a\n{x}""#);
    match &kinds[0] {
        TokenKind::Str(lit) => {
            assert_eq!(lit.content, r"a\n{x}");
            assert!(lit.exprs.is_empty());
        }
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn triple_quoted_allows_newlines() {
    let kinds = lex_all("'''a\nb'''");
    match &kinds[0] {
        TokenKind::Str(lit) => {
            assert!(lit.triple);
            assert_eq!(lit.content, "a\nb");
        }
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn newline_in_single_quote_errors() {
    let mut lexer = Lexer::new();
    lexer.load("\"a\nb\"");
    assert!(lexer.next_token().is_err());
}

#[test]
fn bytes_prefix() {
    let kinds = lex_all(r#"b"abc""#);
    assert!(matches!(&kinds[0], TokenKind::Bytes(lit) if lit.content == "abc"));
}

#[test]
fn unknown_char_errors_with_position() {
    let mut lexer = Lexer::new();
    lexer.load("x = `");
    lexer.next_token().unwrap();
    lexer.next_token().unwrap();
    let err = lexer.next_token().unwrap_err();
    assert_eq!(err.position().line, 1);
}

#[test]
fn back_replays_the_token_stream() {
    let mut lexer = Lexer::new();
    lexer.load("x = 5 + y");
    let first = lexer.next_token().unwrap();
    let rest: Vec<_> = std::iter::from_fn(|| {
        let t = lexer.next_token().unwrap();
        (t.kind != TokenKind::Eof).then_some(t)
    })
    .collect();

    lexer.back(first.pos.offset);
    let replayed = lexer.next_token().unwrap();
    assert_eq!(replayed, first);
    let replayed_rest: Vec<_> = std::iter::from_fn(|| {
        let t = lexer.next_token().unwrap();
        (t.kind != TokenKind::Eof).then_some(t)
    })
    .collect();
    assert_eq!(replayed_rest, rest);
}

proptest! {
    /// Rewinding to any observed token offset replays an equal stream.
    #[test]
    fn back_round_trip(source in "[a-z0-9+ \\-*/=()<>]{0,40}") {
        let mut lexer = Lexer::new();
        lexer.load(&source);
        let mut tokens = Vec::new();
        let mut lexable = true;
        loop {
            match lexer.next_token() {
                Ok(token) => {
                    let done = token.kind == TokenKind::Eof;
                    tokens.push(token);
                    if done {
                        break;
                    }
                }
                Err(_) => {
                    lexable = false;
                    break;
                }
            }
        }
        if lexable {
            for (i, token) in tokens.iter().enumerate() {
                if token.kind == TokenKind::Eof {
                    continue;
                }
                lexer.back(token.pos.offset);
                for expected in &tokens[i..] {
                    let replayed = lexer.next_token().unwrap();
                    prop_assert_eq!(&replayed, expected);
                }
            }
        }
    }
}
