use std::collections::HashSet;

use crate::ast::{Change, Condition, Element, Pattern, Source};
use crate::lexer::{Token, TokenKind};
use crate::utils::{GramError, Result};

const ORIGIN: &str = "Parser: Classifying lines";

/// One classified grammar line: its indent plus the parsed shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub indent: usize,
    pub kind: LineKind,
}

/// The shapes a grammar line can take.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    /// A production body: terminals, rule references, epsilons, with an
    /// optional trailing `if` guard.
    BnPattern(Pattern),
    /// A feature assignment inside a `with:` block.
    Change(Change),
    /// An `if <condition>` modifier line.
    Condition(Condition),
    /// `from:` opening an alternation block.
    OpenFrom,
    /// `from: <body>` as a one-liner.
    FullFrom(Pattern),
    /// `with:` opening a change block.
    OpenWith,
    /// `with: <change>` as a one-liner.
    FullWith(Change),
    /// `Name:` or `Name(params):` opening a definition block.
    OpenNt {
        name: String,
        params: HashSet<String>,
    },
    /// `Name: <body>` as a one-liner.
    FullNt {
        name: String,
        params: HashSet<String>,
        body: Pattern,
    },
    /// `Name -> "file"`: a definition backed by a lexicon document.
    FileNt {
        name: String,
        params: HashSet<String>,
        filename: String,
    },
}

/// Classify one raw token line. Returns `None` for trivial lines (blank or
/// comment-only), which carry no structure.
pub fn classify(tokens: &[Token]) -> Result<Option<Line>> {
    let indent = match tokens.first() {
        Some(tok) if tok.kind == TokenKind::Spaces => tok.text.len(),
        _ => 0,
    };

    let toks: Vec<&Token> = tokens
        .iter()
        .filter(|tok| tok.kind != TokenKind::Spaces && tok.kind != TokenKind::Comment)
        .collect();
    if toks.is_empty() {
        return Ok(None);
    }

    let kind = classify_tokens(&toks)?;
    Ok(Some(Line { indent, kind }))
}

fn classify_tokens(toks: &[&Token]) -> Result<LineKind> {
    if toks[0].kind == TokenKind::Identifier {
        let after_colon = toks.get(1).map(|t| t.kind) == Some(TokenKind::Colon);
        match toks[0].text.as_str() {
            "from" if after_colon => {
                return if toks.len() == 2 {
                    Ok(LineKind::OpenFrom)
                } else {
                    // a one-line alternation has exactly one alternative
                    let body = parse_bn_pattern(&toks[2..])?;
                    Ok(LineKind::FullFrom(Pattern::Choice(vec![body])))
                };
            }
            "with" if after_colon => {
                return if toks.len() == 2 {
                    Ok(LineKind::OpenWith)
                } else {
                    Ok(LineKind::FullWith(parse_change(&toks[2..])?))
                };
            }
            "if" => return Ok(LineKind::Condition(parse_condition(&toks[1..])?)),
            _ => {}
        }

        if let Some(kind) = try_definition(toks)? {
            return Ok(kind);
        }
    }

    if toks
        .iter()
        .any(|t| matches!(t.kind, TokenKind::ArrowDouble | TokenKind::ArrowLabeled))
    {
        return Ok(LineKind::Change(parse_change(toks)?));
    }

    if matches!(
        toks[0].kind,
        TokenKind::Nonterminal | TokenKind::Str | TokenKind::Epsilon
    ) {
        return Ok(LineKind::BnPattern(parse_bn_pattern(toks)?));
    }

    Err(GramError::parser(
        ORIGIN,
        vec![format!("line fits no known form, starting at '{}'", toks[0].text)],
    ))
}

/// Try the definition-header shapes: `Name -> "file"`, `Name:`,
/// `Name: <body>`, each with an optional parameter list. Returns `None`
/// when the line is identifier-led but not a definition (a change line).
fn try_definition(toks: &[&Token]) -> Result<Option<LineKind>> {
    let name = toks[0].text.clone();

    let (params, rest) = if toks.get(1).map(|t| t.kind) == Some(TokenKind::OpenParen) {
        let Some(close) = toks.iter().position(|t| t.kind == TokenKind::CloseParen) else {
            return Err(GramError::parser(
                ORIGIN,
                vec![format!("unterminated parameter list after '{}'", name)],
            ));
        };
        (parse_params(&toks[2..close])?, &toks[close + 1..])
    } else {
        (HashSet::new(), &toks[1..])
    };

    match rest {
        [arrow, file] if arrow.kind == TokenKind::ArrowNormal && file.kind == TokenKind::Str => {
            Ok(Some(LineKind::FileNt {
                name,
                params,
                filename: unquote(&file.text),
            }))
        }
        [colon] if colon.kind == TokenKind::Colon => Ok(Some(LineKind::OpenNt { name, params })),
        [colon, tail @ ..] if colon.kind == TokenKind::Colon => Ok(Some(LineKind::FullNt {
            name,
            params,
            body: parse_bn_pattern(tail)?,
        })),
        _ => Ok(None),
    }
}

/// Parameter lists strictly alternate identifier, comma, identifier, ...
fn parse_params(toks: &[&Token]) -> Result<HashSet<String>> {
    let mut params = HashSet::new();
    for (i, tok) in toks.iter().enumerate() {
        if i % 2 == 0 {
            if tok.kind != TokenKind::Identifier {
                return Err(GramError::parser(
                    ORIGIN,
                    vec![format!("expected a parameter name, got '{}'", tok.text)],
                ));
            }
            params.insert(tok.text.clone());
        } else if tok.kind != TokenKind::Comma {
            return Err(GramError::parser(
                ORIGIN,
                vec![format!("expected ',' between parameters, got '{}'", tok.text)],
            ));
        }
    }
    if !toks.is_empty() && toks.len() % 2 == 0 {
        return Err(GramError::parser(
            ORIGIN,
            vec!["parameter list ends with a comma".to_string()],
        ));
    }
    Ok(params)
}

/// Parse a production body. Epsilons expand to nothing and are dropped
/// here; a trailing `if` wraps the sequence in a guard.
fn parse_bn_pattern(toks: &[&Token]) -> Result<Pattern> {
    let mut elements = Vec::new();
    for (i, tok) in toks.iter().enumerate() {
        match tok.kind {
            TokenKind::Str => elements.push(Element::Terminal(unquote(&tok.text))),
            TokenKind::Epsilon => {}
            TokenKind::Nonterminal => {
                let (name, eager) = nonterminal_parts(&tok.text);
                elements.push(Element::Nonterminal { name, eager });
            }
            TokenKind::Identifier if tok.text == "if" => {
                let condition = parse_condition(&toks[i + 1..])?;
                return Ok(Pattern::Guarded(
                    Box::new(Pattern::Sequence(elements)),
                    condition,
                ));
            }
            _ => {
                return Err(GramError::parser(
                    ORIGIN,
                    vec![format!(
                        "pattern atom must be a string, nonterminal or epsilon, got '{}'",
                        tok.text
                    )],
                ));
            }
        }
    }
    Ok(Pattern::Sequence(elements))
}

/// Split at the first `=`, else the first `!=`, recursively; the leaves are
/// identifiers, strings, or pipe-separated or-blocks.
fn parse_condition(toks: &[&Token]) -> Result<Condition> {
    if toks.is_empty() {
        return Err(GramError::parser(ORIGIN, vec!["empty condition".to_string()]));
    }
    if let Some(i) = toks.iter().position(|t| t.kind == TokenKind::Equals) {
        return Ok(Condition::Eq(
            Box::new(parse_condition(&toks[..i])?),
            Box::new(parse_condition(&toks[i + 1..])?),
        ));
    }
    if let Some(i) = toks.iter().position(|t| t.kind == TokenKind::NotEquals) {
        return Ok(Condition::Neq(
            Box::new(parse_condition(&toks[..i])?),
            Box::new(parse_condition(&toks[i + 1..])?),
        ));
    }
    parse_expression(toks)
}

fn parse_expression(toks: &[&Token]) -> Result<Condition> {
    if let [single] = toks {
        return match single.kind {
            TokenKind::Identifier => Ok(Condition::Ident(single.text.clone())),
            TokenKind::Str => Ok(Condition::Literal(unquote(&single.text))),
            _ => Err(GramError::parser(
                ORIGIN,
                vec![format!("'{}' is not a condition operand", single.text)],
            )),
        };
    }

    let mut options = Vec::new();
    for (i, tok) in toks.iter().enumerate() {
        if i % 2 == 1 {
            if tok.kind != TokenKind::Or {
                return Err(GramError::parser(
                    ORIGIN,
                    vec![format!("expected '|' in condition, got '{}'", tok.text)],
                ));
            }
            continue;
        }
        match tok.kind {
            TokenKind::Identifier => options.push(Condition::Ident(tok.text.clone())),
            TokenKind::Str => options.push(Condition::Literal(unquote(&tok.text))),
            _ => {
                return Err(GramError::parser(
                    ORIGIN,
                    vec![format!("'{}' is not a condition operand", tok.text)],
                ));
            }
        }
    }
    if toks.len() % 2 == 0 {
        return Err(GramError::parser(
            ORIGIN,
            vec!["condition or-block ends with '|'".to_string()],
        ));
    }
    Ok(Condition::Choice(options))
}

/// Parse one change line. Shapes: `A ==p=> B`, `p => T.q`, `"s" => T.q`,
/// `A.p => T.q`, and an or-block source `a|"b" => T.q`.
fn parse_change(toks: &[&Token]) -> Result<Change> {
    if let Some(i) = toks.iter().position(|t| t.kind == TokenKind::ArrowLabeled) {
        let param = arrow_label(&toks[i].text);
        return match (&toks[..i], &toks[i + 1..]) {
            ([src], [tgt])
                if src.kind == TokenKind::Identifier && tgt.kind == TokenKind::Identifier =>
            {
                Ok(Change {
                    source: Source::Nonterminal {
                        name: src.text.clone(),
                        param: param.clone(),
                    },
                    target: tgt.text.clone(),
                    target_param: param,
                })
            }
            _ => Err(GramError::parser(
                ORIGIN,
                vec!["a labeled arrow joins exactly two nonterminal names".to_string()],
            )),
        };
    }

    let Some(i) = toks.iter().position(|t| t.kind == TokenKind::ArrowDouble) else {
        return Err(GramError::parser(
            ORIGIN,
            vec!["change line has no '=>'".to_string()],
        ));
    };

    let (target, target_param) = match &toks[i + 1..] {
        [tgt, dot, param]
            if tgt.kind == TokenKind::Identifier
                && dot.kind == TokenKind::Dot
                && param.kind == TokenKind::Identifier =>
        {
            (tgt.text.clone(), param.text.clone())
        }
        _ => {
            return Err(GramError::parser(
                ORIGIN,
                vec!["change target must take the shape Name.param".to_string()],
            ));
        }
    };

    Ok(Change {
        source: parse_source(&toks[..i])?,
        target,
        target_param,
    })
}

fn parse_source(toks: &[&Token]) -> Result<Source> {
    match toks {
        [one] if one.kind == TokenKind::Identifier => Ok(Source::Ident(one.text.clone())),
        [one] if one.kind == TokenKind::Str => Ok(Source::Literal(unquote(&one.text))),
        [nt, dot, param]
            if nt.kind == TokenKind::Identifier
                && dot.kind == TokenKind::Dot
                && param.kind == TokenKind::Identifier =>
        {
            Ok(Source::Nonterminal {
                name: nt.text.clone(),
                param: param.text.clone(),
            })
        }
        _ => {
            // pipe-separated mix of identifiers and strings
            let mut options = Vec::new();
            for (i, tok) in toks.iter().enumerate() {
                if i % 2 == 1 {
                    if tok.kind != TokenKind::Or {
                        return Err(GramError::parser(
                            ORIGIN,
                            vec![format!(
                                "change source fits no known form at '{}'",
                                tok.text
                            )],
                        ));
                    }
                    continue;
                }
                match tok.kind {
                    TokenKind::Identifier => options.push(Source::Ident(tok.text.clone())),
                    TokenKind::Str => options.push(Source::Literal(unquote(&tok.text))),
                    _ => {
                        return Err(GramError::parser(
                            ORIGIN,
                            vec![format!(
                                "change source fits no known form at '{}'",
                                tok.text
                            )],
                        ));
                    }
                }
            }
            if toks.is_empty() || toks.len() % 2 == 0 {
                return Err(GramError::parser(
                    ORIGIN,
                    vec!["change source fits no known form".to_string()],
                ));
            }
            Ok(Source::Choice(options))
        }
    }
}

/// `==` optional-spaces label optional-spaces `=>` → the label.
fn arrow_label(text: &str) -> String {
    text.trim_start_matches('=')
        .trim_end_matches('>')
        .trim_end_matches('=')
        .trim()
        .to_string()
}

/// Normalize a nonterminal token: strip the outer angle brackets, drop
/// inner spaces, split off the eager marker. `< ~ Name >` and `<~Name>`
/// both come out as `("Name", true)`.
pub fn nonterminal_parts(text: &str) -> (String, bool) {
    let inner: String = text[1..text.len() - 1]
        .chars()
        .filter(|c| *c != ' ')
        .collect();
    match inner.strip_prefix('~') {
        Some(name) => (name.to_string(), true),
        None => (inner, false),
    }
}

/// Strip the surrounding quotes and resolve backslash escapes.
pub fn unquote(text: &str) -> String {
    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token_lines;
    use pretty_assertions::assert_eq;

    fn classify_one(source: &str) -> LineKind {
        let lines = token_lines(source).unwrap();
        classify(&lines[0]).unwrap().expect("non-trivial line").kind
    }

    fn classify_err(source: &str) -> GramError {
        let lines = token_lines(source).unwrap();
        classify(&lines[0]).unwrap_err()
    }

    fn terminal(text: &str) -> Element {
        Element::Terminal(text.to_string())
    }

    fn nt(name: &str) -> Element {
        Element::Nonterminal {
            name: name.to_string(),
            eager: false,
        }
    }

    #[test]
    fn test_trivial_lines() {
        for source in ["", "   ", "// only a comment", "  // indented comment"] {
            let lines = token_lines(source).unwrap();
            assert_eq!(classify(&lines[0]).unwrap(), None, "source: {:?}", source);
        }
    }

    #[test]
    fn test_indent_measurement() {
        let lines = token_lines("    \"x\"").unwrap();
        let line = classify(&lines[0]).unwrap().expect("pattern line");
        assert_eq!(line.indent, 4);

        let lines = token_lines("\"x\"").unwrap();
        assert_eq!(classify(&lines[0]).unwrap().map(|l| l.indent), Some(0));
    }

    #[test]
    fn test_open_and_full_from() {
        assert_eq!(classify_one("from:"), LineKind::OpenFrom);
        assert_eq!(
            classify_one("from: \"a\" <B>"),
            LineKind::FullFrom(Pattern::Choice(vec![Pattern::Sequence(vec![
                terminal("a"),
                nt("B"),
            ])]))
        );
    }

    #[test]
    fn test_open_and_full_with() {
        assert_eq!(classify_one("with:"), LineKind::OpenWith);
        assert_eq!(
            classify_one("with: case => Noun.case"),
            LineKind::FullWith(Change {
                source: Source::Ident("case".to_string()),
                target: "Noun".to_string(),
                target_param: "case".to_string(),
            })
        );
    }

    #[test]
    fn test_condition_line() {
        assert_eq!(
            classify_one("if person != \"third\""),
            LineKind::Condition(Condition::Neq(
                Box::new(Condition::Ident("person".to_string())),
                Box::new(Condition::Literal("third".to_string())),
            ))
        );
    }

    #[test]
    fn test_equals_splits_before_nequals() {
        // the first `=` wins, even with `!=` earlier in the line
        assert_eq!(
            classify_one("if a != b = c"),
            LineKind::Condition(Condition::Eq(
                Box::new(Condition::Neq(
                    Box::new(Condition::Ident("a".to_string())),
                    Box::new(Condition::Ident("b".to_string())),
                )),
                Box::new(Condition::Ident("c".to_string())),
            ))
        );
    }

    #[test]
    fn test_condition_or_block() {
        assert_eq!(
            classify_one("if lang = \"en\" | \"de\""),
            LineKind::Condition(Condition::Eq(
                Box::new(Condition::Ident("lang".to_string())),
                Box::new(Condition::Choice(vec![
                    Condition::Literal("en".to_string()),
                    Condition::Literal("de".to_string()),
                ])),
            ))
        );
    }

    #[test]
    fn test_definition_headers() {
        assert_eq!(
            classify_one("Sentence:"),
            LineKind::OpenNt {
                name: "Sentence".to_string(),
                params: HashSet::new(),
            }
        );
        assert_eq!(
            classify_one("Subject(case, num):"),
            LineKind::OpenNt {
                name: "Subject".to_string(),
                params: ["case".to_string(), "num".to_string()].into_iter().collect(),
            }
        );
        assert_eq!(
            classify_one("Greeting: \"hi\""),
            LineKind::FullNt {
                name: "Greeting".to_string(),
                params: HashSet::new(),
                body: Pattern::Sequence(vec![terminal("hi")]),
            }
        );
        assert_eq!(
            classify_one("Noun(case) -> \"nouns.json\""),
            LineKind::FileNt {
                name: "Noun".to_string(),
                params: ["case".to_string()].into_iter().collect(),
                filename: "nouns.json".to_string(),
            }
        );
        assert_eq!(
            classify_one("Noun -> \"nouns.json\""),
            LineKind::FileNt {
                name: "Noun".to_string(),
                params: HashSet::new(),
                filename: "nouns.json".to_string(),
            }
        );
    }

    #[test]
    fn test_change_shapes() {
        assert_eq!(
            classify_one("Subject ==person=> Verb"),
            LineKind::Change(Change {
                source: Source::Nonterminal {
                    name: "Subject".to_string(),
                    param: "person".to_string(),
                },
                target: "Verb".to_string(),
                target_param: "person".to_string(),
            })
        );
        assert_eq!(
            classify_one("\"accusative\" => Object.case"),
            LineKind::Change(Change {
                source: Source::Literal("accusative".to_string()),
                target: "Object".to_string(),
                target_param: "case".to_string(),
            })
        );
        assert_eq!(
            classify_one("Subject.num => Verb.num"),
            LineKind::Change(Change {
                source: Source::Nonterminal {
                    name: "Subject".to_string(),
                    param: "num".to_string(),
                },
                target: "Verb".to_string(),
                target_param: "num".to_string(),
            })
        );
        assert_eq!(
            classify_one("\"a\" | b => T.p"),
            LineKind::Change(Change {
                source: Source::Choice(vec![
                    Source::Literal("a".to_string()),
                    Source::Ident("b".to_string()),
                ]),
                target: "T".to_string(),
                target_param: "p".to_string(),
            })
        );
    }

    #[test]
    fn test_labeled_arrow_spacing() {
        assert_eq!(
            classify_one("A == case => B"),
            classify_one("A ==case=> B")
        );
    }

    #[test]
    fn test_bn_pattern_line() {
        assert_eq!(
            classify_one("<Subject> \"sees\" <> <~Object>"),
            LineKind::BnPattern(Pattern::Sequence(vec![
                nt("Subject"),
                terminal("sees"),
                Element::Nonterminal {
                    name: "Object".to_string(),
                    eager: true,
                },
            ]))
        );
    }

    #[test]
    fn test_bn_pattern_with_trailing_guard() {
        assert_eq!(
            classify_one("\"hello\" if lang = \"en\""),
            LineKind::BnPattern(Pattern::Guarded(
                Box::new(Pattern::Sequence(vec![terminal("hello")])),
                Condition::Eq(
                    Box::new(Condition::Ident("lang".to_string())),
                    Box::new(Condition::Literal("en".to_string())),
                ),
            ))
        );
    }

    #[test]
    fn test_nonterminal_normalization() {
        assert_eq!(nonterminal_parts("<~ Name >"), ("Name".to_string(), true));
        assert_eq!(nonterminal_parts("<~Name>"), ("Name".to_string(), true));
        assert_eq!(nonterminal_parts("< Name >"), ("Name".to_string(), false));
    }

    #[test]
    fn test_unquote_escapes() {
        assert_eq!(unquote(r#""a \"b\" \\c""#), r#"a "b" \c"#);
    }

    #[test]
    fn test_unclassifiable_lines() {
        assert!(matches!(classify_err("-> \"x\""), GramError::Parser(_)));
        assert!(matches!(classify_err("foo bar"), GramError::Parser(_)));
        // `?` is lexed but accepted nowhere
        assert!(matches!(classify_err("Opt: <A> ?"), GramError::Parser(_)));
        assert!(matches!(classify_err("a, b"), GramError::Parser(_)));
    }

    #[test]
    fn test_bad_parameter_lists() {
        assert!(matches!(classify_err("A(x,):"), GramError::Parser(_)));
        assert!(matches!(classify_err("A(x y):"), GramError::Parser(_)));
        assert!(matches!(classify_err("A(x, y:"), GramError::Parser(_)));
    }
}
