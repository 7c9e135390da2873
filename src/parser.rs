use std::cell::RefCell;
use std::collections::HashSet;
use std::mem;

use crate::ast::{Change, Condition, NtDef, Pattern};
use crate::lexer;
use crate::lines::{self, Line, LineKind};
use crate::utils::{GramError, Result};

const ORIGIN: &str = "Parser: Assembling blocks";

/// Parse grammar text into its list of nonterminal definitions.
pub fn parse_definitions(source: &str) -> Result<Vec<NtDef>> {
    let mut classified = Vec::new();
    for tokens in lexer::token_lines(source)? {
        if let Some(line) = lines::classify(&tokens)? {
            classified.push(line);
        }
    }
    assemble(classified)
}

/// What opened the current block.
#[derive(Debug)]
enum Opener {
    Root,
    Nt {
        name: String,
        params: HashSet<String>,
    },
    From,
    With,
}

/// A partially assembled block body.
#[derive(Debug)]
enum Item {
    Pattern(Pattern),
    Changes(Vec<Change>),
    Condition(Condition),
}

#[derive(Debug)]
struct Context {
    opener: Opener,
    /// The block's body indent; unset until the first child line fixes it.
    indent: Option<usize>,
    items: Vec<Item>,
}

impl Context {
    fn root() -> Self {
        Context {
            opener: Opener::Root,
            indent: Some(0),
            items: Vec::new(),
        }
    }

    fn open(opener: Opener) -> Self {
        Context {
            opener,
            indent: None,
            items: Vec::new(),
        }
    }
}

fn assemble(classified: Vec<Line>) -> Result<Vec<NtDef>> {
    let mut defs = Vec::new();
    let mut stack = vec![Context::root()];

    for line in classified {
        align_indent(&mut stack, &mut defs, line.indent)?;
        dispatch_line(&mut stack, &mut defs, line)?;
    }

    while stack.len() > 1 {
        pop_finalize(&mut stack, &mut defs)?;
    }
    Ok(defs)
}

/// Apply the indentation discipline for one incoming line.
fn align_indent(stack: &mut Vec<Context>, defs: &mut Vec<NtDef>, indent: usize) -> Result<()> {
    if stack.last().is_some_and(|ctx| ctx.indent.is_none()) {
        // first child of an opener fixes the block indent
        let enclosing = stack[stack.len() - 2].indent.unwrap_or(0);
        if indent <= enclosing {
            return Err(GramError::parser(
                ORIGIN,
                vec![format!(
                    "block body must be indented deeper than the surrounding block (indent {} inside {})",
                    indent, enclosing
                )],
            ));
        }
        if let Some(top) = stack.last_mut() {
            top.indent = Some(indent);
        }
        return Ok(());
    }

    loop {
        let current = match stack.last().and_then(|ctx| ctx.indent) {
            Some(current) => current,
            None => break,
        };
        if indent < current {
            pop_finalize(stack, defs)?;
            continue;
        }
        if indent > current {
            return Err(GramError::parser(
                ORIGIN,
                vec![format!("unexpected indent of {}", indent)],
            ));
        }
        break;
    }
    Ok(())
}

fn dispatch_line(stack: &mut Vec<Context>, defs: &mut Vec<NtDef>, line: Line) -> Result<()> {
    let Some(top) = stack.last_mut() else {
        return Err(GramError::parser(ORIGIN, vec!["no open block".to_string()]));
    };

    match line.kind {
        LineKind::OpenNt { name, params } => {
            require_root(top, "a nonterminal definition")?;
            stack.push(Context::open(Opener::Nt { name, params }));
        }
        LineKind::FullNt { name, params, body } => {
            require_root(top, "a nonterminal definition")?;
            defs.push(NtDef::Inline { name, params, body });
        }
        LineKind::FileNt {
            name,
            params,
            filename,
        } => {
            require_root(top, "a nonterminal definition")?;
            defs.push(NtDef::External {
                name,
                params,
                filename,
                cache: RefCell::new(None),
            });
        }
        LineKind::OpenFrom => {
            require_body(top, "a 'from:' block")?;
            stack.push(Context::open(Opener::From));
        }
        LineKind::OpenWith => {
            require_body(top, "a 'with:' block")?;
            stack.push(Context::open(Opener::With));
        }
        LineKind::FullFrom(pattern) => {
            require_body(top, "a 'from:' one-liner")?;
            top.items.push(Item::Pattern(pattern));
        }
        LineKind::FullWith(change) => {
            require_body(top, "a 'with:' one-liner")?;
            top.items.push(Item::Changes(vec![change]));
        }
        LineKind::BnPattern(pattern) => {
            require_body(top, "a pattern")?;
            top.items.push(Item::Pattern(pattern));
        }
        LineKind::Condition(condition) => {
            require_body(top, "an 'if' modifier")?;
            top.items.push(Item::Condition(condition));
        }
        LineKind::Change(change) => {
            if !matches!(top.opener, Opener::With) {
                return Err(GramError::parser(
                    ORIGIN,
                    vec!["a change line belongs inside a 'with:' block".to_string()],
                ));
            }
            top.items.push(Item::Changes(vec![change]));
        }
    }
    Ok(())
}

fn require_root(ctx: &Context, what: &str) -> Result<()> {
    match ctx.opener {
        Opener::Root => Ok(()),
        _ => Err(GramError::parser(
            ORIGIN,
            vec![format!("{} cannot sit inside a block body", what)],
        )),
    }
}

fn require_body(ctx: &Context, what: &str) -> Result<()> {
    match ctx.opener {
        Opener::Nt { .. } | Opener::From => Ok(()),
        _ => Err(GramError::parser(
            ORIGIN,
            vec![format!(
                "{} belongs inside a nonterminal or 'from:' block",
                what
            )],
        )),
    }
}

/// Close the top context and fold its result into the parent.
fn pop_finalize(stack: &mut Vec<Context>, defs: &mut Vec<NtDef>) -> Result<()> {
    let Some(ctx) = stack.pop() else {
        return Err(GramError::parser(ORIGIN, vec!["no open block".to_string()]));
    };
    match ctx.opener {
        Opener::Root => Err(GramError::parser(
            ORIGIN,
            vec!["cannot close the root block".to_string()],
        )),
        Opener::Nt { name, params } => {
            let mut groups = group_patterns(ctx.items)?;
            let body = match groups.len() {
                0 => {
                    return Err(GramError::parser(
                        ORIGIN,
                        vec![format!("definition of '{}' has an empty body", name)],
                    ));
                }
                1 => groups.remove(0),
                _ => Pattern::Choice(groups),
            };
            defs.push(NtDef::Inline { name, params, body });
            Ok(())
        }
        Opener::From => {
            let groups = group_patterns(ctx.items)?;
            if groups.is_empty() {
                return Err(GramError::parser(
                    ORIGIN,
                    vec!["'from:' block has no alternatives".to_string()],
                ));
            }
            push_item(stack, Item::Pattern(Pattern::Choice(groups)))
        }
        Opener::With => {
            let mut changes = Vec::new();
            for item in ctx.items {
                match item {
                    Item::Changes(batch) => changes.extend(batch),
                    _ => {
                        return Err(GramError::parser(
                            ORIGIN,
                            vec!["only change lines may sit inside a 'with:' block".to_string()],
                        ));
                    }
                }
            }
            if changes.is_empty() {
                return Err(GramError::parser(
                    ORIGIN,
                    vec!["'with:' block has no changes".to_string()],
                ));
            }
            push_item(stack, Item::Changes(changes))
        }
    }
}

fn push_item(stack: &mut [Context], item: Item) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.items.push(item);
            Ok(())
        }
        None => Err(GramError::parser(ORIGIN, vec!["no open block".to_string()])),
    }
}

/// Split a block body into groups at every pattern boundary. Each group is
/// one pattern plus its trailing modifiers, wrapped left to right.
fn group_patterns(items: Vec<Item>) -> Result<Vec<Pattern>> {
    let mut groups: Vec<Pattern> = Vec::new();
    for item in items {
        match item {
            Item::Pattern(pattern) => groups.push(pattern),
            Item::Changes(changes) => {
                let Some(last) = groups.last_mut() else {
                    return Err(GramError::parser(
                        ORIGIN,
                        vec!["'with' modifier without a preceding pattern".to_string()],
                    ));
                };
                let inner = mem::replace(last, Pattern::Sequence(Vec::new()));
                *last = Pattern::WithChanges(Box::new(inner), changes);
            }
            Item::Condition(condition) => {
                let Some(last) = groups.last_mut() else {
                    return Err(GramError::parser(
                        ORIGIN,
                        vec!["'if' modifier without a preceding pattern".to_string()],
                    ));
                };
                let inner = mem::replace(last, Pattern::Sequence(Vec::new()));
                *last = Pattern::Guarded(Box::new(inner), condition);
            }
        }
    }
    Ok(groups)
}
