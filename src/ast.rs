use rand::Rng;
use rand::seq::SliceRandom;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::lexicon::Lexicon;
use crate::utils::{GramError, Result};

/// One atom of a production body, either literal output text or a reference
/// to another rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A terminal symbol (literal text)
    Terminal(String),
    /// A reference to another rule. `eager` references (written `<~Name>`)
    /// are re-resolved on every occurrence instead of sharing the
    /// per-production memo.
    Nonterminal { name: String, eager: bool },
}

/// The right-hand side of a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// A literal body: terminals and rule references in order.
    Sequence(Vec<Element>),
    /// A `from:` block; one alternative is picked at random.
    Choice(Vec<Pattern>),
    /// A pattern usable only while its condition holds.
    Guarded(Box<Pattern>, Condition),
    /// A pattern whose resolution carries extra feature assignments.
    WithChanges(Box<Pattern>, Vec<Change>),
}

/// Guard expressions. Comparisons and their operands share one tree; the
/// operand forms double as bare guards.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A parameter of the enclosing production.
    Ident(String),
    /// A literal string.
    Literal(String),
    /// Pipe-separated alternatives; a disjunction inside a comparison.
    Choice(Vec<Condition>),
    Eq(Box<Condition>, Box<Condition>),
    Neq(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// Evaluate the guard against the production's parameter map.
    ///
    /// A comparison holds iff any pair of left/right values satisfies the
    /// relation. A bare expression is satisfied once its values evaluate,
    /// so an unknown identifier still fails hard.
    pub fn eval(&self, params: &HashMap<String, String>) -> Result<bool> {
        match self {
            Condition::Eq(left, right) => {
                let lhs = left.values(params)?;
                let rhs = right.values(params)?;
                Ok(lhs.iter().any(|l| rhs.iter().any(|r| l == r)))
            }
            Condition::Neq(left, right) => {
                let lhs = left.values(params)?;
                let rhs = right.values(params)?;
                Ok(lhs.iter().any(|l| rhs.iter().any(|r| l != r)))
            }
            other => {
                other.values(params)?;
                Ok(true)
            }
        }
    }

    /// The value set this expression stands for: one value for an
    /// identifier or literal, all member values for a choice.
    fn values(&self, params: &HashMap<String, String>) -> Result<Vec<String>> {
        match self {
            Condition::Ident(name) => match params.get(name) {
                Some(value) => Ok(vec![value.clone()]),
                None => Err(GramError::resolution(
                    "Resolution: Evaluating condition",
                    vec![format!("unknown identifier '{}'", name)],
                )),
            },
            Condition::Literal(text) => Ok(vec![text.clone()]),
            Condition::Choice(options) => {
                let mut all = Vec::new();
                for option in options {
                    all.extend(option.values(params)?);
                }
                Ok(all)
            }
            Condition::Eq(..) | Condition::Neq(..) => Err(GramError::resolution(
                "Resolution: Evaluating condition",
                vec!["a comparison cannot be used as a value".to_string()],
            )),
        }
    }
}

/// The left side of a change: where the assigned value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A sibling nonterminal's parameter, `A.p`.
    Nonterminal { name: String, param: String },
    /// A literal string.
    Literal(String),
    /// A parameter of the enclosing production.
    Ident(String),
    /// Pipe-separated alternatives; one is picked per application.
    Choice(Vec<Source>),
}

impl Source {
    /// Collapse any choices into a concrete source, picking uniformly.
    /// Runs once per change application, so the same change applied twice
    /// may pick different sources.
    pub fn decide<R: Rng>(&self, rng: &mut R) -> Source {
        match self {
            Source::Choice(options) => match options.choose(rng) {
                Some(option) => option.decide(rng),
                None => self.clone(),
            },
            other => other.clone(),
        }
    }
}

/// A directed feature assignment into a child nonterminal's parameter slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub source: Source,
    pub target: String,
    pub target_param: String,
}

/// A named, parameterized rule.
#[derive(Debug, Clone, PartialEq)]
pub enum NtDef {
    /// A rule defined in the grammar text.
    Inline {
        name: String,
        params: HashSet<String>,
        body: Pattern,
    },
    /// A rule backed by an external lexicon document, loaded lazily on
    /// first use and cached here.
    External {
        name: String,
        params: HashSet<String>,
        filename: String,
        cache: RefCell<Option<Lexicon>>,
    },
}

impl NtDef {
    pub fn name(&self) -> &str {
        match self {
            NtDef::Inline { name, .. } | NtDef::External { name, .. } => name,
        }
    }

    pub fn params(&self) -> &HashSet<String> {
        match self {
            NtDef::Inline { params, .. } | NtDef::External { params, .. } => params,
        }
    }

    /// Whether this definition fits a reference under the given parameter
    /// map. Parameter sets match exactly, never by subset.
    pub fn accepts(&self, name: &str, supplied: &HashMap<String, String>) -> bool {
        let params = self.params();
        self.name() == name
            && params.len() == supplied.len()
            && supplied.keys().all(|key| params.contains(key))
    }
}
