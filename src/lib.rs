//! Agram is a feature-agreement grammar engine.
//!
//! A grammar is a set of parameterized nonterminal definitions. Each
//! production can guard itself with conditions on its parameters and can
//! propagate features (grammatical case, number, person, ...) between the
//! constituents it expands into. Resolving a nonterminal walks the grammar
//! top-down, picking uniformly at random wherever the grammar offers a
//! choice, and yields the resulting word sequence.
//!
//! # Example
//!
//! ```rust
//! use agram::Grammar;
//! use std::collections::HashMap;
//!
//! # fn main() -> agram::Result<()> {
//! let grammar = Grammar::parse(
//!     "Greeting:\n  \"hello\" <Subject>\nSubject:\n  \"world\"\n",
//! )?;
//!
//! let words = grammar.resolve("Greeting", &HashMap::new(), &mut rand::thread_rng())?;
//! assert_eq!(words, vec!["hello", "world"]);
//! # Ok(())
//! # }
//! ```
//!
//! Definitions can also point at JSON lexicon documents
//! (`Noun(case) -> "nouns.json"`), which are loaded lazily and queried by
//! parameter values; see [`lexicon::Lexicon`].

pub mod ast;
pub mod grammar;
pub mod graph;
pub mod lexer;
pub mod lexicon;
pub mod lines;
pub mod parser;
pub mod utils;

pub use grammar::Grammar;
pub use lexicon::Lexicon;
pub use parser::parse_definitions;
pub use utils::{GramError, Report, Result};

// Re-export the grammar object model
pub use ast::{Change, Condition, Element, NtDef, Pattern, Source};
