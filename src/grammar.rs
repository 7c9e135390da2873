use rand::Rng;
use rand::seq::SliceRandom;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::{Change, Element, NtDef, Pattern, Source};
use crate::lexicon::Lexicon;
use crate::parser;
use crate::utils::{GramError, Result};

const ORIGIN: &str = "Resolution: Expanding nonterminal";

/// The outcome of resolving one pattern: the chosen elements plus the
/// changes collected on the way down, or `None` when a guard ruled the
/// branch out. A `None` is ordinary control flow that sends the enclosing
/// alternation to its next branch; it only hardens into an error at the
/// top of a definition.
type Branch = Option<(Vec<Element>, Vec<Change>)>;

/// A parsed grammar: the flat list of nonterminal definitions plus the
/// directory lexicon files are resolved against.
#[derive(Debug, Clone)]
pub struct Grammar {
    defs: Vec<NtDef>,
    base_dir: PathBuf,
}

impl Grammar {
    /// Parse a grammar from text. Lexicon files are looked up relative to
    /// the working directory; see [`Grammar::with_base_dir`].
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Grammar {
            defs: parser::parse_definitions(source)?,
            base_dir: PathBuf::from("."),
        })
    }

    /// Parse a grammar from a file. Lexicon files are looked up next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = fs::read_to_string(&path)?;
        let base_dir = match path.as_ref().parent() {
            Some(parent) if parent != Path::new("") => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Grammar {
            defs: parser::parse_definitions(&source)?,
            base_dir,
        })
    }

    /// Override the directory lexicon filenames are resolved against.
    pub fn with_base_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn defs(&self) -> &[NtDef] {
        &self.defs
    }

    pub fn has_nonterminal(&self, name: &str) -> bool {
        self.defs.iter().any(|def| def.name() == name)
    }

    /// Resolve a nonterminal into its word sequence, drawing every random
    /// choice from `rng`.
    ///
    /// Definitions are matched by name and exact parameter set; several
    /// fitting definitions are chosen among uniformly.
    pub fn resolve<R: Rng>(
        &self,
        name: &str,
        params: &HashMap<String, String>,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let candidates: Vec<&NtDef> = self
            .defs
            .iter()
            .filter(|def| def.accepts(name, params))
            .collect();
        let Some(def) = candidates.choose(rng) else {
            let mut supplied: Vec<&str> = params.keys().map(|k| k.as_str()).collect();
            supplied.sort_unstable();
            return Err(GramError::resolution(
                ORIGIN,
                vec![format!(
                    "no definition of <{}> fits the parameters {{{}}}",
                    name,
                    supplied.join(", ")
                )],
            ));
        };

        match def {
            NtDef::External {
                filename, cache, ..
            } => self.resolve_external(filename, cache, params, rng),
            NtDef::Inline { name, body, .. } => match self.resolve_pattern(body, params, rng)? {
                Some((elements, changes)) => self.expand(&elements, changes, params, rng),
                None => Err(GramError::resolution(
                    ORIGIN,
                    vec![format!(
                        "every alternative of <{}> is ruled out by its guards",
                        name
                    )],
                )),
            },
        }
    }

    /// Resolve a nonterminal with a thread-local RNG and join the words
    /// with single spaces.
    pub fn generate(&self, name: &str, params: &HashMap<String, String>) -> Result<String> {
        let words = self.resolve(name, params, &mut rand::thread_rng())?;
        Ok(words.join(" "))
    }

    fn resolve_pattern<R: Rng>(
        &self,
        pattern: &Pattern,
        params: &HashMap<String, String>,
        rng: &mut R,
    ) -> Result<Branch> {
        match pattern {
            Pattern::Sequence(elements) => Ok(Some((elements.clone(), Vec::new()))),
            Pattern::Guarded(inner, condition) => {
                if condition.eval(params)? {
                    self.resolve_pattern(inner, params, rng)
                } else {
                    Ok(None)
                }
            }
            Pattern::WithChanges(inner, changes) => {
                Ok(self.resolve_pattern(inner, params, rng)?.map(
                    |(elements, mut collected)| {
                        collected.extend(changes.iter().cloned());
                        (elements, collected)
                    },
                ))
            }
            Pattern::Choice(alternatives) => {
                let mut order: Vec<&Pattern> = alternatives.iter().collect();
                order.shuffle(rng);
                for alternative in order {
                    if let Some(branch) = self.resolve_pattern(alternative, params, rng)? {
                        return Ok(Some(branch));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Run the production's changes, then expand its elements left to
    /// right into the output words.
    fn expand<R: Rng>(
        &self,
        elements: &[Element],
        changes: Vec<Change>,
        params: &HashMap<String, String>,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let nt_config = self.apply_changes(elements, changes, params, rng)?;

        let mut memo: HashMap<String, Vec<String>> = HashMap::new();
        let mut output = Vec::new();
        for element in elements {
            match element {
                Element::Terminal(text) => output.push(text.clone()),
                Element::Nonterminal { name, eager: true } => {
                    // resolved anew on every occurrence
                    let config = nt_config.get(name).cloned().unwrap_or_default();
                    output.extend(self.resolve(name, &config, rng)?);
                }
                Element::Nonterminal { name, eager: false } => {
                    let words = match memo.get(name) {
                        Some(words) => words.clone(),
                        None => {
                            let config = nt_config.get(name).cloned().unwrap_or_default();
                            let words = self.resolve(name, &config, rng)?;
                            memo.insert(name.clone(), words.clone());
                            words
                        }
                    };
                    output.extend(words);
                }
            }
        }
        Ok(output)
    }

    /// Build the per-child parameter maps. Constant-valued changes run
    /// first in written order (last write wins); sibling-to-sibling
    /// changes run in topological order of their sources, so a source
    /// parameter is always assigned before it is read.
    fn apply_changes<R: Rng>(
        &self,
        elements: &[Element],
        changes: Vec<Change>,
        params: &HashMap<String, String>,
        rng: &mut R,
    ) -> Result<HashMap<String, HashMap<String, String>>> {
        let mut nt_config: HashMap<String, HashMap<String, String>> = HashMap::new();
        for element in elements {
            if let Element::Nonterminal { name, .. } = element {
                nt_config.entry(name.clone()).or_default();
            }
        }

        let mut constants: Vec<(String, String, String)> = Vec::new();
        let mut links: Vec<(String, String, String, String)> = Vec::new();
        for change in changes {
            // source choices are decided per application
            match change.source.decide(rng) {
                Source::Nonterminal { name, param } => {
                    links.push((name, param, change.target, change.target_param));
                }
                Source::Literal(text) => {
                    constants.push((text, change.target, change.target_param));
                }
                Source::Ident(ident) => {
                    let value = match params.get(&ident) {
                        Some(value) => value.clone(),
                        None => {
                            return Err(GramError::resolution(
                                ORIGIN,
                                vec![format!("unknown identifier '{}'", ident)],
                            ));
                        }
                    };
                    constants.push((value, change.target, change.target_param));
                }
                Source::Choice(_) => {
                    return Err(GramError::resolution(
                        ORIGIN,
                        vec!["change source choice has no options".to_string()],
                    ));
                }
            }
        }

        for (value, target, target_param) in constants {
            let slot = self.config_slot(&mut nt_config, &target)?;
            slot.insert(target_param, value);
        }

        let mut graph = crate::graph::ChangeGraph::new();
        for (source, _, target, _) in &links {
            graph.add_edge(source, target);
        }
        let order = graph.topological_sort();
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, node)| (node.as_str(), i))
            .collect();
        links.sort_by_key(|(source, ..)| position.get(source.as_str()).copied().unwrap_or(0));

        for (source, source_param, target, target_param) in links {
            let value = {
                let config = match nt_config.get(&source) {
                    Some(config) => config,
                    None => {
                        return Err(GramError::resolution(
                            ORIGIN,
                            vec![format!(
                                "change reads <{}>, which the production does not contain",
                                source
                            )],
                        ));
                    }
                };
                match config.get(&source_param) {
                    Some(value) => value.clone(),
                    None => {
                        return Err(GramError::resolution(
                            ORIGIN,
                            vec![format!(
                                "parameter '{}' of <{}> has not been assigned",
                                source_param, source
                            )],
                        ));
                    }
                }
            };
            let slot = self.config_slot(&mut nt_config, &target)?;
            slot.insert(target_param, value);
        }

        Ok(nt_config)
    }

    fn config_slot<'c>(
        &self,
        nt_config: &'c mut HashMap<String, HashMap<String, String>>,
        target: &str,
    ) -> Result<&'c mut HashMap<String, String>> {
        match nt_config.get_mut(target) {
            Some(slot) => Ok(slot),
            None => Err(GramError::resolution(
                ORIGIN,
                vec![format!(
                    "change targets <{}>, which the production does not contain",
                    target
                )],
            )),
        }
    }

    /// Expand a file-backed nonterminal, loading its lexicon on first use
    /// and caching it on the definition.
    fn resolve_external<R: Rng>(
        &self,
        filename: &str,
        cache: &RefCell<Option<Lexicon>>,
        params: &HashMap<String, String>,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let mut slot = cache.borrow_mut();
        let lexicon = match slot.take() {
            Some(lexicon) => lexicon,
            None => Lexicon::load(&self.base_dir.join(filename))?,
        };
        let words = lexicon.lookup(params, rng);
        *slot = Some(lexicon);
        words
    }
}
