use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::utils::{GramError, Result};

const ORIGIN: &str = "Resolution: Reading lexicon";

/// The `order` entry standing for "pick a random branch here".
pub const WILDCARD: &str = "...";

/// A file-backed word table behind an external nonterminal.
///
/// `order` names the parameters in traversal order (with the `"..."`
/// wildcard for random picks) and `content` is the nested mapping the
/// query walks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Lexicon {
    pub order: Vec<String>,
    pub content: Value,
}

impl Lexicon {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            GramError::resolution(
                ORIGIN,
                vec![format!("cannot read '{}': {}", path.display(), err)],
            )
        })?;
        serde_json::from_str(&text).map_err(|err| {
            GramError::resolution(
                ORIGIN,
                vec![format!(
                    "'{}' is not a valid lexicon document: {}",
                    path.display(),
                    err
                )],
            )
        })
    }

    /// Walk `content` along `order`, substituting supplied parameter
    /// values and picking uniformly at random on every wildcard.
    pub fn lookup<R: Rng>(
        &self,
        params: &HashMap<String, String>,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        self.check_params(params)?;

        let mut cursor = &self.content;
        for step in &self.order {
            cursor = if step == WILDCARD {
                self.pick_random(cursor, rng)?
            } else {
                let value = match params.get(step) {
                    Some(value) => value,
                    None => {
                        return Err(GramError::resolution(
                            ORIGIN,
                            vec![format!("unknown identifier '{}'", step)],
                        ));
                    }
                };
                self.index(cursor, value)?
            };
        }

        match cursor {
            Value::String(word) => Ok(vec![word.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(word) => Ok(word.clone()),
                    other => Err(self.no_entry(&format!("non-string entry {}", other))),
                })
                .collect(),
            other => Err(self.no_entry(&format!("query ends on {}", other))),
        }
    }

    /// The supplied parameter set must equal `order` minus the wildcard.
    fn check_params(&self, params: &HashMap<String, String>) -> Result<()> {
        let required: HashSet<&str> = self
            .order
            .iter()
            .map(|step| step.as_str())
            .filter(|step| *step != WILDCARD)
            .collect();
        let supplied: HashSet<&str> = params.keys().map(|key| key.as_str()).collect();
        if required != supplied {
            return Err(GramError::resolution(
                ORIGIN,
                vec![format!(
                    "lexicon expects parameters {{{}}}, got {{{}}}",
                    sorted_join(&required),
                    sorted_join(&supplied)
                )],
            ));
        }
        Ok(())
    }

    fn pick_random<'v, R: Rng>(&self, cursor: &'v Value, rng: &mut R) -> Result<&'v Value> {
        match cursor {
            Value::Object(map) if !map.is_empty() => {
                let picked = rng.gen_range(0..map.len());
                match map.values().nth(picked) {
                    Some(value) => Ok(value),
                    None => Err(self.no_entry("empty mapping")),
                }
            }
            Value::Array(items) if !items.is_empty() => Ok(&items[rng.gen_range(0..items.len())]),
            other => Err(self.no_entry(&format!("nothing to pick from in {}", other))),
        }
    }

    fn index<'v>(&self, cursor: &'v Value, key: &str) -> Result<&'v Value> {
        match cursor {
            Value::Object(map) => match map.get(key) {
                Some(value) => Ok(value),
                None => Err(self.no_entry(&format!("no entry under '{}'", key))),
            },
            other => Err(self.no_entry(&format!("cannot index {} with '{}'", other, key))),
        }
    }

    fn no_entry(&self, detail: &str) -> GramError {
        GramError::resolution(ORIGIN, vec![format!("no lexicon entry: {}", detail)])
    }
}

fn sorted_join(set: &HashSet<&str>) -> String {
    let mut names: Vec<&str> = set.iter().copied().collect();
    names.sort_unstable();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn noun_lexicon() -> Lexicon {
        Lexicon {
            order: vec!["case".to_string(), WILDCARD.to_string()],
            content: json!({
                "nom": ["cat"],
                "acc": ["cats"],
            }),
        }
    }

    #[test]
    fn test_lookup_substitutes_then_picks() {
        let lexicon = noun_lexicon();
        let mut rng = StdRng::seed_from_u64(0);
        let words = lexicon.lookup(&params(&[("case", "acc")]), &mut rng).unwrap();
        assert_eq!(words, vec!["cats".to_string()]);
    }

    #[test]
    fn test_array_leaf_returns_all_words() {
        let lexicon = Lexicon {
            order: vec!["case".to_string()],
            content: json!({ "nom": ["the", "cat"] }),
        };
        let mut rng = StdRng::seed_from_u64(0);
        let words = lexicon.lookup(&params(&[("case", "nom")]), &mut rng).unwrap();
        assert_eq!(words, vec!["the".to_string(), "cat".to_string()]);
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        let lexicon = noun_lexicon();
        let mut rng = StdRng::seed_from_u64(0);
        let err = lexicon
            .lookup(&params(&[("case", "dat")]), &mut rng)
            .unwrap_err();
        assert!(matches!(err, GramError::Resolution(_)));
    }

    #[test]
    fn test_parameter_set_must_match_order() {
        let lexicon = noun_lexicon();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(lexicon.lookup(&params(&[]), &mut rng).is_err());
        assert!(
            lexicon
                .lookup(&params(&[("case", "nom"), ("num", "sg")]), &mut rng)
                .is_err()
        );
    }

    #[test]
    fn test_wildcard_only_picks_existing_branches() {
        let lexicon = Lexicon {
            order: vec![WILDCARD.to_string(), WILDCARD.to_string()],
            content: json!({
                "a": ["x", "y"],
                "b": ["z"],
            }),
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let word = lexicon.lookup(&params(&[]), &mut rng).unwrap();
            assert_eq!(word.len(), 1);
            assert!(["x", "y", "z"].contains(&word[0].as_str()));
        }
    }

    #[test]
    fn test_load_missing_file_is_a_resolution_error() {
        let err = Lexicon::load(Path::new("no/such/lexicon.json")).unwrap_err();
        assert!(matches!(err, GramError::Resolution(_)));
    }
}
