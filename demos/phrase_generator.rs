use agram::Grammar;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::error::Error;

/// A small English grammar with number agreement between subject and verb.
const GRAMMAR: &str = r#"
Sentence:
  <Subject> <Verb>
  with:
    Subject ==num=> Verb
    "sg" | "pl" => Subject.num

Subject(num):
  from:
    "the" <Noun>
    "a" <Noun> if num = "sg"
  with:
    num => Noun.num

Verb(num):
  from:
    "runs" if num = "sg"
    "run" if num = "pl"
    "sleeps" if num = "sg"
    "sleep" if num = "pl"

Noun(num):
  from:
    "cat" if num = "sg"
    "cats" if num = "pl"
    "dog" if num = "sg"
    "dogs" if num = "pl"
"#;

fn main() -> Result<(), Box<dyn Error>> {
    let grammar = Grammar::parse(GRAMMAR)?;

    println!("Seeded, reproducible sentences:");
    let mut rng = StdRng::seed_from_u64(2024);
    for i in 1..=5 {
        let words = grammar.resolve("Sentence", &HashMap::new(), &mut rng)?;
        println!("{}. {}", i, words.join(" "));
    }

    println!("\nFresh sentences on every run:");
    for i in 1..=5 {
        println!("{}. {}", i, grammar.generate("Sentence", &HashMap::new())?);
    }

    Ok(())
}
