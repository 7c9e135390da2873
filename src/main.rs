use agram::Grammar;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Feature-agreement grammar engine
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the grammar file
    #[arg(help = "Path to the grammar file")]
    grammar_file: Option<PathBuf>,

    /// The starting nonterminal
    #[arg(help = "Starting nonterminal")]
    start_symbol: Option<String>,

    /// Number of sentences to generate
    #[arg(help = "Number of sentences to generate", default_value_t = 1)]
    count: usize,

    /// Initial parameters for the start nonterminal
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a ready-to-run example grammar with its lexicon
    Example {
        /// Directory to write into
        #[arg(help = "Directory to write into", default_value = ".")]
        output_dir: PathBuf,
    },
}

const EXAMPLE_GRAMMAR: &str = r#"// A tiny English grammar with number agreement.

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
  "runs" if num = "sg"
  "run" if num = "pl"

Noun(num) -> "nouns.json"
"#;

const EXAMPLE_LEXICON: &str = r#"{
  "order": ["num", "..."],
  "content": {
    "sg": ["cat", "dog", "linguist"],
    "pl": ["cats", "dogs", "linguists"]
  }
}
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(command) = cli.command {
        match command {
            Commands::Example { output_dir } => {
                let grammar_path = output_dir.join("example_grammar.txt");
                fs::write(&grammar_path, EXAMPLE_GRAMMAR)?;
                fs::write(output_dir.join("nouns.json"), EXAMPLE_LEXICON)?;

                println!("Created example grammar at: {}", grammar_path.display());
                println!("Try: agram {} Sentence 5", grammar_path.display());
                return Ok(());
            }
        }
    }

    let grammar_file = cli.grammar_file.ok_or("Grammar file path required")?;
    let start_symbol = cli.start_symbol.ok_or("Starting nonterminal required")?;
    let params = parse_params(&cli.params)?;

    println!("Loading grammar from {}...", grammar_file.display());
    let grammar = Grammar::from_file(&grammar_file)?;

    println!("Loaded {} definitions.", grammar.defs().len());
    println!("Generating {} random sentences:\n", cli.count);

    let mut rng: StdRng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for i in 0..cli.count {
        let words = grammar.resolve(&start_symbol, &params, &mut rng)?;
        println!("{}. {}", i + 1, words.join(" "));
    }

    Ok(())
}

fn parse_params(raw: &[String]) -> Result<HashMap<String, String>, Box<dyn std::error::Error>> {
    let mut params = HashMap::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(format!("parameter '{}' is not of the form key=value", entry).into());
        };
        params.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(params)
}
