use std::io::Read as _;
use std::path::PathBuf;

use clap::Parser;

use redirect_core::cache::TranslationCache;
use redirect_core::defense::{DefenseStats, LoopDetector, RecursionGuard};
use redirect_core::fingerprint::fingerprint;
use redirect_core::translate::{translate, StackBudget, StaticConflictTargets};

/// redirect-translate: runs the translation pipeline outside the ABI
/// boundary and prints what came out the other end.
#[derive(Parser)]
#[command(name = "redirect-translate", version, about = "Inspect the SQLite-to-Postgres translation pipeline")]
struct Args {
    /// SQL to translate. Reads stdin when omitted.
    sql: Option<String>,
    /// Read statements from a file instead, one per line.
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// Schema prefix passed to the pipeline (§4.1).
    #[arg(long, default_value = "plex")]
    schema: String,
    /// Print translation-cache and self-defense stats after running.
    #[arg(long)]
    stats: bool,
}

fn main() {
    let args = Args::parse();

    let statements = if let Some(path) = &args.file {
        match std::fs::read_to_string(path) {
            Ok(contents) => contents.lines().map(str::to_string).filter(|l| !l.trim().is_empty()).collect(),
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                std::process::exit(1);
            }
        }
    } else if let Some(sql) = &args.sql {
        vec![sql.clone()]
    } else {
        let mut buf = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
            eprintln!("Error reading stdin: {e}");
            std::process::exit(1);
        }
        buf.lines().map(str::to_string).filter(|l| !l.trim().is_empty()).collect()
    };

    if statements.is_empty() {
        eprintln!("No SQL given.");
        std::process::exit(1);
    }

    let targets = StaticConflictTargets(Vec::new());
    let mut cache = TranslationCache::new();
    let mut loop_detector = LoopDetector::new();

    for sql in &statements {
        let _guard = RecursionGuard::enter();
        let fp = fingerprint(sql);
        let looping = loop_detector.observe(fp, std::time::Instant::now());
        if looping {
            println!("-- loop detector rejected this statement");
            continue;
        }

        let translation = match cache.get(fp) {
            Some(cached) => cached.clone(),
            None => {
                let fresh = translate(sql, &args.schema, &[], &targets, StackBudget::Full);
                cache.insert(fp, fresh.clone());
                fresh
            }
        };

        println!("-- class: {:?}", translation.class);
        println!("{}", translation.sql);
        if !translation.param_names.is_empty() {
            let names: Vec<String> = translation
                .param_names
                .iter()
                .map(|n| n.clone().unwrap_or_else(|| "?".to_string()))
                .collect();
            println!("-- params ({}): {}", translation.param_count, names.join(", "));
        }
        if !translation.succeeded {
            println!("-- fell back to the original statement unmodified");
        }
        println!();
    }

    if args.stats {
        println!("{}", cache.stats());
        let defense = DefenseStats {
            recursion_high_water: RecursionGuard::high_water_mark(),
            loop_detector_trips: loop_detector.trips(),
        };
        println!("{defense}");
    }
}
