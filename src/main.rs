//! Mimic CLI

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use mimic::store::{read_index, Criteria, Criterion, FixtureDefinition, INDEX_FILE};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Mimic v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: mimic <command> <path>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  list <fixture-dir>    List index files and their definition counts");
        eprintln!("  show <index-file>     Show the definitions in one index file");
        process::exit(1);
    }

    let path = PathBuf::from(&args[2]);
    let result = match args[1].as_str() {
        "list" => list(&path),
        "show" => show(&path),
        command => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'mimic' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn list(dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        bail!("Directory not found: {}", dir.display());
    }

    let mut index_files = Vec::new();
    collect_index_files(dir, &mut index_files)?;
    index_files.sort();

    println!("Fixture directory: {}", dir.display());
    println!();

    let mut total = 0;
    for path in &index_files {
        let definitions = load(path)?;
        total += definitions.len();
        let shown = path.strip_prefix(dir).unwrap_or(path);
        println!("{:>5}  {}", definitions.len(), shown.display());
    }

    println!();
    println!(
        "{} definitions in {} index files",
        total,
        index_files.len()
    );
    Ok(())
}

fn show(path: &Path) -> anyhow::Result<()> {
    let definitions = load(path)?;

    println!("Index file: {}", path.display());
    for (position, definition) in definitions.iter().enumerate() {
        println!();
        println!("[{position}] {}", definition.method);
        println!("    headers: {}", describe(&definition.headers));
        println!("    query:   {}", describe(&definition.query));
        println!(
            "    status:  {}  body: {}",
            definition.response.status,
            definition.response.body_file.as_deref().unwrap_or("-")
        );
        if definition.executed_request.is_some() {
            println!("    (updated from a live request)");
        }
    }
    Ok(())
}

fn load(path: &Path) -> anyhow::Result<Vec<FixtureDefinition>> {
    read_index(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .with_context(|| format!("Index file not found: {}", path.display()))
}

fn collect_index_files(dir: &Path, found: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            collect_index_files(&path, found)?;
        } else if path.file_name().is_some_and(|name| name == INDEX_FILE) {
            debug!("Found index file: {}", path.display());
            found.push(path);
        }
    }
    Ok(())
}

fn describe(criteria: &Criteria) -> String {
    if criteria.is_empty() {
        return "-".to_string();
    }

    criteria
        .iter()
        .map(|(key, criterion)| match criterion {
            Criterion::Exact(value) => format!("{key}={value}"),
            Criterion::Present => format!("{key}=*"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
