use anyhow::{anyhow, Context, Result};
use clap::Parser;
use engine::{remove_duplicates, DocumentStatus, ExecutionPolicy, SearchEngine};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: i32,
    text: String,
    #[serde(default = "default_status")]
    status: DocumentStatus,
    #[serde(default)]
    ratings: Vec<i32>,
}

fn default_status() -> DocumentStatus {
    DocumentStatus::Actual
}

#[derive(Parser)]
#[command(name = "search-cli")]
#[command(about = "Interactive driver for the in-memory search engine", long_about = None)]
struct Cli {
    /// JSONL file with documents to index at startup (id/text/status/ratings)
    #[arg(long)]
    docs: Option<String>,
    /// Space-separated stop words
    #[arg(long, default_value = "")]
    stop_words: String,
    /// Run queries with the parallel execution policy
    #[arg(long, default_value_t = false)]
    parallel: bool,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let mut server = SearchEngine::new(&cli.stop_words)?;
    if let Some(path) = &cli.docs {
        let loaded = load_documents(&mut server, path)?;
        tracing::info!(loaded, "documents indexed");
    }

    let policy = if cli.parallel {
        ExecutionPolicy::Parallel
    } else {
        ExecutionPolicy::Sequential
    };
    run_repl(&mut server, policy)
}

fn load_documents(server: &mut SearchEngine, path: &str) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("open {path}"))?;
    let reader = BufReader::new(file);
    let mut loaded = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: InputDoc = serde_json::from_str(&line)?;
        server.add_document(doc.id, &doc.text, doc.status, &doc.ratings)?;
        loaded += 1;
    }
    Ok(loaded)
}

fn run_repl(server: &mut SearchEngine, policy: ExecutionPolicy) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            return Ok(());
        }
        if let Err(err) = run_command(server, policy, line) {
            eprintln!("Error: {err}");
        }
    }
}

fn run_command(server: &mut SearchEngine, policy: ExecutionPolicy, line: &str) -> Result<()> {
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command {
        "search" => {
            let start = std::time::Instant::now();
            let found = server.find_top_documents_with_policy(policy, rest, |_, status, _| {
                status == DocumentStatus::Actual
            })?;
            tracing::debug!(took_s = start.elapsed().as_secs_f64(), hits = found.len(), "query done");
            for document in found {
                println!("{document}");
            }
        }
        "match" => {
            let (id, query) = rest
                .split_once(' ')
                .ok_or_else(|| anyhow!("usage: match <id> <query>"))?;
            let id = id.parse()?;
            let (words, status) = server.match_document_with_policy(policy, query.trim(), id)?;
            println!("{{ words = {words:?}, status = {status:?} }}");
        }
        "add" => {
            // add <id> <status> <r1,r2,...> <text...>
            let mut parts = rest.splitn(3, ' ');
            let id = parts
                .next()
                .ok_or_else(|| anyhow!("usage: add <id> <status> <ratings> <text>"))?
                .parse()?;
            let status = parse_status(
                parts
                    .next()
                    .ok_or_else(|| anyhow!("usage: add <id> <status> <ratings> <text>"))?,
            )?;
            let tail = parts
                .next()
                .ok_or_else(|| anyhow!("usage: add <id> <status> <ratings> <text>"))?;
            let (ratings, text) = tail
                .split_once(' ')
                .ok_or_else(|| anyhow!("usage: add <id> <status> <ratings> <text>"))?;
            let ratings = parse_ratings(ratings)?;
            server.add_document(id, text, status, &ratings)?;
        }
        "remove" => {
            let id = rest.parse()?;
            server.remove_document_with_policy(policy, id)?;
        }
        "dedup" => {
            let removed = remove_duplicates(server);
            println!("removed {} duplicate(s)", removed.len());
        }
        "count" => println!("{}", server.document_count()),
        "ids" => {
            let ids: Vec<_> = server.document_ids().collect();
            println!("{ids:?}");
        }
        _ => return Err(anyhow!("unknown command: {command}")),
    }
    Ok(())
}

fn parse_status(text: &str) -> Result<DocumentStatus> {
    match text.to_ascii_uppercase().as_str() {
        "ACTUAL" => Ok(DocumentStatus::Actual),
        "IRRELEVANT" => Ok(DocumentStatus::Irrelevant),
        "BANNED" => Ok(DocumentStatus::Banned),
        "REMOVED" => Ok(DocumentStatus::Removed),
        other => Err(anyhow!("unknown status: {other}")),
    }
}

fn parse_ratings(text: &str) -> Result<Vec<i32>> {
    if text == "-" {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|rating| rating.trim().parse().map_err(Into::into))
        .collect()
}
