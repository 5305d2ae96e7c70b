//! Interactive shell over the storage engine.
//!
//! Commands are case-insensitive and whitespace-separated; a PUT value
//! may contain spaces (the remaining tokens are joined back). The two
//! ITERATE commands drop into a sub-shell speaking `next`, `has_next`,
//! `reset`, and `stop`.

use std::path::Path;
use std::time::Instant;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use stratadb::config::Config;
use stratadb::engine::{Engine, EngineError, ScanIterator};

/// User charged for interactive traffic.
const CLI_USER: &str = "cli";

const HELP: &str = "\
Commands (case-insensitive):
  PUT <key> <value...>              store a value (spaces allowed)
  GET <key>                         fetch a value
  DELETE <key>                      delete a key
  PREFIX_SCAN <prefix> <page> <n>   one page of keys with a prefix
  RANGE_SCAN <start> <end> <page> <n>
                                    one page of keys in [start, end]
  PREFIX_ITERATE <prefix>           iterate matches (next/stop/has_next/reset)
  RANGE_ITERATE <start> <end>       iterate a range
  STATS                             engine status
  CLEAR                             clear the screen
  HELP                              this text
  EXIT                              flush and quit";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run() {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };

    let engine = Engine::open(config)?;
    engine.start()?;

    let mut editor = DefaultEditor::new()?;
    println!("stratadb shell — HELP lists commands");

    loop {
        let line = match editor.readline("strata> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match dispatch(&engine, &mut editor, line) {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::Exit) => break,
            Err(EngineError::Admission(denied)) => println!("DENIED: {denied}"),
            Err(e) => println!("ERROR: {e}"),
        }
    }

    engine.shut()?;
    println!("bye");
    Ok(())
}

enum Outcome {
    Continue,
    Exit,
}

fn dispatch(
    engine: &Engine,
    editor: &mut DefaultEditor,
    line: &str,
) -> Result<Outcome, EngineError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let command = tokens[0].to_uppercase();

    match (command.as_str(), tokens.len()) {
        ("PUT", n) if n >= 3 => {
            let value = tokens[2..].join(" ");
            let started = Instant::now();
            engine.write(CLI_USER, tokens[1], &value, false)?;
            println!("OK ({:.2?})", started.elapsed());
        }
        ("GET", 2) => match engine.read(CLI_USER, tokens[1])? {
            Some(value) => println!("{value}"),
            None => println!("NOT FOUND"),
        },
        ("DELETE", 2) => {
            engine.delete(CLI_USER, tokens[1])?;
            println!("OK");
        }
        ("PREFIX_SCAN", 4) => match (tokens[2].parse::<usize>(), tokens[3].parse::<usize>()) {
            (Ok(page), Ok(size)) => {
                print_rows(engine.prefix_scan(CLI_USER, tokens[1], page, size)?);
            }
            _ => println!("usage: PREFIX_SCAN <prefix> <page> <page_size>"),
        },
        ("RANGE_SCAN", 5) => match (tokens[3].parse::<usize>(), tokens[4].parse::<usize>()) {
            (Ok(page), Ok(size)) => {
                print_rows(engine.range_scan(CLI_USER, tokens[1], tokens[2], page, size)?);
            }
            _ => println!("usage: RANGE_SCAN <start> <end> <page> <page_size>"),
        },
        ("PREFIX_ITERATE", 2) => {
            let iter = engine.prefix_iterate(CLI_USER, tokens[1])?;
            iterator_shell(editor, iter);
        }
        ("RANGE_ITERATE", 3) => {
            let iter = engine.range_iterate(CLI_USER, tokens[1], tokens[2])?;
            iterator_shell(editor, iter);
        }
        ("STATS", 1) => print_stats(engine)?,
        ("HELP", 1) => println!("{HELP}"),
        ("CLEAR", 1) => print!("\x1B[2J\x1B[1;1H"),
        ("EXIT", 1) | ("QUIT", 1) => return Ok(Outcome::Exit),
        _ => println!("unrecognized command; HELP lists commands"),
    }
    Ok(Outcome::Continue)
}

/// The sub-shell for PREFIX_ITERATE / RANGE_ITERATE.
fn iterator_shell(editor: &mut DefaultEditor, mut iter: ScanIterator) {
    println!("iterator over {} entries (next/has_next/reset/stop)", iter.len());
    loop {
        let line = match editor.readline("iter> ") {
            Ok(line) => line,
            Err(_) => break,
        };
        match line.trim().to_lowercase().as_str() {
            "next" => match iter.next() {
                Some((key, value)) => println!("{key} = {value}"),
                None => println!("(exhausted)"),
            },
            "has_next" => println!("{}", iter.has_next()),
            "reset" => {
                iter.reset();
                println!("OK");
            }
            "stop" => {
                iter.stop();
                break;
            }
            "" => {}
            other => println!("unknown iterator command: {other}"),
        }
    }
}

fn print_rows(rows: Vec<(String, String)>) {
    if rows.is_empty() {
        println!("(no results)");
        return;
    }
    for (key, value) in rows {
        println!("{key} = {value}");
    }
}

fn print_stats(engine: &Engine) -> Result<(), EngineError> {
    engine.sync()?;
    let stats = engine.stats()?;
    println!("memtables (cursor {}):", stats.cursor);
    for (i, size) in stats.memtable_sizes.iter().enumerate() {
        let marker = if i == stats.cursor { " <- active" } else { "" };
        println!("  [{i}] {size} bytes{marker}");
    }
    println!("tables per level:");
    for (level, count) in stats.tables_per_level.iter().enumerate() {
        println!("  lvl{level}: {count}");
    }
    println!("total table bytes: {}", stats.total_table_bytes);
    println!("wal segments: {}", stats.wal_segments);
    println!("pending wal records: {}", stats.pending_wal_records);
    Ok(())
}
