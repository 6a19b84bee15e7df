use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rowstore::cli::Args;
use rowstore::config::Config;
use rowstore::error::Result;
use rowstore::tracker::MemTracker;
use rowstore::types::Datum;
use rowstore::{RowStore, input, output};

/// Set up SIGPIPE handling for Unix systems
/// This prevents "broken pipe" errors when output is piped to commands like `head`
#[cfg(unix)]
fn setup_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

#[cfg(not(unix))]
fn setup_sigpipe() {
    // Windows doesn't have SIGPIPE
}

/// Log to stderr; `RUST_LOG` overrides the default level
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    setup_sigpipe();

    if let Err(e) = run() {
        eprintln!("rowstore: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args)?;
    init_logging(config.debug);

    // Read rows from files or stdin
    let rows: Vec<Vec<Datum>> = if config.input_files.is_empty() {
        let stdin = io::stdin();
        input::read_rows(BufReader::new(stdin.lock()), &config)?
    } else {
        let mut all_rows = Vec::new();
        for path in &config.input_files {
            let reader: Box<dyn BufRead> = if path == "-" {
                Box::new(BufReader::new(io::stdin().lock()))
            } else {
                Box::new(BufReader::new(File::open(path)?))
            };
            all_rows.append(&mut input::read_rows(reader, &config)?);
        }
        all_rows
    };

    let tracker = match config.mem_limit {
        Some(limit) => MemTracker::with_limit("rowstore", limit),
        None => MemTracker::new("rowstore"),
    };
    let mut store = RowStore::with_tracker(config.schema.clone(), config.store, Arc::clone(&tracker));

    // Every pass after the first refills recycled chunks
    for pass in 0..config.passes {
        if pass > 0 {
            store.reset();
        }
        input::load_rows(&mut store, &rows, config.bulk)?;
        info!(pass, rows = store.len(), chunks = store.num_chunks(), "loaded rows");
    }

    let out = output::open_output(&config)?;
    output::write_rows(out, &store, &config)?;

    if config.stats {
        let stderr = io::stderr();
        let mut stderr = stderr.lock();
        output::write_stats(&mut stderr, &store)?;
        stderr.flush()?;
    }

    store.clear();
    Ok(())
}
