use clap::Parser;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pollwatch::{
    cli::{Cli, OutputFormat},
    ChangeEvent, ChangeKind, PollingWatcher,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.setup_logging();

    let config = match cli.watch_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting PollWatch on: {}", config.root.display());

    let output = cli.output;
    let color = !cli.no_color;
    let printer = move |batch: &[ChangeEvent]| -> Result<()> {
        for event in batch {
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
                OutputFormat::Text => print_text_event(event, color),
                OutputFormat::Compact => print_compact_event(event),
            }
        }
        Ok(())
    };

    let mut watcher = PollingWatcher::new(config, printer)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    if matches!(output, OutputFormat::Text) {
        println!("Watching: {}", watcher.config().root.display());
        println!("Press Ctrl+C to quit");
        println!("---");
    }

    watcher.start()?;
    while running.load(Ordering::SeqCst) && watcher.is_running() {
        std::thread::sleep(Duration::from_millis(100));
    }
    watcher.stop()?;

    Ok(())
}

fn print_text_event(event: &ChangeEvent, color: bool) {
    let time_str = chrono::DateTime::<chrono::Local>::from(event.record.modified)
        .format("%Y-%m-%d %H:%M:%S");
    let label = event.kind.label();

    if color {
        let code = match event.kind {
            ChangeKind::Initial => "\x1b[90m",      // Grey
            ChangeKind::Created => "\x1b[32m",      // Green
            ChangeKind::Deleted => "\x1b[31m",      // Red
            ChangeKind::DateModified => "\x1b[33m", // Yellow
            ChangeKind::SizeModified => "\x1b[34m", // Blue
        };
        println!(
            "[{}] {}{:<13}\x1b[0m {} ({} bytes)",
            time_str,
            code,
            label,
            event.path().display(),
            event.record.size
        );
    } else {
        println!(
            "[{}] {:<13} {} ({} bytes)",
            time_str,
            label,
            event.path().display(),
            event.record.size
        );
    }
}

fn print_compact_event(event: &ChangeEvent) {
    println!("{} {}", event.kind.short_code(), event.path().display());
}
