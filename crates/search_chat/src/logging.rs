use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

pub fn setup_logging(verbose_level: u8) {
    setup_logging_with_file(verbose_level, None);
}

pub fn setup_logging_for_terminal_ui(verbose_level: u8) {
    // Log to a file so records do not interleave with streamed answers
    let log_file_path = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("search-chat")
        .join("chat.log");

    if let Some(parent) = log_file_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    setup_logging_with_file(verbose_level, Some(log_file_path));
}

fn filter_for(verbose_level: u8) -> tracing_subscriber::EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return tracing_subscriber::EnvFilter::from_default_env();
    }

    let filter_str = match verbose_level {
        0 => "warn,search_chat=info,llm=info,web=info",
        1 => "info,search_chat=debug,llm=debug,web=debug",
        _ => "debug,search_chat=trace,llm=trace,web=trace",
    };
    tracing_subscriber::EnvFilter::new(filter_str)
}

fn setup_logging_with_file(verbose_level: u8, log_file: Option<PathBuf>) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbose_level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    let Some(log_file_path) = log_file else {
        subscriber.with_writer(std::io::stderr).init();
        return;
    };

    match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
    {
        Ok(file) => subscriber
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Err(err) => {
            eprintln!(
                "Warning: Could not open log file {}: {err}, logging is disabled",
                log_file_path.display()
            );
            subscriber.with_writer(std::io::sink).init();
        }
    }
}

