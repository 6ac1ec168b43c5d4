use anyhow::Result;
use search_chat::app::{commands, terminal, AppContext};
use search_chat::cli::{Args, Mode};
use search_chat::logging::{setup_logging, setup_logging_for_terminal_ui};
use search_chat::persistence::FileStore;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    let mode = args.mode.unwrap_or(Mode::Chat);

    if mode == Mode::Chat {
        setup_logging_for_terminal_ui(args.verbose);
    } else {
        setup_logging(args.verbose);
    }

    let store = match args.data_dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::default_location()?,
    };
    let context = AppContext::new(store, args.provider);

    match mode {
        Mode::Chat => terminal::run(context.session()).await?,
        Mode::Ask { prompt, search } => {
            if !commands::ask(&context, &prompt, search).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Mode::Settings { action } => commands::settings(&context, action)?,
        Mode::Relay { action } => commands::relay(&context, action).await?,
    }

    Ok(ExitCode::SUCCESS)
}
