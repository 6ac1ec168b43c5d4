use crate::error::ChatError;
use crate::persistence::ConversationRecord;
use crate::session::{ChatObserver, ChatSession, SendOutcome};
use anyhow::Result;
use crossterm::style::{self, Color, Stylize};
use llm::{MessageRole, ProviderId};
use rustyline::{error::ReadlineError, history::DefaultHistory, Config, Editor};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Prompt(String),
    NewConversation,
    ToggleSearch,
    Model(Option<String>),
    History,
    Load(String),
    Help,
    Quit,
    Unknown(String),
    Empty,
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplInput::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ReplInput::Prompt(line.to_string());
        };

        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, Some(argument.trim().to_string())),
            None => (command, None),
        };
        let argument = argument.filter(|argument| !argument.is_empty());

        match (name, argument) {
            ("new", _) => ReplInput::NewConversation,
            ("search", _) => ReplInput::ToggleSearch,
            ("model", argument) => ReplInput::Model(argument),
            ("history", _) => ReplInput::History,
            ("load", Some(id)) => ReplInput::Load(id),
            ("help", _) => ReplInput::Help,
            ("quit" | "exit", _) => ReplInput::Quit,
            _ => ReplInput::Unknown(line.to_string()),
        }
    }
}

const HELP: &str = "\
/new             empieza una conversación nueva
/search          activa la búsqueda web para el próximo mensaje
/model [id]      muestra o cambia el modelo (gemini, openai, openrouter, ollama)
/history         lista las conversaciones guardadas
/load <id>       abre una conversación guardada
/help            muestra esta ayuda
/quit            sale

Ctrl-C durante una respuesta la cancela.";

/// Renders a send to the terminal as it streams
pub struct TerminalObserver {
    // Only set in tests; production output goes to stdout
    writer: Option<Arc<Mutex<Box<dyn Write + Send>>>>,
}

impl TerminalObserver {
    pub fn new() -> Self {
        Self { writer: None }
    }

    #[cfg(test)]
    pub fn with_test_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Some(Arc::new(Mutex::new(writer))),
        }
    }

    fn write(&self, text: &str) {
        let result = match &self.writer {
            Some(writer) => match writer.lock() {
                Ok(mut writer) => write!(writer, "{text}").and_then(|_| writer.flush()),
                Err(_) => Ok(()),
            },
            None => {
                let mut stdout = io::stdout().lock();
                write!(stdout, "{text}").and_then(|_| stdout.flush())
            }
        };
        if let Err(err) = result {
            tracing::warn!("Failed to write to terminal: {err}");
        }
    }

    pub fn line(&self, text: &str) {
        self.write(&format!("{text}\n"));
    }
}

impl Default for TerminalObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatObserver for TerminalObserver {
    fn status(&self, message: &str) {
        self.line(&format!(
            "{} {}",
            "⋯".with(Color::DarkGrey),
            message.to_string().dark_grey().italic()
        ));
    }

    fn clear_status(&self) {
        // Status lines scroll away with the answer
    }

    fn on_chunk(&self, delta: &str) {
        self.write(delta);
    }

    fn on_complete(&self, _response: &str) {
        self.write("\n\n");
    }

    fn on_error(&self, error: &ChatError) {
        self.line(&format!(
            "\n{} {}",
            "✗".with(Color::Red),
            format!("Error: {error}").red()
        ));
    }
}

fn format_record(record: &ConversationRecord) -> String {
    format!(
        "{}  {}  ({})",
        record.id.clone().dark_grey(),
        record.title,
        record.model
    )
}

fn prompt_for(session: &ChatSession) -> String {
    let search = if session.search_mode() { " 🔍" } else { "" };
    format!(
        "{}{}{}{} ",
        session.provider().as_str().with(Color::Blue),
        search,
        ">".with(Color::Green),
        style::ResetColor
    )
}

/// Reads one line without blocking the runtime
async fn read_line(
    editor: &Arc<Mutex<Editor<(), DefaultHistory>>>,
    prompt: String,
) -> rustyline::Result<String> {
    let editor = editor.clone();
    tokio::task::spawn_blocking(move || -> rustyline::Result<String> {
        let mut editor = editor
            .lock()
            .map_err(|_| ReadlineError::Io(io::Error::other("line editor lock poisoned")))?;
        let line = editor.readline(&prompt)?;
        let _ = editor.add_history_entry(line.as_str());
        Ok(line)
    })
    .await
    .map_err(|err| ReadlineError::Io(io::Error::other(err)))?
}

/// Sends `prompt` with Ctrl-C wired to cancellation
pub async fn send_with_interrupt(
    session: &mut ChatSession,
    prompt: &str,
    observer: &TerminalObserver,
) -> SendOutcome {
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let outcome = session.send(prompt, observer, cancel).await;
    interrupt.abort();
    outcome
}

pub async fn run(mut session: ChatSession) -> Result<()> {
    let config = Config::builder()
        .edit_mode(rustyline::EditMode::Emacs)
        .build();
    let editor = Arc::new(Mutex::new(Editor::with_config(config)?));
    let observer = TerminalObserver::new();

    observer.line(&format!(
        "Modelo: {}. Escribe /help para ver los comandos.\n",
        session.provider().display_name().bold()
    ));

    loop {
        let line = match read_line(&editor, prompt_for(&session)).await {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\nExiting...");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        match ReplInput::parse(&line) {
            ReplInput::Empty => {}
            ReplInput::Prompt(prompt) => {
                send_with_interrupt(&mut session, &prompt, &observer).await;
            }
            ReplInput::NewConversation => {
                session.new_conversation();
                observer.line("Nueva conversación.");
            }
            ReplInput::ToggleSearch => {
                if session.toggle_search() {
                    observer.line("Búsqueda web activada para el próximo mensaje.");
                } else {
                    observer.line("Búsqueda web desactivada.");
                }
            }
            ReplInput::Model(None) => {
                for id in ProviderId::all() {
                    let marker = if id == session.provider() { "*" } else { " " };
                    observer.line(&format!("{marker} {:<11} {}", id.as_str(), id.display_name()));
                }
            }
            ReplInput::Model(Some(name)) => match name.parse::<ProviderId>() {
                Ok(id) => {
                    session.set_provider(id);
                    observer.line(&format!("Modelo: {}", id.display_name()));
                }
                Err(err) => observer.line(&err.to_string()),
            },
            ReplInput::History => {
                let records = session.conversations().list()?;
                if records.is_empty() {
                    observer.line("No hay conversaciones guardadas.");
                }
                for record in &records {
                    observer.line(&format_record(record));
                }
            }
            ReplInput::Load(id) => {
                if session.load_conversation(&id)? {
                    for turn in session.history() {
                        let speaker = match turn.role {
                            MessageRole::User => "tú".green(),
                            MessageRole::Assistant => "ia".blue(),
                        };
                        observer.line(&format!("{speaker}: {}\n", turn.content));
                    }
                } else {
                    observer.line(&format!("No existe la conversación '{id}'."));
                }
            }
            ReplInput::Help => observer.line(HELP),
            ReplInput::Quit => break,
            ReplInput::Unknown(input) => {
                observer.line(&format!("Comando desconocido: {input}. Prueba /help."))
            }
        }
    }

    Ok(())
}
