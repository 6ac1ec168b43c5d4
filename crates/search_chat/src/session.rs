use crate::error::ChatError;
use crate::orchestrator::GenerationOrchestrator;
use crate::persistence::{generate_conversation_id, ConversationRecord, ConversationStore};
use crate::prompts;
use crate::search::SearchPipeline;
use crate::settings::Settings;
use anyhow::Result;
use chrono::{DateTime, Local};
use llm::{ConversationTurn, ProviderId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives progress of a send as it happens
pub trait ChatObserver: Send + Sync {
    /// Interim notice shown while a search stage runs
    fn status(&self, message: &str);
    fn clear_status(&self);
    fn on_chunk(&self, delta: &str);
    fn on_complete(&self, response: &str);
    fn on_error(&self, error: &ChatError);
}

/// Result of [`ChatSession::send`]
#[derive(Debug)]
pub enum SendOutcome {
    /// Empty prompt, or a generation was already in flight
    Ignored,
    Completed(String),
    Failed(ChatError),
}

pub type Clock = Box<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Clears the busy flag when the send ends, however it ends
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag.clone()))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State of the conversation shown to the user
pub struct ChatSession {
    orchestrator: GenerationOrchestrator,
    search: SearchPipeline,
    conversations: ConversationStore,
    conversation_id: String,
    history: Vec<ConversationTurn>,
    provider: ProviderId,
    search_mode: bool,
    busy: Arc<AtomicBool>,
    clock: Clock,
}

impl ChatSession {
    pub fn new(
        orchestrator: GenerationOrchestrator,
        search: SearchPipeline,
        conversations: ConversationStore,
        provider: ProviderId,
    ) -> Self {
        Self {
            orchestrator,
            search,
            conversations,
            conversation_id: generate_conversation_id(),
            history: Vec::new(),
            provider,
            search_mode: false,
            busy: Arc::new(AtomicBool::new(false)),
            clock: Box::new(Local::now),
        }
    }

    /// Session wired to the real providers and relay described by `settings`
    pub fn from_settings(
        settings: &Settings,
        conversations: ConversationStore,
        provider: ProviderId,
    ) -> Self {
        let provider_config = settings.provider_config();
        Self::new(
            GenerationOrchestrator::from_config(&provider_config),
            SearchPipeline::new(settings.relay_client(), provider_config.gemini_client()),
            conversations,
            provider,
        )
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn search_mode(&self) -> bool {
        self.search_mode
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn set_provider(&mut self, provider: ProviderId) {
        if self.is_busy() {
            return;
        }
        debug!("Switching model to {provider}");
        self.provider = provider;
    }

    /// Flips search mode for the next send and returns the new state
    pub fn toggle_search(&mut self) -> bool {
        if !self.is_busy() {
            self.search_mode = !self.search_mode;
        }
        self.search_mode
    }

    /// Saves the current conversation and starts an empty one
    pub fn new_conversation(&mut self) {
        if self.is_busy() {
            return;
        }
        self.save_conversation();
        self.conversation_id = generate_conversation_id();
        self.history.clear();
        info!("Started conversation {}", self.conversation_id);
    }

    /// Replaces the current conversation with a stored one, including its
    /// model. Returns `false` if no conversation has that id.
    pub fn load_conversation(&mut self, id: &str) -> Result<bool> {
        if self.is_busy() {
            return Ok(false);
        }
        let Some(record) = self.conversations.find(id)? else {
            return Ok(false);
        };
        self.restore(record);
        Ok(true)
    }

    fn restore(&mut self, record: ConversationRecord) {
        match record.model.parse::<ProviderId>() {
            Ok(provider) => self.provider = provider,
            Err(err) => warn!("Keeping current model for conversation {}: {err}", record.id),
        }
        self.conversation_id = record.id;
        self.history = record.history;
    }

    fn save_conversation(&self) {
        if let Err(err) =
            self.conversations
                .save(&self.conversation_id, &self.history, self.provider.as_str())
        {
            warn!("Failed to save conversation {}: {err:#}", self.conversation_id);
        }
    }

    /// Sends one user prompt through the optional search stages and the
    /// active model.
    ///
    /// The user turn is appended before anything else and kept on failure;
    /// the assistant turn is appended only after the stream completed. Search
    /// mode is consumed by this call whatever the outcome.
    pub async fn send(
        &mut self,
        prompt: &str,
        observer: &dyn ChatObserver,
        cancel: CancellationToken,
    ) -> SendOutcome {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return SendOutcome::Ignored;
        }
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            return SendOutcome::Ignored;
        };

        self.history.push(ConversationTurn::user(prompt));
        let use_search = std::mem::take(&mut self.search_mode);
        let now = (self.clock)();

        let prompt_to_send = if use_search {
            tokio::select! {
                _ = cancel.cancelled() => Err(ChatError::Cancelled),
                result = self.search.augment(prompt, now, observer) => result,
            }
        } else {
            Ok(prompts::preamble_prompt(prompt, &now))
        };

        let prompt_to_send = match prompt_to_send {
            Ok(prompt_to_send) => prompt_to_send,
            Err(err) => {
                observer.on_error(&err);
                return SendOutcome::Failed(err);
            }
        };

        // The provider sees the history without the turn being answered
        let history = self.history[..self.history.len() - 1].to_vec();
        let stream =
            self.orchestrator
                .dispatch(self.provider.as_str(), prompt_to_send, history, cancel);

        let result = stream
            .drive(
                |delta| observer.on_chunk(delta),
                |response| observer.on_complete(response),
                |err| observer.on_error(err),
            )
            .await;

        match result {
            Ok(response) => {
                self.history.push(ConversationTurn::assistant(response.clone()));
                self.save_conversation();
                SendOutcome::Completed(response)
            }
            Err(err) => SendOutcome::Failed(err),
        }
    }
}
