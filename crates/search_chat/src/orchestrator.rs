use crate::error::ChatError;
use futures::{Stream, StreamExt};
use llm::factory::{create_provider, ProviderConfig};
use llm::{ApiError, ChatProvider, ConversationTurn, ProviderId, StreamingCallback, StreamingChunk};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One step of a generation, in delivery order
#[derive(Debug)]
pub enum GenerationEvent {
    Delta(String),
    /// Sent once, after the last delta
    Complete,
    /// Terminal failure; nothing follows it
    Failed(ChatError),
}

impl GenerationEvent {
    fn is_terminal(&self) -> bool {
        !matches!(self, GenerationEvent::Delta(_))
    }
}

/// Routes generation requests to the provider selected by identifier
pub struct GenerationOrchestrator {
    providers: HashMap<ProviderId, Arc<dyn ChatProvider>>,
}

impl GenerationOrchestrator {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// One client per known provider, built from `config`
    pub fn from_config(config: &ProviderConfig) -> Self {
        let providers = ProviderId::all()
            .into_iter()
            .map(|id| (id, create_provider(id, config)))
            .collect();
        Self { providers }
    }

    pub fn with_provider(mut self, id: ProviderId, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.insert(id, provider);
        self
    }

    /// Starts a generation and returns its event stream.
    ///
    /// Never fails directly: an unknown `provider_id` or any adapter error
    /// arrives as a single [`GenerationEvent::Failed`]. The caller must hold
    /// the busy flag; requests are not queued here.
    ///
    /// Dropping the returned stream abandons the request without stopping
    /// it. Cancelling `cancel` stops it at the next suspension point.
    pub fn dispatch(
        &self,
        provider_id: &str,
        prompt: String,
        history: Vec<ConversationTurn>,
        cancel: CancellationToken,
    ) -> GenerationStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = GenerationStream {
            events: rx,
            cancel: cancel.clone(),
            finished: false,
        };

        let provider = provider_id
            .parse::<ProviderId>()
            .ok()
            .and_then(|id| self.providers.get(&id).cloned());

        let Some(provider) = provider else {
            warn!("No provider registered for model '{provider_id}'");
            let _ = tx.send(GenerationEvent::Failed(ChatError::Config(format!(
                "model '{provider_id}' not recognized"
            ))));
            return stream;
        };

        debug!(
            "Dispatching generation to {} with {} history turns",
            provider.name(),
            history.len()
        );

        let task = tokio::spawn(run_generation(
            provider,
            prompt,
            history,
            tx.clone(),
            cancel,
        ));

        // A panicking adapter still ends the stream with a terminal event
        tokio::spawn(async move {
            if let Err(join_error) = task.await {
                let _ = tx.send(GenerationEvent::Failed(ChatError::Task(
                    join_error.to_string(),
                )));
            }
        });

        stream
    }
}

impl Default for GenerationOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_generation(
    provider: Arc<dyn ChatProvider>,
    prompt: String,
    history: Vec<ConversationTurn>,
    events: mpsc::UnboundedSender<GenerationEvent>,
    cancel: CancellationToken,
) {
    let callback_events = events.clone();
    let callback_cancel = cancel.clone();
    let callback: StreamingCallback = Box::new(move |chunk: &StreamingChunk| {
        if callback_cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let event = match chunk {
            StreamingChunk::Text(text) => GenerationEvent::Delta(text.clone()),
            StreamingChunk::StreamingComplete => GenerationEvent::Complete,
        };
        // The receiver may be gone when the caller abandoned the stream
        let _ = callback_events.send(event);
        Ok(())
    });

    let result = tokio::select! {
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = provider.generate(&prompt, &history, &callback) => result,
    };

    if let Err(err) = result {
        debug!("Generation with {} ended with error: {err}", provider.name());
        let _ = events.send(GenerationEvent::Failed(err.into()));
    }
}

/// Events of one generation, ending after the first terminal event
pub struct GenerationStream {
    events: mpsc::UnboundedReceiver<GenerationEvent>,
    cancel: CancellationToken,
    finished: bool,
}

impl GenerationStream {
    /// Stops the underlying request
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Feeds the events into callbacks and returns the full response text.
    ///
    /// Exactly one of `on_complete` and `on_error` is called.
    pub async fn drive<C, D, E>(
        mut self,
        mut on_chunk: C,
        on_complete: D,
        on_error: E,
    ) -> Result<String, ChatError>
    where
        C: FnMut(&str),
        D: FnOnce(&str),
        E: FnOnce(&ChatError),
    {
        let mut response = String::new();
        while let Some(event) = self.next().await {
            match event {
                GenerationEvent::Delta(text) => {
                    on_chunk(&text);
                    response.push_str(&text);
                }
                GenerationEvent::Complete => {
                    on_complete(&response);
                    return Ok(response);
                }
                GenerationEvent::Failed(err) => {
                    on_error(&err);
                    return Err(err);
                }
            }
        }

        let err = ChatError::Protocol("generation ended without completing".to_string());
        on_error(&err);
        Err(err)
    }
}

impl Stream for GenerationStream {
    type Item = GenerationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.events.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
