pub mod commands;
pub mod terminal;

use crate::persistence::{ConversationStore, FileStore};
use crate::session::ChatSession;
use crate::settings::Settings;
use llm::ProviderId;

/// Everything a mode needs, resolved from the command line
#[derive(Debug, Clone)]
pub struct AppContext {
    pub store: FileStore,
    pub settings: Settings,
    pub provider: ProviderId,
}

impl AppContext {
    pub fn new(store: FileStore, provider: ProviderId) -> Self {
        let settings = Settings::load(&store);
        Self {
            store,
            settings,
            provider,
        }
    }

    pub fn session(&self) -> ChatSession {
        ChatSession::from_settings(
            &self.settings,
            ConversationStore::new(self.store.clone()),
            self.provider,
        )
    }
}
