use anyhow::{Context, Result};
use llm::ConversationTurn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Key under which the conversation list is stored
pub const HISTORY_KEY: &str = "chat_history";
/// Upper bound on stored conversations, oldest are dropped first
pub const MAX_CONVERSATIONS: usize = 50;
const TITLE_CHARS: usize = 40;

/// Durable key-value store, one JSON document per key
#[derive(Debug, Clone)]
pub struct FileStore {
    root_dir: PathBuf,
}

impl FileStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Store under the platform data directory
    pub fn default_location() -> Result<Self> {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
            .join("search-chat");
        info!("Storing data in: {}", data_dir.display());
        Ok(Self::new(data_dir))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root_dir.join(format!("{key}.json"))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        debug!("Loading '{}' from {}", key, path.display());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.root_dir)?;
        let path = self.path_for(key);
        debug!("Saving '{}' to {}", key, path.display());
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// A saved conversation as listed in the history view
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConversationRecord {
    pub id: String,
    pub title: String,
    pub history: Vec<ConversationTurn>,
    /// Identifier of the model the conversation was held with
    pub model: String,
}

/// Most-recent-first list of conversations on top of a [`FileStore`]
#[derive(Debug, Clone)]
pub struct ConversationStore {
    store: FileStore,
}

impl ConversationStore {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<ConversationRecord>> {
        Ok(self.store.get(HISTORY_KEY)?.unwrap_or_default())
    }

    pub fn find(&self, id: &str) -> Result<Option<ConversationRecord>> {
        Ok(self.list()?.into_iter().find(|record| record.id == id))
    }

    /// Saves `history` under `id`, replacing an existing record in place or
    /// inserting a new one at the front. Conversations with fewer than two
    /// turns are skipped; returns whether anything was written.
    pub fn save(&self, id: &str, history: &[ConversationTurn], model: &str) -> Result<bool> {
        if id.is_empty() || history.len() < 2 {
            return Ok(false);
        }

        let record = ConversationRecord {
            id: id.to_string(),
            title: conversation_title(history),
            history: history.to_vec(),
            model: model.to_string(),
        };

        let mut records = self.list()?;
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => records.insert(0, record),
        }
        records.truncate(MAX_CONVERSATIONS);

        self.store.set(HISTORY_KEY, &records)?;
        Ok(true)
    }
}

/// First characters of the opening turn, always followed by an ellipsis
pub fn conversation_title(history: &[ConversationTurn]) -> String {
    let first = history
        .first()
        .map(|turn| turn.content.chars().take(TITLE_CHARS).collect::<String>())
        .unwrap_or_default();
    format!("{first}...")
}

/// Millisecond timestamp, unique enough for a single user
pub fn generate_conversation_id() -> String {
    chrono::Local::now().timestamp_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exchange(question: &str) -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::user(question),
            ConversationTurn::assistant("Ulán Bator"),
        ]
    }

    #[test]
    fn missing_key_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.get::<Vec<String>>("nothing").unwrap(), None);
    }

    #[test]
    fn values_survive_a_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        store.set("numbers", &vec![1, 2, 3]).unwrap();

        assert!(dir.path().join("nested").join("numbers.json").exists());
        assert_eq!(store.get::<Vec<i32>>("numbers").unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn short_conversations_are_not_saved() {
        let dir = TempDir::new().unwrap();
        let conversations = ConversationStore::new(FileStore::new(dir.path()));

        let saved = conversations
            .save("1", &[ConversationTurn::user("hola")], "gemini")
            .unwrap();

        assert!(!saved);
        assert!(conversations.list().unwrap().is_empty());
    }

    #[test]
    fn new_conversations_go_to_the_front() {
        let dir = TempDir::new().unwrap();
        let conversations = ConversationStore::new(FileStore::new(dir.path()));

        conversations.save("1", &exchange("first"), "gemini").unwrap();
        conversations.save("2", &exchange("second"), "openai").unwrap();

        let ids: Vec<_> = conversations
            .list()
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn saving_an_existing_id_replaces_it_in_place() {
        let dir = TempDir::new().unwrap();
        let conversations = ConversationStore::new(FileStore::new(dir.path()));

        conversations.save("1", &exchange("first"), "gemini").unwrap();
        conversations.save("2", &exchange("second"), "gemini").unwrap();

        let mut longer = exchange("first");
        longer.push(ConversationTurn::user("and then?"));
        longer.push(ConversationTurn::assistant("nothing"));
        conversations.save("1", &longer, "ollama").unwrap();

        let records = conversations.list().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "1");
        assert_eq!(records[1].history.len(), 4);
        assert_eq!(records[1].model, "ollama");
    }

    #[test]
    fn list_is_capped() {
        let dir = TempDir::new().unwrap();
        let conversations = ConversationStore::new(FileStore::new(dir.path()));

        for i in 0..(MAX_CONVERSATIONS + 5) {
            conversations
                .save(&i.to_string(), &exchange(&format!("question {i}")), "gemini")
                .unwrap();
        }

        let records = conversations.list().unwrap();
        assert_eq!(records.len(), MAX_CONVERSATIONS);
        assert_eq!(records[0].id, (MAX_CONVERSATIONS + 4).to_string());
        assert!(conversations.find("0").unwrap().is_none());
    }

    #[test]
    fn title_is_truncated_by_characters() {
        let history = exchange("¿Cuál es la capital de Mongolia y cuántos habitantes tiene?");
        let title = conversation_title(&history);
        assert_eq!(title, "¿Cuál es la capital de Mongolia y cuánto...");

        assert_eq!(conversation_title(&exchange("hola")), "hola...");
    }
}
