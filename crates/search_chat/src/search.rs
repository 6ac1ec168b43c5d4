//! Search augmentation: rewrite the request into a query, fetch results
//! through the relay and fold them into a grounded prompt.

use crate::error::ChatError;
use crate::prompts;
use crate::session::ChatObserver;
use chrono::{DateTime, Local};
use llm::GeminiClient;
use tracing::{debug, warn};
use web::{RelayClient, WebSearchResult};

/// Number of results requested from the relay
pub const MAX_SEARCH_RESULTS: u32 = 5;

pub const REWRITE_STATUS: &str = "Optimizando tu consulta para la búsqueda...";

pub struct SearchPipeline {
    relay: RelayClient,
    rewriter: GeminiClient,
}

impl SearchPipeline {
    /// `rewriter` is always Gemini, independent of the active model
    pub fn new(relay: RelayClient, rewriter: GeminiClient) -> Self {
        Self { relay, rewriter }
    }

    pub fn relay(&self) -> &RelayClient {
        &self.relay
    }

    /// Runs both stages and returns the prompt to send to the model.
    ///
    /// A failed rewrite falls back to the original prompt; a failed search
    /// aborts with [`ChatError::Search`].
    pub async fn augment(
        &self,
        user_prompt: &str,
        now: DateTime<Local>,
        observer: &dyn ChatObserver,
    ) -> Result<String, ChatError> {
        observer.status(REWRITE_STATUS);
        let query = self.rewrite_query(user_prompt).await;
        observer.clear_status();

        observer.status(&format!("Buscando en Internet: \"{query}\"..."));
        let results = self.search(&query).await;
        observer.clear_status();

        Ok(prompts::grounded_prompt(user_prompt, &results?, &now))
    }

    /// Never fails; any problem yields `user_prompt` unchanged.
    pub async fn rewrite_query(&self, user_prompt: &str) -> String {
        let rewrite = self
            .rewriter
            .generate_once(&prompts::query_rewrite_prompt(user_prompt))
            .await;

        match rewrite {
            Ok(text) if !text.trim().is_empty() => {
                let query = text.trim().to_string();
                debug!("Rewrote search query to '{query}'");
                query
            }
            Ok(_) => {
                warn!("Query rewriting returned no text, searching for the original prompt");
                user_prompt.to_string()
            }
            Err(err) => {
                warn!("Query rewriting failed, searching for the original prompt: {err}");
                user_prompt.to_string()
            }
        }
    }

    /// Results text for `query`, or the no-results sentence
    pub async fn search(&self, query: &str) -> Result<String, ChatError> {
        let results = self
            .relay
            .web_search(query, MAX_SEARCH_RESULTS)
            .await
            .map_err(ChatError::Search)?;

        debug!("Relay returned {} search results", results.results.len());
        Ok(format_search_results(query, &results.results))
    }
}

/// Numbered `[i] title: link` entries with their snippet, separated by blank
/// lines.
pub fn format_search_results(query: &str, results: &[WebSearchResult]) -> String {
    if results.is_empty() {
        return format!("No se encontraron resultados para \"{query}\".");
    }

    results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            format!(
                "[{}] {}: {}\n{}",
                index + 1,
                result.titulo,
                result.enlace,
                result.descripcion
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(titulo: &str, enlace: &str, descripcion: &str) -> WebSearchResult {
        WebSearchResult {
            titulo: titulo.to_string(),
            enlace: enlace.to_string(),
            descripcion: descripcion.to_string(),
        }
    }

    #[test]
    fn no_results_produce_the_fixed_sentence() {
        assert_eq!(
            format_search_results("xyzzy123", &[]),
            "No se encontraron resultados para \"xyzzy123\"."
        );
    }

    #[test]
    fn results_are_numbered_in_rank_order() {
        let text = format_search_results(
            "capital de Mongolia",
            &[
                result("Mongolia", "https://es.wikipedia.org/wiki/Mongolia", "País de Asia."),
                result("Ulán Bator", "https://es.wikipedia.org/wiki/Ulan_Bator", ""),
            ],
        );

        assert_eq!(
            text,
            "[1] Mongolia: https://es.wikipedia.org/wiki/Mongolia\nPaís de Asia.\n\n\
             [2] Ulán Bator: https://es.wikipedia.org/wiki/Ulan_Bator\n"
        );
    }
}
