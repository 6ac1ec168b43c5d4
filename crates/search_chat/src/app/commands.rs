use super::terminal::{send_with_interrupt, TerminalObserver};
use super::AppContext;
use crate::cli::{RelayAction, SettingsAction};
use crate::session::SendOutcome;
use crate::settings::Settings;
use anyhow::{bail, Context, Result};

/// One-shot send. Returns whether the answer completed.
pub async fn ask(context: &AppContext, prompt: &str, search: bool) -> Result<bool> {
    let mut session = context.session();
    if search {
        session.toggle_search();
    }

    let observer = TerminalObserver::new();
    match send_with_interrupt(&mut session, prompt, &observer).await {
        SendOutcome::Completed(_) => Ok(true),
        // Already reported by the observer
        SendOutcome::Failed(_) => Ok(false),
        SendOutcome::Ignored => bail!("Nothing to send: the prompt is empty"),
    }
}

pub fn settings(context: &AppContext, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            println!("# {}", context.store.root_dir().display());
            for key in Settings::KEYS {
                let value = context.settings.display_value(key).unwrap_or_default();
                println!("{key} = {value}");
            }
        }
        SettingsAction::Set { key, value } => {
            // Save the stored document, not the one with ${VAR} placeholders resolved
            let mut settings: Settings = context
                .store
                .get(crate::settings::SETTINGS_KEY)?
                .unwrap_or_default();
            settings.set(&key, &value)?;
            settings
                .save(&context.store)
                .context("Failed to save settings")?;
            println!("Configuración guardada.");
        }
    }
    Ok(())
}

pub async fn relay(context: &AppContext, action: RelayAction) -> Result<()> {
    let relay = context.settings.relay_client();
    match action {
        RelayAction::Test => {
            let message = relay.test_connection().await?;
            println!("{message}");
        }
        RelayAction::Scrape { url } => {
            let page = relay
                .scrape(&url)
                .await
                .with_context(|| format!("Failed to scrape {url}"))?;
            println!("{}", page.content);
        }
        RelayAction::Email { to, subject, body } => {
            let message = relay.send_email(&to, &subject, &body).await?;
            println!("{message}");
        }
    }
    Ok(())
}
