use anyhow::{Context, bail};
use async_trait::async_trait;
use inquire::{InquireError, Text};
use netatmo_core::AuthCodeSource;
use std::io::{self, BufRead};
use tracing::{debug, warn};
use url::Url;

const CODE_PROMPT: &str = "Enter the authorization code from the redirect URL:";

/// Opens the authorize page and asks the operator to paste the code back.
#[derive(Debug, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl AuthCodeSource for TerminalPrompt {
    async fn authorization_code(&self, authorize_url: &Url) -> anyhow::Result<String> {
        println!("Opening browser for authorization. Please authorize the app and copy the authorization code.");
        println!("If the browser doesn't open, go to this URL: {authorize_url}");

        let url = authorize_url.to_string();
        match tokio::task::spawn_blocking(move || webbrowser::open(&url)).await {
            Ok(Ok(())) => debug!("Browser launched"),
            Ok(Err(err)) => warn!("Failed to open browser automatically: {err}. Open the URL above manually."),
            Err(err) => warn!(error = %err, "Browser launch task failed"),
        }

        // inquire reads the terminal synchronously
        tokio::task::spawn_blocking(|| match Text::new(CODE_PROMPT).prompt() {
            Ok(code) => Ok(code),
            Err(InquireError::NotTTY) => {
                println!("{CODE_PROMPT}");
                read_code(io::stdin().lock())
            }
            Err(err) => Err(err).context("Failed to read authorization code"),
        })
        .await
        .context("Authorization prompt task failed")?
    }
}

/// First line of `input`, for when stdin is piped instead of a terminal.
fn read_code(mut input: impl BufRead) -> anyhow::Result<String> {
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("Failed to read authorization code from stdin")?;
    if read == 0 {
        bail!("stdin closed before an authorization code was entered");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
