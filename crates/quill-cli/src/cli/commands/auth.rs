//! Session command handlers: login, register, logout, whoami.

use std::io::Write;

use anyhow::{Context, Result};
use quill_core::auth::session::Session;
use quill_core::auth::tokens::TokenStore;

pub async fn login(
    session: &mut Session,
    email: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let email = resolve_or_prompt(email, "Email: ")?;
    let password = resolve_or_prompt(password, "Password: ")?;

    if let Err(err) = session.login(&email, &password).await {
        anyhow::bail!("Login failed: {err}");
    }

    print_signed_in(session);
    Ok(())
}

pub async fn register(
    session: &mut Session,
    email: Option<String>,
    password: Option<String>,
    full_name: Option<String>,
) -> Result<()> {
    let email = resolve_or_prompt(email, "Email: ")?;
    let password = resolve_or_prompt(password, "Password: ")?;

    if let Err(err) = session
        .register(&email, &password, full_name.as_deref())
        .await
    {
        anyhow::bail!("Registration failed: {err}");
    }

    print_signed_in(session);
    Ok(())
}

pub fn logout(session: &mut Session, tokens: &TokenStore) -> Result<()> {
    let had_session = !tokens.get().is_empty();
    session.logout();

    if had_session {
        println!("Signed out");
    } else {
        println!("No active session");
    }
    Ok(())
}

pub async fn whoami(session: &mut Session) -> Result<()> {
    session.initialize().await;

    match session.user() {
        Some(user) => {
            println!("Signed in as {}", user.display_name());
            println!("Email: {}", user.email);
            println!("Member since: {}", user.created_at.format("%Y-%m-%d"));
        }
        None => println!("Not logged in"),
    }
    Ok(())
}

fn print_signed_in(session: &Session) {
    match session.user() {
        Some(user) => println!("Signed in as {}", user.display_name()),
        // Tokens were stored but the profile fetch was rejected.
        None => println!("Signed in, but the profile could not be loaded"),
    }
}

/// Uses the flag value when given, otherwise prompts on stdin.
fn resolve_or_prompt(value: Option<String>, prompt: &str) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }

    print!("{prompt}");
    std::io::stdout().flush().context("flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("read input")?;

    let value = line.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("Input cannot be empty");
    }
    Ok(value)
}
