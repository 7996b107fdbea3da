//! `stepwise session` — inspect, search and clear session logs.

use stepwise_core::session::{SessionEntry, SessionStore, validate_session_id};

use super::{CliResult, load_config, retriever, session_store};

pub async fn show(id: &str) -> CliResult {
    validate_session_id(id)?;
    let config = load_config()?;
    let entries = session_store(&config).read_entries(id).await?;

    if entries.is_empty() {
        println!("Session '{id}' is empty.");
        return Ok(());
    }
    for entry in entries {
        match entry {
            SessionEntry::Event(value) => println!("{value}"),
            SessionEntry::Raw { raw } => println!("{raw}"),
        }
    }
    Ok(())
}

pub async fn clear(id: &str) -> CliResult {
    validate_session_id(id)?;
    let config = load_config()?;
    session_store(&config).clear(id).await?;
    println!("🧹 Cleared session '{id}'");
    Ok(())
}

pub async fn search(id: &str, query: &str, top_k: Option<usize>) -> CliResult {
    validate_session_id(id)?;
    let config = load_config()?;
    let retriever = retriever(&config, session_store(&config));
    let k = top_k.unwrap_or_else(|| retriever.top_k());

    println!("🔍 Searching session '{id}' for: \"{query}\"");
    println!();

    let snippets = retriever.retrieve_top(id, query, k).await;
    if snippets.is_empty() {
        println!("   No matching entries.");
    }
    for snippet in snippets {
        let text: String = snippet.text.chars().take(120).collect();
        println!("  #{:<4} [score: {:.2}] {text}", snippet.index, snippet.score);
    }
    Ok(())
}

pub async fn list() -> CliResult {
    let config = load_config()?;
    let store = session_store(&config);
    let sessions = store.sessions().await?;

    if sessions.is_empty() {
        println!("No sessions recorded ({} store).", store.name());
        return Ok(());
    }
    for id in sessions {
        println!("  {id}");
    }
    Ok(())
}
