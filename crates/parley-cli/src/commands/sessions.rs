//! Sessions command - List what a session store holds

use std::path::Path;

use anyhow::bail;
use colored::*;

use parley_arena::SessionStore;
use parley_types::{stored_id, SessionRecord};

use crate::display;

/// List stored sessions
pub fn list_sessions(store: &Path) -> anyhow::Result<()> {
    if !store.exists() {
        bail!("session store {} does not exist", store.display());
    }
    let document = SessionStore::open(store)?.load()?;

    display::section("Stored Sessions");
    display::labeled("Scenario", &document.scenario);
    println!();

    if document.sessions.is_empty() {
        println!("  {}", "No sessions yet".yellow());
        return Ok(());
    }

    for stored in &document.sessions {
        let Some(session) = SessionRecord::from_stored(stored) else {
            let id = stored_id(stored).map_or_else(|| "?".to_string(), |id| id.to_string());
            println!(
                "  {} {:<20}  {}",
                "○".bright_black(),
                id.bright_yellow(),
                "unreadable record".bright_black(),
            );
            continue;
        };
        let names: Vec<&str> = session.agents.iter().map(|a| a.name.as_str()).collect();
        match &session.evaluation {
            Some(evaluation) => println!(
                "  {} {:<20}  {:<8}  rounds {:>2}  {}",
                "●".bright_cyan(),
                session.id.to_string().bright_yellow(),
                display::result(evaluation.result),
                evaluation.rounds,
                names.join(" vs ").bright_black(),
            ),
            None => println!(
                "  {} {:<20}  {:<8}  {}",
                "○".bright_black(),
                session.id.to_string().bright_yellow(),
                "-",
                names.join(" vs ").bright_black(),
            ),
        }
    }

    Ok(())
}
