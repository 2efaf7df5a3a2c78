//! Display utilities for the CLI

use colored::*;
use parley_types::{AgentAnalysis, Evaluation, Message, SessionResult};

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

/// Print a success message
pub fn success(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("  {} {}", "⚠".yellow(), message.yellow());
}

/// Print a labeled value
pub fn labeled(label: &str, value: &str) {
    println!("  {}: {}", label.bright_white(), value.bright_cyan());
}

pub fn result(result: SessionResult) -> ColoredString {
    let label = result.to_string();
    match result {
        SessionResult::Deal => label.bright_green(),
        SessionResult::Refusal => label.yellow(),
        SessionResult::Error => label.bright_red(),
    }
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v))
}

/// Print one transcript entry with its protocol counters
pub fn message(message: &Message) {
    let mut flags = Vec::new();
    if message.retry_count > 0 {
        flags.push("retried".yellow().to_string());
    }
    if message.format_error > 0 {
        flags.push("format error".bright_red().to_string());
    }
    if let Some(score) = message.deception_score {
        flags.push(format!("deception {:.2}", score).bright_magenta().to_string());
    }

    println!("  {}", message.text);
    if !flags.is_empty() {
        println!("      {}", flags.join(" · ").bright_black());
    }
}

fn analysis(analysis: &AgentAnalysis) {
    println!(
        "  {:<8} utility {:>8}  offer {:>8}  avg len {:>7.2}  retries {:>2}  format errors {:>2}",
        analysis.role.bright_white(),
        number(analysis.utility),
        number(analysis.initial_offer),
        analysis.avg_msg_length,
        analysis.retries,
        analysis.format_errors,
    );
    if analysis.max_deception.is_some() {
        println!(
            "           deception max {}  avg {}",
            number(analysis.max_deception),
            number(analysis.avg_deception)
        );
    }
    if analysis.hallucination_index.is_some() {
        println!("           hallucination index {}", number(analysis.hallucination_index));
    }
}

/// Print a session evaluation
pub fn evaluation(evaluation: &Evaluation) {
    println!("  {}: {}", "Result".bright_white(), result(evaluation.result));
    labeled("Rounds", &evaluation.rounds.to_string());
    labeled("Final price", &number(evaluation.final_price));
    println!();
    for agent in &evaluation.analysis {
        analysis(agent);
    }
}
