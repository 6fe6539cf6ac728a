//! Output formatting: message tables, JSON, and the live listen feed.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use pushover_core::Message;

use crate::cli::ColorMode;
use crate::error::CliError;

const BODY_WIDTH: usize = 60;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Message listing ──────────────────────────────────────────────────

#[derive(Tabled)]
struct MessageRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Sent")]
    sent: String,
    #[tabled(rename = "App")]
    app: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Message")]
    body: String,
}

impl From<&Message> for MessageRow {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id(),
            sent: m
                .sent_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            app: m.app().unwrap_or_default().to_owned(),
            title: m.title().unwrap_or_default().to_owned(),
            body: truncate(m.body(), BODY_WIDTH),
        }
    }
}

/// Render messages as a table, or as the raw JSON objects.
pub fn render_messages(messages: &[Message], json: bool) -> Result<String, CliError> {
    if json {
        let raw: Vec<_> = messages.iter().map(Message::raw).collect();
        return Ok(serde_json::to_string_pretty(&raw)?);
    }

    if messages.is_empty() {
        return Ok("No pending messages.".into());
    }

    let rows: Vec<MessageRow> = messages.iter().map(MessageRow::from).collect();
    Ok(Table::new(rows).with(Style::rounded()).to_string())
}

/// Print the rendered output to stdout.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Live feed ────────────────────────────────────────────────────────

/// One line per message for `listen`.
pub fn format_live(message: &Message, color: bool) -> String {
    let time = message
        .sent_at()
        .unwrap_or_else(|| message.received_at())
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S")
        .to_string();
    let title = message.title().or(message.app()).unwrap_or("Pushover");
    let body = message.body().replace('\n', " ");

    if color {
        format!("{} {} {}", time.dimmed(), title.bold().cyan(), body)
    } else {
        format!("{time} {title} {body}")
    }
}

fn truncate(text: &str, width: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= width {
        return flat;
    }
    let mut cut: String = flat.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::{Value, json};

    use super::*;

    fn message(value: Value) -> Message {
        let Value::Object(raw) = value else {
            unreachable!()
        };
        Message::from_raw(raw, Utc::now()).unwrap()
    }

    #[test]
    fn empty_listing_says_so() {
        assert_eq!(render_messages(&[], false).unwrap(), "No pending messages.");
        assert_eq!(render_messages(&[], true).unwrap(), "[]");
    }

    #[test]
    fn table_shows_title_and_body() {
        let m = message(json!({"id": 3, "title": "Backup", "message": "done", "date": 1_700_000_000}));
        let table = render_messages(&[m], false).unwrap();
        assert!(table.contains("Backup"));
        assert!(table.contains("done"));
        assert!(table.contains("2023-11-14"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let long = "x".repeat(100);
        let cut = truncate(&long, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("short\nline", 20), "short line");
    }

    #[test]
    fn live_line_without_color() {
        let m = message(json!({"id": 1, "app": "Backups", "message": "ok\nall good"}));
        let line = format_live(&m, false);
        assert!(line.ends_with("Backups ok all good"));
    }
}
