//! HTML rendering for the revision history overlay.
//!
//! Commits are grouped by their (display timezone) calendar day, in the order
//! the server sent them.  Everything user supplied goes through `html_escape`;
//! the only markup we emit is our own.

use std::fmt::Display;

use chrono::TimeZone;

use crate::file_format::vcs_history::{CommitEntry, HistoryResponse};

pub const TIMELINE_CLASS: &str = "tmvcstimeline";
pub const HIGHLIGHT_CLASS: &str = "tmvcstimeline-highlight";
pub const ERROR_CLASS: &str = "tmvcstimeline-error";

/// Minimal HTML escaping for untrusted text, also safe for attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// The element id given to a revision's entry; the overlay scrolls this into
/// view.
pub fn entry_anchor(revision: u64) -> String {
    format!("r{}", revision)
}

/// Split an entry's timestamp into (day heading, time of day) in `tz`.
/// Unparseable timestamps are shown verbatim under an "unknown date" heading.
fn day_and_time<Tz>(entry: &CommitEntry, tz: &Tz) -> (String, String)
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match entry.created_at() {
        Ok(ts) => {
            let local = ts.with_timezone(tz);
            (
                local.format("%Y-%m-%d").to_string(),
                local.format("%H:%M").to_string(),
            )
        }
        Err(e) => {
            tracing::debug!("r{}: {}", entry.revision, e);
            ("unknown date".to_string(), entry.created.clone())
        }
    }
}

/// Render the commits of `response` as day grouped definition lists, marking
/// the `highlight` revision.
pub fn render_history<Tz>(response: &HistoryResponse, highlight: Option<u64>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut lines = vec![format!("<div class=\"{}\">", TIMELINE_CLASS)];

    if response.commits.is_empty() {
        lines.push("<p>No commits in this range.</p>".to_string());
    }

    let mut current_day: Option<String> = None;
    for entry in &response.commits {
        let (day, time) = day_and_time(entry, tz);
        if current_day.as_ref() != Some(&day) {
            if current_day.is_some() {
                lines.push("</dl>".to_string());
            }
            lines.push(format!("<h3>{}</h3>", html_escape(&day)));
            lines.push("<dl>".to_string());
            current_day = Some(day);
        }

        let class = if highlight == Some(entry.revision) {
            format!(" class=\"{}\"", HIGHLIGHT_CLASS)
        } else {
            String::new()
        };
        lines.push(format!(
            "<dt id=\"{}\"{}>{} <a href=\"{}\">r{}</a> <span class=\"tmvcsauthor\">{}</span></dt>",
            entry_anchor(entry.revision),
            class,
            html_escape(&time),
            html_escape(&response.changeset_url(entry)),
            entry.revision,
            html_escape(&entry.author),
        ));
        lines.push(format!("<dd>{}</dd>", html_escape(entry.message.trim_end())));
    }
    if current_day.is_some() {
        lines.push("</dl>".to_string());
    }

    lines.push("</div>".to_string());
    lines.join("\n")
}

/// Render the block shown in place of the history when loading failed.
pub fn render_error(message: &str) -> String {
    format!(
        "<div class=\"{} {}\">\n<p>Failed to load revision history: {}</p>\n</div>",
        TIMELINE_CLASS,
        ERROR_CLASS,
        html_escape(message)
    )
}
