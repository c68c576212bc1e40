//! Append-only markdown log of prompts and change notes.
//!
//! Entries are grouped under a `### YYYY-MM-DD` heading per day and
//! optionally under a `#### Section` subheading. Headings are only added when
//! the file does not already contain them.

use std::path::Path;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::PromptLogError;

pub const FILE_HEADER: &str = "## Project Prompts Log\n\n";

pub fn date_heading(date: NaiveDate) -> String {
    date.format("### %Y-%m-%d").to_string()
}

/// Create the log with its header if it does not exist yet.
pub fn ensure_file(path: &Path) -> Result<(), PromptLogError> {
    if !path.exists() {
        std::fs::write(path, FILE_HEADER)?;
    }
    Ok(())
}

/// Append `note` (and `link`) under `date`'s heading and the optional section.
pub fn append_prompt(
    path: &Path,
    date: NaiveDate,
    note: &str,
    link: Option<&str>,
    section: Option<&str>,
) -> Result<(), PromptLogError> {
    if note.trim().is_empty() {
        return Err(PromptLogError::EmptyNote);
    }

    ensure_file(path)?;
    let content = std::fs::read_to_string(path)?;
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let heading = date_heading(date);
    if !content.contains(&heading) {
        lines.push(heading);
    }

    if let Some(section) = section.filter(|s| !s.is_empty()) {
        let header = format!("#### {section}");
        if !content.contains(&header) {
            lines.push(header);
        }
    }

    let mut entry = format!("- {note}");
    if let Some(link) = link.filter(|l| !l.is_empty()) {
        entry.push_str(&format!(" ({link})"));
    }
    lines.push(entry);

    std::fs::write(path, lines.join("\n") + "\n")?;
    debug!(path = %path.display(), "Prompt appended");
    Ok(())
}
