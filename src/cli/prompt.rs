//! Interactive selection prompt
//!
//! Shows a work's files grouped by folder and asks which of them to
//! download.

use crate::cli::console::ConsoleInput;
use crate::error::{DownloaderError, Result};
use crate::manifest::{FileKind, FileTask};
use crate::selection::{display_order, map_displayed_indices, parse_index_list, SelectionMode};

/// Grouped listing; files are numbered in displayed order
pub fn render_listing(work_id: &str, tasks: &[FileTask], satisfied: &[bool]) -> Vec<String> {
    let mut lines = vec![
        "Available files (checked against local files):".to_string(),
        format!("A. RJ{}", work_id),
    ];

    let mut current_group: Option<&str> = None;
    let mut group_index = 0usize;
    for (number, &position) in display_order(tasks).iter().enumerate() {
        let task = &tasks[position];
        if current_group != Some(task.group_path.as_str()) {
            current_group = Some(task.group_path.as_str());
            if !task.group_path.is_empty() {
                let letter = (b'a' + (group_index % 26) as u8) as char;
                lines.push(format!("   {}. {}", letter, task.group_path));
                group_index += 1;
            }
        }

        let indent = if task.group_path.is_empty() { "   " } else { "      " };
        let state = if satisfied.get(position).copied().unwrap_or(false) {
            "Downloaded"
        } else {
            "Not downloaded"
        };
        lines.push(format!(
            "{}{}. {} ({}, {}, {})",
            indent,
            number + 1,
            task.display_name,
            task.kind,
            task.size_label(),
            state
        ));
    }
    lines
}

/// Chosen files and their known total size
pub fn render_selected(selected: &[FileTask]) -> Vec<String> {
    let total: u64 = selected.iter().filter_map(|t| t.expected_size).sum();
    let mut lines = vec![format!(
        "Selected {} files to download (Total: {:.2} MB):",
        selected.len(),
        total as f64 / 1024.0 / 1024.0
    )];
    lines.extend(
        selected
            .iter()
            .map(|t| format!("- {} ({}, {})", t.display_name, t.kind, t.size_label())),
    );
    lines
}

/// Selection menu; default types appear in config order
pub fn render_options(defaults: &[FileKind]) -> Vec<String> {
    let default_names: Vec<_> = defaults.iter().map(FileKind::as_str).collect();
    vec![
        "Options:".to_string(),
        "1. Download all remaining/incomplete files".to_string(),
        format!("2. Download default file types from config ({})", default_names.join(", ")),
        "3. Select by file type (audio, image, text)".to_string(),
        "4. Select specific files by index".to_string(),
        "5. Download only high-quality audio (FLAC/WAV/MP3)".to_string(),
    ]
}

fn closed() -> DownloaderError {
    DownloaderError::selection_error("Console input closed before a selection was made")
}

/// Ask for a selection mode, re-prompting on invalid input.
///
/// Returns `None` when the input ends before a choice is entered. Input
/// ending part way through a follow-up question is an error.
pub async fn prompt_selection(
    input: &mut ConsoleInput,
    tasks: &[FileTask],
    defaults: &[FileKind],
    quiet: bool,
) -> Result<Option<SelectionMode>> {
    let say = |line: &str| {
        if !quiet {
            println!("{}", line);
        }
    };

    say("");
    for line in render_options(defaults) {
        say(&line);
    }

    let choice = loop {
        say("Enter your choice (1-5):");
        let Some(line) = input.next_line().await else {
            return Ok(None);
        };
        match line.trim() {
            choice @ ("1" | "2" | "3" | "4" | "5") => break choice.to_string(),
            _ => say("Invalid choice. Please enter 1, 2, 3, 4, or 5."),
        }
    };

    let mode = match choice.as_str() {
        "1" => SelectionMode::All,
        "2" => SelectionMode::ByDefaultTypes(defaults.iter().copied().collect()),
        "3" => loop {
            say("Enter file type (audio, image, text):");
            let line = input.next_line().await.ok_or_else(closed)?;
            match line.parse::<FileKind>() {
                Ok(kind) if kind.is_downloadable() => break SelectionMode::ByKind(kind),
                _ => say("Invalid file type. Please enter audio, image, or text."),
            }
        },
        "4" => loop {
            say("Enter file indices (e.g., 1,3,5 or 1-3):");
            let line = input.next_line().await.ok_or_else(closed)?;
            match parse_index_list(&line, tasks.len()).and_then(|displayed| map_displayed_indices(&displayed, tasks)) {
                Ok(indices) => break SelectionMode::ExplicitIndices(indices),
                Err(e) => say(&format!("Invalid input: {}. Please try again.", e)),
            }
        },
        _ => SelectionMode::HighQualityAudioOnly,
    };
    Ok(Some(mode))
}
