use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::error::ReadError;
use crate::models::{Dimension, Leaderboard, LeaderboardEntry};

pub const BAR_WIDTH: usize = 30;
pub const EMPTY_TITLE: &str = "No Data Yet";
pub const EMPTY_MESSAGE: &str = "Be the first to submit! Switch back to the form and send some love.";

/// Bar length proportional to the leader's count; any non-zero count gets at
/// least one cell.
pub fn bar_cells(count: u64, max: u64) -> usize {
    if count == 0 || max == 0 {
        return 0;
    }
    let cells = (count as f64 / max as f64 * BAR_WIDTH as f64).round() as usize;
    cells.clamp(1, BAR_WIDTH)
}

fn display_name(dimension: Dimension, entry: &LeaderboardEntry) -> String {
    match (dimension, &entry.short_label) {
        (Dimension::University, Some(short)) if short != &entry.label => {
            format!("{} ({short})", entry.label)
        }
        _ => entry.label.clone(),
    }
}

pub fn title(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Country => "Top Countries",
        Dimension::University => "Top Universities",
    }
}

/// Ranked text bar chart for one leaderboard.
pub fn render_leaderboard(dimension: Dimension, board: &Leaderboard) -> String {
    let mut output = String::new();

    let entries = match board {
        Leaderboard::Empty => {
            let _ = writeln!(output, "{EMPTY_TITLE}");
            let _ = writeln!(output, "{EMPTY_MESSAGE}");
            return output;
        }
        Leaderboard::Ranked(entries) => entries,
    };

    let max = entries.iter().map(|entry| entry.count).max().unwrap_or(0);
    let names: Vec<String> = entries
        .iter()
        .map(|entry| display_name(dimension, entry))
        .collect();
    let name_width = names.iter().map(|name| name.chars().count()).max().unwrap_or(0);

    for (rank, (entry, name)) in entries.iter().zip(names.iter()).enumerate() {
        let _ = writeln!(
            output,
            "{:>2}. {:<name_width$}  {:<bar_width$}  {}",
            rank + 1,
            name,
            "#".repeat(bar_cells(entry.count, max)),
            entry.count,
            bar_width = BAR_WIDTH,
        );
    }

    output
}

fn write_section(
    output: &mut String,
    dimension: Dimension,
    board: &Result<Leaderboard, ReadError>,
) {
    let _ = writeln!(output, "## {}", title(dimension));

    match board {
        Err(err) => {
            let _ = writeln!(output, "Leaderboard unavailable: {err}. Try again.");
        }
        Ok(Leaderboard::Empty) => {
            let _ = writeln!(output, "{EMPTY_MESSAGE}");
        }
        Ok(board @ Leaderboard::Ranked(entries)) => {
            let total: u64 = entries.iter().map(|entry| entry.count).sum();
            let _ = writeln!(
                output,
                "{} submissions across the top {}.",
                total,
                entries.len()
            );
            let _ = writeln!(output);
            let _ = writeln!(output, "```");
            let _ = write!(output, "{}", render_leaderboard(dimension, board));
            let _ = writeln!(output, "```");
        }
    }

    let _ = writeln!(output);
}

/// Markdown report covering both leaderboards. A failed read only blanks its
/// own section.
pub fn build_report(
    generated_at: DateTime<Utc>,
    countries: &Result<Leaderboard, ReadError>,
    universities: &Result<Leaderboard, ReadError>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Valentine Leaderboards");
    let _ = writeln!(
        output,
        "Generated {}",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);

    write_section(&mut output, Dimension::Country, countries);
    write_section(&mut output, Dimension::University, universities);

    output
}
