//! Terminal renderers for a dashboard view-model.
//!
//! Supports human-readable (with colors) and JSON formats.

use std::io::{self, Write};

use crate::dashboard::{LayerView, ViewModel};
use crate::style::{Layer, MarkerTier};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Tier colors, matching the map marker ladder
const RED: &str = "\x1b[91m";
const ORANGE: &str = "\x1b[38;5;208m";
const AMBER: &str = "\x1b[93m";
const GREEN: &str = "\x1b[92m";

/// Widest histogram bar in characters.
const MAX_BAR_WIDTH: usize = 40;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// Pretty-printed JSON view-model
    Json,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown format: {s} (expected: human, json)")),
        }
    }
}

/// Get the color code for a marker tier.
fn tier_color(tier: MarkerTier) -> &'static str {
    match tier {
        MarkerTier::Red => RED,
        MarkerTier::Orange => ORANGE,
        MarkerTier::Amber => AMBER,
        MarkerTier::Green => GREEN,
    }
}

fn layer_title(layer: Layer) -> &'static str {
    match layer {
        Layer::Current => "Recent Earthquakes (24h)",
        Layer::Historical => "Significant Earthquakes (30d)",
    }
}

/// Write the view-model in human-readable form.
///
/// `limit` caps the number of list rows per layer.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, view: &ViewModel, limit: usize) -> io::Result<()> {
    if let ViewModel::Error { message } = view {
        return writeln!(writer, "{RED}{BOLD}{message}{RESET}");
    }
    let Some(panels) = view.panels() else {
        return writeln!(writer, "{DIM}Loading…{RESET}");
    };

    writeln!(writer, "{BOLD}🌍 Global Earthquake Activity{RESET}")?;
    writeln!(
        writer,
        "  Total (24h): {BOLD}{}{RESET}   Average magnitude: {BOLD}{}{RESET}",
        panels.stats.count, panels.stats.average_display
    )?;
    writeln!(
        writer,
        "{DIM}  Magnitude filter: {:.1} – {:.1}{RESET}",
        panels.filter.min, panels.filter.max
    )?;
    if panels.malformed_records > 0 {
        writeln!(
            writer,
            "{DIM}  {} record(s) with missing magnitude, time or coordinates{RESET}",
            panels.malformed_records
        )?;
    }

    for layer in [&panels.current, &panels.historical] {
        writeln!(writer)?;
        write_layer(writer, layer, limit)?;
    }
    Ok(())
}

fn write_layer<W: Write>(writer: &mut W, layer: &LayerView, limit: usize) -> io::Result<()> {
    writeln!(
        writer,
        "{BOLD}{}{RESET} {DIM}({} shown){RESET}",
        layer_title(layer.layer),
        layer.list.len()
    )?;

    for item in layer.list.iter().take(limit) {
        let color = tier_color(item.tier);
        let marker = if item.selected { "▶" } else { " " };
        writeln!(
            writer,
            "{marker} {color}{BOLD}{:>5}{RESET} │ {DIM}{:>8}{RESET} │ {}",
            item.magnitude, item.time_ago, item.place
        )?;
    }
    if layer.list.len() > limit {
        writeln!(writer, "{DIM}  … {} more{RESET}", layer.list.len() - limit)?;
    }

    let tallest = layer.histogram.iter().map(|b| b.count).max().unwrap_or(0);
    for bar in &layer.histogram {
        let width = if tallest == 0 {
            0
        } else {
            (bar.count * MAX_BAR_WIDTH).div_ceil(tallest)
        };
        writeln!(
            writer,
            "  {:>6} {} {}",
            bar.label,
            "█".repeat(width),
            bar.count
        )?;
    }
    Ok(())
}

/// Write the view-model as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, view: &ViewModel) -> io::Result<()> {
    let json = serde_json::to_string_pretty(view)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write the view-model in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_view<W: Write>(
    writer: &mut W,
    view: &ViewModel,
    format: Format,
    limit: usize,
) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, view, limit),
        Format::Json => write_json(writer, view),
    }
}
