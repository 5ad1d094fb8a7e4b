//! Colored notes, plain tables and streamed reply output for the terminal.

use std::io::Write;
use std::sync::OnceLock;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const MAGENTA: &str = "\x1b[35m";

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

/// Color is off under `NO_COLOR` or a dumb terminal. Checked once per process.
fn color_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var_os("NO_COLOR").is_none()
            && (std::env::var_os("COLORTERM").is_some()
                || std::env::var("TERM").is_ok_and(|t| t != "dumb"))
    })
}

/// Wrap `s` in `style` when color is enabled.
pub fn styled(style: &str, s: &str) -> String {
    if color_enabled() {
        format!("{style}{s}{RESET}")
    } else {
        s.to_string()
    }
}

#[derive(Clone, Copy)]
enum Note {
    Info,
    Success,
    Warn,
    Error,
}

impl Note {
    fn marker(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Note::Info => (CYAN, "ℹ", "INFO:"),
            Note::Success => (GREEN, "✓", "OK:"),
            Note::Warn => (YELLOW, "⚠", "WARN:"),
            Note::Error => (RED, "✗", "ERROR:"),
        }
    }

    fn format(self, msg: &str, color: bool) -> String {
        let (style, glyph, label) = self.marker();
        if color {
            format!("{style}{BOLD}{glyph}{RESET} {msg}")
        } else {
            format!("{label} {msg}")
        }
    }
}

fn note(kind: Note, msg: &str) {
    let line = kind.format(msg, color_enabled());
    match kind {
        // Errors go to stderr so `send` output stays pipeable.
        Note::Error => eprintln!("{line}"),
        _ => println!("{line}"),
    }
}

pub fn note_info(msg: &str) {
    note(Note::Info, msg);
}

pub fn note_success(msg: &str) {
    note(Note::Success, msg);
}

pub fn note_warn(msg: &str) {
    note(Note::Warn, msg);
}

pub fn note_error(msg: &str) {
    note(Note::Error, msg);
}

/// One table column: header, alignment and optional width cap.
pub struct Column {
    header: String,
    right_aligned: bool,
    max_width: Option<usize>,
}

impl Column {
    pub fn left(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            right_aligned: false,
            max_width: None,
        }
    }

    pub fn right(header: impl Into<String>) -> Self {
        Self {
            right_aligned: true,
            ..Self::left(header)
        }
    }

    pub fn max_width(mut self, max: usize) -> Self {
        self.max_width = Some(max);
        self
    }

    fn fit(&self, cell: &str) -> String {
        match self.max_width {
            Some(max) if cell.chars().count() > max => {
                let kept: String = cell.chars().take(max.saturating_sub(1)).collect();
                format!("{kept}…")
            }
            _ => cell.to_string(),
        }
    }

    fn pad(&self, cell: &str, width: usize) -> String {
        if self.right_aligned {
            format!("{cell:>width$}")
        } else {
            format!("{cell:<width$}")
        }
    }
}

/// Render rows under a bold header and a dashed rule. Missing cells are blank.
pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, col)| col.fit(row.get(i).map(String::as_str).unwrap_or("")))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .fold(col.header.chars().count(), usize::max)
        })
        .collect();

    let line = |values: Vec<String>| format!("  {}\n", values.join("  ").trim_end());

    let header = columns
        .iter()
        .zip(&widths)
        .map(|(col, &w)| col.pad(&col.header, w))
        .collect::<Vec<_>>()
        .join("  ");
    let mut out = format!("  {}\n", styled(BOLD, header.trim_end()));
    out.push_str(&line(widths.iter().map(|&w| "-".repeat(w)).collect()));
    for row in &cells {
        out.push_str(&line(
            columns
                .iter()
                .zip(&widths)
                .zip(row)
                .map(|((col, &w), cell)| col.pad(cell, w))
                .collect(),
        ));
    }
    out
}

/// Write a reply chunk and flush so it shows up before the next one arrives.
pub fn stream_write(writer: &mut impl Write, chunk: &str) -> std::io::Result<()> {
    writer.write_all(chunk.as_bytes())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_fall_back_to_labels_without_color() {
        assert_eq!(Note::Warn.format("careful", false), "WARN: careful");
        assert!(Note::Success.format("done", true).contains("✓"));
    }

    #[test]
    fn table_caps_and_aligns_cells() {
        let columns = vec![Column::left("Title").max_width(6), Column::right("Messages")];
        let rows = vec![
            vec!["A very long title".to_string(), "12".to_string()],
            vec!["Short".to_string()],
        ];
        let table = render_table(&columns, &rows);
        assert!(table.contains("A ver…"));
        assert!(table.contains("      12"));
        assert!(!table.contains("long title"));
        assert!(table.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn stream_write_appends_chunks() {
        let mut buf = Vec::new();
        stream_write(&mut buf, "Hel").unwrap();
        stream_write(&mut buf, "lo").unwrap();
        assert_eq!(buf, b"Hello");
    }
}
