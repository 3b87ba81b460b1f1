use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::sync::{AppState, Source};
use crate::task::{Filter, Task};
use crate::timestamp::format_local;

pub const EMPTY_PLACEHOLDER: &str = "No tasks to show.";
pub const OFFLINE_BANNER: &str = "offline: showing tasks saved on this device";

/// What the list surface shows: the filtered rows of the last load.
#[derive(Debug, Clone)]
pub struct ListView<'a> {
    pub filter: Filter,
    pub source: Option<Source>,
    pub rows: Vec<&'a Task>,
}

impl<'a> ListView<'a> {
    pub fn of(state: &'a AppState) -> Self {
        Self {
            filter: state.filter,
            source: state.source,
            rows: state
                .tasks
                .iter()
                .filter(|task| state.filter.matches(task))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Draws the whole list from scratch on every call.
    #[tracing::instrument(skip_all, fields(rows = view.rows.len(), filter = %view.filter))]
    pub fn render_list<W: Write>(&self, out: &mut W, view: &ListView<'_>) -> anyhow::Result<()> {
        if view.source == Some(Source::Fallback) {
            writeln!(out, "{}", self.paint(OFFLINE_BANNER, "33"))?;
        }

        let bar = Filter::ALL
            .iter()
            .map(|filter| {
                if *filter == view.filter {
                    self.paint(&format!("[{filter}]"), "1")
                } else {
                    filter.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out, "Filter: {bar}")?;

        if view.rows.is_empty() {
            writeln!(out, "{EMPTY_PLACEHOLDER}")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Done".to_string(),
            "Title".to_string(),
            "Created".to_string(),
        ];

        let rows = view
            .rows
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                let check = if task.completed { "[x]" } else { "[ ]" };
                let title = if task.completed {
                    self.paint(&task.title, "2")
                } else {
                    task.title.clone()
                };
                vec![
                    self.paint(&(idx + 1).to_string(), "33"),
                    check.to_string(),
                    title,
                    format_local(task.created_at),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let mut line = String::new();
    for idx in 0..column_count {
        line.push_str(&format!("{:width$} ", headers[idx], width = widths[idx]));
    }
    writeln!(writer, "{}", line.trim_end())?;

    line.clear();
    for width in &widths {
        line.push_str(&format!("{:-<width$} ", "", width = *width));
    }
    writeln!(writer, "{}", line.trim_end())?;

    for row in rows {
        line.clear();
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding + 1));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{EMPTY_PLACEHOLDER, ListView, OFFLINE_BANNER, Renderer, strip_ansi};
    use crate::config::Config;
    use crate::sync::{AppState, Source};
    use crate::task::{Filter, NewTask, Task};

    fn state(filter: Filter, source: Source) -> AppState {
        let now = Utc::now();
        let open = Task::from_new(NewTask::pending("Buy milk"), now);
        let mut done = Task::from_new(NewTask::pending("Café run"), now);
        done.completed = true;
        AppState {
            tasks: vec![open, done],
            filter,
            source: Some(source),
        }
    }

    fn draw(state: &AppState) -> String {
        let mut out = Vec::new();
        Renderer::plain()
            .render_list(&mut out, &ListView::of(state))
            .expect("render");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn renders_one_row_per_visible_task() {
        let text = draw(&state(Filter::All, Source::Remote));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Filter: [all]  active  completed");
        assert!(lines[1].starts_with("# Done Title"));
        assert!(lines[3].starts_with("1 [ ]  Buy milk"));
        assert!(lines[4].starts_with("2 [x]  Café run"));
        assert_eq!(lines.len(), 5);
        assert!(!text.contains(OFFLINE_BANNER));
    }

    #[test]
    fn filter_hides_rows_and_placeholder_shows_when_empty() {
        let text = draw(&state(Filter::Active, Source::Remote));
        assert!(text.contains("Buy milk"));
        assert!(!text.contains("Café run"));

        let mut empty = state(Filter::Completed, Source::Remote);
        empty.tasks.retain(|task| !task.completed);
        let text = draw(&empty);
        assert!(text.ends_with(&format!("{EMPTY_PLACEHOLDER}\n")));
    }

    #[test]
    fn fallback_source_prints_offline_banner() {
        let text = draw(&state(Filter::All, Source::Fallback));
        assert_eq!(text.lines().next(), Some(OFFLINE_BANNER));
    }

    #[test]
    fn color_setting_is_the_only_parser_for_its_key() {
        let with_color = |value: &str| {
            let mut cfg = Config::from_sources(None, None).expect("defaults");
            cfg.apply_overrides([("color".to_string(), value.to_string())]);
            Renderer::new(&cfg)
        };

        for accepted in ["on", "OFF", "yes", "no", "true", "false", "1", "0"] {
            assert!(with_color(accepted).is_ok(), "{accepted} rejected");
        }
        let err = with_color("y").expect_err("y is not a color setting");
        assert!(err.to_string().contains("invalid color setting: y"));

        let mut cfg = Config::from_sources(None, None).expect("defaults");
        cfg.apply_overrides([("color".to_string(), "off".to_string())]);
        assert!(!Renderer::new(&cfg).expect("off").color);
    }

    #[test]
    fn strip_ansi_drops_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[33m12\x1b[0m"), "12");
    }
}
