use super::styles;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::Path;
use tabkeep::events::CoreEvent;
use tabkeep::model::Document;
use tabkeep::session::SaveReport;
use tabkeep::title::display_title;
use timeago::Formatter;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const LINE_WIDTH: usize = 80;
const TIME_WIDTH: usize = 16;
const DIRTY_MARKER: &str = "●";
const EXTERNAL_MARKER: &str = "↗";

/// One line of `tabkeep list`.
pub struct ListRow<'a> {
    pub index: usize,
    pub window: usize,
    pub document: &'a Document,
}

pub fn render_list(rows: &[ListRow<'_>]) -> String {
    if rows.is_empty() {
        return format!("{}\n", styles::muted().apply_to("No documents."));
    }

    let mut out = String::new();
    let mut last_window = None;
    for row in rows {
        if last_window.is_some_and(|w| w != row.window) {
            out.push('\n');
        }
        last_window = Some(row.window);

        let doc = row.document;
        let index = format!("{:>3}. ", row.index);
        let marker = match (doc.is_dirty, doc.is_freestanding()) {
            (true, _) => DIRTY_MARKER,
            (false, false) => EXTERNAL_MARKER,
            (false, true) => " ",
        };
        let time = format_time_ago(doc.modified_at);

        let fixed = index.width() + marker.width() + 1 + TIME_WIDTH;
        let title = truncate_to_width(&list_title(doc), LINE_WIDTH.saturating_sub(fixed));
        let padding = LINE_WIDTH.saturating_sub(fixed + title.width());

        let _ = writeln!(
            out,
            "{}{}{} {}{}",
            styles::index().apply_to(index),
            styles::title().apply_to(&title),
            " ".repeat(padding),
            styles::warning().apply_to(marker),
            styles::muted().apply_to(time),
        );
    }
    out
}

/// Blank documents are listed by title; the rest add a preview of their content.
fn list_title(doc: &Document) -> String {
    if doc.is_blank() {
        return doc.title.clone();
    }
    let preview = display_title(&doc.content, "");
    if preview.is_empty() || preview == doc.title {
        doc.title.clone()
    } else {
        format!("{}: {}", doc.title, preview)
    }
}

pub fn render_document(index: usize, doc: &Document) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        styles::index().apply_to(format!("{}.", index)),
        styles::title().apply_to(&doc.title)
    );
    if let Some(path) = doc.file_path() {
        let _ = writeln!(out, "{}", styles::muted().apply_to(path.display()));
    }
    let _ = writeln!(out, "{}", styles::faint().apply_to("-".repeat(32)));
    out.push_str(&doc.content);
    if !doc.content.ends_with('\n') {
        out.push('\n');
    }
    out
}

pub fn render_save_report(report: &SaveReport) -> String {
    let mut line = format!(
        "Saved {} document{}",
        report.records,
        if report.records == 1 { "" } else { "s" }
    );
    if report.snapshots_written > 0 {
        let _ = write!(line, ", {} snapshot(s) written", report.snapshots_written);
    }
    if report.skipped_empty > 0 {
        let _ = write!(line, ", {} empty skipped", report.skipped_empty);
    }
    if report.pruned_snapshots > 0 {
        let _ = write!(line, ", {} stale snapshot(s) removed", report.pruned_snapshots);
    }
    format!("{}\n", styles::success().apply_to(line))
}

pub fn render_success(message: &str) -> String {
    format!("{}\n", styles::success().apply_to(message))
}

pub fn render_paths(paths: &[impl AsRef<Path>]) -> String {
    if paths.is_empty() {
        return format!("{}\n", styles::muted().apply_to("No files."));
    }
    paths
        .iter()
        .map(|p| match p.as_ref().file_name() {
            Some(name) => format!("{}\n", name.to_string_lossy()),
            None => format!("{}\n", p.as_ref().display()),
        })
        .collect()
}

/// Events worth telling the user about. Change notifications are dropped.
pub fn render_event(event: &CoreEvent) -> Option<String> {
    match event {
        CoreEvent::Failure(notice) => Some(format!(
            "{} {}: {}",
            styles::warning().for_stderr().apply_to("warning:"),
            notice.operation,
            notice.message
        )),
        CoreEvent::FanOutAbandoned { remaining } => Some(format!(
            "{} {} restored document(s) could not be placed in a window",
            styles::error().for_stderr().apply_to("error:"),
            remaining.len()
        )),
        CoreEvent::DocumentChanged { .. }
        | CoreEvent::TitleChanged { .. }
        | CoreEvent::WorkingDirectoryChanged { .. } => None,
    }
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut current_width = 0;
    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            break;
        }
        result.push(c);
        current_width += char_width;
    }
    result.push('…');
    result
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let time_str = Formatter::new().convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", time_str, width = TIME_WIDTH)
}
