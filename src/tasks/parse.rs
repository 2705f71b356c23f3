//! Markdown checkbox task lines.
//!
//! Format: `- [ ] description 📅 2025-01-31 ⏫ #tag`, completed tasks use `[x]`
//! and carry `✅ <date>`.

use chrono::NaiveDate;

use super::types::{NewTask, Task, TaskPriority, TaskStatus};

const DUE_MARKER: &str = "📅";
const DONE_MARKER: &str = "✅";

/// Parse one line of `path`. `line` is 1-based. Returns `None` for non-task lines.
pub fn parse_task_line(text: &str, path: &str, line: usize) -> Option<Task> {
    let trimmed = text.trim_start();
    let rest = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))?;
    let (status, body) = if let Some(body) = rest.strip_prefix("[ ]") {
        (TaskStatus::Open, body)
    } else if let Some(body) = rest
        .strip_prefix("[x]")
        .or_else(|| rest.strip_prefix("[X]"))
    {
        (TaskStatus::Completed, body)
    } else {
        return None;
    };

    let mut description = Vec::new();
    let mut due = None;
    let mut completed_on = None;
    let mut priority = None;
    let mut tags = Vec::new();

    let mut tokens = body.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        match token {
            DUE_MARKER => due = tokens.next().and_then(parse_date),
            DONE_MARKER => completed_on = tokens.next().and_then(parse_date),
            "⏫" => priority = Some(TaskPriority::High),
            "🔼" => priority = Some(TaskPriority::Medium),
            "🔽" => priority = Some(TaskPriority::Low),
            t if t.len() > 1 && t.starts_with('#') => {
                tags.push(t.trim_start_matches('#').to_string());
                description.push(t);
            }
            t => description.push(t),
        }
    }

    let description = description.join(" ");
    if description.is_empty() {
        return None;
    }

    Some(Task {
        id: format!("{path}:{line}"),
        description,
        status,
        due,
        completed_on,
        priority,
        tags,
        path: path.to_string(),
        line,
    })
}

/// Render a new open task as a markdown line (no trailing newline).
pub fn format_task(task: &NewTask) -> String {
    let mut out = format!("- [ ] {}", task.description.trim());
    for tag in &task.tags {
        let tag = tag.trim().trim_start_matches('#');
        let token = format!("#{tag}");
        if !tag.is_empty() && !out.split_whitespace().any(|t| t == token) {
            out.push(' ');
            out.push_str(&token);
        }
    }
    if let Some(priority) = task.priority {
        out.push(' ');
        out.push_str(priority.marker());
    }
    if let Some(due) = task.due {
        out.push_str(&format!(" {DUE_MARKER} {due}"));
    }
    out
}

/// Rewrite an open task line as completed on `today`, preserving indentation.
pub fn complete_line(text: &str, today: NaiveDate) -> Option<String> {
    let indent_len = text.len() - text.trim_start().len();
    let (indent, rest) = text.split_at(indent_len);
    let bullet = ["- ", "* "].into_iter().find(|b| rest.starts_with(b))?;
    let body = rest[bullet.len()..].strip_prefix("[ ]")?;
    Some(format!(
        "{indent}{bullet}[x]{} {DONE_MARKER} {today}",
        body.trim_end()
    ))
}

/// Split `<path>:<line>` into its parts.
pub fn parse_task_id(id: &str) -> Option<(&str, usize)> {
    let (path, line) = id.rsplit_once(':')?;
    let line: usize = line.parse().ok()?;
    (!path.is_empty() && line > 0).then_some((path, line))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
