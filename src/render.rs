// src/render.rs
//
// Plain-text rendering used by the terminal front-end. Chart payloads are
// summarized; tables are drawn with padded columns.

use serde_json::Value;

use crate::export::headers;
use crate::routing::{route_for, Renderer};
use crate::types::{Message, ReportPayload, Row};

const MAX_CELL: usize = 32;

fn cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{:.2}", f),
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    };
    let text = text.replace(['\n', '\r'], " ");
    if text.chars().count() > MAX_CELL {
        let cut: String = text.chars().take(MAX_CELL - 1).collect();
        format!("{}…", cut)
    } else {
        text
    }
}

pub fn table(rows: &[Row], max_rows: usize) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let columns = headers(rows);
    let shown = &rows[..rows.len().min(max_rows)];
    let cells: Vec<Vec<String>> = shown
        .iter()
        .map(|row| columns.iter().map(|c| cell(row.get(c))).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count().min(MAX_CELL)))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<String>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(columns.iter().map(|c| cell(Some(&Value::String(c.clone())))).collect()));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in cells {
        out.push_str(&line(row));
        out.push('\n');
    }
    if rows.len() > shown.len() {
        out.push_str(&format!("… {} more rows\n", rows.len() - shown.len()));
    }
    out
}

pub fn report(payload: &ReportPayload, max_rows: usize) -> String {
    let route = route_for(payload);
    let mut out = String::new();

    let title = payload.title().unwrap_or(route.renderer.title());
    out.push_str(&format!("[{}]", title));
    let decks = payload.decks();
    if !decks.is_empty() {
        out.push_str(&format!(" decks: {}", decks.join(", ")));
    }
    out.push('\n');

    if route.renderer == Renderer::NotImplemented {
        out.push_str(&format!(
            "No renderer is available for {} yet.\n",
            payload.tool_name.as_deref().unwrap_or("this result")
        ));
        return out;
    }

    let rows = payload.rows();
    if !rows.is_empty() {
        out.push_str(&table(&rows, max_rows));
    } else if payload.has_chart() {
        out.push_str(&format!(
            "({} chart data available; export to inspect)\n",
            payload.chart_type().unwrap_or("chart")
        ));
    }
    out
}

pub fn message(message: &Message, max_rows: usize) -> String {
    let mut out = String::new();
    if !message.content.is_empty() {
        out.push_str(&message.content);
        out.push('\n');
    }
    if let Some(retries) = message.retry_count {
        out.push_str(&format!("(answered after {} retries)\n", retries));
    }
    for payload in [&message.comparison, &message.visualization].into_iter().flatten() {
        out.push_str(&report(payload, max_rows));
    }
    if let Some(rows) = &message.raw_data {
        out.push_str(&table(rows, max_rows));
    }
    if let Some(data) = &message.disambiguation {
        out.push_str(&format!("{}\n", data.question));
        for (i, option) in data.options.iter().enumerate() {
            let marker = if data.selected == Some(i) { "*" } else { " " };
            out.push_str(&format!("{} {}. {}\n", marker, i + 1, option.label));
        }
    }
    if let Some(correction) = &message.correction {
        if correction.answered.is_none() {
            out.push_str(&format!(
                "Try the alternate interpretation ({})? /yes or /no\n",
                correction.alternative_type
            ));
        }
    }
    out
}
