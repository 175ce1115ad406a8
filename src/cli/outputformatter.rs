use serde_json::Value;

use terminal_size::{terminal_size, Width};

/// Columns shown first when present; everything else follows alphabetically.
const LEADING_COLUMNS: [&str; 5] = ["id", "title", "name", "username", "status"];

/// Render a list of backend records as an ASCII table.
/// Returns false (and prints nothing) when JSON output is forced or there is nothing to tabulate.
pub fn print_records(records: &[Value]) -> bool {
    if json_forced() || records.is_empty() {
        return false;
    }
    let termw = get_terminal_width();
    crate::tprintln!("[cli.outputformatter] detected terminal width={} columns", termw);
    for line in render_table(records, termw) {
        println!("{}", line);
    }
    true
}

/// Print a single JSON value, pretty.
pub fn print_json(v: &Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()));
}

pub fn json_forced() -> bool {
    std::env::var("UNITEAM_OUTPUT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false)
}

/// Table lines (separator, header, rows, separator, footer), each fitted to `maxw`.
pub fn render_table(records: &[Value], maxw: usize) -> Vec<String> {
    let cols = collect_columns(records);
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| match r {
            Value::Object(map) => cols.iter().map(|c| map.get(c).map(to_cell_string).unwrap_or_default()).collect(),
            other => vec![to_cell_string(other)],
        })
        .collect();

    let mut widths: Vec<usize> = cols.iter().map(|c| c.chars().count().min(maxw)).collect();
    for r in &rows {
        for (i, cell) in r.iter().enumerate().take(cols.len()) {
            widths[i] = widths[i].max(cell.chars().count().min(maxw));
        }
    }

    let sep = build_separator(&widths);
    let mut out = Vec::with_capacity(rows.len() + 5);
    out.push(fit_line_to_width(&sep, maxw));
    out.push(fit_line_to_width(&build_row(&cols, &widths), maxw));
    out.push(fit_line_to_width(&sep, maxw));
    for r in &rows {
        out.push(fit_line_to_width(&build_row(r, &widths), maxw));
    }
    out.push(fit_line_to_width(&sep, maxw));
    out.push(format!("rows: {}", rows.len()));
    out
}

fn collect_columns(records: &[Value]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let mut saw_scalar = false;
    for r in records {
        match r {
            Value::Object(map) => {
                for k in map.keys() {
                    if !keys.contains(k) { keys.push(k.clone()); }
                }
            }
            _ => saw_scalar = true,
        }
    }
    if keys.is_empty() || saw_scalar {
        return vec!["value".to_string()];
    }
    keys.sort_by_key(|k| {
        let lead = LEADING_COLUMNS.iter().position(|c| c == k).unwrap_or(LEADING_COLUMNS.len());
        (lead, k.clone())
    });
    keys
}

fn to_cell_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // nested objects/arrays stay compact JSON
        other => other.to_string(),
    }
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::from("+");
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        let text = truncate(cell, *w);
        let pad = " ".repeat(w.saturating_sub(text.chars().count()));
        if is_numeric_like(cell) {
            s.push_str(&format!(" {}{} |", pad, text));
        } else {
            s.push_str(&format!(" {}{} |", text, pad));
        }
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    let st = s.trim();
    !st.is_empty() && st.chars().any(|c| c.is_ascii_digit()) && st.chars().all(|c| c.is_ascii_digit() || ".-+".contains(c))
}

fn get_terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), _)) if w > 4 => (w - 4) as usize,
        _ => 80,
    }
}

fn fit_line_to_width(s: &str, maxw: usize) -> String {
    let len = s.chars().count();
    if len <= maxw { return s.to_string(); }
    if maxw <= 3 { return "…".to_string(); }
    // keep both ends so the closing border stays visible
    let budget = maxw - 3;
    let front = budget / 2;
    let back = budget - front;
    let head: String = s.chars().take(front).collect();
    let tail: String = s.chars().skip(len - back).collect();
    format!("{}...{}", head, tail)
}
