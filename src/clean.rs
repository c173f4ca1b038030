//! Field cleaners shared by every transformation unit.
//!
//! Cleaners never fail: anything that cannot be read as a number becomes `0`,
//! sentinel placeholders become `0` (numeric modes) or an empty string (text).

use deunicode::deunicode;
use lazy_static::lazy_static;
use regex::Regex;

use crate::source::Cell;

// Compiled once; cleaners run for every cell of every row.
lazy_static! {
    static ref NON_NUMERIC_RE: Regex = Regex::new(r"[^\d.+\-]").unwrap();
    static ref MULTI_WS_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^a-z0-9]").unwrap();
    static ref HTTP_PREFIX_RE: Regex = Regex::new(r"(?i)^https?://").unwrap();
}

/// Placeholders found in the source spreadsheets, compared after
/// [`normalize_token`].
const SENTINELS: &[&str] = &["NO APLICA", "SIN DATOS", "SIN DATO", "S/D", "N/A", "ND", "-", "--"];

/// Labels of summary rows that must never be grouped as a real category.
const TOTAL_LABELS: &[&str] = &["TOTAL", "TOTAL GENERAL", "SUBTOTAL"];

/// Upper-cases, transliterates accents and collapses whitespace.
/// `"  Gobierno   Regional de Loreto "` becomes `"GOBIERNO REGIONAL DE LORETO"`.
pub fn normalize_token(text: &str) -> String {
    let ascii = deunicode(text).to_uppercase();
    MULTI_WS_RE.replace_all(ascii.trim(), " ").into_owned()
}

/// Key used to match column headers loosely: ASCII, lower-case, alphanumerics only.
pub fn header_key(header: &str) -> String {
    let lowered = deunicode(header).to_lowercase();
    NON_ALNUM_RE.replace_all(&lowered, "").into_owned()
}

/// `"Total"`, `"Total general"` or `"Subtotal"` in any case or spacing.
pub fn is_total_label(text: &str) -> bool {
    let token = normalize_token(text);
    TOTAL_LABELS.contains(&token.as_str())
}

pub fn is_sentinel(text: &str) -> bool {
    let token = normalize_token(text);
    SENTINELS.contains(&token.as_str())
}

/// Trims and collapses whitespace; empty for sentinels.
pub fn clean_text(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Number(n) => format_number(*n),
        Cell::Text(s) => {
            if is_sentinel(s) {
                return String::new();
            }
            MULTI_WS_RE.replace_all(s.trim(), " ").into_owned()
        }
    }
}

pub fn clean_number(cell: &Cell) -> f64 {
    match cell {
        Cell::Empty => 0.0,
        Cell::Number(n) => finite_or_zero(*n),
        Cell::Text(s) => parse_number_str(s),
    }
}

pub fn clean_percent(cell: &Cell) -> f64 {
    match cell {
        Cell::Empty => 0.0,
        Cell::Number(n) => finite_or_zero(*n),
        Cell::Text(s) => parse_percent_str(s),
    }
}

pub fn clean_integer(cell: &Cell) -> i64 {
    clean_number(cell).trunc() as i64
}

fn parse_number_str(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() || is_sentinel(trimmed) {
        return 0.0;
    }
    let without_groups = trimmed.replace(',', "");
    let digits = NON_NUMERIC_RE.replace_all(&without_groups, "");
    digits.parse::<f64>().map(finite_or_zero).unwrap_or(0.0)
}

fn parse_percent_str(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() || is_sentinel(trimmed) {
        return 0.0;
    }
    let decimal = trimmed.trim_end_matches('%').trim().replace(',', ".");
    let digits = NON_NUMERIC_RE.replace_all(&decimal, "");
    digits.parse::<f64>().map(finite_or_zero).unwrap_or(0.0)
}

fn finite_or_zero(n: f64) -> f64 {
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Renders spreadsheet numbers used as text (years, codes) without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else if n.is_finite() {
        n.to_string()
    } else {
        String::new()
    }
}

/// Ensures a link can be opened from the dashboard: bare domains get `https://`.
pub fn ensure_http(link: &str) -> String {
    let trimmed = link.trim();
    if trimmed.is_empty() || is_sentinel(trimmed) {
        return String::new();
    }
    if HTTP_PREFIX_RE.is_match(trimmed) {
        return trimmed.to_string();
    }
    format!("https://{}", trimmed.trim_start_matches('/'))
}
