//! Answer post-processing for narrative and numeric questions.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

const ANSWER_MARKER: &str = "ANSWER:";
const SOURCES_MARKER: &str = "SOURCES:";
const EXCERPTS_MARKER: &str = "RELEVANT EXCERPTS:";

/// Narrative answer split into the sections requested by the standard prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedAnswer {
    /// Text under `ANSWER:`.
    pub answer: String,
    /// Text under `SOURCES:`.
    pub sources: String,
    /// Text under `RELEVANT EXCERPTS:`.
    pub excerpts: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Answer,
    Sources,
    Excerpts,
}

/// Split model output into labelled sections.
///
/// Returns `None` when no section marker appears, so callers can fall back to the raw output.
/// Markers match in any case (`Answer:`). Text following a marker on the same line belongs to
/// that section; leading markdown emphasis (`**ANSWER:**`, `## SOURCES:`) is tolerated.
pub fn parse_sections(output: &str) -> Option<ParsedAnswer> {
    let mut parsed = ParsedAnswer::default();
    let mut current = Section::Preamble;
    let mut seen_marker = false;

    for line in output.lines() {
        let stripped = line
            .trim_start()
            .trim_start_matches(['*', '#'])
            .trim_start();
        let (section, rest) = if let Some(rest) = strip_marker(stripped, ANSWER_MARKER) {
            (Some(Section::Answer), rest)
        } else if let Some(rest) = strip_marker(stripped, SOURCES_MARKER) {
            (Some(Section::Sources), rest)
        } else if let Some(rest) = strip_marker(stripped, EXCERPTS_MARKER) {
            (Some(Section::Excerpts), rest)
        } else {
            (None, line)
        };

        let content = match section {
            Some(section) => {
                current = section;
                seen_marker = true;
                rest.trim_start_matches('*').trim()
            }
            None => content_line(rest),
        };

        let target = match current {
            Section::Preamble => continue,
            Section::Answer => &mut parsed.answer,
            Section::Sources => &mut parsed.sources,
            Section::Excerpts => &mut parsed.excerpts,
        };
        if section.is_some() && content.is_empty() {
            continue;
        }
        target.push_str(content);
        target.push('\n');
    }

    if !seen_marker {
        return None;
    }

    parsed.answer = parsed.answer.trim().to_string();
    parsed.sources = parsed.sources.trim().to_string();
    parsed.excerpts = parsed.excerpts.trim().to_string();
    Some(parsed)
}

fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let head = line.get(..marker.len())?;
    head.eq_ignore_ascii_case(marker).then(|| &line[marker.len()..])
}

fn content_line(line: &str) -> &str {
    line.trim_end()
}

/// Category of a figure found in a numeric answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FigureKind {
    /// Dollar amount.
    Currency,
    /// Percentage or percent change.
    Percentage,
    /// Fiscal year reference.
    FiscalYear,
}

/// A figure extracted from model output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    /// Figure category.
    pub kind: FigureKind,
    /// Text as it appeared.
    pub text: String,
    /// Normalized value: dollars, percent points, or the four-digit year.
    pub value: Option<f64>,
}

static CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s?(\d[\d,]*(?:\.\d+)?)(?:\s*(trillion|billion|million|thousand|[tbmk])\b)?")
        .expect("currency pattern compiles")
});

static PERCENTAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s?(?:%|percent\b)").expect("percentage pattern compiles")
});

static FISCAL_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:FY\s?(\d{4}|\d{2})|fiscal\s+year\s+(\d{4}))\b")
        .expect("fiscal year pattern compiles")
});

/// Extract currency amounts, percentages, and fiscal years in order of appearance.
///
/// Repeated mentions of the same text are reported once.
pub fn extract_figures(output: &str) -> Vec<Figure> {
    let mut found: Vec<(usize, Figure)> = Vec::new();

    for captures in CURRENCY.captures_iter(output) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let amount = captures
            .get(1)
            .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok());
        let scale = captures
            .get(2)
            .map(|m| scale_factor(m.as_str()))
            .unwrap_or(1.0);
        found.push((
            whole.start(),
            Figure {
                kind: FigureKind::Currency,
                text: whole.as_str().trim().to_string(),
                value: amount.map(|value| value * scale),
            },
        ));
    }

    for captures in PERCENTAGE.captures_iter(output) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        found.push((
            whole.start(),
            Figure {
                kind: FigureKind::Percentage,
                text: whole.as_str().to_string(),
                value: captures.get(1).and_then(|m| m.as_str().parse().ok()),
            },
        ));
    }

    for captures in FISCAL_YEAR.captures_iter(output) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let year = captures
            .get(1)
            .or_else(|| captures.get(2))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .map(|year| if year < 100 { 2000 + year } else { year });
        found.push((
            whole.start(),
            Figure {
                kind: FigureKind::FiscalYear,
                text: whole.as_str().to_string(),
                value: year.map(f64::from),
            },
        ));
    }

    found.sort_by_key(|(position, _)| *position);
    let mut seen = HashSet::new();
    found
        .into_iter()
        .map(|(_, figure)| figure)
        .filter(|figure| seen.insert((figure.kind, figure.text.to_lowercase())))
        .collect()
}

fn scale_factor(unit: &str) -> f64 {
    match unit.to_lowercase().as_str() {
        "trillion" | "t" => 1e12,
        "billion" | "b" => 1e9,
        "million" | "m" => 1e6,
        "thousand" | "k" => 1e3,
        _ => 1.0,
    }
}
