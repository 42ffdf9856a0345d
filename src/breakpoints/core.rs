use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlotError};

/// Ordered viewport tier. The ordering is total and fixed at compile time;
/// the size cascade walks it in both directions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    Xs,
    Sm,
    Md,
    Lg,
    Xl,
}

impl Breakpoint {
    /// Every tier, smallest first.
    pub const ALL: [Breakpoint; 5] = [
        Breakpoint::Xs,
        Breakpoint::Sm,
        Breakpoint::Md,
        Breakpoint::Lg,
        Breakpoint::Xl,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Breakpoint::Xs => "xs",
            Breakpoint::Sm => "sm",
            Breakpoint::Md => "md",
            Breakpoint::Lg => "lg",
            Breakpoint::Xl => "xl",
        }
    }

    /// Position within [`Breakpoint::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Parse a key, substituting `fallback` for anything outside the closed set.
    pub fn parse_or(key: &str, fallback: Breakpoint) -> Breakpoint {
        key.parse().unwrap_or(fallback)
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Breakpoint {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self> {
        Breakpoint::ALL
            .into_iter()
            .find(|bp| bp.as_str() == s)
            .ok_or_else(|| SlotError::UnknownBreakpoint(s.to_string()))
    }
}

/// Width-based media query predicate, e.g. `(min-width: 768px)`.
///
/// Bounds are inclusive and expressed in CSS pixels; `em`/`rem` are converted
/// at 16px.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MediaQuery {
    pub min_width: Option<f32>,
    pub max_width: Option<f32>,
}

const ROOT_FONT_PX: f32 = 16.0;

impl MediaQuery {
    pub const fn min_width(px: f32) -> Self {
        Self {
            min_width: Some(px),
            max_width: None,
        }
    }

    pub const fn max_width(px: f32) -> Self {
        Self {
            min_width: None,
            max_width: Some(px),
        }
    }

    pub const fn between(min: f32, max: f32) -> Self {
        Self {
            min_width: Some(min),
            max_width: Some(max),
        }
    }

    pub fn matches(&self, viewport_width: f32) -> bool {
        self.min_width.is_none_or(|min| viewport_width >= min)
            && self.max_width.is_none_or(|max| viewport_width <= max)
    }

    pub fn parse(query: &str) -> Result<Self> {
        let invalid = || SlotError::InvalidMediaQuery(query.to_string());
        let mut parsed = MediaQuery::default();
        let mut seen = false;

        for clause in query.split(" and ") {
            let clause = clause.trim();
            if clause.is_empty() || clause.eq_ignore_ascii_case("screen") {
                continue;
            }
            let inner = clause
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(invalid)?;
            let (feature, value) = inner.split_once(':').ok_or_else(invalid)?;
            let px = parse_length(value.trim()).ok_or_else(invalid)?;
            match feature.trim().to_ascii_lowercase().as_str() {
                "min-width" => parsed.min_width = Some(px),
                "max-width" => parsed.max_width = Some(px),
                _ => return Err(invalid()),
            }
            seen = true;
        }

        if !seen {
            return Err(invalid());
        }
        Ok(parsed)
    }
}

fn parse_length(raw: &str) -> Option<f32> {
    let raw = raw.to_ascii_lowercase();
    let (number, scale) = if let Some(n) = raw.strip_suffix("rem") {
        (n, ROOT_FONT_PX)
    } else if let Some(n) = raw.strip_suffix("em") {
        (n, ROOT_FONT_PX)
    } else if let Some(n) = raw.strip_suffix("px") {
        (n, 1.0)
    } else {
        (raw.as_str(), 1.0)
    };
    number.trim().parse::<f32>().ok().map(|n| n * scale)
}

impl FromStr for MediaQuery {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self> {
        MediaQuery::parse(s)
    }
}

impl fmt::Display for MediaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min_width, self.max_width) {
            (Some(min), Some(max)) => write!(f, "(min-width: {min}px) and (max-width: {max}px)"),
            (Some(min), None) => write!(f, "(min-width: {min}px)"),
            (None, Some(max)) => write!(f, "(max-width: {max}px)"),
            (None, None) => f.write_str("all"),
        }
    }
}

/// A breakpoint paired with the predicate that activates it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakpointQuery {
    pub breakpoint: Breakpoint,
    pub query: MediaQuery,
}

impl BreakpointQuery {
    pub const fn new(breakpoint: Breakpoint, query: MediaQuery) -> Self {
        Self { breakpoint, query }
    }
}

/// The standard tier table: `xs` below 480px, then mobile-first minimums.
pub fn default_breakpoints() -> Vec<BreakpointQuery> {
    vec![
        BreakpointQuery::new(Breakpoint::Xs, MediaQuery::max_width(479.0)),
        BreakpointQuery::new(Breakpoint::Sm, MediaQuery::min_width(480.0)),
        BreakpointQuery::new(Breakpoint::Md, MediaQuery::min_width(768.0)),
        BreakpointQuery::new(Breakpoint::Lg, MediaQuery::min_width(1024.0)),
        BreakpointQuery::new(Breakpoint::Xl, MediaQuery::min_width(1280.0)),
    ]
}
