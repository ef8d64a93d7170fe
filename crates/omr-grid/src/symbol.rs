use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder character for positions that could not be decided.
pub const UNRESOLVED: char = '?';

/// Text reported for a question with more than one filled choice.
pub const MULTIPLE: &str = "MULTIPLE";

/// Decoded value of one grid position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbol {
    Digit(u8),
    Choice(char),
    /// Two or more choices filled in one question.
    Multiple,
    Unresolved,
}

impl Symbol {
    /// `Multiple` is a definite reading and counts as resolved.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Symbol::Unresolved)
    }

    /// Answer-sheet text: the letter, `"MULTIPLE"`, or empty.
    pub fn answer_text(&self) -> String {
        match self {
            Symbol::Choice(c) => c.to_string(),
            Symbol::Multiple => MULTIPLE.to_string(),
            Symbol::Digit(d) => d.to_string(),
            Symbol::Unresolved => String::new(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Digit(d) => write!(f, "{d}"),
            Symbol::Choice(c) => write!(f, "{c}"),
            Symbol::Multiple => f.write_str(MULTIPLE),
            Symbol::Unresolved => write!(f, "{UNRESOLVED}"),
        }
    }
}

/// How a position was decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Winning connected component.
    Blob,
    /// Direct density sampling of the candidate cells.
    Density,
    /// Filled in afterwards by a reading that does not use the grid geometry.
    ColumnScan,
    Unresolved,
}

/// Ordered symbols plus the fraction of positions that were resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecodeResult {
    pub symbols: Vec<Symbol>,
    pub resolutions: Vec<Resolution>,
    /// `resolved / positions`, 0 for an empty grid.
    pub confidence: f32,
}

impl DecodeResult {
    pub fn new(symbols: Vec<Symbol>, resolutions: Vec<Resolution>) -> Self {
        let confidence = if symbols.is_empty() {
            0.0
        } else {
            symbols.iter().filter(|s| s.is_resolved()).count() as f32 / symbols.len() as f32
        };
        Self {
            symbols,
            resolutions,
            confidence,
        }
    }

    /// All-unresolved result for `positions` positions.
    pub fn unresolved(positions: usize) -> Self {
        Self::new(
            vec![Symbol::Unresolved; positions],
            vec![Resolution::Unresolved; positions],
        )
    }

    pub fn positions(&self) -> usize {
        self.symbols.len()
    }

    pub fn resolved_count(&self) -> usize {
        self.symbols.iter().filter(|s| s.is_resolved()).count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.positions() - self.resolved_count()
    }

    /// Concatenated symbols, e.g. `"12?4"` for a digit grid.
    pub fn text(&self) -> String {
        self.symbols.iter().map(|s| s.to_string()).collect()
    }
}
