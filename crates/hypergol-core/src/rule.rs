//! Life-like rules and the synchronous rule engine.
//!
//! A rule is a pair of neighbor-count sets. A dead cell with `k` live
//! neighbors is born when `k ∈ born`; a live cell survives when `k ∈ survive`;
//! every other cell ends up dead.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::NeighborGraph;
use crate::state::{CellState, StateVector};

/// Rule text that does not match the `b <ints> s <ints>` grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid rule {text:?}: {reason}")]
pub struct RuleParseError {
    pub text: String,
    pub reason: String,
}

impl RuleParseError {
    fn new(text: &str, reason: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

/// `(born, survive)` neighbor-count sets.
///
/// Equality is set equality, so `b 3 2 s` and `B23/S` compare equal once
/// parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rule {
    born: BTreeSet<u32>,
    survive: BTreeSet<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Start,
    Born,
    Survive,
}

impl Rule {
    /// Build a rule from explicit count sets.
    pub fn new(
        born: impl IntoIterator<Item = u32>,
        survive: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            born: born.into_iter().collect(),
            survive: survive.into_iter().collect(),
        }
    }

    /// Conway's rule, `b 3 s 2 3`.
    pub fn conway() -> Self {
        Self::new([3], [2, 3])
    }

    /// Parse rule text.
    ///
    /// Tokens are separated by whitespace or `/` and matched case-insensitively.
    /// A standalone integer token is a whole count (`b 12 s 3`); digits glued
    /// to a `b`/`s` marker are single-digit counts (`B3/S23`).
    pub fn parse(text: &str) -> Result<Self, RuleParseError> {
        let mut rule = Rule::default();
        let mut section = Section::Start;

        let lowered = text.to_ascii_lowercase();
        let tokens = lowered
            .split(|c: char| c.is_whitespace() || c == '/')
            .filter(|t| !t.is_empty());

        for token in tokens {
            if token.chars().all(|c| c.is_ascii_digit()) {
                let count: u32 = token
                    .parse()
                    .map_err(|_| RuleParseError::new(text, format!("count out of range: {token}")))?;
                rule.insert(section, count)
                    .map_err(|reason| RuleParseError::new(text, reason))?;
                continue;
            }

            for c in token.chars() {
                match c {
                    'b' if section == Section::Start => section = Section::Born,
                    'b' => return Err(RuleParseError::new(text, "unexpected 'b' marker")),
                    's' if section == Section::Born => section = Section::Survive,
                    's' if section == Section::Start => {
                        return Err(RuleParseError::new(text, "missing 'b' marker before 's'"))
                    }
                    's' => return Err(RuleParseError::new(text, "unexpected 's' marker")),
                    d if d.is_ascii_digit() => {
                        let count = d.to_digit(10).unwrap_or_default();
                        rule.insert(section, count)
                            .map_err(|reason| RuleParseError::new(text, reason))?;
                    }
                    other => {
                        return Err(RuleParseError::new(
                            text,
                            format!("unexpected character {other:?}"),
                        ))
                    }
                }
            }
        }

        match section {
            Section::Survive => Ok(rule),
            Section::Start => Err(RuleParseError::new(text, "missing 'b' marker")),
            Section::Born => Err(RuleParseError::new(text, "missing 's' marker")),
        }
    }

    fn insert(&mut self, section: Section, count: u32) -> Result<(), &'static str> {
        match section {
            Section::Start => return Err("count before 'b' marker"),
            Section::Born => self.born.insert(count),
            Section::Survive => self.survive.insert(count),
        };
        Ok(())
    }

    /// Neighbor counts that bring a dead cell to life.
    pub fn born(&self) -> &BTreeSet<u32> {
        &self.born
    }

    /// Neighbor counts that keep a live cell alive.
    pub fn survive(&self) -> &BTreeSet<u32> {
        &self.survive
    }

    /// Next state of a cell with `alive_neighbors` live neighbors.
    pub fn next_state(&self, current: CellState, alive_neighbors: usize) -> CellState {
        let k = u32::try_from(alive_neighbors).unwrap_or(u32::MAX);
        let alive = match current {
            CellState::Alive => self.survive.contains(&k),
            CellState::Dead => self.born.contains(&k),
        };
        CellState::from(alive)
    }

    /// Filename-safe token, e.g. `b_3_s_2_3`.
    pub fn to_token(&self) -> String {
        self.to_string().replace(' ', "_")
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("b")?;
        for count in &self.born {
            write!(f, " {count}")?;
        }
        f.write_str(" s")?;
        for count in &self.survive {
            write!(f, " {count}")?;
        }
        Ok(())
    }
}

impl FromStr for Rule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Rule> for String {
    fn from(rule: Rule) -> Self {
        rule.to_string()
    }
}

impl TryFrom<String> for Rule {
    type Error = RuleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Compute the next generation.
///
/// The update is simultaneous: every cell's next state is derived from
/// `states` alone, never from a value already written to the output.
pub fn evaluate<G: NeighborGraph>(states: &[CellState], graph: &G, rule: &Rule) -> StateVector {
    debug_assert_eq!(states.len(), graph.cell_count());

    (0..states.len())
        .map(|index| {
            let alive = graph
                .neighbors_of(index)
                .filter(|&n| states.get(n).is_some_and(CellState::is_alive))
                .count();
            rule.next_state(states[index], alive)
        })
        .collect()
}
