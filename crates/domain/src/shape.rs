use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DomainError, Pitch};

/// Semitone distance from the root of a shape.
pub type Offset = u32;

/// Ascending semitone offsets from an implicit root, always starting at 0.
///
/// A shape identifies an interval or chord independently of register, so
/// `[0, 4, 7]` is a major triad whatever root it is played on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<Offset>", into = "Vec<Offset>")]
pub struct Shape(Vec<Offset>);

impl Shape {
    pub fn new(offsets: Vec<Offset>) -> Result<Self, DomainError> {
        let starts_at_root = offsets.first() == Some(&0);
        let ascending = offsets.windows(2).all(|pair| pair[0] < pair[1]);
        if !starts_at_root || !ascending {
            return Err(DomainError::InvalidShape(offsets));
        }
        Ok(Self(offsets))
    }

    /// The single-note shape `[0]`.
    pub fn unison() -> Self {
        Self(vec![0])
    }

    /// Builds `[0, steps...]` from offsets chosen in strictly increasing order above the root.
    pub fn from_steps(steps: &[Offset]) -> Self {
        debug_assert!(steps.first().map_or(true, |&first| first > 0));
        debug_assert!(steps.windows(2).all(|pair| pair[0] < pair[1]));
        let mut offsets = Vec::with_capacity(steps.len() + 1);
        offsets.push(0);
        offsets.extend_from_slice(steps);
        Self(offsets)
    }

    /// Sorts, deduplicates and forces the implicit root.
    ///
    /// Returns `None` when there is nothing to normalize, which callers treat
    /// as "no answer" rather than as a wrong one.
    pub fn normalize<I>(offsets: I) -> Option<Self>
    where
        I: IntoIterator<Item = Offset>,
    {
        let mut values: Vec<Offset> = offsets.into_iter().collect();
        if values.is_empty() {
            return None;
        }
        values.sort_unstable();
        values.dedup();
        if values[0] != 0 {
            values.insert(0, 0);
        }
        Some(Self(values))
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.0
    }

    /// Largest offset, the distance from the root to the top note.
    pub fn span(&self) -> Offset {
        self.0.last().copied().unwrap_or(0)
    }

    pub fn cardinality(&self) -> usize {
        self.0.len()
    }

    /// Concrete pitches over `root`, keeping only those inside `[low, high]`.
    pub fn voiced(&self, root: Pitch, low: Pitch, high: Pitch) -> Vec<Pitch> {
        voice_offsets(&self.0, root, low, high)
    }
}

/// Adds each offset to `root` and drops results that overflow or fall
/// outside the register.
pub fn voice_offsets(offsets: &[Offset], root: Pitch, low: Pitch, high: Pitch) -> Vec<Pitch> {
    offsets
        .iter()
        .filter_map(|&offset| u32::from(root).checked_add(offset))
        .filter(|&pitch| pitch >= u32::from(low) && pitch <= u32::from(high))
        .map(|pitch| pitch as Pitch)
        .collect()
}

impl TryFrom<Vec<Offset>> for Shape {
    type Error = DomainError;

    fn try_from(offsets: Vec<Offset>) -> Result<Self, Self::Error> {
        Self::new(offsets)
    }
}

impl From<Shape> for Vec<Offset> {
    fn from(shape: Shape) -> Self {
        shape.0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (index, offset) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{offset}")?;
        }
        write!(f, ")")
    }
}
