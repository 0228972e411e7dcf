//! Fixed-width column bit sets.
//!
//! A `ColumnSet` answers "is column `i` in the set" for `i` in `0..width`.
//! Active sets over a combined schema and dependency sets over an input schema
//! are both `ColumnSet`s; the width is part of the value and is checked
//! wherever two sets meet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const WORD_BITS: usize = 64;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawColumnSet")]
pub struct ColumnSet {
    width: usize,
    words: Vec<u64>,
}

/// Unchecked wire form; `ColumnSet` only deserializes through `try_from`.
#[derive(Deserialize)]
struct RawColumnSet {
    width: usize,
    words: Vec<u64>,
}

impl TryFrom<RawColumnSet> for ColumnSet {
    type Error = Error;

    fn try_from(raw: RawColumnSet) -> Result<Self> {
        let expected = raw.width.div_ceil(WORD_BITS);
        if raw.words.len() != expected {
            return Err(Error::Codec(format!(
                "column set of width {} needs {expected} words, got {}",
                raw.width,
                raw.words.len()
            )));
        }
        let tail = raw.width % WORD_BITS;
        if tail != 0 && raw.words[expected - 1] >> tail != 0 {
            return Err(Error::Codec(format!(
                "column set has members past width {}",
                raw.width
            )));
        }
        Ok(Self {
            width: raw.width,
            words: raw.words,
        })
    }
}

impl ColumnSet {
    /// Set of `width` columns with no members.
    pub fn empty(width: usize) -> Self {
        Self {
            width,
            words: vec![0; width.div_ceil(WORD_BITS)],
        }
    }

    /// Set of `width` columns with every member.
    pub fn all(width: usize) -> Self {
        Self::from_fn(width, |_| true)
    }

    /// Evaluate `pred` once per column index.
    pub fn from_fn(width: usize, mut pred: impl FnMut(usize) -> bool) -> Self {
        let mut set = Self::empty(width);
        for idx in 0..width {
            if pred(idx) {
                set.words[idx / WORD_BITS] |= 1u64 << (idx % WORD_BITS);
            }
        }
        set
    }

    /// Fails on any index at or past `width`.
    pub fn from_indices(width: usize, indices: impl IntoIterator<Item = usize>) -> Result<Self> {
        let mut set = Self::empty(width);
        for idx in indices {
            if idx >= width {
                return Err(Error::Usage(format!(
                    "column {idx} out of range for a set of width {width}"
                )));
            }
            set.words[idx / WORD_BITS] |= 1u64 << (idx % WORD_BITS);
        }
        Ok(set)
    }

    /// Number of addressable columns, members or not.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Out-of-range indices are never members.
    pub fn contains(&self, idx: usize) -> bool {
        idx < self.width && self.words[idx / WORD_BITS] & (1u64 << (idx % WORD_BITS)) != 0
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.width).filter(move |idx| self.contains(*idx))
    }

    pub fn union(&self, other: &ColumnSet) -> Result<ColumnSet> {
        other.ensure_width(self.width, "union operand")?;
        Ok(Self {
            width: self.width,
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a | b)
                .collect(),
        })
    }

    pub fn ensure_width(&self, expected: usize, what: &str) -> Result<()> {
        if self.width != expected {
            return Err(Error::Usage(format!(
                "{what} has width {}, expected {expected}",
                self.width
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ColumnSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColumnSet<{}>", self.width)?;
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_across_word_boundary() {
        let set = ColumnSet::from_indices(130, [0, 63, 64, 129]).unwrap();
        assert_eq!(set.count(), 4);
        assert!(set.contains(63) && set.contains(64) && set.contains(129));
        assert!(!set.contains(1));
        assert!(!set.contains(500));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 63, 64, 129]);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        assert!(matches!(
            ColumnSet::from_indices(3, [3]),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn union_requires_equal_width() {
        let a = ColumnSet::from_indices(4, [0]).unwrap();
        let b = ColumnSet::from_indices(4, [2]).unwrap();
        let u = a.union(&b).unwrap();
        assert_eq!(u.iter().collect::<Vec<_>>(), vec![0, 2]);
        assert!(a.union(&ColumnSet::empty(5)).is_err());
    }

    #[test]
    fn deserialize_checks_words_against_width() {
        let set = ColumnSet::from_indices(70, [3, 69]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(serde_json::from_str::<ColumnSet>(&json).unwrap(), set);

        assert!(serde_json::from_str::<ColumnSet>(r#"{"width":70,"words":[]}"#).is_err());
        assert!(serde_json::from_str::<ColumnSet>(r#"{"width":3,"words":[8]}"#).is_err());
        assert!(serde_json::from_str::<ColumnSet>(r#"{"width":3,"words":[5]}"#).is_ok());
    }

    #[test]
    fn empty_and_all() {
        assert!(ColumnSet::empty(10).is_empty());
        assert_eq!(ColumnSet::all(10).count(), 10);
        assert!(ColumnSet::all(0).is_empty());
    }
}
