use crate::config::{Settings, DIGIT_RANGE};
use itertools::Itertools;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("a sequence needs at least one number")]
    Empty,
    #[error("{value} has more than {max_digits} digits")]
    TooLarge { value: i64, max_digits: u32 },
}

/// An ordered list of signed terms and the sum a user is asked to recall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    terms: Vec<i64>,
    target_sum: i64,
}

impl Sequence {
    /// Build a sequence from trusted terms. The sum saturates instead of
    /// overflowing; use [`Sequence::try_from_terms`] for user input.
    pub fn from_terms(terms: Vec<i64>) -> Self {
        let target_sum = terms.iter().fold(0_i64, |acc, &t| acc.saturating_add(t));
        Self { terms, target_sum }
    }

    /// Build a practice drill from user supplied terms. Every magnitude must
    /// fit the largest digit count a generated sequence can have.
    pub fn try_from_terms(terms: Vec<i64>) -> Result<Self, SequenceError> {
        if terms.is_empty() {
            return Err(SequenceError::Empty);
        }
        let max_digits = *DIGIT_RANGE.end();
        let (_, max) = magnitude_bounds(max_digits);
        if let Some(&value) = terms.iter().find(|t| t.unsigned_abs() > max as u64) {
            return Err(SequenceError::TooLarge { value, max_digits });
        }
        Ok(Self::from_terms(terms))
    }

    pub fn terms(&self) -> &[i64] {
        &self.terms
    }

    pub fn get(&self, idx: usize) -> Option<i64> {
        self.terms.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn target_sum(&self) -> i64 {
        self.target_sum
    }

    /// Signed expression such as `4 + 7 - 2`.
    pub fn expression(&self) -> String {
        self.terms
            .iter()
            .enumerate()
            .map(|(idx, &term)| match (idx, term < 0) {
                (0, _) => term.to_string(),
                (_, true) => format!("- {}", term.unsigned_abs()),
                (_, false) => format!("+ {term}"),
            })
            .join(" ")
    }
}

/// Inclusive magnitude bounds for numbers with `digits` decimal digits.
pub fn magnitude_bounds(digits: u32) -> (i64, i64) {
    let digits = digits.max(1);
    (10_i64.pow(digits - 1), 10_i64.pow(digits) - 1)
}

/// Draw a fresh sequence for `settings`.
///
/// With subtraction enabled every term after the first is negated with
/// probability one half, but only when the running total can absorb it. A
/// rejected negation leaves the term positive; it is never redrawn.
pub fn generate<R: Rng + ?Sized>(settings: &Settings, rng: &mut R) -> Sequence {
    let (min, max) = magnitude_bounds(settings.digit_count());
    let mut terms = Vec::with_capacity(settings.item_count());
    let mut running = 0_i64;

    for idx in 0..settings.item_count() {
        let magnitude = rng.gen_range(min..=max);
        let negate = settings.allow_subtraction()
            && idx > 0
            && rng.gen_bool(0.5)
            && running - magnitude >= 0;

        let term = if negate { -magnitude } else { magnitude };
        running += term;
        terms.push(term);
    }

    Sequence {
        terms,
        target_sum: running,
    }
}
