use std::fmt;

use earshot_domain::{OutcomeEntry, Shape};
use serde::{Deserialize, Serialize};

use crate::stats::StatsCache;

/// Progress figures shown after a graded guess.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackSummary {
    /// Correct answers in the window of the graded shape, if one was given.
    pub rolling_correct: Option<usize>,
    /// Weakest shape's correct answers, rounded to whole trials.
    pub minimum_correct: usize,
    pub win: usize,
    /// Share of all logged answers that were right, in whole percent.
    pub overall_percent: u32,
    pub reached_aim: usize,
    pub universe_size: usize,
}

impl FeedbackSummary {
    pub fn compute(cache: &StatsCache, log: &[OutcomeEntry], shape: Option<&Shape>) -> Self {
        let win = cache.win();
        let rolling_correct = shape
            .and_then(|shape| cache.get(shape))
            .map(|stats| stats.correct_count());
        let minimum = cache.min_accuracy().unwrap_or(1.0);
        let correct = log.iter().filter(|entry| entry.correct).count();
        let overall_percent = if log.is_empty() {
            0
        } else {
            (correct as f64 * 100.0 / log.len() as f64).round() as u32
        };
        Self {
            rolling_correct,
            minimum_correct: (minimum * win as f64).round() as usize,
            win,
            overall_percent,
            reached_aim: cache.reached_aim(),
            universe_size: cache.universe().len(),
        }
    }
}

impl fmt::Display for FeedbackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(correct) = self.rolling_correct {
            writeln!(f, "Rolling accuracy: {:>2}/{}", correct, self.win)?;
        }
        writeln!(f, "Minimum accuracy: {:>2}/{}", self.minimum_correct, self.win)?;
        writeln!(f, "Overall accuracy: {:>3}%", self.overall_percent)?;
        write!(
            f,
            "Reached aim:      {}/{} shapes",
            self.reached_aim, self.universe_size
        )
    }
}
