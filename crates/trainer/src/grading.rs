use earshot_domain::{Offset, Shape};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    pub correct: bool,
    pub truth: Shape,
    pub guess: Shape,
}

pub struct GradingEngine;

impl GradingEngine {
    /// Reads free text such as `"0, 4, 7"` or `"7 4"` into a normalized shape.
    ///
    /// Tokens are split on commas and whitespace; anything that is not a
    /// non-negative integer is dropped. Returns `None` when no token survives.
    pub fn parse(&self, text: &str) -> Option<Shape> {
        Shape::normalize(
            text.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|token| !token.is_empty())
                .filter_map(|token| token.parse::<Offset>().ok()),
        )
    }

    /// Exact set equality after normalization.
    pub fn grade(&self, truth: &Shape, guess: Shape) -> Verdict {
        Verdict {
            correct: *truth == guess,
            truth: truth.clone(),
            guess,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triad() -> Shape {
        Shape::from_steps(&[4, 7])
    }

    #[test]
    fn parses_with_commas_and_spaces() {
        let engine = GradingEngine;
        assert_eq!(engine.parse("0, 4, 7"), Some(triad()));
        assert_eq!(engine.parse("  0,4 ,7\t"), Some(triad()));
    }

    #[test]
    fn missing_root_is_implied() {
        let engine = GradingEngine;
        assert_eq!(engine.parse("4 7"), engine.parse("0 4 7"));
    }

    #[test]
    fn duplicates_and_order_do_not_matter() {
        assert_eq!(GradingEngine.parse("7 4 7 4"), Some(triad()));
    }

    #[test]
    fn garbage_is_no_answer() {
        let engine = GradingEngine;
        assert_eq!(engine.parse(""), None);
        assert_eq!(engine.parse("abc"), None);
        assert_eq!(engine.parse(" , ,"), None);
        assert_eq!(engine.parse("x 4 -3 y 7"), Some(triad()));
    }

    #[test]
    fn grading_is_exact() {
        let engine = GradingEngine;
        let right = engine.grade(&triad(), engine.parse("4,7").unwrap());
        assert!(right.correct);
        let wrong = engine.grade(&triad(), engine.parse("3 7").unwrap());
        assert!(!wrong.correct);
        assert_eq!(wrong.guess, Shape::from_steps(&[3, 7]));
        let superset = engine.grade(&triad(), engine.parse("4 7 11").unwrap());
        assert!(!superset.correct);
    }
}
