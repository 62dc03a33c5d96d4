pub mod analytics;
pub mod grading;
pub mod sampler;
pub mod session;
pub mod stats;
pub mod universe;

pub use analytics::FeedbackSummary;
pub use grading::{GradingEngine, Verdict};
pub use sampler::AdaptiveSampler;
pub use session::{Submission, Trainer, Trial, TrialState};
pub use stats::{AimCounting, ShapeStats, StatsCache};
pub use universe::{generate, Universe};
