use earshot_domain::{Settings, Shape};
use rand::Rng;
use tracing::trace;

use crate::stats::StatsCache;

/// Scale of the random tie-breaking term added to every weight.
const JITTER: f64 = 1e-9;
/// Below this total mass, weighted sampling degenerates to uniform.
const NEGLIGIBLE_MASS: f64 = 1e-12;

/// Chooses the next shape to practise.
///
/// With probability `mix_ratio` a shape is drawn in proportion to how far
/// its rolling accuracy sits below the aim; otherwise the draw is uniform.
/// Mastered shapes keep only the jitter weight, so they stay reachable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdaptiveSampler {
    pub mix_ratio: f64,
}

impl AdaptiveSampler {
    pub fn new(mix_ratio: f64) -> Self {
        Self { mix_ratio }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.mix_ratio)
    }

    pub fn pick<'a, R: Rng + ?Sized>(&self, cache: &'a StatsCache, rng: &mut R) -> Option<&'a Shape> {
        let universe = cache.universe();
        if universe.is_empty() {
            return None;
        }
        if rng.gen::<f64>() >= self.mix_ratio {
            trace!("uniform draw");
            return universe.get(rng.gen_range(0..universe.len()));
        }

        let aim = cache.aim();
        let win = cache.win();
        let weights: Vec<f64> = cache
            .stats()
            .iter()
            .map(|entry| (aim - entry.accuracy(win)).max(0.0) + rng.gen::<f64>() * JITTER)
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= NEGLIGIBLE_MASS {
            trace!(total, "negligible mass; uniform draw");
            return universe.get(rng.gen_range(0..universe.len()));
        }

        let mut target = rng.gen::<f64>() * total;
        for (position, weight) in weights.iter().enumerate() {
            if target < *weight {
                return universe.get(position);
            }
            target -= weight;
        }
        universe.get(universe.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earshot_domain::OutcomeEntry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn mastered_log(shape: &Shape, times: usize) -> Vec<OutcomeEntry> {
        (0..times)
            .map(|_| OutcomeEntry {
                shape: shape.clone(),
                guess: shape.clone(),
                correct: true,
            })
            .collect()
    }

    fn dyad_settings() -> Settings {
        Settings {
            card_min: 2,
            card_max: 2,
            span_min: 1,
            span_max: 4,
            ..Settings::default()
        }
    }

    #[test]
    fn empty_universe_gives_nothing() {
        let settings = Settings {
            card_min: 4,
            card_max: 4,
            span_max: 2,
            ..Settings::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let cache = StatsCache::rebuild(None, &settings, &[], &mut rng);
        assert!(AdaptiveSampler::new(1.0).pick(&cache, &mut rng).is_none());
    }

    #[test]
    fn weighted_draws_prefer_weak_shapes() {
        let settings = dyad_settings();
        let mastered = Shape::from_steps(&[1]);
        let weak = Shape::from_steps(&[2]);
        let mut rng = StdRng::seed_from_u64(42);
        let cache = StatsCache::rebuild(None, &settings, &mastered_log(&mastered, 10), &mut rng);
        assert!(cache.accuracy(&mastered).unwrap() >= settings.aim);

        let sampler = AdaptiveSampler::new(1.0);
        let mut counts: HashMap<Shape, usize> = HashMap::new();
        for _ in 0..4_000 {
            let shape = sampler.pick(&cache, &mut rng).unwrap();
            *counts.entry(shape.clone()).or_default() += 1;
        }
        let weak_draws = counts.get(&weak).copied().unwrap_or(0);
        let mastered_draws = counts.get(&mastered).copied().unwrap_or(0);
        assert!(weak_draws > 500);
        assert!(weak_draws > mastered_draws * 10);
    }

    #[test]
    fn uniform_draws_reach_every_shape() {
        let settings = dyad_settings();
        let mastered = Shape::from_steps(&[1]);
        let mut rng = StdRng::seed_from_u64(9);
        let cache = StatsCache::rebuild(None, &settings, &mastered_log(&mastered, 10), &mut rng);

        let sampler = AdaptiveSampler::new(0.0);
        let mut counts: HashMap<Shape, usize> = HashMap::new();
        for _ in 0..4_000 {
            let shape = sampler.pick(&cache, &mut rng).unwrap();
            *counts.entry(shape.clone()).or_default() += 1;
        }
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&count| count > 800));
    }

    #[test]
    fn all_mastered_still_draws() {
        let settings = Settings {
            card_min: 2,
            card_max: 2,
            span_min: 3,
            span_max: 3,
            ..Settings::default()
        };
        let only = Shape::from_steps(&[3]);
        let mut rng = StdRng::seed_from_u64(3);
        let cache = StatsCache::rebuild(None, &settings, &mastered_log(&only, 10), &mut rng);
        let sampler = AdaptiveSampler::new(1.0);
        assert_eq!(sampler.pick(&cache, &mut rng), Some(&only));
    }
}
