use std::collections::VecDeque;

use earshot_domain::{OutcomeEntry, Offset, Settings, Shape};
use rand::Rng;
use tracing::{debug, instrument};

use crate::universe::Universe;

/// Above this many shapes the reached-aim count is estimated instead of counted.
pub const LARGE_UNIVERSE_THRESHOLD: usize = 150_000;
/// Shapes inspected per estimate.
pub const ESTIMATE_SAMPLE_SIZE: usize = 2_000;
/// Graded trials between two estimates.
pub const ESTIMATE_REFRESH_INTERVAL: usize = 50;

/// Most recent outcomes for one shape, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShapeStats {
    recent: VecDeque<bool>,
    correct: usize,
}

impl ShapeStats {
    pub fn from_outcomes<I: IntoIterator<Item = bool>>(outcomes: I, win: usize) -> Self {
        let mut stats = Self::default();
        for outcome in outcomes {
            stats.push(outcome, win);
        }
        stats
    }

    /// Appends the newest outcome, dropping the oldest beyond `win`.
    pub fn push(&mut self, correct: bool, win: usize) {
        self.recent.push_back(correct);
        self.correct += usize::from(correct);
        self.truncate(win);
    }

    fn push_older(&mut self, correct: bool) {
        self.recent.push_front(correct);
        self.correct += usize::from(correct);
    }

    fn truncate(&mut self, win: usize) {
        while self.recent.len() > win {
            if let Some(dropped) = self.recent.pop_front() {
                self.correct -= usize::from(dropped);
            }
        }
    }

    /// Adapts a buffer built for `old_win` to `new_win`. Returns true when the
    /// buffer was cleared and must be refilled from the log.
    fn rewindow(&mut self, old_win: usize, new_win: usize) -> bool {
        if new_win <= old_win {
            self.truncate(new_win);
            return false;
        }
        if self.recent.len() < old_win {
            // never full, so it already holds the shape's whole history
            return false;
        }
        *self = Self::default();
        true
    }

    pub fn correct_count(&self) -> usize {
        self.correct
    }

    pub fn recorded(&self) -> usize {
        self.recent.len()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = bool> + '_ {
        self.recent.iter().copied()
    }

    /// Always relative to the full window: missing outcomes count as misses.
    pub fn accuracy(&self, win: usize) -> f64 {
        self.correct as f64 / win.max(1) as f64
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AimCounting {
    #[default]
    Exact,
    Estimated { since_refresh: usize },
}

/// Rolling per-shape statistics over the current universe.
///
/// Derived entirely from the outcome log, so it can be rebuilt at any time.
#[derive(Clone, Debug, Default)]
pub struct StatsCache {
    universe: Universe,
    bounds: (usize, usize, Offset, Offset),
    stats: Vec<ShapeStats>,
    win: usize,
    aim: f64,
    reached: usize,
    counting: AimCounting,
}

impl StatsCache {
    /// Builds the cache for `settings`, reusing what `previous` already knows.
    ///
    /// Shapes kept from the previous universe keep their buffers; anything
    /// new or under-filled is refilled by one backwards pass over `log` that
    /// stops as soon as every pending buffer is full.
    #[instrument(skip(previous, log, rng), fields(log_len = log.len()))]
    pub fn rebuild<R: Rng + ?Sized>(
        previous: Option<StatsCache>,
        settings: &Settings,
        log: &[OutcomeEntry],
        rng: &mut R,
    ) -> Self {
        let bounds = settings.universe_bounds();
        let win = settings.win.max(1);
        let (universe, mut stats, mut pending) = match previous {
            Some(previous) => previous.migrate(settings, win),
            None => {
                let universe = Universe::for_settings(settings);
                let size = universe.len();
                (universe, vec![ShapeStats::default(); size], vec![true; size])
            }
        };
        fill_from_log(&universe, &mut stats, &mut pending, log, win);

        let mut cache = Self {
            universe,
            bounds,
            stats,
            win,
            aim: settings.aim,
            reached: 0,
            counting: AimCounting::Exact,
        };
        cache.recount(rng);
        debug!(
            universe = cache.universe.len(),
            reached = cache.reached,
            counting = ?cache.counting,
            "statistics rebuilt"
        );
        cache
    }

    fn migrate(self, settings: &Settings, win: usize) -> (Universe, Vec<ShapeStats>, Vec<bool>) {
        let old_win = self.win;
        if self.bounds == settings.universe_bounds() {
            let mut stats = self.stats;
            let pending = stats
                .iter_mut()
                .map(|entry| entry.rewindow(old_win, win))
                .collect();
            return (self.universe, stats, pending);
        }

        let universe = Universe::for_settings(settings);
        let mut old_stats = self.stats;
        let mut stats = Vec::with_capacity(universe.len());
        let mut pending = Vec::with_capacity(universe.len());
        for shape in universe.shapes() {
            match self.universe.position(shape) {
                Some(old) => {
                    let mut carried = std::mem::take(&mut old_stats[old]);
                    pending.push(carried.rewindow(old_win, win));
                    stats.push(carried);
                }
                None => {
                    stats.push(ShapeStats::default());
                    pending.push(true);
                }
            }
        }
        (universe, stats, pending)
    }

    /// Applies one graded outcome. Returns the shape's new accuracy, or `None`
    /// if the shape is outside the universe.
    pub fn record<R: Rng + ?Sized>(&mut self, shape: &Shape, correct: bool, rng: &mut R) -> Option<f64> {
        let position = self.universe.position(shape)?;
        let before = self.reaches_aim(&self.stats[position]);
        self.stats[position].push(correct, self.win);
        let after = self.reaches_aim(&self.stats[position]);

        if before != after {
            self.reached = if after {
                (self.reached + 1).min(self.universe.len())
            } else {
                self.reached.saturating_sub(1)
            };
        }
        if let AimCounting::Estimated { since_refresh } = &mut self.counting {
            *since_refresh += 1;
            if *since_refresh >= ESTIMATE_REFRESH_INTERVAL {
                self.recount(rng);
            }
        }
        Some(self.stats[position].accuracy(self.win))
    }

    fn recount<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.universe.len() <= LARGE_UNIVERSE_THRESHOLD {
            self.reached = self.exact_reached();
            self.counting = AimCounting::Exact;
        } else {
            self.reached = self.estimate_reached(rng);
            self.counting = AimCounting::Estimated { since_refresh: 0 };
        }
    }

    fn estimate_reached<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let size = self.universe.len();
        if size == 0 {
            return 0;
        }
        let hits = (0..ESTIMATE_SAMPLE_SIZE)
            .filter(|_| self.reaches_aim(&self.stats[rng.gen_range(0..size)]))
            .count();
        let fraction = hits as f64 / ESTIMATE_SAMPLE_SIZE as f64;
        ((fraction * size as f64).round() as usize).min(size)
    }

    /// Full scan; what the cached count tracks in exact mode.
    pub fn exact_reached(&self) -> usize {
        self.stats
            .iter()
            .filter(|entry| self.reaches_aim(entry))
            .count()
    }

    fn reaches_aim(&self, stats: &ShapeStats) -> bool {
        stats.accuracy(self.win) >= self.aim
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Per-shape statistics in universe order.
    pub fn stats(&self) -> &[ShapeStats] {
        &self.stats
    }

    pub fn get(&self, shape: &Shape) -> Option<&ShapeStats> {
        self.universe
            .position(shape)
            .and_then(|position| self.stats.get(position))
    }

    pub fn accuracy(&self, shape: &Shape) -> Option<f64> {
        self.get(shape).map(|entry| entry.accuracy(self.win))
    }

    /// Lowest accuracy over the universe, `None` when it is empty.
    pub fn min_accuracy(&self) -> Option<f64> {
        self.stats
            .iter()
            .map(|entry| entry.accuracy(self.win))
            .reduce(f64::min)
    }

    pub fn reached_aim(&self) -> usize {
        self.reached
    }

    pub fn counting(&self) -> AimCounting {
        self.counting
    }

    pub fn win(&self) -> usize {
        self.win
    }

    pub fn aim(&self) -> f64 {
        self.aim
    }
}

fn fill_from_log(
    universe: &Universe,
    stats: &mut [ShapeStats],
    pending: &mut [bool],
    log: &[OutcomeEntry],
    win: usize,
) {
    let mut remaining = pending.iter().filter(|flag| **flag).count();
    if remaining == 0 {
        return;
    }
    for entry in log.iter().rev() {
        let Some(position) = universe.position(&entry.shape) else {
            continue;
        };
        if !pending[position] {
            continue;
        }
        stats[position].push_older(entry.correct);
        if stats[position].recorded() >= win {
            pending[position] = false;
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn entry(steps: &[Offset], correct: bool) -> OutcomeEntry {
        let shape = Shape::from_steps(steps);
        OutcomeEntry {
            guess: shape.clone(),
            shape,
            correct,
        }
    }

    #[test]
    fn rolling_window_drops_oldest() {
        let mut stats = ShapeStats::from_outcomes([true, true, false], 2);
        assert_eq!(stats.recorded(), 2);
        assert_eq!(stats.correct_count(), 1);
        stats.push(true, 2);
        assert_eq!(stats.outcomes().collect::<Vec<_>>(), vec![false, true]);
    }

    #[test]
    fn accuracy_divides_by_window() {
        let stats = ShapeStats::from_outcomes([true], 10);
        assert_relative_eq!(stats.accuracy(10), 0.1);
    }

    #[test]
    fn rebuild_reads_latest_outcomes_from_log() {
        let settings = Settings {
            win: 3,
            ..Settings::default()
        };
        let log = vec![
            entry(&[4, 7], true),
            entry(&[4, 7], false),
            entry(&[3, 7], true),
            entry(&[4, 7], true),
            entry(&[4, 7], true),
        ];
        let cache = StatsCache::rebuild(None, &settings, &log, &mut rng());
        let triad = cache.get(&Shape::from_steps(&[4, 7])).unwrap();
        assert_eq!(triad.outcomes().collect::<Vec<_>>(), vec![false, true, true]);
        assert_relative_eq!(cache.accuracy(&Shape::from_steps(&[3, 7])).unwrap(), 1.0 / 3.0);
        assert_eq!(cache.accuracy(&Shape::from_steps(&[2, 3, 4])), None);
    }

    #[test]
    fn exact_count_tracks_threshold_crossings() {
        let settings = Settings {
            win: 2,
            aim: 1.0,
            ..Settings::default()
        };
        let mut rng = rng();
        let mut cache = StatsCache::rebuild(None, &settings, &[], &mut rng);
        let triad = Shape::from_steps(&[4, 7]);
        assert_eq!(cache.reached_aim(), 0);

        cache.record(&triad, true, &mut rng);
        assert_eq!(cache.reached_aim(), 0);
        cache.record(&triad, true, &mut rng);
        assert_eq!(cache.reached_aim(), 1);
        cache.record(&triad, false, &mut rng);
        assert_eq!(cache.reached_aim(), 0);
        assert_eq!(cache.reached_aim(), cache.exact_reached());
        assert_eq!(cache.counting(), AimCounting::Exact);
    }

    #[test]
    fn zero_aim_counts_everything() {
        let settings = Settings {
            aim: 0.0,
            ..Settings::default()
        };
        let cache = StatsCache::rebuild(None, &settings, &[], &mut rng());
        assert_eq!(cache.reached_aim(), cache.universe().len());
    }

    #[test]
    fn record_outside_universe_is_ignored() {
        let mut rng = rng();
        let mut cache = StatsCache::rebuild(None, &Settings::default(), &[], &mut rng);
        assert_eq!(cache.record(&Shape::from_steps(&[5]), true, &mut rng), None);
    }

    #[test]
    fn migration_preserves_surviving_buffers() {
        let mut rng = rng();
        let settings = Settings::default();
        let triad = Shape::from_steps(&[4, 7]);
        let log = vec![entry(&[4, 7], true), entry(&[4, 7], false)];
        let mut cache = StatsCache::rebuild(None, &settings, &log, &mut rng);
        cache.record(&triad, true, &mut rng);
        let before = cache.get(&triad).cloned().unwrap();

        let widened = Settings {
            card_min: 2,
            span_max: 14,
            ..settings
        };
        let migrated = StatsCache::rebuild(Some(cache), &widened, &log, &mut rng);
        assert_eq!(migrated.get(&triad), Some(&before));
        assert!(migrated.universe().len() > 66);
    }

    #[test]
    fn growing_window_refills_full_buffers_from_log() {
        let mut rng = rng();
        let small = Settings {
            win: 2,
            ..Settings::default()
        };
        let log = vec![
            entry(&[4, 7], true),
            entry(&[4, 7], true),
            entry(&[4, 7], false),
            entry(&[3, 7], true),
        ];
        let cache = StatsCache::rebuild(None, &small, &log, &mut rng);
        let grown = StatsCache::rebuild(
            Some(cache),
            &Settings {
                win: 4,
                ..Settings::default()
            },
            &log,
            &mut rng,
        );
        let triad = grown.get(&Shape::from_steps(&[4, 7])).unwrap();
        assert_eq!(triad.outcomes().collect::<Vec<_>>(), vec![true, true, false]);
        let minor = grown.get(&Shape::from_steps(&[3, 7])).unwrap();
        assert_eq!(minor.outcomes().collect::<Vec<_>>(), vec![true]);
    }

    #[test]
    fn shrinking_window_keeps_newest() {
        let mut rng = rng();
        let log = vec![
            entry(&[4, 7], false),
            entry(&[4, 7], true),
            entry(&[4, 7], true),
        ];
        let cache = StatsCache::rebuild(None, &Settings::default(), &log, &mut rng);
        let shrunk = StatsCache::rebuild(
            Some(cache),
            &Settings {
                win: 2,
                ..Settings::default()
            },
            &log,
            &mut rng,
        );
        let triad = shrunk.get(&Shape::from_steps(&[4, 7])).unwrap();
        assert_eq!(triad.correct_count(), 2);
        assert_relative_eq!(shrunk.accuracy(&Shape::from_steps(&[4, 7])).unwrap(), 1.0);
    }

    fn large_settings(aim: f64, win: usize) -> Settings {
        Settings {
            midi_low: 20,
            midi_high: 100,
            card_min: 5,
            card_max: 5,
            span_min: 0,
            span_max: 46,
            aim,
            win,
            ..Settings::default()
        }
    }

    #[test]
    fn large_universe_is_estimated() {
        let settings = large_settings(0.0, 10);
        let mut rng = rng();
        let mut cache = StatsCache::rebuild(None, &settings, &[], &mut rng);
        assert!(cache.universe().len() > LARGE_UNIVERSE_THRESHOLD);
        assert_eq!(cache.counting(), AimCounting::Estimated { since_refresh: 0 });
        // aim 0 means every sampled shape is a hit
        assert_eq!(cache.reached_aim(), cache.universe().len());

        let shape = cache.universe().shapes()[0].clone();
        cache.record(&shape, false, &mut rng);
        assert_eq!(cache.counting(), AimCounting::Estimated { since_refresh: 1 });
    }

    #[test]
    fn estimate_refreshes_after_interval() {
        let settings = large_settings(0.0, 10);
        let mut rng = rng();
        let mut cache = StatsCache::rebuild(None, &settings, &[], &mut rng);
        let size = cache.universe().len();
        let shape = cache.universe().shapes()[0].clone();
        for graded in 1..ESTIMATE_REFRESH_INTERVAL {
            cache.record(&shape, true, &mut rng);
            assert_eq!(cache.counting(), AimCounting::Estimated { since_refresh: graded });
        }

        // a stale count only survives until the next estimate
        cache.reached = 0;
        cache.record(&shape, true, &mut rng);
        assert_eq!(cache.counting(), AimCounting::Estimated { since_refresh: 0 });
        assert_eq!(cache.reached_aim(), size);
    }

    #[test]
    fn estimate_is_nudged_on_threshold_crossings() {
        let settings = large_settings(1.0, 1);
        let mut rng = rng();
        let mut cache = StatsCache::rebuild(None, &settings, &[], &mut rng);
        assert!(matches!(cache.counting(), AimCounting::Estimated { .. }));
        assert_eq!(cache.reached_aim(), 0);

        let shape = cache.universe().shapes()[7].clone();
        cache.record(&shape, true, &mut rng);
        assert_eq!(cache.reached_aim(), 1);
        cache.record(&shape, true, &mut rng);
        assert_eq!(cache.reached_aim(), 1);
        cache.record(&shape, false, &mut rng);
        assert_eq!(cache.reached_aim(), 0);
        assert_eq!(cache.counting(), AimCounting::Estimated { since_refresh: 3 });
    }
}
