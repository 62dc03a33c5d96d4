use earshot_audio::ChordPlayer;
use earshot_domain::{
    shape::voice_offsets, Offset, OutcomeEntry, Pitch, Settings, SettingsOverrides, Shape,
    UserRecord,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::analytics::FeedbackSummary;
use crate::grading::{GradingEngine, Verdict};
use crate::sampler::AdaptiveSampler;
use crate::stats::StatsCache;
use crate::universe::Universe;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrialState {
    Idle,
    AwaitingAnswer,
    Answered,
}

/// One question: a shape voiced over a concrete root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trial {
    pub shape: Shape,
    pub root: Pitch,
    /// Sounding pitches, already limited to the register.
    pub pitches: Vec<Pitch>,
    pub answered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Nothing usable in the text; the trial stays open and nothing is logged.
    NoAnswer,
    Graded(Verdict),
}

/// Owns the settings, outcome log, statistics and current trial of one user.
///
/// Every operation runs to completion before the next; callers sharing a
/// trainer across threads must serialize access to it.
pub struct Trainer<P, R = StdRng> {
    settings: Settings,
    cache: StatsCache,
    log: Vec<OutcomeEntry>,
    current: Option<Trial>,
    player: P,
    rng: R,
    grader: GradingEngine,
}

impl<P: ChordPlayer> Trainer<P, StdRng> {
    pub fn new(player: P, record: UserRecord) -> Self {
        Self::with_rng(player, record, StdRng::from_entropy())
    }
}

impl<P: ChordPlayer, R: Rng> Trainer<P, R> {
    pub fn with_rng(player: P, record: UserRecord, mut rng: R) -> Self {
        let settings = record.settings.reconciled();
        let cache = StatsCache::rebuild(None, &settings, &record.log, &mut rng);
        Self {
            settings,
            cache,
            log: record.log,
            current: None,
            player,
            rng,
            grader: GradingEngine,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn log(&self) -> &[OutcomeEntry] {
        &self.log
    }

    pub fn current(&self) -> Option<&Trial> {
        self.current.as_ref()
    }

    pub fn state(&self) -> TrialState {
        match &self.current {
            None => TrialState::Idle,
            Some(trial) if trial.answered => TrialState::Answered,
            Some(_) => TrialState::AwaitingAnswer,
        }
    }

    pub fn stats(&self) -> &StatsCache {
        &self.cache
    }

    pub fn universe(&self) -> &Universe {
        self.cache.universe()
    }

    pub fn accuracy(&self, shape: &Shape) -> Option<f64> {
        self.cache.accuracy(shape)
    }

    pub fn reached_aim(&self) -> usize {
        self.cache.reached_aim()
    }

    pub fn feedback(&self, shape: Option<&Shape>) -> FeedbackSummary {
        FeedbackSummary::compute(&self.cache, &self.log, shape)
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Current settings and full log, ready for storage.
    pub fn snapshot(&self) -> UserRecord {
        UserRecord::new(self.settings.clone(), self.log.clone())
    }

    pub fn change_settings(&mut self, overrides: &SettingsOverrides) {
        let settings = self.settings.with_overrides(overrides);
        self.replace_settings(settings);
    }

    /// Applies new settings, migrating statistics for shapes that survive.
    ///
    /// An open trial survives unless its shape left the universe; an answered
    /// trial is dropped so the next one follows the new settings.
    #[instrument(skip(self, settings))]
    pub fn replace_settings(&mut self, settings: Settings) {
        let settings = settings.reconciled();
        let previous = std::mem::take(&mut self.cache);
        self.cache = StatsCache::rebuild(Some(previous), &settings, &self.log, &mut self.rng);
        self.settings = settings;

        let stale = self
            .current
            .as_ref()
            .map_or(false, |trial| trial.answered || !self.cache.universe().contains(&trial.shape));
        if stale {
            debug!("discarding trial after settings change");
            self.current = None;
        }
        info!(universe = self.cache.universe().len(), "settings applied");
    }

    /// Switches to another user's settings and history.
    pub fn load_record(&mut self, record: UserRecord) {
        self.settings = record.settings.reconciled();
        self.log = record.log;
        self.current = None;
        self.cache = StatsCache::rebuild(None, &self.settings, &self.log, &mut self.rng);
        info!(log_len = self.log.len(), "record loaded");
    }

    /// Starts a trial, or returns the open one unchanged.
    pub fn next_trial(&mut self) -> Option<&Trial> {
        if self.state() == TrialState::AwaitingAnswer {
            return self.current.as_ref();
        }
        self.current = None;

        let sampler = AdaptiveSampler::from_settings(&self.settings);
        let shape = sampler.pick(&self.cache, &mut self.rng)?.clone();

        let low = i64::from(self.settings.midi_low);
        let high = i64::from(self.settings.midi_high) - i64::from(shape.span());
        if high < low {
            warn!(shape = %shape, "shape does not fit the register");
            return None;
        }
        let root = self.rng.gen_range(low..=high) as Pitch;
        let pitches = shape.voiced(root, self.settings.midi_low, self.settings.midi_high);
        debug!(shape = %shape, root, "new trial");

        self.play(&pitches);
        self.current = Some(Trial {
            shape,
            root,
            pitches,
            answered: false,
        });
        self.current.as_ref()
    }

    pub fn replay(&mut self) {
        let Some(trial) = &self.current else {
            return;
        };
        let register = self.settings.midi_low..=self.settings.midi_high;
        let pitches: Vec<Pitch> = trial
            .pitches
            .iter()
            .copied()
            .filter(|pitch| register.contains(pitch))
            .collect();
        self.play(&pitches);
    }

    /// Plays arbitrary offsets over the current root.
    pub fn play_guess(&mut self, offsets: &[Offset]) {
        let Some(trial) = &self.current else {
            return;
        };
        let pitches = voice_offsets(
            offsets,
            trial.root,
            self.settings.midi_low,
            self.settings.midi_high,
        );
        self.play(&pitches);
    }

    /// Plays the most recently graded guess over the current root.
    pub fn play_last_guess(&mut self) {
        if self.state() != TrialState::Answered {
            return;
        }
        if let Some(last) = self.log.last() {
            let offsets = last.guess.offsets().to_vec();
            self.play_guess(&offsets);
        }
    }

    /// Grades `text` against the open trial.
    ///
    /// `None` when there is no open trial. Unusable text yields
    /// [`Submission::NoAnswer`] and leaves everything untouched.
    pub fn submit_guess(&mut self, text: &str) -> Option<Submission> {
        let trial = self.current.as_mut().filter(|trial| !trial.answered)?;
        let Some(guess) = self.grader.parse(text) else {
            return Some(Submission::NoAnswer);
        };
        let verdict = self.grader.grade(&trial.shape, guess);
        trial.answered = true;

        self.log.push(OutcomeEntry {
            shape: verdict.truth.clone(),
            guess: verdict.guess.clone(),
            correct: verdict.correct,
        });
        let accuracy = self.cache.record(&verdict.truth, verdict.correct, &mut self.rng);
        info!(
            shape = %verdict.truth,
            guess = %verdict.guess,
            correct = verdict.correct,
            ?accuracy,
            "graded guess"
        );
        Some(Submission::Graded(verdict))
    }

    fn play(&mut self, pitches: &[Pitch]) {
        if pitches.is_empty() {
            return;
        }
        if let Err(err) = self.player.stop_all() {
            warn!(%err, "failed to stop playback");
        }
        if let Err(err) = self.player.play_chord(pitches, self.settings.duration) {
            warn!(%err, "failed to play chord");
        }
    }
}
