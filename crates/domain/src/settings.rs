use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::{DomainError, Offset, Pitch};

pub const MIDI_ABS_LOW: Pitch = 20;
pub const MIDI_ABS_HIGH: Pitch = 100;
/// Largest chord size offered for practice.
pub const MAX_CARDINALITY: usize = 5;

const MAX_SPAN: Offset = (MIDI_ABS_HIGH - MIDI_ABS_LOW) as Offset;
const MIN_DURATION_SECS: f32 = 0.05;
const MAX_DURATION_SECS: f32 = 30.0;
const RECONCILE_PASSES: usize = 8;

/// Trainer configuration.
///
/// | field        | default | meaning                                        |
/// |--------------|---------|------------------------------------------------|
/// | `midi_low`   | 48      | lowest pitch that may sound                    |
/// | `midi_high`  | 72      | highest pitch that may sound                   |
/// | `card_min`   | 3       | fewest notes per shape                         |
/// | `card_max`   | 3       | most notes per shape                           |
/// | `span_min`   | 0       | smallest root-to-top distance in semitones     |
/// | `span_max`   | 12      | largest root-to-top distance in semitones      |
/// | `mix_ratio`  | 0.5     | probability of accuracy-weighted sampling      |
/// | `aim`        | 0.8     | rolling accuracy counted as mastered           |
/// | `win`        | 10      | outcomes kept per shape for rolling accuracy   |
/// | `duration`   | 2.5     | playback length in seconds                     |
///
/// Missing keys in persisted JSON fall back to these defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub midi_low: Pitch,
    pub midi_high: Pitch,
    pub card_min: usize,
    pub card_max: usize,
    pub span_min: Offset,
    pub span_max: Offset,
    pub mix_ratio: f64,
    pub aim: f64,
    pub win: usize,
    pub duration: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            midi_low: 48,
            midi_high: 72,
            card_min: 3,
            card_max: 3,
            span_min: 0,
            span_max: 12,
            mix_ratio: 0.5,
            aim: 0.8,
            win: 10,
            duration: 2.5,
        }
    }
}

impl Settings {
    pub fn with_overrides(&self, overrides: &SettingsOverrides) -> Self {
        Self {
            midi_low: overrides.midi_low.unwrap_or(self.midi_low),
            midi_high: overrides.midi_high.unwrap_or(self.midi_high),
            card_min: overrides.card_min.unwrap_or(self.card_min),
            card_max: overrides.card_max.unwrap_or(self.card_max),
            span_min: overrides.span_min.unwrap_or(self.span_min),
            span_max: overrides.span_max.unwrap_or(self.span_max),
            mix_ratio: overrides.mix_ratio.unwrap_or(self.mix_ratio),
            aim: overrides.aim.unwrap_or(self.aim),
            win: overrides.win.unwrap_or(self.win),
            duration: overrides.duration.unwrap_or(self.duration),
        }
    }

    /// Cardinality and span bounds; the universe only changes when these do.
    pub fn universe_bounds(&self) -> (usize, usize, Offset, Offset) {
        (self.card_min, self.card_max, self.span_min, self.span_max)
    }

    /// Brings every field back inside the ranges a settings form would offer.
    ///
    /// Out-of-range fields fall back to the lowest selectable value, the same
    /// way a select box falls back to its first option. Ranges depend on each
    /// other, so snapping repeats until nothing moves.
    pub fn reconciled(mut self) -> Self {
        self.clamp_scalars();
        for _ in 0..RECONCILE_PASSES {
            let next = SettingRanges::compute(&self).apply(&self);
            if next == self {
                break;
            }
            self = next;
        }
        self
    }

    fn clamp_scalars(&mut self) {
        let defaults = Settings::default();
        self.midi_low = self.midi_low.clamp(MIDI_ABS_LOW, MIDI_ABS_HIGH);
        self.midi_high = self.midi_high.clamp(MIDI_ABS_LOW, MIDI_ABS_HIGH);
        self.card_min = self.card_min.clamp(1, MAX_CARDINALITY);
        self.card_max = self.card_max.clamp(1, MAX_CARDINALITY);
        self.span_min = self.span_min.min(MAX_SPAN);
        self.span_max = self.span_max.min(MAX_SPAN);
        self.mix_ratio = unit_or(self.mix_ratio, defaults.mix_ratio);
        self.aim = unit_or(self.aim, defaults.aim);
        self.win = self.win.max(1);
        self.duration = if self.duration.is_finite() && self.duration > 0.0 {
            self.duration.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
        } else {
            defaults.duration
        };
    }
}

fn unit_or(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Partial settings, e.g. from a config file or a single form edit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsOverrides {
    pub midi_low: Option<Pitch>,
    pub midi_high: Option<Pitch>,
    pub card_min: Option<usize>,
    pub card_max: Option<usize>,
    pub span_min: Option<Offset>,
    pub span_max: Option<Offset>,
    pub mix_ratio: Option<f64>,
    pub aim: Option<f64>,
    pub win: Option<usize>,
    pub duration: Option<f32>,
}

impl SettingsOverrides {
    /// Fields set in `newer` win.
    pub fn merge(self, newer: SettingsOverrides) -> Self {
        Self {
            midi_low: newer.midi_low.or(self.midi_low),
            midi_high: newer.midi_high.or(self.midi_high),
            card_min: newer.card_min.or(self.card_min),
            card_max: newer.card_max.or(self.card_max),
            span_min: newer.span_min.or(self.span_min),
            span_max: newer.span_max.or(self.span_max),
            mix_ratio: newer.mix_ratio.or(self.mix_ratio),
            aim: newer.aim.or(self.aim),
            win: newer.win.or(self.win),
            duration: newer.duration.or(self.duration),
        }
    }

    /// Parses a single `field value` edit. Accepts camelCase or snake_case names.
    pub fn assign(&mut self, field: &str, value: &str) -> Result<(), DomainError> {
        let value = value.trim();
        match field.trim().replace('_', "").to_ascii_lowercase().as_str() {
            "midilow" => self.midi_low = Some(parse_field(field, value)?),
            "midihigh" => self.midi_high = Some(parse_field(field, value)?),
            "cardmin" => self.card_min = Some(parse_field(field, value)?),
            "cardmax" => self.card_max = Some(parse_field(field, value)?),
            "spanmin" => self.span_min = Some(parse_field(field, value)?),
            "spanmax" => self.span_max = Some(parse_field(field, value)?),
            "mixratio" => self.mix_ratio = Some(parse_field(field, value)?),
            "aim" => self.aim = Some(parse_field(field, value)?),
            "win" => self.win = Some(parse_field(field, value)?),
            "duration" => self.duration = Some(parse_field(field, value)?),
            _ => {
                return Err(DomainError::validation(format!(
                    "unknown setting '{field}'"
                )))
            }
        }
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, DomainError> {
    value
        .parse()
        .map_err(|_| DomainError::validation(format!("invalid value '{value}' for {field}")))
}

/// Inclusive list of selectable integer values.
///
/// An inverted range collapses to its lower bound, so there is always at
/// least one option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectRange {
    pub lo: i64,
    pub hi: i64,
}

impl SelectRange {
    pub fn new(lo: i64, hi: i64) -> Self {
        Self { lo, hi: hi.max(lo) }
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.lo..=self.hi).contains(&value)
    }

    /// `value` if selectable, otherwise the first option.
    pub fn snap(&self, value: i64) -> i64 {
        if self.contains(value) {
            value
        } else {
            self.lo
        }
    }

    pub fn values(&self) -> RangeInclusive<i64> {
        self.lo..=self.hi
    }
}

/// Mutually consistent ranges for every editable bound, derived from the
/// current settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettingRanges {
    pub card_min: SelectRange,
    pub card_max: SelectRange,
    pub span_min: SelectRange,
    pub span_max: SelectRange,
    pub midi_low: SelectRange,
    pub midi_high: SelectRange,
}

impl SettingRanges {
    pub fn compute(settings: &Settings) -> Self {
        let card_min = settings.card_min as i64;
        let card_max = settings.card_max as i64;
        let span_max = i64::from(settings.span_max);
        let low = i64::from(settings.midi_low);
        let high = i64::from(settings.midi_high);
        let limit = MAX_CARDINALITY as i64;
        Self {
            card_min: SelectRange::new(2, limit.min(card_max)),
            card_max: SelectRange::new(card_min.max(2), limit.min(span_max + 1)),
            span_max: SelectRange::new((card_max - 1).max(0), high - low),
            span_min: SelectRange::new(0, span_max),
            midi_low: SelectRange::new(i64::from(MIDI_ABS_LOW), high - span_max),
            midi_high: SelectRange::new(low + span_max, i64::from(MIDI_ABS_HIGH)),
        }
    }

    /// Snaps each bound of `settings` into its range. Scalars are left alone.
    pub fn apply(&self, settings: &Settings) -> Settings {
        let pitch = |range: &SelectRange, value: Pitch| {
            range
                .snap(i64::from(value))
                .clamp(i64::from(MIDI_ABS_LOW), i64::from(MIDI_ABS_HIGH)) as Pitch
        };
        let card = |range: &SelectRange, value: usize| {
            range.snap(value as i64).clamp(1, MAX_CARDINALITY as i64) as usize
        };
        let span = |range: &SelectRange, value: Offset| {
            range.snap(i64::from(value)).clamp(0, i64::from(MAX_SPAN)) as Offset
        };
        Settings {
            midi_low: pitch(&self.midi_low, settings.midi_low),
            midi_high: pitch(&self.midi_high, settings.midi_high),
            card_min: card(&self.card_min, settings.card_min),
            card_max: card(&self.card_max, settings.card_max),
            span_min: span(&self.span_min, settings.span_min),
            span_max: span(&self.span_max, settings.span_max),
            ..settings.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_satisfiable(settings: &Settings) {
        let ranges = SettingRanges::compute(settings);
        assert!(ranges.card_min.contains(settings.card_min as i64));
        assert!(ranges.card_max.contains(settings.card_max as i64));
        assert!(ranges.span_min.contains(i64::from(settings.span_min)));
        assert!(ranges.span_max.contains(i64::from(settings.span_max)));
        assert!(ranges.midi_low.contains(i64::from(settings.midi_low)));
        assert!(ranges.midi_high.contains(i64::from(settings.midi_high)));
    }

    #[test]
    fn defaults_are_stable() {
        let settings = Settings::default();
        assert_eq!(settings.clone().reconciled(), settings);
        assert_satisfiable(&settings);
    }

    #[test]
    fn default_ranges() {
        let ranges = SettingRanges::compute(&Settings::default());
        assert_eq!(ranges.card_min, SelectRange::new(2, 3));
        assert_eq!(ranges.card_max, SelectRange::new(3, 5));
        assert_eq!(ranges.span_max, SelectRange::new(2, 24));
        assert_eq!(ranges.span_min, SelectRange::new(0, 12));
        assert_eq!(ranges.midi_low, SelectRange::new(20, 60));
        assert_eq!(ranges.midi_high, SelectRange::new(60, 100));
    }

    #[test]
    fn inverted_register_is_repaired() {
        let settings = Settings {
            midi_low: 70,
            midi_high: 60,
            ..Settings::default()
        }
        .reconciled();
        assert!(settings.midi_low <= settings.midi_high);
        assert_satisfiable(&settings);
    }

    #[test]
    fn scalars_are_clamped() {
        let settings = Settings {
            mix_ratio: 3.0,
            aim: f64::NAN,
            win: 0,
            duration: -1.0,
            midi_low: 5,
            midi_high: 120,
            ..Settings::default()
        }
        .reconciled();
        assert_eq!(settings.mix_ratio, 1.0);
        assert_eq!(settings.aim, 0.8);
        assert_eq!(settings.win, 1);
        assert_eq!(settings.duration, 2.5);
        assert_eq!(settings.midi_low, MIDI_ABS_LOW);
        assert_eq!(settings.midi_high, MIDI_ABS_HIGH);
    }

    #[test]
    fn wide_span_in_narrow_register_shrinks() {
        let settings = Settings {
            midi_low: 60,
            midi_high: 64,
            span_max: 12,
            ..Settings::default()
        }
        .reconciled();
        assert_satisfiable(&settings);
        assert!(i64::from(settings.span_max) <= i64::from(settings.midi_high - settings.midi_low));
    }

    #[test]
    fn overrides_and_assignment() {
        let mut overrides = SettingsOverrides::default();
        overrides.assign("spanMax", "7").unwrap();
        overrides.assign("mix_ratio", "0.25").unwrap();
        assert!(overrides.assign("tempo", "1").is_err());
        assert!(overrides.assign("win", "ten").is_err());

        let settings = Settings::default().with_overrides(&overrides);
        assert_eq!(settings.span_max, 7);
        assert_eq!(settings.mix_ratio, 0.25);
        assert_eq!(settings.win, 10);

        let merged = overrides.merge(SettingsOverrides {
            span_max: Some(9),
            ..Default::default()
        });
        assert_eq!(merged.span_max, Some(9));
        assert_eq!(merged.mix_ratio, Some(0.25));
    }

    #[test]
    fn json_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"midiLow": 40, "bogus": 1}"#).unwrap();
        assert_eq!(settings.midi_low, 40);
        assert_eq!(settings.midi_high, 72);
        assert_eq!(settings.win, 10);
    }
}
