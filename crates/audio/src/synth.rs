use std::f32::consts::TAU;

use earshot_domain::{pitch_to_hz, Pitch};
use serde::{Deserialize, Serialize};

use crate::dsp::{normalize_peak, Envelope};

/// Partials rendered per note, each at `1/h` of the fundamental's amplitude.
pub const HARMONICS: u32 = 11;

const HEADROOM: f32 = 0.8;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SynthConfig {
    pub sample_rate: u32,
    pub volume: f32,
    pub envelope_attack: f32,
    pub envelope_decay: f32,
    pub envelope_sustain: f32,
    pub envelope_release: f32,
}

impl Default for SynthConfig {
    fn default() -> Self {
        let envelope = Envelope::default();
        Self {
            sample_rate: 48_000,
            volume: 1.0,
            envelope_attack: envelope.attack,
            envelope_decay: envelope.decay,
            envelope_sustain: envelope.sustain,
            envelope_release: envelope.release,
        }
    }
}

impl SynthConfig {
    pub fn envelope(&self) -> Envelope {
        Envelope {
            attack: self.envelope_attack,
            decay: self.envelope_decay,
            sustain: self.envelope_sustain,
            release: self.envelope_release,
        }
    }
}

/// Renders `pitches` as one mono buffer of `duration_secs`.
pub fn render_chord(pitches: &[Pitch], duration_secs: f32, config: &SynthConfig) -> Vec<f32> {
    let sample_rate = config.sample_rate.max(1) as f32;
    let frames = (duration_secs.max(0.0) * sample_rate).round() as usize;
    if pitches.is_empty() || frames == 0 {
        return Vec::new();
    }
    let nyquist = sample_rate / 2.0;
    let partials: Vec<(f32, f32)> = pitches
        .iter()
        .flat_map(|&pitch| {
            let fundamental = pitch_to_hz(pitch);
            (1..=HARMONICS).map(move |h| (fundamental * h as f32, 1.0 / h as f32))
        })
        .filter(|(freq, _)| *freq < nyquist)
        .collect();

    let envelope = config.envelope().fitted(duration_secs);
    let mut buffer: Vec<f32> = (0..frames)
        .map(|frame| {
            let t = frame as f32 / sample_rate;
            let tone: f32 = partials
                .iter()
                .map(|(freq, amp)| amp * (TAU * freq * t).sin())
                .sum();
            tone * envelope.gain_at(t, duration_secs)
        })
        .collect();
    normalize_peak(&mut buffer, HEADROOM * config.volume.clamp(0.0, 1.0));
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SynthConfig {
        SynthConfig {
            sample_rate: 8_000,
            ..Default::default()
        }
    }

    #[test]
    fn renders_requested_length() {
        let buffer = render_chord(&[60, 64, 67], 0.5, &config());
        assert_eq!(buffer.len(), 4_000);
        let peak = buffer.iter().fold(0f32, |acc, s| acc.max(s.abs()));
        assert!((peak - HEADROOM).abs() < 1e-3);
    }

    #[test]
    fn starts_and_ends_silent() {
        let buffer = render_chord(&[69], 0.25, &config());
        assert_eq!(buffer[0], 0.0);
        assert!(buffer.last().unwrap().abs() < 0.05);
    }

    #[test]
    fn empty_chord_is_silent() {
        assert!(render_chord(&[], 1.0, &config()).is_empty());
        assert!(render_chord(&[60], 0.0, &config()).is_empty());
    }
}
