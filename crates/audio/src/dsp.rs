#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakLevel {
    pub max: f32,
    pub min: f32,
}

impl PeakLevel {
    pub fn silence() -> Self {
        Self { max: 0.0, min: 0.0 }
    }

    pub fn magnitude(&self) -> f32 {
        self.max.abs().max(self.min.abs())
    }
}

/// Scales `buffer` so its largest magnitude equals `target`. Returns the peak
/// measured before scaling; silent buffers are left untouched.
pub fn normalize_peak(buffer: &mut [f32], target: f32) -> PeakLevel {
    let mut peak = PeakLevel::silence();
    for sample in buffer.iter() {
        peak.max = peak.max.max(*sample);
        peak.min = peak.min.min(*sample);
    }
    let magnitude = peak.magnitude();
    if magnitude < 1e-6 {
        return peak;
    }
    let gain = target / magnitude;
    for sample in buffer.iter_mut() {
        *sample *= gain;
    }
    peak
}

/// Linear attack/decay/sustain/release envelope, times in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.02,
            decay: 0.15,
            sustain: 0.75,
            release: 0.12,
        }
    }
}

impl Envelope {
    /// Shrinks the stages proportionally when they do not fit in `duration`.
    pub fn fitted(&self, duration: f32) -> Self {
        let stages = self.attack + self.decay + self.release;
        if stages <= duration || stages <= 0.0 {
            return *self;
        }
        let scale = duration.max(0.0) / stages;
        Self {
            attack: self.attack * scale,
            decay: self.decay * scale,
            release: self.release * scale,
            ..*self
        }
    }

    /// Gain at `t` seconds into a note lasting `duration` seconds.
    pub fn gain_at(&self, t: f32, duration: f32) -> f32 {
        let release_start = duration - self.release;
        if t < 0.0 || t >= duration {
            0.0
        } else if t < self.attack {
            t / self.attack
        } else if t < self.attack + self.decay {
            1.0 - (1.0 - self.sustain) * (t - self.attack) / self.decay
        } else if t < release_start {
            self.sustain
        } else {
            self.sustain * (duration - t) / self.release
        }
    }
}
