pub mod device;
pub mod dsp;
pub mod player;
pub mod synth;

pub use device::{output_device_names, AudioHandle};
pub use dsp::{normalize_peak, Envelope, PeakLevel};
pub use player::{ChordPlayer, NullPlayer};
pub use synth::{render_chord, SynthConfig};
