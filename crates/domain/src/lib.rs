pub mod error;
pub mod pitch;
pub mod record;
pub mod settings;
pub mod shape;

pub use crate::error::DomainError;
pub use crate::pitch::{note_name, pitch_to_hz, Pitch};
pub use crate::record::{OutcomeEntry, UserRecord};
pub use crate::settings::{
    SelectRange, SettingRanges, Settings, SettingsOverrides, MIDI_ABS_HIGH, MIDI_ABS_LOW,
};
pub use crate::shape::{Offset, Shape};
