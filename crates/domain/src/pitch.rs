/// MIDI note number.
pub type Pitch = u8;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Equal-tempered frequency with A4 (pitch 69) at 440 Hz.
pub fn pitch_to_hz(pitch: Pitch) -> f32 {
    440.0 * 2f32.powf((f32::from(pitch) - 69.0) / 12.0)
}

/// Scientific pitch name, e.g. 60 is `C4`.
pub fn note_name(pitch: Pitch) -> String {
    let octave = i32::from(pitch) / 12 - 1;
    format!("{}{}", NOTE_NAMES[usize::from(pitch % 12)], octave)
}
