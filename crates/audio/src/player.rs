use anyhow::Result;
use earshot_domain::Pitch;
use tracing::debug;

/// Sound output used by the trainer.
///
/// Starting a chord always silences whatever is still sounding, so two
/// trials never overlap. Playback is fire-and-forget.
pub trait ChordPlayer {
    fn play_chord(&mut self, pitches: &[Pitch], duration_secs: f32) -> Result<()>;
    fn stop_all(&mut self) -> Result<()>;

    /// Called on the first user gesture; outputs that need unlocking start here.
    fn resume(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<P: ChordPlayer + ?Sized> ChordPlayer for Box<P> {
    fn play_chord(&mut self, pitches: &[Pitch], duration_secs: f32) -> Result<()> {
        (**self).play_chord(pitches, duration_secs)
    }

    fn stop_all(&mut self) -> Result<()> {
        (**self).stop_all()
    }

    fn resume(&mut self) -> Result<()> {
        (**self).resume()
    }
}

/// Player that only logs, for muted sessions and headless machines.
#[derive(Debug, Default)]
pub struct NullPlayer;

impl ChordPlayer for NullPlayer {
    fn play_chord(&mut self, pitches: &[Pitch], duration_secs: f32) -> Result<()> {
        debug!(?pitches, duration_secs, "null player: chord");
        Ok(())
    }

    fn stop_all(&mut self) -> Result<()> {
        debug!("null player: stop");
        Ok(())
    }
}
