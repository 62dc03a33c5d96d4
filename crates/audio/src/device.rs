use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use earshot_domain::Pitch;
use tracing::{debug, info, warn};

use crate::player::ChordPlayer;
use crate::synth::{render_chord, SynthConfig};

/// Samples of the chord currently sounding.
#[derive(Debug, Default)]
struct Voice {
    samples: Vec<f32>,
    cursor: usize,
}

impl Voice {
    fn next_sample(&mut self) -> f32 {
        match self.samples.get(self.cursor) {
            Some(sample) => {
                self.cursor += 1;
                *sample
            }
            None => 0.0,
        }
    }

    fn replace(&mut self, samples: Vec<f32>) {
        self.samples = samples;
        self.cursor = 0;
    }
}

/// Process-wide output stream.
///
/// Acquired once at startup and kept until exit. The stream stays paused
/// until [`ChordPlayer::resume`] is called from the first user gesture.
pub struct AudioHandle {
    stream: cpal::Stream,
    voice: Arc<Mutex<Voice>>,
    synth: SynthConfig,
    resumed: bool,
}

impl AudioHandle {
    pub fn acquire(device_name: Option<&str>, volume: f32) -> Result<Self> {
        let device = find_output_device(device_name)
            .ok_or_else(|| anyhow!("no audio output device available"))?;
        let supported = device
            .default_output_config()
            .context("query default output config")?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".into()),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "acquired audio output"
        );

        let voice = Arc::new(Mutex::new(Voice::default()));
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, voice.clone())?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, voice.clone())?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, voice.clone())?,
            other => bail!("unsupported sample format {other:?}"),
        };
        if let Err(err) = stream.pause() {
            warn!(%err, "failed to pause new output stream");
        }

        Ok(Self {
            stream,
            voice,
            synth: SynthConfig {
                sample_rate: config.sample_rate.0,
                volume,
                ..Default::default()
            },
            resumed: false,
        })
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    fn voice(&self) -> Result<MutexGuard<'_, Voice>> {
        self.voice
            .lock()
            .map_err(|_| anyhow!("audio voice lock poisoned"))
    }
}

impl ChordPlayer for AudioHandle {
    fn play_chord(&mut self, pitches: &[Pitch], duration_secs: f32) -> Result<()> {
        if pitches.is_empty() {
            return Ok(());
        }
        let samples = render_chord(pitches, duration_secs, &self.synth);
        if !self.resumed {
            debug!("chord queued until audio output resumes");
        }
        self.voice()?.replace(samples);
        Ok(())
    }

    fn stop_all(&mut self) -> Result<()> {
        self.voice()?.replace(Vec::new());
        Ok(())
    }

    /// Starts the stream. Later calls do nothing.
    fn resume(&mut self) -> Result<()> {
        if self.resumed {
            return Ok(());
        }
        self.stream.play().context("start audio output")?;
        self.resumed = true;
        debug!("audio output resumed");
        Ok(())
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    voice: Arc<Mutex<Voice>>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels).max(1);
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut voice = match voice.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            for frame in data.chunks_mut(channels) {
                let value = T::from_sample(voice.next_sample());
                for out in frame.iter_mut() {
                    *out = value;
                }
            }
        },
        |err| warn!(%err, "audio output stream error"),
        None,
    )?;
    Ok(stream)
}

/// Names of all output devices across the available hosts.
pub fn output_device_names() -> Vec<String> {
    let mut names = Vec::new();
    for host_id in cpal::available_hosts() {
        if let Ok(host) = cpal::host_from_id(host_id) {
            if let Ok(devices) = host.output_devices() {
                names.extend(devices.filter_map(|device| device.name().ok()));
            }
        }
    }
    names.sort();
    names.dedup();
    names
}

/// Looks a device up by name, falling back to the default output device.
fn find_output_device(target: Option<&str>) -> Option<cpal::Device> {
    if let Some(target) = target {
        for host_id in cpal::available_hosts() {
            let Ok(host) = cpal::host_from_id(host_id) else {
                continue;
            };
            let Ok(mut devices) = host.output_devices() else {
                continue;
            };
            if let Some(device) =
                devices.find(|device| device.name().map_or(false, |name| name == target))
            {
                return Some(device);
            }
        }
        warn!(device = target, "output device not found; using default");
    }
    cpal::default_host().default_output_device()
}
