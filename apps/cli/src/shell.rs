use std::io::{BufRead, Write};
use std::ops::ControlFlow;

use anyhow::Result;
use earshot_audio::ChordPlayer;
use earshot_domain::{note_name, Pitch, SelectRange, SettingRanges, Settings, SettingsOverrides};
use earshot_storage::{ProfileStore, GUEST};
use earshot_trainer::{Submission, Trainer, TrialState};
use rand::Rng;
use tracing::{debug, info, warn};

const HELP: &str = "\
Commands:
  n               new trial
  r               replay the trial
  g               play your last graded guess over the same root
  <offsets>       answer, e.g. `0 4 7` or `4,7`
  s               show progress
  set <f> <v>     change a setting, e.g. `set cardMax 4`
  ranges          show the values each setting accepts
  users           list users
  user <name>     switch user
  h               this help
  q               save and quit";

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Next,
    Replay,
    ReplayGuess,
    Summary,
    Set { field: String, value: String },
    Ranges,
    Users,
    SwitchUser(String),
    Help,
    Quit,
    Usage(&'static str),
    /// Anything else is taken as an answer.
    Guess(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Self::Empty;
        };
        match head.to_ascii_lowercase().as_str() {
            "n" | "next" => Self::Next,
            "r" | "replay" => Self::Replay,
            "g" => Self::ReplayGuess,
            "s" | "stats" => Self::Summary,
            "ranges" => Self::Ranges,
            "users" => Self::Users,
            "h" | "help" | "?" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            "set" => match (words.next(), words.next()) {
                (Some(field), Some(value)) => Self::Set {
                    field: field.to_string(),
                    value: value.to_string(),
                },
                _ => Self::Usage("set <field> <value>"),
            },
            "user" => {
                let name = line[head.len()..].trim();
                if name.is_empty() {
                    Self::Usage("user <name>")
                } else {
                    Self::SwitchUser(name.to_string())
                }
            }
            _ => Self::Guess(line.to_string()),
        }
    }
}

/// Interactive practice loop over a trainer and a profile store.
pub struct Shell<P: ChordPlayer, R: Rng> {
    trainer: Trainer<P, R>,
    store: Box<dyn ProfileStore>,
    user: String,
    /// Print the sounding notes, for sessions without audio.
    reveal: bool,
    resumed: bool,
}

impl<P: ChordPlayer, R: Rng> Shell<P, R> {
    pub fn new(
        trainer: Trainer<P, R>,
        store: Box<dyn ProfileStore>,
        user: String,
        reveal: bool,
    ) -> Self {
        Self {
            trainer,
            store,
            user,
            reveal,
            resumed: false,
        }
    }

    /// Reads commands until `q` or end of input, then saves.
    pub fn run(&mut self, input: impl BufRead, out: &mut impl Write) -> Result<()> {
        writeln!(out, "Practising as {}. Type h for help, n to start.", self.user)?;
        writeln!(out, "{}", describe_settings(self.trainer.settings()))?;
        for line in input.lines() {
            let command = Command::parse(&line?);
            if command == Command::Empty {
                continue;
            }
            self.resume_audio();
            let flow = self.handle(command, out)?;
            out.flush()?;
            if flow.is_break() {
                break;
            }
        }
        self.save(out)?;
        info!(user = %self.user, "practice ended");
        Ok(())
    }

    fn resume_audio(&mut self) {
        if self.resumed {
            return;
        }
        self.resumed = true;
        if let Err(err) = self.trainer.player_mut().resume() {
            warn!(%err, "failed to start audio output");
        }
    }

    fn handle(&mut self, command: Command, out: &mut impl Write) -> Result<ControlFlow<()>> {
        debug!(?command, "shell command");
        match command {
            Command::Empty => {}
            Command::Next => self.next(out)?,
            Command::Replay => {
                if self.trainer.current().is_none() {
                    writeln!(out, "Nothing to replay; press n for a trial.")?;
                }
                self.trainer.replay();
            }
            Command::ReplayGuess => {
                if self.trainer.state() != TrialState::Answered {
                    writeln!(out, "Answer the trial first.")?;
                }
                self.trainer.play_last_guess();
            }
            Command::Summary => {
                let shape = self
                    .trainer
                    .current()
                    .filter(|trial| trial.answered)
                    .map(|trial| trial.shape.clone());
                writeln!(out, "{}", self.trainer.feedback(shape.as_ref()))?;
            }
            Command::Set { field, value } => self.set(&field, &value, out)?,
            Command::Ranges => write_ranges(self.trainer.settings(), out)?,
            Command::Users => {
                for user in self.store.list_users()? {
                    let marker = if user == self.user { '*' } else { ' ' };
                    writeln!(out, "{marker} {user}")?;
                }
            }
            Command::SwitchUser(name) => self.switch_user(&name, out)?,
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => return Ok(ControlFlow::Break(())),
            Command::Usage(usage) => writeln!(out, "Usage: {usage}")?,
            Command::Guess(text) => self.guess(&text, out)?,
        }
        Ok(ControlFlow::Continue(()))
    }

    fn next(&mut self, out: &mut impl Write) -> Result<()> {
        if self.trainer.state() == TrialState::AwaitingAnswer {
            writeln!(out, "The current trial is still open; answer it or press r.")?;
            return Ok(());
        }
        let reveal = self.reveal;
        match self.trainer.next_trial() {
            Some(trial) => {
                writeln!(
                    out,
                    "Listen: {} notes. Enter offsets above the lowest, e.g. 0 4 7.",
                    trial.pitches.len()
                )?;
                if reveal {
                    writeln!(out, "  sounding {}", note_names(&trial.pitches))?;
                }
            }
            None => writeln!(
                out,
                "No trial fits the current settings; adjust them with `set`."
            )?,
        }
        Ok(())
    }

    fn guess(&mut self, text: &str, out: &mut impl Write) -> Result<()> {
        match self.trainer.submit_guess(text) {
            None => writeln!(out, "No open trial; press n for a new one.")?,
            Some(Submission::NoAnswer) => writeln!(out, "Enter offsets as numbers, e.g. 0 4 7.")?,
            Some(Submission::Graded(verdict)) => {
                if verdict.correct {
                    writeln!(out, "Correct: {}", verdict.truth)?;
                } else {
                    writeln!(out, "Wrong: you said {}, it was {}", verdict.guess, verdict.truth)?;
                }
                writeln!(out, "{}", self.trainer.feedback(Some(&verdict.truth)))?;
                self.save(out)?;
            }
        }
        Ok(())
    }

    fn set(&mut self, field: &str, value: &str, out: &mut impl Write) -> Result<()> {
        let mut overrides = SettingsOverrides::default();
        if let Err(err) = overrides.assign(field, value) {
            writeln!(out, "{err}")?;
            return Ok(());
        }
        self.trainer.change_settings(&overrides);
        writeln!(out, "{}", describe_settings(self.trainer.settings()))?;
        writeln!(out, "{} shapes to practise", self.trainer.universe().len())?;
        self.save(out)
    }

    fn switch_user(&mut self, name: &str, out: &mut impl Write) -> Result<()> {
        if name != GUEST && !self.store.list_users()?.iter().any(|user| user == name) {
            writeln!(out, "Unknown user {name}; create it with `earshot add-user {name}`.")?;
            return Ok(());
        }
        self.save(out)?;
        let record = self.store.load(name);
        self.trainer.load_record(record);
        self.user = name.to_string();
        info!(user = name, "switched user");
        writeln!(out, "Practising as {name}.")?;
        writeln!(out, "{}", describe_settings(self.trainer.settings()))?;
        Ok(())
    }

    /// Persists the current record. Failures are reported, not fatal.
    fn save(&mut self, out: &mut impl Write) -> Result<()> {
        if let Err(err) = self.store.save(&self.user, &self.trainer.snapshot()) {
            warn!(%err, user = %self.user, "failed to save profile");
            writeln!(out, "Could not save progress: {err}")?;
        }
        Ok(())
    }
}

/// One-line summary of the settings a session runs with.
pub fn describe_settings(settings: &Settings) -> String {
    format!(
        "Register {}..{}, {}-{} notes, span {}-{} semitones, aim {:.0}% over {} trials, mix {:.2}, {:.1}s chords",
        note_name(settings.midi_low),
        note_name(settings.midi_high),
        settings.card_min,
        settings.card_max,
        settings.span_min,
        settings.span_max,
        settings.aim * 100.0,
        settings.win,
        settings.mix_ratio,
        settings.duration,
    )
}

fn note_names(pitches: &[Pitch]) -> String {
    pitches
        .iter()
        .map(|pitch| note_name(*pitch))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_ranges(settings: &Settings, out: &mut impl Write) -> Result<()> {
    let ranges = SettingRanges::compute(settings);
    let plain = |range: &SelectRange| format!("{}..={}", range.lo, range.hi);
    let notes = |range: &SelectRange| {
        let name = |value: i64| note_name(value.clamp(0, i64::from(Pitch::MAX)) as Pitch);
        format!("{}..={} ({}..{})", range.lo, range.hi, name(range.lo), name(range.hi))
    };
    writeln!(out, "cardMin   {}", plain(&ranges.card_min))?;
    writeln!(out, "cardMax   {}", plain(&ranges.card_max))?;
    writeln!(out, "spanMin   {}", plain(&ranges.span_min))?;
    writeln!(out, "spanMax   {}", plain(&ranges.span_max))?;
    writeln!(out, "midiLow   {}", notes(&ranges.midi_low))?;
    writeln!(out, "midiHigh  {}", notes(&ranges.midi_high))?;
    Ok(())
}
