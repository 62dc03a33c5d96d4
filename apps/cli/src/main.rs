mod shell;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use earshot_audio::{output_device_names, AudioHandle, ChordPlayer, NullPlayer};
use earshot_domain::SettingsOverrides;
use earshot_storage::{JsonDirStore, MemoryStore, ProfileStore, GUEST};
use earshot_trainer::Trainer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::shell::{describe_settings, Shell};

const DEFAULT_VOLUME: f32 = 0.8;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Adaptive ear training for intervals and chords"
)]
struct Cli {
    /// Directory holding user profiles (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Keep profiles in memory; nothing is written to disk
    #[arg(long, global = true)]
    ephemeral: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Practise interactively (the default)
    Practice(PracticeArgs),
    /// List stored users
    Users,
    /// Register a new user
    AddUser { name: String },
    /// Delete a user and their history
    RemoveUser { name: String },
    /// Print a user's settings and progress
    Stats {
        #[arg(short, long)]
        user: Option<String>,
    },
    /// List audio output devices
    Devices,
}

#[derive(Args, Debug, Default)]
struct PracticeArgs {
    /// User to practise as (defaults to the last one saved)
    #[arg(short, long)]
    user: Option<String>,
    /// YAML file with setting overrides, e.g. `cardMax: 4`
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Skip audio output and print the sounding notes instead
    #[arg(long)]
    mute: bool,
    /// Output device name
    #[arg(long)]
    device: Option<String>,
    /// Output volume between 0 and 1
    #[arg(long)]
    volume: Option<f32>,
    /// Seed for a reproducible session
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut store = open_store(&cli)?;
    match cli.command {
        None => practice(store, PracticeArgs::default()),
        Some(Command::Practice(args)) => practice(store, args),
        Some(Command::Users) => {
            for user in store.list_users()? {
                println!("{user}");
            }
            Ok(())
        }
        Some(Command::AddUser { name }) => {
            let name = store.create_user(&name)?;
            println!("Created user {name}");
            Ok(())
        }
        Some(Command::RemoveUser { name }) => {
            let name = resolve_user(store.as_ref(), &name)?;
            store.remove(&name)?;
            println!("Removed user {name}");
            Ok(())
        }
        Some(Command::Stats { user }) => stats(store.as_ref(), user),
        Some(Command::Devices) => {
            for device in output_device_names() {
                println!("{device}");
            }
            Ok(())
        }
    }
}

fn open_store(cli: &Cli) -> Result<Box<dyn ProfileStore>> {
    if cli.ephemeral {
        return Ok(Box::new(MemoryStore::new()));
    }
    let store = match &cli.data_dir {
        Some(dir) => JsonDirStore::open(dir)?,
        None => JsonDirStore::open_default()?,
    };
    Ok(Box::new(store))
}

/// Accepts the guest or an existing user.
fn resolve_user(store: &dyn ProfileStore, name: &str) -> Result<String> {
    let name = name.trim();
    if name == GUEST || store.list_users()?.iter().any(|user| user == name) {
        return Ok(name.to_string());
    }
    bail!("unknown user '{name}'; create it with `earshot add-user {name}`")
}

fn load_overrides(path: &Path) -> Result<SettingsOverrides> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parse config {}", path.display()))
}

/// The output device, or a silent player when muted or no device works.
/// The flag says whether the session is silent.
fn open_player(args: &PracticeArgs) -> (Box<dyn ChordPlayer>, bool) {
    if args.mute {
        return (Box::new(NullPlayer), true);
    }
    let volume = args.volume.unwrap_or(DEFAULT_VOLUME).clamp(0.0, 1.0);
    match AudioHandle::acquire(args.device.as_deref(), volume) {
        Ok(handle) => (Box::new(handle), false),
        Err(err) => {
            warn!(%err, "audio output unavailable; continuing muted");
            (Box::new(NullPlayer), true)
        }
    }
}

fn practice(store: Box<dyn ProfileStore>, args: PracticeArgs) -> Result<()> {
    let user = match &args.user {
        Some(name) => resolve_user(store.as_ref(), name)?,
        None => store.last_user(),
    };
    let mut record = store.load(&user);
    if let Some(path) = &args.config {
        let overrides = load_overrides(path)?;
        record.settings = record.settings.with_overrides(&overrides);
    }

    let (player, silent) = open_player(&args);
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let trainer = Trainer::with_rng(player, record, rng);
    info!(user = %user, silent, "starting practice");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    Shell::new(trainer, store, user, silent).run(stdin.lock(), &mut stdout)
}

fn stats(store: &dyn ProfileStore, user: Option<String>) -> Result<()> {
    let user = match user {
        Some(name) => resolve_user(store, &name)?,
        None => store.last_user(),
    };
    let record = store.load(&user);
    let trainer = Trainer::with_rng(NullPlayer, record, StdRng::seed_from_u64(0));
    println!("User:     {user}");
    println!("Settings: {}", describe_settings(trainer.settings()));
    println!("Trials:   {}", trainer.log().len());
    println!("{}", trainer.feedback(None));
    Ok(())
}
