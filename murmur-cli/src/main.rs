//! murmur — generate ambient assets, audition the player offline or live.

#[cfg(feature = "realtime")]
mod realtime;

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use murmur_engine::generate::write_wav_16;
use murmur_engine::history::JsonFileStore;
use murmur_engine::{
    generate, CategoryFilter, FsLoader, GenerateOptions, ManualScheduler, PlayHistory, Player, PlayerConfig,
    PreferenceSnapshot, Profile, Scheduler, SynthSpec, SystemScheduler,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(version, about = "Ambient background audio: asset builder and player", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize assets and update manifest.json
    Generate {
        /// Only this profile (focus_warm, nature_air, rain_gentle, deep_hum, cafe_murmur)
        #[arg(short, long)]
        profile: Option<Profile>,
        #[arg(short, long, default_value = "assets")]
        out: PathBuf,
        /// Asset length in seconds
        #[arg(long, default_value_t = 10.0)]
        seconds: f32,
        #[arg(long, default_value_t = 48_000)]
        sample_rate: u32,
    },

    /// Run the player on a virtual clock and write the mix to a WAV file
    Render {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long, default_value_t = 2.0)]
        minutes: f32,
        #[arg(short, long, default_value = "murmur-render.wav")]
        out: PathBuf,
        /// Skip to a new track every N seconds of rendered audio
        #[arg(long)]
        skip_every: Option<f32>,
    },

    /// Play through an audio device until interrupted
    #[cfg(feature = "realtime")]
    Play {
        #[command(flatten)]
        session: SessionArgs,
        /// Output device name (see `list-devices`)
        #[arg(long)]
        device: Option<String>,
        /// Stop after N seconds
        #[arg(long)]
        duration: Option<u64>,
    },

    /// List output devices
    #[cfg(feature = "realtime")]
    ListDevices,
}

/// Everything needed to build a player and its first preference snapshot.
#[derive(Args, Debug, Clone)]
struct SessionArgs {
    /// Directory holding manifest.json and the WAV tree
    #[arg(short, long, default_value = "assets")]
    assets: PathBuf,
    /// `all` or one category
    #[arg(short, long, default_value = "all")]
    category: CategoryFilter,
    /// Slider position in [0, 1]
    #[arg(long, default_value_t = 0.25)]
    volume: f32,
    #[arg(long)]
    reduced_motion: bool,
    /// Player tuning as JSON; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Persist play history here
    #[arg(long)]
    history: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
}

impl SessionArgs {
    fn player_config(&self, sample_rate: u32) -> Result<PlayerConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => PlayerConfig::from_json_file(path)?,
            None => PlayerConfig::default(),
        };
        config.sample_rate = sample_rate;
        if self.seed.is_some() {
            config.rng_seed = self.seed;
        }
        Ok(config)
    }

    fn history(&self, cap: usize) -> PlayHistory {
        match &self.history {
            Some(path) => PlayHistory::open(Box::new(JsonFileStore::new(path)), cap),
            None => PlayHistory::in_memory(),
        }
    }

    fn preferences(&self) -> PreferenceSnapshot {
        PreferenceSnapshot {
            enabled: true,
            volume: self.volume,
            category: self.category,
            reduced_motion: self.reduced_motion,
            ..PreferenceSnapshot::default()
        }
    }

    /// A started player, device ready, with this session's preferences.
    fn build_player<S: Scheduler>(&self, sample_rate: u32, scheduler: S) -> Result<Player<FsLoader, S>, Box<dyn Error>> {
        let config = self.player_config(sample_rate)?;
        let history = self.history(config.history_cap);
        let mut player = Player::new(config, FsLoader::new(&self.assets), scheduler, history);
        player.set_device_ready(true);
        player.set_preferences(self.preferences());
        player.start();
        Ok(player)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Generate { profile, out, seconds, sample_rate } => run_generate(profile, out, seconds, sample_rate),
        Command::Render { session, minutes, out, skip_every } => run_render(&session, minutes, &out, skip_every),
        #[cfg(feature = "realtime")]
        Command::Play { session, device, duration } => realtime::play(&session, device.as_deref(), duration),
        #[cfg(feature = "realtime")]
        Command::ListDevices => realtime::list_output_devices(),
    }
}

fn run_generate(profile: Option<Profile>, out: PathBuf, seconds: f32, sample_rate: u32) -> Result<(), Box<dyn Error>> {
    let opts = GenerateOptions { out_dir: out, profile, spec: SynthSpec { sample_rate, duration_secs: seconds } };
    let report = generate(&opts)?;
    println!(
        "generated {} assets for {} profile(s); manifest now has {} tracks",
        report.written.len(),
        report.profiles.len(),
        report.manifest_tracks
    );
    Ok(())
}

/// Render block length on the virtual clock.
const RENDER_BLOCK_MS: u64 = 100;

fn run_render(session: &SessionArgs, minutes: f32, out: &Path, skip_every: Option<f32>) -> Result<(), Box<dyn Error>> {
    let sample_rate = 48_000;
    let mut player = session.build_player(sample_rate, ManualScheduler::new(SystemScheduler::new().now_ms()))?;
    player.poll();
    if player.status().current.is_none() {
        return Err(format!("nothing playable under {}", session.assets.display()).into());
    }

    let block_frames = (u64::from(sample_rate) * RENDER_BLOCK_MS / 1000) as usize;
    let total_blocks = ((minutes.max(0.0) * 60_000.0) as u64).div_ceil(RENDER_BLOCK_MS);
    let skip_blocks = skip_every.map(|s| ((s.max(0.1) * 1000.0) as u64).div_ceil(RENDER_BLOCK_MS).max(1));

    let mut mix = Vec::with_capacity(total_blocks as usize * block_frames * 2);
    let mut block = vec![0.0_f32; block_frames * 2];
    let mut last = player.status().current;
    for i in 0..total_blocks {
        if skip_blocks.is_some_and(|n| i > 0 && i % n == 0) {
            player.skip_track();
        }
        player.poll();
        player.render(&mut block);
        mix.extend_from_slice(&block);
        player.scheduler_mut().advance(RENDER_BLOCK_MS);

        let now = player.status().current;
        if now != last {
            info!(at_secs = i * RENDER_BLOCK_MS / 1000, asset = now.as_deref().unwrap_or("-"), "track change");
            last = now;
        }
    }

    write_wav_16(out, sample_rate, &mix)?;
    println!("{}", serde_json::to_string_pretty(&player.status())?);
    println!("wrote {} ({:.1} min)", out.display(), minutes);
    Ok(())
}
