use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tipster::config::{GpioBackend, PlaybackBackend, SpeechBackend};
use tipster::gpio::SysfsGpio;
use tipster::playback::{self, CommandPlayer};
use tipster::speech::{AzureSynthesizer, CommandSynthesizer};
use tipster::{
    Appliance, AudioPlayer, Config, DigitalIo, Error, Panel, Parts, SpeechCache, Synthesizer,
    TipStore,
};

/// Tipster - press the button, hear a tip
#[derive(Parser)]
#[command(name = "tipster", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/tipster/config.toml)
    #[arg(short, long, env = "TIPSTER_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize text through the cache and play it
    Speak {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Synthesize every tip ahead of time
    WarmCache,
    /// Load the tips file and report what was found
    CheckTips,
    /// Play the warning sound
    TestWarning,
    /// Write a warning tone WAV
    GenWarning {
        /// Output path (defaults to the configured warning sound)
        path: Option<PathBuf>,
        /// Duration in seconds
        #[arg(short, long, default_value = "1.0")]
        duration: f32,
    },
    /// Install tipster as a system service (run with sudo)
    Install,
    /// Uninstall the tipster system service
    Uninstall,
    /// Show service status
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,tipster=info",
        1 => "info,tipster=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Speak { text } => cmd_speak(config_path, &text).await,
            Command::WarmCache => cmd_warm_cache(config_path).await,
            Command::CheckTips => cmd_check_tips(config_path),
            Command::TestWarning => cmd_test_warning(config_path).await,
            Command::GenWarning { path, duration } => cmd_gen_warning(config_path, path, duration),
            Command::Install => cmd_install(config_path),
            Command::Uninstall => cmd_uninstall(),
            Command::Status => cmd_status(),
        };
    }

    let config = Config::load(config_path)?;
    tracing::debug!(?config, "loaded configuration");

    let tips = Arc::new(TipStore::load(&config.tips_path)?);
    if !config.warning_sound.exists() {
        tracing::warn!(
            path = %config.warning_sound.display(),
            "warning sound missing, run `tipster gen-warning` to create one"
        );
    }

    apply_volume(&config).await;

    let panel = Panel::new(build_gpio(&config)?, config.gpio.wiring);
    let parts = Parts {
        panel,
        cache: build_cache(&config)?,
        player: build_player(&config)?,
    };

    let mut appliance = Appliance::new(
        parts,
        tips,
        config.speech.voice.clone(),
        config.warning_sound.clone(),
        &config.timing,
    );
    appliance.run().await?;

    Ok(())
}

fn build_synthesizer(config: &Config) -> tipster::Result<Arc<dyn Synthesizer>> {
    match config.speech.backend {
        SpeechBackend::Azure => {
            let key = config.speech.subscription_key.clone().ok_or_else(|| {
                Error::Config("AZURE_SPEECH_KEY or speech.subscription_key required".to_string())
            })?;
            let region = config.speech.region.as_deref().ok_or_else(|| {
                Error::Config("AZURE_SPEECH_REGION or speech.region required".to_string())
            })?;
            Ok(Arc::new(AzureSynthesizer::new(key, region)?))
        }
        SpeechBackend::Command => {
            let synthesizer = match config.speech.command.as_deref() {
                Some([program, args @ ..]) => {
                    CommandSynthesizer::new(program.clone(), args.to_vec())
                }
                _ => CommandSynthesizer::default(),
            };
            Ok(Arc::new(synthesizer))
        }
    }
}

fn build_cache(config: &Config) -> tipster::Result<SpeechCache> {
    let synthesizer = build_synthesizer(config)?;
    tracing::info!(
        backend = synthesizer.name(),
        dir = %config.cache_dir.display(),
        "speech cache ready"
    );
    Ok(SpeechCache::new(&config.cache_dir, synthesizer)?.with_timeout(config.speech.timeout))
}

fn build_player(config: &Config) -> tipster::Result<Arc<dyn AudioPlayer>> {
    match config.playback.backend {
        PlaybackBackend::Command => {
            let player = match config.playback.command.as_deref() {
                Some([program, args @ ..]) => CommandPlayer::new(program.clone(), args.to_vec()),
                _ => CommandPlayer::default(),
            };
            Ok(Arc::new(player))
        }
        #[cfg(feature = "native-audio")]
        PlaybackBackend::Native => Ok(Arc::new(playback::NativePlayer)),
        #[cfg(not(feature = "native-audio"))]
        PlaybackBackend::Native => Err(Error::Config(
            "native playback requires the `native-audio` feature".to_string(),
        )),
    }
}

fn build_gpio(config: &Config) -> tipster::Result<Box<dyn DigitalIo>> {
    match config.gpio.backend {
        GpioBackend::Sysfs => Ok(Box::new(SysfsGpio::open(&config.gpio.wiring)?)),
        #[cfg(feature = "rpi")]
        GpioBackend::Rpi => Ok(Box::new(tipster::gpio::RppalGpio::open(
            &config.gpio.wiring,
        )?)),
        #[cfg(not(feature = "rpi"))]
        GpioBackend::Rpi => Err(Error::Config(
            "rpi GPIO backend requires the `rpi` feature".to_string(),
        )),
    }
}

/// Set the mixer volume if one is configured
async fn apply_volume(config: &Config) {
    let Some(volume) = config.playback.volume.as_deref() else {
        return;
    };
    if let Err(e) = playback::set_volume(&config.playback.mixer_control, volume).await {
        tracing::warn!(error = %e, "failed to set volume");
    }
}

/// Speak arbitrary text through the cache
async fn cmd_speak(config_path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let cache = build_cache(&config)?;
    let player = build_player(&config)?;

    let hit = cache.contains(text, &config.speech.voice);
    let path = cache.speak(text, &config.speech.voice).await?;
    println!(
        "{} {}",
        if hit { "Cached:" } else { "Synthesized:" },
        path.display()
    );

    apply_volume(&config).await;
    player.play(&path).await?;
    Ok(())
}

/// Synthesize every tip that is not cached yet
async fn cmd_warm_cache(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let tips = TipStore::load(&config.tips_path)?;
    let cache = build_cache(&config)?;

    let summary = cache
        .warm(tips.iter().map(tipster::Tip::spoken), &config.speech.voice)
        .await;
    println!(
        "{} synthesized, {} already cached, {} failed",
        summary.written, summary.cached, summary.failed
    );
    Ok(())
}

/// Load the tips file and print a summary
fn cmd_check_tips(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let tips = TipStore::load(&config.tips_path)?;

    let phonetic = tips.iter().filter(|t| t.phonetic.is_some()).count();
    println!("{}: {} tips", config.tips_path.display(), tips.len());
    println!("  {phonetic} with phonetic spelling");
    for (i, tip) in tips.iter().enumerate() {
        println!("  [{i}] {}", tip.text);
    }
    Ok(())
}

/// Play the warning sound
async fn cmd_test_warning(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let is_wav = config
        .warning_sound
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if is_wav {
        let pcm = playback::decode_wav(&config.warning_sound)?;
        println!(
            "{}: {} Hz, {} channel(s), {:.2}s",
            config.warning_sound.display(),
            pcm.sample_rate,
            pcm.channels,
            pcm.duration().as_secs_f32()
        );
    }

    apply_volume(&config).await;
    build_player(&config)?.play(&config.warning_sound).await?;
    Ok(())
}

/// Write a generated warning tone
fn cmd_gen_warning(
    config_path: Option<&Path>,
    path: Option<PathBuf>,
    duration: f32,
) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::load(config_path)?.warning_sound,
    };
    if duration.is_nan() || duration <= 0.0 {
        anyhow::bail!("duration must be positive");
    }
    tipster::tone::write_alarm(&path, duration)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Install tipster as a system service
fn cmd_install(config_path: Option<&Path>) -> anyhow::Result<()> {
    let binary = std::env::current_exe()?;
    let config_path = config_path.map(std::path::absolute).transpose()?;
    // Run as the account that invoked sudo so its config and cache are used
    let config = tipster::lifecycle::ServiceConfig {
        binary_path: binary,
        config_path,
        user: std::env::var("SUDO_USER").ok().filter(|u| u != "root"),
    };

    tipster::lifecycle::install_service(&config)?;
    println!("Tipster installed as system service");
    Ok(())
}

/// Uninstall the tipster system service
fn cmd_uninstall() -> anyhow::Result<()> {
    tipster::lifecycle::uninstall_service()?;
    println!("Tipster system service removed");
    Ok(())
}

/// Show service status
fn cmd_status() -> anyhow::Result<()> {
    let status = tipster::lifecycle::service_status()?;
    println!("Tipster service: {status}");
    Ok(())
}
