//! audiosearch - identify songs from recorded or stored audio.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use audiosearch_lib::audio::wav::{self, WavSpec};
use audiosearch_lib::config::AppConfig;
use audiosearch_lib::logger;
use audiosearch_lib::recognition::signature;
use audiosearch_lib::{AcrCloudClient, AudioSearch, IdentifyResult};

#[derive(Parser, Debug)]
#[command(name = "audiosearch")]
#[command(about = "Identify songs with a fingerprint recognition service")]
#[command(version)]
struct Args {
    /// Config file (defaults to AUDIOSEARCH_CONFIG, then the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also append logs to run.log in this directory
    #[arg(long, global = true, env = "AUDIOSEARCH_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Identify a .wav file, or raw 44.1kHz mono s16le PCM
    Identify { file: PathBuf },

    /// Wrap raw PCM in a WAV header
    Encode {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
        #[arg(long, default_value_t = 1)]
        channels: u16,
    },

    /// Print the request signature for the configured credentials
    Sign {
        /// Unix seconds; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Show the resolved configuration with the access key masked
    Diagnose,

    /// Record from the microphone, then identify
    #[cfg(feature = "mic-capture")]
    Record {
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
    },

    /// Manage access secrets in the OS keychain
    #[cfg(feature = "keychain")]
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
}

#[cfg(feature = "keychain")]
#[derive(Subcommand, Debug)]
enum KeysAction {
    Set { access_key: String, secret: String },
    Delete { access_key: String },
    Status { access_key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_logger(args.log_dir.as_deref());

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Identify { file } => identify_file(config, &file, args.json).await,
        Command::Encode {
            input,
            output,
            sample_rate,
            channels,
        } => {
            let pcm = std::fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let spec = WavSpec {
                sample_rate,
                channels,
                ..WavSpec::RECOGNITION
            };
            spec.validate()?;
            let written = wav::write_wav_file(&output, &pcm, spec)?;
            println!(
                "{} ({} bytes, {:.1}s)",
                output.display(),
                written,
                wav::pcm_duration(pcm.len(), spec)
            );
            Ok(())
        }
        Command::Sign { timestamp } => {
            let credentials = config.credentials();
            credentials.validate()?;
            let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
            let signed = signature::sign_request(
                &credentials.access_key,
                &credentials.access_secret,
                timestamp,
            )?;
            println!(
                "string to sign:\n{}\n\nsignature: {signed}",
                signature::string_to_sign(&credentials.access_key, timestamp)
            );
            Ok(())
        }
        Command::Diagnose => {
            println!("{}", config.diagnostic_info());
            Ok(())
        }
        #[cfg(feature = "mic-capture")]
        Command::Record { seconds } => record_and_identify(config, seconds, args.json).await,
        #[cfg(feature = "keychain")]
        Command::Keys { action } => manage_keys(action),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = AppConfig::load(path).context("Failed to load config")?;
    #[cfg(feature = "keychain")]
    let config =
        config.with_keychain_secret(&audiosearch_lib::security::keystore::KeyStore::new())?;
    Ok(config)
}

fn recognizer(config: &AppConfig) -> Result<AudioSearch<AcrCloudClient>> {
    if !config.has_credentials() {
        bail!(
            "No credentials configured. Set access_key/access_secret in the config file \
             or AUDIOSEARCH_ACCESS_KEY/AUDIOSEARCH_ACCESS_SECRET."
        );
    }
    let client = AcrCloudClient::from_config(config)?;
    Ok(AudioSearch::new(config.clone(), client))
}

async fn identify_file(config: AppConfig, file: &Path, json: bool) -> Result<()> {
    let search = recognizer(&config)?;
    let data =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let result = if wav::is_wav(&data) {
        let duration_secs = wav::wav_duration(&data).unwrap_or_default();
        let outcome = search.identify_wav(&data).await?;
        IdentifyResult {
            outcome,
            duration_secs,
            audio_path: Some(file.display().to_string()),
        }
    } else {
        info!("{} has no WAV header, treating it as raw PCM", file.display());
        search.identify_pcm(&data).await?
    };

    print_result(&result, json)
}

#[cfg(feature = "mic-capture")]
async fn record_and_identify(config: AppConfig, seconds: u64, json: bool) -> Result<()> {
    use std::time::Duration;

    use audiosearch_lib::audio::capture;
    use audiosearch_lib::Recorder;

    let search = recognizer(&config)?;
    let limit = config.max_recording().min(Duration::from_secs(seconds));
    let mut recorder = Recorder::with_max_duration(limit);

    let source = recorder.start(capture::input_sources()).await?;
    eprintln!("Listening on {source} for {}s...", limit.as_secs());

    tokio::select! {
        _ = tokio::time::sleep(limit) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, identifying what was captured"),
    }

    let result = search.stop_and_identify(&mut recorder).await?;
    print_result(&result, json)
}

#[cfg(feature = "keychain")]
fn manage_keys(action: KeysAction) -> Result<()> {
    use audiosearch_lib::security::keystore::KeyStore;

    let store = KeyStore::new();
    match action {
        KeysAction::Set { access_key, secret } => {
            store.save_secret(&access_key, secret.trim())?;
            println!("Saved secret for {access_key}");
        }
        KeysAction::Delete { access_key } => {
            store.delete_secret(&access_key)?;
            println!("Deleted secret for {access_key}");
        }
        KeysAction::Status { access_key } => {
            let stored = store.has_secret(&access_key)?;
            println!("{access_key}: {}", if stored { "stored" } else { "not stored" });
        }
    }
    Ok(())
}

fn print_result(result: &IdentifyResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{}", result.outcome.user_message());
    if let Some(song) = result.outcome.song() {
        if let Some(album) = &song.album {
            println!("Album:    {album}");
        }
        println!("Duration: {}", song.formatted_duration());
        if let Some(genres) = song.genres_string() {
            println!("Genres:   {genres}");
        }
        if let Some(date) = &song.release_date {
            println!("Released: {date}");
        }
        if let Some(isrc) = &song.external_ids.isrc {
            println!("ISRC:     {isrc}");
        }
    }
    if let Some(path) = &result.audio_path {
        println!("Audio:    {path} ({:.1}s)", result.duration_secs);
    }
    Ok(())
}
