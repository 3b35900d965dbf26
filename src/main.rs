mod cli;

use lyricsync::config::{self, ClockKind, Config};
use lyricsync::{BasicClock, FileLoader, ManualClock, Player, VideoOptions};
use lyricsync_core::events::{Event, PlayerEvent};
use lyricsync_document::{SongMap, SongRecord, UnitKind, Video};
use lyricsync_timeline::{FindOptions, TimedObject};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Prints player events as lyrics or JSON lines.
struct Printer {
    video: Arc<Video>,
    json: bool,
    last_phrase: Option<usize>,
}

impl Printer {
    /// Returns `false` once playback has come to rest.
    fn handle(&mut self, event: &Event) -> Result<bool> {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
        }

        match event.payload {
            PlayerEvent::TimeUpdate { position } if !self.json => {
                if let Some(phrase) = self.video.find_phrase(position, FindOptions::default()) {
                    if self.last_phrase != Some(phrase.index()) {
                        self.last_phrase = Some(phrase.index());
                        println!("[{}] {}", format_time(position), phrase.text());
                    }
                }
            }
            PlayerEvent::Pause | PlayerEvent::Stop | PlayerEvent::Dispose => return Ok(false),
            _ => {}
        }
        Ok(true)
    }
}

async fn play_song(
    song: &Path,
    config_path: Option<&Path>,
    fps: Option<f64>,
    throttle: Option<u64>,
    from: f64,
    json: bool,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    if let Some(fps) = fps {
        config.player.fps = fps;
    }
    if let Some(throttle) = throttle {
        config.player.throttle_interval_ms = throttle;
    }

    let root = song
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = song
        .file_name()
        .context("Song path has no file name")?
        .to_string_lossy()
        .into_owned();

    let player = Player::with_loader(config.player.clone(), Arc::new(FileLoader::new(root)));
    let mut events = player.subscribe();

    let video = player
        .create_from_song_url(&file_name, VideoOptions::default())
        .await
        .with_context(|| format!("Failed to load song: {:?}", song))?;

    let mut printer = Printer {
        video: Arc::clone(&video),
        json,
        last_phrase: None,
    };

    match config.clock.kind {
        ClockKind::Basic => {
            player
                .set_clock(Arc::new(BasicClock::new(config.clock.stop_at_end)))
                .await?;
            if from > 0.0 {
                player.request_media_seek(from);
            }
            player.request_play();

            loop {
                tokio::select! {
                    received = events.recv() => match received {
                        Ok(event) => {
                            if !printer.handle(&event)? {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Event output is lagging");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupted");
                        break;
                    }
                }
            }
        }
        ClockKind::Manual => {
            // Step through the song as fast as possible.
            let clock = Arc::new(ManualClock::new());
            player.set_clock(clock.clone()).await?;
            player.request_play();

            let step = player.wait();
            let mut position = from.max(video.start_time());
            while position <= video.end_time() {
                clock.advance_to(position).await;
                drain(&mut events, &mut printer)?;
                position += step;
            }
            player.request_stop();
            drain(&mut events, &mut printer)?;
        }
    }

    player.dispose();
    Ok(())
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<Event>, printer: &mut Printer) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => {
                printer.handle(&event)?;
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event output is lagging");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
        }
    }
}

fn inspect_song(song: &Path, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(song)
        .with_context(|| format!("Failed to read song record: {:?}", song))?;
    let record: SongRecord = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse song record: {:?}", song))?;

    let video = Video::from_data(&record.video).context("Failed to build document")?;
    if let Some(duration) = record.duration {
        video.set_duration(duration);
    }
    let song_map = SongMap::from_data(&record.song_map);

    if json {
        let phrases: Vec<_> = video
            .units(UnitKind::Phrase)
            .map(|phrase| {
                let words: Vec<_> = phrase
                    .children()
                    .map(|word| {
                        serde_json::json!({
                            "index": word.index(),
                            "startTime": word.start_time(),
                            "endTime": word.end_time(),
                            "text": word.text(),
                            "pos": word.pos(),
                            "language": word.language(),
                        })
                    })
                    .collect();
                serde_json::json!({
                    "index": phrase.index(),
                    "startTime": phrase.start_time(),
                    "endTime": phrase.end_time(),
                    "text": phrase.text(),
                    "words": words,
                })
            })
            .collect();
        let summary = serde_json::json!({
            "title": record.title,
            "startTime": video.start_time(),
            "endTime": video.end_time(),
            "phraseCount": video.phrase_count(),
            "wordCount": video.word_count(),
            "charCount": video.char_count(),
            "graphicCount": video.graphic_count(),
            "beatCount": song_map.beats().len(),
            "chordCount": song_map.chords().len(),
            "choruses": song_map.choruses(),
            "phrases": phrases,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if let Some(title) = &record.title {
        println!("{}", title);
    }
    println!(
        "  Span: {} - {} ({} ms)",
        format_time(video.start_time()),
        format_time(video.end_time()),
        video.duration()
    );
    println!(
        "  Phrases: {}  Words: {}  Chars: {}  Graphics: {}",
        video.phrase_count(),
        video.word_count(),
        video.char_count(),
        video.graphic_count()
    );
    println!(
        "  Beats: {}  Chords: {}  Choruses: {}",
        song_map.beats().len(),
        song_map.chords().len(),
        song_map.choruses().len()
    );
    for phrase in video.units(UnitKind::Phrase) {
        println!(
            "  [{} - {}] {}",
            format_time(phrase.start_time()),
            format_time(phrase.end_time()),
            phrase.text()
        );
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            print_config(&Config::default());
        }
    }

    Ok(())
}

fn print_config(config: &Config) {
    println!("  FPS: {}", config.player.fps);
    println!("  Throttle interval: {} ms", config.player.throttle_interval_ms);
    println!("  Text char duration: {} ms", config.player.text_char_duration_ms);
    println!("  Clock: {:?}", config.clock.kind);
    println!("  Stop at end: {}", config.clock.stop_at_end);
    for warning in config.validate() {
        println!("  ! {}", warning);
    }
}

fn format_time(ms: f64) -> String {
    let total = ms.max(0.0).round() as u64;
    format!("{:02}:{:02}.{:03}", total / 60_000, (total / 1000) % 60, total % 1000)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "lyricsync=trace,lyricsync_document=debug,lyricsync_timeline=debug".to_string()
        } else {
            "lyricsync=info,lyricsync_document=warn,lyricsync_timeline=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Play {
            song,
            fps,
            throttle,
            from,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(play_song(
                &song,
                cli.config.as_deref(),
                fps,
                throttle,
                from,
                json,
            ))
        }
        Commands::Inspect { song, json } => inspect_song(&song, json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("lyricsync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
