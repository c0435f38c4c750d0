pub mod analysis;
pub mod app;
pub mod audio;
pub mod commands;
pub mod config;
pub mod history;
pub mod practice;
pub mod render;

use analysis::gemini::GeminiAnalyzer;
use app::{App, Tab};
use audio::{MicrophoneSource, RecordingController};
use commands::{Command, HELP};
use config::AppConfig;
use history::{History, JsonFileStore};
use practice::{AnalysisOutcome, PracticeSession, RetryPolicy};
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{Interval, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "fluent_check=info,fluent_check_lib=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub fn run() -> anyhow::Result<()> {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::load()?;
    tracing::info!("Data dir: {:?}", config.data_dir);
    match config.api_key_masked() {
        Some(masked) => tracing::info!("Using API key {}", masked),
        None => tracing::warn!(
            "No API key configured; set {} to enable analysis",
            config::ENV_API_KEY
        ),
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(interactive(build_app(&config)))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_app(config: &AppConfig) -> App {
    let history = History::load(Box::new(JsonFileStore::in_dir(&config.data_dir)));
    tracing::info!("Loaded {} past sessions", history.len());

    let settings = &config.settings;
    let analyzer = GeminiAnalyzer::with_timeout(config.api_key.clone().unwrap_or_default(), config.analysis_timeout())
        .model(settings.model.clone())
        .api_base(settings.api_base.clone());

    let recorder = RecordingController::new(Box::new(MicrophoneSource::new(
        settings.input_device_name.clone(),
    )));
    let practice = PracticeSession::new(recorder, Arc::new(analyzer))
        .with_retry(RetryPolicy::new(settings.analysis_retries))
        .with_timeout(config.analysis_timeout());

    App::new(history, practice)
}

async fn interactive(mut app: App) -> anyhow::Result<()> {
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<AnalysisOutcome>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = timer_ticker();

    println!("{}", render::render(&app));
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = match Command::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => {
                        prompt();
                        continue;
                    }
                    Err(e) => {
                        println!("{}", e);
                        prompt();
                        continue;
                    }
                };
                let starts_recording = command == Command::Record;
                if dispatch(&mut app, command, &outcome_tx).await == Flow::Quit {
                    break;
                }
                if starts_recording && app.practice().is_recording() {
                    ticker.reset();
                }
                println!("{}", render::render(&app));
                prompt();
            }
            Some(outcome) = outcome_rx.recv() => {
                if app.complete_analysis(outcome) && app.tab() == Tab::Practice {
                    println!();
                    println!("{}", render::render(&app));
                    prompt();
                }
            }
            _ = ticker.tick(), if app.practice().is_recording() => {
                if let Some(seconds) = app.practice().state().elapsed_seconds() {
                    print!("\r● Listening... {}  > ", render::format_elapsed(seconds));
                    let _ = std::io::stdout().flush();
                }
            }
        }
    }

    tracing::info!("Bye");
    Ok(())
}

/// Repaint cadence for the recording timer. The branch polling it is idle
/// between recordings, so missed ticks must not pile up.
fn timer_ticker() -> Interval {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn dispatch(app: &mut App, command: Command, outcomes: &UnboundedSender<AnalysisOutcome>) -> Flow {
    let result: Result<(), String> = match command {
        Command::Topic(topic) => app.practice_mut().set_topic(topic).map_err(|e| e.to_string()),
        Command::Shuffle => app.practice_mut().shuffle_topic().map_err(|e| e.to_string()),
        Command::Today => app.practice_mut().todays_topic().map_err(|e| e.to_string()),
        Command::Record => app.start_recording().map_err(|e| e.to_string()),
        Command::Stop => match app.stop_recording().await {
            Ok(Some(job)) => {
                let outcomes = outcomes.clone();
                tokio::spawn(async move {
                    let _ = outcomes.send(job.run().await);
                });
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e.to_string()),
        },
        // From History, `back` only navigates; a pending analysis keeps running.
        Command::Back => match app.tab() {
            Tab::History => {
                if app.selected_session().is_some() {
                    app.close_session();
                } else {
                    app.select_tab(Tab::Practice);
                }
                Ok(())
            }
            Tab::Practice => app.practice_mut().reset().map_err(|e| e.to_string()),
        },
        Command::Practice => {
            app.select_tab(Tab::Practice);
            Ok(())
        }
        Command::History => {
            app.select_tab(Tab::History);
            Ok(())
        }
        Command::Open(reference) => match app.resolve_session(&reference) {
            Some(id) => {
                app.open_session(&id);
                Ok(())
            }
            None => Err(format!("No session matches '{}'", reference)),
        },
        Command::Close => {
            app.close_session();
            Ok(())
        }
        Command::Delete(reference) => match target_session(app, reference.as_deref()) {
            Ok(id) => {
                app.delete_session(&id);
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::Export { session, path } => target_session(app, session.as_deref()).and_then(|id| {
            app.export_audio(&id, Path::new(&path))
                .map(|written| println!("Saved {}", written.display()))
                .map_err(|e| e.to_string())
        }),
        Command::Play(reference) => match reference {
            Some(reference) => app
                .resolve_session(&reference)
                .ok_or_else(|| format!("No session matches '{}'", reference))
                .and_then(|id| app.play_session(&id).map_err(|e| e.to_string())),
            None => app.play_current().map_err(|e| e.to_string()),
        },
        Command::Pause => app.toggle_playback().map(|_| ()).map_err(|e| e.to_string()),
        Command::Seek(secs) => app.seek_playback(secs).map(|_| ()).map_err(|e| e.to_string()),
        Command::StopPlayback => {
            if !app.stop_playback() {
                println!("Nothing is playing");
            }
            Ok(())
        }
        Command::Devices => MicrophoneSource::list_input_devices()
            .map(|devices| {
                if devices.is_empty() {
                    println!("No input devices found");
                }
                for name in devices {
                    println!("  {}", name);
                }
            })
            .map_err(|e| e.to_string()),
        Command::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Command::Quit => return Flow::Quit,
    };

    if let Err(message) = result {
        println!("! {}", message);
    }
    Flow::Continue
}

/// An explicit reference, or the session currently open.
fn target_session(app: &App, reference: Option<&str>) -> Result<String, String> {
    match reference {
        Some(reference) => app
            .resolve_session(reference)
            .ok_or_else(|| format!("No session matches '{}'", reference)),
        None => app
            .selected_session()
            .map(|s| s.id.clone())
            .ok_or_else(|| "Open a session first or name one".to_string()),
    }
}
