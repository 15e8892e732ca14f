// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tracing::{debug, info};

use gridloop::audio;
use gridloop::config;
use gridloop::pitch::PitchCatalog;
use gridloop::render::render_offline;
use gridloop::scheduler::{ManualScheduler, TokioScheduler};
use gridloop::{Engine, EngineEvent};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A block-based step sequencer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays a loop through the configured audio device until stopped.
    Play {
        /// The path to the engine config.
        config_path: String,
        /// How long to play for, e.g. 30s or 2m. Plays until Ctrl-C if not given.
        #[arg[short, long]]
        duration: Option<String>,
        /// Record the output to the configured recording path.
        #[arg[short, long]]
        record: bool,
    },
    /// Renders a loop to a WAV file without an audio device.
    Render {
        /// The path to the engine config.
        config_path: String,
        /// The WAV file to write.
        output: String,
        /// The number of times to play through the loop.
        #[arg[short, long, default_value_t = 1]]
        loops: u32,
    },
    /// Loads a config, decodes all of its samples and prints the pattern.
    Verify {
        /// The path to the engine config.
        config_path: String,
    },
    /// Lists the pitches available for the given number of octaves.
    Pitches {
        #[arg[short, long, default_value_t = 2]]
        octaves: u8,
    },
    /// Lists the available audio output devices.
    Devices {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config_path,
            duration,
            record,
        } => {
            let duration: Option<Duration> = match duration {
                Some(duration) => Some(DurationString::from_string(duration)?.into()),
                None => None,
            };
            let config = config::load(&PathBuf::from(&config_path))?;
            let device = audio::get_device(config.audio())?;
            let engine = Engine::from_config(&config, Arc::new(TokioScheduler::current()?))?
                .with_output(device);

            let events = engine.subscribe();
            thread::spawn(move || {
                for event in events.iter() {
                    match event {
                        EngineEvent::BlockChanged(block) => debug!(block, "Block"),
                        EngineEvent::StateChanged(_) => debug!("Pattern changed"),
                        EngineEvent::ModeChanged(mode) => info!(mode = %mode, "Transport"),
                        EngineEvent::RecordingStateChanged(recording) => {
                            info!(recording, "Recording")
                        }
                    }
                }
            });

            engine.prepare_for_playing()?;
            if record && !engine.toggle_record() {
                return Err("unable to start recording, check the recording path".into());
            }
            engine.start();

            let wait = async {
                match duration {
                    Some(duration) => tokio::time::sleep(duration).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                result = tokio::signal::ctrl_c() => result?,
                _ = wait => {}
            }

            if engine.is_recording() {
                engine.toggle_record();
            } else {
                engine.hard_stop();
            }
        }
        Commands::Render {
            config_path,
            output,
            loops,
        } => {
            let config = config::load(&PathBuf::from(&config_path))?;
            let duration = render_offline(&config, &PathBuf::from(&output), loops)?;
            println!("Rendered {:.2}s to {}.", duration.as_secs_f64(), output);
        }
        Commands::Verify { config_path } => {
            let config = config::load(&PathBuf::from(&config_path))?;
            let engine = Engine::from_config(&config, Arc::new(ManualScheduler::new()))?;

            println!(
                "Loop: {} blocks at {} blocks/s ({:?} per loop)",
                config.blocks(),
                config.blocks_per_second(),
                engine.loop_duration()
            );
            println!(
                "Voices: {} ({} KB of samples)",
                engine.voices().len(),
                engine.voices().memory_usage() / 1024
            );
            println!("\nInstruments (count: {}):", engine.instruments().len());
            let pattern = engine.pattern();
            for instrument in engine.instruments() {
                let notes = pattern.get(instrument.id());
                println!(
                    "- {} ({}, root {}, {} notes)",
                    instrument.id(),
                    instrument.sample().display(),
                    instrument.root(),
                    notes.map_or(0, |notes| notes.len())
                );
                for note in notes.into_iter().flatten() {
                    println!("  - block {}: {}", note.block, note.pitch);
                }
            }
        }
        Commands::Pitches { octaves } => {
            let catalog = PitchCatalog::new(octaves)?;
            println!("Pitches (count: {}):", catalog.len());
            for pitch in catalog.pitches() {
                println!("- {}", pitch);
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
    }

    Ok(())
}
