// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
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

//! Faster-than-real-time bounce of a loop to a WAV file.

use std::{path::Path, sync::Arc, time::Duration};

use tracing::{info, span, Level};

use crate::{
    config::EngineConfig,
    engine::{Engine, EngineError},
    scheduler::ManualScheduler,
    util::filename_display,
};

/// Largest number of frames rendered between clock checks.
const RENDER_CHUNK_FRAMES: usize = 64;

/// Renders `loops` passes over the configured pattern into `output`. Ticks land exactly on the
/// frame they're due at. Returns the rendered duration.
pub fn render_offline(
    config: &EngineConfig,
    output: &Path,
    loops: u32,
) -> Result<Duration, EngineError> {
    let span = span!(Level::INFO, "render");
    let _enter = span.enter();

    let mut config = config.clone();
    config.set_recording_path(output);

    let scheduler = Arc::new(ManualScheduler::new());
    let engine = Engine::from_config(&config, scheduler.clone())?;
    let mixer = engine.mixer().clone();
    let sample_rate = mixer.sample_rate() as f64;
    let channels = mixer.num_channels() as usize;
    let frame_at = |time: Duration| (time.as_secs_f64() * sample_rate).round() as u64;

    if !engine.toggle_record() {
        return Err(EngineError::RecordingUnavailable(output.to_path_buf()));
    }
    engine.start();

    let duration = engine.loop_duration() * loops;
    let total_frames = frame_at(duration);
    info!(
        file = filename_display(output),
        loops,
        frames = total_frames,
        "Rendering"
    );

    let mut buffer = vec![0.0f32; RENDER_CHUNK_FRAMES * channels];
    let mut rendered: u64 = 0;
    while rendered < total_frames {
        // Fire every tick that lands on this frame.
        while let Some(due) = scheduler.next_due() {
            if frame_at(due) > rendered {
                break;
            }
            scheduler.advance_to(due);
        }

        let mut frames = (RENDER_CHUNK_FRAMES as u64).min(total_frames - rendered);
        if let Some(due) = scheduler.next_due() {
            frames = frames.min(frame_at(due) - rendered);
        }
        let samples = frames as usize * channels;
        mixer.process_into(&mut buffer[..samples]);
        rendered += frames;
    }

    // Stopping the recording stops the transport and finalizes the file.
    engine.toggle_record();
    info!(file = filename_display(output), "Render complete");
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_constant_wav;

    #[test]
    fn test_render_places_hits_on_blocks() {
        let dir = tempfile::tempdir().unwrap();
        write_constant_wav(dir.path().join("kick.wav"), 0.5, 100, 8000).unwrap();
        let config = EngineConfig::from_yaml(
            r#"
            blocks: 4
            blocks_per_second: 4
            audio:
              device: mock
              sample_rate: 8000
              channels: 1
            instruments:
              - { name: kick, sample: kick.wav }
            pattern:
              - { instrument: kick, pitch: C0, block: 0 }
              - { instrument: kick, pitch: C0, block: 2 }
            "#,
            dir.path(),
        )
        .unwrap();

        let output = dir.path().join("bounce.wav");
        let duration = render_offline(&config, &output, 2).unwrap();
        assert_eq!(duration, Duration::from_secs(2));

        let mut reader = hound::WavReader::open(&output).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 16000);

        // Hits at 0s, 0.5s, 1s and 1.5s, each 100 frames long.
        for hit in [0, 4000, 8000, 12000] {
            assert_eq!(samples[hit], 0.5, "missing hit at frame {}", hit);
            assert_eq!(samples[hit + 99], 0.5);
            assert_eq!(samples[hit + 100], 0.0);
        }
        assert_eq!(samples[2000], 0.0);
        assert_eq!(samples[15999], 0.0);
    }

    #[test]
    fn test_render_to_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            EngineConfig::from_yaml("blocks: 4\nblocks_per_second: 4", dir.path()).unwrap();
        let result = render_offline(&config, &dir.path().join("nope").join("out.wav"), 1);
        assert!(matches!(result, Err(EngineError::RecordingUnavailable(_))));
    }
}
