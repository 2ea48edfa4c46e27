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

//! End-to-end scenarios: real WAV files, the symphonia decoder, and the pool.

use std::path::PathBuf;
use std::sync::Arc;

use crate::midi::NoteOn;
use crate::samples::{
    EngineError, EngineOptions, PersistedState, SamplerEngine, Status, SymphoniaDecoder,
    VU_CEILING_DB, VU_FLOOR_DB,
};
use crate::testutil::{eventually, eventually_async, write_wav};

fn engine() -> SamplerEngine {
    SamplerEngine::new(
        Arc::new(SymphoniaDecoder::new()),
        EngineOptions {
            load_threads: 2,
            ..Default::default()
        },
    )
    .unwrap()
}

fn write_fixture(dir: &tempfile::TempDir, name: &str, channels: Vec<Vec<f32>>) -> PathBuf {
    let path = dir.path().join(name);
    write_wav(path.clone(), channels, 44100).unwrap();
    path
}

#[tokio::test]
async fn test_trigger_load_and_drain() {
    let dir = tempfile::tempdir().unwrap();
    let frames = 300;
    let path = write_fixture(&dir, "kick.wav", vec![vec![0.5; frames]]);

    let engine = engine();
    assert_eq!(engine.add_voice().unwrap(), 1);

    assert!(engine.set_midi_range(1, 60, 36));
    let state = engine.state(1).unwrap();
    assert_eq!((state.midi_low, state.midi_high), (36, 60));

    assert!(engine.trigger(1));
    assert!(!engine.state(1).unwrap().is_playing);

    engine.load_sample(1, &path).await.unwrap();
    let state = engine.state(1).unwrap();
    assert_eq!(state.status, Status::Loaded);
    assert_eq!(state.file_name, "kick.wav");
    assert_eq!(state.file_path, path.to_string_lossy());
    assert!(!state.waveform.contains("No sample"));

    assert!(engine.trigger(1));
    assert!(engine.state(1).unwrap().is_playing);

    // Drain in stereo blocks; the mono sample feeds both channels.
    let mut block = vec![0.0f32; 128 * 2];
    let mut rendered = Vec::new();
    while engine.state(1).unwrap().is_playing {
        block.fill(0.0);
        engine.process_block(&mut block, 2, &[]);
        rendered.extend_from_slice(&block);
    }
    assert_eq!(rendered.iter().filter(|s| **s == 0.5).count(), frames * 2);

    block.fill(0.0);
    engine.process_block(&mut block, 2, &[]);
    assert!(block.iter().all(|s| *s == 0.0));
}

#[test]
fn test_missing_id_callback() {
    let engine = engine();
    let (tx, rx) = std::sync::mpsc::channel();
    engine.load_sample_async(999, "/nonexistent.wav", move |result| {
        tx.send(result).unwrap();
    });
    assert!(matches!(
        rx.try_recv().unwrap(),
        Err(EngineError::UnknownVoice(999))
    ));
    assert_eq!(engine.voice_count(), 0);
}

#[test]
fn test_unreadable_file_sets_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.wav");
    std::fs::write(&path, b"RIFF but not really").unwrap();

    let engine = engine();
    let id = engine.add_voice().unwrap();
    engine.load_sample_async(id, &path, |_| {});
    eventually(
        || engine.state(id).map(|s| s.status) == Some(Status::Error),
        "Voice never reached the error state",
    );

    let state = engine.state(id).unwrap();
    assert!(state.message.is_some());
    let json = serde_json::to_value(engine.to_state()).unwrap();
    assert_eq!(json["players"][0]["status"], "error");
}

#[tokio::test]
async fn test_persisted_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let kick = write_fixture(&dir, "kick.wav", vec![vec![0.25; 64]]);
    let snare = write_fixture(&dir, "snare.wav", vec![vec![0.5; 64], vec![-0.5; 64]]);

    let original = engine();
    let kick_id = original.add_voice().unwrap();
    let empty_id = original.add_voice().unwrap();
    let snare_id = original.add_voice().unwrap();
    original.set_midi_range(kick_id, 36, 36);
    original.set_midi_range(snare_id, 40, 38);
    original.set_gain(snare_id, 1.25);
    original.load_sample(kick_id, &kick).await.unwrap();
    original.load_sample(snare_id, &snare).await.unwrap();

    let state_file = dir.path().join("state.json");
    original.export_state().save(&state_file).unwrap();

    let restored = engine();
    let persisted = PersistedState::load(&state_file).unwrap();
    assert_eq!(restored.import_state(&persisted), 2);
    assert_eq!(restored.export_state(), original.export_state());

    let restored_ref = &restored;
    eventually_async(
        move || async move {
            restored_ref
                .to_state()
                .players
                .iter()
                .filter(|p| p.status == Status::Loaded)
                .count()
                == 2
        },
        "Imported voices never reloaded",
    )
    .await;
    assert_eq!(restored.state(empty_id).unwrap().status, Status::Empty);

    // Note 39 only reaches the snare; stereo channels come through separately.
    let mut block = vec![0.0f32; 4];
    restored.process_block(&mut block, 2, &[NoteOn::new(39)]);
    assert_eq!(block, vec![0.625, -0.625, 0.625, -0.625]);
}

#[test]
fn test_vu_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "loud.wav", vec![vec![1.0; 8192]]);

    let engine = engine();
    let id = engine.add_voice().unwrap();
    engine.set_gain(id, 2.0);
    engine.load_sample_async(id, &path, |_| {});
    eventually(
        || engine.state(id).map(|s| s.status) == Some(Status::Loaded),
        "Sample never loaded",
    );

    engine.trigger(id);
    let mut block = vec![0.0f32; 1024];
    engine.process_block(&mut block, 1, &[]);
    assert_eq!(engine.vu_levels()[0].db, VU_CEILING_DB);

    let mut previous = VU_CEILING_DB;
    for _ in 0..300 {
        block.fill(0.0);
        engine.process_block(&mut block, 1, &[]);
        let level = engine.vu_levels()[0].db;
        assert!(level >= VU_FLOOR_DB);
        assert!(level <= previous + f32::EPSILON);
        previous = level;
    }
    assert!((previous - VU_FLOOR_DB).abs() < 0.01);
}
