//! Audio backend tests
//!
//! Players run against a device-less output whose samples the test pulls
//! itself, one 100 ms block whenever the engine has nothing to deliver.

use gramophone_audio::{AudioBackendFactory, AudioOutput};
use gramophone_core::Track;
use gramophone_playback::engine::{self, EngineEvents, HttpResolver, ReadyReason};
use gramophone_playback::{EngineEvent, LocalPlayer, Playback, StreamingPlayer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RATE: u32 = 44_100;
const BLOCK_FRAMES: usize = RATE as usize / 10;

// ===== Helpers =====

fn wav_bytes(secs: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (RATE as f32 * secs) as u32;
        for n in 0..frames {
            let t = n as f32 / RATE as f32;
            let sample = ((t * 440.0 * std::f32::consts::TAU).sin() * 16_000.0) as i16;
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn write_wav(dir: &TempDir, name: &str, secs: f32) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, wav_bytes(secs)).unwrap();
    path.to_string_lossy().into_owned()
}

fn silent_factory() -> (AudioBackendFactory, Arc<AudioOutput>) {
    let output = Arc::new(AudioOutput::silent(RATE));
    (AudioBackendFactory::with_output(Arc::clone(&output)), output)
}

fn local_player() -> (LocalPlayer, EngineEvents, Arc<AudioOutput>) {
    let (factory, output) = silent_factory();
    let (notifier, events) = engine::channel();
    (LocalPlayer::local(Arc::new(factory), notifier), events, output)
}

/// Deliver engine messages and render audio until `until` matches
async fn drive<P, F>(
    player: &mut P,
    events: &mut EngineEvents,
    output: &AudioOutput,
    until: F,
) -> Vec<EngineEvent>
where
    P: Playback,
    F: Fn(&EngineEvent) -> bool,
{
    let mut seen = Vec::new();
    let mut block = vec![0.0f32; BLOCK_FRAMES * 2];
    for _ in 0..1_000 {
        while let Ok(Some(message)) =
            tokio::time::timeout(Duration::from_millis(5), events.recv()).await
        {
            for event in player.handle(message) {
                let done = until(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
        }
        output.render(&mut block, 2);
    }
    panic!("condition never met, saw {seen:?}");
}

fn is_prepared(event: &EngineEvent) -> bool {
    matches!(event, EngineEvent::StateChanged)
}

fn is_end(event: &EngineEvent) -> bool {
    matches!(
        event,
        EngineEvent::ReadyChanged {
            ready: false,
            reason: ReadyReason::EndOfMedia,
        }
    )
}

fn is_error(event: &EngineEvent) -> bool {
    matches!(event, EngineEvent::Error { .. })
}

// ===== Local files =====

#[tokio::test]
async fn test_reports_the_decoded_duration() {
    let dir = TempDir::new().unwrap();
    // Tracks carry no duration; the container supplies it
    let track = Track::new("tone", write_wav(&dir, "tone.wav", 1.0));
    let (mut player, mut events, output) = local_player();

    player.set_data_source(&track);
    drive(&mut player, &mut events, &output, is_prepared).await;

    let duration = player.duration().unwrap();
    assert!((duration.as_secs_f64() - 1.0).abs() < 0.01, "{duration:?}");
    assert_eq!(player.progress(), Some(Duration::ZERO));
}

#[tokio::test]
async fn test_plays_audio_to_the_end() {
    let dir = TempDir::new().unwrap();
    let track = Track::new("tone", write_wav(&dir, "tone.wav", 0.5));
    let (mut player, mut events, output) = local_player();

    player.set_data_source(&track);
    drive(&mut player, &mut events, &output, is_prepared).await;
    player.start();

    let mut block = vec![0.0f32; BLOCK_FRAMES * 2];
    output.render(&mut block, 2);
    assert!(block.iter().any(|s| s.abs() > 0.1), "expected a tone");
    assert!(player.progress().unwrap() >= Duration::from_millis(90));

    drive(&mut player, &mut events, &output, is_end).await;
    assert!(!player.is_playing());
}

#[tokio::test]
async fn test_paused_output_is_silent() {
    let dir = TempDir::new().unwrap();
    let track = Track::new("tone", write_wav(&dir, "tone.wav", 1.0));
    let (mut player, mut events, output) = local_player();

    player.set_data_source(&track);
    drive(&mut player, &mut events, &output, is_prepared).await;

    let mut block = vec![1.0f32; BLOCK_FRAMES * 2];
    output.render(&mut block, 2);
    assert!(block.iter().all(|s| *s == 0.0));
    assert_eq!(player.progress(), Some(Duration::ZERO));
}

#[tokio::test]
async fn test_volume_scales_the_output() {
    let dir = TempDir::new().unwrap();
    let track = Track::new("tone", write_wav(&dir, "tone.wav", 1.0));
    let (mut player, mut events, output) = local_player();

    player.set_volume(0);
    player.set_data_source(&track);
    drive(&mut player, &mut events, &output, is_prepared).await;
    player.start();

    let mut block = vec![1.0f32; BLOCK_FRAMES * 2];
    output.render(&mut block, 2);
    assert!(block.iter().all(|s| *s == 0.0));
}

#[tokio::test]
async fn test_seek_moves_the_position() {
    let dir = TempDir::new().unwrap();
    let track = Track::new("tone", write_wav(&dir, "tone.wav", 2.0));
    let (mut player, mut events, output) = local_player();

    player.set_data_source(&track);
    // Buffered until the source is ready
    player.set_progress(Duration::from_millis(1_500));
    drive(&mut player, &mut events, &output, is_prepared).await;

    let position = player.progress().unwrap();
    assert!(position >= Duration::from_millis(1_450), "{position:?}");
}

#[tokio::test]
async fn test_queued_file_takes_over_gaplessly() {
    let dir = TempDir::new().unwrap();
    let first = Track::new("first", write_wav(&dir, "first.wav", 0.3));
    let second = Track::new("second", write_wav(&dir, "second.wav", 0.3));
    let (mut player, mut events, output) = local_player();

    player.set_data_source(&first);
    drive(&mut player, &mut events, &output, is_prepared).await;
    player.queue_data_source(&second);
    player.start();

    let seen = drive(&mut player, &mut events, &output, |e| {
        matches!(e, EngineEvent::TrackChanged) || is_end(e)
    })
    .await;
    assert!(matches!(seen.last(), Some(EngineEvent::TrackChanged)), "{seen:?}");
    assert!(player.is_playing());

    drive(&mut player, &mut events, &output, is_end).await;
}

// ===== Failures =====

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing: PathBuf = dir.path().join("missing.flac");
    let track = Track::new("missing", missing.to_string_lossy());
    let (mut player, mut events, output) = local_player();

    player.set_data_source(&track);
    player.start();
    let seen = drive(&mut player, &mut events, &output, is_error).await;

    match seen.last() {
        Some(EngineEvent::Error { message, handoff }) => {
            assert!(message.contains("missing.flac"), "{message}");
            assert!(!handoff);
        }
        other => panic!("expected an error, got {other:?}"),
    }
    assert!(!player.is_ready());
}

#[tokio::test]
async fn test_undecodable_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.mp3");
    std::fs::write(&path, b"shopping list: eggs, milk").unwrap();
    let track = Track::new("notes", path.to_string_lossy());
    let (mut player, mut events, output) = local_player();

    player.set_data_source(&track);
    drive(&mut player, &mut events, &output, is_error).await;
}

#[tokio::test]
async fn test_undecodable_successor_fails_the_handoff() {
    let dir = TempDir::new().unwrap();
    let first = Track::new("first", write_wav(&dir, "first.wav", 0.3));
    let path = dir.path().join("broken.wav");
    std::fs::write(&path, b"RIFF but not really").unwrap();
    let broken = Track::new("broken", path.to_string_lossy());
    let (mut player, mut events, output) = local_player();

    player.set_data_source(&first);
    drive(&mut player, &mut events, &output, is_prepared).await;
    player.queue_data_source(&broken);
    player.start();

    let seen = drive(&mut player, &mut events, &output, |e| is_error(e) || is_end(e)).await;
    match seen.last() {
        Some(EngineEvent::Error { handoff, .. }) => assert!(handoff),
        other => panic!("expected a handoff error, got {other:?}"),
    }
}

// ===== Streams =====

#[tokio::test]
async fn test_progressive_stream_plays() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/Audio/7/stream"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "audio/wav"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Audio/7/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "audio/wav")
                .set_body_bytes(wav_bytes(0.5)),
        )
        .mount(&server)
        .await;

    let (factory, output) = silent_factory();
    let (notifier, mut events) = engine::channel();
    let mut player =
        StreamingPlayer::streaming(HttpResolver::new().unwrap(), Arc::new(factory), notifier);

    let track = Track::new("remote", format!("{}/Audio/7/stream", server.uri()));
    player.set_data_source(&track);
    player.start();
    drive(&mut player, &mut events, &output, is_prepared).await;

    let duration = player.duration().unwrap();
    assert!((duration.as_secs_f64() - 0.5).abs() < 0.01, "{duration:?}");
    drive(&mut player, &mut events, &output, is_end).await;
}

#[tokio::test]
async fn test_stream_error_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/Audio/8/stream"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "audio/mpeg"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Audio/8/stream"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (factory, output) = silent_factory();
    let (notifier, mut events) = engine::channel();
    let mut player =
        StreamingPlayer::streaming(HttpResolver::new().unwrap(), Arc::new(factory), notifier);

    let track = Track::new("remote", format!("{}/Audio/8/stream", server.uri()));
    player.set_data_source(&track);
    drive(&mut player, &mut events, &output, is_error).await;
}
