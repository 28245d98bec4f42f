mod common;

use std::{io::Cursor, thread, time::Duration};

use bandscope::{
    audio::{Channel, PolledSource},
    config::Config,
    render::Geometry,
    scheduler::Scheduler,
};
use common::{stereo_sine, RecordingRenderer};

const RATE: u32 = 44100;

fn pcm_bytes(frames: usize) -> Vec<u8> {
    stereo_sine(3000.0, 12000.0, RATE, frames)
        .into_iter()
        .flat_map(i16::to_le_bytes)
        .collect()
}

/// Polled source that has already read `frames` frames and hit end of input.
fn drained_source(config: &Config, frames: usize) -> PolledSource {
    let source = PolledSource::spawn(Cursor::new(pcm_bytes(frames)), &config.audio, 735).unwrap();
    for _ in 0..400 {
        if source.is_finished() {
            return source;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("reader thread did not finish");
}

fn renderer() -> RecordingRenderer {
    RecordingRenderer::new(vec![Geometry::new(0, 0, 62, 24)])
}

#[test]
fn test_underrun_repeats_previous_output_exactly() {
    let config = Config::default();
    let source = drained_source(&config, 8000);
    let mut renderer = renderer();
    let mut scheduler = Scheduler::new(config, Box::new(source));
    scheduler.configure(&mut renderer).unwrap();

    // first window ends 50 ms (2205 frames) behind the newest frame
    scheduler.tick(0, &mut renderer).unwrap();
    // 50 ms later it ends exactly on the newest frame
    scheduler.tick(50, &mut renderer).unwrap();
    // and then runs past the writer
    scheduler.tick(100, &mut renderer).unwrap();

    let fresh = renderer.bars(1, Channel::Left);
    assert!(fresh.iter().any(|&b| b > 0.0));
    assert_eq!(renderer.bars(2, Channel::Left), fresh);
    assert_eq!(renderer.bars(2, Channel::Right), renderer.bars(1, Channel::Right));

    let stats = scheduler.stats();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.underruns, 1);
}

#[test]
fn test_missed_ticks_count_once_across_channels_and_outputs() {
    let mut config = Config::default();
    config.audio.resync_after = 3;
    let source = drained_source(&config, 8000);
    let mut renderer = RecordingRenderer::new(vec![
        Geometry::new(0, 0, 62, 12),
        Geometry::new(0, 12, 62, 12),
    ]);
    let mut scheduler = Scheduler::new(config, Box::new(source));
    scheduler.configure(&mut renderer).unwrap();

    scheduler.tick(0, &mut renderer).unwrap();
    // four reads per tick, two missed ticks: still below the threshold
    scheduler.tick(100, &mut renderer).unwrap();
    scheduler.tick(110, &mut renderer).unwrap();
    assert_eq!(scheduler.stats().underruns, 2);

    // the third missed tick re-anchors and reads fresh frames
    scheduler.tick(120, &mut renderer).unwrap();
    assert_eq!(scheduler.stats().underruns, 2);
}

#[test]
fn test_reader_reanchors_after_consecutive_underruns() {
    let mut config = Config::default();
    config.audio.resync_after = 2;
    let source = drained_source(&config, 8000);
    let mut renderer = renderer();
    let mut scheduler = Scheduler::new(config, Box::new(source));
    scheduler.configure(&mut renderer).unwrap();

    scheduler.tick(0, &mut renderer).unwrap();
    scheduler.tick(100, &mut renderer).unwrap();
    assert_eq!(scheduler.stats().underruns, 1);

    // second missed tick lines the window up behind the newest frame again
    scheduler.tick(150, &mut renderer).unwrap();
    assert_eq!(scheduler.stats().underruns, 1);
    // and later ticks read from there on
    scheduler.tick(160, &mut renderer).unwrap();
    assert_eq!(scheduler.stats().underruns, 1);
}
