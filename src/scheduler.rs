// src/scheduler.rs
//! Fixed-rate tick loop driving source -> transform -> bars -> filters -> renderer.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, info, trace, warn};

use crate::{
    audio::{Channel, SampleSource},
    config::Config,
    error::{BandscopeError, Result},
    render::{Renderer, RendererSignal},
    spectrum::{BandAggregator, FilterChain, OutputTarget},
};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Starting,
    Running,
    Stopping,
}

/// What the loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The file source is exhausted
    EndOfStream,
}

/// Counters reported when the run stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    /// Ticks that took longer than one frame interval
    pub overruns: u64,
    /// Ticks that repeated their previous bars
    pub underruns: u64,
}

pub struct Scheduler {
    config: Config,
    source: Box<dyn SampleSource>,
    outputs: Vec<OutputTarget>,
    aggregator: BandAggregator,
    chain: FilterChain,
    state: SchedulerState,
    stats: RunStats,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(config: Config, source: Box<dyn SampleSource>) -> Self {
        let aggregator = BandAggregator::new(config.bands.compression);
        let chain = FilterChain::new(config.filters.stages.clone(), config.audio.frame_rate);
        Self {
            config,
            source,
            outputs: Vec::new(),
            aggregator,
            chain,
            state: SchedulerState::Starting,
            stats: RunStats::default(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the run before the next tick when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn outputs(&self) -> &[OutputTarget] {
        &self.outputs
    }

    /// Enumerate the renderer's outputs and rebuild every output's state.
    pub fn configure(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let sample_rate = self.source.sample_rate();
        let outputs = renderer
            .outputs()?
            .into_iter()
            .map(|geometry| OutputTarget::new(&self.config, geometry, sample_rate))
            .collect::<Result<Vec<_>>>()?;

        if outputs.is_empty() {
            return Err(BandscopeError::Render("renderer reported no outputs".into()));
        }
        for (i, output) in outputs.iter().enumerate() {
            debug!(output = i, geometry = ?output.geometry, bars = output.bars(), "output configured");
        }
        info!(
            outputs = outputs.len(),
            stages = ?self.chain.stages().iter().map(|s| s.name()).collect::<Vec<_>>(),
            "pipeline configured"
        );

        self.outputs = outputs;
        self.state = SchedulerState::Running;
        Ok(())
    }

    /// Run one tick at `elapsed_ms` since the start of the run.
    ///
    /// Channels that hit an underrun keep their previous bars; the renderer
    /// still receives them. When the source ends, the remaining channels keep
    /// their bars too and the frame is presented before reporting the end.
    pub fn tick(&mut self, elapsed_ms: u64, renderer: &mut dyn Renderer) -> Result<TickOutcome> {
        renderer.begin_frame()?;
        let mut repeated = false;
        let mut ended = false;

        for (index, output) in self.outputs.iter_mut().enumerate() {
            for channel in Channel::BOTH {
                let state = output.channel_mut(channel);
                if !ended {
                    match self.source.window(elapsed_ms, channel, state.samples_mut()) {
                        Ok(()) => {
                            state.process(&self.aggregator, &self.chain);
                        }
                        Err(BandscopeError::EndOfStream) => ended = true,
                        Err(e) if e.is_recoverable() => {
                            debug!(error = %e, ?channel, "repeating previous bars");
                            repeated = true;
                        }
                        Err(e) => return Err(e),
                    }
                }
                renderer.draw(index, &output.geometry, channel, output.channel(channel).bars())?;
            }
        }

        renderer.present()?;
        self.stats.ticks += 1;
        if ended {
            return Ok(TickOutcome::EndOfStream);
        }
        if repeated {
            self.stats.underruns += 1;
        }
        Ok(TickOutcome::Continue)
    }

    /// Configure if needed, tick until the source ends or a stop is requested,
    /// then release the renderer.
    pub fn run(&mut self, renderer: &mut dyn Renderer) -> Result<RunStats> {
        if self.state == SchedulerState::Starting {
            self.configure(renderer)?;
        }

        let result = self.run_loop(renderer);
        self.state = SchedulerState::Stopping;
        let finished = renderer.finish();

        info!(
            ticks = self.stats.ticks,
            overruns = self.stats.overruns,
            underruns = self.stats.underruns,
            "run finished"
        );
        result?;
        finished?;
        Ok(self.stats)
    }

    fn run_loop(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let frame = Duration::from_micros(1_000_000 / u64::from(self.config.audio.frame_rate.max(1)));
        let start = Instant::now();

        while !self.stop.load(Ordering::Acquire) {
            match renderer.poll()? {
                RendererSignal::Quit => {
                    info!("quit requested");
                    break;
                }
                RendererSignal::Resized => {
                    if let Err(e) = self.configure(renderer) {
                        warn!(error = %e, "output unusable after resize");
                        self.outputs.clear();
                    }
                }
                RendererSignal::None => {}
            }

            let tick_start = Instant::now();
            let elapsed_ms = start.elapsed().as_millis() as u64;
            if self.tick(elapsed_ms, renderer)? == TickOutcome::EndOfStream {
                info!(elapsed_ms, "end of stream");
                break;
            }

            match frame.checked_sub(tick_start.elapsed()) {
                Some(rest) => thread::sleep(rest),
                None => {
                    self.stats.overruns += 1;
                    trace!(elapsed_ms, "tick overran its frame");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::{audio::FileSource, render::Geometry};

    /// Renderer with a scripted layout: an optional resize on the first poll
    /// and a quit once `quit_after` polls have passed.
    #[derive(Default)]
    struct Counting {
        layout: Vec<Geometry>,
        resize_to: Option<Vec<Geometry>>,
        quit_after: Option<usize>,
        polls: usize,
        frames: usize,
        draws: usize,
        finished: bool,
    }

    impl Counting {
        fn new(layout: Vec<Geometry>) -> Self {
            Self {
                layout,
                ..Self::default()
            }
        }
    }

    impl Renderer for Counting {
        fn outputs(&mut self) -> Result<Vec<Geometry>> {
            Ok(self.layout.clone())
        }
        fn begin_frame(&mut self) -> Result<()> {
            Ok(())
        }
        fn draw(&mut self, _: usize, _: &Geometry, _: Channel, _: &[f32]) -> Result<()> {
            self.draws += 1;
            Ok(())
        }
        fn present(&mut self) -> Result<()> {
            self.frames += 1;
            Ok(())
        }
        fn poll(&mut self) -> Result<RendererSignal> {
            self.polls += 1;
            if let Some(layout) = self.resize_to.take() {
                self.layout = layout;
                return Ok(RendererSignal::Resized);
            }
            if self.quit_after.is_some_and(|n| self.polls > n) {
                return Ok(RendererSignal::Quit);
            }
            Ok(RendererSignal::None)
        }
        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.audio.fft_size = 64;
        config.audio.frame_rate = 200;
        config.bands.low_freq = 100.0;
        config.bands.high_freq = 3000.0;
        config
    }

    fn narrow() -> Vec<Geometry> {
        vec![Geometry::new(0, 0, 32, 20)]
    }

    fn silence(frames: usize) -> Box<dyn SampleSource> {
        Box::new(FileSource::from_samples(8000, vec![0.0; frames * 2]))
    }

    /// 1 kHz at 8 kHz: exactly 8 cycles per 64-frame window, so every window
    /// has the same magnitude spectrum.
    fn tone(frames: usize) -> Box<dyn SampleSource> {
        let samples = (0..frames)
            .flat_map(|i| {
                let v = 8000.0 * (2.0 * PI * (i % 8) as f32 / 8.0).sin();
                [v, v]
            })
            .collect();
        Box::new(FileSource::from_samples(8000, samples))
    }

    #[test]
    fn test_tick_draws_both_channels_of_each_output() {
        let mut renderer = Counting::new(narrow());
        let mut scheduler = Scheduler::new(small_config(), silence(8000));
        scheduler.configure(&mut renderer).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        let outcome = scheduler.tick(0, &mut renderer).unwrap();
        assert_eq!(outcome, TickOutcome::Continue);
        assert_eq!(renderer.draws, 2);
        assert_eq!(renderer.frames, 1);
    }

    #[test]
    fn test_end_of_stream_still_presents_every_output() {
        let mut renderer = Counting::new(vec![
            Geometry::new(0, 0, 32, 20),
            Geometry::new(0, 20, 32, 20),
        ]);
        let mut scheduler = Scheduler::new(small_config(), silence(100));
        scheduler.configure(&mut renderer).unwrap();
        // 64-frame window starting at frame 80 runs past the end
        assert_eq!(
            scheduler.tick(10, &mut renderer).unwrap(),
            TickOutcome::EndOfStream
        );
        assert_eq!(renderer.draws, 4);
        assert_eq!(renderer.frames, 1);
        assert_eq!(scheduler.stats().ticks, 1);
        assert_eq!(scheduler.stats().underruns, 0);
    }

    #[test]
    fn test_stop_before_run_finishes_cleanly() {
        let mut renderer = Counting::new(narrow());
        let mut scheduler = Scheduler::new(small_config(), silence(8000));
        scheduler.stop_handle().store(true, Ordering::Release);

        let stats = scheduler.run(&mut renderer).unwrap();
        assert_eq!(stats.ticks, 0);
        assert!(renderer.finished);
        assert_eq!(scheduler.state(), SchedulerState::Stopping);
    }

    #[test]
    fn test_resize_rebuilds_outputs_with_fresh_memory() {
        let mut renderer = Counting::new(narrow());
        let mut scheduler = Scheduler::new(small_config(), tone(80_000));
        scheduler.configure(&mut renderer).unwrap();
        for _ in 0..5 {
            scheduler.tick(0, &mut renderer).unwrap();
        }
        assert_eq!(scheduler.outputs()[0].bars(), 10);

        let wide = vec![Geometry::new(0, 0, 62, 20)];
        renderer.resize_to = Some(wide.clone());
        renderer.quit_after = Some(1);
        let stats = scheduler.run(&mut renderer).unwrap();
        assert_eq!(stats.ticks, 6);
        assert!(renderer.finished);
        assert_eq!(scheduler.outputs()[0].bars(), 20);

        // one tick on fresh state after the resize, as a new run would have
        let mut reference = Scheduler::new(small_config(), tone(80_000));
        scheduler_tick_once(&mut reference, wide);
        let got = &scheduler.outputs()[0].channel(Channel::Left).memory().integral;
        let want = &reference.outputs()[0].channel(Channel::Left).memory().integral;
        assert!(want.iter().any(|&v| v > 0.0));
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() <= 1e-3 * w.abs().max(1.0), "{g} != {w}");
        }
    }

    fn scheduler_tick_once(scheduler: &mut Scheduler, layout: Vec<Geometry>) {
        let mut renderer = Counting::new(layout);
        scheduler.configure(&mut renderer).unwrap();
        scheduler.tick(0, &mut renderer).unwrap();
    }

    #[test]
    fn test_resize_below_one_bar_clears_outputs() {
        let mut renderer = Counting::new(narrow());
        renderer.resize_to = Some(vec![Geometry::new(0, 0, 2, 20)]);
        renderer.quit_after = Some(3);
        let mut scheduler = Scheduler::new(small_config(), silence(80_000));

        let stats = scheduler.run(&mut renderer).unwrap();
        assert!(scheduler.outputs().is_empty());
        assert_eq!(stats.ticks, 3);
        assert_eq!(renderer.draws, 0);
        assert!(renderer.finished);
    }

    #[test]
    fn test_zero_width_output_is_config_error() {
        let mut renderer = Counting::new(vec![Geometry::new(0, 0, 2, 10)]);
        let mut scheduler = Scheduler::new(small_config(), silence(8000));
        assert!(matches!(
            scheduler.configure(&mut renderer),
            Err(BandscopeError::Config(_))
        ));
    }
}
