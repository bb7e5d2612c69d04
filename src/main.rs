// src/main.rs
use invest_time_machine::analysis::accountant::totals_at_frame;
use invest_time_machine::config::Config;
use invest_time_machine::domain::errors::AppResult;
use invest_time_machine::domain::models::SimulationRun;
use invest_time_machine::playback::clock::{ClockEvent, PlaybackClock};
use invest_time_machine::render::chart::RenderStyle;
use invest_time_machine::render::pipeline::RenderCapturePipeline;
use invest_time_machine::render::sink::JsonLinesSink;
use invest_time_machine::simulation::SimulationService;

use tokio::signal::ctrl_c;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting invest_time_machine v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    // Generate the price histories and summaries
    let service = SimulationService::new();
    let run = service.run(&config.simulation)?;

    // Playback clock over the shared frame range
    let clock = PlaybackClock::from_config(&config.playback, run.frame_count())?;
    let mut pipeline =
        RenderCapturePipeline::new(clock.clone(), RenderStyle::default(), config.capture.clone());
    // no watermark asset ships with the binary
    pipeline.set_watermark(None);

    if config.playback.auto_play {
        log::info!("Playing {} frames. Press Ctrl+C to stop.", run.frame_count());
        play_to_end(&clock, &run).await?;
    }

    if let Some(path) = &config.capture.output_path {
        log::info!("Exporting capture to {}", path);
        let mut sink = JsonLinesSink::new(path);
        let report = pipeline
            .export(&run, config.capture.speed_multiplier, &mut sink)
            .await?;
        log::info!(
            "Captured {} frames ({:.1}s of video)",
            report.frame_count,
            report.duration_ms / 1000.0
        );
    }

    let state = clock.snapshot();
    let totals = totals_at_frame(&run.tickers, run.strategy, run.amount, state.frame_index);
    log::info!(
        "Frame {}: contributed {:.2} per ticker, combined value {:.2}, growth {:.2}%",
        state.frame_index,
        totals.contributed,
        totals.combined_value,
        totals.growth_pct
    );

    log::info!("Done. Goodbye!");
    Ok(())
}

/// Run the clock until it auto-pauses on the last frame or Ctrl+C arrives
async fn play_to_end(clock: &PlaybackClock, run: &SimulationRun) -> AppResult<()> {
    let mut events = clock.subscribe();
    clock.play()?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ClockEvent::Tick(state)) => {
                    let totals = totals_at_frame(&run.tickers, run.strategy, run.amount, state.frame_index);
                    log::debug!(
                        "Frame {}/{}: value {:.2}",
                        state.frame_index,
                        state.last_frame,
                        totals.combined_value
                    );
                }
                Ok(ClockEvent::AutoPaused(state)) => {
                    log::info!("Playback finished at frame {}", state.frame_index);
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Skipped {} playback events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = ctrl_c() => {
                log::info!("Interrupted, pausing playback");
                clock.pause()?;
                break;
            }
        }
    }

    Ok(())
}
