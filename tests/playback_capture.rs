use chrono::NaiveDate;
use invest_time_machine::config::Config;
use invest_time_machine::domain::errors::CaptureError;
use invest_time_machine::domain::models::{PlaybackMode, SimulationRun};
use invest_time_machine::playback::clock::{ClockEvent, PlaybackClock};
use invest_time_machine::render::chart::RenderStyle;
use invest_time_machine::render::pipeline::RenderCapturePipeline;
use invest_time_machine::render::sink::{JsonLinesSink, MemorySink};
use invest_time_machine::simulation::SimulationService;
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{sleep, Duration};

fn simulate(tickers: &[&str]) -> Arc<SimulationRun> {
    let mut config = Config::default().simulation;
    config.tickers = tickers.iter().map(|t| t.to_string()).collect();
    config.start_date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    config.end_date = NaiveDate::from_ymd_opt(2021, 12, 31).unwrap();
    config.seed = Some(9);
    SimulationService::new().run(&config).unwrap()
}

fn pipeline_for(run: &SimulationRun) -> RenderCapturePipeline {
    let clock = PlaybackClock::new(run.frame_count(), Duration::from_millis(50));
    RenderCapturePipeline::new(clock, RenderStyle::default(), Config::default().capture)
}

#[test]
fn capture_while_capturing_is_rejected() {
    let run = simulate(&["AAPL", "TSLA"]);
    let pipeline = pipeline_for(&run);

    let mut first = pipeline.capture(&run, 1.0).unwrap();
    let head: Vec<usize> = first.by_ref().take(4).map(|f| f.frame_index).collect();
    assert_eq!(head, vec![0, 1, 2, 3]);

    let second = pipeline.capture(&run, 1.0);
    assert!(matches!(second, Err(CaptureError::AlreadyCapturing)));
    assert_eq!(pipeline.clock().snapshot().mode, PlaybackMode::Capturing);

    let tail: Vec<usize> = first.map(|f| f.frame_index).collect();
    assert_eq!(tail, (4..12).collect::<Vec<_>>());
    assert_eq!(pipeline.clock().snapshot().mode, PlaybackMode::Paused);
}

#[tokio::test(start_paused = true)]
async fn reset_while_playing_stops_ticking() {
    let clock = PlaybackClock::new(20, Duration::from_millis(50));
    let mut events = clock.subscribe();
    clock.play().unwrap();

    loop {
        match events.recv().await.unwrap() {
            ClockEvent::Tick(state) if state.frame_index == 7 => break,
            _ => {}
        }
    }

    let state = clock.reset();
    assert_eq!(state.mode, PlaybackMode::Stopped);
    assert_eq!(state.frame_index, 0);

    sleep(Duration::from_millis(500)).await;

    let state = clock.snapshot();
    assert_eq!(state.mode, PlaybackMode::Stopped);
    assert_eq!(state.frame_index, 0);
    loop {
        match events.try_recv() {
            Ok(ClockEvent::Tick(_)) => panic!("tick after reset"),
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("unexpected receive error: {}", e),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn playback_auto_pauses_at_the_end() {
    let clock = PlaybackClock::new(5, Duration::from_millis(50));
    let mut events = clock.subscribe();
    clock.play().unwrap();

    let mut frames = Vec::new();
    loop {
        match events.recv().await.unwrap() {
            ClockEvent::Tick(state) => frames.push(state.frame_index),
            ClockEvent::AutoPaused(state) => {
                assert_eq!(state.frame_index, 4);
                assert!(!state.is_playing);
                break;
            }
            _ => {}
        }
    }
    assert_eq!(frames, vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn export_restores_playback_after_capture() {
    let run = simulate(&["SPY"]);
    let pipeline = pipeline_for(&run);
    pipeline.clock().seek(5).unwrap();

    let mut sink = MemorySink::new();
    let report = pipeline.export(&run, 1.0, &mut sink).await.unwrap();

    assert_eq!(report.frame_count, run.frame_count());
    let indices: Vec<usize> = sink.frames.iter().map(|f| f.frame_index).collect();
    assert_eq!(indices, (0..run.frame_count()).collect::<Vec<_>>());
    assert!(sink.frames.iter().all(|f| f.image.width == 1200 && f.image.height == 600));

    let state = pipeline.clock().snapshot();
    assert_eq!(state.mode, PlaybackMode::Paused);
    assert_eq!(state.frame_index, run.last_frame());
    assert!(!pipeline.is_capturing());
}

#[tokio::test(start_paused = true)]
async fn cancelled_export_discards_output() {
    let run = simulate(&["NVDA"]);
    let pipeline = Arc::new(pipeline_for(&run));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.jsonl");

    let canceller = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(120)).await;
            pipeline.cancel_capture()
        })
    };

    let mut sink = JsonLinesSink::new(&path);
    let result = pipeline.export(&run, 1.0, &mut sink).await;

    assert!(canceller.await.unwrap().is_ok());
    assert!(matches!(result, Err(CaptureError::Cancelled)));
    assert!(!path.exists());
    assert!(!pipeline.is_capturing());
}

#[tokio::test(start_paused = true)]
async fn export_writes_json_lines() {
    let run = simulate(&["MSFT", "AMD", "QQQ"]);
    let pipeline = pipeline_for(&run);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.jsonl");

    let mut sink = JsonLinesSink::new(&path);
    let report = pipeline.export(&run, 2.0, &mut sink).await.unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), report.frame_count + 1);
    assert!(contents.lines().next().unwrap().contains("video/webm"));
    assert_eq!(report.frame_interval_ms, 25.0);
}
