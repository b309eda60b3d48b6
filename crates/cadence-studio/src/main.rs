use std::cell::Cell;
use std::rc::Rc;

use anyhow::Result;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use cadence_engine::core::{App, AppControl};
use cadence_engine::logging::{init_logging, LoggingConfig};
use cadence_engine::scheduler::FrameScheduler;
use cadence_engine::window::{FrameSourcePreference, Runtime, RuntimeConfig};

/// How long the demo runs, in scheduler milliseconds.
const RUN_FOR_MS: f64 = 5000.0;

/// Demo: counts frames, reports the frame rate once per second, and stops
/// the scheduler after `RUN_FOR_MS`.
struct Studio {
    frames: Rc<Cell<u64>>,
}

impl App for Studio {
    fn start(&mut self, scheduler: &FrameScheduler) {
        let frames = self.frames.clone();
        scheduler.add(move |_| frames.set(frames.get() + 1));

        let weak = scheduler.downgrade();
        let frames = self.frames.clone();
        let mut last_count = 0;
        scheduler.schedule_interval(
            move || {
                let Some(s) = weak.upgrade() else { return };
                let count = frames.get();
                log::info!(
                    "t={:>8.1} ms  frames={count:>5}  ~{} fps",
                    s.time(),
                    count - last_count
                );
                last_count = count;
            },
            1000.0,
        );

        let weak = scheduler.downgrade();
        scheduler.schedule_timeout(
            move || {
                if let Some(s) = weak.upgrade() {
                    log::info!("demo finished at t={:.1} ms", s.time());
                    s.stop();
                }
            },
            RUN_FOR_MS,
        );

        scheduler.start();
    }

    fn on_window_event(&mut self, scheduler: &FrameScheduler, event: &WindowEvent) -> AppControl {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            if event.state == ElementState::Pressed
                && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
            {
                log::info!("escape pressed at t={:.1} ms", scheduler.time());
                return AppControl::Exit;
            }
        }
        AppControl::Continue
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let headless = std::env::args().any(|a| a == "--headless");
    let config = RuntimeConfig {
        title: "Cadence Studio".to_string(),
        frame_source: if headless {
            FrameSourcePreference::Timer
        } else {
            FrameSourcePreference::Auto
        },
        ..RuntimeConfig::default()
    };

    let frames = Rc::new(Cell::new(0));
    Runtime::run(config, Studio { frames: frames.clone() })?;

    log::info!("delivered {} frames", frames.get());
    Ok(())
}
