use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl};
use crate::frame::TimerFrames;
use crate::scheduler::{FrameScheduler, SchedulerConfig};
use crate::time::{frame_interval_for_refresh, DEFAULT_FRAME_INTERVAL};

/// Where frames come from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum FrameSourcePreference {
    /// Use a window paced at the monitor refresh rate, falling back to
    /// the timer loop when no event loop can be created.
    #[default]
    Auto,
    /// Always use the headless timer loop.
    Timer,
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub frame_source: FrameSourcePreference,
    /// Frame interval for the timer loop, and for windows whose monitor
    /// does not report a refresh rate.
    pub fallback_interval: Duration,
    /// End the run once the scheduler is stopped and no frame is pending.
    /// The headless loop always ends in that state.
    pub exit_when_idle: bool,
    pub scheduler: SchedulerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "cadence".to_string(),
            initial_size: LogicalSize::new(640.0, 360.0),
            frame_source: FrameSourcePreference::default(),
            fallback_interval: DEFAULT_FRAME_INTERVAL,
            exit_when_idle: true,
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Builds a scheduler on the preferred frame source, hands it to `app`,
    /// and delivers frames until the run ends.
    pub fn run<A>(config: RuntimeConfig, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        match config.frame_source {
            FrameSourcePreference::Timer => Self::run_headless(config, app),
            FrameSourcePreference::Auto => match EventLoop::new() {
                Ok(event_loop) => Self::run_windowed(event_loop, config, app),
                Err(e) => {
                    log::warn!("no windowing event loop ({e}); using timer-paced frames");
                    Self::run_headless(config, app)
                }
            },
        }
    }

    fn run_headless<A>(config: RuntimeConfig, mut app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let frames = TimerFrames::with_interval(config.fallback_interval);
        let scheduler = FrameScheduler::with_config(frames.clone(), config.scheduler);

        log::info!(
            "headless frame loop at {:.2} ms per frame",
            config.fallback_interval.as_secs_f64() * 1000.0
        );

        app.start(&scheduler);
        if !scheduler.is_running() {
            log::info!("scheduler was not started; nothing to run");
        }

        frames.run_blocking();
        log::debug!("headless frame loop finished at t={}", scheduler.time());
        Ok(())
    }

    fn run_windowed<A>(event_loop: EventLoop<()>, config: RuntimeConfig, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let mut state = AppState::new(config, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct AppState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    app: A,

    frames: TimerFrames,
    scheduler: FrameScheduler,
    window: Option<Window>,

    started: bool,
    exit_requested: bool,
    error: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, app: A) -> Self {
        let frames = TimerFrames::with_interval(config.fallback_interval);
        let scheduler = FrameScheduler::with_config(frames.clone(), config.scheduler.clone());
        Self {
            config,
            app,
            frames,
            scheduler,
            window: None,
            started: false,
            exit_requested: false,
            error: None,
        }
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let refresh = window
            .current_monitor()
            .and_then(|m| m.refresh_rate_millihertz());
        let interval = match refresh {
            Some(mhz) => frame_interval_for_refresh(mhz),
            None => self.config.fallback_interval,
        };
        self.frames.set_interval(interval);
        log::info!(
            "window frame source at {:.2} ms per frame ({})",
            interval.as_secs_f64() * 1000.0,
            match refresh {
                Some(mhz) => format!("{:.1} Hz monitor", mhz as f64 / 1000.0),
                None => "refresh rate unknown".to_string(),
            }
        );

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn is_idle(&self) -> bool {
        !self.scheduler.is_running() && !self.frames.has_pending()
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.create_window(event_loop) {
            log::error!("failed to create window: {e:#}");
            self.error = Some(e);
            self.request_exit(event_loop);
            return;
        }

        if !self.started {
            self.started = true;
            self.app.start(&self.scheduler);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.started && self.config.exit_when_idle && self.is_idle() {
            log::info!("scheduler idle at t={}; exiting", self.scheduler.time());
            self.request_exit(event_loop);
            return;
        }

        match self.frames.next_deadline() {
            Some(deadline) if deadline <= Instant::now() => {
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
                event_loop.set_control_flow(ControlFlow::Wait);
            }
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }

        if self.app.on_window_event(&self.scheduler, &event) == AppControl::Exit {
            self.request_exit(event_loop);
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.window = None;
                self.scheduler.stop();
                self.request_exit(event_loop);
            }

            WindowEvent::RedrawRequested => {
                let delivered = self.frames.fire_due(Instant::now());
                if delivered > 0 {
                    log::trace!("delivered {delivered} frame request(s)");
                }
            }

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.scheduler.stop();
    }
}
