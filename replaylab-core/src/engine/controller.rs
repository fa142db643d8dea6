//! Controller: state machine, stepping worker, and control-plane operations.
//!
//! ```text
//! Unconfigured ──setup──▶ Ready ──start──▶ Running ◀──start/pause──▶ Paused
//!                           ▲                  │                        │
//!                           └──────── stop ────┴────────────────────────┘
//! ```
//!
//! Locks are always taken in the order control, simulator, publisher. The
//! worker holds the control and simulator locks only while stepping and
//! publishes with neither held, so control operations stay responsive while
//! the renderer catches up.

use super::config::{validate_interval, SimulationConfig};
use super::error::{ConfigError, ControlError};
use super::publish::{FramePublisher, Renderer};
use super::simulator::Simulator;
use crate::domain::{Direction, Frame, Params};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimState {
    Unconfigured,
    Ready,
    Running,
    Paused,
}

struct ControlState {
    state: SimState,
    interval: Duration,
    shutdown: bool,
}

struct Shared {
    control: Mutex<ControlState>,
    /// Signalled on every state change and on shutdown.
    wake: Condvar,
    sim: Mutex<Simulator>,
    publisher: Mutex<FramePublisher>,
}

pub struct Controller {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Controller {
    /// Take ownership of `simulator` and spawn the stepping worker.
    pub fn new(simulator: Simulator, renderer: Box<dyn Renderer>) -> io::Result<Self> {
        let state = if simulator.is_configured() {
            SimState::Ready
        } else {
            SimState::Unconfigured
        };
        let interval = simulator
            .config()
            .and_then(|c| interval_duration(c.interval))
            .unwrap_or_default();
        let shared = Arc::new(Shared {
            control: Mutex::new(ControlState {
                state,
                interval,
                shutdown: false,
            }),
            wake: Condvar::new(),
            sim: Mutex::new(simulator),
            publisher: Mutex::new(FramePublisher::new(renderer)),
        });
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("replaylab-worker".into())
                .spawn(move || worker_loop(&shared))?
        };
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    pub fn state(&self) -> SimState {
        self.shared.control.lock().state
    }

    /// The simulator's current frame, if configured.
    pub fn frame(&self) -> Option<Frame> {
        self.shared.sim.lock().frame()
    }

    /// Run `f` against the simulator. Blocks while a step is in progress.
    pub fn with_simulator<R>(&self, f: impl FnOnce(&Simulator) -> R) -> R {
        f(&self.shared.sim.lock())
    }

    // ─── Configuration ───────────────────────────────────────────────

    /// Configure the replay and publish its initial frame out of band.
    pub fn setup(&self, config: SimulationConfig) -> Result<Frame, ControlError> {
        let mut control = self.shared.control.lock();
        refuse_while_active(control.state, "setup")?;
        let interval = interval_duration(config.interval);
        let mut sim = self.shared.sim.lock();
        let frame = sim.setup(config)?;
        let sequence = sim.sequence();
        drop(sim);

        control.interval = interval.unwrap_or_default();
        self.transition(&mut control, SimState::Ready);
        self.shared.publisher.lock().publish_initial(&frame, sequence);
        Ok(frame)
    }

    pub fn add_indicator(&self, name: &str, module: &str, params: &Params) -> Result<(), ControlError> {
        self.add_plugin("add_indicator", |sim| sim.add_indicator(name, module, params))
    }

    pub fn add_trader(&self, name: &str, module: &str, params: &Params) -> Result<(), ControlError> {
        self.add_plugin("add_trader", |sim| sim.add_trader(name, module, params))
    }

    fn add_plugin(
        &self,
        operation: &str,
        add: impl FnOnce(&mut Simulator) -> Result<Option<Frame>, ConfigError>,
    ) -> Result<(), ControlError> {
        let control = self.shared.control.lock();
        refuse_while_active(control.state, operation)?;
        let mut sim = self.shared.sim.lock();
        let reset = add(&mut sim)?;
        let sequence = sim.sequence();
        drop(sim);
        if let Some(frame) = reset {
            self.shared.publisher.lock().publish_initial(&frame, sequence);
        }
        drop(control);
        Ok(())
    }

    // ─── Run control ─────────────────────────────────────────────────

    pub fn start(&self) -> Result<(), ControlError> {
        let mut control = self.shared.control.lock();
        match control.state {
            SimState::Running => return Err(refused("start", ControlError::AlreadyRunning)),
            SimState::Unconfigured => return Err(refused("start", ControlError::NotConfigured)),
            SimState::Ready | SimState::Paused => {}
        }
        if !self.shared.sim.lock().is_input_valid() {
            return Err(refused("start", ControlError::InvalidInput));
        }
        self.transition(&mut control, SimState::Running);
        Ok(())
    }

    /// Freeze stepping. The frame stays where it is.
    pub fn pause(&self) -> Result<(), ControlError> {
        let mut control = self.shared.control.lock();
        if control.state != SimState::Running {
            return Err(refused("pause", ControlError::NotRunning));
        }
        self.transition(&mut control, SimState::Paused);
        Ok(())
    }

    /// Halt stepping and return the frame to the start of the replay window.
    pub fn stop(&self) -> Result<Frame, ControlError> {
        let mut control = self.shared.control.lock();
        if control.state == SimState::Unconfigured {
            return Err(refused("stop", ControlError::NotConfigured));
        }
        // leave Running first so the worker cannot take another step
        self.transition(&mut control, SimState::Ready);
        self.rewind()
    }

    /// Rebuild every plugin and rewind. Refused while running.
    pub fn reset(&self) -> Result<Frame, ControlError> {
        let mut control = self.shared.control.lock();
        match control.state {
            SimState::Unconfigured => Err(refused("reset", ControlError::NotConfigured)),
            SimState::Running => Err(refused("reset", ControlError::Busy(SimState::Running))),
            SimState::Ready | SimState::Paused => {
                self.transition(&mut control, SimState::Ready);
                self.rewind()
            }
        }
    }

    /// Caller holds the control lock.
    fn rewind(&self) -> Result<Frame, ControlError> {
        let mut sim = self.shared.sim.lock();
        let frame = sim.reset()?;
        let sequence = sim.sequence();
        drop(sim);
        self.shared.publisher.lock().publish_initial(&frame, sequence);
        Ok(frame)
    }

    pub fn step_forward(&self) -> Result<Frame, ControlError> {
        self.step(Direction::Forward)
    }

    pub fn step_backward(&self) -> Result<Frame, ControlError> {
        self.step(Direction::Backward)
    }

    /// One manual step while not running, published like any other frame.
    fn step(&self, direction: Direction) -> Result<Frame, ControlError> {
        let control = self.shared.control.lock();
        match control.state {
            SimState::Running => {
                return Err(refused("step", ControlError::SteppingWhileRunning))
            }
            SimState::Unconfigured => return Err(refused("step", ControlError::NotConfigured)),
            SimState::Ready | SimState::Paused => {}
        }
        let mut sim = self.shared.sim.lock();
        let frame = sim.step(direction)?;
        let sequence = sim.sequence();
        drop(sim);
        publish(&self.shared, frame.clone(), sequence);
        drop(control);
        Ok(frame)
    }

    /// Wall-clock seconds between steps. Takes effect from the next step.
    pub fn set_interval(&self, seconds: f64) -> Result<(), ControlError> {
        let Some(interval) = interval_duration(seconds) else {
            return Err(refused("set_interval", ControlError::NegativeInterval(seconds)));
        };
        let mut control = self.shared.control.lock();
        control.interval = interval;
        self.shared.wake.notify_all();
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        self.shared.control.lock().interval
    }

    /// Block until the controller is not running, or `timeout` passes.
    /// Returns whether it is idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut control = self.shared.control.lock();
        while control.state == SimState::Running {
            if self
                .shared
                .wake
                .wait_until(&mut control, deadline)
                .timed_out()
            {
                return control.state != SimState::Running;
            }
        }
        true
    }

    fn transition(&self, control: &mut ControlState, to: SimState) {
        if control.state != to {
            tracing::info!(from = ?control.state, ?to, "state change");
            control.state = to;
        }
        self.shared.wake.notify_all();
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shared.control.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("replay worker panicked");
            }
        }
    }
}

fn interval_duration(seconds: f64) -> Option<Duration> {
    validate_interval(seconds).ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

fn refuse_while_active(state: SimState, operation: &str) -> Result<(), ControlError> {
    match state {
        SimState::Running | SimState::Paused => Err(refused(operation, ControlError::Busy(state))),
        SimState::Unconfigured | SimState::Ready => Ok(()),
    }
}

/// Wait for the outstanding ack with the publisher unlocked, then hand over.
///
/// Keeping the publisher free while waiting lets initial frames from stop,
/// reset or setup go out even when the renderer is sitting on a frame.
fn publish(shared: &Shared, frame: Frame, sequence: u64) {
    let pending = shared.publisher.lock().pending_ack();
    if let Some(rx) = pending {
        // Err: the handle was dropped
        let _ = rx.recv();
    }
    shared.publisher.lock().publish(frame, sequence);
}

fn refused(operation: &str, err: ControlError) -> ControlError {
    tracing::warn!(operation, "refused: {err}");
    err
}

// ─── Worker ──────────────────────────────────────────────────────────

fn worker_loop(shared: &Shared) {
    tracing::debug!("replay worker started");
    loop {
        let mut control = shared.control.lock();
        while !control.shutdown && control.state != SimState::Running {
            shared.wake.wait(&mut control);
        }
        if control.shutdown {
            break;
        }

        let started = Instant::now();
        let interval = control.interval;
        let mut sim = shared.sim.lock();
        if !sim.can_step(Direction::Forward) {
            drop(sim);
            tracing::info!("end of data");
            control.state = SimState::Paused;
            shared.wake.notify_all();
            continue;
        }
        let stepped = sim.step(Direction::Forward);
        let sequence = sim.sequence();
        drop(sim);
        drop(control);

        match stepped {
            Ok(frame) => publish(shared, frame, sequence),
            Err(e) => {
                tracing::warn!("step failed: {e}");
                let mut control = shared.control.lock();
                if control.state == SimState::Running {
                    control.state = SimState::Paused;
                    shared.wake.notify_all();
                }
                continue;
            }
        }

        let deadline = started + interval;
        let mut control = shared.control.lock();
        while control.state == SimState::Running && !control.shutdown {
            if shared.wake.wait_until(&mut control, deadline).timed_out() {
                break;
            }
        }
    }
    tracing::debug!("replay worker stopped");
}
