//! Run controller: interactive commands plus an autonomous stepping loop.
//!
//! Lifecycle:
//!
//! ```text
//! Idle ──start()──▶ Active ──request_stop()──▶ ShuttingDown ──loop exits──▶ Stopped
//! ```
//!
//! Every state-changing command and every autonomous step performs a render
//! handoff through the [`RenderRendezvous`] before returning. Mutation and
//! handoff happen under a commit lock, so each render shows exactly the state
//! produced by its own change.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use hypergol_core::{CellIndex, NeighborGraph, Palette, Renderer, Rule};

use crate::automaton::{lock, GraphAutomaton};
use crate::error::{AutomatonError, AutomatonResult};
use crate::rendezvous::RenderRendezvous;

/// Default delay between autonomous steps.
pub const DEFAULT_RATE: Duration = Duration::from_millis(500);

/// Longest the stepping loop waits before re-checking its flags.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, no background activity.
    Idle,
    /// Stepping loop and render consumer running.
    Active,
    /// Stop requested, background threads draining.
    ShuttingDown,
    /// Background threads have exited.
    Stopped,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Active => "active",
            Lifecycle::ShuttingDown => "shutting down",
            Lifecycle::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct RunControl {
    rate: Duration,
    running: bool,
    alive: bool,
    lifecycle: Lifecycle,
}

struct Shared<G: NeighborGraph> {
    automaton: Arc<GraphAutomaton<G>>,
    rendezvous: RenderRendezvous,
    control: Mutex<RunControl>,
    wake: Condvar,
    commit: Mutex<()>,
    labels: AtomicBool,
    palette: Palette,
}

impl<G: NeighborGraph> Shared<G> {
    /// Render handoff; skipped while idle (no consumer yet).
    fn handoff(&self) -> AutomatonResult<()> {
        let lifecycle = lock(&self.control).lifecycle;
        match lifecycle {
            Lifecycle::Idle => Ok(()),
            Lifecycle::Active => self.rendezvous.request(),
            Lifecycle::ShuttingDown | Lifecycle::Stopped => Err(AutomatonError::RenderAborted),
        }
    }

    /// Apply a mutation and hand the result to the renderer.
    ///
    /// Nothing is mutated once shutdown has begun.
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&GraphAutomaton<G>) -> AutomatonResult<T>,
    ) -> AutomatonResult<T> {
        let _guard = lock(&self.commit);
        let lifecycle = lock(&self.control).lifecycle;
        if matches!(lifecycle, Lifecycle::ShuttingDown | Lifecycle::Stopped) {
            return Err(AutomatonError::RenderAborted);
        }
        let value = mutate(self.automaton.as_ref())?;
        self.handoff()?;
        Ok(value)
    }
}

/// Coordinates an operator, a rate-limited stepping loop and a renderer
/// around one shared [`GraphAutomaton`].
pub struct RunController<G: NeighborGraph + 'static> {
    shared: Arc<Shared<G>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl<G: NeighborGraph + 'static> RunController<G> {
    /// Create an idle controller with the default palette.
    pub fn new(automaton: Arc<GraphAutomaton<G>>) -> Self {
        Self::with_palette(automaton, Palette::default())
    }

    /// Create an idle controller with a custom palette.
    pub fn with_palette(automaton: Arc<GraphAutomaton<G>>, palette: Palette) -> Self {
        Self {
            shared: Arc::new(Shared {
                automaton,
                rendezvous: RenderRendezvous::new(),
                control: Mutex::new(RunControl {
                    rate: DEFAULT_RATE,
                    running: false,
                    alive: true,
                    lifecycle: Lifecycle::Idle,
                }),
                wake: Condvar::new(),
                commit: Mutex::new(()),
                labels: AtomicBool::new(false),
                palette,
            }),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// The shared automaton.
    pub fn automaton(&self) -> &Arc<GraphAutomaton<G>> {
        &self.shared.automaton
    }

    pub fn lifecycle(&self) -> Lifecycle {
        lock(&self.shared.control).lifecycle
    }

    /// Idle → Active: spawn the render consumer and the stepping loop.
    ///
    /// Calling `start` in any other state is a no-op.
    pub fn start<R: Renderer + 'static>(&self, renderer: R) -> AutomatonResult<()> {
        {
            let mut control = lock(&self.shared.control);
            if control.lifecycle != Lifecycle::Idle {
                warn!(lifecycle = %control.lifecycle, "controller_start_ignored");
                return Ok(());
            }
            control.lifecycle = Lifecycle::Active;
        }

        let render_shared = Arc::clone(&self.shared);
        let render = thread::Builder::new()
            .name("hypergol-render".into())
            .spawn(move || render_loop(&render_shared, renderer))?;

        let step_shared = Arc::clone(&self.shared);
        let stepper = thread::Builder::new()
            .name("hypergol-stepper".into())
            .spawn(move || stepping_loop(&step_shared))?;

        lock(&self.threads).extend([render, stepper]);
        info!("controller_started");
        Ok(())
    }

    /// Enable autonomous stepping.
    pub fn run(&self) {
        lock(&self.shared.control).running = true;
        self.shared.wake.notify_all();
        debug!("controller_running");
    }

    /// Disable autonomous stepping (the operator `stop` command).
    pub fn pause(&self) {
        lock(&self.shared.control).running = false;
        self.shared.wake.notify_all();
        debug!("controller_paused");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.control).running
    }

    /// Seconds between autonomous steps.
    pub fn rate(&self) -> f64 {
        lock(&self.shared.control).rate.as_secs_f64()
    }

    /// Set the seconds between autonomous steps; applies from the next step.
    pub fn set_rate(&self, seconds: f64) -> AutomatonResult<()> {
        if !(seconds >= 0.0) {
            return Err(AutomatonError::InvalidRate { value: seconds });
        }
        let rate = Duration::try_from_secs_f64(seconds)
            .map_err(|_| AutomatonError::InvalidRate { value: seconds })?;
        lock(&self.shared.control).rate = rate;
        self.shared.wake.notify_all();
        Ok(())
    }

    pub fn rule(&self) -> Rule {
        self.shared.automaton.rule()
    }

    /// Validate and install a rule; the previous rule stays on error.
    pub fn set_rule(&self, text: &str) -> AutomatonResult<Rule> {
        self.shared.automaton.set_rule(text)
    }

    pub fn set_cells(&self, indices: &[CellIndex], alive: bool) -> AutomatonResult<()> {
        self.shared.commit(|a| a.set_cells(indices, alive))
    }

    pub fn toggle_cells(&self, indices: &[CellIndex]) -> AutomatonResult<()> {
        self.shared.commit(|a| a.toggle_cells(indices))
    }

    pub fn clear(&self) -> AutomatonResult<()> {
        self.shared.commit(|a| {
            a.clear();
            Ok(())
        })
    }

    /// Step `n` times, rendering after each step.
    pub fn step(&self, n: usize) -> AutomatonResult<()> {
        for _ in 0..n {
            self.shared.commit(|a| {
                a.step();
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Step up to `n` times, checking `interrupted` before each step.
    ///
    /// Returns the number of steps taken.
    pub fn step_until_interrupted(
        &self,
        n: usize,
        interrupted: &AtomicBool,
    ) -> AutomatonResult<usize> {
        for taken in 0..n {
            if interrupted.load(Ordering::SeqCst) {
                debug!(taken, requested = n, "operator_steps_interrupted");
                return Ok(taken);
            }
            self.step(1)?;
        }
        Ok(n)
    }

    pub fn randomize<R: Rng + ?Sized>(
        &self,
        p_alive: f64,
        limit: Option<usize>,
        rng: &mut R,
    ) -> AutomatonResult<()> {
        self.shared.commit(|a| a.randomize(p_alive, limit, rng))
    }

    /// Recenter on a cell and grow around it if needed.
    ///
    /// Returns the number of cells added.
    pub fn move_to(&self, index: CellIndex) -> AutomatonResult<usize> {
        self.shared.commit(|a| {
            a.recenter_at(index)?;
            a.grow_if_needed(index)
        })
    }

    /// Show or hide cell index labels.
    pub fn set_labels(&self, on: bool) -> AutomatonResult<()> {
        self.shared.labels.store(on, Ordering::SeqCst);
        self.render()
    }

    /// Force a redraw of the current state.
    pub fn render(&self) -> AutomatonResult<()> {
        self.shared.commit(|_| Ok(()))
    }

    /// Active → ShuttingDown: clear both flags and abort the rendezvous.
    pub fn request_stop(&self) {
        {
            let mut control = lock(&self.shared.control);
            control.running = false;
            control.alive = false;
            control.lifecycle = match control.lifecycle {
                Lifecycle::Active => Lifecycle::ShuttingDown,
                Lifecycle::Idle => Lifecycle::Stopped,
                other => other,
            };
        }
        self.shared.wake.notify_all();
        self.shared.rendezvous.abort();
        info!("controller_stop_requested");
    }

    /// Request a stop and wait for the background threads to exit.
    pub fn shutdown(&self) {
        self.request_stop();
        let handles: Vec<_> = lock(&self.threads).drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("controller_thread_panicked");
            }
        }
        lock(&self.shared.control).lifecycle = Lifecycle::Stopped;
        info!("controller_stopped");
    }
}

impl<G: NeighborGraph + 'static> Drop for RunController<G> {
    fn drop(&mut self) {
        if self.lifecycle() != Lifecycle::Stopped || !lock(&self.threads).is_empty() {
            self.shutdown();
        }
    }
}

impl<G: NeighborGraph + 'static> fmt::Debug for RunController<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunController")
            .field("lifecycle", &self.lifecycle())
            .field("automaton", &self.shared.automaton)
            .finish()
    }
}

fn render_loop<G: NeighborGraph, R: Renderer>(shared: &Shared<G>, mut renderer: R) {
    let mut labels_shown = false;
    while shared.rendezvous.serve(|| {
        let colors = shared
            .automaton
            .with_states(|states| shared.palette.colors_for(states));
        renderer.render(&colors);

        let labels = shared.labels.load(Ordering::SeqCst);
        if labels || labels_shown {
            renderer.clear_labels();
        }
        if labels {
            let centers: Vec<_> = shared
                .automaton
                .with_graph(|g| (0..g.cell_count()).map(|i| g.center_of(i)).collect());
            for (index, center) in centers.into_iter().enumerate() {
                renderer.place_label(index, center);
            }
        }
        labels_shown = labels;
    }) {}
    debug!("render_loop_exited");
}

fn stepping_loop<G: NeighborGraph>(shared: &Shared<G>) {
    loop {
        let rate = {
            let mut control = lock(&shared.control);
            loop {
                if !control.alive {
                    control.lifecycle = Lifecycle::Stopped;
                    debug!("stepping_loop_exited");
                    return;
                }
                if control.running {
                    break control.rate;
                }
                control = shared
                    .wake
                    .wait_timeout(control, POLL_INTERVAL)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        };

        let started = Instant::now();
        let committed = shared.commit(|a| {
            a.step();
            Ok(())
        });
        if let Err(err) = committed {
            debug!(error = %err, "autonomous_step_aborted");
            continue;
        }

        let deadline = started + rate;
        let mut control = lock(&shared.control);
        while control.alive {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            control = shared
                .wake
                .wait_timeout(control, (deadline - now).min(POLL_INTERVAL))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
