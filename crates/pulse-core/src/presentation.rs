//! The presenter view's event loop.
//!
//! [`run_presentation`] is a single task that owns the [`Simulation`] and
//! reacts to four kinds of input in one `tokio::select!`:
//!
//! - teardown requested through [`ViewControl`]
//! - stream feed messages (spawn, reset, poll change)
//! - view events from the host (resize, card regions)
//! - the frame clock
//!
//! Nothing else touches the simulation while the loop runs, so no locking
//! is involved. Exiting the loop, for whatever reason, closes the feed's
//! subscriptions, stops the frame clock and drops the view event channel.

use std::sync::Arc;
use std::time::Duration;

use pulse_events::{FeedMessage, StreamError, StreamFeed};
use pulse_sim::{
    AnchorResolver, GridLayout, Region, RegionAnchors, SimError, Simulation, SimulationParams,
    Surface, TickOutcome, Viewport,
};
use pulse_store::MemoryStore;
use pulse_types::PollId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::PulseConfig;
use crate::control::ViewControl;

/// Capacity of the view event channel.
pub const VIEW_EVENT_CAPACITY: usize = 64;

/// Errors that end a presentation view.
#[derive(Debug, thiserror::Error)]
pub enum PresentationError {
    /// The stream feed could not be opened.
    #[error("stream feed error: {0}")]
    Stream(#[from] StreamError),

    /// The simulation could not be built.
    #[error("simulation error: {0}")]
    Sim(#[from] SimError),

    /// The loop task panicked or was aborted.
    #[error("presentation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Input from the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The surface changed size.
    Resize(Viewport),
    /// An option card was laid out at `region`.
    CardRegion {
        /// Option index of the card.
        option_index: usize,
        /// Its rectangle in viewport units.
        region: Region,
    },
    /// An option card is no longer on screen.
    CardRemoved {
        /// Option index of the card.
        option_index: usize,
    },
}

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresentationOptions {
    /// Time between frames.
    pub frame_interval: Duration,
    /// Card grid used for options the host has not reported a region for.
    /// `None` leaves such options anchored at the viewport center.
    pub layout: Option<GridLayout>,
}

impl Default for PresentationOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            layout: Some(GridLayout::default()),
        }
    }
}

/// Why a presentation loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationEnd {
    /// Teardown was requested.
    Teardown,
    /// The poll document was deleted.
    PollRemoved,
    /// The feed ended because the store went away.
    FeedClosed,
}

/// Counters reported when a loop stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationSummary {
    /// Why it stopped.
    pub end: PresentationEnd,
    /// Frames rendered.
    pub frames: u64,
    /// Particles spawned.
    pub spawned: u64,
    /// Resets observed.
    pub resets: u64,
}

/// Anchors the loop resolves against: host-reported regions first, then
/// the computed grid.
#[derive(Debug, Default)]
struct LoopAnchors {
    reported: RegionAnchors,
    grid: RegionAnchors,
}

impl LoopAnchors {
    fn relayout(&mut self, layout: Option<GridLayout>, option_count: usize, viewport: Viewport) {
        self.grid = layout.map_or_else(RegionAnchors::new, |l| l.anchors(option_count, viewport));
    }
}

impl AnchorResolver for LoopAnchors {
    fn resolve(&self, option_index: usize) -> Option<pulse_sim::DVec2> {
        self.reported
            .resolve(option_index)
            .or_else(|| self.grid.resolve(option_index))
    }
}

/// Run the presentation loop until teardown, poll deletion, or the feed
/// closing.
pub async fn run_presentation<S: Surface + ?Sized>(
    mut feed: StreamFeed,
    sim: &mut Simulation,
    surface: &mut S,
    mut events: mpsc::Receiver<ViewEvent>,
    control: &ViewControl,
    options: PresentationOptions,
) -> PresentationSummary {
    let poll_id = feed.poll_id();
    let mut ticker = tokio::time::interval(options.frame_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut anchors = LoopAnchors::default();
    let mut option_count = 0_usize;
    let mut events_open = true;
    let mut summary = PresentationSummary {
        end: PresentationEnd::Teardown,
        frames: 0,
        spawned: 0,
        resets: 0,
    };

    info!(poll = %poll_id, epoch = %feed.epoch(), "presentation started");

    summary.end = loop {
        tokio::select! {
            biased;

            () = control.stopped() => break PresentationEnd::Teardown,

            message = feed.next() => match message {
                Some(FeedMessage::Spawn(event)) => {
                    if sim.spawn(&event) {
                        summary.spawned = summary.spawned.saturating_add(1);
                    }
                }
                Some(FeedMessage::Reset { epoch }) => {
                    info!(poll = %poll_id, %epoch, cleared = sim.len(), "poll reset, clearing particles");
                    sim.clear();
                    summary.resets = summary.resets.saturating_add(1);
                }
                Some(FeedMessage::PollChanged(poll)) => {
                    if poll.options.len() != option_count {
                        option_count = poll.options.len();
                        anchors.relayout(options.layout, option_count, sim.viewport());
                        debug!(poll = %poll_id, option_count, "card layout updated");
                    }
                }
                Some(FeedMessage::PollRemoved) => break PresentationEnd::PollRemoved,
                None => break PresentationEnd::FeedClosed,
            },

            event = events.recv(), if events_open => match event {
                Some(ViewEvent::Resize(viewport)) => match sim.resize(viewport) {
                    Ok(()) => anchors.relayout(options.layout, option_count, viewport),
                    Err(e) => warn!(poll = %poll_id, error = %e, "ignoring resize"),
                },
                Some(ViewEvent::CardRegion { option_index, region }) => {
                    anchors.reported.set_region(option_index, region);
                }
                Some(ViewEvent::CardRemoved { option_index }) => {
                    anchors.reported.remove(option_index);
                }
                None => events_open = false,
            },

            _ = ticker.tick() => {
                if sim.tick(&anchors) == TickOutcome::Stepped {
                    trace!(poll = %poll_id, alpha = sim.alpha(), "frame stepped");
                }
                // With no particles this only flushes a clear pending after a reset.
                sim.render(surface);
                summary.frames = summary.frames.saturating_add(1);
                control.record_frame();
            }
        }
    };

    // One teardown path for every exit.
    feed.close();
    drop(events);
    drop(ticker);

    info!(
        poll = %poll_id,
        end = ?summary.end,
        frames = summary.frames,
        spawned = summary.spawned,
        resets = summary.resets,
        "presentation stopped"
    );
    summary
}

/// What a spawned presentation hands back when it stops.
#[derive(Debug)]
pub struct Presented<S> {
    /// Loop counters.
    pub summary: PresentationSummary,
    /// The simulation in its final state.
    pub simulation: Simulation,
    /// The surface, returned to the owner.
    pub surface: S,
}

/// Owner's side of a spawned presentation task.
#[derive(Debug)]
pub struct PresentationHandle<S> {
    control: Arc<ViewControl>,
    events: mpsc::Sender<ViewEvent>,
    task: JoinHandle<Presented<S>>,
}

impl<S> PresentationHandle<S> {
    /// Shared control state.
    pub const fn control(&self) -> &Arc<ViewControl> {
        &self.control
    }

    /// Send a view event. Returns `false` if the loop has already stopped.
    pub async fn send(&self, event: ViewEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Whether the loop task has finished on its own.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request teardown and wait for the loop to stop.
    ///
    /// # Errors
    ///
    /// Returns [`PresentationError::Join`] if the task panicked.
    pub async fn teardown(self) -> Result<Presented<S>, PresentationError> {
        self.control.request_stop();
        drop(self.events);
        Ok(self.task.await?)
    }
}

/// Open a feed for `poll_id` and run a presentation loop for it on a new
/// task.
///
/// # Errors
///
/// Returns [`PresentationError::Stream`] if the poll does not exist or
/// cannot be subscribed to, and [`PresentationError::Sim`] if the
/// simulation parameters or viewport are invalid.
pub fn spawn_presentation<S>(
    store: &MemoryStore,
    poll_id: PollId,
    params: SimulationParams,
    viewport: Viewport,
    mut surface: S,
    options: PresentationOptions,
) -> Result<PresentationHandle<S>, PresentationError>
where
    S: Surface + Send + 'static,
{
    let mut simulation = Simulation::new(params, viewport)?;
    let feed = StreamFeed::open(store, poll_id)?;
    let (tx, rx) = mpsc::channel(VIEW_EVENT_CAPACITY);
    let control = Arc::new(ViewControl::new());

    let task = {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            let summary =
                run_presentation(feed, &mut simulation, &mut surface, rx, &control, options).await;
            Presented {
                summary,
                simulation,
                surface,
            }
        })
    };

    Ok(PresentationHandle {
        control,
        events: tx,
        task,
    })
}

/// [`spawn_presentation`] with physics, starting viewport and loop settings
/// taken from `config`.
///
/// # Errors
///
/// As [`spawn_presentation`].
pub fn spawn_configured_presentation<S>(
    config: &PulseConfig,
    store: &MemoryStore,
    poll_id: PollId,
    surface: S,
) -> Result<PresentationHandle<S>, PresentationError>
where
    S: Surface + Send + 'static,
{
    spawn_presentation(
        store,
        poll_id,
        config.simulation_params(),
        config.viewport(),
        surface,
        config.presentation_options(),
    )
}
