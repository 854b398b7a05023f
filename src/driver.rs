//! The event loop that ties pointer events, dwell timers and history fetches
//! together.
//!
//! Everything that touches the `OverlayManager` happens on this one loop, so
//! nothing needs locking.  Fetches run as separate tasks and report back here.
//! They are never cancelled; a repeated trigger for a window that is already
//! loading is absorbed by the manager's cache instead.

use std::fmt::Display;
use std::sync::Arc;

use chrono::TimeZone;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};

use crate::file_format::vcs_history::HistoryResponse;
use crate::hover::{HoverAction, HoverScheduler, PointerTarget};
use crate::loader::{FetchError, HistorySource, WindowKey};
use crate::manager::{FetchRequest, OverlayManager, Surface, Trigger};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UiEvent {
    TriggerEntered(Trigger),
    TriggerLeft { to: PointerTarget },
    OverlayEntered,
    OverlayLeft { to: PointerTarget },
}

type FetchOutcome = (WindowKey, Result<HistoryResponse, FetchError>);

pub struct Driver<S, Tz, H> {
    manager: OverlayManager<S, Tz>,
    scheduler: HoverScheduler<Trigger>,
    source: Arc<H>,
    fetches_issued: usize,
}

impl<S, Tz, H> Driver<S, Tz, H>
where
    S: Surface,
    Tz: TimeZone,
    Tz::Offset: Display,
    H: HistorySource + 'static,
{
    pub fn new(
        manager: OverlayManager<S, Tz>,
        scheduler: HoverScheduler<Trigger>,
        source: Arc<H>,
    ) -> Self {
        Driver {
            manager,
            scheduler,
            source,
            fetches_issued: 0,
        }
    }

    pub fn manager(&self) -> &OverlayManager<S, Tz> {
        &self.manager
    }

    pub fn fetches_issued(&self) -> usize {
        self.fetches_issued
    }

    fn handle_event(&mut self, event: UiEvent) {
        let now = Instant::now();
        tracing::trace!("{:?}", event);
        match event {
            UiEvent::TriggerEntered(trigger) => {
                self.scheduler.trigger_entered(now, trigger);
            }
            UiEvent::TriggerLeft { to } => self.scheduler.trigger_left(now, to),
            UiEvent::OverlayEntered => self.scheduler.overlay_entered(),
            UiEvent::OverlayLeft { to } => self.scheduler.overlay_left(now, to),
        }
    }

    fn spawn_fetch(&mut self, fetches: &mut JoinSet<FetchOutcome>, req: FetchRequest) {
        self.fetches_issued += 1;
        let source = Arc::clone(&self.source);
        fetches.spawn(async move {
            let result = source
                .fetch(&req.key.repository, req.key.first_revision, req.count)
                .await;
            (req.key, result)
        });
    }

    fn fire_timers(&mut self, fetches: &mut JoinSet<FetchOutcome>) {
        for action in self.scheduler.poll(Instant::now()) {
            match action {
                HoverAction::Show(trigger) => {
                    if let Some(req) = self.manager.show(&trigger) {
                        self.spawn_fetch(fetches, req);
                    }
                }
                HoverAction::Hide => self.manager.hide(),
            }
        }
    }

    /// Run until `events` is closed and every pending timer and fetch has
    /// played out, then hand the driver back for inspection.
    pub async fn run(mut self, mut events: mpsc::Receiver<UiEvent>) -> Self {
        let mut fetches: JoinSet<FetchOutcome> = JoinSet::new();
        let mut events_open = true;

        loop {
            let deadline = self.scheduler.next_deadline();
            if !events_open && deadline.is_none() && fetches.is_empty() {
                break;
            }

            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event),
                    None => events_open = false,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_timers(&mut fetches);
                }
                Some(joined) = fetches.join_next(), if !fetches.is_empty() => match joined {
                    Ok((key, result)) => self.manager.complete(&key, result),
                    Err(e) => tracing::warn!("history fetch task died: {}", e),
                },
            }
        }

        self
    }
}
