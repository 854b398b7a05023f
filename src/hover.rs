//! Hover intent: only show an overlay once the pointer has dwelled on its
//! trigger, and only hide it once the pointer has been gone for a while.
//!
//! The scheduler doesn't own any timers itself.  It tracks at most one pending
//! show and one pending hide as deadlines and the event loop asks it for the
//! next deadline and polls it when that passes.  Scheduling a timer of a kind
//! that is already pending replaces it, and the replaced handle is dead.
//!
//! Per overlay this gives us the state machine
//! `Hidden -(dwell)-> Visible -(leave dwell)-> Hidden`, where re-entering
//! during either dwell cancels the pending transition.

use tokio::time::{Duration, Instant};

/// Opaque identity of a scheduled show or hide.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TimerHandle(u64);

/// Where the pointer went when it left a trigger or the overlay.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PointerTarget {
    /// The trigger element or one of its descendants.
    Trigger,
    /// The current overlay or one of its descendants.
    Overlay,
    Elsewhere,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HoverAction<T> {
    Show(T),
    Hide,
}

#[derive(Debug)]
struct Pending<T> {
    handle: TimerHandle,
    due: Instant,
    payload: T,
}

#[derive(Debug)]
pub struct HoverScheduler<T> {
    show_delay: Duration,
    hide_delay: Duration,
    last_handle: u64,
    pending_show: Option<Pending<T>>,
    pending_hide: Option<Pending<()>>,
}

impl<T> HoverScheduler<T> {
    pub fn new(show_delay: Duration, hide_delay: Duration) -> Self {
        HoverScheduler {
            show_delay,
            hide_delay,
            last_handle: 0,
            pending_show: None,
            pending_hide: None,
        }
    }

    fn next_handle(&mut self) -> TimerHandle {
        self.last_handle += 1;
        TimerHandle(self.last_handle)
    }

    pub fn schedule_show(&mut self, now: Instant, payload: T) -> TimerHandle {
        let handle = self.next_handle();
        if let Some(old) = self.pending_show.take() {
            tracing::trace!("show {:?} superseded by {:?}", old.handle, handle);
        }
        self.pending_show = Some(Pending {
            handle,
            due: now + self.show_delay,
            payload,
        });
        handle
    }

    pub fn schedule_hide(&mut self, now: Instant) -> TimerHandle {
        let handle = self.next_handle();
        if let Some(old) = self.pending_hide.take() {
            tracing::trace!("hide {:?} superseded by {:?}", old.handle, handle);
        }
        self.pending_hide = Some(Pending {
            handle,
            due: now + self.hide_delay,
            payload: (),
        });
        handle
    }

    pub fn cancel_show(&mut self) -> Option<TimerHandle> {
        self.pending_show.take().map(|p| p.handle)
    }

    pub fn cancel_hide(&mut self) -> Option<TimerHandle> {
        self.pending_hide.take().map(|p| p.handle)
    }

    pub fn pending_show(&self) -> Option<TimerHandle> {
        self.pending_show.as_ref().map(|p| p.handle)
    }

    pub fn pending_hide(&self) -> Option<TimerHandle> {
        self.pending_hide.as_ref().map(|p| p.handle)
    }

    pub fn trigger_entered(&mut self, now: Instant, payload: T) -> TimerHandle {
        self.cancel_hide();
        self.schedule_show(now, payload)
    }

    pub fn trigger_left(&mut self, now: Instant, to: PointerTarget) {
        if to != PointerTarget::Elsewhere {
            return;
        }
        self.cancel_show();
        self.schedule_hide(now);
    }

    pub fn overlay_entered(&mut self) {
        self.cancel_hide();
    }

    pub fn overlay_left(&mut self, now: Instant, to: PointerTarget) {
        if to == PointerTarget::Elsewhere {
            self.schedule_hide(now);
        }
    }

    /// When the event loop next needs to call `poll`, if at all.
    pub fn next_deadline(&self) -> Option<Instant> {
        let show = self.pending_show.as_ref().map(|p| p.due);
        let hide = self.pending_hide.as_ref().map(|p| p.due);
        match (show, hide) {
            (Some(s), Some(h)) => Some(s.min(h)),
            (s, h) => s.or(h),
        }
    }

    /// Take every timer that is due at `now`, earliest first.  A hide due at
    /// the same instant as a show goes first so the show wins.
    pub fn poll(&mut self, now: Instant) -> Vec<HoverAction<T>> {
        let show_due = matches!(&self.pending_show, Some(p) if p.due <= now);
        let hide_due = matches!(&self.pending_hide, Some(p) if p.due <= now);

        let mut actions = Vec::new();
        let hide_first = match (&self.pending_show, &self.pending_hide) {
            (Some(s), Some(h)) => h.due <= s.due,
            _ => true,
        };
        if hide_due && hide_first {
            self.pending_hide = None;
            actions.push(HoverAction::Hide);
        }
        if show_due {
            if let Some(p) = self.pending_show.take() {
                actions.push(HoverAction::Show(p.payload));
            }
        }
        if hide_due && !hide_first {
            self.pending_hide = None;
            actions.push(HoverAction::Hide);
        }
        actions
    }
}
