//! Drives the whole event loop: pointer events in, dwell timers on a paused
//! clock, fetches against an in-memory history source, overlays out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::sleep;

use vcs_history_tooltip::driver::{Driver, UiEvent};
use vcs_history_tooltip::file_format::vcs_history::{CommitEntry, HistoryResponse};
use vcs_history_tooltip::hover::{HoverScheduler, PointerTarget};
use vcs_history_tooltip::loader::{FetchError, HistorySource, WindowKey};
use vcs_history_tooltip::manager::{Overlay, OverlayManager, Surface, Trigger};
use vcs_history_tooltip::placement::{Rect, Size, Viewport};

/// Serves a synthetic commit per revision after `latency`.  The repository
/// "broken" always fails.
struct FakeHistory {
    latency: Duration,
    calls: AtomicUsize,
}

impl FakeHistory {
    fn new(latency_ms: u64) -> Arc<Self> {
        Arc::new(FakeHistory {
            latency: Duration::from_millis(latency_ms),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistorySource for FakeHistory {
    async fn fetch(
        &self,
        repository: &str,
        first_revision: u64,
        count: u64,
    ) -> Result<HistoryResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.latency).await;
        if repository == "broken" {
            return Err(FetchError::Status { status: 500 });
        }
        let commits = (first_revision..first_revision + count)
            .rev()
            .map(|revision| CommitEntry {
                revision,
                author: "bird".to_string(),
                message: format!("r{} <script>alert(1)</script>", revision),
                created: format!("2023-06-15T10:{:02}:00Z", revision % 60),
                repository: repository.to_string(),
            })
            .collect();
        Ok(HistoryResponse {
            commits,
            changeset_url_format: "/changeset/%(sRepository)s/%(iRevision)s".to_string(),
        })
    }
}

#[derive(Default)]
struct Recorder {
    shown: Vec<(WindowKey, u64, String)>,
    hidden: Vec<WindowKey>,
}

impl Surface for Recorder {
    fn measure(&mut self, _key: &WindowKey, html: &str) -> Size {
        Size::new(320, 18 * html.lines().count() as i32)
    }

    fn show(&mut self, overlay: &Overlay) {
        self.shown
            .push((overlay.key.clone(), overlay.highlighted, overlay.html.clone()));
    }

    fn hide(&mut self, key: &WindowKey) {
        self.hidden.push(key.clone());
    }
}

fn trigger(repository: &str, revision: u64) -> Trigger {
    Trigger {
        repository: repository.to_string(),
        revision,
        anchor: Rect::new(200, 300, 260, 316),
        viewport: Viewport {
            scroll_left: 0,
            scroll_top: 0,
            width: 1280,
            height: 800,
        },
    }
}

fn key(repository: &str, first_revision: u64) -> WindowKey {
    WindowKey {
        repository: repository.to_string(),
        first_revision,
    }
}

type TestDriver = Driver<Recorder, Utc, FakeHistory>;

fn start(source: &Arc<FakeHistory>) -> (mpsc::Sender<UiEvent>, tokio::task::JoinHandle<TestDriver>) {
    let driver = Driver::new(
        OverlayManager::new(Recorder::default(), Utc, 16, Size::new(480, 320)),
        HoverScheduler::new(Duration::from_millis(500), Duration::from_millis(500)),
        Arc::clone(source),
    );
    let (tx, rx) = mpsc::channel(16);
    (tx, tokio::spawn(driver.run(rx)))
}

async fn at(ms: u64, start: tokio::time::Instant) {
    tokio::time::sleep_until(start + Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn passing_over_a_trigger_does_nothing() {
    let source = FakeHistory::new(50);
    let (tx, handle) = start(&source);
    let t0 = tokio::time::Instant::now();

    tx.send(UiEvent::TriggerEntered(trigger("vbox", 101))).await.unwrap();
    at(100, t0).await;
    tx.send(UiEvent::TriggerLeft {
        to: PointerTarget::Elsewhere,
    })
    .await
    .unwrap();
    drop(tx);

    let done = handle.await.unwrap();
    assert_eq!(source.calls(), 0);
    assert!(done.manager().surface().shown.is_empty());
    assert!(done.manager().surface().hidden.is_empty());
}

#[tokio::test(start_paused = true)]
async fn dwelling_shows_loaded_history() {
    let source = FakeHistory::new(50);
    let (tx, handle) = start(&source);
    let t0 = tokio::time::Instant::now();

    tx.send(UiEvent::TriggerEntered(trigger("vbox", 101))).await.unwrap();
    at(400, t0).await;
    // Nothing visible before the dwell has elapsed.
    assert_eq!(source.calls(), 0);
    at(600, t0).await;
    drop(tx);

    let done = handle.await.unwrap();
    assert_eq!(source.calls(), 1);
    let shown = &done.manager().surface().shown;
    assert_eq!(shown.len(), 1);
    let (shown_key, highlighted, html) = &shown[0];
    assert_eq!(*shown_key, key("vbox", 96));
    assert_eq!(*highlighted, 101);
    assert!(html.contains("<dt id=\"r101\" class=\"tmvcstimeline-highlight\">"));
    assert!(html.contains("&lt;script&gt;"));
    assert!(!html.contains("<script>"));
    assert_eq!(done.manager().current(), Some(&key("vbox", 96)));
}

#[tokio::test(start_paused = true)]
async fn one_request_per_window() {
    let source = FakeHistory::new(50);
    let (tx, handle) = start(&source);
    let t0 = tokio::time::Instant::now();

    tx.send(UiEvent::TriggerEntered(trigger("vbox", 101))).await.unwrap();
    at(600, t0).await;
    tx.send(UiEvent::TriggerLeft {
        to: PointerTarget::Elsewhere,
    })
    .await
    .unwrap();
    // 110 is in the same window as 101, so this is served from the cache.
    at(700, t0).await;
    tx.send(UiEvent::TriggerEntered(trigger("vbox", 110))).await.unwrap();
    at(1300, t0).await;
    assert_eq!(source.calls(), 1);

    tx.send(UiEvent::TriggerLeft {
        to: PointerTarget::Elsewhere,
    })
    .await
    .unwrap();
    at(1400, t0).await;
    tx.send(UiEvent::TriggerEntered(trigger("vbox", 130))).await.unwrap();
    at(2000, t0).await;
    drop(tx);

    let done = handle.await.unwrap();
    assert_eq!(source.calls(), 2);
    let surface = done.manager().surface();
    let shows: Vec<_> = surface
        .shown
        .iter()
        .map(|(k, rev, _)| (k.first_revision, *rev))
        .collect();
    assert_eq!(shows, vec![(96, 101), (96, 110), (128, 130)]);
    assert_eq!(surface.hidden, vec![key("vbox", 96)]);
    assert_eq!(done.manager().overlay_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_shows_error_block() {
    let source = FakeHistory::new(50);
    let (tx, handle) = start(&source);

    tx.send(UiEvent::TriggerEntered(trigger("broken", 7))).await.unwrap();
    drop(tx);

    let done = handle.await.unwrap();
    let shown = &done.manager().surface().shown;
    assert_eq!(shown.len(), 1);
    assert!(shown[0].2.contains("tmvcstimeline-error"));
    assert!(shown[0].2.contains("server answered HTTP 500"));
}

#[tokio::test(start_paused = true)]
async fn moving_into_the_overlay_keeps_it_open() {
    let source = FakeHistory::new(50);
    let (tx, handle) = start(&source);
    let t0 = tokio::time::Instant::now();

    tx.send(UiEvent::TriggerEntered(trigger("vbox", 101))).await.unwrap();
    at(600, t0).await;
    tx.send(UiEvent::TriggerLeft {
        to: PointerTarget::Elsewhere,
    })
    .await
    .unwrap();
    at(700, t0).await;
    tx.send(UiEvent::OverlayEntered).await.unwrap();
    at(3000, t0).await;
    tx.send(UiEvent::OverlayLeft {
        to: PointerTarget::Trigger,
    })
    .await
    .unwrap();
    at(4000, t0).await;
    tx.send(UiEvent::OverlayLeft {
        to: PointerTarget::Elsewhere,
    })
    .await
    .unwrap();
    drop(tx);

    let done = handle.await.unwrap();
    assert_eq!(done.manager().surface().shown.len(), 1);
    // Only the final exit to elsewhere hides it.
    assert_eq!(done.manager().surface().hidden, vec![key("vbox", 96)]);
    assert_eq!(done.manager().current(), None);
}

#[tokio::test(start_paused = true)]
async fn retrigger_while_loading_waits_for_the_same_request() {
    let source = FakeHistory::new(1000);
    let (tx, handle) = start(&source);
    let t0 = tokio::time::Instant::now();

    tx.send(UiEvent::TriggerEntered(trigger("vbox", 101))).await.unwrap();
    at(600, t0).await;
    tx.send(UiEvent::TriggerLeft {
        to: PointerTarget::Elsewhere,
    })
    .await
    .unwrap();
    at(700, t0).await;
    tx.send(UiEvent::TriggerEntered(trigger("vbox", 103))).await.unwrap();
    drop(tx);

    let done = handle.await.unwrap();
    assert_eq!(source.calls(), 1);
    let shown = &done.manager().surface().shown;
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].1, 103);
    assert!(shown[0].2.contains("<dt id=\"r103\" class=\"tmvcstimeline-highlight\">"));
}
