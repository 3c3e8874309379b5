// SPDX-License-Identifier: GPL-3.0-only

//! Background redraw task
//!
//! One tokio task per active session. It redraws at a fixed interval,
//! follows viewport changes through a watch channel and publishes each
//! finished frame to subscribers. The task ends when the session goes
//! idle, when `stop` is called or when the handle is dropped.
//!
//! Publishing goes through `send_if_modified` and checks the loop's `live`
//! flag under the channel lock. `stop` clears that flag and the frame in one
//! locked update, so a redraw racing with `stop` can never land after it.

use super::renderer::OverlayRenderer;
use super::{OverlayFrame, Viewport};
use crate::app::SessionState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Channel carrying the latest overlay redraw
pub type OverlaySender = Arc<watch::Sender<Option<Arc<OverlayFrame>>>>;

/// Handle to a running redraw task
pub struct RenderLoop {
    handle: Option<JoinHandle<()>>,
    output: OverlaySender,
    live: Arc<AtomicBool>,
}

impl RenderLoop {
    /// Spawn the redraw task on the current runtime
    pub fn spawn(
        state: watch::Receiver<SessionState>,
        viewport: watch::Receiver<Viewport>,
        output: OverlaySender,
        interval: Duration,
    ) -> Self {
        let live = Arc::new(AtomicBool::new(true));
        let publisher = Publisher {
            output: Arc::clone(&output),
            live: Arc::clone(&live),
        };
        let handle = tokio::spawn(run(state, viewport, publisher, interval));
        Self {
            handle: Some(handle),
            output,
            live,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the task and clear the published frame
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.output.send_modify(|slot| {
            self.live.store(false, Ordering::SeqCst);
            *slot = None;
        });
        handle.abort();
        debug!("Overlay render loop stopped");
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Write side held by the task
struct Publisher {
    output: OverlaySender,
    live: Arc<AtomicBool>,
}

impl Publisher {
    /// Replace the frame unless the loop was stopped
    fn publish(&self, frame: Option<Arc<OverlayFrame>>) -> bool {
        self.output.send_if_modified(|slot| {
            if !self.live.load(Ordering::SeqCst) {
                return false;
            }
            *slot = frame;
            true
        })
    }
}

async fn run(
    mut state: watch::Receiver<SessionState>,
    mut viewport: watch::Receiver<Viewport>,
    output: Publisher,
    interval: Duration,
) {
    let initial = *viewport.borrow_and_update();
    let mut renderer = OverlayRenderer::new(initial.width, initial.height);
    let mut sequence: u64 = 0;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        width = initial.width,
        height = initial.height,
        interval_us = interval.as_micros() as u64,
        "Overlay render loop started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = viewport.changed() => {
                if changed.is_err() {
                    break;
                }
                let size = *viewport.borrow_and_update();
                debug!(width = size.width, height = size.height, "Overlay resized");
                renderer.resize(size.width, size.height);
                continue;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                // Redraw on the next tick with the new state
                continue;
            }
        }

        let current = state.borrow_and_update().clone();
        if !current.is_camera_active() {
            break;
        }

        let mode = renderer.render(current.is_analyzing());
        let frame = OverlayFrame::capture(renderer.surface(), mode, sequence + 1);
        if !output.publish(Some(Arc::new(frame))) {
            break;
        }
        sequence += 1;
    }

    output.publish(None);
    info!(frames = sequence, "Overlay render loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ScanProgress;
    use crate::overlay::OverlayMode;

    fn channels(
        initial: SessionState,
    ) -> (
        watch::Sender<SessionState>,
        watch::Sender<Viewport>,
        OverlaySender,
        watch::Receiver<Option<Arc<OverlayFrame>>>,
    ) {
        let (state_tx, _) = watch::channel(initial);
        let (view_tx, _) = watch::channel(Viewport::new(120, 80));
        let (out_tx, out_rx) = watch::channel(None);
        (state_tx, view_tx, Arc::new(out_tx), out_rx)
    }

    async fn next_frame(rx: &mut watch::Receiver<Option<Arc<OverlayFrame>>>) -> Arc<OverlayFrame> {
        loop {
            rx.changed().await.unwrap();
            if let Some(frame) = rx.borrow_and_update().clone() {
                return frame;
            }
        }
    }

    #[tokio::test]
    async fn follows_state_and_viewport() {
        let (state_tx, view_tx, out_tx, mut out_rx) = channels(SessionState::Active);
        let _render = RenderLoop::spawn(
            state_tx.subscribe(),
            view_tx.subscribe(),
            out_tx,
            Duration::from_millis(1),
        );

        let frame = next_frame(&mut out_rx).await;
        assert_eq!(frame.mode, OverlayMode::Guide);
        assert_eq!((frame.width, frame.height), (120, 80));

        view_tx.send_replace(Viewport::new(60, 40));
        state_tx.send_replace(SessionState::Analyzing(ScanProgress::capturing()));

        let frame = loop {
            let frame = next_frame(&mut out_rx).await;
            if matches!(frame.mode, OverlayMode::Scanning { .. }) && frame.width == 60 {
                break frame;
            }
        };
        assert_eq!(frame.height, 40);
    }

    #[tokio::test]
    async fn exits_when_session_goes_idle() {
        let (state_tx, view_tx, out_tx, mut out_rx) = channels(SessionState::Active);
        let render = RenderLoop::spawn(
            state_tx.subscribe(),
            view_tx.subscribe(),
            out_tx,
            Duration::from_millis(1),
        );
        next_frame(&mut out_rx).await;

        state_tx.send_replace(SessionState::Idle);
        out_rx.wait_for(|frame| frame.is_none()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!render.is_running());
    }

    #[tokio::test]
    async fn stop_cancels_the_task() {
        let (state_tx, view_tx, out_tx, mut out_rx) = channels(SessionState::Active);
        let mut render = RenderLoop::spawn(
            state_tx.subscribe(),
            view_tx.subscribe(),
            out_tx,
            Duration::from_millis(1),
        );
        next_frame(&mut out_rx).await;

        render.stop();
        assert!(!render.is_running());
        assert!(out_rx.borrow().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn no_frame_survives_stop() {
        let mut stale = 0;
        for round in 0..200u64 {
            let (state_tx, _) = watch::channel(SessionState::Active);
            let (view_tx, _) = watch::channel(Viewport::new(2560, 1440));
            let (out_tx, out_rx) = watch::channel(None);
            let mut render = RenderLoop::spawn(
                state_tx.subscribe(),
                view_tx.subscribe(),
                Arc::new(out_tx),
                Duration::from_millis(1),
            );

            tokio::time::sleep(Duration::from_micros(300 + (round % 10) * 200)).await;
            state_tx.send_replace(SessionState::Idle);
            render.stop();

            tokio::time::sleep(Duration::from_millis(5)).await;
            if out_rx.borrow().is_some() {
                stale += 1;
            }
        }
        assert_eq!(stale, 0);
    }
}
