//! Live frame delivery.
//!
//! The capture transport is outside this crate. Whatever receives frames
//! pushes raw (header, payload) pairs into a [`LiveFeed`]; a [`Subscription`]
//! drains them on its own thread and hands each [`FrameRecord`] to a handler,
//! usually [`ApRegistry::on_frame`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::dissect::DissectionClient;
use crate::error::Result;
use crate::frame::FrameRecord;
use crate::pcap::LinkType;
use crate::registry::ApRegistry;

/// How often the consumer thread checks for a stop request while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Receiving end of a live feed.
pub type FrameQueue = Receiver<FrameRecord>;

/// Producer side of a live capture.
///
/// Cheap to clone; all clones share one sequence counter and one queue.
#[derive(Clone)]
pub struct LiveFeed {
    tx: Sender<FrameRecord>,
    link_type: LinkType,
    next_seq: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl LiveFeed {
    /// Create a feed stamping frames with the configured capture mode.
    pub fn new(config: &PipelineConfig) -> (Self, FrameQueue) {
        let (tx, rx) = crossbeam_channel::bounded(config.live_queue_capacity.max(1));
        let feed = Self {
            tx,
            link_type: config.capture_mode,
            next_seq: Arc::new(AtomicU64::new(1)),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (feed, rx)
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Queue one captured frame without blocking.
    ///
    /// Returns `false` when the frame was dropped: either the queue is full or
    /// the consumer is gone.
    pub fn push(&self, header: impl Into<Bytes>, payload: impl Into<Bytes>) -> bool {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let frame = FrameRecord::new(seq, self.link_type, header, payload);
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    warn!(seq, dropped, "live queue full, dropping frames");
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(seq, "live consumer gone");
                false
            }
        }
    }

    /// Frames dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A consumer thread draining a [`FrameQueue`].
///
/// Stopping lets the frame currently being handled finish; frames still
/// queued are discarded. Dropping the subscription stops it.
pub struct Subscription {
    stop: Arc<AtomicBool>,
    handled: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Start a thread passing every queued frame to `handler`.
    pub fn spawn<F>(frames: FrameQueue, mut handler: F) -> Result<Self>
    where
        F: FnMut(FrameRecord) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let handled = Arc::new(AtomicU64::new(0));

        let thread_stop = Arc::clone(&stop);
        let thread_handled = Arc::clone(&handled);
        let handle = thread::Builder::new()
            .name("wlanscope-live".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Acquire) {
                    match frames.recv_timeout(POLL_INTERVAL) {
                        Ok(frame) => {
                            handler(frame);
                            thread_handled.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(handled = thread_handled.load(Ordering::Relaxed), "live subscription finished");
            })?;

        Ok(Self {
            stop,
            handled,
            handle: Some(handle),
        })
    }

    /// Start a thread feeding every queued frame into `registry`.
    pub fn to_registry<C>(frames: FrameQueue, registry: Arc<ApRegistry<C>>) -> Result<Self>
    where
        C: DissectionClient + 'static,
    {
        Self::spawn(frames, move |frame| {
            registry.on_frame(frame);
        })
    }

    /// Frames handed to the handler so far.
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    /// Whether the consumer thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Stop the consumer and wait for it. Returns the number of frames handled.
    pub fn stop(mut self) -> u64 {
        self.shutdown();
        self.handled()
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("live subscription thread panicked");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}
