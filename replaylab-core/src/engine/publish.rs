//! Frame publication with one frame in flight.
//!
//! Each published frame carries an [`AckHandle`]. The publisher will not hand
//! over the next frame until the renderer has acknowledged the previous one,
//! so a slow renderer stalls the replay instead of losing frames. Dropping
//! the handle without calling `ack` counts as an acknowledgement.

use crate::domain::Frame;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Consumer of published frames.
///
/// `on_frame` is called on the publishing thread; it should copy what it
/// needs and return. Control operations must not be issued from inside it.
pub trait Renderer: Send {
    /// Called once, synchronously, after every successful setup or reset.
    fn set_initial_frame(&mut self, frame: &Frame);

    fn on_frame(&mut self, frame: Frame, ack: AckHandle);
}

/// "I have copied what I need out of this frame."
#[derive(Debug)]
pub struct AckHandle {
    tx: Sender<()>,
}

impl AckHandle {
    pub fn ack(self) {
        // a gone publisher has nothing left to wait for
        let _ = self.tx.send(());
    }
}

pub struct FramePublisher {
    renderer: Box<dyn Renderer>,
    in_flight: Option<Receiver<()>>,
    /// Sequence number of the newest frame handed over.
    last_sequence: Option<u64>,
    published: u64,
}

impl FramePublisher {
    pub fn new(renderer: Box<dyn Renderer>) -> Self {
        Self {
            renderer,
            in_flight: None,
            last_sequence: None,
            published: 0,
        }
    }

    /// Out-of-band initial frame. Does not wait for an outstanding ack.
    pub fn publish_initial(&mut self, frame: &Frame, sequence: u64) {
        self.last_sequence = Some(sequence);
        tracing::debug!(index = frame.core_data_idx, sequence, "initial frame");
        self.renderer.set_initial_frame(frame);
    }

    /// Hand `frame` to the renderer once the previous frame is acknowledged.
    ///
    /// Frames older than one already handed over are dropped; returns whether
    /// the frame was published.
    pub fn publish(&mut self, frame: Frame, sequence: u64) -> bool {
        if self.last_sequence.is_some_and(|last| sequence <= last) {
            tracing::debug!(sequence, "dropping superseded frame");
            return false;
        }
        self.wait_for_ack();
        let (tx, rx) = bounded(1);
        self.in_flight = Some(rx);
        self.last_sequence = Some(sequence);
        self.published += 1;
        tracing::debug!(index = frame.core_data_idx, time = %frame.time, sequence, "publishing frame");
        self.renderer.on_frame(frame, AckHandle { tx });
        true
    }

    /// Block until the frame in flight, if any, is acknowledged.
    pub fn wait_for_ack(&mut self) {
        if let Some(rx) = self.in_flight.take() {
            // Err means the handle was dropped, which releases the slot too
            let _ = rx.recv();
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// A receiver for the outstanding ack, to wait on without holding the publisher.
    pub fn pending_ack(&self) -> Option<Receiver<()>> {
        self.in_flight.clone()
    }

    /// Frames handed over through the steady-state handoff.
    pub fn published(&self) -> u64 {
        self.published
    }
}

// ─── Channel renderer ────────────────────────────────────────────────

/// What a [`ChannelRenderer`] forwards.
#[derive(Debug)]
pub enum RendererEvent {
    Initial(Frame),
    Frame(Frame, AckHandle),
}

/// Forwards every frame to a channel, for renderers living on another thread.
pub struct ChannelRenderer {
    tx: Sender<RendererEvent>,
}

impl ChannelRenderer {
    /// The renderer and the receiving end of its events.
    pub fn new() -> (Self, Receiver<RendererEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl Renderer for ChannelRenderer {
    fn set_initial_frame(&mut self, frame: &Frame) {
        if self.tx.send(RendererEvent::Initial(frame.clone())).is_err() {
            tracing::debug!("renderer channel closed");
        }
    }

    fn on_frame(&mut self, frame: Frame, ack: AckHandle) {
        // a failed send drops the handle, which acknowledges the frame
        if self.tx.send(RendererEvent::Frame(frame, ack)).is_err() {
            tracing::debug!("renderer channel closed");
        }
    }
}

/// Acknowledges every frame immediately and keeps nothing.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn set_initial_frame(&mut self, _frame: &Frame) {}

    fn on_frame(&mut self, _frame: Frame, ack: AckHandle) {
        ack.ack();
    }
}
