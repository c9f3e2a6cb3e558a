//! Render worker
//!
//! Runs a [`Compositor`] on its own thread. The document thread sends
//! immutable [`RenderSnapshot`]s; the worker skips stale ones, renders the
//! newest and sends the finished [`Frame`] back.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use super::composite::Compositor;
use super::snapshot::RenderSnapshot;
use crate::engine::Raster;
use crate::error::{PaintError, Result};

/// A finished frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Sequence number of the snapshot it was rendered from
    pub sequence: u64,
    pub image: Arc<Raster>,
}

struct RenderRequest {
    sequence: u64,
    snapshot: RenderSnapshot,
}

/// Handle to the render worker
pub struct RenderThread {
    requests: Option<mpsc::Sender<RenderRequest>>,
    frames: mpsc::Receiver<Frame>,
    handle: Option<JoinHandle<()>>,
    next_sequence: u64,
    latest: Option<Frame>,
}

impl RenderThread {
    /// Start a worker owning a compositor for a `width x height` viewport
    pub fn spawn(width: u32, height: u32, scale: f32) -> Result<Self> {
        let compositor = Compositor::new(width, height, scale)?;
        let (request_tx, request_rx) = mpsc::channel::<RenderRequest>();
        let (frame_tx, frame_rx) = mpsc::channel::<Frame>();

        let handle = thread::Builder::new()
            .name("orapaint-render".to_string())
            .spawn(move || run(compositor, request_rx, frame_tx))?;
        info!("Render thread started ({width}x{height} @ {scale})");

        Ok(Self {
            requests: Some(request_tx),
            frames: frame_rx,
            handle: Some(handle),
            next_sequence: 1,
            latest: None,
        })
    }

    /// Queue a snapshot for rendering.
    ///
    /// # Returns
    /// The sequence number its frame will carry.
    pub fn submit(&mut self, snapshot: RenderSnapshot) -> Result<u64> {
        let sequence = self.next_sequence;
        let sender = self.requests.as_ref().ok_or_else(stopped)?;
        sender
            .send(RenderRequest { sequence, snapshot })
            .map_err(|_| stopped())?;
        self.next_sequence += 1;
        Ok(sequence)
    }

    /// Newest finished frame, without blocking
    pub fn latest_frame(&mut self) -> Option<&Frame> {
        while let Ok(frame) = self.frames.try_recv() {
            self.latest = Some(frame);
        }
        self.latest.as_ref()
    }

    /// Block until a frame at least as new as `sequence` arrives
    pub fn wait_for(&mut self, sequence: u64) -> Result<&Frame> {
        while self.latest.as_ref().map_or(true, |f| f.sequence < sequence) {
            let frame = self.frames.recv().map_err(|_| stopped())?;
            self.latest = Some(frame);
        }
        self.latest.as_ref().ok_or_else(stopped)
    }

    /// Close the request channel and join the worker
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Render thread panicked");
            }
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn stopped() -> PaintError {
    PaintError::ConsistencyFault {
        reason: "render thread is not running".to_string(),
    }
}

fn run(mut compositor: Compositor, requests: mpsc::Receiver<RenderRequest>, frames: mpsc::Sender<Frame>) {
    while let Ok(mut request) = requests.recv() {
        // Only the newest snapshot matters
        loop {
            match requests.try_recv() {
                Ok(newer) => request = newer,
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => break,
            }
        }

        let image = Arc::new(compositor.render(&request.snapshot).clone());
        let frame = Frame {
            sequence: request.sequence,
            image,
        };
        if frames.send(frame).is_err() {
            break;
        }
    }
    debug!("Render thread exiting, stats {:?}", compositor.stats());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Point, Rgba, StrokeMode};
    use crate::layers::LayerStack;

    #[test]
    fn test_renders_submitted_snapshot() {
        let mut stack = LayerStack::new(16, 16).unwrap();
        stack.add_layer(None);
        stack
            .begin_stroke(Point::new(1.0, 8.0), Rgba::BLACK, 4.0, StrokeMode::Draw)
            .unwrap();
        stack.add_point(Point::new(15.0, 8.0));
        stack.end_stroke();

        let mut worker = RenderThread::spawn(16, 16, 1.0).unwrap();
        let seq = worker.submit(stack.snapshot()).unwrap();
        let frame = worker.wait_for(seq).unwrap();
        assert_eq!(frame.sequence, seq);
        assert_eq!(frame.image.get(8, 8), Rgba::BLACK);
        assert_eq!(frame.image.get(8, 0), Rgba::WHITE);
        worker.shutdown();
    }

    #[test]
    fn test_latest_frame_is_newest() {
        let mut stack = LayerStack::new(8, 8).unwrap();
        stack.add_layer(None);
        let mut worker = RenderThread::spawn(8, 8, 1.0).unwrap();
        let mut last = 0;
        for _ in 0..5 {
            last = worker.submit(stack.snapshot()).unwrap();
        }
        worker.wait_for(last).unwrap();
        assert_eq!(worker.latest_frame().map(|f| f.sequence), Some(last));
    }
}
