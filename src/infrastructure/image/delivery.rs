//! Serialised delivery of request results to sinks.
//!
//! A single task drains the queue, so callbacks for one loader never run
//! concurrently and always run off the requesting thread.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{error, trace};

use crate::domain::entities::{CacheKey, ImageHandle, LoadedImage};
use crate::domain::ports::ImageSink;

/// Callback to run on the delivery task.
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    /// Request missed memory; show the loading placeholder.
    Loading(ImageHandle),
    /// Image is available.
    Success(LoadedImage),
    /// No image could be produced.
    Failure(Option<ImageHandle>),
}

struct Delivery {
    sink: Arc<dyn ImageSink>,
    key: CacheKey,
    event: DeliveryEvent,
}

impl Delivery {
    fn dispatch(&self) {
        match &self.event {
            DeliveryEvent::Loading(placeholder) => self.sink.on_loading(&self.key, placeholder),
            DeliveryEvent::Success(image) => self.sink.on_success(&self.key, image),
            DeliveryEvent::Failure(placeholder) => {
                self.sink.on_failure(&self.key, placeholder.as_ref());
            }
        }
    }
}

/// Sending half of the delivery queue.
#[derive(Clone)]
pub(crate) struct DeliveryQueue {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl DeliveryQueue {
    /// Spawns the delivery task on `runtime`.
    pub(crate) fn start(runtime: &Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(Self::run(rx));
        Self { tx }
    }

    pub(crate) fn send(&self, sink: Arc<dyn ImageSink>, key: CacheKey, event: DeliveryEvent) {
        if self.tx.send(Delivery { sink, key, event }).is_err() {
            trace!("Delivery queue closed, dropping callback");
        }
    }

    async fn run(mut rx: mpsc::UnboundedReceiver<Delivery>) {
        while let Some(delivery) = rx.recv().await {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| delivery.dispatch()));
            if outcome.is_err() {
                error!(key = %delivery.key, "Image sink panicked during delivery");
            }
        }
        trace!("Delivery queue stopped");
    }
}
