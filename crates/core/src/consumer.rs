//! Consumer-side base: message emission and the consumer control loop
//!
//! The coordinator builds one `ConsumerBase` per consumer task, wiring the
//! streams it posts to, the router input channel, the control channel and
//! a worker token. Consumers that run their reading on a separate task
//! split the base and hand the emitter and worker to that task.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::PluginConfig;
use crate::control::{ControlSignal, Worker};
use crate::message::{Message, StreamId};

/// Everything a consumer needs to participate in the pipeline.
pub struct ConsumerBase {
    streams: Vec<StreamId>,
    sender: mpsc::UnboundedSender<Message>,
    control: ConsumerControl,
    worker: Worker,
}

impl ConsumerBase {
    /// Wire a consumer into the pipeline.
    pub fn new(
        streams: Vec<StreamId>,
        sender: mpsc::UnboundedSender<Message>,
        control: mpsc::Receiver<ControlSignal>,
        worker: Worker,
    ) -> Self {
        Self {
            streams,
            sender,
            control: ConsumerControl { rx: control },
            worker,
        }
    }

    /// Streams this consumer posts to.
    #[inline]
    pub fn streams(&self) -> &[StreamId] {
        &self.streams
    }

    /// A cloneable emitter for posting messages from a reader task.
    pub fn emitter(&self) -> MessageEmitter {
        MessageEmitter {
            streams: self.streams.clone().into(),
            sender: self.sender.clone(),
        }
    }

    /// Split into the emitter, the control loop and the worker token.
    ///
    /// Used by consumers whose reading runs on its own task: the emitter
    /// and worker move there while the consumer keeps the control loop.
    pub fn split(self) -> (MessageEmitter, ConsumerControl, Worker) {
        let emitter = self.emitter();
        (emitter, self.control, self.worker)
    }
}

/// Posts messages into the pipeline on behalf of one consumer.
#[derive(Clone)]
pub struct MessageEmitter {
    streams: std::sync::Arc<[StreamId]>,
    sender: mpsc::UnboundedSender<Message>,
}

impl MessageEmitter {
    /// Copy a payload slice and post it to every configured stream.
    pub fn post_from_slice(&self, payload: &[u8], sequence: u64) {
        self.post_bytes(Bytes::copy_from_slice(payload), sequence);
    }

    /// Post an owned payload to every configured stream. The payload is
    /// shared, not copied, across streams.
    pub fn post_bytes(&self, payload: Bytes, sequence: u64) {
        for stream in self.streams.iter() {
            let message = Message::new(payload.clone(), *stream, sequence);
            if self.sender.send(message).is_err() {
                // Router is gone; the consumer will be stopped shortly.
                tracing::trace!(stream = %stream, "router input closed, message dropped");
            }
        }
    }

    /// Streams this emitter posts to.
    #[inline]
    pub fn streams(&self) -> &[StreamId] {
        &self.streams
    }
}

/// The generic consumer control loop.
///
/// Consumes the control channel until `Stop` (or channel close),
/// dispatching `Roll` and `Reconfigure` to the supplied callbacks.
pub struct ConsumerControl {
    rx: mpsc::Receiver<ControlSignal>,
}

impl ConsumerControl {
    /// Run until stopped. `on_roll` handles reopen/restart requests;
    /// `on_reconfigure` receives the fresh configuration node.
    pub async fn run<R, C>(&mut self, mut on_roll: R, mut on_reconfigure: C)
    where
        R: FnMut(),
        C: FnMut(PluginConfig),
    {
        while let Some(signal) = self.rx.recv().await {
            match signal {
                ControlSignal::Stop => break,
                ControlSignal::Roll => on_roll(),
                ControlSignal::Reconfigure(node) => on_reconfigure(node),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{control_channel, WorkerGroup};
    use crate::message::WILDCARD_STREAM;

    #[tokio::test]
    async fn emitter_posts_to_every_stream() {
        let group = WorkerGroup::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_ctl_tx, ctl_rx) = control_channel();
        let streams = vec![StreamId::from_name("a"), StreamId::from_name("b")];
        let base = ConsumerBase::new(streams.clone(), tx, ctl_rx, group.register());

        base.emitter().post_from_slice(b"payload", 3);

        let first = rx.recv().await.expect("message on first stream");
        let second = rx.recv().await.expect("message on second stream");
        assert_eq!(first.stream_id(), streams[0]);
        assert_eq!(second.stream_id(), streams[1]);
        assert_eq!(first.sequence(), 3);
        assert_eq!(first.payload().as_ref(), b"payload");
    }

    #[tokio::test]
    async fn control_loop_dispatches_and_stops() {
        let group = WorkerGroup::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (ctl_tx, ctl_rx) = control_channel();
        let base = ConsumerBase::new(vec![WILDCARD_STREAM], tx, ctl_rx, group.register());
        let (_emitter, mut control, worker) = base.split();

        ctl_tx.send(ControlSignal::Roll).await.expect("send roll");
        ctl_tx
            .send(ControlSignal::Reconfigure(PluginConfig::new("consumer.test")))
            .await
            .expect("send reconfigure");
        ctl_tx.send(ControlSignal::Stop).await.expect("send stop");

        let mut rolls = 0;
        let mut reconfigures = 0;
        control
            .run(|| rolls += 1, |_| reconfigures += 1)
            .await;

        assert_eq!(rolls, 1);
        assert_eq!(reconfigures, 1);
        worker.mark_as_done();
        group.wait().await;
    }

    #[tokio::test]
    async fn closed_control_channel_stops_the_loop() {
        let group = WorkerGroup::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (ctl_tx, ctl_rx) = control_channel();
        let base = ConsumerBase::new(vec![WILDCARD_STREAM], tx, ctl_rx, group.register());
        let (_emitter, mut control, _worker) = base.split();

        drop(ctl_tx);
        control.run(|| {}, |_| {}).await;
    }
}
