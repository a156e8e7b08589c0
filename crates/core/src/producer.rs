//! Producer-side base: the message control loop
//!
//! A producer task receives pipeline messages and control signals on two
//! channels. The control loop multiplexes them, always letting control
//! win, and guarantees a bounded drain of pending messages on stop. The
//! worker token inside the base is released when the base drops, i.e.
//! exactly once per producer task, on any exit path.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::config::PluginConfig;
use crate::control::{ControlSignal, Worker};
use crate::format::{Formatter, Forward};
use crate::message::Message;

/// Upper bound on messages delivered to the callback during stop drain.
/// Anything beyond this is discarded.
pub const STOP_DRAIN_LIMIT: usize = 1024;

/// Tick period used when the producer did not ask for one. The callback
/// is not invoked in that case; the ticker merely keeps the select arm
/// alive.
const IDLE_TICK: Duration = Duration::from_secs(1);

/// Callbacks a producer supplies to the control loop.
#[async_trait]
pub trait MessageHandler: Send {
    /// Called for every message, in channel order.
    async fn on_message(&mut self, message: Message);

    /// Called on the requested tick interval while the loop is running.
    async fn on_tick(&mut self) {}

    /// Called on `Roll`: reopen or recreate the backing sink resource.
    async fn on_roll(&mut self) {}

    /// Called on `Reconfigure` with the fresh node.
    async fn on_reconfigure(&mut self, _node: PluginConfig) {}
}

/// Everything a producer needs to participate in the pipeline.
pub struct ProducerBase {
    control: mpsc::Receiver<ControlSignal>,
    messages: mpsc::Receiver<Message>,
    formatter: Option<Box<dyn Formatter>>,
    _worker: Worker,
}

impl ProducerBase {
    /// Wire a producer into the pipeline.
    pub fn new(
        control: mpsc::Receiver<ControlSignal>,
        messages: mpsc::Receiver<Message>,
        formatter: Box<dyn Formatter>,
        worker: Worker,
    ) -> Self {
        Self {
            control,
            messages,
            formatter: Some(formatter),
            _worker: worker,
        }
    }

    /// Take the formatter configured for this producer. Falls back to the
    /// pass-through formatter when called twice.
    pub fn take_formatter(&mut self) -> Box<dyn Formatter> {
        self.formatter
            .take()
            .unwrap_or_else(|| Box::new(Forward::default()))
    }

    /// Run the message control loop until stop.
    ///
    /// Control signals take priority over messages. On `Stop` (or a
    /// closed control channel) pending messages are drained into the
    /// handler up to [`STOP_DRAIN_LIMIT`], then the loop exits. When
    /// `tick` is set, `on_tick` fires on that period.
    pub async fn control_loop<H>(&mut self, handler: &mut H, tick: Option<Duration>)
    where
        H: MessageHandler,
    {
        let mut ticker = tokio::time::interval(tick.unwrap_or(IDLE_TICK));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let tick_enabled = tick.is_some();

        loop {
            tokio::select! {
                biased;

                signal = self.control.recv() => match signal {
                    None | Some(ControlSignal::Stop) => {
                        self.drain(handler).await;
                        break;
                    }
                    Some(ControlSignal::Roll) => handler.on_roll().await,
                    Some(ControlSignal::Reconfigure(node)) => {
                        handler.on_reconfigure(node).await;
                    }
                },

                message = self.messages.recv() => match message {
                    Some(message) => handler.on_message(message).await,
                    // All senders are gone; nothing further can arrive.
                    None => break,
                },

                _ = ticker.tick(), if tick_enabled => handler.on_tick().await,
            }
        }
    }

    async fn drain<H>(&mut self, handler: &mut H)
    where
        H: MessageHandler,
    {
        let mut delivered = 0;
        while delivered < STOP_DRAIN_LIMIT {
            match self.messages.try_recv() {
                Ok(message) => {
                    handler.on_message(message).await;
                    delivered += 1;
                }
                Err(_) => return,
            }
        }

        let mut discarded = 0u64;
        while self.messages.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            tracing::warn!(discarded, "discarding messages past the stop drain limit");
        }
    }
}

#[cfg(test)]
#[path = "producer_test.rs"]
mod producer_test;
