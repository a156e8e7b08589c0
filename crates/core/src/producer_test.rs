//! Tests for the producer message control loop

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::PluginConfig;
use crate::control::{control_channel, ControlSignal, WorkerGroup};
use crate::format::Forward;
use crate::message::{Message, StreamId};
use crate::producer::{MessageHandler, ProducerBase, STOP_DRAIN_LIMIT};

#[derive(Default)]
struct Recorder {
    payloads: Vec<Vec<u8>>,
    ticks: usize,
    rolls: usize,
    reconfigures: usize,
}

#[async_trait]
impl MessageHandler for Recorder {
    async fn on_message(&mut self, message: Message) {
        self.payloads.push(message.payload().to_vec());
    }

    async fn on_tick(&mut self) {
        self.ticks += 1;
    }

    async fn on_roll(&mut self) {
        self.rolls += 1;
    }

    async fn on_reconfigure(&mut self, _node: PluginConfig) {
        self.reconfigures += 1;
    }
}

fn base_pair(
    queue: usize,
) -> (
    ProducerBase,
    mpsc::Sender<ControlSignal>,
    mpsc::Sender<Message>,
    WorkerGroup,
) {
    let group = WorkerGroup::new();
    let (ctl_tx, ctl_rx) = control_channel();
    let (msg_tx, msg_rx) = mpsc::channel(queue);
    let base = ProducerBase::new(ctl_rx, msg_rx, Box::new(Forward::default()), group.register());
    (base, ctl_tx, msg_tx, group)
}

fn message(payload: &[u8], sequence: u64) -> Message {
    Message::from_slice(payload, StreamId::from_name("test"), sequence)
}

#[tokio::test]
async fn messages_are_delivered_in_order() {
    let (mut base, ctl_tx, msg_tx, group) = base_pair(16);

    for (i, payload) in [b"one".as_slice(), b"two", b"three"].iter().enumerate() {
        msg_tx.send(message(payload, i as u64)).await.expect("send");
    }
    ctl_tx.send(ControlSignal::Stop).await.expect("stop");

    let mut recorder = Recorder::default();
    base.control_loop(&mut recorder, None).await;
    drop(base);

    assert_eq!(
        recorder.payloads,
        vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
    );
    group.wait().await;
}

#[tokio::test]
async fn stop_drains_pending_messages() {
    let (mut base, ctl_tx, msg_tx, _group) = base_pair(64);

    // Queue messages and the stop before the loop even starts: the drain
    // must still deliver everything already accepted.
    for i in 0..10u64 {
        msg_tx.send(message(b"m", i)).await.expect("send");
    }
    ctl_tx.send(ControlSignal::Stop).await.expect("stop");

    let mut recorder = Recorder::default();
    base.control_loop(&mut recorder, None).await;

    assert_eq!(recorder.payloads.len(), 10);
}

#[tokio::test]
async fn drain_is_bounded() {
    let over = STOP_DRAIN_LIMIT + 5;
    let (mut base, ctl_tx, msg_tx, _group) = base_pair(over);

    for i in 0..over {
        msg_tx.send(message(b"m", i as u64)).await.expect("send");
    }
    ctl_tx.send(ControlSignal::Stop).await.expect("stop");

    let mut recorder = Recorder::default();
    base.control_loop(&mut recorder, None).await;

    assert_eq!(recorder.payloads.len(), STOP_DRAIN_LIMIT);
}

#[tokio::test]
async fn roll_and_reconfigure_reach_the_handler() {
    let (mut base, ctl_tx, _msg_tx, _group) = base_pair(4);

    ctl_tx.send(ControlSignal::Roll).await.expect("roll");
    ctl_tx
        .send(ControlSignal::Reconfigure(PluginConfig::new("producer.test")))
        .await
        .expect("reconfigure");
    ctl_tx.send(ControlSignal::Stop).await.expect("stop");

    let mut recorder = Recorder::default();
    base.control_loop(&mut recorder, None).await;

    assert_eq!(recorder.rolls, 1);
    assert_eq!(recorder.reconfigures, 1);
}

#[tokio::test(start_paused = true)]
async fn ticks_fire_on_the_requested_period() {
    let (mut base, ctl_tx, _msg_tx, _group) = base_pair(4);

    let loop_task = tokio::spawn(async move {
        let mut recorder = Recorder::default();
        base.control_loop(&mut recorder, Some(Duration::from_millis(100)))
            .await;
        recorder
    });

    tokio::time::sleep(Duration::from_millis(350)).await;
    ctl_tx.send(ControlSignal::Stop).await.expect("stop");

    let recorder = loop_task.await.expect("loop task");
    assert!(recorder.ticks >= 3, "expected >= 3 ticks, got {}", recorder.ticks);
}

#[tokio::test]
async fn closed_message_channel_ends_the_loop() {
    let (mut base, _ctl_tx, msg_tx, _group) = base_pair(4);
    drop(msg_tx);

    let mut recorder = Recorder::default();
    base.control_loop(&mut recorder, None).await;
    assert!(recorder.payloads.is_empty());
}
