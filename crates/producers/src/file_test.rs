//! Tests for the batched file producer

use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

use spool_core::config::PluginConfig;
use spool_core::control::{control_channel, ControlSignal, WorkerGroup};
use spool_core::format::Envelope;
use spool_core::message::{Message, StreamId};
use spool_core::plugin::{Plugin, Producer};
use spool_core::producer::ProducerBase;

use crate::file::FileProducer;

struct Harness {
    control: mpsc::Sender<ControlSignal>,
    messages: mpsc::Sender<Message>,
    group: WorkerGroup,
}

impl Harness {
    fn start(doc: &str) -> Self {
        let table: toml::Table = toml::from_str(doc).expect("valid toml");
        let mut node = PluginConfig::from_table(table).expect("valid node");

        let mut producer = FileProducer::default();
        producer.configure(&mut node).expect("configure");

        let group = WorkerGroup::new();
        let (control, ctl_rx) = control_channel();
        let (messages, msg_rx) = mpsc::channel(64);
        let base = ProducerBase::new(
            ctl_rx,
            msg_rx,
            Box::new(Envelope::default()),
            group.register(),
        );
        tokio::spawn(async move { Box::new(producer).produce(base).await });

        Self {
            control,
            messages,
            group,
        }
    }

    async fn send(&self, stream: &str, payload: &[u8], sequence: u64) {
        self.messages
            .send(Message::from_slice(
                payload,
                StreamId::from_name(stream),
                sequence,
            ))
            .await
            .expect("send");
    }

    async fn stop(self) {
        self.control.send(ControlSignal::Stop).await.ok();
        timeout(Duration::from_secs(10), self.group.wait())
            .await
            .expect("producer shuts down");
    }
}

#[tokio::test]
async fn shutdown_flushes_everything() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("out.log");

    let harness = Harness::start(&format!(
        r#"
        Type = "producer.file"
        File = "{}"
        "#,
        path.display()
    ));

    harness.send("s", b"one", 0).await;
    harness.send("s", b"two", 1).await;
    harness.send("s", b"three", 2).await;
    harness.stop().await;

    let written = std::fs::read_to_string(&path).expect("file written");
    assert_eq!(written, "one\ntwo\nthree\n");
}

#[tokio::test]
async fn size_trigger_flushes_before_shutdown() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("out.log");

    // A 1-byte trigger flushes after every message.
    let harness = Harness::start(&format!(
        r#"
        Type = "producer.file"
        File = "{}"
        BatchSizeByte = 1
        "#,
        path.display()
    ));

    harness.send("s", b"early", 0).await;

    // The flush should land on disk without any shutdown involved.
    let mut written = String::new();
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        written = std::fs::read_to_string(&path).unwrap_or_default();
        if !written.is_empty() {
            break;
        }
    }
    assert_eq!(written, "early\n");
    harness.stop().await;
}

#[tokio::test]
async fn category_labels_prefix_mapped_streams() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("out.log");

    let harness = Harness::start(&format!(
        r#"
        Type = "producer.file"
        File = "{}"

        [Category]
        accesslog = "access"
        "#,
        path.display()
    ));

    harness.send("accesslog", b"hit", 0).await;
    harness.send("other", b"miss", 1).await;
    harness.stop().await;

    let written = std::fs::read_to_string(&path).expect("file written");
    assert_eq!(written, "access\thit\nmiss\n");
}

#[tokio::test]
async fn wildcard_category_applies_to_unmapped_streams() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("out.log");

    let harness = Harness::start(&format!(
        r#"
        Type = "producer.file"
        File = "{}"

        [Category]
        "*" = "misc"
        "#,
        path.display()
    ));

    harness.send("anything", b"payload", 0).await;
    harness.stop().await;

    let written = std::fs::read_to_string(&path).expect("file written");
    assert_eq!(written, "misc\tpayload\n");
}

#[tokio::test]
async fn missing_file_option_fails_configuration() {
    let table: toml::Table = toml::from_str(r#"Type = "producer.file""#).expect("toml");
    let mut node = PluginConfig::from_table(table).expect("node");
    let mut producer = FileProducer::default();
    assert!(producer.configure(&mut node).is_err());
}

#[tokio::test]
async fn non_positive_batch_options_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let doc = format!(
        r#"
        Type = "producer.file"
        File = "{}"
        BatchSizeByte = 0
        "#,
        dir.path().join("out.log").display()
    );
    let table: toml::Table = toml::from_str(&doc).expect("toml");
    let mut node = PluginConfig::from_table(table).expect("node");
    let mut producer = FileProducer::default();
    assert!(producer.configure(&mut node).is_err());
}
