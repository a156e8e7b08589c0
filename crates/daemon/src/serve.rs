//! Pipeline coordinator
//!
//! Owns the worker groups and the per-plugin control channels. Startup
//! order is producers, then consumers; shutdown reverses it so every
//! in-flight message can drain: stop consumers and wait, let the router
//! run dry, then stop producers and wait.

use std::path::Path;

use anyhow::Result;
use tokio::sync::mpsc;

use spool_core::consumer::ConsumerBase;
use spool_core::control::{control_channel, ControlSignal, WorkerGroup};
use spool_core::producer::ProducerBase;

use crate::builder::{self, PipelineBuild};
use crate::config;

/// Load the configuration and run the pipeline until a shutdown signal.
pub async fn run(config_path: &Path) -> Result<()> {
    let nodes = config::load_plugin_nodes(config_path)?;
    let registry = builder::builtin_registry();
    let build = builder::build(&registry, nodes);

    if build.consumers.is_empty() {
        anyhow::bail!("no consumers configured - nothing to ingest");
    }
    if build.producers.is_empty() {
        anyhow::bail!("no producers configured - nowhere to deliver");
    }

    run_pipeline(build).await
}

async fn run_pipeline(build: PipelineBuild) -> Result<()> {
    let consumer_group = WorkerGroup::new();
    let producer_group = WorkerGroup::new();

    let metrics = build.router.metrics_handle();
    let (router_tx, router_rx) = mpsc::unbounded_channel();
    let router_task = tokio::spawn(build.router.run(router_rx));

    let mut controls = Vec::new();
    let mut consumer_controls = Vec::new();
    let mut producer_controls = Vec::new();

    for spec in build.producers {
        let (ctl_tx, ctl_rx) = control_channel();
        let base = ProducerBase::new(
            ctl_rx,
            spec.receiver,
            spec.formatter,
            producer_group.register(),
        );
        tracing::info!(producer = %spec.name, "starting producer");
        tokio::spawn(spec.plugin.produce(base));
        controls.push(ctl_tx.clone());
        producer_controls.push(ctl_tx);
    }

    for spec in build.consumers {
        let (ctl_tx, ctl_rx) = control_channel();
        let base = ConsumerBase::new(
            spec.streams,
            router_tx.clone(),
            ctl_rx,
            consumer_group.register(),
        );
        tracing::info!(consumer = %spec.name, "starting consumer");
        tokio::spawn(spec.plugin.consume(base));
        controls.push(ctl_tx.clone());
        consumer_controls.push(ctl_tx);
    }
    // Consumers hold their own clones; the router runs dry once they stop.
    drop(router_tx);

    wait_for_shutdown(&controls).await;

    tracing::info!("stopping consumers");
    for control in &consumer_controls {
        control.send(ControlSignal::Stop).await.ok();
    }
    consumer_group.wait().await;
    router_task.await.ok();

    tracing::info!("stopping producers");
    for control in &producer_controls {
        control.send(ControlSignal::Stop).await.ok();
    }
    producer_group.wait().await;

    let snapshot = metrics.snapshot();
    tracing::info!(
        messages_received = snapshot.messages_received,
        messages_routed = snapshot.messages_routed,
        messages_dropped = snapshot.messages_dropped,
        "pipeline stopped"
    );
    Ok(())
}

/// Block until SIGINT/SIGTERM. SIGHUP rolls every plugin instead of
/// stopping (file handles reopen, tail positions re-resolve).
#[cfg(unix)]
async fn wait_for_shutdown(controls: &[mpsc::Sender<ControlSignal>]) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(err) => {
            tracing::warn!(%err, "cannot listen for SIGTERM");
            None
        }
    };
    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => Some(stream),
        Err(err) => {
            tracing::warn!(%err, "cannot listen for SIGHUP");
            None
        }
    };

    loop {
        let term_signal = async {
            match term.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => std::future::pending().await,
            }
        };
        let hangup_signal = async {
            match hangup.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                break;
            }
            _ = term_signal => {
                tracing::info!("termination requested, shutting down");
                break;
            }
            _ = hangup_signal => {
                tracing::info!("hangup received, rolling all plugins");
                for control in controls {
                    control.send(ControlSignal::Roll).await.ok();
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_controls: &[mpsc::Sender<ControlSignal>]) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("interrupt received, shutting down");
    }
}
