//! The periodic driver: ticks, inbound requests and cycle completion all
//! funnel through one `select!` loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::collector::Monitor;
use super::control::ActionDispatcher;
use super::snapshot::Snapshot;
use crate::action::ActionResponse;
use crate::protocol::ControlRequest;

pub const DEFAULT_PERIOD: Duration = Duration::from_millis(2000);

pub struct PollLoop {
    monitor: Arc<Monitor>,
    dispatcher: ActionDispatcher,
    period: Duration,
    snapshots: mpsc::Sender<Snapshot>,
    responses: mpsc::Sender<ActionResponse>,
}

enum LoopEvent {
    Tick,
    Request(ControlRequest),
    RequestsClosed,
    CycleDone,
}

impl PollLoop {
    pub fn new(
        monitor: Arc<Monitor>,
        dispatcher: ActionDispatcher,
        period: Duration,
        snapshots: mpsc::Sender<Snapshot>,
        responses: mpsc::Sender<ActionResponse>,
    ) -> Self {
        PollLoop {
            monitor,
            dispatcher,
            period,
            snapshots,
            responses,
        }
    }

    /// Run until a `Quit` request arrives or nobody is listening for
    /// snapshots any more. The first cycle starts immediately.
    pub async fn run(self, mut requests: mpsc::Receiver<ControlRequest>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight: Option<JoinHandle<()>> = None;
        let mut refresh_pending = false;
        let mut requests_open = true;

        info!(period_ms = self.period.as_millis() as u64, "poll loop started");
        loop {
            let event = tokio::select! {
                _ = ticker.tick() => LoopEvent::Tick,
                request = requests.recv(), if requests_open => match request {
                    Some(request) => LoopEvent::Request(request),
                    None => LoopEvent::RequestsClosed,
                },
                _ = wait_for(&mut in_flight) => LoopEvent::CycleDone,
            };

            match event {
                LoopEvent::Tick => {
                    if in_flight.is_some() {
                        debug!("tick skipped; cycle still in flight");
                    } else {
                        in_flight = Some(self.spawn_cycle());
                    }
                }
                LoopEvent::Request(ControlRequest::Refresh) => {
                    if in_flight.is_some() {
                        refresh_pending = true;
                    } else {
                        in_flight = Some(self.spawn_cycle());
                    }
                }
                LoopEvent::Request(ControlRequest::Track { pid }) => {
                    self.monitor.tracked().add(pid);
                }
                LoopEvent::Request(ControlRequest::Untrack { pid }) => {
                    self.monitor.tracked().remove(pid);
                }
                LoopEvent::Request(ControlRequest::Action(request)) => {
                    let dispatcher = self.dispatcher.clone();
                    let responses = self.responses.clone();
                    tokio::spawn(async move {
                        let response = dispatcher.dispatch(request).await;
                        if responses.send(response).await.is_err() {
                            debug!("action response dropped; receiver closed");
                        }
                    });
                }
                LoopEvent::Request(ControlRequest::Quit) => {
                    info!("quit requested");
                    break;
                }
                LoopEvent::RequestsClosed => {
                    debug!("request channel closed; polling continues");
                    requests_open = false;
                }
                LoopEvent::CycleDone => {
                    in_flight = None;
                    if self.snapshots.is_closed() {
                        info!("snapshot receiver closed; stopping");
                        break;
                    }
                    if refresh_pending {
                        refresh_pending = false;
                        in_flight = Some(self.spawn_cycle());
                    }
                }
            }
        }

        if let Some(handle) = in_flight {
            let _ = handle.await;
        }
        info!("poll loop stopped");
    }

    fn spawn_cycle(&self) -> JoinHandle<()> {
        let monitor = Arc::clone(&self.monitor);
        let snapshots = self.snapshots.clone();
        tokio::spawn(async move {
            if let Some(snapshot) = monitor.cycle().await
                && snapshots.send(snapshot).await.is_err()
            {
                debug!("snapshot dropped; receiver closed");
            }
        })
    }
}

/// Resolves when the in-flight cycle finishes; never resolves when idle.
async fn wait_for(slot: &mut Option<JoinHandle<()>>) {
    match slot {
        Some(handle) => {
            let _ = handle.await;
        }
        None => std::future::pending().await,
    }
}
