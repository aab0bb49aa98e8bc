use std::io::{self, BufRead};
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::{ControlRequest, parse_request};

const CHANNEL_CAPACITY: usize = 64;

/// Inbound requests from stdin lines and Ctrl-C, merged into one channel.
pub struct EventHandler {
    rx: mpsc::Receiver<ControlRequest>,
}

impl EventHandler {
    /// Read requests from stdin; Ctrl-C becomes a `Quit`. Must be called
    /// inside a tokio runtime.
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        spawn_interrupt_watcher(tx.clone());
        spawn_reader(io::BufReader::new(io::stdin()), tx);
        Self { rx }
    }

    /// Read requests from an arbitrary line source. The channel closes at EOF.
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        spawn_reader(reader, tx);
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<ControlRequest> {
        self.rx.recv().await
    }

    pub fn into_receiver(self) -> mpsc::Receiver<ControlRequest> {
        self.rx
    }
}

// Blocking reads stay on a plain thread so runtime shutdown never waits on stdin.
fn spawn_reader<R: BufRead + Send + 'static>(reader: R, tx: mpsc::Sender<ControlRequest>) {
    thread::spawn(move || {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, "failed to read request line");
                    break;
                }
            };
            match parse_request(&line) {
                Ok(Some(request)) => {
                    if tx.blocking_send(request).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, line = %line, "ignoring malformed request"),
            }
        }
        debug!("request input closed");
    });
}

fn spawn_interrupt_watcher(tx: mpsc::Sender<ControlRequest>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            let _ = tx.send(ControlRequest::Quit).await;
        }
    });
}
