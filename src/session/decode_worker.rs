use crate::decoder::FrameDecoder;
use crate::models::{DecodeResult, Frame};
use crate::utils::mailbox::Mailbox;
use crossbeam_channel::{Receiver, Sender, select, unbounded};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Outcome of one decode attempt
#[derive(Debug)]
pub(crate) struct DecodeReport {
    pub sequence: u64,
    pub result: DecodeResult,
    pub elapsed: Duration,
}

/// Background decoder fed through a single-slot mailbox.
///
/// At most one frame is decoding and at most one is waiting; a newly
/// submitted frame replaces the waiting one. Dropping the worker stops it and
/// joins its thread (waiting out a decode that is already running).
pub(crate) struct DecodeWorker {
    pending: Arc<Mailbox<Arc<Frame>>>,
    reports: Receiver<DecodeReport>,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    budget: Duration,
}

impl DecodeWorker {
    pub(crate) fn spawn(
        mut decoder: Box<dyn FrameDecoder>,
        budget: Duration,
    ) -> std::io::Result<Self> {
        let pending: Arc<Mailbox<Arc<Frame>>> = Arc::new(Mailbox::new());
        let (report_tx, reports) = unbounded();
        let (shutdown, shutdown_rx) = unbounded::<()>();

        let handle = {
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name("qr-scan-decode".to_string())
                .spawn(move || {
                    loop {
                        select! {
                            recv(pending.receiver()) -> msg => {
                                let Ok(frame) = msg else { break };
                                let report = decode_one(decoder.as_mut(), &frame);
                                if report_tx.send(report).is_err() {
                                    break;
                                }
                            }
                            recv(shutdown_rx) -> _ => break,
                        }
                    }
                    trace!("decode worker exiting");
                })?
        };

        Ok(Self {
            pending,
            reports,
            shutdown: Some(shutdown),
            handle: Some(handle),
            budget,
        })
    }

    /// Offer a frame for decoding, superseding any frame still waiting
    pub(crate) fn submit(&self, frame: Arc<Frame>) {
        let sequence = frame.sequence();
        if let Some(stale) = self.pending.put(frame) {
            trace!(
                superseded = stale.sequence(),
                by = sequence,
                "frame superseded before decode"
            );
        }
    }

    /// Drain finished decodes; returns the first decoded text within budget
    pub(crate) fn poll_decoded(&self) -> Option<String> {
        for report in self.reports.try_iter() {
            if report.elapsed > self.budget {
                debug!(
                    sequence = report.sequence,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "decode over budget, result discarded"
                );
                continue;
            }
            match report.result {
                DecodeResult::Decoded { text } => {
                    debug!(
                        sequence = report.sequence,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "frame decoded"
                    );
                    return Some(text);
                }
                DecodeResult::NotFound => {
                    trace!(sequence = report.sequence, "no symbol");
                }
                DecodeResult::DecodeError { reason } => {
                    debug!(sequence = report.sequence, %reason, "symbol could not be decoded");
                }
            }
        }
        None
    }

    /// Stop and join the worker
    pub(crate) fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.pending.take();
        // Disconnecting the shutdown channel wakes the select
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("decode worker panicked");
            }
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn decode_one(decoder: &mut dyn FrameDecoder, frame: &Frame) -> DecodeReport {
    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(frame)))
        .unwrap_or_else(|payload| DecodeResult::DecodeError {
            reason: format!("decoder panicked: {}", panic_message(payload.as_ref())),
        });
    DecodeReport {
        sequence: frame.sequence(),
        result,
        elapsed: start.elapsed(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
