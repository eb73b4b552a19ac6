//! Sample workers: one endpoint call and one durable write per message.
//!
//! A worker processes a dispatched [`SampleMessage`] end to end: POST the
//! sample to the participant endpoint, normalize the response, record the
//! outcome idempotently, and give finalization an eager nudge. Workers for
//! the same run may execute in parallel — within one batch invocation they
//! are bounded by the configured concurrency — and share no state beyond
//! the store.
//!
//! Per-sample failures (timeout, non-200, transport error, unrecognized
//! response shape) are recorded as `ok = false` with no prediction and no
//! latency; they never abort the run, and they always count toward
//! `samples_processed`. A duplicate delivery is detected by the store and
//! swallowed silently.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, instrument, trace, warn};

use crate::annotation::normalize_prediction;
use crate::client::EndpointClient;
use crate::configuration::Configuration;
use crate::finalize::Finalizer;
use crate::model::Prediction;
use crate::queue::SampleMessage;
use crate::store::{RecordOutcome, RunStore};

/// Processes dispatched sample messages against participant endpoints.
pub struct SampleWorker {
    store: Arc<dyn RunStore>,
    client: EndpointClient,
    finalizer: Finalizer,
    concurrency: usize,
}

impl SampleWorker {
    pub fn new(store: Arc<dyn RunStore>, config: &Configuration) -> Self {
        Self {
            client: EndpointClient::new(config),
            finalizer: Finalizer::new(Arc::clone(&store), config),
            concurrency: config.worker_concurrency.max(1),
            store,
        }
    }

    /// Processes one message: call, normalize, record, eager-finalize.
    #[instrument(skip(self, message), fields(message_id = %message.message_id))]
    pub fn process_message(&self, message: &SampleMessage) {
        let prediction = self.evaluate(message);
        let ok = prediction.ok;

        match self.store.record_prediction(prediction) {
            Ok(RecordOutcome::Inserted) => {
                trace!(ok, "sample recorded");
            }
            Ok(RecordOutcome::Duplicate) => {
                // at-least-once delivery; the original insert already counted
                debug!("duplicate delivery ignored");
                return;
            }
            Err(err) => {
                warn!(%err, "failed to record sample");
                return;
            }
        }

        // best-effort: the reaper will catch the run if this attempt is lost
        if let Err(err) = self.finalizer.try_finalize(message.run_id) {
            warn!(%err, "eager finalization attempt failed");
        }
    }

    /// Processes a batch with at most the configured number of concurrent
    /// workers pulling from a shared deque.
    pub fn process_batch(&self, messages: Vec<SampleMessage>) {
        if messages.is_empty() {
            return;
        }
        let workers = self.concurrency.min(messages.len());
        let pending = Mutex::new(VecDeque::from(messages));

        std::thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| loop {
                    let next = pending.lock().expect("poisoned").pop_front();
                    let Some(message) = next else {
                        break;
                    };
                    self.process_message(&message);
                });
            }
        });
    }

    /// One endpoint call, reduced to the prediction row to insert.
    fn evaluate(&self, message: &SampleMessage) -> Prediction {
        let mut latency_ms = None;
        let mut predicted = None;

        match self.client.predict(&message.endpoint_url, &message.sample) {
            Ok(response) => match normalize_prediction(&response.body) {
                Some(spans) => {
                    latency_ms = Some(response.latency_ms);
                    predicted = Some(spans);
                }
                None => {
                    debug!("unrecognized response shape, marking sample failed");
                }
            },
            Err(err) => {
                debug!(%err, "endpoint call failed");
            }
        }

        Prediction {
            run_id: message.run_id,
            sample_index: message.sample_index,
            latency_ms,
            ok: predicted.is_some(),
            gold: message.gold.clone(),
            predicted,
        }
    }
}
