//! Single-writer store dispatcher.
//!
//! All mutating domain operations and history replays funnel through one
//! worker thread over a FIFO channel, which gives the strictly ordered
//! dispatch the interaction model relies on. Every submission is tagged
//! with a monotonic generation; completions below the caller-raised floor
//! are dropped so a save that resolves after the user already undid it
//! cannot corrupt state.
use crate::store::{apply, StoreReply, StoreRequest, TimelineStore};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug)]
struct Envelope {
    generation: u64,
    request: StoreRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub generation: u64,
    pub label: &'static str,
    pub result: Result<StoreReply, String>,
}

pub struct StoreDispatcher {
    request_tx: Option<Sender<Envelope>>,
    completion_rx: Receiver<Completion>,
    worker: Option<JoinHandle<()>>,
    next_generation: u64,
    stale_floor: u64,
}

impl StoreDispatcher {
    pub fn spawn(mut store: Box<dyn TimelineStore>) -> Self {
        let (request_tx, request_rx) = channel::<Envelope>();
        let (completion_tx, completion_rx) = channel::<Completion>();

        let worker = std::thread::spawn(move || {
            // Requests are handled one at a time in submission order.
            for envelope in request_rx {
                let label = envelope.request.describe();
                let result =
                    apply(store.as_mut(), envelope.request).map_err(|err| err.to_string());
                let completion = Completion {
                    generation: envelope.generation,
                    label,
                    result,
                };
                if completion_tx.send(completion).is_err() {
                    break;
                }
            }
        });

        Self {
            request_tx: Some(request_tx),
            completion_rx,
            worker: Some(worker),
            next_generation: 0,
            stale_floor: 0,
        }
    }

    /// Enqueue a request and return its generation tag.
    pub fn submit(&mut self, request: StoreRequest) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some(tx) = &self.request_tx {
            if tx
                .send(Envelope {
                    generation,
                    request,
                })
                .is_err()
            {
                tracing::error!("store worker is gone; request {generation} dropped");
            }
        }
        generation
    }

    /// Completions at or below this generation are considered stale and
    /// silently discarded from now on.
    pub fn discard_up_to(&mut self, generation: u64) {
        self.stale_floor = self.stale_floor.max(generation);
    }

    /// Non-blocking drain of finished work, oldest first.
    pub fn poll(&mut self) -> Vec<Completion> {
        let mut out = Vec::new();
        loop {
            match self.completion_rx.try_recv() {
                Ok(completion) => {
                    if completion.generation <= self.stale_floor {
                        tracing::debug!(
                            "discarding stale completion {} ({})",
                            completion.generation,
                            completion.label
                        );
                        continue;
                    }
                    out.push(completion);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// Blocking receive with the same staleness filtering; test harness use.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Completion> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(std::time::Instant::now())?;
            match self.completion_rx.recv_timeout(remaining) {
                Ok(completion) if completion.generation <= self.stale_floor => continue,
                Ok(completion) => return Some(completion),
                Err(_) => return None,
            }
        }
    }
}

impl Drop for StoreDispatcher {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.request_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventType, TimelineEvent};
    use crate::store::MemoryStore;

    fn event(id: &str) -> TimelineEvent {
        TimelineEvent {
            id: id.into(),
            timeline_id: "t1".into(),
            track_id: "tr".into(),
            title: "T".into(),
            description: String::new(),
            start_date: "2024-01-01".into(),
            end_date: None,
            event_type: EventType::Point,
            importance: 3,
            color: None,
            tags: String::new(),
        }
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn completions_arrive_in_submission_order() {
        let mut dispatcher = StoreDispatcher::spawn(Box::new(MemoryStore::new()));
        let g1 = dispatcher.submit(StoreRequest::CreateEvent(event("a")));
        let g2 = dispatcher.submit(StoreRequest::CreateEvent(event("b")));
        let g3 = dispatcher.submit(StoreRequest::ListEvents("t1".into()));

        let c1 = dispatcher.recv_timeout(WAIT).expect("first completion");
        let c2 = dispatcher.recv_timeout(WAIT).expect("second completion");
        let c3 = dispatcher.recv_timeout(WAIT).expect("third completion");
        assert_eq!((c1.generation, c2.generation, c3.generation), (g1, g2, g3));

        match c3.result.expect("list succeeds") {
            StoreReply::Events(events) => assert_eq!(events.len(), 2),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn failures_propagate_as_err_completions() {
        let mut dispatcher = StoreDispatcher::spawn(Box::new(MemoryStore::new()));
        dispatcher.submit(StoreRequest::DeleteEvent("ghost".into()));
        let completion = dispatcher.recv_timeout(WAIT).expect("completion");
        let err = completion.result.expect_err("delete of missing id fails");
        assert!(err.contains("ghost"));
    }

    #[test]
    fn stale_completions_are_discarded() {
        let mut dispatcher = StoreDispatcher::spawn(Box::new(MemoryStore::new()));
        let stale = dispatcher.submit(StoreRequest::CreateEvent(event("a")));
        dispatcher.discard_up_to(stale);
        let live = dispatcher.submit(StoreRequest::ListEvents("t1".into()));

        let completion = dispatcher.recv_timeout(WAIT).expect("live completion");
        assert_eq!(completion.generation, live);
        assert!(dispatcher.poll().is_empty());
    }
}
