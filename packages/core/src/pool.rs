//! Bounded-concurrency execution of independent requests.
//!
//! A batch is spread over a fixed set of worker threads that drain one shared
//! bounded task queue. Every descriptor yields exactly one result, and the
//! results come back in input order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, sync_channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::locator::{fetch, Response};
use crate::transport::Transport;
use crate::types::RequestDescriptor;
use crate::Error;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

type Task = (usize, RequestDescriptor);
type Outcome = (usize, Result<Response, Error>);

/// A fixed-size pool of fetch workers.
#[derive(Clone)]
pub struct FetchPool {
    transport: Arc<dyn Transport>,
    workers: usize,
    queue_capacity: usize,
    poll_interval: Duration,
    batch_timeout: Option<Duration>,
}

impl FetchPool {
    /// A pool of `workers` threads (at least one).
    pub fn new(transport: Arc<dyn Transport>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            transport,
            workers,
            queue_capacity: workers * 2,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_timeout: None,
        }
    }

    /// Bound on queued, not yet claimed descriptors.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// How long an idle worker waits on the queue before rechecking shutdown.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Give up on unfinished slots once the batch has run this long.
    ///
    /// No task is claimed after the deadline, but requests already in flight
    /// run to completion, so `submit_batch` may return later than this.
    #[must_use]
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = Some(timeout);
        self
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Execute every descriptor and return one result per descriptor, in
    /// input order.
    ///
    /// Failures are captured in their slot; one failing request never
    /// aborts the others. Descriptors are pulled from `descriptors` only as
    /// the task queue has room. All workers have stopped when this returns.
    pub fn submit_batch<I>(&self, descriptors: I) -> Vec<Result<Response, Error>>
    where
        I: IntoIterator<Item = RequestDescriptor>,
        I::IntoIter: ExactSizeIterator + Send,
    {
        let descriptors = descriptors.into_iter();
        let total = descriptors.len();
        if total == 0 {
            return Vec::new();
        }

        let deadline = self.batch_timeout.map(|timeout| Instant::now() + timeout);
        let (task_tx, task_rx) = sync_channel::<Task>(self.queue_capacity);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, result_rx) = mpsc::channel::<Outcome>();
        let shutdown = AtomicBool::new(false);

        let mut slots: Vec<Option<Result<Response, Error>>> = (0..total).map(|_| None).collect();
        let mut timed_out = false;

        debug!(
            requests = total,
            workers = self.workers,
            queue_capacity = self.queue_capacity,
            "starting fetch batch"
        );

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.workers);
            for id in 0..self.workers {
                let worker = Worker {
                    id,
                    transport: &self.transport,
                    tasks: Arc::clone(&task_rx),
                    results: result_tx.clone(),
                    shutdown: &shutdown,
                    poll_interval: self.poll_interval,
                };
                match thread::Builder::new()
                    .name(format!("rabj-fetch-{}", id))
                    .spawn_scoped(scope, move || worker.run())
                {
                    Ok(handle) => handles.push(handle),
                    Err(e) => warn!(worker = id, error = %e, "failed to spawn fetch worker"),
                }
            }
            // Workers own the only remaining handles on both queues.
            drop(task_rx);
            drop(result_tx);

            let shutdown = &shutdown;
            let producer = thread::Builder::new()
                .name("rabj-fetch-producer".to_string())
                .spawn_scoped(scope, move || {
                    for task in descriptors.enumerate() {
                        if shutdown.load(Ordering::SeqCst) || task_tx.send(task).is_err() {
                            break;
                        }
                    }
                });
            if let Err(e) = producer {
                warn!(error = %e, "failed to spawn fetch producer");
            }

            timed_out = collect(&result_rx, &mut slots, deadline);
            shutdown.store(true, Ordering::SeqCst);

            let mut executed = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.join() {
                    Ok(count) => executed.push(count),
                    Err(_) => warn!("fetch worker panicked"),
                }
            }
            debug!(executed = ?executed, timed_out, "fetch batch finished");
        });

        let batch_timeout = self.batch_timeout.unwrap_or_default();
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Some(result) => result,
                None if timed_out => Err(Error::Timeout {
                    index,
                    after: batch_timeout,
                }),
                None => Err(Error::Pool {
                    message: format!("request {} was lost: all fetch workers stopped", index),
                }),
            })
            .collect()
    }
}

/// Run `descriptors` on a pool of `worker_count` workers with default
/// settings.
pub fn submit_batch<I>(
    transport: Arc<dyn Transport>,
    descriptors: I,
    worker_count: usize,
) -> Vec<Result<Response, Error>>
where
    I: IntoIterator<Item = RequestDescriptor>,
    I::IntoIter: ExactSizeIterator + Send,
{
    FetchPool::new(transport, worker_count).submit_batch(descriptors)
}

/// Fill slots until every one has a result, the workers are gone, or the
/// deadline passes. Returns true on deadline.
fn collect(
    results: &Receiver<Outcome>,
    slots: &mut [Option<Result<Response, Error>>],
    deadline: Option<Instant>,
) -> bool {
    let mut remaining = slots.len();
    while remaining > 0 {
        let received = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return true;
                }
                results.recv_timeout(deadline - now)
            }
            None => results.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok((index, result)) => {
                if let Some(slot) = slots.get_mut(index) {
                    if slot.is_none() {
                        *slot = Some(result);
                        remaining -= 1;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => return true,
            Err(RecvTimeoutError::Disconnected) => {
                warn!(remaining, "fetch workers stopped before the batch completed");
                return false;
            }
        }
    }
    false
}

struct Worker<'a> {
    id: usize,
    transport: &'a Arc<dyn Transport>,
    tasks: Arc<Mutex<Receiver<Task>>>,
    results: Sender<Outcome>,
    shutdown: &'a AtomicBool,
    poll_interval: Duration,
}

impl Worker<'_> {
    /// Returns the number of requests this worker executed.
    fn run(self) -> usize {
        let connection = match self.transport.connect() {
            Ok(connection) => connection,
            Err(e) => {
                warn!(worker = self.id, error = %e, "fetch worker could not connect");
                return 0;
            }
        };

        let mut executed = 0;
        while !self.shutdown.load(Ordering::SeqCst) {
            let next = match self.tasks.lock() {
                Ok(tasks) => tasks.recv_timeout(self.poll_interval),
                Err(_) => break,
            };

            match next {
                Ok(_) if self.shutdown.load(Ordering::SeqCst) => break,
                Ok((index, descriptor)) => {
                    let result = fetch(connection.as_ref(), self.transport, &descriptor);
                    executed += 1;
                    // The result is handed over before the next task is claimed.
                    if self.results.send((index, result)).is_err() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!(worker = self.id, executed, "fetch worker stopped");
        executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ResourceAddress;
    use crate::params::Params;
    use crate::transport::mock::MockTransport;
    use crate::types::{HttpRequest, HttpResponse};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn descriptor(path: &str) -> RequestDescriptor {
        RequestDescriptor::get(
            &ResourceAddress::new("http://h/", path).unwrap(),
            Params::new(),
        )
    }

    #[test]
    fn five_requests_with_two_failures() {
        let ok = || MockTransport::envelope_response(json!({"id": "/q/1"}));
        let transport = MockTransport::new()
            .with_response("/item/0", ok())
            .fail_path("/item/1", "connection reset")
            .with_response("/item/2", ok())
            .fail_path("/item/3", "connection reset")
            .with_response("/item/4", ok());

        let descriptors: Vec<_> = (0..5).map(|i| descriptor(&format!("item/{}", i))).collect();
        let results = submit_batch(Arc::new(transport), descriptors, 2);

        assert_eq!(results.len(), 5);
        for (i, result) in results.iter().enumerate() {
            if i == 1 || i == 3 {
                assert!(result.as_ref().unwrap_err().is_transport(), "slot {}", i);
            } else {
                let response = result.as_ref().unwrap();
                let map = response.result().as_map().unwrap();
                assert_eq!(map.id(), Some("/q/1"));
            }
        }
    }

    #[test]
    fn results_follow_input_order_despite_delays() {
        let mut transport = MockTransport::new();
        for i in 0..24 {
            let path = format!("/item/{}", i);
            transport = transport
                .with_response(path.clone(), MockTransport::envelope_response(json!({"n": i})))
                .with_delay(path, Duration::from_millis((i * 7 % 5) as u64 * 3));
        }

        let descriptors: Vec<_> = (0..24).map(|i| descriptor(&format!("item/{}", i))).collect();
        let results = FetchPool::new(Arc::new(transport), 4)
            .with_poll_interval(Duration::from_millis(10))
            .submit_batch(descriptors);

        assert_eq!(results.len(), 24);
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap().value(), json!({"n": i}));
        }
    }

    #[test]
    fn in_flight_requests_never_exceed_worker_count() {
        for k in [1usize, 2, 5, 10, 20] {
            let transport = MockTransport::new()
                .with_response("/slow", MockTransport::envelope_response(json!(true)))
                .with_delay("/slow", Duration::from_millis(15));

            let descriptors: Vec<_> = (0..k * 3).map(|_| descriptor("slow")).collect();
            let results = FetchPool::new(Arc::new(transport.clone()), k)
                .with_poll_interval(Duration::from_millis(10))
                .submit_batch(descriptors);

            assert_eq!(results.len(), k * 3);
            assert!(results.iter().all(Result::is_ok));
            assert!(
                transport.max_in_flight() <= k,
                "k={} saw {} in flight",
                k,
                transport.max_in_flight()
            );
            assert_eq!(transport.connections(), k);
        }
    }

    #[test]
    fn application_errors_are_captured_per_slot() {
        let transport = MockTransport::new()
            .with_response("/good", MockTransport::envelope_response(json!(1)))
            .with_response(
                "/bad",
                MockTransport::error_envelope_response(400, "bad_request", "nope"),
            );

        let results = submit_batch(
            Arc::new(transport),
            vec![descriptor("bad"), descriptor("good")],
            3,
        );
        assert_eq!(
            results[0].as_ref().unwrap_err().application().unwrap().class,
            "bad_request"
        );
        assert_eq!(results[1].as_ref().unwrap().value(), json!(1));
    }

    #[test]
    fn batch_timeout_fills_unfinished_slots() {
        let transport = MockTransport::new()
            .with_response("/fast", MockTransport::envelope_response(json!("fast")))
            .with_response("/slow", MockTransport::envelope_response(json!("slow")))
            .with_delay("/slow", Duration::from_millis(400));

        let results = FetchPool::new(Arc::new(transport), 2)
            .with_poll_interval(Duration::from_millis(10))
            .with_batch_timeout(Duration::from_millis(100))
            .submit_batch(vec![descriptor("fast"), descriptor("slow")]);

        assert_eq!(results[0].as_ref().unwrap().value(), json!("fast"));
        assert!(matches!(
            results[1],
            Err(Error::Timeout { index: 1, .. })
        ));
    }

    #[test]
    fn producer_blocks_while_the_queue_is_full() {
        const CAPACITY: usize = 1;
        const WORKERS: usize = 2;
        const TOTAL: usize = 50;

        let handed_off = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicUsize::new(0));
        let max_ahead = Arc::new(AtomicUsize::new(0));

        let transport = {
            let handed_off = Arc::clone(&handed_off);
            let started = Arc::clone(&started);
            let max_ahead = Arc::clone(&max_ahead);
            MockTransport::new().with_responder(move |_| {
                let started = started.fetch_add(1, Ordering::SeqCst) + 1;
                let ahead = handed_off.load(Ordering::SeqCst).saturating_sub(started);
                max_ahead.fetch_max(ahead, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(3));
                Some(Ok(MockTransport::envelope_response(json!(true))))
            })
        };

        let descriptors = (0..TOTAL).map(|_| descriptor("slow")).inspect(|_| {
            handed_off.fetch_add(1, Ordering::SeqCst);
        });
        let results = FetchPool::new(Arc::new(transport.clone()), WORKERS)
            .with_queue_capacity(CAPACITY)
            .with_poll_interval(Duration::from_millis(10))
            .submit_batch(descriptors);

        assert_eq!(results.len(), TOTAL);
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(handed_off.load(Ordering::SeqCst), TOTAL);
        assert!(
            max_ahead.load(Ordering::SeqCst) <= CAPACITY + WORKERS,
            "producer ran {} descriptors ahead",
            max_ahead.load(Ordering::SeqCst)
        );
        assert!(transport.max_in_flight() <= WORKERS);
    }

    #[test]
    fn no_task_is_claimed_after_the_deadline() {
        let transport = MockTransport::new()
            .with_response("/slow", MockTransport::envelope_response(json!("slow")))
            .with_delay("/slow", Duration::from_millis(300))
            .with_response("/quick", MockTransport::envelope_response(json!("quick")));

        let results = FetchPool::new(Arc::new(transport.clone()), 2)
            .with_queue_capacity(1)
            .with_poll_interval(Duration::from_millis(10))
            .with_batch_timeout(Duration::from_millis(100))
            .submit_batch(vec![
                descriptor("slow"),
                descriptor("slow"),
                descriptor("quick"),
                descriptor("quick"),
            ]);

        assert_eq!(results.len(), 4);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(Error::Timeout { .. }))));
        let sent: Vec<String> = transport
            .recorded_requests()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(sent, vec!["http://h/slow".to_string(); 2]);
    }

    #[test]
    fn empty_batch_starts_no_workers() {
        let transport = MockTransport::new();
        let results = submit_batch(Arc::new(transport.clone()), Vec::<RequestDescriptor>::new(), 4);
        assert!(results.is_empty());
        assert_eq!(transport.connections(), 0);
    }

    #[test]
    fn worker_count_is_clamped() {
        let pool = FetchPool::new(Arc::new(MockTransport::new()), 0);
        assert_eq!(pool.worker_count(), 1);
        assert_eq!(pool.queue_capacity(), 2);
        assert_eq!(pool.with_queue_capacity(0).queue_capacity(), 1);
    }

    struct Unreachable;

    impl Transport for Unreachable {
        fn request(&self, _request: &HttpRequest) -> Result<HttpResponse, Error> {
            Err(Error::connection("unreachable"))
        }

        fn connect(&self) -> Result<Arc<dyn Transport>, Error> {
            Err(Error::connection("unreachable"))
        }
    }

    #[test]
    fn lost_workers_yield_pool_errors() {
        let results = submit_batch(
            Arc::new(Unreachable),
            vec![descriptor("a"), descriptor("b"), descriptor("c")],
            2,
        );
        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(Error::Pool { .. }))));
    }
}
