//! The per-partition producer actor.
//!
//! Each topic partition is owned by exactly one actor task. The task owns a
//! command channel and all mutable producer state, which serialises sequence
//! assignment and batch coalescing without locks and isolates failures to a
//! single partition. Publish calls post a command carrying an optional
//! one-shot reply sender and either await the receipt or return immediately.
//!
//! The actor multiplexes five event sources: publish commands, the flush
//! tick (batch mode only), the jittered broker-refresh tick, connection
//! liveness, and the close directive. While it is suspended on a broker
//! round trip it accepts no new events, which is the natural flow-control
//! point.

use crate::batch::{BatchQueue, ReplyHandle};
use crate::config::ProducerOptions;
use crate::connection::{Connection, ConnectionEvent, ConnectionManager, ProducerRegistration};
use crate::lookup::LookupService;
use crate::message::{now_millis, MessageId, ProducerMessage, SendOptions};
use crate::topic::Topic;
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Capacity of the actor's command channel
const COMMAND_BUFFER: usize = 128;

// ============================================================================
// Exit classification
// ============================================================================

/// Why a producer actor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Orderly stop: `close()` was called, every handle was dropped, or the
    /// broker asked the producer to wind down.
    Shutdown,
    /// The actor died on a fatal error; the owner should recreate the
    /// producer from a fresh lookup.
    Error(Error),
}

enum Command {
    Publish {
        payload: Bytes,
        options: SendOptions,
        reply: ReplyHandle,
    },
    Close,
}

// ============================================================================
// Public handle
// ============================================================================

/// Handle to a single-partition producer actor.
///
/// The handle is cheap to use from many tasks; ordering guarantees apply to
/// the order in which the actor processes publish commands, per partition
/// only.
pub struct PartitionProducer {
    topic: Topic,
    registration: ProducerRegistration,
    command_tx: mpsc::Sender<Command>,
    exit_rx: watch::Receiver<Option<ExitReason>>,
}

impl PartitionProducer {
    /// Resolve the owning broker, check out a connection, register the
    /// producer, and spawn its actor task.
    pub async fn create(
        lookup: Arc<dyn LookupService>,
        connections: Arc<dyn ConnectionManager>,
        topic: Topic,
        options: ProducerOptions,
    ) -> Result<Self> {
        let options = options.clamped();

        let broker = lookup.lookup_topic(&topic).await?;
        let connection = connections.get_connection(&broker).await?;
        let registration = connection.create_producer(&topic.to_string(), &options).await?;

        info!(
            topic = %topic,
            broker = %broker,
            producer_id = registration.producer_id,
            producer_name = %registration.producer_name,
            batch_enabled = options.batch_enabled,
            "Producer created"
        );

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (exit_tx, exit_rx) = watch::channel(None);

        let state = ProducerState {
            topic: topic.clone(),
            broker,
            connection,
            last_sequence_id: registration.last_sequence_id,
            registration: registration.clone(),
            options,
            queue: BatchQueue::new(),
        };

        tokio::spawn(run_actor(state, lookup, command_rx, exit_tx));

        Ok(Self {
            topic,
            registration,
            command_tx,
            exit_rx,
        })
    }

    /// Publish and wait for the broker receipt.
    ///
    /// In batch mode the receipt arrives when the whole batch is dispatched,
    /// so the caller may wait up to one flush interval plus one round trip.
    pub async fn send(
        &self,
        payload: impl Into<Bytes>,
        options: SendOptions,
    ) -> Result<MessageId> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Publish {
                payload: payload.into(),
                options,
                reply: Some(tx),
            })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Publish without waiting for a receipt. Send errors are dropped after
    /// logging at the transport layer.
    pub async fn send_async(
        &self,
        payload: impl Into<Bytes>,
        options: SendOptions,
    ) -> Result<()> {
        self.command_tx
            .send(Command::Publish {
                payload: payload.into(),
                options,
                reply: None,
            })
            .await
            .map_err(|_| Error::Closed)
    }

    /// Ask the actor to stop. Queued entries are failed with
    /// [`Error::Closed`].
    pub async fn close(&self) {
        let _ = self.command_tx.send(Command::Close).await;
    }

    /// Wait until the actor has fully released its slot and report why it
    /// stopped. On abnormal exits this resolves only after the termination
    /// backoff has elapsed.
    pub async fn wait_closed(&self) -> ExitReason {
        let mut exit_rx = self.exit_rx.clone();
        loop {
            if let Some(reason) = exit_rx.borrow_and_update().as_ref() {
                return reason.clone();
            }
            if exit_rx.changed().await.is_err() {
                let last = exit_rx.borrow();
                return last.as_ref().cloned().unwrap_or(ExitReason::Shutdown);
            }
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Numeric handle assigned by the broker on the shared connection.
    pub fn producer_id(&self) -> u64 {
        self.registration.producer_id
    }

    /// Broker-assigned producer name.
    pub fn producer_name(&self) -> &str {
        &self.registration.producer_name
    }

    /// Largest payload the broker will accept from this producer.
    pub fn max_message_size(&self) -> usize {
        self.registration.max_message_size
    }
}

// ============================================================================
// Actor state
// ============================================================================

/// State owned exclusively by one actor task. Nothing else mutates it.
struct ProducerState {
    topic: Topic,
    broker: String,
    connection: Arc<dyn Connection>,
    registration: ProducerRegistration,
    last_sequence_id: u64,
    options: ProducerOptions,
    queue: BatchQueue,
}

impl ProducerState {
    /// Allocate the next message from user payload and options. Does not
    /// suspend; the k-th call yields `initial_sequence_id + k`.
    fn next_message(&mut self, payload: Bytes, options: SendOptions) -> ProducerMessage {
        let options = options.normalized(now_millis());
        self.last_sequence_id += 1;
        ProducerMessage {
            producer_id: self.registration.producer_id,
            producer_name: self.registration.producer_name.clone(),
            sequence_id: self.last_sequence_id,
            payload,
            properties: options.properties,
            partition_key: options.partition_key,
            ordering_key: options.ordering_key,
            event_time: options.event_time,
            deliver_at_time: options.deliver_at_time,
        }
    }

    async fn handle_publish(&mut self, payload: Bytes, options: SendOptions, reply: ReplyHandle) {
        let message = self.next_message(payload, options);

        // Delayed messages are never batched: the broker schedules them
        // individually, so they take the direct path even in batch mode.
        if !self.options.batch_enabled || message.deliver_at_time.is_some() {
            let result = self.connection.send_message(message).await;
            match reply {
                Some(tx) => {
                    let _ = tx.send(result);
                }
                None => {
                    if let Err(e) = result {
                        debug!(topic = %self.topic, "Fire-and-forget send failed: {}", e);
                    }
                }
            }
            return;
        }

        self.queue.push(message, reply);
        if self.queue.len() >= self.options.batch_size {
            self.dispatch_batch().await;
        }
    }

    /// Drain the queue, ship it as one batch, and fan the single receipt out
    /// to every waiting caller.
    async fn dispatch_batch(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let (messages, replies) = self.queue.drain();
        debug!(topic = %self.topic, count = messages.len(), "Dispatching batch");

        let result = self.connection.send_messages(messages).await;
        if let Err(e) = &result {
            warn!(topic = %self.topic, "Batch send failed: {}", e);
        }
        for tx in replies.into_iter().flatten() {
            let _ = tx.send(result.clone());
        }
    }

    /// Re-run the lookup and compare against the cached owner.
    async fn verify_broker(&self, lookup: &Arc<dyn LookupService>) -> Result<()> {
        let owner = lookup.lookup_topic(&self.topic).await?;
        if owner == self.broker {
            debug!(topic = %self.topic, broker = %self.broker, "Broker unchanged");
            Ok(())
        } else {
            Err(Error::BrokerChanged(owner))
        }
    }
}

// ============================================================================
// Event loop
// ============================================================================

async fn run_actor(
    mut state: ProducerState,
    lookup: Arc<dyn LookupService>,
    mut command_rx: mpsc::Receiver<Command>,
    exit_tx: watch::Sender<Option<ExitReason>>,
) {
    let connection = state.connection.clone();

    let flush_period = state.options.flush_interval;
    let mut flush = interval_at(Instant::now() + flush_period, flush_period);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let refresh = sleep(jittered(state.options.refresh_interval));
    tokio::pin!(refresh);

    let reason = loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(Command::Publish { payload, options, reply }) => {
                    state.handle_publish(payload, options, reply).await;
                }
                Some(Command::Close) | None => break ExitReason::Shutdown,
            },
            _ = flush.tick(), if state.options.batch_enabled => {
                state.dispatch_batch().await;
            }
            () = &mut refresh => {
                match state.verify_broker(&lookup).await {
                    Ok(()) => {
                        refresh
                            .as_mut()
                            .reset(Instant::now() + jittered(state.options.refresh_interval));
                    }
                    Err(e) => break ExitReason::Error(e),
                }
            }
            event = connection.closed() => match event {
                ConnectionEvent::Dropped => break ExitReason::Error(Error::ConnectionDown),
                ConnectionEvent::CloseRequested => break ExitReason::Shutdown,
            },
        }
    };

    terminate(state, reason, exit_tx).await;
}

/// Fail every queued entry in FIFO order, classify the exit, and on an
/// abnormal exit hold the task for the termination backoff before releasing.
/// The backoff keeps a supervisor from recreating a producer against a
/// broker that just rejected it in a tight loop.
async fn terminate(
    mut state: ProducerState,
    reason: ExitReason,
    exit_tx: watch::Sender<Option<ExitReason>>,
) {
    let (messages, replies) = state.queue.drain();
    for tx in replies.into_iter().flatten() {
        let _ = tx.send(Err(Error::Closed));
    }
    if !messages.is_empty() {
        debug!(
            topic = %state.topic,
            count = messages.len(),
            "Failed queued messages on termination"
        );
    }

    match &reason {
        ExitReason::Shutdown => {
            debug!(topic = %state.topic, "Producer stopped");
        }
        ExitReason::Error(e) => {
            error!(topic = %state.topic, broker = %state.broker, "Producer terminating: {}", e);
            sleep(state.options.termination_timeout).await;
        }
    }

    let _ = exit_tx.send(Some(reason));
}

/// Refresh delay with mandatory jitter: `interval + uniform(0, interval)`.
/// Spreads the lookups so a fleet of partition actors does not refresh in
/// phase.
fn jittered(interval: Duration) -> Duration {
    interval + interval.mul_f64(rand::random::<f64>())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ProducerAccessMode;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const INITIAL_SEQUENCE: u64 = 4;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Single(ProducerMessage),
        Batch(Vec<ProducerMessage>),
    }

    struct MockConnection {
        sent: Mutex<Vec<Sent>>,
        fail_sends: AtomicBool,
        event_tx: watch::Sender<Option<ConnectionEvent>>,
        event_rx: watch::Receiver<Option<ConnectionEvent>>,
    }

    impl MockConnection {
        fn new() -> Arc<Self> {
            let (event_tx, event_rx) = watch::channel(None);
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail_sends: AtomicBool::new(false),
                event_tx,
                event_rx,
            })
        }

        fn drop_connection(&self) {
            let _ = self.event_tx.send(Some(ConnectionEvent::Dropped));
        }

        fn request_close(&self) {
            let _ = self.event_tx.send(Some(ConnectionEvent::CloseRequested));
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn payloads(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .flat_map(|call| match call {
                    Sent::Single(m) => vec![m],
                    Sent::Batch(ms) => ms,
                })
                .map(|m| String::from_utf8(m.payload.to_vec()).unwrap())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl Connection for MockConnection {
        async fn create_producer(
            &self,
            _topic: &str,
            options: &ProducerOptions,
        ) -> Result<ProducerRegistration> {
            Ok(ProducerRegistration {
                producer_id: 7,
                producer_name: options
                    .producer_name
                    .clone()
                    .unwrap_or_else(|| "standalone-7-0".to_string()),
                access_mode: ProducerAccessMode::Shared,
                last_sequence_id: INITIAL_SEQUENCE,
                max_message_size: 5 * 1024 * 1024,
                properties: HashMap::new(),
            })
        }

        async fn send_message(&self, message: ProducerMessage) -> Result<MessageId> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(Error::SendFailed("injected".to_string()));
            }
            let entry_id = message.sequence_id;
            self.sent.lock().unwrap().push(Sent::Single(message));
            Ok(MessageId {
                ledger_id: 1,
                entry_id,
                partition: 0,
            })
        }

        async fn send_messages(&self, messages: Vec<ProducerMessage>) -> Result<MessageId> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(Error::SendFailed("injected".to_string()));
            }
            let entry_id = messages.last().map(|m| m.sequence_id).unwrap_or(0);
            self.sent.lock().unwrap().push(Sent::Batch(messages));
            Ok(MessageId {
                ledger_id: 1,
                entry_id,
                partition: 0,
            })
        }

        async fn closed(&self) -> ConnectionEvent {
            let mut rx = self.event_rx.clone();
            loop {
                if let Some(event) = *rx.borrow_and_update() {
                    return event;
                }
                if rx.changed().await.is_err() {
                    return ConnectionEvent::Dropped;
                }
            }
        }
    }

    struct MockManager {
        connection: Arc<MockConnection>,
    }

    #[async_trait::async_trait]
    impl ConnectionManager for MockManager {
        async fn get_connection(&self, _broker: &str) -> Result<Arc<dyn Connection>> {
            Ok(self.connection.clone())
        }
    }

    struct MockLookup {
        answers: Mutex<VecDeque<Result<String>>>,
        calls: AtomicUsize,
    }

    impl MockLookup {
        fn fixed(broker: &str) -> Arc<Self> {
            Self::scripted(vec![Ok(broker.to_string())])
        }

        /// Answers are consumed in order; the last one repeats forever.
        fn scripted(answers: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LookupService for MockLookup {
        async fn lookup_topic(&self, _topic: &Topic) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.pop_front().unwrap()
            } else {
                answers
                    .front()
                    .cloned()
                    .unwrap_or_else(|| Err(Error::LookupFailed("script exhausted".to_string())))
            }
        }
    }

    fn test_topic() -> Topic {
        Topic::new("public", "default", "orders").with_partition(3)
    }

    async fn spawn_producer(
        lookup: Arc<MockLookup>,
        options: ProducerOptions,
    ) -> (PartitionProducer, Arc<MockConnection>) {
        let connection = MockConnection::new();
        let manager = Arc::new(MockManager {
            connection: connection.clone(),
        });
        let producer = PartitionProducer::create(lookup, manager, test_topic(), options)
            .await
            .unwrap();
        (producer, connection)
    }

    #[tokio::test]
    async fn test_non_batched_sync_publish_sends_single() {
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), ProducerOptions::default()).await;

        let id = producer.send("hello", SendOptions::new()).await.unwrap();

        assert_eq!(id.entry_id, INITIAL_SEQUENCE + 1);
        let sent = connection.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Sent::Single(message) => {
                assert_eq!(message.sequence_id, INITIAL_SEQUENCE + 1);
                assert_eq!(message.payload, Bytes::from_static(b"hello"));
                assert_eq!(message.producer_id, 7);
            }
            other => panic!("expected single send, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sequence_ids_are_contiguous() {
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), ProducerOptions::default()).await;

        for payload in ["a", "b", "c"] {
            producer.send(payload, SendOptions::new()).await.unwrap();
        }

        let sequences: Vec<u64> = connection
            .sent()
            .into_iter()
            .map(|call| match call {
                Sent::Single(m) => m.sequence_id,
                other => panic!("expected single send, got {other:?}"),
            })
            .collect();
        assert_eq!(
            sequences,
            vec![INITIAL_SEQUENCE + 1, INITIAL_SEQUENCE + 2, INITIAL_SEQUENCE + 3]
        );
    }

    #[tokio::test]
    async fn test_batch_dispatch_on_size_trigger() {
        let options = ProducerOptions::builder()
            .batch_enabled(true)
            .batch_size(3)
            .flush_interval(Duration::from_secs(10))
            .build();
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), options).await;

        producer.send_async("a", SendOptions::new()).await.unwrap();
        producer.send_async("b", SendOptions::new()).await.unwrap();
        // The third publish fills the batch; its sync receipt means the
        // dispatch has happened.
        producer.send("c", SendOptions::new()).await.unwrap();

        let sent = connection.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Sent::Batch(messages) => {
                let payloads: Vec<&[u8]> = messages.iter().map(|m| m.payload.as_ref()).collect();
                assert_eq!(payloads, vec![b"a".as_ref(), b"b".as_ref(), b"c".as_ref()]);
            }
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_flush_tick_dispatches_partial_batch() {
        let options = ProducerOptions::builder()
            .batch_enabled(true)
            .batch_size(100)
            .flush_interval(Duration::from_millis(100))
            .build();
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), options).await;

        producer.send_async("x", SendOptions::new()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let sent = connection.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Sent::Batch(messages) => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].payload, Bytes::from_static(b"x"));
            }
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batches_preserve_publish_order() {
        let options = ProducerOptions::builder()
            .batch_enabled(true)
            .batch_size(2)
            .flush_interval(Duration::from_millis(100))
            .build();
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), options).await;

        for i in 0..5 {
            producer
                .send_async(format!("m{i}"), SendOptions::new())
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(connection.payloads(), vec!["m0", "m1", "m2", "m3", "m4"]);
        for call in connection.sent() {
            if let Sent::Batch(messages) = call {
                assert!(messages.len() <= 2);
            }
        }
    }

    #[tokio::test]
    async fn test_delayed_delivery_bypasses_batching() {
        let options = ProducerOptions::builder()
            .batch_enabled(true)
            .batch_size(10)
            .build();
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), options).await;

        let before = now_millis();
        producer
            .send("later", SendOptions::new().with_delay(Duration::from_secs(5)))
            .await
            .unwrap();

        let sent = connection.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Sent::Single(message) => {
                let deliver_at = message.deliver_at_time.expect("deliver_at_time set");
                assert!(deliver_at >= before + 5_000);
            }
            other => panic!("expected single send, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sync_callers_share_batch_receipt() {
        let options = ProducerOptions::builder()
            .batch_enabled(true)
            .batch_size(2)
            .flush_interval(Duration::from_secs(10))
            .build();
        let (producer, _connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), options).await;
        let producer = Arc::new(producer);

        let first = {
            let producer = producer.clone();
            tokio::spawn(async move { producer.send("a", SendOptions::new()).await })
        };
        let second = {
            let producer = producer.clone();
            tokio::spawn(async move { producer.send("b", SendOptions::new()).await })
        };

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_send_failure_returned_to_caller_not_fatal() {
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), ProducerOptions::default()).await;

        connection.fail_sends.store(true, Ordering::SeqCst);
        let err = producer.send("doomed", SendOptions::new()).await.unwrap_err();
        assert_eq!(err, Error::SendFailed("injected".to_string()));

        // The actor survives a failed send.
        connection.fail_sends.store(false, Ordering::SeqCst);
        producer.send("fine", SendOptions::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_down_fails_queued_callers() {
        let options = ProducerOptions::builder()
            .batch_enabled(true)
            .batch_size(10)
            .flush_interval(Duration::from_secs(10))
            .termination_timeout(Duration::from_millis(100))
            .build();
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), options).await;
        let producer = Arc::new(producer);

        let first = {
            let producer = producer.clone();
            tokio::spawn(async move { producer.send("a", SendOptions::new()).await })
        };
        let second = {
            let producer = producer.clone();
            tokio::spawn(async move { producer.send("b", SendOptions::new()).await })
        };
        // Let both publishes reach the queue before the connection dies.
        tokio::time::sleep(Duration::from_millis(50)).await;

        connection.drop_connection();

        assert_eq!(first.await.unwrap(), Err(Error::Closed));
        assert_eq!(second.await.unwrap(), Err(Error::Closed));
        assert_eq!(
            producer.wait_closed().await,
            ExitReason::Error(Error::ConnectionDown)
        );
    }

    #[tokio::test]
    async fn test_close_requested_by_connection_is_orderly() {
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), ProducerOptions::default()).await;

        connection.request_close();
        assert_eq!(producer.wait_closed().await, ExitReason::Shutdown);
    }

    #[tokio::test]
    async fn test_close_fast_fails_queued_entries() {
        let options = ProducerOptions::builder()
            .batch_enabled(true)
            .batch_size(10)
            .flush_interval(Duration::from_secs(10))
            .build();
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), options).await;
        let producer = Arc::new(producer);

        let pending = {
            let producer = producer.clone();
            tokio::spawn(async move { producer.send("stuck", SendOptions::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        producer.close().await;

        assert_eq!(pending.await.unwrap(), Err(Error::Closed));
        assert_eq!(producer.wait_closed().await, ExitReason::Shutdown);
        // Nothing was dispatched.
        assert!(connection.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_broker_change_exits_fatally() {
        let lookup = MockLookup::scripted(vec![
            Ok("broker-1:6650".to_string()),
            Ok("broker-2:6650".to_string()),
        ]);
        let (producer, _connection) = spawn_producer(lookup, ProducerOptions::default()).await;

        assert_eq!(
            producer.wait_closed().await,
            ExitReason::Error(Error::BrokerChanged("broker-2:6650".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_broker_refresh_reschedules() {
        let lookup = MockLookup::fixed("broker-1:6650");
        let options = ProducerOptions::builder()
            .refresh_interval(Duration::from_secs(10))
            .build();
        let (producer, _connection) = spawn_producer(lookup.clone(), options).await;

        // Two full jittered refresh windows.
        tokio::time::sleep(Duration::from_secs(45)).await;

        assert!(lookup.calls() >= 3, "expected repeated refreshes, saw {}", lookup.calls());
        // Still alive and serving.
        producer.send("ping", SendOptions::new()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_failure_on_refresh_is_fatal() {
        let lookup = MockLookup::scripted(vec![
            Ok("broker-1:6650".to_string()),
            Err(Error::LookupFailed("admin unreachable".to_string())),
        ]);
        let (producer, _connection) = spawn_producer(lookup, ProducerOptions::default()).await;

        assert_eq!(
            producer.wait_closed().await,
            ExitReason::Error(Error::LookupFailed("admin unreachable".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abnormal_exit_holds_for_termination_backoff() {
        let (producer, connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), ProducerOptions::default()).await;

        let started = Instant::now();
        connection.drop_connection();
        let reason = producer.wait_closed().await;

        assert_eq!(reason, ExitReason::Error(Error::ConnectionDown));
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_orderly_shutdown_skips_backoff() {
        let (producer, _connection) =
            spawn_producer(MockLookup::fixed("broker-1:6650"), ProducerOptions::default()).await;

        let started = Instant::now();
        producer.close().await;
        assert_eq!(producer.wait_closed().await, ExitReason::Shutdown);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_refresh_jitter_bounds() {
        let interval = Duration::from_secs(10);
        for _ in 0..1_000 {
            let delay = jittered(interval);
            assert!(delay >= interval);
            assert!(delay < interval * 2);
        }
    }
}
