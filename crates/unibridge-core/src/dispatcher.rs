//! Command dispatch to the editor
//!
//! The bridge answers one request at a time with no correlation ids, so every
//! command goes through a single worker task that owns the connection. Callers
//! hold a cheap, cloneable [`Dispatcher`] handle and exchange messages with the
//! worker:
//!
//! ```text
//! tool call ──► Dispatcher ──mpsc──► worker ──► Connection ──► editor
//!     ▲                                 │
//!     └──────────── oneshot ◄───────────┘
//! ```
//!
//! The worker opens the connection lazily, replaces it after any fault, and
//! retries connect and transport failures according to [`BridgeConfig`].

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};

use crate::codec;
use crate::command::{Command, Params, Response};
use crate::config::BridgeConfig;
use crate::connection::{Connection, ConnectionState, Connector};
use crate::error::{Error, Result};

/// Work sent to the worker
enum Request {
    Command(Command),
    Ping,
    Disconnect,
}

struct Job {
    request: Request,
    enqueued: Instant,
    // Fired when the worker takes the job off the queue
    started: oneshot::Sender<()>,
    respond: oneshot::Sender<Result<Response>>,
}

/// Handle to the editor connection.
///
/// This is Send + Sync and can be cloned and shared between tasks. The worker
/// closes the connection and exits once every handle has been dropped.
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<Job>,
    state: watch::Receiver<ConnectionState>,
    queue_timeout: Duration,
}

impl Dispatcher {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// Nothing is connected until the first command arrives.
    pub fn spawn<C: Connector>(connector: C, config: BridgeConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let queue_timeout = config.queue_timeout();

        let worker = Worker {
            connector,
            config,
            connection: None,
            state: state_tx,
        };
        tokio::spawn(worker.run(receiver));

        Self {
            sender,
            state: state_rx,
            queue_timeout,
        }
    }

    /// Send a command and return the editor's reply, or the transport failure.
    ///
    /// A reply with `success == false` is the editor rejecting the command and
    /// comes back as `Ok`.
    pub async fn dispatch(&self, command: Command) -> Result<Response> {
        self.submit(Request::Command(command)).await
    }

    /// Send a command and always get a [`Response`].
    ///
    /// Transport failures are folded into `success == false` with the failure
    /// class in `error` and the detail in `message`.
    pub async fn send_command(&self, name: impl Into<String>, params: Params) -> Response {
        let command = Command::new(name, params);
        let name = command.name.clone();
        match self.dispatch(command).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(command = %name, "command failed: {}", e);
                Response::from(e)
            }
        }
    }

    /// Round-trip a `ping` through the connection
    pub async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        let response = self.submit(Request::Ping).await?;
        if codec::is_pong(&response) {
            Ok(started.elapsed())
        } else {
            Err(crate::error::ProtocolError::UnexpectedShape(
                "ping was not answered with pong".to_string(),
            )
            .into())
        }
    }

    /// Close the current connection; the next command reconnects
    pub async fn disconnect(&self) -> Result<()> {
        self.submit(Request::Disconnect).await.map(|_| ())
    }

    /// Last state published by the worker
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Queue a job and wait for its reply.
    ///
    /// `queue_timeout` bounds the time until the worker picks the job up, which
    /// includes waiting for whatever command is running ahead of it.
    async fn submit(&self, request: Request) -> Result<Response> {
        let (respond, mut reply) = oneshot::channel();
        let (started, mut picked_up) = oneshot::channel();
        let job = Job {
            request,
            enqueued: Instant::now(),
            started,
            respond,
        };
        let deadline = tokio::time::Instant::now() + self.queue_timeout;
        let queueing = Error::Timeout {
            operation: "queueing",
            after: self.queue_timeout,
        };

        match tokio::time::timeout_at(deadline, self.sender.send(job)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(Error::Unavailable),
            Err(_) => return Err(queueing),
        }

        tokio::select! {
            biased;
            result = &mut reply => return result.map_err(|_| Error::Unavailable)?,
            // Err means the worker answered or skipped the job without running it
            _ = &mut picked_up => {}
            () = tokio::time::sleep_until(deadline) => {
                // Dropping `reply` tells the worker to skip the job
                return Err(queueing);
            }
        }

        reply.await.map_err(|_| Error::Unavailable)?
    }
}

/// Owns the connection; runs one job at a time
struct Worker<C: Connector> {
    connector: C,
    config: BridgeConfig,
    connection: Option<Connection<C::Stream>>,
    state: watch::Sender<ConnectionState>,
}

impl<C: Connector> Worker<C> {
    async fn run(mut self, mut receiver: mpsc::Receiver<Job>) {
        while let Some(job) = receiver.recv().await {
            let Job {
                request,
                enqueued,
                started,
                mut respond,
            } = job;

            if respond.is_closed() {
                tracing::debug!("caller gave up while queued; skipping");
                continue;
            }

            let waited = enqueued.elapsed();
            if waited > self.config.queue_timeout() {
                let _ = respond.send(Err(Error::Timeout {
                    operation: "waiting for the connection",
                    after: waited,
                }));
                continue;
            }

            if started.send(()).is_err() {
                tracing::debug!("caller gave up while queued; skipping");
                continue;
            }

            let outcome = tokio::select! {
                result = self.execute(&request) => Some(result),
                () = respond.closed() => None,
            };

            match outcome {
                Some(result) => {
                    self.publish();
                    let _ = respond.send(result);
                }
                None => {
                    // Any write or pending reply on the wire now belongs to nobody
                    tracing::warn!("caller gave up mid-request; dropping the connection");
                    if let Some(connection) = self.connection.as_mut() {
                        connection.fault();
                    }
                    self.publish();
                }
            }
        }

        self.close().await;
        tracing::debug!("dispatcher stopped");
    }

    async fn execute(&mut self, request: &Request) -> Result<Response> {
        let frame = match request {
            Request::Command(command) => codec::encode(command)?,
            Request::Ping => codec::PING_FRAME.to_vec(),
            Request::Disconnect => {
                self.close().await;
                return Ok(Response::ok(serde_json::Value::Null).with_message("disconnected"));
            }
        };
        let name = match request {
            Request::Command(command) => command.name.as_str(),
            _ => "ping",
        };

        let mut retries = 0;
        loop {
            match self.attempt(&frame).await {
                Ok(reply) => {
                    let response = codec::decode(&reply).map_err(|e| {
                        if let Some(connection) = self.connection.as_mut() {
                            connection.fault();
                        }
                        Error::from(e)
                    })?;
                    tracing::debug!(command = name, success = response.success, "command completed");
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    let delay = self.config.backoff.delay(retries);
                    tracing::warn!(
                        command = name,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "{}; retrying",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One try on a live connection, opening a fresh one if needed
    async fn attempt(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        let timeout = self.config.request_timeout();
        let connection = self.ensure_connected().await?;
        connection.request(frame, timeout).await
    }

    async fn ensure_connected(&mut self) -> Result<&mut Connection<C::Stream>> {
        let reusable = self.connection.as_ref().is_some_and(Connection::is_reusable);
        if !reusable {
            if let Some(mut stale) = self.connection.take() {
                if stale.has_unsolicited_data() {
                    tracing::warn!("editor sent data nobody asked for; replacing the connection");
                } else {
                    tracing::debug!(state = %stale.state(), "replacing editor connection");
                }
                stale.close().await;
            }

            self.state.send_replace(ConnectionState::Connecting);
            match Connection::open(&self.connector, &self.config.connection_options()).await {
                Ok(connection) => {
                    self.connection = Some(connection);
                    self.state.send_replace(ConnectionState::Ready);
                }
                Err(e) => {
                    self.state.send_replace(ConnectionState::Disconnected);
                    return Err(e);
                }
            }
        }

        self.connection
            .as_mut()
            .ok_or(Error::NotReady(ConnectionState::Disconnected))
    }

    fn publish(&self) {
        let state = self
            .connection
            .as_ref()
            .map_or(ConnectionState::Disconnected, Connection::state);
        self.state.send_replace(state);
    }

    async fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backoff;
    use crate::testing::{Behavior, FakeEditor};
    use serde_json::{Value, json};

    fn config() -> BridgeConfig {
        BridgeConfig {
            connect_timeout_ms: 500,
            request_timeout_ms: 500,
            queue_timeout_ms: 5_000,
            max_retries: 2,
            backoff: Backoff::Fixed { delay_ms: 1 },
            ..BridgeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_lazy_connect() {
        let editor = FakeEditor::new();
        let dispatcher = Dispatcher::spawn(editor.clone(), config());
        tokio::task::yield_now().await;
        assert_eq!(editor.connects(), 0);
        assert_eq!(dispatcher.state(), ConnectionState::Disconnected);

        let response = dispatcher
            .send_command("get_current_hierarchy", Params::new())
            .await;
        assert!(response.success);
        assert_eq!(editor.connects(), 1);
        assert_eq!(dispatcher.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_connection_is_reused() {
        let editor = FakeEditor::new();
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        for _ in 0..3 {
            let response = dispatcher.send_command("read_console", Params::new()).await;
            assert!(response.success);
        }
        assert_eq!(editor.connects(), 1);
        assert_eq!(editor.pings(), 1);
    }

    #[tokio::test]
    async fn test_open_failures_within_retry_budget() {
        for refusals in 0..=2 {
            let editor = FakeEditor::new();
            editor.refuse_connects(refusals);
            let dispatcher = Dispatcher::spawn(editor.clone(), config());

            let response = dispatcher.send_command("manage_scene", Params::new()).await;
            assert!(response.success, "{refusals} refusals should be absorbed");
        }
    }

    #[tokio::test]
    async fn test_open_failures_beyond_retry_budget() {
        let editor = FakeEditor::new();
        editor.refuse_connects(3);
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        let response = dispatcher.send_command("manage_scene", Params::new()).await;
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("connection failed"));
        assert!(editor.requests().is_empty());
    }

    #[tokio::test]
    async fn test_mid_request_disconnect_retries_on_fresh_connection() {
        let editor = FakeEditor::new();
        editor.push(Behavior::Disconnect);
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        let response = dispatcher
            .send_command("manage_asset", Params::new().with("action", "search"))
            .await;
        assert!(response.success);
        assert_eq!(editor.requests().len(), 2);
        assert_eq!(editor.request_connections(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_transport_failures_exhaust_retries() {
        let editor = FakeEditor::new();
        for _ in 0..3 {
            editor.push(Behavior::Disconnect);
        }
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        let response = dispatcher.send_command("manage_asset", Params::new()).await;
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("transport error"));
        assert_eq!(editor.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_remote_rejection_is_passed_through() {
        let editor = FakeEditor::new();
        editor.push(Behavior::rejection("X"));
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        let response = dispatcher
            .dispatch(Command::new("manage_prefab_variant", Params::new()))
            .await
            .unwrap();
        assert_eq!(response, Response::failure("X"));
        assert_eq!(editor.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_not_retried_and_recovers() {
        let editor = FakeEditor::new();
        editor.push(Behavior::Hang);
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        let response = dispatcher
            .send_command("compile_and_reload", Params::new())
            .await;
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("timeout"));
        assert_eq!(editor.requests().len(), 1);
        assert_eq!(dispatcher.state(), ConnectionState::Faulted);

        let response = dispatcher
            .send_command("compile_and_reload", Params::new())
            .await;
        assert!(response.success);
        assert_eq!(editor.connects(), 2);
        assert_eq!(dispatcher.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_garbage_reply_is_protocol_error() {
        let editor = FakeEditor::new();
        editor.push(Behavior::Raw(b"]]]".to_vec()));
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        let response = dispatcher.send_command("read_console", Params::new()).await;
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("protocol error"));
        assert_eq!(editor.requests().len(), 1);

        // A new connection is used afterwards
        assert!(dispatcher.send_command("read_console", Params::new()).await.success);
        assert_eq!(editor.request_connections(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_callers_do_not_interleave() {
        let editor = FakeEditor::new();
        for i in 0..8 {
            editor.push(Behavior::Delay(
                Duration::from_millis(5),
                json!({"status": "success", "result": {"success": true, "data": {"n": i}}}),
            ));
        }
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        let calls = (0..8).map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .send_command("manage_gameobject", Params::new().with("index", i))
                    .await
            })
        });
        for call in calls.collect::<Vec<_>>() {
            assert!(call.await.unwrap().success);
        }

        assert!(editor.violations().is_empty(), "{:?}", editor.violations());
        assert_eq!(editor.requests().len(), 8);
        assert_eq!(editor.max_in_flight(), 1);
        assert_eq!(editor.connects(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_caller_faults_connection() {
        let editor = FakeEditor::new();
        editor.push(Behavior::Hang);
        let dispatcher = Dispatcher::spawn(
            editor.clone(),
            BridgeConfig {
                request_timeout_ms: 10_000,
                ..config()
            },
        );

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            dispatcher.send_command("manage_scene", Params::new()),
        )
        .await;
        assert!(abandoned.is_err());

        let response = dispatcher.send_command("manage_scene", Params::new()).await;
        assert!(response.success);
        assert_eq!(editor.connects(), 2);
    }

    fn slow_success(millis: u64) -> Behavior {
        Behavior::Delay(
            Duration::from_millis(millis),
            json!({"status": "success", "result": {"success": true, "data": {}}}),
        )
    }

    #[tokio::test]
    async fn test_queue_timeout() {
        let editor = FakeEditor::new();
        editor.push(slow_success(300));
        let dispatcher = Dispatcher::spawn(
            editor.clone(),
            BridgeConfig {
                queue_timeout_ms: 50,
                ..config()
            },
        );

        let slow = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.send_command("manage_editor", Params::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        let queued = dispatcher.send_command("manage_editor", Params::new()).await;
        let waited = started.elapsed();

        assert_eq!(queued.error.as_deref(), Some("timeout"));
        assert!(waited < Duration::from_millis(200), "queued caller waited {waited:?}");
        assert!(slow.await.unwrap().success);
        assert_eq!(editor.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_caller_leaving_queue_does_not_block_others() {
        let editor = FakeEditor::new();
        editor.push(slow_success(200));
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        let busy = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.send_command("manage_editor", Params::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let gave_up = tokio::time::timeout(
            Duration::from_millis(30),
            dispatcher.send_command("manage_scene", Params::new()),
        )
        .await;
        assert!(gave_up.is_err());

        let started = Instant::now();
        let response = dispatcher.send_command("read_console", Params::new()).await;
        assert!(response.success);
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(busy.await.unwrap().success);

        let names: Vec<Value> = editor.requests().iter().map(|r| r["type"].clone()).collect();
        assert_eq!(names, vec![json!("manage_editor"), json!("read_console")]);
        assert_eq!(editor.connects(), 1);
    }

    #[tokio::test]
    async fn test_unsolicited_frame_replaces_connection() {
        let editor = FakeEditor::new();
        editor.push(Behavior::Raw(
            br#"{"status":"success","result":{"success":true,"data":{"n":1}}}{"status":"success","result":{"success":true,"data":{"n":2}}}"#
                .to_vec(),
        ));
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        let first = dispatcher.send_command("read_console", Params::new()).await;
        assert_eq!(first.data, Some(json!({"n": 1})));

        let second = dispatcher.send_command("read_console", Params::new()).await;
        assert!(second.success, "{second:?}");
        assert_eq!(second.data.as_ref().and_then(|d| d.get("command")), Some(&json!("read_console")));
        assert_eq!(editor.request_connections(), vec![1, 2]);
        assert_eq!(editor.connects(), 2);
    }

    #[tokio::test]
    async fn test_large_reply() {
        let editor = FakeEditor::new();
        let yaml = "- GameObject: Enemy\n".repeat(200_000);
        editor.push(Behavior::success(json!({"sceneName": "Arena", "hierarchyYaml": yaml})));
        let dispatcher = Dispatcher::spawn(
            editor.clone(),
            BridgeConfig {
                request_timeout_ms: 5_000,
                ..config()
            },
        );

        let response = dispatcher
            .send_command("get_current_hierarchy", Params::new())
            .await;
        assert!(response.success, "{response:?}");
        assert_eq!(response.data_field("hierarchyYaml"), Some(&json!(yaml)));
    }

    #[tokio::test]
    async fn test_ping_and_disconnect() {
        let editor = FakeEditor::new();
        let dispatcher = Dispatcher::spawn(editor.clone(), config());

        dispatcher.ping().await.unwrap();
        assert_eq!(dispatcher.state(), ConnectionState::Ready);

        dispatcher.disconnect().await.unwrap();
        assert_eq!(dispatcher.state(), ConnectionState::Disconnected);

        assert!(dispatcher.send_command("read_console", Params::new()).await.success);
        assert_eq!(editor.connects(), 2);
    }
}
