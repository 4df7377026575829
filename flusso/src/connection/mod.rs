//! The per-URL connection actor.
//!
//! Each connection is one task that exclusively owns the transport
//! stream, the future resolver, the subscription registry, and the
//! adapter's per-connection state. Callers talk to it through a
//! command channel; inbound frames, caller commands, and the
//! keep-alive timer are multiplexed by a single `select!` loop, so
//! every piece of per-connection state is mutated from exactly one
//! task and frames are dispatched strictly in arrival order.

mod registry;
mod resolver;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use flusso_core::{DispatchTable, FlussoError, HandlerCx, Transport, TransportStream, VenueAdapter};
use flusso_types::{EngineConfig, Envelope, MessageHash, RoutingKey, SubscriptionKey};

use crate::backoff::BackoffSchedule;
use registry::SubscriptionRegistry;
use resolver::FutureResolver;

pub(crate) enum Command<A: VenueAdapter> {
    /// Register a waiter for `hashes` and, when `subscription` names a
    /// key not yet active, send its payload.
    Watch {
        hashes: Vec<MessageHash>,
        subscription: Option<(SubscriptionKey, Value)>,
        reply: oneshot::Sender<Result<A::Update, FlussoError>>,
    },
    /// Tear the connection down, rejecting all pending futures.
    Close { reply: oneshot::Sender<()> },
}

/// Cheap cloneable handle to a connection actor.
pub(crate) struct ConnectionHandle<A: VenueAdapter> {
    url: String,
    cmd_tx: mpsc::UnboundedSender<Command<A>>,
}

impl<A: VenueAdapter> Clone for ConnectionHandle<A> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            cmd_tx: self.cmd_tx.clone(),
        }
    }
}

impl<A: VenueAdapter> ConnectionHandle<A> {
    /// Await the first of `hashes` to resolve, optionally subscribing
    /// first (deduped by the registry).
    pub(crate) async fn watch(
        &self,
        hashes: Vec<MessageHash>,
        subscription: Option<(SubscriptionKey, Value)>,
    ) -> Result<A::Update, FlussoError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Watch {
                hashes,
                subscription,
                reply,
            })
            .map_err(|_| FlussoError::connectivity(format!("connection to {} is gone", self.url)))?;
        rx.await
            .map_err(|_| FlussoError::cancelled(format!("connection to {} closed", self.url)))?
    }

    /// Close the actor and wait until its pending futures are rejected.
    pub(crate) async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Close { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// `true` once the actor task has exited.
    pub(crate) fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }
}

enum SessionEnd {
    /// Explicit close; the actor exits.
    Closed,
    /// Transport failure or keep-alive death; reconnect may follow.
    Lost(FlussoError),
}

/// Handler-facing view of the dispatch loop.
struct LoopCx<'a, U> {
    url: &'a str,
    resolver: &'a mut FutureResolver<U>,
}

impl<U: Clone> HandlerCx<U> for LoopCx<'_, U> {
    fn url(&self) -> &str {
        self.url
    }

    fn resolve(&mut self, hash: &MessageHash, value: U) {
        self.resolver.resolve(hash, value);
    }

    fn reject(&mut self, hash: &MessageHash, error: FlussoError) {
        self.resolver.reject(hash, error);
    }
}

pub(crate) struct Connection<A: VenueAdapter, T: Transport> {
    url: String,
    adapter: Arc<A>,
    transport: Arc<T>,
    table: DispatchTable<A>,
    config: EngineConfig,
    state: A::State,
    resolver: FutureResolver<A::Update>,
    registry: SubscriptionRegistry,
}

impl<A: VenueAdapter, T: Transport> Connection<A, T> {
    /// Start the actor over an already-open stream and hand back its
    /// command handle.
    pub(crate) fn spawn(
        url: String,
        adapter: Arc<A>,
        transport: Arc<T>,
        config: EngineConfig,
        stream: T::Stream,
    ) -> ConnectionHandle<A> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle {
            url: url.clone(),
            cmd_tx,
        };
        let connection = Self {
            table: adapter.dispatch_table(),
            url,
            adapter,
            transport,
            config,
            state: A::State::default(),
            resolver: FutureResolver::new(),
            registry: SubscriptionRegistry::new(),
        };
        tokio::spawn(connection.run(stream, cmd_rx));
        handle
    }

    async fn run(
        mut self,
        mut stream: T::Stream,
        mut cmd_rx: mpsc::UnboundedReceiver<Command<A>>,
    ) {
        let mut schedule = BackoffSchedule::new(self.config.reconnect.backoff);
        loop {
            match self.session(&mut stream, &mut cmd_rx).await {
                SessionEnd::Closed => return,
                SessionEnd::Lost(error) => {
                    tracing::warn!(url = %self.url, %error, "connection lost");
                    self.resolver.reject_all(&error);
                    if !self.config.reconnect.enabled {
                        self.registry.clear();
                        return;
                    }
                    match self.reconnect(&mut schedule, &mut cmd_rx).await {
                        Some(reopened) => {
                            stream.close().await;
                            stream = reopened;
                            schedule.reset();
                        }
                        None => {
                            self.registry.clear();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// One open-socket session; returns why it ended.
    async fn session(
        &mut self,
        stream: &mut T::Stream,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command<A>>,
    ) -> SessionEnd {
        let keep_alive = self.config.keep_alive;
        let mut ping_timer = tokio::time::interval(keep_alive.ping_interval);
        ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of `interval` fires immediately; consume it.
        ping_timer.tick().await;
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Watch { hashes, subscription, reply }) => {
                        // Waiter first, send second: the subscribe-then-await
                        // protocol must never miss its own first event.
                        self.resolver.register(&hashes, reply);
                        if let Some((key, payload)) = subscription
                            && self.registry.subscribe(key, payload.clone())
                            && let Err(error) = stream.send(payload.to_string()).await
                        {
                            return SessionEnd::Lost(error);
                        }
                    }
                    Some(Command::Close { reply }) => {
                        self.shutdown(stream).await;
                        let _ = reply.send(());
                        return SessionEnd::Closed;
                    }
                    None => {
                        // Every handle dropped; nobody can observe this
                        // connection anymore.
                        self.shutdown(stream).await;
                        return SessionEnd::Closed;
                    }
                },
                frame = stream.recv() => match frame {
                    Some(Ok(text)) => {
                        last_inbound = Instant::now();
                        if let Err(error) = self.handle_frame(stream, text).await {
                            return SessionEnd::Lost(error);
                        }
                    }
                    Some(Err(error)) => return SessionEnd::Lost(error),
                    None => {
                        return SessionEnd::Lost(FlussoError::connectivity(format!(
                            "{} closed the connection",
                            self.url
                        )));
                    }
                },
                _ = ping_timer.tick() => {
                    let idle = last_inbound.elapsed();
                    if idle >= keep_alive.ping_interval * keep_alive.timeout_multiple {
                        return SessionEnd::Lost(FlussoError::connectivity(format!(
                            "{} missed {} keep-alive intervals",
                            self.url, keep_alive.timeout_multiple
                        )));
                    }
                    if idle >= keep_alive.ping_interval
                        && let Some(ping) = self.adapter.ping()
                        && let Err(error) = stream.send(ping.to_string()).await
                    {
                        return SessionEnd::Lost(error);
                    }
                }
            }
        }
    }

    /// Route one inbound frame: control traffic first, then the
    /// adapter's dispatch table.
    async fn handle_frame(
        &mut self,
        stream: &mut T::Stream,
        text: String,
    ) -> Result<(), FlussoError> {
        let envelope = match Envelope::parse(&text) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::trace!(url = %self.url, %error, "dropping malformed frame");
                return Ok(());
            }
        };
        if envelope.is_ping() {
            let pong = Envelope {
                ts: envelope.ts,
                ..Envelope::control("pong")
            };
            return match serde_json::to_string(&pong) {
                Ok(text) => stream.send(text).await,
                Err(_) => Ok(()),
            };
        }
        if envelope.is_pong() {
            // last_inbound was already refreshed by the caller.
            return Ok(());
        }
        if envelope.is_error() {
            let routing = self.adapter.classify_error(&envelope);
            tracing::debug!(url = %self.url, error = %routing.error, "venue reported an error");
            if let Some(key) = routing.clear_subscription {
                self.registry.unsubscribe(&key);
            }
            if routing.reject.is_empty() {
                self.resolver.reject_all(&routing.error);
            } else {
                for hash in &routing.reject {
                    self.resolver.reject(hash, routing.error.clone());
                }
            }
            return Ok(());
        }

        let candidates = RoutingKey::candidates(&envelope);
        let Some((key, handler)) = self.table.lookup(&candidates) else {
            tracing::trace!(url = %self.url, ?candidates, "no handler for frame, dropping");
            return Ok(());
        };
        let frame_hash = envelope.topic.clone().or_else(|| envelope.event.clone());
        let mut cx = LoopCx {
            url: &self.url,
            resolver: &mut self.resolver,
        };
        if let Err(error) = handler(&self.adapter, &mut cx, &mut self.state, envelope) {
            // A failing handler never kills the dispatch loop; it
            // rejects the frame's own hash instead, whether the frame
            // was routed by topic or by event.
            tracing::warn!(url = %self.url, route = key.name(), %error, "handler failed");
            if let Some(name) = frame_hash {
                self.resolver.reject(&MessageHash::from(name), error);
            }
        }
        Ok(())
    }

    /// Backoff-and-retry until a new stream is open and every stored
    /// subscription has been replayed, or the policy gives up.
    async fn reconnect(
        &mut self,
        schedule: &mut BackoffSchedule,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command<A>>,
    ) -> Option<T::Stream> {
        let mut attempts = 0u32;
        loop {
            if let Some(max) = self.config.reconnect.max_attempts
                && attempts >= max
            {
                tracing::warn!(url = %self.url, attempts, "reconnect attempts exhausted");
                self.resolver.reject_all(&FlussoError::connectivity(format!(
                    "reconnect to {} gave up after {attempts} attempts",
                    self.url
                )));
                return None;
            }
            attempts += 1;

            // Keep serving commands while waiting out the backoff so a
            // close is immediate and new watches queue up for replay.
            let deadline = Instant::now() + Duration::from_millis(schedule.next_wait_ms());
            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => match cmd {
                        Some(Command::Watch { hashes, subscription, reply }) => {
                            self.resolver.register(&hashes, reply);
                            if let Some((key, payload)) = subscription {
                                let _ = self.registry.subscribe(key, payload);
                            }
                        }
                        Some(Command::Close { reply }) => {
                            self.resolver
                                .reject_all(&FlussoError::cancelled("connection closed"));
                            self.registry.clear();
                            let _ = reply.send(());
                            return None;
                        }
                        None => return None,
                    },
                    _ = tokio::time::sleep_until(deadline) => break,
                }
            }

            match self.transport.connect(&self.url).await {
                Ok(mut stream) => {
                    tracing::debug!(url = %self.url, attempts, "reconnected, replaying subscriptions");
                    let mut replay_failed = false;
                    for payload in self.registry.replay() {
                        if let Err(error) = stream.send(payload.to_string()).await {
                            tracing::warn!(url = %self.url, %error, "replay failed");
                            replay_failed = true;
                            break;
                        }
                    }
                    if replay_failed {
                        continue;
                    }
                    return Some(stream);
                }
                Err(error) => {
                    tracing::debug!(url = %self.url, attempts, %error, "reconnect attempt failed");
                }
            }
        }
    }

    async fn shutdown(&mut self, stream: &mut T::Stream) {
        self.resolver
            .reject_all(&FlussoError::cancelled("connection closed"));
        self.registry.clear();
        stream.close().await;
    }
}
