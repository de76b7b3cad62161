use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{watch, Mutex},
    task::JoinSet,
};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::{
    blocks::MessageTemplate,
    events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope},
    payload::{parse_socket_frame, SocketFrame},
    web::{SlackPoster, SlackWebClient},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("slack requested reconnect: {0}")]
    Reconnect(String),
}

/// Delay between reconnect attempts: doubles per consecutive failure from
/// `base_delay_ms` and never exceeds `max_delay_ms`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { base_delay_ms: 250, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// Next dispatchable envelope; `None` once the stream has closed.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over a websocket URL obtained from `apps.connections.open`.
pub struct TungsteniteTransport {
    web: Arc<SlackWebClient>,
    stream: Mutex<Option<SocketStream>>,
}

impl TungsteniteTransport {
    pub fn new(web: Arc<SlackWebClient>) -> Self {
        Self { web, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for TungsteniteTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .web
            .open_connection()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Ok(None);
        };

        while let Some(message) = stream.next().await {
            let message = message.map_err(|error| TransportError::Receive(error.to_string()))?;
            match message {
                Message::Text(text) => {
                    let frame: Value = match serde_json::from_str(text.as_str()) {
                        Ok(frame) => frame,
                        Err(error) => {
                            warn!(error = %error, "dropping undecodable socket mode frame");
                            continue;
                        }
                    };
                    match parse_socket_frame(&frame) {
                        SocketFrame::Envelope(envelope) => return Ok(Some(envelope)),
                        SocketFrame::Hello => info!("socket mode hello received"),
                        SocketFrame::Disconnect { reason } => {
                            return Err(TransportError::Reconnect(reason));
                        }
                        SocketFrame::Ignored { frame_type } => {
                            debug!(frame_type, "ignoring socket mode frame");
                        }
                    }
                }
                Message::Ping(data) => {
                    stream
                        .send(Message::Pong(data))
                        .await
                        .map_err(|error| TransportError::Receive(error.to_string()))?;
                }
                Message::Close(frame) => {
                    let reason = frame
                        .map(|frame| frame.reason.as_str().to_owned())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "server closed the connection".to_owned());
                    return Err(TransportError::Reconnect(reason));
                }
                _ => {}
            }
        }

        Ok(None)
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("socket is not connected".to_owned()))?;
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        stream
            .send(Message::Text(ack.into()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    poster: Arc<dyn SlackPoster>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: Arc<EventDispatcher>,
        poster: Arc<dyn SlackPoster>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, poster, reconnect_policy }
    }

    /// Keeps a Socket Mode connection open until `shutdown` turns true.
    /// Closed streams and failed connects are retried with capped backoff; a
    /// connection that was established resets the backoff. Envelopes are
    /// delivered on their own tasks, which are drained before returning.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut inflight = JoinSet::new();
        let mut attempt: u32 = 0;
        loop {
            let mut connected = false;
            let transport_error = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                error = self.connect_and_pump(attempt, &mut connected, &mut inflight) => error,
            };
            warn!(
                event_name = "ingress.slack.transport_failed",
                attempt,
                error = %transport_error,
                "socket mode transport failed; reconnecting"
            );
            let _ = self.transport.disconnect().await;

            attempt = if connected { 0 } else { attempt.saturating_add(1) };
            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown) => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        info!(event_name = "ingress.slack.runner_stopped", "socket mode runner stopping");
        let _ = self.transport.disconnect().await;
        while inflight.join_next().await.is_some() {}
        Ok(())
    }

    /// Pumps envelopes until the transport fails; a closed stream is reported
    /// as a reconnect request.
    async fn connect_and_pump(
        &self,
        attempt: u32,
        connected: &mut bool,
        inflight: &mut JoinSet<()>,
    ) -> TransportError {
        info!(attempt, "opening socket mode transport connection");
        if let Err(error) = self.transport.connect().await {
            return error;
        }
        *connected = true;
        info!(attempt, "socket mode transport connected");

        loop {
            let envelope = match self.transport.next_envelope().await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => return TransportError::Reconnect("stream closed".to_owned()),
                Err(error) => return error,
            };

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id = envelope.event.channel_id().unwrap_or("unknown"),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            while inflight.try_join_next().is_some() {}
            let dispatcher = Arc::clone(&self.dispatcher);
            let poster = Arc::clone(&self.poster);
            inflight.spawn(async move {
                let context = EventContext { correlation_id: envelope.envelope_id.clone() };
                deliver(&dispatcher, poster.as_ref(), &envelope, &context).await;
            });
        }
    }
}

/// Resolves once the flag is true. A dropped sender never resolves.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Dispatches one envelope and writes the outcome back to its channel: a
/// `Responded` template is posted, a handler error is posted as text.
pub async fn deliver(
    dispatcher: &EventDispatcher,
    poster: &dyn SlackPoster,
    envelope: &SlackEnvelope,
    ctx: &EventContext,
) {
    let outcome = dispatcher.dispatch(envelope, ctx).await;
    let Some(channel_id) = envelope.event.channel_id().filter(|channel| !channel.is_empty())
    else {
        if let Err(error) = outcome {
            warn!(
                correlation_id = %ctx.correlation_id,
                error = %error,
                "event dispatch failed for an event without channel"
            );
        }
        return;
    };

    let reply = match outcome {
        Ok(HandlerResult::Responded(message)) => message,
        Ok(HandlerResult::Processed | HandlerResult::Ignored) => return,
        Err(error) => {
            warn!(
                event_name = "ingress.slack.dispatch_failed",
                correlation_id = %ctx.correlation_id,
                channel_id,
                error = %error,
                "event dispatch failed; reporting to channel"
            );
            MessageTemplate::text(error.to_string())
        }
    };

    if let Err(error) = poster.post_message(channel_id, &reply).await {
        warn!(
            event_name = "egress.slack.reply_failed",
            correlation_id = %ctx.correlation_id,
            channel_id,
            error = %error,
            "failed to post reply to slack"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{watch, Mutex};

    use super::{deliver, ReconnectPolicy, SocketModeRunner, SocketTransport, TransportError};
    use crate::{
        blocks::MessageTemplate,
        commands::SlashCommandPayload,
        events::{
            EventContext, EventDispatcher, EventHandlerError, MessageEvent, MessageHandler,
            MessageService, SlackEnvelope, SlackEvent, SlashCommandHandler,
        },
        web::{SlackApiError, SlackPoster},
    };

    /// Plays back connect results and envelopes, then requests shutdown
    /// once the envelope script runs out.
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
        shutdown: watch::Sender<bool>,
    }

    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<SlackEnvelope>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<SlackEnvelope>, TransportError>>,
        ) -> (Self, watch::Receiver<bool>) {
            let (shutdown, receiver) = watch::channel(false);
            let transport = Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    connect_attempts: 0,
                    acknowledgements: Vec::new(),
                }),
                shutdown,
            };
            (transport, receiver)
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            let next = self.state.lock().await.envelopes.pop_front();
            match next {
                Some(next) => next,
                None => {
                    let _ = self.shutdown.send(true);
                    std::future::pending().await
                }
            }
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(envelope_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPoster {
        posts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SlackPoster for RecordingPoster {
        fn default_channel(&self) -> &str {
            "C-DEFAULT"
        }

        async fn post_message(
            &self,
            channel: &str,
            message: &MessageTemplate,
        ) -> Result<String, SlackApiError> {
            self.posts.lock().await.push((channel.to_owned(), message.fallback_text.clone()));
            Ok("1".to_owned())
        }

        async fn user_name(&self, _user_id: &str) -> Result<String, SlackApiError> {
            Ok("tester".to_owned())
        }
    }

    struct FailingMessageService;

    #[async_trait]
    impl MessageService for FailingMessageService {
        async fn handle_message(
            &self,
            _event: &MessageEvent,
            _ctx: &EventContext,
        ) -> Result<Option<MessageTemplate>, EventHandlerError> {
            Err(EventHandlerError::Message("run failed".to_owned()))
        }
    }

    fn hello_envelope(id: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: id.to_owned(),
            event: SlackEvent::SlashCommand(SlashCommandPayload {
                command: "/hello".to_owned(),
                text: "there".to_owned(),
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                user_name: "alice".to_owned(),
            }),
        }
    }

    fn unsupported_envelope(id: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: id.to_owned(),
            event: SlackEvent::Unsupported { event_type: "test".to_owned() },
        }
    }

    fn fast_policy() -> ReconnectPolicy {
        ReconnectPolicy { base_delay_ms: 0, max_delay_ms: 0 }
    }

    fn runner(transport: Arc<ScriptedTransport>, poster: Arc<RecordingPoster>) -> SocketModeRunner {
        SocketModeRunner::new(transport, Arc::new(EventDispatcher::default()), poster, fast_policy())
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy { base_delay_ms: 250, max_delay_ms: 5_000 };

        assert_eq!(policy.backoff(0), Duration::from_millis(250));
        assert_eq!(policy.backoff(3), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(40), Duration::from_millis(5_000));
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let (transport, shutdown) = ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(unsupported_envelope("env-1")))],
        );
        let transport = Arc::new(transport);
        let poster = Arc::new(RecordingPoster::default());

        runner(transport.clone(), poster.clone()).start(shutdown).await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
        assert!(poster.posts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn keeps_retrying_through_a_long_outage() {
        let mut connects: Vec<Result<(), TransportError>> = (0..8)
            .map(|attempt| Err(TransportError::Connect(format!("fail-{attempt}"))))
            .collect();
        connects.push(Ok(()));
        let (transport, shutdown) =
            ScriptedTransport::with_script(connects, vec![Ok(Some(unsupported_envelope("env-9")))]);
        let transport = Arc::new(transport);

        runner(transport.clone(), Arc::new(RecordingPoster::default()))
            .start(shutdown)
            .await
            .expect("runner");

        assert_eq!(transport.connect_attempts().await, 9);
        assert_eq!(transport.acknowledgements().await, vec!["env-9"]);
    }

    #[tokio::test]
    async fn closed_stream_reconnects_and_delivers_from_the_next_connection() {
        let (transport, shutdown) = ScriptedTransport::with_script(
            vec![Ok(()), Ok(())],
            vec![Ok(None), Ok(Some(hello_envelope("env-2")))],
        );
        let transport = Arc::new(transport);
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(SlashCommandHandler::default());
        let poster = Arc::new(RecordingPoster::default());

        SocketModeRunner::new(transport.clone(), Arc::new(dispatcher), poster.clone(), fast_policy())
            .start(shutdown)
            .await
            .expect("runner");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-2"]);
        assert_eq!(
            poster.posts.lock().await.clone(),
            vec![("C1".to_owned(), "Hello there".to_owned())]
        );
    }

    #[tokio::test]
    async fn disconnect_request_reconnects() {
        let (transport, shutdown) = ScriptedTransport::with_script(
            vec![Ok(()), Ok(())],
            vec![
                Err(TransportError::Reconnect("refresh_requested".to_owned())),
                Ok(Some(unsupported_envelope("env-4"))),
            ],
        );
        let transport = Arc::new(transport);

        runner(transport.clone(), Arc::new(RecordingPoster::default()))
            .start(shutdown)
            .await
            .expect("runner");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-4"]);
    }

    #[tokio::test]
    async fn shutdown_before_start_skips_connecting() {
        let (transport, _) = ScriptedTransport::with_script(vec![], vec![]);
        let transport = Arc::new(transport);
        let (_stop, shutdown) = watch::channel(true);

        runner(transport.clone(), Arc::new(RecordingPoster::default()))
            .start(shutdown)
            .await
            .expect("runner");

        assert_eq!(transport.connect_attempts().await, 0);
    }

    #[tokio::test]
    async fn handler_errors_are_reported_as_text() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(MessageHandler::new(FailingMessageService));
        let poster = RecordingPoster::default();
        let envelope = SlackEnvelope {
            envelope_id: "env-3".to_owned(),
            event: SlackEvent::Message(MessageEvent {
                channel_id: "C9".to_owned(),
                user_id: "U9".to_owned(),
                text: "help".to_owned(),
                ts: "1".to_owned(),
                thread_ts: None,
            }),
        };

        deliver(&dispatcher, &poster, &envelope, &EventContext::default()).await;

        assert_eq!(
            poster.posts.lock().await.clone(),
            vec![("C9".to_owned(), "message handler failure: run failed".to_owned())]
        );
    }
}
