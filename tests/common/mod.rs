//! Test utilities and server harness for cachewire tests.
//!
//! Provides:
//! - An in-process pubsub server that echoes published values to subscribers
//! - Frame injection for control frames and stream errors
//! - A client wired to the in-process server

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cachewire::proto::pubsub::pubsub_server::{Pubsub, PubsubServer};
use cachewire::proto::pubsub::{
    subscription_item, Empty, Heartbeat, PublishRequest, SubscriptionItem, SubscriptionRequest,
    TopicItem,
};
use cachewire::{Credential, TopicClient, TopicConfig};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, TcpListenerStream};
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status};

pub const API_KEY: &str = "test-api-key";

type Frame = Result<SubscriptionItem, Status>;
type TopicKey = (String, String);

/// Metadata observed on one incoming call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub method: &'static str,
    pub authorization: Option<String>,
    pub agent: Option<String>,
}

/// In-memory pubsub service.
#[derive(Default)]
pub struct FakePubsub {
    topics: Mutex<HashMap<TopicKey, (broadcast::Sender<Frame>, u64)>>,
    published: Mutex<Vec<PublishRequest>>,
    subscriptions: Mutex<Vec<SubscriptionRequest>>,
    calls: Mutex<Vec<CallRecord>>,
    next_publish_error: Mutex<Option<Status>>,
    next_publish_delay: Mutex<Option<Duration>>,
}

impl FakePubsub {
    fn record<T>(&self, method: &'static str, request: &Request<T>) -> Result<(), Status> {
        let header = |name: &str| {
            request
                .metadata()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let record = CallRecord {
            method,
            authorization: header("authorization"),
            agent: header("agent"),
        };
        let authorized = record.authorization.as_deref() == Some(API_KEY);
        self.calls.lock().unwrap().push(record);

        if authorized {
            Ok(())
        } else {
            Err(Status::unauthenticated("invalid api key"))
        }
    }

    fn sender(&self, cache: &str, topic: &str) -> broadcast::Sender<Frame> {
        let mut topics = self.topics.lock().unwrap();
        topics
            .entry((cache.to_string(), topic.to_string()))
            .or_insert_with(|| (broadcast::channel(64).0, 0))
            .0
            .clone()
    }

    fn next_sequence(&self, cache: &str, topic: &str) -> u64 {
        let mut topics = self.topics.lock().unwrap();
        let entry = topics
            .entry((cache.to_string(), topic.to_string()))
            .or_insert_with(|| (broadcast::channel(64).0, 0));
        entry.1 += 1;
        entry.1
    }

    /// Push a raw frame (or stream error) to every subscriber of a topic.
    pub fn inject(&self, cache: &str, topic: &str, frame: Frame) -> usize {
        self.sender(cache, topic).send(frame).unwrap_or(0)
    }

    /// Fail the next publish with `status`.
    pub fn fail_next_publish(&self, status: Status) {
        *self.next_publish_error.lock().unwrap() = Some(status);
    }

    /// Hold the next publish for `delay` before answering.
    pub fn delay_next_publish(&self, delay: Duration) {
        *self.next_publish_delay.lock().unwrap() = Some(delay);
    }

    pub fn published(&self) -> Vec<PublishRequest> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionRequest> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }
}

#[tonic::async_trait]
impl Pubsub for FakePubsub {
    async fn publish(&self, request: Request<PublishRequest>) -> Result<Response<Empty>, Status> {
        self.record("publish", &request)?;
        let delay = self.next_publish_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = self.next_publish_error.lock().unwrap().take() {
            return Err(status);
        }

        let req = request.into_inner();
        let sequence = self.next_sequence(&req.cache_name, &req.topic);
        let frame = SubscriptionItem {
            kind: Some(subscription_item::Kind::Item(TopicItem {
                topic_sequence_number: sequence,
                value: req.value.clone(),
            })),
        };
        self.inject(&req.cache_name, &req.topic, Ok(frame));
        self.published.lock().unwrap().push(req);

        Ok(Response::new(Empty {}))
    }

    type SubscribeStream = Pin<Box<dyn Stream<Item = Frame> + Send + 'static>>;

    async fn subscribe(
        &self,
        request: Request<SubscriptionRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        self.record("subscribe", &request)?;

        let req = request.into_inner();
        let receiver = self.sender(&req.cache_name, &req.topic).subscribe();
        self.subscriptions.lock().unwrap().push(req);

        let heartbeat = SubscriptionItem {
            kind: Some(subscription_item::Kind::Heartbeat(Heartbeat {})),
        };
        let frames = BroadcastStream::new(receiver).filter_map(Result::ok);
        let stream: Self::SubscribeStream =
            Box::pin(tokio_stream::once(Ok(heartbeat)).chain(frames));

        Ok(Response::new(stream))
    }
}

/// In-process gRPC server running [`FakePubsub`].
pub struct TestServer {
    pub addr: SocketAddr,
    pub service: Arc<FakePubsub>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind");
        let addr = listener.local_addr().expect("local addr");
        let service = Arc::new(FakePubsub::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = PubsubServer::from_arc(Arc::clone(&service));
        let handle = tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(server)
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server failed");
        });

        Self {
            addr,
            service,
            shutdown_tx,
            handle,
        }
    }

    /// Credential pointing at this server.
    pub fn credential(&self) -> Credential {
        Credential::from_token(&structured_token("localhost", API_KEY))
            .and_then(|c| c.with_cache_endpoint(format!("http://{}", self.addr)))
            .expect("credential")
    }

    pub fn client(&self) -> TopicClient {
        self.client_with(TopicConfig::plaintext(self.addr.port()))
    }

    pub fn client_with(&self, config: TopicConfig) -> TopicClient {
        TopicClient::builder(self.credential())
            .config(config)
            .build()
            .expect("client")
    }

    /// Stop the server. Streams still held open by clients are abandoned
    /// after a short grace period.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = tokio::time::timeout(Duration::from_secs(2), self.handle).await;
    }
}

/// Structured token for `endpoint` and `api_key`.
pub fn structured_token(endpoint: &str, api_key: &str) -> String {
    STANDARD.encode(
        serde_json::json!({ "endpoint": endpoint, "api_key": api_key }).to_string(),
    )
}

/// Initialize tracing for tests (only logs errors unless RUST_LOG is set).
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
