//! Protocol buffer definitions for the cache pubsub service.
//!
//! Hand-maintained equivalent of the `tonic-build` output for
//! `cache_client.pubsub`, kept in-tree so the workspace builds without `protoc`.
//!
//! ```text
//! service Pubsub {
//!   rpc Publish(_PublishRequest) returns (_Empty);
//!   rpc Subscribe(_SubscriptionRequest) returns (stream _SubscriptionItem);
//! }
//! ```

pub mod pubsub {
    /// Empty response body for unary calls.
    #[derive(Clone, Copy, PartialEq, prost::Message)]
    pub struct Empty {}

    /// A scalar value carried on a topic.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TopicValue {
        #[prost(oneof = "topic_value::Kind", tags = "1, 2")]
        pub kind: Option<topic_value::Kind>,
    }

    pub mod topic_value {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Kind {
            #[prost(string, tag = "1")]
            Text(String),
            #[prost(bytes = "vec", tag = "2")]
            Binary(Vec<u8>),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct PublishRequest {
        #[prost(string, tag = "1")]
        pub cache_name: String,

        #[prost(string, tag = "2")]
        pub topic: String,

        #[prost(message, optional, tag = "3")]
        pub value: Option<TopicValue>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct SubscriptionRequest {
        #[prost(string, tag = "1")]
        pub cache_name: String,

        #[prost(string, tag = "2")]
        pub topic: String,

        /// Sequence number to resume after; 0 starts from the live tail.
        #[prost(uint64, tag = "3")]
        pub resume_at_topic_sequence_number: u64,
    }

    /// One frame pushed by the Subscribe stream.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct SubscriptionItem {
        #[prost(oneof = "subscription_item::Kind", tags = "1, 2, 3")]
        pub kind: Option<subscription_item::Kind>,
    }

    pub mod subscription_item {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Kind {
            #[prost(message, tag = "1")]
            Item(super::TopicItem),
            #[prost(message, tag = "2")]
            Discontinuity(super::Discontinuity),
            #[prost(message, tag = "3")]
            Heartbeat(super::Heartbeat),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TopicItem {
        #[prost(uint64, tag = "1")]
        pub topic_sequence_number: u64,

        #[prost(message, optional, tag = "2")]
        pub value: Option<TopicValue>,
    }

    /// Marks a gap in the topic sequence observed by the server.
    #[derive(Clone, Copy, PartialEq, prost::Message)]
    pub struct Discontinuity {
        #[prost(uint64, tag = "1")]
        pub last_topic_sequence: u64,

        #[prost(uint64, tag = "2")]
        pub new_topic_sequence: u64,
    }

    #[derive(Clone, Copy, PartialEq, prost::Message)]
    pub struct Heartbeat {}

    /// Generated gRPC client module
    pub mod pubsub_client {
        use tonic::codegen::*;

        /// Pubsub RPC client
        #[derive(Debug, Clone)]
        pub struct PubsubClient<T> {
            inner: tonic::client::Grpc<T>,
        }

        impl PubsubClient<tonic::transport::Channel> {
            /// Connect to the given endpoint
            pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
            where
                D: TryInto<tonic::transport::Endpoint>,
                D::Error: Into<StdError>,
            {
                let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
                Ok(Self::new(conn))
            }
        }

        impl<T> PubsubClient<T>
        where
            T: tonic::client::GrpcService<tonic::body::BoxBody>,
            T::Error: Into<StdError>,
            T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
            <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
        {
            /// Create a new client over any gRPC service (plain or intercepted channel)
            pub fn new(inner: T) -> Self {
                let inner = tonic::client::Grpc::new(inner);
                Self { inner }
            }

            /// Publish a single value on a topic
            pub async fn publish(
                &mut self,
                request: impl tonic::IntoRequest<super::PublishRequest>,
            ) -> std::result::Result<tonic::Response<super::Empty>, tonic::Status> {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
                let codec = tonic::codec::ProstCodec::default();
                let path =
                    http::uri::PathAndQuery::from_static("/cache_client.pubsub.Pubsub/Publish");
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("cache_client.pubsub.Pubsub", "Publish"));
                self.inner.unary(req, path, codec).await
            }

            /// Open a server-streaming subscription on a topic
            pub async fn subscribe(
                &mut self,
                request: impl tonic::IntoRequest<super::SubscriptionRequest>,
            ) -> std::result::Result<
                tonic::Response<tonic::codec::Streaming<super::SubscriptionItem>>,
                tonic::Status,
            > {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
                let codec = tonic::codec::ProstCodec::default();
                let path =
                    http::uri::PathAndQuery::from_static("/cache_client.pubsub.Pubsub/Subscribe");
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("cache_client.pubsub.Pubsub", "Subscribe"));
                self.inner.server_streaming(req, path, codec).await
            }
        }
    }

    /// Generated gRPC server module
    pub mod pubsub_server {
        use tonic::codegen::*;

        /// Pubsub service trait
        #[tonic::async_trait]
        pub trait Pubsub: std::marker::Send + std::marker::Sync + 'static {
            async fn publish(
                &self,
                request: tonic::Request<super::PublishRequest>,
            ) -> std::result::Result<tonic::Response<super::Empty>, tonic::Status>;

            /// Server streaming response type for the Subscribe method.
            type SubscribeStream: tonic::codegen::tokio_stream::Stream<
                    Item = std::result::Result<super::SubscriptionItem, tonic::Status>,
                > + std::marker::Send
                + 'static;

            async fn subscribe(
                &self,
                request: tonic::Request<super::SubscriptionRequest>,
            ) -> std::result::Result<tonic::Response<Self::SubscribeStream>, tonic::Status>;
        }

        /// Pubsub service server
        #[derive(Debug)]
        pub struct PubsubServer<T: Pubsub> {
            inner: Arc<T>,
        }

        impl<T: Pubsub> PubsubServer<T> {
            pub fn new(inner: T) -> Self {
                Self::from_arc(Arc::new(inner))
            }

            pub fn from_arc(inner: Arc<T>) -> Self {
                Self { inner }
            }
        }

        impl<T: Pubsub> Clone for PubsubServer<T> {
            fn clone(&self) -> Self {
                Self {
                    inner: Arc::clone(&self.inner),
                }
            }
        }

        impl<T: Pubsub> tonic::server::NamedService for PubsubServer<T> {
            const NAME: &'static str = "cache_client.pubsub.Pubsub";
        }

        impl<T, B> tonic::codegen::Service<http::Request<B>> for PubsubServer<T>
        where
            T: Pubsub,
            B: Body + std::marker::Send + 'static,
            B::Error: Into<StdError> + std::marker::Send + 'static,
        {
            type Response = http::Response<tonic::body::BoxBody>;
            type Error = std::convert::Infallible;
            type Future = BoxFuture<Self::Response, Self::Error>;

            fn poll_ready(
                &mut self,
                _cx: &mut Context<'_>,
            ) -> Poll<std::result::Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }

            fn call(&mut self, req: http::Request<B>) -> Self::Future {
                let inner = Arc::clone(&self.inner);

                match req.uri().path() {
                    "/cache_client.pubsub.Pubsub/Publish" => {
                        let fut = async move {
                            let mut grpc =
                                tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                            let res = grpc.unary(PublishSvc(inner), req).await;
                            Ok(res)
                        };
                        Box::pin(fut)
                    }
                    "/cache_client.pubsub.Pubsub/Subscribe" => {
                        let fut = async move {
                            let mut grpc =
                                tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                            let res = grpc.server_streaming(SubscribeSvc(inner), req).await;
                            Ok(res)
                        };
                        Box::pin(fut)
                    }
                    _ => Box::pin(async move {
                        let mut response = http::Response::new(empty_body());
                        let headers = response.headers_mut();
                        headers.insert(
                            tonic::Status::GRPC_STATUS,
                            (tonic::Code::Unimplemented as i32).into(),
                        );
                        headers.insert(
                            http::header::CONTENT_TYPE,
                            tonic::metadata::GRPC_CONTENT_TYPE,
                        );
                        Ok(response)
                    }),
                }
            }
        }

        struct PublishSvc<T: Pubsub>(Arc<T>);

        impl<T: Pubsub> tonic::server::UnaryService<super::PublishRequest> for PublishSvc<T> {
            type Response = super::Empty;
            type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

            fn call(&mut self, request: tonic::Request<super::PublishRequest>) -> Self::Future {
                let inner = Arc::clone(&self.0);
                let fut = async move { inner.publish(request).await };
                Box::pin(fut)
            }
        }

        struct SubscribeSvc<T: Pubsub>(Arc<T>);

        impl<T: Pubsub> tonic::server::ServerStreamingService<super::SubscriptionRequest>
            for SubscribeSvc<T>
        {
            type Response = super::SubscriptionItem;
            type ResponseStream = T::SubscribeStream;
            type Future = BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;

            fn call(
                &mut self,
                request: tonic::Request<super::SubscriptionRequest>,
            ) -> Self::Future {
                let inner = Arc::clone(&self.0);
                let fut = async move { inner.subscribe(request).await };
                Box::pin(fut)
            }
        }
    }
}
