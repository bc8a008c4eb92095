//! Dispatch path shared by every operation: route, execute, observe.

use futures_util::stream::{self, LocalBoxStream};
use futures_util::StreamExt;
use relieflink_shared::{ClientError, GraphQLResponse, Operation, TransportError};

use crate::interceptor::ErrorInterceptor;
use crate::router::{OperationRouter, Route};
use crate::transport::ConnectionState;

/// A subscription's messages after interception.
pub type ObservedStream = LocalBoxStream<'static, Result<GraphQLResponse, TransportError>>;

#[derive(Clone)]
pub struct Link {
    router: OperationRouter,
    interceptor: ErrorInterceptor,
}

impl Link {
    pub fn new(router: OperationRouter, interceptor: ErrorInterceptor) -> Self {
        Self {
            router,
            interceptor,
        }
    }

    /// Run a one-shot operation. On the persistent channel this is the first
    /// pushed message.
    pub async fn request(&self, operation: &Operation) -> Result<GraphQLResponse, ClientError> {
        match self.router.route(operation)? {
            Route::Ephemeral(channel) => {
                let outcome = channel.execute(operation).await;
                self.interceptor.observe(operation, &outcome);
                Ok(outcome?)
            }
            Route::Persistent(_) => {
                let mut messages = self.subscribe(operation)?;
                match messages.next().await {
                    Some(item) => Ok(item?),
                    None => Err(TransportError::StreamReset("subscription ended".into()).into()),
                }
            }
        }
    }

    /// Open a stream of results. On the ephemeral channel this is a
    /// one-element stream.
    pub fn subscribe(&self, operation: &Operation) -> Result<ObservedStream, ClientError> {
        let interceptor = self.interceptor.clone();
        let op = operation.clone();
        match self.router.route(operation)? {
            Route::Persistent(channel) => {
                let messages = channel.subscribe(operation).map_err(|e| {
                    self.interceptor.observe(operation, &Err(e.clone()));
                    ClientError::from(e)
                })?;
                Ok(messages
                    .map(move |item| {
                        interceptor.observe(&op, &item);
                        item
                    })
                    .boxed_local())
            }
            Route::Ephemeral(channel) => Ok(stream::once(async move {
                let outcome = channel.execute(&op).await;
                interceptor.observe(&op, &outcome);
                outcome
            })
            .boxed_local()),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.router.connection_state()
    }

    pub fn close(&self) {
        self.router.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::tests::RecordingSink;
    use crate::transport::testing::{settle, ScriptedChannel, ScriptedStream};
    use relieflink_shared::ConfigError;
    use serde_json::json;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    #[tokio::test]
    async fn one_shot_failure_is_observed_once_and_returned() {
        LocalSet::new()
            .run_until(async {
                let http = ScriptedChannel::new();
                let sink = Rc::new(RecordingSink::default());
                let link = Link::new(
                    OperationRouter::new().with_ephemeral(http.clone()),
                    ErrorInterceptor::new(sink.clone()),
                );
                let op = Operation::query("City", "query City { city { id } }");

                let pending = tokio::task::spawn_local({
                    let link = link.clone();
                    let op = op.clone();
                    async move { link.request(&op).await }
                });
                settle().await;
                http.resolve(0, Err(TransportError::Network("connection refused".into())));

                let result = pending.await.unwrap();
                assert_eq!(
                    result,
                    Err(ClientError::Transport(TransportError::Network(
                        "connection refused".into()
                    )))
                );
                assert_eq!(sink.0.borrow().len(), 1);
                assert_eq!(http.call_count(), 1, "no retry for one-shot operations");
            })
            .await;
    }

    #[tokio::test]
    async fn subscription_messages_pass_through_the_interceptor() {
        let ws = ScriptedStream::new();
        let sink = Rc::new(RecordingSink::default());
        let link = Link::new(
            OperationRouter::new().with_persistent(ws.clone()),
            ErrorInterceptor::new(sink.clone()),
        );
        let op = Operation::subscription("NeedAdded", "subscription NeedAdded { need { id } }");

        let mut messages = link.subscribe(&op).unwrap();
        ws.push(0, Err(TransportError::StreamReset("connection lost".into())));
        ws.push_data(0, json!({ "need": [] }));

        assert!(messages.next().await.unwrap().is_err());
        assert_eq!(messages.next().await.unwrap().unwrap().data, Some(json!({ "need": [] })));
        assert_eq!(*sink.0.borrow(), vec!["transport:Stream reset: connection lost".to_string()]);
    }

    #[tokio::test]
    async fn unconfigured_channel_is_a_config_error() {
        let link = Link::new(OperationRouter::new(), ErrorInterceptor::default());
        let op = Operation::mutation("InsertNeed", "mutation InsertNeed { x }");
        assert_eq!(
            link.request(&op).await,
            Err(ClientError::Config(ConfigError::NoChannel("request/response")))
        );
    }
}
