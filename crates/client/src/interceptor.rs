//! Single observation point for failures on every channel.

use std::rc::Rc;

use relieflink_shared::{GraphQLError, GraphQLResponse, Operation, TransportError};

/// Where intercepted failures are reported.
pub trait ErrorSink {
    fn protocol_error(&self, operation: &Operation, error: &GraphQLError);
    fn transport_error(&self, operation: &Operation, error: &TransportError);
}

/// Reports through the logging macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn protocol_error(&self, operation: &Operation, error: &GraphQLError) {
        crate::log_error!(
            "[GraphQL error]: Message: {}, Location: {}, Path: {} (operation {})",
            error.message,
            error.locations_display(),
            error.path_display(),
            operation.name()
        );
    }

    fn transport_error(&self, operation: &Operation, error: &TransportError) {
        crate::log_error!("[Network error]: {} (operation {})", error, operation.name());
    }
}

/// Observes outcomes without touching them: it only ever sees a shared borrow.
#[derive(Clone)]
pub struct ErrorInterceptor {
    sink: Rc<dyn ErrorSink>,
}

impl ErrorInterceptor {
    pub fn new(sink: Rc<dyn ErrorSink>) -> Self {
        Self { sink }
    }

    pub fn observe(&self, operation: &Operation, outcome: &Result<GraphQLResponse, TransportError>) {
        match outcome {
            Ok(response) => {
                for error in &response.errors {
                    self.sink.protocol_error(operation, error);
                }
            }
            Err(error) => self.sink.transport_error(operation, error),
        }
    }
}

impl Default for ErrorInterceptor {
    fn default() -> Self {
        Self::new(Rc::new(LogSink))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use relieflink_shared::{ErrorLocation, PathSegment};
    use serde_json::json;
    use std::cell::RefCell;

    /// Collects reports as `protocol:<msg>@<path>` / `transport:<error>`.
    #[derive(Default)]
    pub(crate) struct RecordingSink(pub RefCell<Vec<String>>);

    impl ErrorSink for RecordingSink {
        fn protocol_error(&self, _operation: &Operation, error: &GraphQLError) {
            self.0
                .borrow_mut()
                .push(format!("protocol:{}@{}", error.message, error.path_display()));
        }

        fn transport_error(&self, _operation: &Operation, error: &TransportError) {
            self.0.borrow_mut().push(format!("transport:{}", error));
        }
    }

    fn op() -> Operation {
        Operation::query("City", "query City { city { id } }")
    }

    #[test]
    fn every_protocol_error_is_reported_and_result_untouched() {
        let sink = Rc::new(RecordingSink::default());
        let interceptor = ErrorInterceptor::new(sink.clone());

        let mut first = GraphQLError::new("denied");
        first.path = vec![PathSegment::Field("city".into()), PathSegment::Index(0)];
        first.locations = vec![ErrorLocation { line: 1, column: 3 }];
        let outcome = Ok(GraphQLResponse {
            data: Some(json!({ "city": [null] })),
            errors: vec![first, GraphQLError::new("slow")],
        });
        let before = outcome.clone();

        interceptor.observe(&op(), &outcome);

        assert_eq!(outcome, before);
        assert_eq!(
            *sink.0.borrow(),
            vec!["protocol:denied@city.0".to_string(), "protocol:slow@".to_string()]
        );
    }

    #[test]
    fn transport_failures_are_reported_separately() {
        let sink = Rc::new(RecordingSink::default());
        let interceptor = ErrorInterceptor::new(sink.clone());

        interceptor.observe(&op(), &Err(TransportError::Timeout(30_000)));
        interceptor.observe(&op(), &Ok(GraphQLResponse::from_data(json!({}))));

        assert_eq!(
            *sink.0.borrow(),
            vec!["transport:Request timed out after 30000ms".to_string()]
        );
    }
}
