//! Channel handler trait and its type-erased registry form.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

/// Error produced by a failing handler.
///
/// Only its existence reaches the caller (as a 500 status); the detail stays
/// in the server log.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a single handler invocation.
pub type HandlerResult = Result<Value, HandlerError>;

/// A service bound to one channel.
///
/// Receives the deserialized request body and produces the value that is
/// serialized into the response.
///
/// # Example
///
/// ```rust,ignore
/// struct Echo;
///
/// impl Handler for Echo {
///     async fn handle(&self, request: Value) -> HandlerResult {
///         Ok(request)
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: Value) -> impl Future<Output = HandlerResult> + Send;
}

/// Wrap an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send,
{
    FnHandler(f)
}

/// Handler backed by a closure. See [`handler_fn`].
pub struct FnHandler<F>(F);

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send,
{
    fn handle(&self, request: Value) -> impl Future<Output = HandlerResult> + Send {
        (self.0)(request)
    }
}

pub(crate) type BoxHandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Type-erased handler stored in the registry.
pub(crate) type ErasedHandler = Arc<dyn Fn(Value) -> BoxHandlerFuture + Send + Sync>;

pub(crate) fn erase<H: Handler>(handler: H) -> ErasedHandler {
    let handler = Arc::new(handler);
    Arc::new(move |request: Value| -> BoxHandlerFuture {
        let handler = Arc::clone(&handler);
        Box::pin(async move { handler.handle(request).await })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Doubler;

    impl Handler for Doubler {
        async fn handle(&self, request: Value) -> HandlerResult {
            let n = request.as_i64().ok_or("expected an integer")?;
            Ok(json!(n * 2))
        }
    }

    #[tokio::test]
    async fn erased_struct_handler_dispatches() {
        let handler = erase(Doubler);
        let result = handler(json!(21)).await.expect("handler should succeed");
        assert_eq!(result, json!(42));
    }

    #[tokio::test]
    async fn erased_struct_handler_propagates_failure() {
        let handler = erase(Doubler);
        let err = handler(json!("nope")).await.expect_err("handler should fail");
        assert_eq!(err.to_string(), "expected an integer");
    }

    #[tokio::test]
    async fn closure_handler_dispatches() {
        let handler = erase(handler_fn(|request| async move {
            Ok::<_, HandlerError>(json!({ "got": request }))
        }));
        let result = handler(json!([1, 2])).await.expect("handler should succeed");
        assert_eq!(result, json!({ "got": [1, 2] }));
    }
}
