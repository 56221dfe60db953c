//! Result-handler chain.
//!
//! A [`ResultHandler`] converts a handler's lowered [`Reply`] into a response
//! effect. The chain is built from wrapping [`ResultLayer`]s: each layer
//! receives the next handler and returns a new one, so it may fully handle
//! the reply, transform it and delegate, or pass through unchanged. Layers
//! registered later wrap the existing chain and therefore run first.
//!
//! The chain is composed once per adapted-handler construction (see
//! [`Snapshot`](crate::handler::Snapshot)); layers added to a scope
//! afterwards only affect handlers built later.

use std::sync::Arc;

use futures::future::BoxFuture;

use splice_core::{HandlerError, Reply, RequestContext};

/// A step converting a reply into a response effect, possibly delegating.
pub type ResultHandler =
    Arc<dyn Fn(Arc<RequestContext>, Reply) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// A wrapper around the existing chain; the newest layer is outermost.
pub type ResultLayer = Arc<dyn Fn(ResultHandler) -> ResultHandler + Send + Sync>;

/// The terminal handler: infer the response action from the reply's shape.
pub fn default_result_handler() -> ResultHandler {
    Arc::new(|ctx, reply| {
        Box::pin(async move {
            match reply {
                Reply::None => Ok(()),
                Reply::Text(text) => {
                    ctx.write_text(&text);
                    Ok(())
                }
                Reply::Bytes(bytes) => {
                    ctx.write_bytes(&bytes);
                    Ok(())
                }
                Reply::Json(value) => ctx
                    .write_json(&value)
                    .map_err(HandlerError::execution),
            }
        })
    })
}

/// Composes registered layers over the default terminal handler,
/// registration order innermost-first.
pub(crate) fn compose(layers: &[ResultLayer]) -> ResultHandler {
    let mut handler = default_result_handler();
    for layer in layers {
        handler = layer(handler);
    }
    handler
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_core::Method;

    fn ctx() -> Arc<RequestContext> {
        Arc::new(RequestContext::new(Method::Get, "/", vec![]))
    }

    /// A layer that tags the reply text with a marker before delegating.
    fn tagging(tag: &'static str) -> ResultLayer {
        Arc::new(move |next: ResultHandler| {
            Arc::new(move |ctx, reply| {
                let next = next.clone();
                Box::pin(async move {
                    let reply = match reply {
                        Reply::Text(text) => Reply::Text(format!("{tag}{text}")),
                        other => other,
                    };
                    next(ctx, reply).await
                })
            })
        })
    }

    #[test]
    fn default_handler_infers_the_effect_from_the_shape() {
        let handler = default_result_handler();

        let text_ctx = ctx();
        tokio_test::block_on(handler(text_ctx.clone(), Reply::Text("hi".into()))).unwrap();
        assert_eq!(text_ctx.body_text(), "hi");
        assert_eq!(
            text_ctx.content_type().as_deref(),
            Some("text/plain; charset=utf-8")
        );

        let json_ctx = ctx();
        tokio_test::block_on(handler(
            json_ctx.clone(),
            Reply::Json(serde_json::json!({"n": 1})),
        ))
        .unwrap();
        assert_eq!(json_ctx.content_type().as_deref(), Some("application/json"));

        let byte_ctx = ctx();
        tokio_test::block_on(handler(byte_ctx.clone(), Reply::Bytes(vec![0xde, 0xad]))).unwrap();
        assert_eq!(byte_ctx.body(), vec![0xde, 0xad]);

        let none_ctx = ctx();
        tokio_test::block_on(handler(none_ctx.clone(), Reply::None)).unwrap();
        assert!(none_ctx.body().is_empty());
    }

    #[test]
    fn later_layers_wrap_earlier_ones() {
        // Registered first -> innermost, so the outer (second) tag lands first.
        let chain = compose(&[tagging("inner-"), tagging("outer-")]);
        let ctx = ctx();
        tokio_test::block_on(chain(ctx.clone(), Reply::Text("x".into()))).unwrap();
        assert_eq!(ctx.body_text(), "inner-outer-x");
    }

    #[test]
    fn a_layer_may_fully_handle_the_reply() {
        let swallow: ResultLayer = Arc::new(|_next| {
            Arc::new(|ctx: Arc<RequestContext>, _reply| {
                Box::pin(async move {
                    ctx.set_status(204);
                    Ok(())
                })
            })
        });
        let chain = compose(&[swallow]);
        let ctx = ctx();
        tokio_test::block_on(chain(ctx.clone(), Reply::Text("ignored".into()))).unwrap();
        assert_eq!(ctx.status(), 204);
        assert!(ctx.body().is_empty());
    }
}
