//! Handlers: async functions run when a rule matches.
//!
//! Handlers are implemented via blanket implementations for functions of
//! different arities. Every parameter is an extractor
//! ([`FromHandlerContext`]) and the return value is anything that
//! [`IntoResponses`].
//!
//! # Example
//!
//! ```rust,ignore
//! // No parameters, text reply
//! async fn pong() -> &'static str {
//!     "pong"
//! }
//!
//! // The message and the regex captures
//! async fn weather(msg: Arc<InboundMessage>, Captures(groups): Captures) -> OutboundAction {
//!     msg.reply_thread(format!("no idea about {}", groups[1].as_deref().unwrap_or("there")))
//! }
//!
//! // Fallible: the error is shown to the sender
//! async fn strict(Text(rest): Text) -> Result<String, ResponseError> {
//!     if rest.is_empty() {
//!         return Err("say something".into());
//!     }
//!     Ok(rest)
//! }
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use quip_core::BoxFuture;

use crate::error::ResponseError;
use crate::extractor::{FromHandlerContext, HandlerContext};
use crate::response::{IntoResponses, OutboundAction};

/// What running a handler yields.
pub type HandlerOutput = Result<Vec<OutboundAction>, ResponseError>;

// ============================================================================
// Handler Trait
// ============================================================================

/// An event handler.
///
/// Implemented for async functions that take up to 8 parameters implementing
/// [`FromHandlerContext`] and return a value implementing [`IntoResponses`].
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// The future calling this handler returns.
    type Future: Future<Output = HandlerOutput> + Send + 'static;

    /// Calls the handler with the given context.
    fn call(self, ctx: HandlerContext) -> Self::Future;
}

// ============================================================================
// Type erasure
// ============================================================================

/// Wraps a handler function so it can be stored next to handlers of other
/// signatures.
pub struct HandlerFn<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> HandlerFn<F, T> {
    /// Creates a new handler function wrapper.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<F: Clone, T> Clone for HandlerFn<F, T> {
    fn clone(&self) -> Self {
        Self {
            f: self.f.clone(),
            _marker: PhantomData,
        }
    }
}

/// A type-erased handler that can be stored in collections.
pub type BoxedHandler = Arc<dyn ErasedHandler>;

/// Type-erased handler trait for dynamic dispatch.
pub trait ErasedHandler: Send + Sync {
    /// Runs the handler with the given context.
    fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, HandlerOutput>;
}

impl<F, T> ErasedHandler for HandlerFn<F, T>
where
    F: Handler<T>,
    T: 'static,
{
    fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, HandlerOutput> {
        let f = self.f.clone();
        Box::pin(async move { f.call(ctx).await })
    }
}

/// Converts a handler function into a boxed handler.
pub fn into_handler<F, T>(f: F) -> BoxedHandler
where
    F: Handler<T>,
    T: 'static,
{
    Arc::new(HandlerFn::new(f))
}

// ============================================================================
// Handler implementations for functions
// ============================================================================

impl<F, Fut, R> Handler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponses,
{
    type Future = Pin<Box<dyn Future<Output = HandlerOutput> + Send + 'static>>;

    fn call(self, ctx: HandlerContext) -> Self::Future {
        Box::pin(async move { (self)().await.into_responses(ctx.message()) })
    }
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case)]
        impl<F, Fut, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoResponses,
            $( $ty: FromHandlerContext + Send + 'static, )*
        {
            type Future = Pin<Box<dyn Future<Output = HandlerOutput> + Send + 'static>>;

            fn call(self, ctx: HandlerContext) -> Self::Future {
                Box::pin(async move {
                    $(
                        let $ty = $ty::from_handler_context(&ctx)?;
                    )*

                    (self)($($ty,)*).await.into_responses(ctx.message())
                })
            }
        }
    };
}

impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
