use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use super::{Middleware, from_middleware};
use crate::StatusCode;
use crate::context::Context;

/// Contains panics raised by downstream handlers.
///
/// The rest of the chain runs inside [`std::panic::catch_unwind`]. A panic is logged
/// with the request line and the panic message, then turned into a
/// `500 {"message":"Internal Server Error"}` response with the chain aborted, so the
/// fault never reaches the transport. Headers and body written before the panic are
/// discarded.
///
/// Only handlers registered after `Recovery` are covered. The process panic hook still
/// runs first and reports the panic location as usual.
pub struct Recovery;

impl Middleware for Recovery {
    fn handle(&self, ctx: &mut Context) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| ctx.next()));
        if let Err(payload) = outcome {
            error!(
                method = %ctx.method(),
                path = ctx.path(),
                panic = %panic_message(&*payload),
                "handler panicked"
            );
            ctx.reset_response();
            ctx.fail(StatusCode::InternalServerError, "Internal Server Error");
        }
    }
}

/// [`Recovery`] as a registrable handler.
pub fn recovery() -> impl Fn(&mut Context) + Send + Sync + 'static {
    from_middleware(Arc::new(Recovery))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
