use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use super::{Middleware, from_middleware};
use crate::context::Context;

/// Logs each request's status, method, target, and duration once the chain unwinds.
///
/// Emits a single `tracing::info!` record after every downstream handler has returned,
/// with `status`, `method`, `uri` and `elapsed` as fields.
pub struct Logger;

impl Middleware for Logger {
    fn handle(&self, ctx: &mut Context) {
        let start = Instant::now();
        ctx.next();
        info!(
            status = ctx.status_code().as_u16(),
            method = %ctx.method(),
            uri = ctx.request().target(),
            elapsed = ?start.elapsed(),
            "request completed"
        );
    }
}

/// [`Logger`] as a registrable handler.
pub fn logger() -> impl Fn(&mut Context) + Send + Sync + 'static {
    from_middleware(Arc::new(Logger))
}
