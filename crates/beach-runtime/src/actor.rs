//! The `Actor` trait every hosted actor implements.

use async_trait::async_trait;

use crate::context::ActorContext;
use crate::error::RuntimeError;
use crate::handler::HandlerTable;

/// A unit of hosted behavior: some state plus a table of request handlers.
///
/// `init`/`deinit` bracket the actor's running lifetime the way
/// `actor.py`'s subclasses override `_init`/`_deinit`; `register_handlers`
/// replaces the Python code's imperative `self.AddHandler(...)` calls in
/// `_init` with an explicit, introspectable table the runtime builds once
/// before serving any requests.
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    /// Run once before the first request is served. Failing here moves the
    /// actor straight to `Failed` without ever reaching `Running`.
    async fn init(&self, ctx: &ActorContext) -> Result<(), RuntimeError>;

    /// Build this actor's request-type -> handler table.
    fn register_handlers(&self) -> HandlerTable;

    /// Run once after the last request has been served (or the grace
    /// period for in-flight requests elapsed), before the process-level
    /// supervisor considers this actor stopped.
    async fn deinit(&self, ctx: &ActorContext) {
        let _ = ctx;
    }
}
