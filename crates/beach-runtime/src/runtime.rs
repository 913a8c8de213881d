//! Binds an actor to a reply socket and serves requests against its
//! handler table until told to stop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beach_proto::{error_message, success_message, ErrorKind, Reply, Request};
use beach_transport::{Address, Handler as TransportHandler, ReplySocket};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::actor::Actor;
use crate::context::ActorContext;
use crate::error::RuntimeError;
use crate::handler::{Concurrency, HandlerTable};
use crate::lifecycle::{ActorLifecycle, ActorState};

/// How long a running actor is given to finish in-flight requests after a
/// stop is requested before the worker-instance host force-kills it.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Binds one actor instance to one reply socket and drives it through its
/// full lifecycle.
pub struct ActorRuntime;

impl ActorRuntime {
    /// Bind `address`, run the actor through init → serve → deinit, and
    /// return once it has fully stopped.
    ///
    /// The returned lifecycle reflects the actor's terminal state:
    /// `Stopped` on a clean shutdown, `Failed` if `init` errored.
    pub async fn run(
        actor: Arc<dyn Actor>,
        ctx: ActorContext,
        address: Address,
    ) -> Result<ActorLifecycle, RuntimeError> {
        let mut lifecycle = ActorLifecycle::new();
        lifecycle.transition(ActorState::Binding).ok();
        let socket = ReplySocket::bind(address).await?;

        lifecycle.transition(ActorState::Initializing).ok();
        if let Err(err) = actor.init(&ctx).await {
            error!(error = %err, "actor init failed");
            lifecycle.transition(ActorState::Failed).ok();
            return Err(err);
        }

        let table = actor.register_handlers();
        lifecycle.transition(ActorState::Running).ok();

        let dispatch = Arc::new(DispatchHandler {
            table,
            ctx: ctx.clone(),
            serial_lock: AsyncMutex::new(()),
        });

        let token = ctx.cancellation_token();
        tokio::select! {
            result = socket.serve(dispatch) => {
                if let Err(err) = result {
                    warn!(error = %err, "reply socket accept loop ended");
                }
            }
            _ = token.cancelled() => {
                info!("stop requested, winding down accept loop");
            }
        }

        lifecycle.transition(ActorState::Stopping).ok();
        actor.deinit(&ctx).await;
        lifecycle.transition(ActorState::Stopped).ok();
        Ok(lifecycle)
    }

    /// Signal a running actor's context to stop. The dispatch loop bound to
    /// that context's reply socket unwinds on its next accept.
    pub fn request_stop(ctx: &ActorContext) {
        ctx.request_stop();
    }
}

struct DispatchHandler {
    table: HandlerTable,
    ctx: ActorContext,
    serial_lock: AsyncMutex<()>,
}

#[async_trait]
impl TransportHandler for DispatchHandler {
    async fn handle(&self, request: Value) -> Value {
        let reply = self.dispatch(request).await;
        serde_json::to_value(reply).unwrap_or_else(|_| {
            serde_json::to_value(error_message(ErrorKind::Exception, None))
                .expect("error_message always serializes")
        })
    }
}

impl DispatchHandler {
    async fn dispatch(&self, raw: Value) -> Reply {
        let request = match Request::decode(raw) {
            Ok(req) => req,
            Err(_) => return error_message(ErrorKind::InvalidRequest, None),
        };

        let Some(entry) = self.table.get(&request.op) else {
            return error_message(ErrorKind::UnknownRequest, None);
        };

        let args = Value::Object(request.args);
        let result = match entry.concurrency {
            Concurrency::Serial => {
                let _permit = self.serial_lock.lock().await;
                (entry.handler)(args, self.ctx.clone()).await
            }
            Concurrency::Concurrent => (entry.handler)(args, self.ctx.clone()).await,
        };

        match result {
            Ok(data) => success_message(data),
            Err(err) => {
                warn!(op = %request.op, error = %err, "handler returned an error");
                error_message(err.wire_kind(), None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ActorHandleProvider, DynamicHandle, HandleMode};
    use crate::handler::HandlerResult;
    use beach_proto::{Category, Realm, Uid};
    use std::net::SocketAddr;

    struct NoopProvider;

    #[async_trait]
    impl ActorHandleProvider for NoopProvider {
        async fn get_actor_handle(
            &self,
            _realm: Realm,
            category: Category,
            _mode: HandleMode,
        ) -> Result<Arc<dyn DynamicHandle>, RuntimeError> {
            Err(RuntimeError::CategoryUnavailable(category.to_string()))
        }

        async fn is_category_available(&self, _realm: &Realm, _category: &Category) -> bool {
            false
        }
    }

    struct Echo;

    #[async_trait]
    impl Actor for Echo {
        async fn init(&self, _ctx: &ActorContext) -> Result<(), RuntimeError> {
            Ok(())
        }

        fn register_handlers(&self) -> HandlerTable {
            let mut table = HandlerTable::new();
            table.add_handler("echo", |args, _ctx| async move {
                let result: HandlerResult = Ok(Some(args));
                result
            });
            table
        }
    }

    #[tokio::test]
    async fn serves_a_registered_handler_and_stops_on_cancellation() {
        let ctx = ActorContext::new(
            Realm::default_realm(),
            Category::new("echo"),
            Uid::new(),
            Arc::new(NoopProvider),
        );
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let bound_probe = ReplySocket::bind(Address::Tcp(addr)).await.unwrap();
        let local_addr = bound_probe.local_addr().unwrap();
        drop(bound_probe);

        let ctx_for_run = ctx.clone();
        let handle = tokio::spawn(async move {
            ActorRuntime::run(Arc::new(Echo), ctx_for_run, local_addr).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        ActorRuntime::request_stop(&ctx);
        let lifecycle = handle.await.unwrap().unwrap();
        assert_eq!(lifecycle.state(), ActorState::Stopped);
    }
}
