use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::session::Session;
use futures::future::BoxFuture;
use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

type HandlerFn<C> =
    dyn Fn(Arc<C>, Arc<Session>, Packet) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static;

/// Routes packets to handlers by type name.
///
/// Built once per process role with [`Dispatcher::register`], then shared
/// read-only behind an `Arc`, so lookups take no lock. `C` is the context
/// handed to every handler.
pub struct Dispatcher<C> {
    handlers: HashMap<Cow<'static, str>, Box<HandlerFn<C>>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Bind `handler` to packets named `type_name`, replacing any earlier binding
    pub fn register<F, Fut>(&mut self, type_name: &'static str, handler: F) -> &mut Self
    where
        F: Fn(Arc<C>, Arc<Session>, Packet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.handlers.insert(
            Cow::Borrowed(type_name),
            Box::new(move |ctx, session, packet| Box::pin(handler(ctx, session, packet))),
        );
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.handlers.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler bound to the packet's type name
    pub async fn route(&self, ctx: Arc<C>, session: Arc<Session>, packet: Packet) -> Result<()> {
        let handler = self
            .handlers
            .get(packet.type_name())
            .ok_or_else(|| ProtocolError::UnknownPacketType(packet.type_name().to_string()))?;
        handler(ctx, session, packet).await
    }
}
