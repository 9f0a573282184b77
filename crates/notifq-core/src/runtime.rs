use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{NotificationEntry, NotificationKey};
use crate::error::{HandlerError, NotifqError};
use crate::ports::{JsonKeyCodec, KeyCodec};

/// Handler invoked by the dispatcher for every ready entry.
///
/// Takes the whole entry so the handler can decode the key as it likes and
/// still see the owner, token and fire time.
#[async_trait]
pub trait NotificationQueueHandler: Send + Sync {
    async fn handle_ready_notification(&self, entry: &NotificationEntry) -> Result<(), HandlerError>;
}

/// Typed handler for one key type.
#[async_trait]
pub trait KeyHandler<K: NotificationKey>: Send + Sync {
    async fn handle(&self, key: K, entry: &NotificationEntry) -> Result<(), HandlerError>;
}

/// Object-safe wrapper so typed handlers fit in one map.
struct TypedKeyHandler<K, H, C> {
    handler: H,
    codec: Arc<C>,
    _marker: PhantomData<fn() -> K>,
}

#[async_trait]
impl<K, H, C> NotificationQueueHandler for TypedKeyHandler<K, H, C>
where
    K: NotificationKey,
    H: KeyHandler<K>,
    C: KeyCodec + 'static,
{
    async fn handle_ready_notification(&self, entry: &NotificationEntry) -> Result<(), HandlerError> {
        let key: K = entry.decode_key(self.codec.as_ref())?;
        self.handler.handle(key, entry).await
    }
}

/// Registry of handlers (key_type -> handler).
///
/// Design:
/// - Built during initialization (mutable).
/// - Used during runtime (immutable, shared through `Arc`).
///
/// The registry itself is a `NotificationQueueHandler`, so one queue can serve
/// several key types. Typed handlers decode keys with the registry's codec,
/// which must be the codec the queue's store encodes with.
pub struct HandlerRegistry<C = JsonKeyCodec> {
    handlers: HashMap<String, Arc<dyn NotificationQueueHandler>>,
    codec: Arc<C>,
}

impl HandlerRegistry<JsonKeyCodec> {
    pub fn new() -> Self {
        Self::with_codec(JsonKeyCodec)
    }
}

impl Default for HandlerRegistry<JsonKeyCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: KeyCodec + 'static> HandlerRegistry<C> {
    pub fn with_codec(codec: C) -> Self {
        Self {
            handlers: HashMap::new(),
            codec: Arc::new(codec),
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Register a typed handler; keys are decoded with the registry's codec.
    pub fn register<K, H>(&mut self, handler: H) -> Result<(), NotifqError>
    where
        K: NotificationKey,
        H: KeyHandler<K> + 'static,
    {
        let typed = TypedKeyHandler {
            handler,
            codec: Arc::clone(&self.codec),
            _marker: PhantomData::<fn() -> K>,
        };
        self.register_raw(K::KEY_TYPE, Arc::new(typed))
    }

    /// Register an untyped handler for `key_type`.
    pub fn register_raw(
        &mut self,
        key_type: &str,
        handler: Arc<dyn NotificationQueueHandler>,
    ) -> Result<(), NotifqError> {
        if self.handlers.contains_key(key_type) {
            return Err(NotifqError::DuplicateHandler(key_type.to_string()));
        }
        self.handlers.insert(key_type.to_string(), handler);
        Ok(())
    }

    pub fn get(&self, key_type: &str) -> Option<&Arc<dyn NotificationQueueHandler>> {
        self.handlers.get(key_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl<C: KeyCodec + 'static> NotificationQueueHandler for HandlerRegistry<C> {
    async fn handle_ready_notification(&self, entry: &NotificationEntry) -> Result<(), HandlerError> {
        let handler = self.get(entry.key_type()).ok_or_else(|| {
            HandlerError::Permanent(format!("handler not found for key_type={}", entry.key_type()))
        })?;
        handler.handle_ready_notification(entry).await
    }
}

/// Adapter for plain closures, handy in tests and demos.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> NotificationQueueHandler for FnHandler<F>
where
    F: Fn(&NotificationEntry) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle_ready_notification(&self, entry: &NotificationEntry) -> Result<(), HandlerError> {
        (self.0)(entry)
    }
}
