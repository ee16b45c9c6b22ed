//! Registry mapping dispatch keys to command handlers

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

use super::{CommandHandler, CommandHandlerKey};
use crate::{ProfilingError, Result};

/// Maps `(packet id, version)` keys to shared handlers.
///
/// Registration is expected during session setup and lookups afterwards; both are safe
/// from any thread. Iteration follows key order.
#[derive(Default)]
pub struct CommandHandlerRegistry {
    handlers: RwLock<BTreeMap<CommandHandlerKey, Arc<dyn CommandHandler>>>,
}

impl CommandHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `(packet_id, version)`, replacing any previous entry.
    pub fn register_handler(
        &self,
        handler: Arc<dyn CommandHandler>,
        packet_id: u32,
        version: u32,
    ) {
        let key = CommandHandlerKey::new(packet_id, version);
        let previous = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, handler);

        if previous.is_some() {
            debug!(%key, "Replaced command handler");
        } else {
            debug!(%key, "Registered command handler");
        }
    }

    /// Register `handler` under its own key.
    pub fn register(&self, handler: Arc<dyn CommandHandler>) {
        let key = handler.key();
        self.register_handler(handler, key.packet_id(), key.version());
    }

    /// Remove the handler registered under `(packet_id, version)`, returning it.
    pub fn unregister_handler(
        &self,
        packet_id: u32,
        version: u32,
    ) -> Option<Arc<dyn CommandHandler>> {
        let key = CommandHandlerKey::new(packet_id, version);
        let removed =
            self.handlers.write().unwrap_or_else(PoisonError::into_inner).remove(&key);
        if removed.is_some() {
            debug!(%key, "Unregistered command handler");
        }
        removed
    }

    /// Look up the handler registered for exactly `(packet_id, version)`.
    pub fn get_handler(&self, packet_id: u32, version: u32) -> Result<Arc<dyn CommandHandler>> {
        let key = CommandHandlerKey::new(packet_id, version);
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);

        match handlers.get(&key) {
            Some(handler) => {
                trace!(%key, "Resolved command handler");
                Ok(Arc::clone(handler))
            }
            None => Err(ProfilingError::handler_not_found(packet_id, version)),
        }
    }

    /// Registered keys in ascending order.
    pub fn keys(&self) -> Vec<CommandHandlerKey> {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CommandHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandlerRegistry").field("keys", &self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Packet;
    use std::sync::atomic::{AtomicU32, Ordering};

    const VERSION: u32 = 1;

    /// Counts the packets it receives.
    #[derive(Debug)]
    struct CountingHandler {
        packet_id: u32,
        version: u32,
        count: AtomicU32,
    }

    impl CountingHandler {
        fn new(packet_id: u32, version: u32) -> Arc<Self> {
            Arc::new(Self { packet_id, version, count: AtomicU32::new(0) })
        }

        fn count(&self) -> u32 {
            self.count.load(Ordering::SeqCst)
        }
    }

    impl CommandHandler for CountingHandler {
        fn packet_id(&self) -> u32 {
            self.packet_id
        }

        fn version(&self) -> u32 {
            self.version
        }

        fn handle(&self, _packet: &Packet<'_>) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// A second handler variant that counts by payload length instead.
    #[derive(Debug)]
    struct PayloadCountingHandler {
        inner: Arc<CountingHandler>,
        bytes: AtomicU32,
    }

    impl CommandHandler for PayloadCountingHandler {
        fn packet_id(&self) -> u32 {
            self.inner.packet_id()
        }

        fn version(&self) -> u32 {
            self.inner.version()
        }

        fn handle(&self, packet: &Packet<'_>) -> Result<()> {
            self.bytes.fetch_add(packet.length(), Ordering::SeqCst);
            self.inner.handle(packet)
        }
    }

    fn dispatch(registry: &CommandHandlerRegistry, header: u32) {
        let packet = Packet::new(header, 0, None).unwrap();
        registry.get_handler(packet.packet_id(), VERSION).unwrap().handle(&packet).unwrap();
    }

    #[test]
    fn dispatch_reaches_only_the_matching_handler() {
        let handler_a = CountingHandler::new(461, VERSION);
        let handler_b = CountingHandler::new(963, VERSION);
        let handler_c = Arc::new(PayloadCountingHandler {
            inner: CountingHandler::new(983, VERSION),
            bytes: AtomicU32::new(0),
        });

        let registry = CommandHandlerRegistry::new();
        registry.register(handler_b.clone());
        registry.register(handler_a.clone());
        registry.register(handler_c.clone());

        assert_eq!(
            registry.keys(),
            vec![
                CommandHandlerKey::new(461, VERSION),
                CommandHandlerKey::new(963, VERSION),
                CommandHandlerKey::new(983, VERSION),
            ]
        );

        dispatch(&registry, 500_000_000);
        assert_eq!((handler_a.count(), handler_b.count(), handler_c.inner.count()), (1, 0, 0));

        dispatch(&registry, 600_000_000);
        assert_eq!((handler_a.count(), handler_b.count(), handler_c.inner.count()), (1, 1, 0));

        dispatch(&registry, 400_000_000);
        assert_eq!((handler_a.count(), handler_b.count(), handler_c.inner.count()), (1, 1, 1));
    }

    #[test]
    fn unregistered_key_stops_dispatching() {
        let handler = CountingHandler::new(461, VERSION);
        let other = CountingHandler::new(963, VERSION);

        let registry = CommandHandlerRegistry::new();
        registry.register(handler.clone());
        registry.register(other.clone());

        assert!(registry.unregister_handler(461, VERSION).is_some());
        assert!(registry.unregister_handler(461, VERSION).is_none());
        assert!(matches!(
            registry.get_handler(461, VERSION),
            Err(ProfilingError::HandlerNotFound { packet_id: 461, .. })
        ));

        dispatch(&registry, 600_000_000);
        assert_eq!((handler.count(), other.count()), (0, 1));
    }

    #[test]
    fn reregistering_a_key_redirects_dispatch() {
        let handler_a = CountingHandler::new(461, VERSION);
        let handler_c = CountingHandler::new(983, VERSION);

        let registry = CommandHandlerRegistry::new();
        registry.register(handler_a.clone());
        registry.register(handler_c.clone());

        registry.register_handler(handler_c.clone(), handler_a.packet_id(), VERSION);
        assert_eq!(registry.len(), 2);

        dispatch(&registry, 500_000_000);
        assert_eq!(handler_a.count(), 0);
        assert_eq!(handler_c.count(), 1);
    }

    #[test]
    fn missing_key_is_handler_not_found() {
        let registry = CommandHandlerRegistry::new();
        assert!(registry.is_empty());
        registry.register(CountingHandler::new(461, VERSION));

        assert!(matches!(
            registry.get_handler(0, 0),
            Err(ProfilingError::HandlerNotFound { packet_id: 0, version: 0 })
        ));
        // No fuzzy matching on version
        assert!(registry.get_handler(461, VERSION + 1).is_err());
    }

    #[test]
    fn concurrent_registration_and_lookup() {
        let registry = Arc::new(CommandHandlerRegistry::new());

        let handles: Vec<_> = (0..16u32)
            .map(|id| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register(CountingHandler::new(id, VERSION));
                    registry.get_handler(id, VERSION).map(|handler| handler.packet_id())
                })
            })
            .collect();

        for (id, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap().unwrap(), id as u32);
        }
        assert_eq!(registry.len(), 16);
    }
}
