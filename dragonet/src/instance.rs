//! Process-wide broker instance

use dragonet_transport::{Transport, TransportError};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::once_lock::OnceLock;

use crate::broker::Broker;
use crate::config::Config;
use crate::task::Task;

/// Lazily initialized broker for firmware that keeps it in a `static`
///
/// ```ignore
/// static DRAGONET: Dragonet<CriticalSectionRawMutex, Rpmsg> = Dragonet::new();
///
/// let broker = DRAGONET.init(Rpmsg::remote_init, Config::default())?;
/// broker.wait_link_up().await;
/// let mut task = broker.task();
/// ```
pub struct Dragonet<M: RawMutex, T: Transport> {
    broker: OnceLock<Broker<M, T>>,
}

impl<M: RawMutex + Send + Sync + 'static, T: Transport> Dragonet<M, T> {
    pub const fn new() -> Self {
        Self {
            broker: OnceLock::new(),
        }
    }

    /// Constructs the broker on the first call and returns it.
    ///
    /// Idempotent and safe to call from many tasks: construction runs inside a critical section,
    /// so `transport` is called at most once. A failed construction leaves the instance
    /// uninitialized.
    pub fn init(
        &self,
        transport: impl FnOnce() -> T,
        config: Config,
    ) -> Result<&Broker<M, T>, TransportError> {
        if let Some(broker) = self.broker.try_get() {
            return Ok(broker);
        }

        critical_section::with(|_| {
            if let Some(broker) = self.broker.try_get() {
                return Ok(broker);
            }
            let broker = Broker::new(transport(), config)?;
            Ok(self.broker.get_or_init(|| broker))
        })
    }

    pub fn broker(&self) -> Option<&Broker<M, T>> {
        self.broker.try_get()
    }

    /// Creates a task handle, or None before `init`.
    pub fn task(&self) -> Option<Task<'_, M, T>> {
        self.broker().map(Broker::task)
    }
}

impl<M: RawMutex + Send + Sync + 'static, T: Transport> Default for Dragonet<M, T> {
    fn default() -> Self {
        Self::new()
    }
}
