//! Application state shared across API handlers

use std::sync::Arc;

use spot_core::{Address, AppConfig, Clock, Context, ManualClock, SystemClock, Timestamp};
use sudo_nft::{MemoryAmm, MemoryToken, Spot};
use tokio::sync::Mutex;

/// Engine over the in-memory token and AMM
pub type Engine = Spot<MemoryToken, MemoryAmm>;

/// Address of the simulated underlying token
pub const SIM_TOKEN: u64 = 0x70;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    engine: Mutex<Engine>,
    clock: Arc<ManualClock>,
}

impl AppState {
    /// Fresh engine whose clock starts at wall-clock time and then only moves
    /// through `/sim/advance`
    pub fn new(config: AppConfig) -> Self {
        let clock = Arc::new(ManualClock::new(SystemClock.now()));
        Self::with_clock(config, clock)
    }

    pub fn with_clock(config: AppConfig, clock: Arc<ManualClock>) -> Self {
        let engine = Spot::new(
            config.protocol.clone(),
            MemoryToken::new(Address::from_u64(SIM_TOKEN)),
            MemoryAmm::new(),
        );
        tracing::info!(
            vault = %config.protocol.vault_address,
            wrapper = %config.protocol.wrapper_address,
            now = clock.now(),
            "Engine created"
        );
        Self {
            inner: Arc::new(AppStateInner {
                config,
                engine: Mutex::new(engine),
                clock,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn engine(&self) -> &Mutex<Engine> {
        &self.inner.engine
    }

    pub fn clock(&self) -> &ManualClock {
        &self.inner.clock
    }

    pub fn now(&self) -> Timestamp {
        self.inner.clock.now()
    }

    /// Call context for `caller` at the current time
    pub fn context(&self, caller: Address) -> Context {
        Context::from_clock(caller, self.inner.clock.as_ref())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
