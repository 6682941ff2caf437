//! Produtor de medição – um por fonte, período fixo, last-write-wins.
//!
//! Cada tick: (1) lock do barramento, se a fonte estiver em um;
//! (2) leitura do driver; (3) solta o barramento; (4) update no store com
//! espera limitada. O lock do barramento nunca está seguro enquanto se
//! espera pelo lock do store.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use telemetry_core::SharedTelemetryStore;
use telemetry_core::store::lock_within;
use tracing::{debug, info, warn};

use crate::drivers::SensorDriver;

/// Exclusão mútua de um barramento físico compartilhado.
#[derive(Debug, Clone)]
pub struct BusLock {
    name: &'static str,
    inner: Arc<Mutex<()>>,
}

impl BusLock {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `None` se o barramento não ficou livre dentro de `wait`.
    pub fn acquire(&self, wait: Option<Duration>) -> Option<MutexGuard<'_, ()>> {
        lock_within(&self.inner, wait)
    }
}

/// O que aconteceu em um tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Updated,
    ReadFailed,
    BusBusy,
    StoreMiss,
}

/// Contadores de um produtor ao longo da vida da thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub ticks: u64,
    pub updated: u64,
    pub read_failed: u64,
    pub bus_busy: u64,
    pub store_miss: u64,
}

impl ProducerStats {
    fn record(&mut self, tick: Tick) {
        self.ticks += 1;
        match tick {
            Tick::Updated => self.updated += 1,
            Tick::ReadFailed => self.read_failed += 1,
            Tick::BusBusy => self.bus_busy += 1,
            Tick::StoreMiss => self.store_miss += 1,
        }
    }
}

pub struct Producer<D> {
    driver: D,
    bus: Option<(BusLock, Option<Duration>)>,
    store: Arc<SharedTelemetryStore>,
    period: Duration,
    store_wait: Duration,
    stats: ProducerStats,
}

impl<D: SensorDriver> Producer<D> {
    pub fn new(driver: D, store: Arc<SharedTelemetryStore>, period: Duration, store_wait: Duration) -> Self {
        Self {
            driver,
            bus: None,
            store,
            period,
            store_wait,
            stats: ProducerStats::default(),
        }
    }

    /// Coloca a fonte num barramento compartilhado (`wait = None`: sem limite).
    pub fn on_bus(mut self, bus: BusLock, wait: Option<Duration>) -> Self {
        self.bus = Some((bus, wait));
        self
    }

    pub fn name(&self) -> &'static str {
        self.driver.name()
    }

    /// Um ciclo completo de leitura + publicação.
    pub fn tick(&mut self) -> Tick {
        let tick = self.step();
        self.stats.record(tick);
        tick
    }

    fn step(&mut self) -> Tick {
        let name = self.driver.name();

        let reading = {
            let _guard = match &self.bus {
                Some((bus, wait)) => match bus.acquire(*wait) {
                    Some(guard) => Some(guard),
                    None => {
                        debug!("{name}: barramento {} ocupado, tick pulado", bus.name());
                        return Tick::BusBusy;
                    }
                },
                None => None,
            };
            self.driver.read()
        };

        let update = match reading {
            Ok(r) => r.into(),
            Err(e) => {
                debug!("{e}");
                return Tick::ReadFailed;
            }
        };

        match self.store.update(update, self.store_wait) {
            Ok(()) => Tick::Updated,
            Err(miss) => {
                warn!("{miss}");
                Tick::StoreMiss
            }
        }
    }

    /// Loop periódico até o canal de shutdown fechar.
    pub fn run(mut self, shutdown: Receiver<()>) -> ProducerStats {
        let name = self.name();
        info!("Produtor '{name}' iniciado (período {:?})", self.period);

        loop {
            self.tick();
            match shutdown.recv_timeout(self.period) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let s = self.stats;
        info!(
            "Produtor '{name}' encerrado: {} ticks | {} updates | {} falhas de leitura | {} barramento ocupado | {} store ocupado",
            s.ticks, s.updated, s.read_failed, s.bus_busy, s.store_miss
        );
        s
    }
}

impl<D: SensorDriver + 'static> Producer<D> {
    /// Roda [`run`](Self::run) numa thread nomeada `producer-<fonte>`.
    pub fn spawn(self, shutdown: Receiver<()>) -> io::Result<JoinHandle<ProducerStats>> {
        thread::Builder::new()
            .name(format!("producer-{}", self.name()))
            .spawn(move || self.run(shutdown))
    }
}
