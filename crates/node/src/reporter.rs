//! Reporter – snapshot → JSON → um ciclo de uplink, a cada período.
//!
//! Um ciclo por vez: se o uplink demorar mais que o período, o próximo
//! tick só atrasa (nada fica enfileirado).

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use telemetry_core::buffer::PayloadBuffer;
use telemetry_core::{SharedTelemetryStore, encode};
use telemetry_uplink::{Uplink, UplinkOutcome};
use tracing::{error, info, warn};

/// Resultado resumido de um ciclo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Delivered,
    PeerClosed,
    Failed,
}

/// Contadores acumulados do reporter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    pub cycles: u64,
    pub delivered: u64,
    pub peer_closed: u64,
    pub failed: u64,
}

pub struct Reporter<U> {
    store: Arc<SharedTelemetryStore>,
    uplink: U,
    period: Duration,
    payload: PayloadBuffer,
    stats: ReporterStats,
}

impl<U: Uplink> Reporter<U> {
    pub fn new(store: Arc<SharedTelemetryStore>, uplink: U, period: Duration) -> Self {
        Self {
            store,
            uplink,
            period,
            payload: PayloadBuffer::new(),
            stats: ReporterStats::default(),
        }
    }

    /// Executa um ciclo completo e registra o resultado.
    pub fn run_cycle(&mut self) -> Cycle {
        let started = Instant::now();
        let snapshot = self.store.snapshot();
        self.stats.cycles += 1;
        let n = self.stats.cycles;

        let cycle = match encode(&snapshot, &mut self.payload) {
            Err(e) => {
                error!("#{n} payload não codificado: {e}");
                Cycle::Failed
            }
            Ok(len) => match self.uplink.deliver(self.payload.as_bytes()) {
                Ok(UplinkOutcome::Delivered(resp)) => {
                    let status = resp.status.map_or_else(|| "?".to_string(), |s| s.to_string());
                    let id = resp.ack().and_then(|a| a.id).unwrap_or_else(|| "-".into());
                    if resp.is_success() {
                        info!(
                            "#{n} → {len} bytes | HTTP {status} | id {id} | T {:.2}°C H {:.2}% VOC {} | {:?}",
                            snapshot.temperature,
                            snapshot.humidity,
                            snapshot.voc,
                            started.elapsed()
                        );
                    } else {
                        warn!("#{n} → {len} bytes | HTTP {status} | resposta: {} bytes", resp.received);
                    }
                    Cycle::Delivered
                }
                Ok(UplinkOutcome::PeerClosed) => {
                    warn!("#{n} → {len} bytes | servidor fechou sem responder");
                    Cycle::PeerClosed
                }
                Err(e) => {
                    error!("#{n} uplink falhou [{}]: {e}", e.kind());
                    Cycle::Failed
                }
            },
        };

        match cycle {
            Cycle::Delivered => self.stats.delivered += 1,
            Cycle::PeerClosed => self.stats.peer_closed += 1,
            Cycle::Failed => self.stats.failed += 1,
        }
        cycle
    }

    /// Loop periódico até o canal de shutdown fechar.
    pub fn run(mut self, shutdown: Receiver<()>) -> ReporterStats {
        info!("Reporter iniciado (período {:?})", self.period);

        loop {
            match shutdown.recv_timeout(self.period) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            self.run_cycle();
        }

        let s = self.stats;
        info!(
            "Reporter encerrado: {} ciclos | {} entregues | {} sem resposta | {} falhas",
            s.cycles, s.delivered, s.peer_closed, s.failed
        );
        s
    }
}

impl<U: Uplink + Send + 'static> Reporter<U> {
    pub fn spawn(self, shutdown: Receiver<()>) -> io::Result<JoinHandle<ReporterStats>> {
        thread::Builder::new()
            .name("reporter".into())
            .spawn(move || self.run(shutdown))
    }
}
