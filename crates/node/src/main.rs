//! # Telemetry Node
//!
//! Cinco produtores (clima, VOC, movimento, luz, som) publicam no store
//! compartilhado; o reporter envia o snapshot em JSON via HTTPS a cada
//! período.
//!
//! ## Uso
//! ```bash
//! telemetry_node                        # Normal (Ctrl-C encerra)
//! telemetry_node --config ./node.toml   # Config alternativo
//! telemetry_node --once                 # Um único report e sai
//! telemetry_node --print-config         # Mostra config efetivo
//! ```

mod drivers;
mod producer;
mod reporter;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{Receiver, bounded};
use drivers::{Faulty, SimulatedClimate, SimulatedImu, SimulatedLight, SimulatedSound, SimulatedVoc};
use producer::{BusLock, Producer, ProducerStats};
use reporter::{Cycle, Reporter};
use telemetry_core::config::ProducerConfig;
use telemetry_core::{NodeConfig, SharedTelemetryStore, VerifyMode};
use telemetry_uplink::HttpsUplink;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "telemetry_node", version, about = "Nó de telemetria com uplink HTTPS")]
struct Args {
    /// Caminho do config.toml (padrão: ao lado do executável)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Aquece os produtores, faz um único report e sai
    #[arg(long)]
    once: bool,

    /// Imprime a configuração efetiva em TOML e sai
    #[arg(long)]
    print_config: bool,
}

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    // ── Carregar config ──
    let config_path = args.config.clone().unwrap_or_else(NodeConfig::default_path);
    let config = NodeConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    if args.print_config {
        return match toml::to_string_pretty(&config) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Falha ao serializar config: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let problems = config.validate();
    if !problems.is_empty() {
        for p in &problems {
            error!("Config inválido: {p}");
        }
        return ExitCode::FAILURE;
    }

    let up = &config.uplink;
    if up.verify == VerifyMode::Advisory {
        warn!("Verificação TLS em modo ADVISORY: certificado do servidor não é imposto (uplink.verify = \"strict\" para exigir)");
    }

    // ── Uplink ──
    let uplink = match HttpsUplink::from_config(up) {
        Ok(u) => u,
        Err(e) => {
            error!("Uplink inutilizável: {e}");
            return ExitCode::FAILURE;
        }
    };

    // ── Banner ──
    let p = &config.producers;
    println!();
    println!("══════════════════════════════════════════════");
    println!("   📡 TELEMETRY NODE – ATIVO (Rust)");
    println!("══════════════════════════════════════════════");
    println!("  Destino:    https://{}{}", uplink.target().host_header(), up.path);
    println!("  TLS:        {}{}", up.verify, if up.ca_file.is_empty() { String::new() } else { format!(" (CA {})", up.ca_file) });
    println!("  Intervalo:  {:.1}s", config.reporter.interval_secs);
    println!(
        "  Produtores: clima {}ms | voc {}ms | movimento {}ms | luz {}ms | som {}ms",
        p.climate_period_ms, p.voc_period_ms, p.motion_period_ms, p.light_period_ms, p.sound_period_ms
    );
    println!("══════════════════════════════════════════════");
    println!();

    // ── Threads ──
    let store = Arc::new(SharedTelemetryStore::new());
    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

    let producers = match spawn_producers(p, &store, &shutdown_rx) {
        Ok(handles) => handles,
        Err(e) => {
            error!("Falha ao criar thread de produtor: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut reporter = Reporter::new(Arc::clone(&store), uplink, config.reporter.interval());

    if args.once {
        // um período extra de folga para todo produtor publicar ao menos uma vez
        thread::sleep(p.longest_period() * 2);
        let cycle = reporter.run_cycle();
        drop(shutdown_tx);
        join_producers(producers);
        return if cycle == Cycle::Failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    let reporter = match reporter.spawn(shutdown_rx) {
        Ok(h) => h,
        Err(e) => {
            error!("Falha ao criar thread do reporter: {e}");
            return ExitCode::FAILURE;
        }
    };

    // ── Ctrl-C ──
    let (signal_tx, signal_rx) = bounded::<()>(1);
    let handler_tx = signal_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = handler_tx.try_send(());
    }) {
        warn!("Handler de Ctrl-C indisponível ({e}); encerre o processo externamente");
    }
    let _ = signal_rx.recv();
    info!("Ctrl-C recebido, encerrando...");

    drop(shutdown_tx);
    join_producers(producers);
    if reporter.join().is_err() {
        error!("Thread do reporter terminou com pânico");
    }

    ExitCode::SUCCESS
}

fn spawn_producers(
    cfg: &ProducerConfig,
    store: &Arc<SharedTelemetryStore>,
    shutdown: &Receiver<()>,
) -> io::Result<Vec<JoinHandle<ProducerStats>>> {
    let i2c = BusLock::new("i2c");
    let adc = BusLock::new("adc");
    let bus_wait = cfg.bus_lock_timeout();
    let store_wait = cfg.store_lock_timeout();
    let ms = Duration::from_millis;
    let every = cfg.fault_every;

    Ok(vec![
        Producer::new(Faulty::new(SimulatedClimate::new(), every), Arc::clone(store), ms(cfg.climate_period_ms), store_wait)
            .on_bus(i2c.clone(), bus_wait)
            .spawn(shutdown.clone())?,
        Producer::new(Faulty::new(SimulatedVoc::new(), every), Arc::clone(store), ms(cfg.voc_period_ms), store_wait)
            .on_bus(i2c.clone(), bus_wait)
            .spawn(shutdown.clone())?,
        Producer::new(Faulty::new(SimulatedImu::new(), every), Arc::clone(store), ms(cfg.motion_period_ms), store_wait)
            .on_bus(i2c, bus_wait)
            .spawn(shutdown.clone())?,
        Producer::new(Faulty::new(SimulatedLight::new(), every), Arc::clone(store), ms(cfg.light_period_ms), store_wait)
            .on_bus(adc.clone(), bus_wait)
            .spawn(shutdown.clone())?,
        Producer::new(Faulty::new(SimulatedSound::new(), every), Arc::clone(store), ms(cfg.sound_period_ms), store_wait)
            .on_bus(adc, bus_wait)
            .spawn(shutdown.clone())?,
    ])
}

fn join_producers(handles: Vec<JoinHandle<ProducerStats>>) {
    for h in handles {
        let name = h.thread().name().unwrap_or("producer").to_string();
        if h.join().is_err() {
            error!("Thread {name} terminou com pânico");
        }
    }
}
