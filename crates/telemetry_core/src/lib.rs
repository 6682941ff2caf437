//! # Telemetry Core
//!
//! Crate compartilhada do nó de telemetria: estruturas de dados, store
//! concorrente, buffers de capacidade fixa, codificação JSON do payload
//! e configuração TOML.
//!
//! ## Módulos
//! - [`types`] – Snapshot de telemetria e leituras tipadas por sensor
//! - [`store`] – Store compartilhado (um lock, updates por grupo)
//! - [`buffer`] – Buffers fixos para payload, requisição e resposta
//! - [`payload`] – Encoder snapshot → JSON
//! - [`config`] – Configuração unificada via TOML

pub mod types;
pub mod store;
pub mod buffer;
pub mod payload;
pub mod config;

// Re-exports convenientes
pub use types::TelemetrySnapshot;
pub use store::{FieldUpdate, SharedTelemetryStore, StoreMiss};
pub use payload::{encode, EncodeError};
pub use config::{NodeConfig, UplinkConfig, VerifyMode};
