//! # Telemetry Uplink
//!
//! Cliente HTTPS bloqueante, um disparo por ciclo de report: resolve o
//! host, conecta no primeiro endereço que aceitar, conduz o handshake
//! TLS, envia um POST com o JSON e lê um único chunk de resposta.
//! Nenhum estado sobrevive ao ciclo (sem retomada de sessão).
//!
//! ## Módulos
//! - [`transport`] – `send`/`recv` sobre um stream de bytes
//! - [`engine`] – Contrato do motor do protocolo seguro
//! - [`tls`] – Motor rustls e modos de verificação
//! - [`request`] – Enquadramento HTTP/1.1 e leitura da resposta
//! - [`client`] – Máquina de estados do ciclo e cliente de produção

pub mod transport;
pub mod engine;
pub mod tls;
pub mod request;
pub mod client;

#[cfg(test)]
mod mock;

use std::io;

use telemetry_core::buffer::CapacityExceeded;

pub use client::{HttpsUplink, Target, UplinkClient, UplinkOutcome, UplinkState};
pub use engine::EngineError;
pub use request::{ApiAck, UplinkResponse};

/// Falhas de um ciclo do uplink. Nenhuma é fatal para o processo.
#[derive(Debug, thiserror::Error)]
pub enum UplinkError {
    #[error("falha ao resolver {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("resolver não devolveu nenhum endereço")]
    NoAddress,

    #[error("nenhum dos {attempts} endereço(s) aceitou conexão (último erro: {last})")]
    Connect { attempts: usize, last: io::Error },

    #[error("configuração TLS inválida: {0}")]
    Tls(String),

    #[error("requisição não cabe no buffer: {0}")]
    Request(#[from] CapacityExceeded),

    #[error("handshake falhou: {0}")]
    Handshake(#[source] EngineError),

    #[error("envio falhou: {0}")]
    Send(#[source] EngineError),

    #[error("nenhum byte enviado")]
    NothingSent,

    #[error("recepção falhou: {0}")]
    Receive(#[source] EngineError),

    #[error("sessão já encerrada")]
    Closed,
}

impl UplinkError {
    /// Nome curto da categoria, para logs e estatísticas.
    pub fn kind(&self) -> &'static str {
        match self {
            UplinkError::Resolve { .. } | UplinkError::NoAddress => "resolve",
            UplinkError::Connect { .. } => "connect",
            UplinkError::Tls(_) => "tls-config",
            UplinkError::Request(_) => "request",
            UplinkError::Handshake(_) => "handshake",
            UplinkError::Send(_) | UplinkError::NothingSent => "send",
            UplinkError::Receive(_) => "receive",
            UplinkError::Closed => "closed",
        }
    }
}

/// Entrega de um payload já codificado, uma tentativa por chamada.
pub trait Uplink {
    fn deliver(&self, payload: &[u8]) -> Result<UplinkOutcome, UplinkError>;
}
