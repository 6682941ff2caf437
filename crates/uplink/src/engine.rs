//! Capacidade mínima exigida do motor do protocolo seguro.
//!
//! O cliente só conhece estes sinais: `WantRead`/`WantWrite` pedem que o
//! mesmo passo seja repetido; todo o resto encerra o ciclo.

use crate::transport::{StreamTransport, TransportError};
use crate::UplinkError;

/// Sinal de um passo do motor que não terminou com sucesso.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("motor aguarda dados do transporte")]
    WantRead,

    #[error("motor aguarda espaço no transporte")]
    WantWrite,

    /// Stream encerrado no meio do handshake.
    #[error("conexão fechada pelo servidor durante o handshake")]
    PeerClosed,

    /// Violação de protocolo, falha de autenticação, alerta do par.
    #[error("erro de protocolo: {0}")]
    Protocol(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl EngineError {
    /// `true` para sinais que só pedem mais I/O.
    pub fn is_retry(&self) -> bool {
        matches!(self, EngineError::WantRead | EngineError::WantWrite)
    }

    pub fn protocol<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EngineError::Protocol(Box::new(e))
    }
}

/// Máquina de estados handshake/record já ligada a um transporte.
pub trait SecureEngine {
    /// Avança o handshake. `Ok(())` = handshake concluído.
    fn handshake_step(&mut self) -> Result<(), EngineError>;

    /// Cifra e envia `buf`; devolve quantos bytes de aplicação saíram.
    fn write(&mut self, buf: &[u8]) -> Result<usize, EngineError>;

    /// Lê um chunk de dados de aplicação; `Ok(0)` = par encerrou.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError>;

    /// Libera estado do protocolo e fecha o transporte. Idempotente.
    fn close(&mut self);
}

/// Constrói um motor sobre um transporte recém-conectado.
pub trait EngineFactory<S> {
    type Engine: SecureEngine;

    fn attach(&self, transport: StreamTransport<S>) -> Result<Self::Engine, UplinkError>;
}
