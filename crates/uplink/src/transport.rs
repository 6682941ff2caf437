//! Adaptador de transporte: liga `send`/`recv` a um stream de bytes.
//!
//! É todo o contrato de que o motor TLS depende para decidir entre
//! repetir um passo (would-block) ou abortar (falha dura). `recv` com
//! `Ok(0)` significa que o par fechou a conexão, o que não é erro.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// Classificação de uma operação de transporte que não transferiu bytes.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Indisponibilidade transitória; repetir a mesma operação.
    #[error("operação bloquearia")]
    WouldBlock,

    #[error("falha ao enviar: {0}")]
    SendFailed(#[source] io::Error),

    #[error("falha ao receber: {0}")]
    RecvFailed(#[source] io::Error),
}

impl TransportError {
    pub fn is_would_block(&self) -> bool {
        matches!(self, TransportError::WouldBlock)
    }
}

impl From<TransportError> for io::Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::WouldBlock => io::ErrorKind::WouldBlock.into(),
            TransportError::SendFailed(e) | TransportError::RecvFailed(e) => e,
        }
    }
}

/// Par de primitivas consumido pelo motor do protocolo seguro.
pub trait Transport {
    /// Envia o quanto o stream aceitar numa tentativa.
    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Lê até `buf.len()` bytes numa tentativa; `Ok(0)` = par fechou.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Fecha o stream subjacente. Idempotente.
    fn shutdown(&mut self) {}
}

/// Stream de bytes conectado que sabe se encerrar.
pub trait ByteStream: Read + Write {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteStream for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

/// [`Transport`] sobre qualquer [`ByteStream`] bloqueante.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
    closed: bool,
}

impl<S: ByteStream> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

impl<S: ByteStream> Transport for StreamTransport<S> {
    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        self.stream.write(buf).map_err(|e| {
            if is_transient(&e) {
                TransportError::WouldBlock
            } else {
                TransportError::SendFailed(e)
            }
        })
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.stream.read(buf).map_err(|e| {
            if is_transient(&e) {
                TransportError::WouldBlock
            } else {
                TransportError::RecvFailed(e)
            }
        })
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // NotConnected aqui só significa que o par já fechou
        if let Err(e) = self.stream.close() {
            tracing::debug!("shutdown do stream: {e}");
        }
    }
}

/// Visão `io::Read + io::Write` de um [`Transport`], para o motor TLS.
pub(crate) struct TransportIo<'a, T: ?Sized>(pub &'a mut T);

impl<T: Transport + ?Sized> Read for TransportIo<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.0.recv(buf)?)
    }
}

impl<T: Transport + ?Sized> Write for TransportIo<'_, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.0.send(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockStream, Step};

    #[test]
    fn send_reports_accepted_count() {
        let stream = MockStream::new(vec![]).with_write_limit(4);
        let written = stream.written();
        let mut t = StreamTransport::new(stream);
        assert_eq!(t.send(b"abcdefgh").unwrap(), 4);
        assert_eq!(&*written.lock().unwrap(), b"abcd");
    }

    #[test]
    fn recv_classifies_each_condition() {
        let mut t = StreamTransport::new(MockStream::new(vec![
            Step::WouldBlock,
            Step::Interrupted,
            Step::Data(b"ola".to_vec()),
            Step::Fail(io::ErrorKind::ConnectionReset),
            Step::Eof,
        ]));
        let mut buf = [0u8; 16];

        assert!(t.recv(&mut buf).unwrap_err().is_would_block());
        assert!(t.recv(&mut buf).unwrap_err().is_would_block());
        assert_eq!(t.recv(&mut buf).unwrap(), 3);
        assert!(matches!(
            t.recv(&mut buf),
            Err(TransportError::RecvFailed(e)) if e.kind() == io::ErrorKind::ConnectionReset
        ));
        // par fechou: zero bytes, sem erro
        assert_eq!(t.recv(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_timeout_is_transient() {
        // timeout de leitura do socket: Windows devolve TimedOut, Unix WouldBlock
        let mut t = StreamTransport::new(MockStream::new(vec![
            Step::Fail(io::ErrorKind::TimedOut),
            Step::Data(b"x".to_vec()),
        ]));
        let mut buf = [0u8; 4];
        assert!(t.recv(&mut buf).unwrap_err().is_would_block());
        assert_eq!(t.recv(&mut buf).unwrap(), 1);

        let stream = MockStream::new(vec![]).with_write_error(io::ErrorKind::TimedOut);
        assert!(StreamTransport::new(stream).send(b"x").unwrap_err().is_would_block());
    }

    #[test]
    fn send_failure_is_hard_error() {
        let stream = MockStream::new(vec![]).with_write_error(io::ErrorKind::BrokenPipe);
        let mut t = StreamTransport::new(stream);
        assert!(matches!(t.send(b"x"), Err(TransportError::SendFailed(_))));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let stream = MockStream::new(vec![]);
        let closes = stream.close_count();
        let mut t = StreamTransport::new(stream);
        t.shutdown();
        t.shutdown();
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn io_view_preserves_would_block() {
        let mut t = StreamTransport::new(MockStream::new(vec![Step::WouldBlock]));
        let mut buf = [0u8; 4];
        let err = TransportIo(&mut t).read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}
