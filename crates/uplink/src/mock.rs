//! Dublês de teste: stream roteirizado, resolver, conector e um motor
//! em texto puro que segue o mesmo contrato de sinais do motor TLS.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::{Connector, Resolver};
use crate::engine::{EngineError, EngineFactory, SecureEngine};
use crate::transport::{ByteStream, StreamTransport, Transport};
use crate::UplinkError;

/// Próximo resultado de `read` no [`MockStream`].
#[derive(Debug, Clone)]
pub enum Step {
    Data(Vec<u8>),
    WouldBlock,
    Interrupted,
    Fail(io::ErrorKind),
    Eof,
}

/// Stream em memória: leituras seguem o roteiro, escritas são gravadas.
#[derive(Debug)]
pub struct MockStream {
    reads: VecDeque<Step>,
    written: Arc<Mutex<Vec<u8>>>,
    closes: Arc<AtomicUsize>,
    write_limit: Option<usize>,
    write_error: Option<io::ErrorKind>,
}

impl MockStream {
    pub fn new(reads: Vec<Step>) -> Self {
        Self {
            reads: reads.into(),
            written: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
            write_limit: None,
            write_error: None,
        }
    }

    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    pub fn with_write_error(mut self, kind: io::ErrorKind) -> Self {
        self.write_error = Some(kind);
        self
    }

    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.written)
    }

    pub fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reads.pop_front() {
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.reads.push_front(Step::Data(data.split_off(n)));
                }
                Ok(n)
            }
            Some(Step::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
            Some(Step::Interrupted) => Err(io::ErrorKind::Interrupted.into()),
            Some(Step::Fail(kind)) => Err(kind.into()),
            Some(Step::Eof) | None => Ok(0),
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.write_error {
            return Err(kind.into());
        }
        let n = self.write_limit.map_or(buf.len(), |l| l.min(buf.len()));
        self.written.lock().unwrap().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteStream for MockStream {
    fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Resolver / conector
// ──────────────────────────────────────────────

pub struct StubResolver(pub io::Result<Vec<SocketAddr>>);

impl Resolver for StubResolver {
    fn resolve(&self, _host: &str, _port: u16) -> io::Result<Vec<SocketAddr>> {
        match &self.0 {
            Ok(addrs) => Ok(addrs.clone()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        }
    }
}

/// Aceita conexão só em `accept`; registra cada tentativa.
pub struct StubConnector {
    pub accept: Option<SocketAddr>,
    pub attempts: Mutex<Vec<SocketAddr>>,
    pub reads: Vec<Step>,
    pub written: Arc<Mutex<Vec<u8>>>,
    pub closes: Arc<AtomicUsize>,
}

impl StubConnector {
    pub fn new(accept: Option<SocketAddr>, reads: Vec<Step>) -> Self {
        Self {
            accept,
            attempts: Mutex::new(Vec::new()),
            reads,
            written: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> Vec<SocketAddr> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Connector for StubConnector {
    type Stream = MockStream;

    fn connect(&self, addr: &SocketAddr) -> io::Result<MockStream> {
        self.attempts.lock().unwrap().push(*addr);
        if Some(*addr) != self.accept {
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        let mut stream = MockStream::new(self.reads.clone());
        stream.written = Arc::clone(&self.written);
        stream.closes = Arc::clone(&self.closes);
        Ok(stream)
    }
}

// ──────────────────────────────────────────────
// Motor em texto puro
// ──────────────────────────────────────────────

/// "Handshake" = receber um byte qualquer do servidor; depois disso
/// escrita e leitura passam direto pelo transporte.
pub struct PlainEngine<T> {
    transport: T,
    pub steps: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

impl<T: Transport> PlainEngine<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            steps: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            closed: false,
        }
    }

    pub fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl<T: Transport> SecureEngine for PlainEngine<T> {
    fn handshake_step(&mut self) -> Result<(), EngineError> {
        self.steps.fetch_add(1, Ordering::SeqCst);
        let mut hello = [0u8; 1];
        match self.transport.recv(&mut hello) {
            Ok(0) => Err(EngineError::PeerClosed),
            Ok(_) => Ok(()),
            Err(e) if e.is_would_block() => Err(EngineError::WantRead),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, EngineError> {
        self.transport.send(buf).map_err(|e| {
            if e.is_would_block() {
                EngineError::WantWrite
            } else {
                e.into()
            }
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        self.transport.recv(buf).map_err(|e| {
            if e.is_would_block() {
                EngineError::WantRead
            } else {
                e.into()
            }
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.transport.shutdown();
    }
}

pub struct PlainFactory;

impl<S: ByteStream> EngineFactory<S> for PlainFactory {
    type Engine = PlainEngine<StreamTransport<S>>;

    fn attach(&self, transport: StreamTransport<S>) -> Result<Self::Engine, UplinkError> {
        Ok(PlainEngine::new(transport))
    }
}
