//! Cliente do uplink: um POST por ciclo, do zero até `Closed`.
//!
//! ```text
//! Disconnected → Connecting → Handshaking → Ready → Sending → Receiving → Closed
//!                     └────────────┴───────────┴────────┴──────────┴──────→ Closed
//! ```
//!
//! Todo recurso adquirido em `Connecting`/`Handshaking` pertence a uma
//! [`Session`]; soltá-la (por `?`, retorno normal ou `close`) sempre
//! fecha motor e socket, uma única vez.

use std::borrow::Cow;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use telemetry_core::buffer::{RequestBuffer, ResponseBuffer};
use telemetry_core::config::UplinkConfig;
use tracing::{debug, warn};

use crate::engine::{EngineError, EngineFactory, SecureEngine};
use crate::request::{UplinkResponse, frame_request};
use crate::tls::TlsEngineFactory;
use crate::transport::{ByteStream, StreamTransport};
use crate::{Uplink, UplinkError};

/// Estados de um ciclo do uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkState {
    Disconnected,
    Connecting,
    Handshaking,
    Ready,
    Sending,
    Receiving,
    Closed,
}

/// Resultado não-fatal de um ciclo.
#[derive(Debug, Clone, PartialEq)]
pub enum UplinkOutcome {
    /// Servidor respondeu (um único chunk).
    Delivered(UplinkResponse),
    /// Servidor fechou sem mandar bytes.
    PeerClosed,
}

// ──────────────────────────────────────────────
// Resolução e conexão
// ──────────────────────────────────────────────

/// host + porta → endereços na ordem do resolver.
pub trait Resolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Resolver do sistema (`getaddrinfo`), IPv4 e IPv6.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok((host, port).to_socket_addrs()?.collect())
    }
}

/// Abre um stream de bytes para um endereço.
pub trait Connector {
    type Stream: ByteStream;

    fn connect(&self, addr: &SocketAddr) -> io::Result<Self::Stream>;
}

/// Conector TCP bloqueante.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector {
    pub timeout: Option<Duration>,
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, addr: &SocketAddr) -> io::Result<TcpStream> {
        let stream = match self.timeout {
            Some(t) => TcpStream::connect_timeout(addr, t)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Tenta cada candidato em ordem; para no primeiro que conectar.
pub fn connect_first<C: Connector>(
    connector: &C,
    candidates: &[SocketAddr],
) -> Result<(C::Stream, SocketAddr), UplinkError> {
    let mut last = None;
    for addr in candidates {
        match connector.connect(addr) {
            Ok(stream) => {
                debug!("Conectado a {addr}");
                return Ok((stream, *addr));
            }
            Err(e) => {
                debug!("Falha ao conectar em {addr}: {e}");
                last = Some(e);
            }
        }
    }
    Err(match last {
        Some(last) => UplinkError::Connect {
            attempts: candidates.len(),
            last,
        },
        None => UplinkError::NoAddress,
    })
}

// ──────────────────────────────────────────────
// Sessão
// ──────────────────────────────────────────────

/// Resultado de uma leitura em `Receiving`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Data(usize),
    PeerClosed,
}

/// Conexão de um ciclo: motor + transporte, liberados em `close`/`Drop`.
pub struct Session<E: SecureEngine> {
    engine: Option<E>,
    state: UplinkState,
}

impl<E: SecureEngine> Session<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Some(engine),
            state: UplinkState::Handshaking,
        }
    }

    pub fn state(&self) -> UplinkState {
        self.state
    }

    fn enter(&mut self, state: UplinkState) {
        debug!("uplink: {:?} → {:?}", self.state, state);
        self.state = state;
    }

    fn engine(&mut self) -> Result<&mut E, UplinkError> {
        self.engine.as_mut().ok_or(UplinkError::Closed)
    }

    /// Repete o passo de handshake enquanto o motor pedir mais I/O.
    /// Devolve quantos passos foram necessários.
    pub fn handshake(&mut self) -> Result<u32, UplinkError> {
        let engine = self.engine()?;
        let mut steps = 0u32;
        let result = loop {
            steps += 1;
            match engine.handshake_step() {
                Ok(()) => break Ok(steps),
                Err(e) if e.is_retry() => continue,
                Err(e) => break Err(UplinkError::Handshake(e)),
            }
        };
        match result {
            Ok(steps) => {
                self.enter(UplinkState::Ready);
                Ok(steps)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Uma única escrita da requisição completa.
    pub fn send(&mut self, request: &[u8]) -> Result<usize, UplinkError> {
        if self.state != UplinkState::Ready {
            return Err(UplinkError::Closed);
        }
        self.enter(UplinkState::Sending);
        let result = match self.engine()?.write(request) {
            Ok(0) => Err(UplinkError::NothingSent),
            Ok(n) => Ok(n),
            Err(e) => Err(UplinkError::Send(e)),
        };
        if result.is_err() {
            self.close();
        }
        result
    }

    /// Uma única leitura, limitada à capacidade de `response`.
    pub fn receive(&mut self, response: &mut ResponseBuffer) -> Result<Received, UplinkError> {
        if self.state != UplinkState::Sending {
            return Err(UplinkError::Closed);
        }
        self.enter(UplinkState::Receiving);
        response.clear();
        let result = match self.engine()?.read(response.spare_mut()) {
            Ok(0) => Ok(Received::PeerClosed),
            Ok(n) => {
                response.commit(n);
                Ok(Received::Data(n))
            }
            Err(e) => Err(UplinkError::Receive(e)),
        };
        if result.is_err() {
            self.close();
        }
        result
    }

    /// Libera motor e conexão. Chamadas repetidas não fazem nada.
    pub fn close(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.close();
            self.enter(UplinkState::Closed);
        }
    }
}

impl<E: SecureEngine> Drop for Session<E> {
    fn drop(&mut self) {
        self.close();
    }
}

// ──────────────────────────────────────────────
// Cliente
// ──────────────────────────────────────────────

/// Destino do POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Target {
    /// Valor do header `Host` (porta só quando não é 443).
    pub fn host_header(&self) -> Cow<'_, str> {
        let host: Cow<'_, str> = if self.host.contains(':') {
            format!("[{}]", self.host).into()
        } else {
            Cow::Borrowed(self.host.as_str())
        };
        if self.port == 443 {
            host
        } else {
            format!("{host}:{}", self.port).into()
        }
    }
}

impl From<&UplinkConfig> for Target {
    fn from(c: &UplinkConfig) -> Self {
        Self {
            host: c.host.clone(),
            port: c.port,
            path: c.path.clone(),
        }
    }
}

/// Cliente HTTPS de disparo único por ciclo.
pub struct UplinkClient<R, C, F> {
    target: Target,
    resolver: R,
    connector: C,
    engines: F,
}

/// Cliente de produção: DNS do sistema, TCP bloqueante e rustls.
pub type HttpsUplink = UplinkClient<SystemResolver, TcpConnector, TlsEngineFactory>;

impl HttpsUplink {
    pub fn from_config(config: &UplinkConfig) -> Result<Self, UplinkError> {
        Ok(UplinkClient::new(
            Target::from(config),
            SystemResolver,
            TcpConnector {
                timeout: config.connect_timeout(),
            },
            TlsEngineFactory::from_config(config)?,
        ))
    }
}

impl<R, C, F> UplinkClient<R, C, F>
where
    R: Resolver,
    C: Connector,
    F: EngineFactory<C::Stream>,
{
    pub fn new(target: Target, resolver: R, connector: C, engines: F) -> Self {
        Self {
            target,
            resolver,
            connector,
            engines,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Executa um ciclo completo: conecta, handshake, POST, uma leitura.
    pub fn post(&self, payload: &[u8]) -> Result<UplinkOutcome, UplinkError> {
        let mut request = RequestBuffer::new();
        frame_request(&self.target.host_header(), &self.target.path, payload, &mut request)?;

        debug!("uplink: Disconnected → Connecting");
        let candidates = self
            .resolver
            .resolve(&self.target.host, self.target.port)
            .map_err(|source| UplinkError::Resolve {
                host: self.target.host.clone(),
                source,
            })?;
        let (stream, addr) = connect_first(&self.connector, &candidates)?;

        let engine = self.engines.attach(StreamTransport::new(stream))?;
        let mut session = Session::new(engine);
        debug!("uplink: Connecting → Handshaking ({addr})");

        let steps = session.handshake()?;
        debug!("Handshake concluído em {steps} passo(s)");

        let sent = session.send(request.as_bytes())?;
        if sent < request.len() {
            warn!("Envio parcial: {sent}/{} bytes", request.len());
        }

        let mut response = ResponseBuffer::new();
        let outcome = match session.receive(&mut response)? {
            Received::PeerClosed => UplinkOutcome::PeerClosed,
            Received::Data(_) => UplinkOutcome::Delivered(UplinkResponse::parse(response.as_bytes())),
        };

        session.close();
        Ok(outcome)
    }
}

impl<R, C, F> Uplink for UplinkClient<R, C, F>
where
    R: Resolver,
    C: Connector,
    F: EngineFactory<C::Stream>,
{
    fn deliver(&self, payload: &[u8]) -> Result<UplinkOutcome, UplinkError> {
        self.post(payload)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
