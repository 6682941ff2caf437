//! Motor TLS (rustls) ligado ao [`Transport`].
//!
//! O `ClientConnection` não toca em socket: registros entram por
//! `read_tls` e saem por `write_tls` através do adaptador de transporte,
//! e cada passo devolve os mesmos sinais de [`EngineError`].
//!
//! Verificação do servidor:
//! - `strict`: cadeia + hostname contra as âncoras (arquivo PEM ou, sem
//!   ele, o bundle `webpki-roots`); qualquer falha aborta o handshake.
//! - `advisory`: mesma verificação quando há âncoras, mas a falha só vai
//!   para o log. Assinaturas do handshake são sempre verificadas.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme};
use telemetry_core::config::{UplinkConfig, VerifyMode};
use tracing::{debug, warn};

use crate::engine::{EngineError, EngineFactory, SecureEngine};
use crate::transport::{ByteStream, StreamTransport, Transport, TransportError, TransportIo};
use crate::UplinkError;

fn tls_err(context: &str, e: impl std::fmt::Display) -> UplinkError {
    UplinkError::Tls(format!("{context}: {e}"))
}

// ──────────────────────────────────────────────
// Material de confiança e ClientConfig
// ──────────────────────────────────────────────

/// Lê todos os certificados de um arquivo PEM.
pub fn load_trust_anchors(path: &Path) -> Result<Vec<CertificateDer<'static>>, UplinkError> {
    let context = path.display().to_string();
    let file = File::open(path).map_err(|e| tls_err(&context, e))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_err(&context, e))?;
    if certs.is_empty() {
        return Err(tls_err(&context, "nenhum certificado PEM encontrado"));
    }
    Ok(certs)
}

/// Monta a configuração de cliente para o modo de verificação pedido.
pub fn client_config(
    mode: VerifyMode,
    anchors: Vec<CertificateDer<'static>>,
) -> Result<Arc<ClientConfig>, UplinkError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = RootCertStore::empty();
    for cert in anchors {
        roots.add(cert).map_err(|e| tls_err("âncora inválida", e))?;
    }

    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| tls_err("versões de protocolo", e))?;

    let config = match mode {
        VerifyMode::Strict => {
            if roots.is_empty() {
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            }
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        VerifyMode::Advisory => {
            let verifier = AdvisoryVerifier::new(roots, &provider)?;
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(verifier))
                .with_no_client_auth()
        }
    };

    Ok(Arc::new(config))
}

/// Verificador que registra, mas não impõe, a validação da cadeia.
#[derive(Debug)]
struct AdvisoryVerifier {
    inner: Option<Arc<WebPkiServerVerifier>>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl AdvisoryVerifier {
    fn new(roots: RootCertStore, provider: &Arc<CryptoProvider>) -> Result<Self, UplinkError> {
        let inner = if roots.is_empty() {
            None
        } else {
            let verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(provider))
                .build()
                .map_err(|e| tls_err("verificador", e))?;
            Some(verifier)
        };
        Ok(Self {
            inner,
            algorithms: provider.signature_verification_algorithms,
        })
    }
}

impl ServerCertVerifier for AdvisoryVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match &self.inner {
            Some(verifier) => {
                if let Err(e) =
                    verifier.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
                {
                    warn!("Certificado de {server_name:?} não verificado ({e}); seguindo em modo advisory");
                }
            }
            None => warn!(
                "Nenhuma âncora de confiança carregada; certificado de {server_name:?} aceito sem verificação"
            ),
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

// ──────────────────────────────────────────────
// Motor
// ──────────────────────────────────────────────

/// Sessão TLS de cliente sobre um [`Transport`].
pub struct TlsEngine<T> {
    conn: ClientConnection,
    transport: T,
    closed: bool,
}

impl<T: Transport> TlsEngine<T> {
    pub fn new(
        config: Arc<ClientConfig>,
        server_name: ServerName<'static>,
        transport: T,
    ) -> Result<Self, UplinkError> {
        let conn = ClientConnection::new(config, server_name).map_err(|e| tls_err("sessão", e))?;
        Ok(Self {
            conn,
            transport,
            closed: false,
        })
    }

    /// Envia todos os registros pendentes.
    fn push_records(&mut self) -> Result<(), EngineError> {
        while self.conn.wants_write() {
            match self.conn.write_tls(&mut TransportIo(&mut self.transport)) {
                Ok(0) => {
                    let e = io::Error::from(io::ErrorKind::WriteZero);
                    return Err(TransportError::SendFailed(e).into());
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Err(EngineError::WantWrite),
                Err(e) => return Err(TransportError::SendFailed(e).into()),
            }
        }
        Ok(())
    }

    /// Lê um lote de registros e processa. `Ok(0)` = fim do stream.
    fn pull_records(&mut self) -> Result<usize, EngineError> {
        let n = match self.conn.read_tls(&mut TransportIo(&mut self.transport)) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Err(EngineError::WantRead),
            Err(e) => return Err(TransportError::RecvFailed(e).into()),
        };
        if n == 0 {
            return Ok(0);
        }
        if let Err(e) = self.conn.process_new_packets() {
            // o alerta gerado pelo rustls é enviado no melhor esforço
            let _ = self.push_records();
            return Err(EngineError::protocol(e));
        }
        Ok(n)
    }
}

impl<T: Transport> SecureEngine for TlsEngine<T> {
    fn handshake_step(&mut self) -> Result<(), EngineError> {
        self.push_records()?;

        if self.conn.is_handshaking() && self.pull_records()? == 0 {
            return Err(EngineError::PeerClosed);
        }

        if self.conn.wants_write() {
            Err(EngineError::WantWrite)
        } else if self.conn.is_handshaking() {
            Err(EngineError::WantRead)
        } else {
            Ok(())
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, EngineError> {
        let n = self.conn.writer().write(buf).map_err(EngineError::protocol)?;
        self.push_records()?;
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        loop {
            match self.conn.reader().read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("Servidor fechou a conexão sem close_notify");
                    return Ok(0);
                }
                Err(e) => return Err(EngineError::protocol(e)),
            }
            self.pull_records()?;
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if !self.conn.is_handshaking() {
            self.conn.send_close_notify();
            let _ = self.push_records();
        }
        self.transport.shutdown();
    }
}

// ──────────────────────────────────────────────
// Fábrica
// ──────────────────────────────────────────────

/// Cria um [`TlsEngine`] por conexão, reaproveitando só a configuração.
#[derive(Clone)]
pub struct TlsEngineFactory {
    config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
    mode: VerifyMode,
}

impl TlsEngineFactory {
    pub fn new(
        host: &str,
        mode: VerifyMode,
        anchors: Vec<CertificateDer<'static>>,
    ) -> Result<Self, UplinkError> {
        let server_name = ServerName::try_from(host.to_owned()).map_err(|e| tls_err(host, e))?;
        Ok(Self {
            config: client_config(mode, anchors)?,
            server_name,
            mode,
        })
    }

    /// Carrega `ca_file` (se houver) e monta a fábrica para `uplink.host`.
    pub fn from_config(uplink: &UplinkConfig) -> Result<Self, UplinkError> {
        let anchors = match uplink.ca_path() {
            Some(path) => load_trust_anchors(path)?,
            None => Vec::new(),
        };
        Self::new(&uplink.host, uplink.verify, anchors)
    }

    pub fn mode(&self) -> VerifyMode {
        self.mode
    }
}

impl<S: ByteStream> EngineFactory<S> for TlsEngineFactory {
    type Engine = TlsEngine<StreamTransport<S>>;

    fn attach(&self, transport: StreamTransport<S>) -> Result<Self::Engine, UplinkError> {
        if self.mode == VerifyMode::Advisory {
            warn!(
                "TLS em modo advisory para {:?}: falhas de certificado não abortam o handshake",
                self.server_name
            );
        }
        TlsEngine::new(Arc::clone(&self.config), self.server_name.clone(), transport)
    }
}
