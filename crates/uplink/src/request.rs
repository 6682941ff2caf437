//! Enquadramento HTTP/1.1 do POST e leitura da resposta.
//!
//! ```text
//! POST <path> HTTP/1.1\r\n
//! Host: <host>\r\n
//! Content-Type: application/json\r\n
//! Content-Length: <bytes exatos do payload>\r\n
//! Connection: close\r\n
//! \r\n
//! <json>
//! ```

use serde::Deserialize;
use telemetry_core::buffer::{CapacityExceeded, FixedBuffer};

/// Monta a requisição em `out` (substituindo o conteúdo).
///
/// Tudo ou nada: se não couber, `out` fica vazio.
pub fn frame_request<const N: usize>(
    host_header: &str,
    path: &str,
    payload: &[u8],
    out: &mut FixedBuffer<N>,
) -> Result<usize, CapacityExceeded> {
    out.clear();
    let head = out.write_formatted(format_args!(
        "POST {path} HTTP/1.1\r\n\
         Host: {host_header}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        payload.len()
    ));
    if let Err(e) = head.and_then(|()| out.extend_from_slice(payload)) {
        out.clear();
        return Err(e);
    }
    Ok(out.len())
}

/// Confirmação JSON devolvida pelo backend de ingestão.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiAck {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Único chunk de resposta observado no ciclo.
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkResponse {
    /// Código da status line, se o chunk começar com uma
    pub status: Option<u16>,
    /// Bytes recebidos
    pub received: usize,
    /// Conteúdo como texto
    pub text: String,
}

impl UplinkResponse {
    pub fn parse(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes).into_owned();
        Self {
            status: parse_status(&text),
            received: bytes.len(),
            text,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }

    /// Corpo após o fim dos cabeçalhos, se já chegou neste chunk.
    pub fn body(&self) -> Option<&str> {
        self.text.split_once("\r\n\r\n").map(|(_, body)| body)
    }

    /// Corpo interpretado como [`ApiAck`] (melhor esforço).
    pub fn ack(&self) -> Option<ApiAck> {
        serde_json::from_str(self.body()?.trim()).ok()
    }
}

fn parse_status(text: &str) -> Option<u16> {
    let line = text.lines().next()?;
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}
