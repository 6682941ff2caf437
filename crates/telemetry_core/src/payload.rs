//! Codificação do snapshot em JSON.
//!
//! Formato fixo, uma linha, ordem de campos e 2 casas decimais estáveis:
//!
//! ```text
//! {"temperature":22.50,"humidity":48.30,"voc":120,"light":300,"sound":10,
//!  "accelerometer":{"x":0.01,"y":-0.02,"z":9.81},
//!  "gyroscope":{"x":0.00,"y":0.00,"z":0.00}}
//! ```
//!
//! Função pura: sem I/O, sem estado compartilhado, escreve direto num
//! buffer de capacidade fixa (normalmente [`PayloadBuffer`](crate::buffer::PayloadBuffer)).

use crate::buffer::{CapacityExceeded, FixedBuffer};
use crate::types::TelemetrySnapshot;

/// Erros de codificação.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// JSON não representa NaN/infinito.
    #[error("campo '{0}' não é um número finito")]
    NonFinite(&'static str),

    #[error("payload não cabe no buffer: {0}")]
    Overflow(#[from] CapacityExceeded),
}

/// Codifica `snapshot` em `out` (substituindo o conteúdo) e retorna o
/// tamanho exato em bytes.
pub fn encode<const N: usize>(
    snapshot: &TelemetrySnapshot,
    out: &mut FixedBuffer<N>,
) -> Result<usize, EncodeError> {
    check_finite(snapshot)?;

    let s = snapshot;
    let (a, g) = (s.accelerometer, s.gyroscope);
    out.clear();
    out.write_formatted(format_args!(
        concat!(
            "{{",
            "\"temperature\":{:.2},",
            "\"humidity\":{:.2},",
            "\"voc\":{},",
            "\"light\":{},",
            "\"sound\":{},",
            "\"accelerometer\":{{\"x\":{:.2},\"y\":{:.2},\"z\":{:.2}}},",
            "\"gyroscope\":{{\"x\":{:.2},\"y\":{:.2},\"z\":{:.2}}}",
            "}}"
        ),
        s.temperature, s.humidity, s.voc, s.light, s.sound, a.x, a.y, a.z, g.x, g.y, g.z,
    ))?;

    Ok(out.len())
}

fn check_finite(s: &TelemetrySnapshot) -> Result<(), EncodeError> {
    if !s.temperature.is_finite() {
        return Err(EncodeError::NonFinite("temperature"));
    }
    if !s.humidity.is_finite() {
        return Err(EncodeError::NonFinite("humidity"));
    }
    if !s.accelerometer.is_finite() {
        return Err(EncodeError::NonFinite("accelerometer"));
    }
    if !s.gyroscope.is_finite() {
        return Err(EncodeError::NonFinite("gyroscope"));
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
