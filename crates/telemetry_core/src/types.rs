//! Definição de tipos/structs para telemetria.
//!
//! O snapshot é um tipo-valor: copiado por inteiro para fora do store,
//! sem identidade além dos campos. A forma serde bate com o schema JSON
//! aceito pelo backend (`temperature`, `humidity`, `voc`, `light`,
//! `sound`, `accelerometer{x,y,z}`, `gyroscope{x,y,z}`).

use serde::{Deserialize, Serialize};

/// Valor máximo do ADC de 12 bits (luz e som).
pub const ADC_MAX: u16 = 4095;

// ──────────────────────────────────────────────
// Eixos
// ──────────────────────────────────────────────

/// Leitura de 3 eixos (acelerômetro em g, giroscópio em dps).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Axes {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Axes {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f32; 3]> for Axes {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

// ──────────────────────────────────────────────
// Leituras tipadas por fonte
// ──────────────────────────────────────────────

/// Temperatura (°C) e umidade (%RH) medidas juntas.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClimateReading {
    pub temperature: f32,
    pub humidity: f32,
}

/// Índice de compostos orgânicos voláteis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VocIndex(pub u32);

/// Nível de luz ambiente (0–4095).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightLevel(u16);

/// Nível de som ambiente (0–4095).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoundLevel(u16);

impl LightLevel {
    /// Satura em [`ADC_MAX`].
    pub fn new(raw: u16) -> Self {
        Self(raw.min(ADC_MAX))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl SoundLevel {
    /// Satura em [`ADC_MAX`].
    pub fn new(raw: u16) -> Self {
        Self(raw.min(ADC_MAX))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

/// Acelerômetro e giroscópio lidos na mesma transação do IMU.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionReading {
    pub accelerometer: Axes,
    pub gyroscope: Axes,
}

// ──────────────────────────────────────────────
// Snapshot completo
// ──────────────────────────────────────────────

/// Último valor conhecido de cada fonte de medição.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySnapshot {
    /// Temperatura (°C)
    pub temperature: f32,
    /// Umidade relativa (%)
    pub humidity: f32,
    /// Índice VOC
    pub voc: u32,
    /// Luz ambiente (0–4095)
    pub light: u16,
    /// Som ambiente (0–4095)
    pub sound: u16,
    /// Aceleração (g)
    pub accelerometer: Axes,
    /// Velocidade angular (dps)
    pub gyroscope: Axes,
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
