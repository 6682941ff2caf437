//! Drivers de sensor – leitura síncrona tipada por fonte.
//!
//! O nó só depende do formato `read() -> leitura | erro`. As
//! implementações aqui são simuladas: ondas determinísticas avançadas a
//! cada leitura, dentro das faixas reais de cada chip, para rodar o nó
//! num host sem hardware.
//!
//! | Fonte   | Chip          | Barramento | Leitura            |
//! |---------|---------------|------------|--------------------|
//! | climate | SHTC3         | I²C        | [`ClimateReading`] |
//! | voc     | SGP40         | I²C        | [`VocIndex`]       |
//! | motion  | QMI8658       | I²C        | [`MotionReading`]  |
//! | light   | LDR           | ADC mux    | [`LightLevel`]     |
//! | sound   | microfone     | ADC mux    | [`SoundLevel`]     |
//!
//! [`Faulty`] injeta falhas periódicas em qualquer driver
//! (`producers.fault_every`), exercitando o caminho de leitura falhada.

use telemetry_core::FieldUpdate;
use telemetry_core::types::{ADC_MAX, Axes, ClimateReading, LightLevel, MotionReading, SoundLevel, VocIndex};

/// Falha de uma leitura. Nunca é repetida no mesmo tick.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    #[error("{sensor}: leitura inválida ({reason})")]
    Invalid { sensor: &'static str, reason: String },
}

/// Primitiva de leitura de um sensor.
pub trait SensorDriver: Send {
    type Reading: Into<FieldUpdate>;

    /// Nome curto da fonte (logs, nome da thread).
    fn name(&self) -> &'static str;

    fn read(&mut self) -> Result<Self::Reading, DriverError>;
}

// ──────────────────────────────────────────────
// Forma de onda compartilhada
// ──────────────────────────────────────────────

/// Oscilador discreto: cada `next` avança uma amostra.
#[derive(Debug, Clone)]
struct Wave {
    sample: u64,
    /// Amostras por ciclo completo
    period: u64,
}

impl Wave {
    fn new(period: u64) -> Self {
        Self {
            sample: 0,
            period: period.max(1),
        }
    }

    /// Próximo valor em [-1, 1].
    fn next(&mut self) -> f32 {
        let phase = (self.sample % self.period) as f32 / self.period as f32;
        self.sample = self.sample.wrapping_add(1);
        (phase * std::f32::consts::TAU).sin()
    }
}

// ──────────────────────────────────────────────
// I²C
// ──────────────────────────────────────────────

/// Temperatura 18–26 °C, umidade 40–60 %RH.
#[derive(Debug, Clone)]
pub struct SimulatedClimate {
    wave: Wave,
}

impl SimulatedClimate {
    pub fn new() -> Self {
        Self { wave: Wave::new(600) }
    }
}

impl Default for SimulatedClimate {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDriver for SimulatedClimate {
    type Reading = ClimateReading;

    fn name(&self) -> &'static str {
        "climate"
    }

    fn read(&mut self) -> Result<ClimateReading, DriverError> {
        let w = self.wave.next();
        Ok(ClimateReading {
            temperature: 22.0 + 4.0 * w,
            // umidade cai quando a temperatura sobe
            humidity: 50.0 - 10.0 * w,
        })
    }
}

/// Índice VOC 0–500 (100 = média do ambiente).
#[derive(Debug, Clone)]
pub struct SimulatedVoc {
    wave: Wave,
}

impl SimulatedVoc {
    pub fn new() -> Self {
        Self { wave: Wave::new(900) }
    }
}

impl Default for SimulatedVoc {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDriver for SimulatedVoc {
    type Reading = VocIndex;

    fn name(&self) -> &'static str {
        "voc"
    }

    fn read(&mut self) -> Result<VocIndex, DriverError> {
        let w = self.wave.next();
        Ok(VocIndex((100.0 + 60.0 * w).round().clamp(0.0, 500.0) as u32))
    }
}

/// IMU parado sobre a mesa: ~1 g em z, ruído pequeno nos outros eixos.
#[derive(Debug, Clone)]
pub struct SimulatedImu {
    wave: Wave,
}

impl SimulatedImu {
    pub fn new() -> Self {
        Self { wave: Wave::new(50) }
    }
}

impl Default for SimulatedImu {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDriver for SimulatedImu {
    type Reading = MotionReading;

    fn name(&self) -> &'static str {
        "motion"
    }

    fn read(&mut self) -> Result<MotionReading, DriverError> {
        let w = self.wave.next();
        Ok(MotionReading {
            accelerometer: Axes::new(0.02 * w, -0.02 * w, 9.81 + 0.05 * w),
            gyroscope: Axes::new(0.5 * w, 0.25 * w, -0.5 * w),
        })
    }
}

// ──────────────────────────────────────────────
// ADC (multiplexado)
// ──────────────────────────────────────────────

fn adc_sample(center: f32, swing: f32, w: f32) -> u16 {
    (center + swing * w).round().clamp(0.0, ADC_MAX as f32) as u16
}

/// Luz: ciclo lento entre penumbra e claridade.
#[derive(Debug, Clone)]
pub struct SimulatedLight {
    wave: Wave,
}

impl SimulatedLight {
    pub fn new() -> Self {
        Self { wave: Wave::new(1200) }
    }
}

impl Default for SimulatedLight {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDriver for SimulatedLight {
    type Reading = LightLevel;

    fn name(&self) -> &'static str {
        "light"
    }

    fn read(&mut self) -> Result<LightLevel, DriverError> {
        Ok(LightLevel::new(adc_sample(2048.0, 1800.0, self.wave.next())))
    }
}

/// Som: ruído de fundo baixo com picos curtos.
#[derive(Debug, Clone)]
pub struct SimulatedSound {
    wave: Wave,
}

impl SimulatedSound {
    pub fn new() -> Self {
        Self { wave: Wave::new(20) }
    }
}

impl Default for SimulatedSound {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDriver for SimulatedSound {
    type Reading = SoundLevel;

    fn name(&self) -> &'static str {
        "sound"
    }

    fn read(&mut self) -> Result<SoundLevel, DriverError> {
        let w = self.wave.next().max(0.0);
        Ok(SoundLevel::new(adc_sample(40.0, 600.0, w * w)))
    }
}

// ──────────────────────────────────────────────
// Falhas injetadas
// ──────────────────────────────────────────────

/// Envolve um driver e falha a cada `every` leituras (0 = nunca).
///
/// Simula o sensor que não responde no barramento: a leitura falhada não
/// avança o driver interno, e a seguinte volta ao normal.
#[derive(Debug, Clone)]
pub struct Faulty<D> {
    inner: D,
    every: u64,
    reads: u64,
}

impl<D: SensorDriver> Faulty<D> {
    pub fn new(inner: D, every: u64) -> Self {
        Self { inner, every, reads: 0 }
    }
}

impl<D: SensorDriver> SensorDriver for Faulty<D> {
    type Reading = D::Reading;

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn read(&mut self) -> Result<D::Reading, DriverError> {
        self.reads = self.reads.wrapping_add(1);
        if self.every > 0 && self.reads % self.every == 0 {
            return Err(DriverError::Invalid {
                sensor: self.inner.name(),
                reason: format!("sem resposta na leitura {}", self.reads),
            });
        }
        self.inner.read()
    }
}
