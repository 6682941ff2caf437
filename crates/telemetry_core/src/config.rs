//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável. Campos ausentes usam o
//! padrão; arquivo ausente ou inválido cai na configuração padrão.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Erros de leitura/escrita da configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("erro de I/O em {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML inválido em {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("erro ao serializar configuração: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Modo de verificação do certificado do servidor.
///
/// Não há escolha implícita "segura": o modo vai escrito no `config.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    /// Cadeia e hostname precisam validar, senão o handshake falha.
    Strict,
    /// Falhas de cadeia/hostname são apenas registradas no log.
    Advisory,
}

impl std::fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyMode::Strict => f.write_str("strict"),
            VerifyMode::Advisory => f.write_str("advisory"),
        }
    }
}

/// Destino do uplink HTTPS.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UplinkConfig {
    /// Host do backend (também usado para SNI e header `Host`)
    pub host: String,
    /// Porta TCP (443 por convenção)
    pub port: u16,
    /// Rota do POST
    pub path: String,
    /// "strict" ou "advisory"
    pub verify: VerifyMode,
    /// Certificados confiáveis em PEM (vazio = nenhum)
    pub ca_file: String,
    /// Timeout de conexão por endereço candidato (0 = padrão do SO)
    pub connect_timeout_secs: f64,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            host: "example.com".into(),
            port: 443,
            path: "/api/send_data".into(),
            verify: VerifyMode::Advisory,
            ca_file: String::new(),
            connect_timeout_secs: 5.0,
        }
    }
}

/// Limite de `connect_timeout_secs` (por candidato).
pub const MAX_CONNECT_TIMEOUT_SECS: f64 = 600.0;

impl UplinkConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        if self.connect_timeout_secs > 0.0 {
            Duration::try_from_secs_f64(self.connect_timeout_secs).ok()
        } else {
            None
        }
    }

    pub fn ca_path(&self) -> Option<&Path> {
        (!self.ca_file.is_empty()).then(|| Path::new(&self.ca_file))
    }
}

/// Ciclo do reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Intervalo entre envios em segundos
    pub interval_secs: f64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self { interval_secs: 30.0 }
    }
}

impl ReporterConfig {
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or_default()
    }
}

/// Períodos e timeouts dos produtores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub climate_period_ms: u64,
    pub voc_period_ms: u64,
    pub motion_period_ms: u64,
    pub light_period_ms: u64,
    pub sound_period_ms: u64,
    /// Espera máxima pelo lock do store (update perdido depois disso)
    pub store_lock_timeout_ms: u64,
    /// Espera máxima pelo lock do barramento (0 = sem limite)
    pub bus_lock_timeout_ms: u64,
    /// Falha simulada a cada N leituras de cada fonte (0 = nunca)
    pub fault_every: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            climate_period_ms: 100,
            voc_period_ms: 100,
            motion_period_ms: 100,
            light_period_ms: 100,
            sound_period_ms: 100,
            store_lock_timeout_ms: 100,
            bus_lock_timeout_ms: 0,
            fault_every: 0,
        }
    }
}

impl ProducerConfig {
    pub fn store_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.store_lock_timeout_ms)
    }

    pub fn bus_lock_timeout(&self) -> Option<Duration> {
        (self.bus_lock_timeout_ms > 0).then(|| Duration::from_millis(self.bus_lock_timeout_ms))
    }

    /// Maior período entre as fontes (aquecimento antes de um report avulso).
    pub fn longest_period(&self) -> Duration {
        let ms = self.periods().iter().map(|(_, ms)| *ms).max().unwrap_or(0);
        Duration::from_millis(ms)
    }

    fn periods(&self) -> [(&'static str, u64); 5] {
        [
            ("climate_period_ms", self.climate_period_ms),
            ("voc_period_ms", self.voc_period_ms),
            ("motion_period_ms", self.motion_period_ms),
            ("light_period_ms", self.light_period_ms),
            ("sound_period_ms", self.sound_period_ms),
        ]
    }
}

/// Configuração raiz do nó.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub uplink: UplinkConfig,
    pub reporter: ReporterConfig,
    pub producers: ProducerConfig,
}

impl NodeConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match Self::try_load(path) {
                Ok(config) => {
                    info!("Configuração carregada de {}", path.display());
                    return config;
                }
                Err(e) => warn!("{e}"),
            }
        }

        info!("Usando configuração padrão");
        NodeConfig::default()
    }

    /// Como [`load`](Self::load), mas sem fallback.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let up = &self.uplink;

        if up.host.trim().is_empty() {
            errors.push("Host do uplink não pode ser vazio".into());
        }
        if up.port == 0 {
            errors.push("Porta do uplink não pode ser 0".into());
        }
        if !up.path.starts_with('/') {
            errors.push(format!("Rota do uplink deve começar com '/': {:?}", up.path));
        }
        if !(0.0..=MAX_CONNECT_TIMEOUT_SECS).contains(&up.connect_timeout_secs) {
            errors.push(format!(
                "Timeout de conexão inválido: {} (0–{MAX_CONNECT_TIMEOUT_SECS})",
                up.connect_timeout_secs
            ));
        }

        let interval = self.reporter.interval_secs;
        if !(1.0..=3600.0).contains(&interval) {
            errors.push(format!("Intervalo do reporter inválido: {interval} (1–3600)"));
        }

        for (name, period) in self.producers.periods() {
            if period == 0 {
                errors.push(format!("{name} não pode ser 0"));
            }
        }
        if self.producers.store_lock_timeout_ms == 0 {
            errors.push("store_lock_timeout_ms não pode ser 0".into());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = NodeConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn verify_mode_is_written_explicitly() {
        let toml_str = toml::to_string_pretty(&NodeConfig::default()).unwrap();
        assert!(toml_str.contains("verify = \"advisory\""), "{toml_str}");
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[uplink]
host = "api.exemplo.dev"
verify = "strict"
"#;
        let config: NodeConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.uplink.host, "api.exemplo.dev");
        assert_eq!(config.uplink.verify, VerifyMode::Strict);
        // Outros campos devem ter valor padrão
        assert_eq!(config.uplink.port, 443);
        assert_eq!(config.reporter.interval_secs, 30.0);
        assert_eq!(config.producers.motion_period_ms, 100);
        assert_eq!(config.producers.fault_every, 0);

        let faulty: NodeConfig = toml::from_str("[producers]\nfault_every = 7\n").unwrap();
        assert_eq!(faulty.producers.fault_every, 7);
    }

    #[test]
    fn unknown_verify_mode_is_rejected() {
        let bad = "[uplink]\nverify = \"maybe\"\n";
        assert!(toml::from_str::<NodeConfig>(bad).is_err());
    }

    #[test]
    fn validate_reports_each_problem() {
        let mut config = NodeConfig::default();
        config.uplink.host = " ".into();
        config.uplink.path = "api".into();
        config.reporter.interval_secs = 0.5;
        config.producers.sound_period_ms = 0;
        let errors = config.validate();
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("sound_period_ms")));
    }

    #[test]
    fn oversized_connect_timeout_is_rejected() {
        let mut config = NodeConfig::default();
        for bad in [1e30, 600.5, -1.0, f64::NAN, f64::INFINITY] {
            config.uplink.connect_timeout_secs = bad;
            let errors = config.validate();
            assert_eq!(errors.len(), 1, "{bad}: {errors:?}");
            assert!(errors[0].contains("Timeout"));
        }

        // mesmo sem validar, a conversão não entra em pânico
        config.uplink.connect_timeout_secs = 1e30;
        assert_eq!(config.uplink.connect_timeout(), None);
        config.reporter.interval_secs = f64::INFINITY;
        assert_eq!(config.reporter.interval(), Duration::ZERO);
        config.reporter.interval_secs = 30.0;
        config.uplink.connect_timeout_secs = MAX_CONNECT_TIMEOUT_SECS;
        assert!(config.validate().is_empty());
        assert_eq!(config.uplink.connect_timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn durations_from_config() {
        let mut p = ProducerConfig::default();
        assert_eq!(p.bus_lock_timeout(), None);
        p.bus_lock_timeout_ms = 20;
        assert_eq!(p.bus_lock_timeout(), Some(Duration::from_millis(20)));
        p.voc_period_ms = 1000;
        assert_eq!(p.longest_period(), Duration::from_secs(1));

        let mut up = UplinkConfig::default();
        assert_eq!(up.connect_timeout(), Some(Duration::from_secs(5)));
        assert!(up.ca_path().is_none());
        up.connect_timeout_secs = 0.0;
        assert_eq!(up.connect_timeout(), None);
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = NodeConfig::default();
        config.uplink.path = "/ingest".into();
        config.save(&path).unwrap();

        let loaded = NodeConfig::try_load(&path).unwrap();
        assert_eq!(loaded.uplink.path, "/ingest");
        assert_eq!(loaded.uplink.verify, VerifyMode::Advisory);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[uplink\nhost = ").unwrap();

        assert!(matches!(
            NodeConfig::try_load(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(NodeConfig::load(&path).uplink.host, "example.com");
    }
}
