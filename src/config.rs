//! Configuração de processamento carregada a partir de `storybatch.toml`.
//!
//! A struct [`ProcessingConfig`] contém todos os limites de uma execução.
//! O arquivo pode escolher um [`Preset`] e sobrescrever campos individuais.
//! A variável de ambiente `STORYBATCH_MAX_CONCURRENCY` tem precedência sobre o arquivo.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BatchError;
use crate::retry::RetryConfig;

/// Caminho padrão do arquivo de configuração.
pub const DEFAULT_CONFIG_PATH: &str = "storybatch.toml";

/// Variável de ambiente que sobrescreve `max_concurrency`.
pub const CONCURRENCY_ENV: &str = "STORYBATCH_MAX_CONCURRENCY";

/// Limites imutáveis de uma execução em lote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Prazo de cada tentativa, em milissegundos.
    #[serde(default = "default_item_timeout_ms")]
    pub item_timeout_ms: u64,

    /// Prazo do lote inteiro, em milissegundos.
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    /// Tamanho de cada grupo concorrente.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Taxa máxima de falhas aceitável, entre 0 e 1.
    #[serde(default = "default_max_failure_rate")]
    pub max_failure_rate: f64,

    /// Mínimo de jobs bem-sucedidos para o lote ser aceitável.
    #[serde(default = "default_min_success_count")]
    pub min_success_count: usize,

    /// Jobs tentados necessários antes da parada antecipada poder disparar.
    #[serde(default = "default_early_stop_min_sample")]
    pub early_stop_min_sample: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

// Valor padrão para o prazo por tentativa: 30s.
fn default_item_timeout_ms() -> u64 {
    30_000
}

// Valor padrão para o prazo do lote: 10min.
fn default_batch_timeout_ms() -> u64 {
    600_000
}

fn default_max_concurrency() -> usize {
    5
}

fn default_max_failure_rate() -> f64 {
    0.2
}

fn default_min_success_count() -> usize {
    1
}

fn default_early_stop_min_sample() -> usize {
    5
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            item_timeout_ms: default_item_timeout_ms(),
            batch_timeout_ms: default_batch_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            max_failure_rate: default_max_failure_rate(),
            min_success_count: default_min_success_count(),
            early_stop_min_sample: default_early_stop_min_sample(),
            retry: RetryConfig::default(),
        }
    }
}

impl ProcessingConfig {
    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    /// Taxa de sucesso mínima implicada por `max_failure_rate` (apenas para exibição).
    pub fn required_success_rate(&self) -> f64 {
        1.0 - self.max_failure_rate
    }

    /// Verdadeiro se `failure_rate` ultrapassa `max_failure_rate`. Uma taxa
    /// exatamente igual ao limite é aceita.
    pub fn exceeds_failure_limit(&self, failure_rate: f64) -> bool {
        failure_rate > self.max_failure_rate
    }

    /// Valida os limites: todos os campos numéricos devem ser positivos,
    /// exceto `max_failure_rate` (entre 0 e 1) e `early_stop_min_sample`.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.item_timeout_ms == 0 {
            return Err(BatchError::invalid("item_timeout_ms", "must be greater than 0"));
        }
        if self.batch_timeout_ms == 0 {
            return Err(BatchError::invalid("batch_timeout_ms", "must be greater than 0"));
        }
        if self.max_concurrency == 0 {
            return Err(BatchError::invalid("max_concurrency", "must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.max_failure_rate) {
            return Err(BatchError::invalid(
                "max_failure_rate",
                format!("must be within [0, 1], got {}", self.max_failure_rate),
            ));
        }
        if self.min_success_count == 0 {
            return Err(BatchError::invalid("min_success_count", "must be greater than 0"));
        }
        if self.retry.max_retries == 0 {
            return Err(BatchError::invalid("retry.max_retries", "must be greater than 0"));
        }
        if self.retry.timeout_retries == 0 {
            return Err(BatchError::invalid("retry.timeout_retries", "must be greater than 0"));
        }
        if self.retry.retry_delay_ms == 0 {
            return Err(BatchError::invalid("retry.retry_delay_ms", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Conjuntos de parâmetros recomendados. São apenas valores; o processador
/// não conhece os presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Muitos jobs, prazos curtos, tolera mais falhas.
    HighThroughput,
    /// Poucos jobs concorrentes, prazos longos, exige alta taxa de sucesso.
    HighQuality,
    /// Meio-termo entre os dois.
    Balanced,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::HighThroughput, Preset::HighQuality, Preset::Balanced];

    pub fn config(self) -> ProcessingConfig {
        match self {
            Preset::HighThroughput => ProcessingConfig {
                item_timeout_ms: 15_000,
                batch_timeout_ms: 300_000,
                max_concurrency: 10,
                max_failure_rate: 0.3,
                min_success_count: 1,
                early_stop_min_sample: 10,
                retry: RetryConfig {
                    max_retries: 1,
                    timeout_retries: 1,
                    retry_delay_ms: 500,
                },
            },
            Preset::HighQuality => ProcessingConfig {
                item_timeout_ms: 60_000,
                batch_timeout_ms: 1_800_000,
                max_concurrency: 3,
                max_failure_rate: 0.1,
                min_success_count: 3,
                early_stop_min_sample: 5,
                retry: RetryConfig {
                    max_retries: 3,
                    timeout_retries: 2,
                    retry_delay_ms: 2_000,
                },
            },
            Preset::Balanced => ProcessingConfig::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::HighThroughput => "high_throughput",
            Preset::HighQuality => "high_quality",
            Preset::Balanced => "balanced",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "high_throughput" => Ok(Preset::HighThroughput),
            "high_quality" => Ok(Preset::HighQuality),
            "balanced" => Ok(Preset::Balanced),
            _ => Err(BatchError::UnknownPreset(s.to_string())),
        }
    }
}

/// Sobrescritas opcionais do arquivo `retry`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetryOverrides {
    pub max_retries: Option<u32>,
    pub timeout_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

/// Conteúdo de `storybatch.toml`: um preset base e sobrescritas por campo.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub preset: Option<Preset>,
    pub item_timeout_ms: Option<u64>,
    pub batch_timeout_ms: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub max_failure_rate: Option<f64>,
    pub min_success_count: Option<usize>,
    pub early_stop_min_sample: Option<usize>,
    #[serde(default)]
    pub retry: RetryOverrides,
}

impl ConfigFile {
    /// Lê o arquivo em `path`. Usa valores padrão se o arquivo não existir.
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Aplica as sobrescritas sobre o preset (ou o padrão), depois
    /// `STORYBATCH_MAX_CONCURRENCY`, e valida o resultado.
    pub fn resolve(&self) -> Result<ProcessingConfig, BatchError> {
        self.resolve_with(std::env::var(CONCURRENCY_ENV).ok().as_deref())
    }

    /// Como [`resolve`](Self::resolve), com o valor da variável de ambiente informado.
    pub fn resolve_with(&self, concurrency_env: Option<&str>) -> Result<ProcessingConfig, BatchError> {
        let mut config = self.preset.map(Preset::config).unwrap_or_default();

        if let Some(v) = self.item_timeout_ms {
            config.item_timeout_ms = v;
        }
        if let Some(v) = self.batch_timeout_ms {
            config.batch_timeout_ms = v;
        }
        if let Some(v) = self.max_concurrency {
            config.max_concurrency = v;
        }
        if let Some(v) = self.max_failure_rate {
            config.max_failure_rate = v;
        }
        if let Some(v) = self.min_success_count {
            config.min_success_count = v;
        }
        if let Some(v) = self.early_stop_min_sample {
            config.early_stop_min_sample = v;
        }
        if let Some(v) = self.retry.max_retries {
            config.retry.max_retries = v;
        }
        if let Some(v) = self.retry.timeout_retries {
            config.retry.timeout_retries = v;
        }
        if let Some(v) = self.retry.retry_delay_ms {
            config.retry.retry_delay_ms = v;
        }

        // Variável de ambiente tem precedência sobre o arquivo.
        if let Some(raw) = concurrency_env {
            config.max_concurrency = raw
                .trim()
                .parse()
                .map_err(|_| BatchError::invalid(CONCURRENCY_ENV, format!("`{raw}` is not a positive integer")))?;
        }

        config.validate()?;
        Ok(config)
    }
}
