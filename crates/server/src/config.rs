use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cardscan_ocr::PipelineConfig;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "CARDSCAN_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "cardscan.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Bunyan-style JSON lines.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    #[default]
    Tesseract,
    /// Returns `mock_tokens` for every image. For local smoke runs only.
    Mock,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub engine: OcrEngineKind,
    /// Tesseract language pack.
    pub lang: String,
    /// Directory holding `*.traineddata`; the engine default when unset.
    pub data_path: Option<PathBuf>,
    pub mock_tokens: Vec<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::default(),
            lang: "vie".to_string(),
            data_path: None,
            mock_tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BarcodeScannerKind {
    #[default]
    None,
    Rxing,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct BarcodeSettings {
    pub scanner: BarcodeScannerKind,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind: SocketAddr,
    pub max_upload_bytes: usize,
    pub log_format: LogFormat,
    pub ocr: OcrSettings,
    pub barcode: BarcodeSettings,
    pub pipeline: PipelineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_upload_bytes: 10 * 1024 * 1024,
            log_format: LogFormat::default(),
            ocr: OcrSettings::default(),
            barcode: BarcodeSettings::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Settings {
    /// Load from `$CARDSCAN_CONFIG`, else `./cardscan.toml` if present, else
    /// defaults; then apply `CARDSCAN_BIND` / `CARDSCAN_LOG_FORMAT`.
    pub fn load() -> Result<Self> {
        let mut settings = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = var("CARDSCAN_BIND") {
            self.bind = bind
                .parse()
                .with_context(|| format!("CARDSCAN_BIND is not a socket address: '{bind}'"))?;
        }
        if let Some(format) = var("CARDSCAN_LOG_FORMAT") {
            self.log_format = format.parse().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }
}
