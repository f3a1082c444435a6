use std::fs::read_to_string;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use rnaseqc_core::models::Strand;
use rnaseqc_core::{QcError, Result};

///
/// Library strandedness. Only features on the read's inferred transcript
/// strand are considered when this is not `None`.
///
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Strandedness {
    #[default]
    None,
    #[serde(alias = "FR", alias = "fr")]
    ForwardFirstStrand,
    #[serde(alias = "RF", alias = "rf")]
    ReverseFirstStrand,
}

impl FromStr for Strandedness {
    type Err = QcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RF" | "rf" => Ok(Strandedness::ReverseFirstStrand),
            "FR" | "fr" => Ok(Strandedness::ForwardFirstStrand),
            "none" => Ok(Strandedness::None),
            _ => Err(QcError::InvalidConfig(format!(
                "strandedness must be one of RF, rf, FR, fr; got '{}'",
                s
            ))),
        }
    }
}

impl Strandedness {
    ///
    /// Strand a feature must be on to be considered for a read, or `None` when
    /// the library is unstranded.
    ///
    pub fn feature_strand(self, alignment: Strand, second_mate: bool) -> Option<Strand> {
        match self {
            Strandedness::None => None,
            Strandedness::ForwardFirstStrand if second_mate => Some(alignment.flip()),
            Strandedness::ForwardFirstStrand => Some(alignment),
            Strandedness::ReverseFirstStrand if second_mate => Some(alignment),
            Strandedness::ReverseFirstStrand => Some(alignment.flip()),
        }
    }
}

/// Read classification algorithm, fixed for the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClassifierMode {
    #[default]
    Standard,
    Legacy,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BiasConfig {
    /// Distance of each window from the end of the gene body.
    pub offset: u64,
    pub window: u64,
    pub min_gene_length: u64,
    /// Genes with fewer windowed hits get no bias value.
    pub detection_threshold: u64,
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            offset: 0,
            window: 100,
            min_gene_length: 200,
            detection_threshold: 0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct QcConfig {
    pub strandedness: Strandedness,
    pub legacy: bool,
    pub split_distance: u64,
    pub max_read_length: u64,
    pub base_mismatch: u32,
    pub mapping_quality: u8,
    pub low_quality: u8,
    pub bias: BiasConfig,
    pub fragment_samples: u64,
    pub chimeric_distance: u64,
    pub chimeric_tag: String,
    pub exclude_chimeric: bool,
    pub unpaired: bool,
    pub filter_tags: Vec<String>,
    pub rpkm: bool,
    pub coverage: bool,
    pub sample: Option<String>,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            strandedness: Strandedness::None,
            legacy: false,
            split_distance: 100,
            max_read_length: 1_000_000,
            base_mismatch: 6,
            mapping_quality: 255,
            low_quality: 255,
            bias: BiasConfig::default(),
            fragment_samples: 1_000_000,
            chimeric_distance: 2_000_000,
            chimeric_tag: "mC".to_string(),
            exclude_chimeric: false,
            unpaired: false,
            filter_tags: Vec::new(),
            rpkm: false,
            coverage: false,
            sample: None,
        }
    }
}

impl QcConfig {
    pub fn mode(&self) -> ClassifierMode {
        if self.legacy {
            ClassifierMode::Legacy
        } else {
            ClassifierMode::Standard
        }
    }

    pub fn validate(&self) -> Result<()> {
        for tag in self.filter_tags.iter().chain(std::iter::once(&self.chimeric_tag)) {
            if tag.len() != 2 {
                return Err(QcError::InvalidConfig(format!(
                    "alignment tags are two characters long; got '{}'",
                    tag
                )));
            }
        }
        if self.bias.window == 0 {
            return Err(QcError::InvalidConfig(
                "bias window must be at least one base".to_string(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<&Path> for QcConfig {
    type Error = QcError;

    fn try_from(path: &Path) -> Result<Self> {
        let toml_str = read_to_string(path)?;
        let config: QcConfig =
            toml::from_str(&toml_str).map_err(|e| QcError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
