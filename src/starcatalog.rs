//! Immutable star catalog with a per-constellation index.
//!
//! The catalog is loaded once at process start and shared read-only (usually
//! behind an `Arc`). Construction never yields an empty catalog: a table with
//! no usable rows is reported as [`SkyguideError::CatalogUnavailable`].
//!
//! Constellations are kept in order of first appearance, and each keeps the
//! catalog indices of its members in catalog order. Guide-star lookup is the
//! minimum magnitude over those indices, first occurrence winning ties.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalogs::stars_csv::read_star_table;
use crate::error::{Result, SkyguideError};
use crate::CatalogStar;

const BUNDLED_TABLE: &str = include_str!("../data/bright_stars.csv");

/// Parameters applied while loading a star table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Stars at or fainter than this magnitude are dropped. `None` keeps every row.
    /// Default: Some(5.0)
    pub max_magnitude: Option<f32>,
    /// Year to which proper motions are propagated. `None` uses catalog positions as-is.
    /// Default: None
    pub proper_motion_epoch_year: Option<f64>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_magnitude: Some(5.0),
            proper_motion_epoch_year: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StarCatalog {
    stars: Vec<CatalogStar>,
    constellations: Vec<String>,
    members: HashMap<String, Vec<usize>>,
}

impl StarCatalog {
    /// Build a catalog from owned stars.
    pub fn new(stars: Vec<CatalogStar>) -> Result<Self> {
        if stars.is_empty() {
            return Err(SkyguideError::catalog("catalog contains no stars"));
        }

        let mut constellations = Vec::new();
        let mut members: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, star) in stars.iter().enumerate() {
            let entry = members.entry(star.constellation.clone()).or_insert_with(|| {
                constellations.push(star.constellation.clone());
                Vec::new()
            });
            entry.push(idx);
        }

        Ok(Self {
            stars,
            constellations,
            members,
        })
    }

    /// Load a star table from a CSV file.
    pub fn from_csv_path<P: AsRef<Path>>(path: P, config: &CatalogConfig) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading star catalog from {}", path.display());
        let file = std::fs::File::open(path).map_err(|e| {
            SkyguideError::catalog(format!("cannot open {}: {}", path.display(), e))
        })?;
        Self::from_csv_reader(file, config)
    }

    /// Load a star table from any CSV source.
    pub fn from_csv_reader<R: Read>(reader: R, config: &CatalogConfig) -> Result<Self> {
        let (mut stars, skipped) = read_star_table(reader, config.proper_motion_epoch_year)
            .map_err(|e| SkyguideError::catalog(format!("malformed star table: {e}")))?;

        let num_rows = stars.len();
        if let Some(max_mag) = config.max_magnitude {
            stars.retain(|s| s.mag < max_mag);
        }
        info!(
            "Kept {} of {} stars ({} rows skipped, magnitude limit {:?})",
            stars.len(),
            num_rows,
            skipped,
            config.max_magnitude
        );

        let catalog = Self::new(stars)?;
        info!(
            "Catalog covers {} constellations",
            catalog.constellations.len()
        );
        Ok(catalog)
    }

    /// Load the bright-star table compiled into the crate.
    pub fn bundled() -> Result<Self> {
        Self::bundled_with(&CatalogConfig::default())
    }

    /// Load the compiled-in table with a custom magnitude cut or epoch.
    pub fn bundled_with(config: &CatalogConfig) -> Result<Self> {
        Self::from_csv_reader(BUNDLED_TABLE.as_bytes(), config)
    }

    /// Return the total number of stars in the catalog.
    pub fn len(&self) -> usize {
        self.stars.len()
    }

    /// Always `false` for a constructed catalog; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    /// Return all catalog stars in catalog order.
    pub fn stars(&self) -> &[CatalogStar] {
        &self.stars
    }

    /// Constellation labels in order of first appearance in the catalog.
    pub fn constellations(&self) -> &[String] {
        &self.constellations
    }

    /// Stars labelled with `constellation`, in catalog order.
    pub fn members<'a>(
        &'a self,
        constellation: &str,
    ) -> impl Iterator<Item = &'a CatalogStar> + 'a {
        self.members
            .get(constellation)
            .map(|idx| idx.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.stars[i])
    }

    /// The brightest member of `constellation`.
    ///
    /// Ties in magnitude are broken by catalog order: the first occurrence wins.
    /// Returns `None` for an unknown label.
    pub fn guide_star(&self, constellation: &str) -> Option<&CatalogStar> {
        self.members(constellation).fold(None, |best: Option<&CatalogStar>, star| match best {
            Some(b) if b.mag <= star.mag => Some(b),
            _ => Some(star),
        })
    }
}
