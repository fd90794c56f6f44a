//! Pick a constellation that is high in the observer's sky, and its guide star.
//!
//! Algorithm:
//! 1. Scan every catalog star through the position provider. A constellation
//!    becomes visible the first time one of its members climbs strictly above
//!    the altitude threshold; later members of the same constellation are
//!    skipped without another provider call.
//! 2. An empty visible list is reported as [`Selection::NoneVisible`].
//! 3. One constellation is chosen according to [`SelectionStrategy`].
//! 4. Its guide star (minimum magnitude, first occurrence on ties) is looked up
//!    and its position recomputed for the same observer and time.
//!
//! The visible list is ordered by the catalog position of each constellation's
//! first qualifying star, so `First` is deterministic for a fixed catalog.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SkyguideError};
use crate::position::{ApparentPositionProvider, HorizontalPosition};
use crate::{CatalogStar, ObserverQuery, StarCatalog};

/// Altitude a star must exceed for its constellation to count as visible.
pub const DEFAULT_ALTITUDE_THRESHOLD_DEG: f64 = 45.0;

/// How to choose one constellation out of the visible list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// The first constellation in visible-list order.
    First,
    /// Uniformly random. A seed makes the choice reproducible.
    Random { seed: Option<u64> },
    /// A constellation chosen by the caller. If it is not currently visible the
    /// outcome is `NoneVisible`.
    Named { constellation: String },
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        Self::Random { seed: None }
    }
}

impl SelectionStrategy {
    /// Index into `visible`, or `None` when this strategy picks nothing.
    fn pick(&self, visible: &[String]) -> Option<usize> {
        if visible.is_empty() {
            return None;
        }
        match self {
            Self::First => Some(0),
            Self::Random { seed: Some(seed) } => {
                Some(StdRng::seed_from_u64(*seed).random_range(0..visible.len()))
            }
            Self::Random { seed: None } => Some(rand::rng().random_range(0..visible.len())),
            Self::Named { constellation } => visible.iter().position(|c| c == constellation),
        }
    }
}

/// Parameters of the visibility scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Degrees of altitude a member star must exceed.
    /// Default: 45.0
    pub altitude_threshold_deg: f64,
    /// Default strategy for [`VisibilitySelector::select`].
    /// Default: Random { seed: None }
    pub strategy: SelectionStrategy,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            altitude_threshold_deg: DEFAULT_ALTITUDE_THRESHOLD_DEG,
            strategy: SelectionStrategy::default(),
        }
    }
}

/// A constellation, its guide star, and where to look for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityResult {
    pub constellation: String,
    pub guide_star: CatalogStar,
    pub position: HorizontalPosition,
}

/// Outcome of a selection. Finding nothing is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Visible(VisibilityResult),
    NoneVisible,
}

impl Selection {
    pub fn visible(&self) -> Option<&VisibilityResult> {
        match self {
            Self::Visible(result) => Some(result),
            Self::NoneVisible => None,
        }
    }

    pub fn is_none_visible(&self) -> bool {
        matches!(self, Self::NoneVisible)
    }
}

pub struct VisibilitySelector<P> {
    catalog: Arc<StarCatalog>,
    provider: P,
    config: SelectorConfig,
}

impl<P: ApparentPositionProvider> VisibilitySelector<P> {
    pub fn new(catalog: Arc<StarCatalog>, provider: P, config: SelectorConfig) -> Result<Self> {
        if !config.altitude_threshold_deg.is_finite()
            || !(-90.0..=90.0).contains(&config.altitude_threshold_deg)
        {
            return Err(SkyguideError::invalid(format!(
                "altitude threshold {} outside [-90, 90]",
                config.altitude_threshold_deg
            )));
        }
        Ok(Self {
            catalog,
            provider,
            config,
        })
    }

    pub fn catalog(&self) -> &StarCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Constellations with at least one member above the threshold, each listed once.
    pub fn visible_constellations(&self, query: &ObserverQuery) -> Result<Vec<String>> {
        if self.catalog.is_empty() {
            return Err(SkyguideError::catalog("catalog contains no stars"));
        }

        let threshold = self.config.altitude_threshold_deg;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut visible = Vec::new();
        let mut evaluated = 0usize;

        for star in self.catalog.stars() {
            if seen.contains(star.constellation.as_str()) {
                continue;
            }
            evaluated += 1;
            let pos = self
                .provider
                .apparent_position(star, &query.observer, &query.time)?;
            if pos.altitude_deg > threshold {
                seen.insert(star.constellation.as_str());
                visible.push(star.constellation.clone());
            }
        }

        debug!(
            "Visibility scan at lat {:.3}, lon {:.3}, {}: {} of {} stars evaluated, {} constellations above {} deg",
            query.observer.latitude_deg(),
            query.observer.longitude_deg(),
            query.time,
            evaluated,
            self.catalog.len(),
            visible.len(),
            threshold
        );
        Ok(visible)
    }

    /// Select with the configured strategy.
    pub fn select(&self, query: &ObserverQuery) -> Result<Selection> {
        self.select_with(query, &self.config.strategy)
    }

    /// Select with an explicit strategy.
    pub fn select_with(
        &self,
        query: &ObserverQuery,
        strategy: &SelectionStrategy,
    ) -> Result<Selection> {
        let visible = self.visible_constellations(query)?;
        let Some(idx) = strategy.pick(&visible) else {
            debug!("No constellation selected with {:?}", strategy);
            return Ok(Selection::NoneVisible);
        };
        let result = self.locate_guide_star(&visible[idx], query)?;
        Ok(Selection::Visible(result))
    }

    /// Guide star and position for every visible constellation, in visible-list order.
    pub fn survey(&self, query: &ObserverQuery) -> Result<Vec<VisibilityResult>> {
        self.visible_constellations(query)?
            .iter()
            .map(|c| self.locate_guide_star(c, query))
            .collect()
    }

    /// Look up the guide star of `constellation` and compute where it is.
    pub fn locate_guide_star(
        &self,
        constellation: &str,
        query: &ObserverQuery,
    ) -> Result<VisibilityResult> {
        let guide = self.catalog.guide_star(constellation).ok_or_else(|| {
            SkyguideError::invalid(format!("unknown constellation {constellation:?}"))
        })?;
        let position = self
            .provider
            .apparent_position(guide, &query.observer, &query.time)?;
        Ok(VisibilityResult {
            constellation: constellation.to_string(),
            guide_star: guide.clone(),
            position,
        })
    }
}

/// One-shot selection from raw request values.
///
/// Validates the coordinates and timestamp, scans `catalog` with `provider`,
/// and applies `strategy` with the default 45 degree threshold.
pub fn select_visible_constellation<P: ApparentPositionProvider>(
    catalog: Arc<StarCatalog>,
    latitude_deg: f64,
    longitude_deg: f64,
    timestamp: &str,
    provider: P,
    strategy: SelectionStrategy,
) -> Result<Selection> {
    let query = ObserverQuery::parse(latitude_deg, longitude_deg, timestamp)?;
    let config = SelectorConfig {
        strategy,
        ..Default::default()
    };
    VisibilitySelector::new(catalog, provider, config)?.select(&query)
}
