//! # skyguide
//!
//! Find a constellation that is **high in the sky right now**, and the star to
//! look for first.
//!
//! Given an observer's latitude, longitude (east-positive), and a UTC instant,
//! `skyguide` scans a constellation-labelled star catalog, keeps every
//! constellation with at least one member more than 45 degrees above the
//! horizon, picks one, and reports its brightest member (the *guide star*)
//! with the altitude and azimuth to point at.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use skyguide::{
//!     AltAzProvider, ObserverQuery, SelectionStrategy, SelectorConfig, StarCatalog,
//!     VisibilitySelector,
//! };
//!
//! let catalog = Arc::new(StarCatalog::bundled().unwrap());
//! let config = SelectorConfig {
//!     strategy: SelectionStrategy::First,
//!     ..Default::default()
//! };
//! let selector = VisibilitySelector::new(catalog, AltAzProvider::default(), config).unwrap();
//!
//! let query = ObserverQuery::parse(37.0, -122.0, "2024-03-08T07:56:00Z").unwrap();
//! if let Some(found) = selector.select(&query).unwrap().visible() {
//!     println!(
//!         "Look for {} in {}: alt {:.1}, az {:.1}",
//!         found.guide_star.label(),
//!         found.constellation,
//!         found.position.altitude_deg,
//!         found.position.azimuth_deg
//!     );
//! }
//! ```
//!
//! ## Layout
//!
//! - [`starcatalog`]: CSV loading, magnitude cut, per-constellation index, guide stars
//! - [`position`]: the [`ApparentPositionProvider`] seam and the sidereal-time
//!   based [`AltAzProvider`]
//! - [`selector`]: the visibility scan and selection strategies
//! - [`service`] and [`observations`]: request/response shapes and the per-caller audit log
//! - [`photo`]: star extraction from a photo and constellation pattern matching

pub(crate) mod catalogs;
pub mod config;
pub mod error;
pub mod observations;
pub mod observer;
pub mod photo;
pub mod position;
pub mod selector;
pub mod service;
pub mod star;
pub mod starcatalog;

pub use config::SkyguideConfig;
pub use error::{Result, SkyguideError};
pub use observations::{
    CallerId, InMemoryObservationStore, JsonLinesObservationStore, ObservationRecord,
    ObservationStore,
};
pub use observer::{parse_timestamp, Observer, ObserverQuery};
pub use position::{AltAzProvider, ApparentPositionProvider, HorizontalPosition};
pub use selector::{
    select_visible_constellation, Selection, SelectionStrategy, SelectorConfig,
    VisibilityResult, VisibilitySelector,
};
pub use service::{
    acknowledge_location, ApiReply, ConstellationService, LocationAck, LocationRequest,
    ObservationView, VisibleOutcome, VisibleResponse,
};
pub use star::*;
pub use starcatalog::*;
