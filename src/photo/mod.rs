//! Check an uploaded sky photo against a claimed constellation.

pub mod extraction;
pub mod matching;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use extraction::{Centroid, ExtractionConfig, ExtractionResult, Threshold};
pub use matching::{ConstellationMatch, ConstellationMatcher, MatchConfig};

/// Upload extensions accepted for analysis.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub const UPLOAD_MESSAGE: &str = "File uploaded successfully";

/// Whether `filename` has an accepted image extension, ignoring case.
pub fn allowed_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoReport {
    pub message: String,
    /// Number of stars detected in the photo.
    pub num_centroids: usize,
    /// Best match, if any template scored under the limit.
    pub identified: Option<ConstellationMatch>,
    pub claimed: Option<String>,
    /// True only when a claim was given and it equals the identified constellation.
    pub matched_constellation: bool,
}

/// Match detections and compare with an optional claim.
pub fn analyze_centroids(
    matcher: &ConstellationMatcher,
    centroids: &[Centroid],
    claimed: Option<&str>,
) -> PhotoReport {
    let identified = matcher.identify(centroids);
    let matched_constellation = match (&identified, claimed) {
        (Some(m), Some(c)) => m.constellation == c,
        _ => false,
    };
    PhotoReport {
        message: UPLOAD_MESSAGE.to_string(),
        num_centroids: centroids.len(),
        identified,
        claimed: claimed.map(str::to_string),
        matched_constellation,
    }
}

/// Decode `path`, extract stars, and match them.
#[cfg(feature = "image")]
pub fn analyze_photo(
    path: impl AsRef<Path>,
    matcher: &ConstellationMatcher,
    extraction: &ExtractionConfig,
    claimed: Option<&str>,
) -> anyhow::Result<PhotoReport> {
    let path = path.as_ref();
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    anyhow::ensure!(allowed_file(name), "Invalid file: {}", path.display());

    let result = extraction::extract_centroids(path, extraction)?;
    tracing::info!(
        "Extracted {} stars from {} ({}x{}, threshold {:.1})",
        result.centroids.len(),
        path.display(),
        result.image_width,
        result.image_height,
        result.threshold
    );
    Ok(analyze_centroids(matcher, &result.centroids, claimed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_extensions() {
        for ok in ["sky.jpg", "sky.JPEG", "a.b.png", "/tmp/uploads/blob.Png"] {
            assert!(allowed_file(ok), "{ok}");
        }
        for bad in ["sky", "sky.gif", "sky.jpg.exe", ".png", "png", "sky."] {
            assert!(!allowed_file(bad), "{bad}");
        }
    }

    #[test]
    fn report_without_claim_never_matches() {
        let matcher = ConstellationMatcher::from_catalog(
            &crate::StarCatalog::bundled().unwrap(),
            MatchConfig::default(),
        );
        let report = analyze_centroids(&matcher, &[], None);
        assert_eq!(report.message, "File uploaded successfully");
        assert_eq!(report.num_centroids, 0);
        assert!(report.identified.is_none());
        assert!(!report.matched_constellation);
    }
}
