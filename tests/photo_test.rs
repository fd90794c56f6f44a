//! Render a constellation into a synthetic night-sky frame, then recover it.

use nalgebra::{Rotation2, Vector2};
use skyguide::photo::{
    analyze_centroids, extraction::extract_centroids_from_raw, ConstellationMatcher,
    ExtractionConfig, MatchConfig, Threshold,
};
use skyguide::StarCatalog;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// Gray sky with a little deterministic noise and a 3x3 blob per star.
fn render(points: &[Vector2<f64>], roll_deg: f64, scale: f64) -> Vec<f32> {
    let w = WIDTH as usize;
    let mut pixels: Vec<f32> = (0..w * HEIGHT as usize)
        .map(|i| 30.0 + ((i * 2654435761) % 7) as f32)
        .collect();

    let rot = Rotation2::new(roll_deg.to_radians());
    for (rank, p) in points.iter().enumerate() {
        let q = rot * p * scale;
        let col = (WIDTH as f64 / 2.0 + q.x).round() as usize;
        let row = (HEIGHT as f64 / 2.0 + q.y).round() as usize;
        let peak = 250.0 - 15.0 * rank as f32;
        for dr in 0..3 {
            for dc in 0..3 {
                let v = if dr == 1 && dc == 1 { peak } else { peak * 0.7 };
                pixels[(row + dr - 1) * w + (col + dc - 1)] = v;
            }
        }
    }
    pixels
}

fn matcher() -> ConstellationMatcher {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();
    let catalog = StarCatalog::bundled().expect("bundled catalog");
    ConstellationMatcher::from_catalog(&catalog, MatchConfig::default())
}

#[test]
fn recovers_ursa_major_from_pixels() {
    let matcher = matcher();
    let template = matcher
        .templates()
        .iter()
        .find(|t| t.constellation == "UMa")
        .unwrap();

    let pixels = render(&template.points, 73.0, 95.0);
    let extracted =
        extract_centroids_from_raw(&pixels, WIDTH, HEIGHT, &ExtractionConfig::default()).unwrap();
    assert_eq!(extracted.centroids.len(), template.points.len());

    let report = analyze_centroids(&matcher, &extracted.centroids, Some("UMa"));
    let identified = report.identified.as_ref().unwrap();
    assert_eq!(identified.constellation, "UMa");
    assert!(report.matched_constellation);
    assert!(identified.score < 0.05, "score {}", identified.score);
}

#[test]
fn wrong_claim_is_not_confirmed() {
    let matcher = matcher();
    let template = matcher
        .templates()
        .iter()
        .find(|t| t.constellation == "Ori")
        .unwrap();

    let pixels = render(&template.points, 200.0, 90.0);
    let config = ExtractionConfig {
        threshold: Threshold::Fixed(100.0),
        ..Default::default()
    };
    let extracted = extract_centroids_from_raw(&pixels, WIDTH, HEIGHT, &config).unwrap();
    assert_eq!(extracted.centroids.len(), template.points.len());

    assert!(matcher.verify_claim(&extracted.centroids, "Ori"));
    assert!(!matcher.verify_claim(&extracted.centroids, "UMa"));
    let report = analyze_centroids(&matcher, &extracted.centroids, Some("Cas"));
    assert!(!report.matched_constellation);
}

#[test]
fn empty_sky_matches_nothing() {
    let matcher = matcher();
    let pixels = render(&[], 0.0, 1.0);
    let extracted =
        extract_centroids_from_raw(&pixels, WIDTH, HEIGHT, &ExtractionConfig::default()).unwrap();
    assert!(extracted.centroids.is_empty());
    let report = analyze_centroids(&matcher, &extracted.centroids, Some("UMa"));
    assert!(report.identified.is_none());
    assert!(!report.matched_constellation);
}
