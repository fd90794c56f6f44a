//! Locate bright point sources in a grayscale sky photo.
//!
//! Pipeline:
//! 1. Background level = median pixel value; noise = sigma-clipped RMS of the
//!    pixels at or below the median (stars only bias the upper half)
//! 2. Threshold at `background + k * noise`, or at a fixed pixel value
//! 3. Connected-component labelling of the above-threshold mask (union-find)
//! 4. Intensity-weighted centroid per component, size-filtered
//! 5. Coordinates shifted so (0, 0) is the image centre, brightest first
//!
//! Decoding image files needs the `image` feature; raw pixel buffers work
//! without it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkyguideError};

/// A detected star in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    /// Pixels right of the image centre.
    pub x: f32,
    /// Pixels below the image centre.
    pub y: f32,
    /// Summed above-background intensity. Brighter stars have larger mass.
    pub mass: f32,
}

/// How the detection threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Threshold {
    /// `background + k * noise`
    Sigma(f32),
    /// Absolute pixel value. 200 suits 8-bit phone photos of a dark sky.
    Fixed(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Default: Sigma(5.0)
    pub threshold: Threshold,
    /// Smaller blobs are treated as hot pixels.
    /// Default: 3
    pub min_pixels: usize,
    /// Larger blobs are treated as extended objects (moon, street light).
    /// Default: 10000
    pub max_pixels: usize,
    /// Keep only this many of the brightest detections.
    /// Default: None
    pub max_centroids: Option<usize>,
    /// Default: 5
    pub sigma_clip_iterations: usize,
    /// Default: 3.0
    pub sigma_clip_factor: f32,
    /// 8-connectivity when true, 4-connectivity otherwise.
    /// Default: true
    pub use_8_connectivity: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            threshold: Threshold::Sigma(5.0),
            min_pixels: 3,
            max_pixels: 10000,
            max_centroids: None,
            sigma_clip_iterations: 5,
            sigma_clip_factor: 3.0,
            use_8_connectivity: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Detections, brightest first.
    pub centroids: Vec<Centroid>,
    pub image_width: u32,
    pub image_height: u32,
    pub background: f32,
    pub noise: f32,
    pub threshold: f32,
    /// Components found before the size filter.
    pub num_blobs_raw: usize,
}

/// Extract centroids from row-major grayscale pixels.
pub fn extract_centroids_from_raw(
    pixels: &[f32],
    width: u32,
    height: u32,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    let expected = width as usize * height as usize;
    if pixels.len() != expected {
        return Err(SkyguideError::invalid(format!(
            "pixel buffer has {} values, expected {}x{}={}",
            pixels.len(),
            width,
            height,
            expected
        )));
    }
    if expected == 0 {
        return Err(SkyguideError::invalid("image has no pixels"));
    }

    let (background, noise) = estimate_background(pixels, config);
    let threshold = match config.threshold {
        Threshold::Sigma(k) => background + k * noise,
        Threshold::Fixed(v) => v,
    };

    let mask: Vec<bool> = pixels.iter().map(|&v| v > threshold).collect();
    let (labels, num_labels) = label_components(&mask, width, height, config.use_8_connectivity);
    let num_blobs_raw = num_labels;

    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let bg_level = match config.threshold {
        Threshold::Sigma(_) => background,
        // Masked pixels must keep a positive weight even on a sky brighter than the cut.
        Threshold::Fixed(v) => v.min(background),
    };
    let mut centroids: Vec<Centroid> = blob_centroids(pixels, &labels, num_labels, width, bg_level)
        .into_iter()
        .filter(|b| b.pixel_count >= config.min_pixels && b.pixel_count <= config.max_pixels)
        .map(|b| Centroid {
            x: b.x_px - cx,
            y: b.y_px - cy,
            mass: b.mass,
        })
        .collect();

    centroids.sort_by(|a, b| b.mass.total_cmp(&a.mass));
    if let Some(max) = config.max_centroids {
        centroids.truncate(max);
    }

    Ok(ExtractionResult {
        centroids,
        image_width: width,
        image_height: height,
        background,
        noise,
        threshold,
        num_blobs_raw,
    })
}

#[cfg(feature = "image")]
mod decode {
    use anyhow::{Context, Result};
    use image::GenericImageView;

    use super::{extract_centroids_from_raw, ExtractionConfig, ExtractionResult};

    /// Decode an image file and extract centroids from its luminance.
    pub fn extract_centroids(
        path: impl AsRef<std::path::Path>,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let path = path.as_ref();
        let img = image::open(path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;
        extract_centroids_from_image(&img, config)
    }

    pub fn extract_centroids_from_image(
        img: &image::DynamicImage,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let (width, height) = img.dimensions();
        let gray: Vec<f32> = img.to_luma8().as_raw().iter().map(|&v| v as f32).collect();
        Ok(extract_centroids_from_raw(&gray, width, height, config)?)
    }
}

#[cfg(feature = "image")]
pub use decode::{extract_centroids, extract_centroids_from_image};

/// Median level and clipped lower-half noise.
fn estimate_background(pixels: &[f32], config: &ExtractionConfig) -> (f32, f32) {
    let mut values: Vec<f32> = pixels.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let n = values.len();
    let median = if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    };

    let mut low: Vec<f32> = values.into_iter().filter(|&v| v <= median).collect();
    let mut sigma = 0.0_f32;
    for _ in 0..config.sigma_clip_iterations {
        if low.is_empty() {
            break;
        }
        let mean = (low.iter().map(|&v| v as f64).sum::<f64>() / low.len() as f64) as f32;
        let var = low.iter().map(|&v| ((v - mean) as f64).powi(2)).sum::<f64>() / low.len() as f64;
        sigma = var.sqrt() as f32;
        if sigma < 1e-10 {
            break;
        }
        let lo = mean - config.sigma_clip_factor * sigma;
        let hi = mean + config.sigma_clip_factor * sigma;
        let before = low.len();
        low.retain(|&v| v >= lo && v <= hi);
        if low.len() == before {
            break;
        }
    }
    (median, sigma)
}

fn find(parent: &mut [u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        parent[x as usize] = parent[parent[x as usize] as usize];
        x = parent[x as usize];
    }
    x
}

fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra < rb {
        parent[rb as usize] = ra;
    } else if rb < ra {
        parent[ra as usize] = rb;
    }
}

/// Two-pass labelling. Returns sequential labels (0 = background) and their count.
fn label_components(mask: &[bool], width: u32, height: u32, eight: bool) -> (Vec<u32>, usize) {
    let w = width as usize;
    let h = height as usize;
    let mut labels = vec![0u32; w * h];
    let mut parent: Vec<u32> = vec![0];

    for row in 0..h {
        for col in 0..w {
            let idx = row * w + col;
            if !mask[idx] {
                continue;
            }

            let mut neighbours = [0u32; 4];
            if col > 0 {
                neighbours[0] = labels[idx - 1];
            }
            if row > 0 {
                neighbours[1] = labels[idx - w];
                if eight && col > 0 {
                    neighbours[2] = labels[idx - w - 1];
                }
                if eight && col + 1 < w {
                    neighbours[3] = labels[idx - w + 1];
                }
            }

            match neighbours.iter().copied().filter(|&l| l > 0).min() {
                None => {
                    let next = parent.len() as u32;
                    parent.push(next);
                    labels[idx] = next;
                }
                Some(min_label) => {
                    labels[idx] = min_label;
                    for &nl in neighbours.iter().filter(|&&l| l > 0) {
                        union(&mut parent, min_label, nl);
                    }
                }
            }
        }
    }

    let mut sequential: HashMap<u32, u32> = HashMap::new();
    for label in labels.iter_mut().filter(|l| **l > 0) {
        let root = find(&mut parent, *label);
        let next = sequential.len() as u32 + 1;
        *label = *sequential.entry(root).or_insert(next);
    }
    let count = sequential.len();
    (labels, count)
}

struct Blob {
    x_px: f32,
    y_px: f32,
    mass: f32,
    pixel_count: usize,
}

fn blob_centroids(
    pixels: &[f32],
    labels: &[u32],
    num_labels: usize,
    width: u32,
    bg_level: f32,
) -> Vec<Blob> {
    #[derive(Default, Clone, Copy)]
    struct Accum {
        sum_x: f64,
        sum_y: f64,
        sum_i: f64,
        count: usize,
    }

    let w = width as usize;
    let mut accums = vec![Accum::default(); num_labels + 1];
    for (idx, (&label, &value)) in labels.iter().zip(pixels).enumerate() {
        if label == 0 {
            continue;
        }
        // Pixel centres sit at +0.5 so a symmetric blob lands on its geometric centre.
        let col = (idx % w) as f64 + 0.5;
        let row = (idx / w) as f64 + 0.5;
        let intensity = (value - bg_level).max(0.0) as f64;
        let acc = &mut accums[label as usize];
        acc.sum_x += col * intensity;
        acc.sum_y += row * intensity;
        acc.sum_i += intensity;
        acc.count += 1;
    }

    accums
        .into_iter()
        .skip(1)
        .filter(|a| a.sum_i > 0.0)
        .map(|a| Blob {
            x_px: (a.sum_x / a.sum_i) as f32,
            y_px: (a.sum_y / a.sum_i) as f32,
            mass: a.sum_i as f32,
            pixel_count: a.count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat background with 3x3 square stars of the given peak at (col, row) centres.
    fn synthetic(width: u32, height: u32, stars: &[(usize, usize, f32)]) -> Vec<f32> {
        let w = width as usize;
        let mut pixels: Vec<f32> = (0..(w * height as usize))
            .map(|i| 20.0 + ((i * 7919) % 5) as f32)
            .collect();
        for &(c, r, peak) in stars {
            for dr in 0..3 {
                for dc in 0..3 {
                    let falloff = if dr == 1 && dc == 1 { 1.0 } else { 0.6 };
                    pixels[(r + dr - 1) * w + (c + dc - 1)] = peak * falloff;
                }
            }
        }
        pixels
    }

    #[test]
    fn finds_stars_brightest_first() {
        let pixels = synthetic(64, 48, &[(10, 10, 150.0), (40, 30, 250.0), (55, 5, 200.0)]);
        let result =
            extract_centroids_from_raw(&pixels, 64, 48, &ExtractionConfig::default()).unwrap();
        assert_eq!(result.centroids.len(), 3);

        let c = &result.centroids[0];
        // Star at pixel (40, 30): centre 40.5, 30.5 minus image centre 32, 24.
        assert!((c.x - 8.5).abs() < 1e-3, "x = {}", c.x);
        assert!((c.y - 6.5).abs() < 1e-3, "y = {}", c.y);
        assert!(result.centroids[0].mass > result.centroids[1].mass);
        assert!(result.centroids[1].mass > result.centroids[2].mass);
        assert!((result.background - 22.0).abs() <= 2.0);
    }

    #[test]
    fn fixed_threshold_drops_faint_stars() {
        let pixels = synthetic(64, 48, &[(10, 10, 150.0), (40, 30, 250.0)]);
        let config = ExtractionConfig {
            threshold: Threshold::Fixed(200.0),
            min_pixels: 1,
            ..Default::default()
        };
        let result = extract_centroids_from_raw(&pixels, 64, 48, &config).unwrap();
        // Only the 250 peak pixel (and none of its 150 shoulders) clears 200.
        assert_eq!(result.centroids.len(), 1);
        assert_eq!(result.threshold, 200.0);
    }

    #[test]
    fn size_filter_rejects_hot_pixels() {
        let mut pixels = synthetic(32, 32, &[(16, 16, 200.0)]);
        pixels[5 * 32 + 5] = 250.0;
        let result =
            extract_centroids_from_raw(&pixels, 32, 32, &ExtractionConfig::default()).unwrap();
        assert_eq!(result.num_blobs_raw, 2);
        assert_eq!(result.centroids.len(), 1);
    }

    #[test]
    fn max_centroids_truncates() {
        let pixels = synthetic(64, 64, &[(10, 10, 150.0), (30, 30, 250.0), (50, 50, 200.0)]);
        let config = ExtractionConfig {
            max_centroids: Some(2),
            ..Default::default()
        };
        let result = extract_centroids_from_raw(&pixels, 64, 64, &config).unwrap();
        assert_eq!(result.centroids.len(), 2);
    }

    #[test]
    fn diagonal_neighbours_merge_only_with_8_connectivity() {
        let mask = vec![
            true, false, false, //
            false, true, false, //
            false, false, true,
        ];
        assert_eq!(label_components(&mask, 3, 3, true).1, 1);
        assert_eq!(label_components(&mask, 3, 3, false).1, 3);
    }

    #[test]
    fn u_shape_merges_into_one_label() {
        let mask = vec![
            true, false, true, //
            true, false, true, //
            true, true, true,
        ];
        let (labels, count) = label_components(&mask, 3, 3, false);
        assert_eq!(count, 1);
        assert!(labels.iter().zip(&mask).all(|(&l, &m)| (l == 1) == m));
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let err = extract_centroids_from_raw(&[0.0; 10], 4, 4, &ExtractionConfig::default())
            .unwrap_err();
        assert!(matches!(err, SkyguideError::InvalidInput(_)));
        assert!(extract_centroids_from_raw(&[], 0, 0, &ExtractionConfig::default()).is_err());
    }
}
