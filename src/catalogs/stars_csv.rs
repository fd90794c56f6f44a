//! Reader for the constellation-labelled star table.
//!
//! The table is a CSV file with a header row. Columns are matched by name, so
//! extra columns (e.g. `ra_hours`, `epoch_year`) are ignored:
//!
//! | column | required | meaning |
//! |---|---|---|
//! | `hip` | no | Hipparcos number, used as the star id |
//! | `name` | no | proper name |
//! | `ra_degrees` | yes | right ascension, degrees |
//! | `dec_degrees` | yes | declination, degrees |
//! | `magnitude` | yes | visual magnitude |
//! | `parallax_mas` | no | parallax, milliarcseconds |
//! | `ra_mas_per_year` | no | mu_alpha * cos(delta), mas/yr |
//! | `dec_mas_per_year` | no | mu_delta, mas/yr |
//! | `constellation` | yes | constellation label |
//!
//! Empty cells parse as missing. Rows without a usable position or magnitude are
//! skipped rather than failing the whole load.

use std::io::Read;

use serde::Deserialize;
use tracing::warn;

use crate::star::{propagate_proper_motion, CatalogStar};

#[derive(Debug, Deserialize)]
struct StarRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    hip: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    ra_degrees: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    dec_degrees: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnitude: Option<f32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    parallax_mas: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    ra_mas_per_year: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    dec_mas_per_year: Option<f64>,
    #[serde(default)]
    constellation: String,
}

/// Parse every usable row of a star table.
///
/// `epoch_year`: when set, rows carrying both proper-motion rates are moved
/// from the Hipparcos epoch to that year.
///
/// Returns the stars in file order and the number of skipped rows.
pub fn read_star_table<R: Read>(
    reader: R,
    epoch_year: Option<f64>,
) -> Result<(Vec<CatalogStar>, usize), csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut stars = Vec::new();
    let mut skipped = 0usize;
    for (row_idx, result) in rdr.deserialize::<StarRow>().enumerate() {
        let row = result?;
        match star_from_row(row, row_idx, epoch_year) {
            Some(star) => stars.push(star),
            None => skipped += 1,
        }
    }
    Ok((stars, skipped))
}

fn star_from_row(row: StarRow, row_idx: usize, epoch_year: Option<f64>) -> Option<CatalogStar> {
    let (Some(ra), Some(dec), Some(mag)) = (row.ra_degrees, row.dec_degrees, row.magnitude) else {
        warn!("Skipping star table row {}: missing position or magnitude", row_idx + 1);
        return None;
    };
    if !ra.is_finite() || !dec.is_finite() || !mag.is_finite() || !(-90.0..=90.0).contains(&dec) {
        warn!("Skipping star table row {}: non-finite or out-of-range values", row_idx + 1);
        return None;
    }
    let constellation = row.constellation.trim().to_string();
    if constellation.is_empty() {
        warn!("Skipping star table row {}: no constellation label", row_idx + 1);
        return None;
    }

    let (ra_deg, dec_deg) = match (epoch_year, row.ra_mas_per_year, row.dec_mas_per_year) {
        (Some(year), Some(pm_ra), Some(pm_dec)) => {
            propagate_proper_motion(ra, dec, pm_ra, pm_dec, year)
        }
        _ => (ra.rem_euclid(360.0), dec),
    };

    Some(CatalogStar {
        id: row.hip.unwrap_or(row_idx as u64),
        name: row.name.filter(|n| !n.trim().is_empty()),
        ra_deg,
        dec_deg,
        mag,
        parallax_mas: row.parallax_mas.filter(|p| p.is_finite()),
        constellation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_source_layout_with_extra_columns() {
        // Layout written by the catalog preparation step: index column first,
        // then the Hipparcos dataframe columns, constellation last.
        let data = "\
hip,magnitude,ra_degrees,dec_degrees,parallax_mas,ra_mas_per_year,dec_mas_per_year,ra_hours,epoch_year,constellation
677,2.07,2.09653,29.09043,33.62,135.68,-162.95,0.13977,1991.25,And
746,2.28,2.29452,59.14978,59.89,523.39,-180.42,0.15297,1991.25,Cas
";
        let (stars, skipped) = read_star_table(data.as_bytes(), None).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(stars.len(), 2);
        assert_eq!(stars[0].id, 677);
        assert_eq!(stars[0].constellation, "And");
        assert_eq!(stars[1].parallax_mas, Some(59.89));
        assert!(stars[0].name.is_none());
    }

    #[test]
    fn skips_rows_with_missing_coordinates() {
        let data = "\
hip,name,ra_degrees,dec_degrees,magnitude,constellation
1,A,,10.0,3.0,Ori
2,B,10.0,10.0,,Ori
3,C,10.0,10.0,4.0,
4,D,10.0,10.0,4.0,Ori
";
        let (stars, skipped) = read_star_table(data.as_bytes(), None).unwrap();
        assert_eq!(skipped, 3);
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].name.as_deref(), Some("D"));
    }

    #[test]
    fn propagates_when_epoch_given() {
        let data = "\
hip,ra_degrees,dec_degrees,magnitude,ra_mas_per_year,dec_mas_per_year,constellation
32349,101.28715533,-16.71611586,-1.44,-546.01,-1223.07,CMa
";
        let (at_epoch, _) = read_star_table(data.as_bytes(), None).unwrap();
        let (moved, _) = read_star_table(data.as_bytes(), Some(2025.0)).unwrap();
        assert!(moved[0].dec_deg < at_epoch[0].dec_deg);
        assert!(moved[0].ra_deg < at_epoch[0].ra_deg);
    }

    #[test]
    fn missing_id_falls_back_to_row_index() {
        let data = "ra_degrees,dec_degrees,magnitude,constellation\n10,41,2.0,And\n150,60,1.0,UMa\n";
        let (stars, _) = read_star_table(data.as_bytes(), None).unwrap();
        assert_eq!(stars[0].id, 0);
        assert_eq!(stars[1].id, 1);
    }
}
