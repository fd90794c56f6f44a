/// Constellation-labelled star tables (CSV).
pub mod stars_csv;
