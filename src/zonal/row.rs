//! Wide output rows: one per site and image

use chrono::{Datelike, NaiveDate};

use super::stats::{ZoneStats, STAT_NAMES};

/// Statistics of one planned band
#[derive(Debug, Clone, PartialEq)]
pub struct BandRecord {
    /// Band number as labelled in the output
    pub band: usize,
    pub stats: ZoneStats,
}

/// All planned bands of one image within one site
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalRow {
    pub uid: i64,
    pub site: String,
    /// File name of the source image
    pub image: String,
    /// Acquisition date or first day of the composite window
    pub start_date: NaiveDate,
    /// Acquisition date or last day of the composite window
    pub end_date: NaiveDate,
    /// Column namespace of the product
    pub label: String,
    pub bands: Vec<BandRecord>,
}

impl ZonalRow {
    /// Header for rows of `label` over `bands`
    pub fn header(label: &str, bands: &[usize]) -> Vec<String> {
        let mut header: Vec<String> = ["uid", "site", "image", "year", "month", "day", "start_date", "end_date"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for band in bands {
            header.extend(STAT_NAMES.iter().map(|stat| format!("b{}_{}_{}", band, label, stat)));
        }
        header
    }

    /// Band numbers in output order
    pub fn band_numbers(&self) -> Vec<usize> {
        self.bands.iter().map(|b| b.band).collect()
    }

    /// Field values matching [`ZonalRow::header`]; no value is an empty field
    pub fn record(&self) -> Vec<String> {
        let mut fields = vec![
            self.uid.to_string(),
            self.site.clone(),
            self.image.clone(),
            self.start_date.year().to_string(),
            format!("{:02}", self.start_date.month()),
            format!("{:02}", self.start_date.day()),
            self.start_date.format("%Y-%m-%d").to_string(),
            self.end_date.format("%Y-%m-%d").to_string(),
        ];
        for band in &self.bands {
            fields.extend(band.stats.values().iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()));
        }
        fields
    }
}
