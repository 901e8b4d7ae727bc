//! Site Aggregator
//!
//! Partitions zonal rows by site, orders each partition by date and
//! writes one table per site and product.

use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PipelineError, PipelineResult};
use crate::zonal::ZonalRow;

/// Table receiving rows whose site name is empty
pub const FALLBACK_SITE: &str = "unknown_site";

/// Rows of one site, ordered by date then image name
#[derive(Debug, Clone, PartialEq)]
pub struct SiteTable {
    pub site: String,
    pub rows: Vec<ZonalRow>,
}

fn site_key(row: &ZonalRow) -> String {
    let site = row.site.trim();
    if site.is_empty() {
        FALLBACK_SITE.to_string()
    } else {
        site.to_string()
    }
}

/// Partition `rows` by site
///
/// Every input row lands in exactly one table.
pub fn aggregate(rows: Vec<ZonalRow>) -> Vec<SiteTable> {
    let mut by_site: BTreeMap<String, Vec<ZonalRow>> = BTreeMap::new();
    for row in rows {
        by_site.entry(site_key(&row)).or_default().push(row);
    }
    by_site
        .into_iter()
        .map(|(site, mut rows)| {
            rows.sort_by(|a, b| {
                (a.start_date, a.end_date, &a.image, a.uid).cmp(&(b.start_date, b.end_date, &b.image, b.uid))
            });
            SiteTable { site, rows }
        })
        .collect()
}

/// `<site>_<product>_zonal_stats.csv`, with path separators replaced
pub fn site_file_name(site: &str, product: &str) -> String {
    let safe: String = site.chars().map(|c| if c == '/' || c == '\\' { '_' } else { c }).collect();
    format!("{}_{}_zonal_stats.csv", safe, product)
}

/// Write one CSV per table into `out_dir`
///
/// # Arguments
/// * `tables` - Output of [`aggregate`]
/// * `product` - Product code used in file names
/// * `label` - Column namespace of the product
/// * `out_dir` - Directory receiving the tables
pub fn write_site_tables(tables: &[SiteTable], product: &str, label: &str, out_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    let mut written = Vec::with_capacity(tables.len());
    for table in tables {
        let Some(first) = table.rows.first() else { continue };
        let bands = first.band_numbers();
        let path = out_dir.join(site_file_name(&table.site, product));
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(&path)?;
        writer.write_record(ZonalRow::header(label, &bands))?;
        for row in &table.rows {
            if row.band_numbers() != bands {
                return Err(PipelineError::InvalidInput(format!(
                    "{} has bands {:?}, table {} expects {:?}",
                    row.image,
                    row.band_numbers(),
                    table.site,
                    bands
                )));
            }
            writer.write_record(row.record())?;
        }
        writer.flush()?;
        written.push(path);
    }
    info!("Wrote {} site table(s) to {}", written.len(), out_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zonal::{BandRecord, ZoneStats};
    use chrono::NaiveDate;

    fn row(site: &str, image: &str, day: u32) -> ZonalRow {
        let date = NaiveDate::from_ymd_opt(2019, 6, day).unwrap();
        ZonalRow {
            uid: 1,
            site: site.to_string(),
            image: image.to_string(),
            start_date: date,
            end_date: date,
            label: "dbg".to_string(),
            bands: vec![BandRecord { band: 1, stats: ZoneStats::from_values(vec![1.0, 2.0]) }],
        }
    }

    #[test]
    fn tables_partition_rows_and_sort_by_date() {
        let rows = vec![
            row("beta", "b2", 20),
            row("alpha", "a2", 28),
            row("", "orphan", 1),
            row("alpha", "a1", 4),
            row("beta", "b1", 12),
        ];
        let tables = aggregate(rows.clone());
        let sites: Vec<&str> = tables.iter().map(|t| t.site.as_str()).collect();
        assert_eq!(sites, vec!["alpha", "beta", FALLBACK_SITE]);
        assert_eq!(tables.iter().map(|t| t.rows.len()).sum::<usize>(), rows.len());
        let alpha: Vec<&str> = tables[0].rows.iter().map(|r| r.image.as_str()).collect();
        assert_eq!(alpha, vec!["a1", "a2"]);
    }

    #[test]
    fn one_file_per_site() {
        let dir = tempfile::tempdir().unwrap();
        let tables = aggregate(vec![row("alpha", "a1", 4), row("beta", "b1", 5), row("alpha", "a2", 6)]);
        let written = write_site_tables(&tables, "dbg", "dbg", dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        let alpha = fs::read_to_string(dir.path().join("alpha_dbg_zonal_stats.csv")).unwrap();
        let lines: Vec<&str> = alpha.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("uid,site,image,year,month,day,start_date,end_date,b1_dbg_count,b1_dbg_min"));
        assert!(lines[1].starts_with("1,alpha,a1,2019,06,04,2019-06-04,2019-06-04,2,1,2,1.5"));
    }

    #[test]
    fn site_names_cannot_escape_the_output_directory() {
        assert_eq!(site_file_name("a/b", "ref"), "a_b_ref_zonal_stats.csv");
    }
}
