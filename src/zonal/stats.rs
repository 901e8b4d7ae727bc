//! Per-zone summary statistics

/// Column suffixes, in output order
pub const STAT_NAMES: [&str; 12] = [
    "count", "min", "max", "mean", "med", "std", "p25", "p50", "p75", "p95", "p99", "range",
];

/// Statistics of the valid pixels in one zone of one band
///
/// `None` marks "no value": an empty zone, or a minimum removed by the
/// radiometric correction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ZoneStats {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Population standard deviation
    pub std: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    pub range: Option<f64>,
}

/// Percentile `q` (0-100) of sorted data with linear interpolation between ranks
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

impl ZoneStats {
    /// Summarise `values`; an empty slice gives count 0 and no values
    pub fn from_values(mut values: Vec<f64>) -> Self {
        values.retain(|v| v.is_finite());
        if values.is_empty() {
            return ZoneStats::default();
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = values[0];
        let max = values[values.len() - 1];
        let median = percentile(&values, 50.0);

        ZoneStats {
            count: values.len(),
            min: Some(min),
            max: Some(max),
            mean: Some(mean),
            median: Some(median),
            std: Some(variance.sqrt()),
            p25: Some(percentile(&values, 25.0)),
            p50: Some(median),
            p75: Some(percentile(&values, 75.0)),
            p95: Some(percentile(&values, 95.0)),
            p99: Some(percentile(&values, 99.0)),
            range: Some(max - min),
        }
    }

    /// A placeholder record for a band the sensor does not carry
    pub fn filled(sentinel: f64) -> Self {
        let v = Some(sentinel);
        ZoneStats {
            count: 0,
            min: v,
            max: v,
            mean: v,
            median: v,
            std: v,
            p25: v,
            p50: v,
            p75: v,
            p95: v,
            p99: v,
            range: v,
        }
    }

    /// Removes a radiometric offset from the location statistics
    ///
    /// A literal zero minimum is an empty-zone artifact and becomes no
    /// value before the offset is subtracted. Count, spread and range are
    /// unaffected. An offset of zero leaves the record untouched.
    pub fn corrected(self, offset: f64) -> Self {
        if offset == 0.0 {
            return self;
        }
        let shift = |v: Option<f64>| v.map(|v| v - offset);
        ZoneStats {
            min: shift(self.min.filter(|m| *m != 0.0)),
            max: shift(self.max),
            mean: shift(self.mean),
            median: shift(self.median),
            p25: shift(self.p25),
            p50: shift(self.p50),
            p75: shift(self.p75),
            p95: shift(self.p95),
            p99: shift(self.p99),
            ..self
        }
    }

    /// Values in [`STAT_NAMES`] order
    pub fn values(&self) -> [Option<f64>; 12] {
        [
            Some(self.count as f64),
            self.min,
            self.max,
            self.mean,
            self.median,
            self.std,
            self.p25,
            self.p50,
            self.p75,
            self.p95,
            self.p99,
            self.range,
        ]
    }
}
