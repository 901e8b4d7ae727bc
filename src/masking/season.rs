//! Calendar-window selectors and the fire months they exclude

use serde::Deserialize;
use std::fmt;

use crate::catalog::ImageAsset;
use crate::errors::{PipelineError, PipelineResult};
use crate::products::TemporalKind;

/// How multi-month windows map to excluded fire months
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowPolicy {
    /// Exclude the inclusive range `[lower, upper]`
    #[default]
    Inclusive,
    /// Exclude every month from January up to the upper bound
    Cumulative,
}

/// A calendar-window selector
///
/// Codes are `MMMM` (lower and upper month) for windows and `MM` for
/// single months. Single months always exclude fires from January up to
/// and including that month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeasonSelector {
    /// `0112`
    WholeYear,
    /// `1202`, December to February; treated as the whole year
    WrappedYear,
    /// `0509`
    DrySeason,
    /// `0608`
    JuneAugust,
    /// `0911`
    SeptemberNovember,
    /// `01` .. `12`
    Month(u8),
}

impl SeasonSelector {
    /// Parse a selector code
    pub fn parse(code: &str) -> PipelineResult<Self> {
        let selector = match code.trim() {
            "0112" => SeasonSelector::WholeYear,
            "1202" => SeasonSelector::WrappedYear,
            "0509" => SeasonSelector::DrySeason,
            "0608" => SeasonSelector::JuneAugust,
            "0911" => SeasonSelector::SeptemberNovember,
            other if other.len() == 2 => match other.parse::<u8>() {
                Ok(m @ 1..=12) => SeasonSelector::Month(m),
                _ => return Err(PipelineError::UnknownSelector(code.to_string())),
            },
            _ => return Err(PipelineError::UnknownSelector(code.to_string())),
        };
        Ok(selector)
    }

    /// Every selector in the closed set
    pub fn all() -> Vec<SeasonSelector> {
        let mut all = vec![
            SeasonSelector::WholeYear,
            SeasonSelector::WrappedYear,
            SeasonSelector::DrySeason,
            SeasonSelector::JuneAugust,
            SeasonSelector::SeptemberNovember,
        ];
        all.extend((1..=12).map(SeasonSelector::Month));
        all
    }

    /// Selector for a seasonal composite starting in `start_month`
    pub fn for_composite_start(start_month: u8) -> Option<Self> {
        match start_month {
            6 => Some(SeasonSelector::JuneAugust),
            9 => Some(SeasonSelector::SeptemberNovember),
            12 => Some(SeasonSelector::WrappedYear),
            _ => None,
        }
    }

    /// Selector for a single-date scene acquired in `month`
    pub fn for_scene_month(month: u8) -> Option<Self> {
        (1..=12).contains(&month).then_some(SeasonSelector::Month(month))
    }

    pub fn code(&self) -> String {
        match self {
            SeasonSelector::WholeYear => "0112".to_string(),
            SeasonSelector::WrappedYear => "1202".to_string(),
            SeasonSelector::DrySeason => "0509".to_string(),
            SeasonSelector::JuneAugust => "0608".to_string(),
            SeasonSelector::SeptemberNovember => "0911".to_string(),
            SeasonSelector::Month(m) => format!("{:02}", m),
        }
    }

    /// Fire months masked out by this selector
    pub fn excluded_months(&self, policy: WindowPolicy) -> ExcludedMonths {
        let (lower, upper) = match self {
            SeasonSelector::WholeYear | SeasonSelector::WrappedYear => return ExcludedMonths::all(),
            SeasonSelector::Month(m) => return ExcludedMonths::range(1, *m),
            SeasonSelector::DrySeason => (5, 9),
            SeasonSelector::JuneAugust => (6, 8),
            SeasonSelector::SeptemberNovember => (9, 11),
        };
        match policy {
            WindowPolicy::Inclusive => ExcludedMonths::range(lower, upper),
            WindowPolicy::Cumulative => ExcludedMonths::range(1, upper),
        }
    }
}

impl fmt::Display for SeasonSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Where each scene's season selector comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonMode {
    /// Derived from the scene date; `fallback` for composites with no window
    PerScene { fallback: SeasonSelector },
    /// One selector for every scene
    Fixed(SeasonSelector),
}

impl SeasonMode {
    /// Selector applied to `scene`
    pub fn selector_for(&self, scene: &ImageAsset) -> SeasonSelector {
        match *self {
            SeasonMode::Fixed(selector) => selector,
            SeasonMode::PerScene { fallback } => match scene.temporal {
                TemporalKind::Seasonal => SeasonSelector::for_composite_start(scene.start_month).unwrap_or(fallback),
                TemporalKind::SingleDate | TemporalKind::Monthly => {
                    SeasonSelector::for_scene_month(scene.start_month).unwrap_or(fallback)
                }
            },
        }
    }
}

/// A set of month codes (1-12) stored as a bit mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExcludedMonths(u16);

impl ExcludedMonths {
    /// Months `lower..=upper`; empty when `lower > upper`
    pub fn range(lower: u8, upper: u8) -> Self {
        let bits = (lower.max(1)..=upper.min(12)).fold(0u16, |acc, m| acc | (1 << m));
        ExcludedMonths(bits)
    }

    pub fn all() -> Self {
        Self::range(1, 12)
    }

    pub fn contains(&self, month: u8) -> bool {
        (1..=12).contains(&month) && self.0 & (1 << month) != 0
    }

    /// Whether a fire-scar pixel value is one of the excluded months
    ///
    /// Non-integral, non-finite and out-of-range values (background,
    /// no-data) never match.
    pub fn matches_pixel(&self, value: f32) -> bool {
        if !value.is_finite() || value.fract() != 0.0 || !(1.0..=12.0).contains(&value) {
            return false;
        }
        self.contains(value as u8)
    }

    pub fn is_superset(&self, other: &ExcludedMonths) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn months(&self) -> Vec<u8> {
        (1..=12).filter(|m| self.contains(*m)).collect()
    }
}

impl fmt::Display for ExcludedMonths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let months: Vec<String> = self.months().iter().map(|m| m.to_string()).collect();
        write!(f, "{{{}}}", months.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excluded(code: &str) -> ExcludedMonths {
        SeasonSelector::parse(code).unwrap().excluded_months(WindowPolicy::Inclusive)
    }

    #[test]
    fn dry_season_excludes_inclusive_range() {
        let dry = excluded("0509");
        let kept: Vec<u8> = [1u8, 5, 6, 9, 12].into_iter().filter(|m| !dry.contains(*m)).collect();
        assert_eq!(kept, vec![1, 12]);
        assert_eq!(dry.months(), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn single_month_is_cumulative_from_january() {
        assert_eq!(excluded("07").months(), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(excluded("01").months(), vec![1]);
        assert_eq!(excluded("12"), ExcludedMonths::all());
    }

    #[test]
    fn whole_year_selectors_exclude_everything() {
        assert_eq!(excluded("0112").len(), 12);
        assert_eq!(excluded("1202").len(), 12);
    }

    #[test]
    fn whole_year_contains_every_other_selector() {
        let whole = excluded("0112");
        for policy in [WindowPolicy::Inclusive, WindowPolicy::Cumulative] {
            for selector in SeasonSelector::all() {
                assert!(whole.is_superset(&selector.excluded_months(policy)), "{}", selector);
            }
        }
        assert!(whole.is_superset(&excluded("0608")));
        assert!(whole.is_superset(&excluded("07")));
    }

    #[test]
    fn cumulative_policy_chains_windows_and_months() {
        let policy = WindowPolicy::Cumulative;
        let whole = SeasonSelector::WholeYear.excluded_months(policy);
        let jun_aug = SeasonSelector::JuneAugust.excluded_months(policy);
        let july = SeasonSelector::Month(7).excluded_months(policy);
        assert!(whole.is_superset(&jun_aug));
        assert!(jun_aug.is_superset(&july));
        assert_eq!(SeasonSelector::DrySeason.excluded_months(policy).months(), (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn inclusive_window_does_not_cover_earlier_months() {
        // July's cumulative set reaches back to January, Jun-Aug does not
        assert!(!excluded("0608").is_superset(&excluded("07")));
    }

    #[test]
    fn pixel_matching_ignores_background_and_nodata() {
        let set = excluded("0608");
        assert!(set.matches_pixel(6.0));
        assert!(!set.matches_pixel(0.0));
        assert!(!set.matches_pixel(6.5));
        assert!(!set.matches_pixel(f32::NAN));
        assert!(!set.matches_pixel(255.0));
    }

    #[test]
    fn selector_codes_round_trip_and_reject_others() {
        for selector in SeasonSelector::all() {
            assert_eq!(SeasonSelector::parse(&selector.code()).unwrap(), selector);
        }
        assert_eq!(SeasonSelector::all().len(), 17);
        for bad in ["13", "00", "0305", "summer", ""] {
            assert!(matches!(SeasonSelector::parse(bad), Err(PipelineError::UnknownSelector(_))));
        }
    }

    #[test]
    fn composite_start_months_map_to_windows() {
        assert_eq!(SeasonSelector::for_composite_start(6), Some(SeasonSelector::JuneAugust));
        assert_eq!(SeasonSelector::for_composite_start(9), Some(SeasonSelector::SeptemberNovember));
        assert_eq!(SeasonSelector::for_composite_start(12), Some(SeasonSelector::WrappedYear));
        assert_eq!(SeasonSelector::for_composite_start(3), None);
        assert_eq!(SeasonSelector::for_scene_month(7), Some(SeasonSelector::Month(7)));
        assert_eq!(SeasonSelector::for_scene_month(0), None);
    }
}
