//! Fire-Year Matcher & Masker
//!
//! Selectors map a calendar window to the fire months it excludes; the
//! matcher pairs every scene with the fire-scar raster of its year; the
//! masker aligns that raster onto the scene and writes the masked copy
//! once, atomically, beside the scene.

mod masker;
mod matcher;
mod season;

pub use masker::{apply_mask, write_atomic, MaskNaming, MaskOutcome, SceneMasker};
pub use matcher::{FireYearMatcher, UnmatchedReason};
pub use season::{ExcludedMonths, SeasonMode, SeasonSelector, WindowPolicy};
