//! Per-scene fire masking
//!
//! [`SceneMasker::process`] walks one scene through
//! `Start -> Matched -> Aligned -> Written` and always ends in a
//! [`MaskOutcome`]. Per-scene failures become outcomes; nothing here
//! aborts a run.

use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::matcher::{FireYearMatcher, UnmatchedReason};
use super::season::{ExcludedMonths, SeasonSelector, WindowPolicy};
use crate::catalog::{FireFamily, FireScarAsset, ImageAsset};
use crate::errors::{PipelineError, PipelineResult};
use crate::products::MaskTags;
use crate::raster::{Raster, RasterAligner, RasterStore};
use crate::workspace::WorkItemDir;

/// Deterministic names of masked outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskNaming {
    stripped_suffix: String,
    archival_tag: String,
    near_real_time_tag: String,
}

impl MaskNaming {
    /// # Arguments
    /// * `stripped_suffix` - Processing suffix removed from scene stems (may be empty)
    /// * `tags` - Output tag per fire-scar family
    pub fn new(stripped_suffix: &str, tags: &MaskTags) -> Self {
        MaskNaming {
            stripped_suffix: stripped_suffix.to_string(),
            archival_tag: tags.archival.clone(),
            near_real_time_tag: tags.near_real_time.clone(),
        }
    }

    pub fn tag(&self, family: FireFamily) -> &str {
        match family {
            FireFamily::Archival => &self.archival_tag,
            FireFamily::NearRealTime => &self.near_real_time_tag,
        }
    }

    fn base_stem(&self, scene: &Path) -> String {
        let stem = scene.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        match stem.strip_suffix(self.stripped_suffix.as_str()) {
            Some(base) if !self.stripped_suffix.is_empty() => base.to_string(),
            _ => stem,
        }
    }

    /// `<dir>/<stem>_<tag>.tif` beside the scene
    pub fn output_path(&self, scene: &Path, family: FireFamily) -> PathBuf {
        let name = format!("{}_{}.tif", self.base_stem(scene), self.tag(family));
        scene.with_file_name(name)
    }

    /// An output already written for `scene` under either family's tag
    pub fn existing_output(&self, scene: &Path) -> Option<PathBuf> {
        [FireFamily::Archival, FireFamily::NearRealTime]
            .into_iter()
            .map(|family| self.output_path(scene, family))
            .find(|path| path.is_file())
    }

    /// File-name endings that identify masked outputs
    pub fn output_suffixes(&self) -> [String; 2] {
        [format!("_{}.tif", self.archival_tag), format!("_{}.tif", self.near_real_time_tag)]
    }
}

/// Terminal state of one scene
#[derive(Debug, Clone, PartialEq)]
pub enum MaskOutcome {
    /// The masked output already existed
    Skipped { output: PathBuf },
    Unmatched { reason: UnmatchedReason },
    /// The fire-scar raster could not be put on the scene's grid
    AlignmentFailed { fire: FireScarAsset, message: String },
    /// Reading or writing failed
    Failed { message: String },
    Done {
        output: PathBuf,
        fire: FireScarAsset,
        selector: SeasonSelector,
        masked_pixels: usize,
        /// Kept copy of the aligned fire-scar raster
        footprint: Option<PathBuf>,
    },
}

impl MaskOutcome {
    /// Output path for skipped and finished scenes
    pub fn output(&self) -> Option<&Path> {
        match self {
            MaskOutcome::Skipped { output } | MaskOutcome::Done { output, .. } => Some(output),
            _ => None,
        }
    }
}

enum MaskState {
    Start,
    Matched { fire: FireScarAsset },
    Aligned { fire: FireScarAsset, source: Raster, fire_grid: Raster, footprint: Option<PathBuf> },
    Written { fire: FireScarAsset, output: PathBuf, masked_pixels: usize, footprint: Option<PathBuf> },
}

enum Transition {
    Next(MaskState),
    Finish(MaskOutcome),
}

/// Overwrite every band of `source` wherever the co-located fire month is excluded
///
/// Masked pixels take the source no-data value, or `fallback_nodata`
/// (which then becomes the output's declared no-data) when the source has
/// none.
///
/// # Returns
/// The masked copy and the number of masked pixels
pub fn apply_mask(
    source: &Raster,
    fire_grid: &Raster,
    excluded: ExcludedMonths,
    fallback_nodata: f64,
) -> PipelineResult<(Raster, usize)> {
    if !source.same_grid(fire_grid) {
        return Err(PipelineError::Alignment(format!(
            "fire raster {}x{} does not share the scene's {}x{} grid",
            fire_grid.width, fire_grid.height, source.width, source.height
        )));
    }
    let months = fire_grid
        .band(1)
        .ok_or_else(|| PipelineError::Alignment("aligned fire raster has no bands".to_string()))?;

    let mut masked = source.clone();
    if masked.nodata.is_none() {
        masked.nodata = Some(fallback_nodata);
    }
    let nodata = masked.nodata_sample();

    let hits: Vec<usize> = months
        .iter()
        .enumerate()
        .filter(|(_, month)| excluded.matches_pixel(**month))
        .map(|(i, _)| i)
        .collect();
    for band in masked.bands.iter_mut() {
        for &i in &hits {
            band[i] = nodata;
        }
    }
    Ok((masked, hits.len()))
}

/// Write `raster` to `target` unless it already exists
///
/// The raster is written to a temporary file in the target directory and
/// linked into place without replacing an existing file.
///
/// # Returns
/// `true` when this call created `target`, `false` when another writer won
pub fn write_atomic(store: &dyn RasterStore, raster: &Raster, target: &Path) -> PipelineResult<bool> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let partial = tempfile::Builder::new().prefix(".partial-").suffix(".tif").tempfile_in(&dir)?;
    store.write(raster, partial.path())?;
    match partial.persist_noclobber(target) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}

/// Fire masker for one product
pub struct SceneMasker<'a> {
    matcher: &'a FireYearMatcher,
    naming: MaskNaming,
    store: &'a dyn RasterStore,
    aligner: &'a dyn RasterAligner,
    policy: WindowPolicy,
    fallback_nodata: f64,
    footprint_dir: Option<PathBuf>,
}

impl<'a> SceneMasker<'a> {
    pub fn new(
        matcher: &'a FireYearMatcher,
        naming: MaskNaming,
        store: &'a dyn RasterStore,
        aligner: &'a dyn RasterAligner,
    ) -> Self {
        SceneMasker {
            matcher,
            naming,
            store,
            aligner,
            policy: WindowPolicy::default(),
            fallback_nodata: f64::NAN,
            footprint_dir: None,
        }
    }

    pub fn with_policy(mut self, policy: WindowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// No-data written into scenes that declare none
    pub fn with_fallback_nodata(mut self, nodata: f64) -> Self {
        self.fallback_nodata = nodata;
        self
    }

    /// Keep each aligned fire-scar raster in `dir`
    pub fn keep_footprints_in(mut self, dir: PathBuf) -> Self {
        self.footprint_dir = Some(dir);
        self
    }

    pub fn naming(&self) -> &MaskNaming {
        &self.naming
    }

    /// Mask one scene
    ///
    /// # Arguments
    /// * `scene` - Scene to mask
    /// * `selector` - Calendar window whose fire months are excluded
    /// * `scratch` - Isolated scratch directory for this scene
    pub fn process(&self, scene: &ImageAsset, selector: SeasonSelector, scratch: &WorkItemDir) -> MaskOutcome {
        let mut state = MaskState::Start;
        loop {
            state = match self.step(state, scene, selector, scratch) {
                Transition::Next(next) => next,
                Transition::Finish(outcome) => return outcome,
            };
        }
    }

    fn step(&self, state: MaskState, scene: &ImageAsset, selector: SeasonSelector, scratch: &WorkItemDir) -> Transition {
        match state {
            MaskState::Start => {
                if let Some(output) = self.naming.existing_output(&scene.path) {
                    debug!("{} already masked as {}", scene.file_name(), output.display());
                    return Transition::Finish(MaskOutcome::Skipped { output });
                }
                match self.matcher.find(scene) {
                    Ok(fire) => Transition::Next(MaskState::Matched { fire: fire.clone() }),
                    Err(reason) => {
                        warn!("{}: {}", scene.file_name(), reason);
                        Transition::Finish(MaskOutcome::Unmatched { reason })
                    }
                }
            }
            MaskState::Matched { fire } => {
                let source = match self.store.read(&scene.path) {
                    Ok(raster) => raster,
                    Err(e) => return Transition::Finish(failed(scene, e)),
                };
                let fire_raster = match self.store.read(&fire.path) {
                    Ok(raster) => raster,
                    Err(e) => return Transition::Finish(failed(scene, e)),
                };
                let fire_grid = match self.aligner.align(&fire_raster, &source) {
                    Ok(aligned) => aligned,
                    Err(e) => {
                        warn!("{}: alignment of {} failed: {}", scene.file_name(), fire.path.display(), e);
                        return Transition::Finish(MaskOutcome::AlignmentFailed { fire, message: e.to_string() });
                    }
                };
                let footprint = match self.persist_footprint(scene, &fire_grid, scratch) {
                    Ok(path) => path,
                    Err(e) => return Transition::Finish(failed(scene, e)),
                };
                Transition::Next(MaskState::Aligned { fire, source, fire_grid, footprint })
            }
            MaskState::Aligned { fire, source, fire_grid, footprint } => {
                let excluded = selector.excluded_months(self.policy);
                let (masked, masked_pixels) = match apply_mask(&source, &fire_grid, excluded, self.fallback_nodata) {
                    Ok(result) => result,
                    Err(e) => {
                        return Transition::Finish(MaskOutcome::AlignmentFailed { fire, message: e.to_string() })
                    }
                };
                let output = self.naming.output_path(&scene.path, fire.family);
                match write_atomic(self.store, &masked, &output) {
                    Ok(true) => Transition::Next(MaskState::Written { fire, output, masked_pixels, footprint }),
                    Ok(false) => {
                        debug!("{} was written by another worker", output.display());
                        Transition::Finish(MaskOutcome::Skipped { output })
                    }
                    Err(e) => Transition::Finish(failed(scene, e)),
                }
            }
            MaskState::Written { fire, output, masked_pixels, footprint } => {
                info!(
                    "Masked {} with {} fire months {} ({} pixel(s)) -> {}",
                    scene.file_name(),
                    selector,
                    selector.excluded_months(self.policy),
                    masked_pixels,
                    output.display()
                );
                Transition::Finish(MaskOutcome::Done { output, fire, selector, masked_pixels, footprint })
            }
        }
    }

    /// Write the aligned fire raster to scratch, and copy it out when kept
    fn persist_footprint(
        &self,
        scene: &ImageAsset,
        fire_grid: &Raster,
        scratch: &WorkItemDir,
    ) -> PipelineResult<Option<PathBuf>> {
        let name = format!("{}_fire_footprint.tif", self.naming.base_stem(&scene.path));
        let scratch_path = scratch.join(&name);
        self.store.write(fire_grid, &scratch_path)?;
        match &self.footprint_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                let kept = dir.join(&name);
                fs::copy(&scratch_path, &kept)?;
                Ok(Some(kept))
            }
            None => Ok(None),
        }
    }
}

fn failed(scene: &ImageAsset, error: PipelineError) -> MaskOutcome {
    warn!("{}: {}", scene.file_name(), error);
    MaskOutcome::Failed { message: error.to_string() }
}
