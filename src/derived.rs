//! The derived-value cache: dependent ratios recomputed on configuration
//! change, read lock-cheap on the hot path.
//!
//! Rewritten call sites and the safety clamp both execute on every host
//! tick, so nothing on the read path divides or recomputes: the full set
//! of derived values is recomputed once per configuration change and
//! swapped in as a unit. Readers observe either the old full set or the new
//! full set, never a mix within one read.
//!
//! Recomputation is also where cross-setting ordering is enforced. Raw
//! settings are individually range-validated but not mutually ordered (a
//! user can configure the secondary cap above the primary one); the cache
//! clamps rather than errors, since caps are a balance preference and not a
//! correctness input: `0 < minor <= talent_minor <= major`, with the major
//! cap floored at 1 before any ratio is formed.

use std::sync::{Arc, RwLock};

use strum::{AsRefStr, Display, EnumIter};

use crate::{config::ConfigStore, stream::ProviderRef, Result};

/// Setting key for the primary skill cap.
pub const MAJOR_CAP_KEY: &str = "major-skill-cap";
/// Setting key for the secondary skill cap.
pub const MINOR_CAP_KEY: &str = "minor-skill-cap";
/// Setting key for the secondary skill cap with the talent trait.
pub const TALENT_MINOR_CAP_KEY: &str = "talent-minor-skill-cap";

/// Snapshot of the three upstream cap settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapSettings {
    /// Cap for the primary skill.
    pub major: f64,
    /// Cap for secondary skills without the talent trait.
    pub minor: f64,
    /// Cap for secondary skills with the talent trait.
    pub talent_minor: f64,
}

impl CapSettings {
    /// The host's unmodified caps (primary 100, secondary 50, talent 60).
    #[must_use]
    pub fn vanilla() -> Self {
        Self {
            major: 100.0,
            minor: 50.0,
            talent_minor: 60.0,
        }
    }

    /// Reads the three cap settings out of a configuration store.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownSetting`](crate::Error::UnknownSetting) when the cap
    /// settings were never bound (see [`DerivedCache::attach`]).
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        Ok(Self {
            major: store.get(MAJOR_CAP_KEY)?,
            minor: store.get(MINOR_CAP_KEY)?,
            talent_minor: store.get(TALENT_MINOR_CAP_KEY)?,
        })
    }
}

/// Names of the derived values the cache serves.
///
/// The string form doubles as the provider name at rewritten call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum DerivedKind {
    /// Effective primary cap.
    #[strum(serialize = "major-cap")]
    MajorCap,
    /// Effective secondary cap.
    #[strum(serialize = "minor-cap")]
    MinorCap,
    /// Effective secondary cap with the talent trait.
    #[strum(serialize = "talent-minor-cap")]
    TalentMinorCap,
    /// `1 / major`: scales a raw value into a 0..1 bar fill.
    #[strum(serialize = "fill-factor")]
    FillFactor,
    /// `minor / major`: maximum bar fill for untalented secondaries.
    #[strum(serialize = "minor-fill-max")]
    MinorFillMax,
    /// `talent_minor / major`: maximum bar fill for talented secondaries.
    #[strum(serialize = "talent-minor-fill-max")]
    TalentMinorFillMax,
}

/// One complete, internally consistent set of derived values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedValues {
    /// Effective primary cap (floored at 1).
    pub major_cap: f64,
    /// Effective secondary cap (clamped into `1..=major`).
    pub minor_cap: f64,
    /// Effective talented secondary cap (clamped into `minor..=major`).
    pub talent_minor_cap: f64,
    /// `1 / major_cap`.
    pub fill_factor: f64,
    /// `minor_cap / major_cap`.
    pub minor_fill_max: f64,
    /// `talent_minor_cap / major_cap`.
    pub talent_minor_fill_max: f64,
}

impl DerivedValues {
    /// Computes the full derived set from raw settings, enforcing the
    /// ordering invariant `0 < minor <= talent_minor <= major`.
    ///
    /// NaN inputs collapse to the invariant's lower bound; `f64::clamp`
    /// panics on a NaN bound, and this path must never panic.
    #[must_use]
    pub fn compute(settings: &CapSettings) -> Self {
        let major = nan_to(settings.major, 1.0).max(1.0);
        let minor = nan_to(settings.minor, 1.0).clamp(1.0, major);
        let talent_minor = nan_to(settings.talent_minor, minor).clamp(minor, major);
        Self {
            major_cap: major,
            minor_cap: minor,
            talent_minor_cap: talent_minor,
            fill_factor: 1.0 / major,
            minor_fill_max: minor / major,
            talent_minor_fill_max: talent_minor / major,
        }
    }

    /// Reads one value by name.
    #[must_use]
    pub fn get(&self, kind: DerivedKind) -> f64 {
        match kind {
            DerivedKind::MajorCap => self.major_cap,
            DerivedKind::MinorCap => self.minor_cap,
            DerivedKind::TalentMinorCap => self.talent_minor_cap,
            DerivedKind::FillFactor => self.fill_factor,
            DerivedKind::MinorFillMax => self.minor_fill_max,
            DerivedKind::TalentMinorFillMax => self.talent_minor_fill_max,
        }
    }
}

impl Default for DerivedValues {
    fn default() -> Self {
        Self::compute(&CapSettings::vanilla())
    }
}

/// Logical slot categories the cap lookup distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCategory {
    /// The entity's primary discipline.
    Primary,
    /// Any other discipline.
    Secondary {
        /// Whether the entity carries the qualifying talent trait.
        talented: bool,
    },
}

/// Cap lookup by logical slot category.
///
/// The safety clamp calls through this trait instead of re-deriving caps
/// locally, so the clamp and the rewritten call sites can never disagree.
pub trait CapLookup {
    /// The upper bound for a slot of the given category.
    fn cap_for(&self, category: SlotCategory) -> f64;
}

/// Shared-read, single-writer cache of [`DerivedValues`].
///
/// `recompute` swaps the whole set under a write lock; `get` and
/// [`DerivedCache::snapshot`] are O(1) reads that never recompute.
#[derive(Debug, Default)]
pub struct DerivedCache {
    values: RwLock<DerivedValues>,
}

impl DerivedCache {
    /// Creates a cache seeded from the given settings.
    #[must_use]
    pub fn new(settings: &CapSettings) -> Self {
        Self {
            values: RwLock::new(DerivedValues::compute(settings)),
        }
    }

    /// Recomputes every derived value from a fresh settings snapshot and
    /// swaps the set in atomically from the readers' point of view.
    pub fn recompute(&self, settings: &CapSettings) {
        let values = DerivedValues::compute(settings);
        *write_lock(&self.values) = values;
        log::debug!(
            "derived caps recomputed: major={} minor={} talent-minor={}",
            values.major_cap,
            values.minor_cap,
            values.talent_minor_cap
        );
    }

    /// Reads one derived value. O(1); no recomputation.
    #[must_use]
    pub fn get(&self, kind: DerivedKind) -> f64 {
        read_lock(&self.values).get(kind)
    }

    /// Copies out the full current set.
    #[must_use]
    pub fn snapshot(&self) -> DerivedValues {
        *read_lock(&self.values)
    }

    /// Builds a zero-argument provider bound to one derived value, suitable
    /// as a [`RewriteRule`](crate::rewrite::RewriteRule) substitution.
    #[must_use]
    pub fn provider(self: &Arc<Self>, kind: DerivedKind) -> ProviderRef {
        let cache = Arc::clone(self);
        ProviderRef::new(kind.as_ref(), move || cache.get(kind))
    }

    /// Binds the three cap settings on `store` (with the original mod's
    /// defaults and ranges), subscribes this cache for recomputation, and
    /// performs the initial recompute.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateSetting`](crate::Error::DuplicateSetting) when a
    /// cap setting is already bound on the store.
    pub fn attach(self: &Arc<Self>, store: &ConfigStore) -> Result<()> {
        store.bind(
            MAJOR_CAP_KEY,
            500.0,
            100.0..=9999.0,
            "Maximum for the primary skill (vanilla: 100)",
        )?;
        store.bind(
            MINOR_CAP_KEY,
            350.0,
            10.0..=9999.0,
            "Maximum for secondary skills without the talent trait (vanilla: 50)",
        )?;
        store.bind(
            TALENT_MINOR_CAP_KEY,
            450.0,
            10.0..=9999.0,
            "Maximum for secondary skills with the talent trait (vanilla: 60)",
        )?;

        let cache = Arc::clone(self);
        store.subscribe(move |store| {
            if let Ok(settings) = CapSettings::from_store(store) {
                cache.recompute(&settings);
            }
        });

        self.recompute(&CapSettings::from_store(store)?);
        Ok(())
    }
}

impl CapLookup for DerivedCache {
    fn cap_for(&self, category: SlotCategory) -> f64 {
        match category {
            SlotCategory::Primary => self.get(DerivedKind::MajorCap),
            SlotCategory::Secondary { talented: true } => self.get(DerivedKind::TalentMinorCap),
            SlotCategory::Secondary { talented: false } => self.get(DerivedKind::MinorCap),
        }
    }
}

fn nan_to(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value
    }
}

// Same recovery policy as the configuration store: a poisoned lock still
// holds a complete old-or-new set, and reads must stay infallible.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_configuration() {
        // major=500, minor=350, talent=450 is the documented scenario.
        let values = DerivedValues::compute(&CapSettings {
            major: 500.0,
            minor: 350.0,
            talent_minor: 450.0,
        });
        assert_eq!(values.fill_factor, 1.0 / 500.0); // 0.002
        assert_eq!(values.minor_fill_max, 0.7);
        assert_eq!(values.talent_minor_fill_max, 0.9);
    }

    #[test]
    fn ordering_invariant_holds_for_out_of_order_inputs() {
        let cases = [
            (500.0, 400.0, 100.0), // talent below minor
            (500.0, 350.0, 450.0), // well-formed
            (100.0, 400.0, 900.0), // both above major
            (0.0, 0.0, 0.0),       // degenerate zeros
            (-5.0, -5.0, -5.0),    // negative nonsense
            (f64::NAN, f64::NAN, f64::NAN),
            (500.0, f64::NAN, 450.0),
            (f64::NAN, 350.0, f64::NAN),
        ];
        for (major, minor, talent_minor) in cases {
            let values = DerivedValues::compute(&CapSettings {
                major,
                minor,
                talent_minor,
            });
            assert!(values.minor_cap > 0.0, "minor must be positive");
            assert!(values.minor_cap <= values.talent_minor_cap);
            assert!(values.talent_minor_cap <= values.major_cap);
        }
    }

    #[test]
    fn major_cap_is_floored_before_ratios() {
        let values = DerivedValues::compute(&CapSettings {
            major: 0.0,
            minor: 0.0,
            talent_minor: 0.0,
        });
        assert_eq!(values.major_cap, 1.0);
        assert!(values.fill_factor.is_finite());
    }

    #[test]
    fn recompute_replaces_the_full_set() {
        let cache = DerivedCache::new(&CapSettings::vanilla());
        assert_eq!(cache.get(DerivedKind::MinorFillMax), 0.5);
        assert_eq!(cache.get(DerivedKind::TalentMinorFillMax), 0.6);

        cache.recompute(&CapSettings {
            major: 500.0,
            minor: 350.0,
            talent_minor: 450.0,
        });
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.minor_fill_max, 0.7);
        assert_eq!(snapshot.talent_minor_fill_max, 0.9);
        assert_eq!(snapshot.fill_factor, 0.002);
    }

    #[test]
    fn providers_track_the_cache() {
        let cache = Arc::new(DerivedCache::new(&CapSettings::vanilla()));
        let provider = cache.provider(DerivedKind::MinorFillMax);
        assert_eq!(provider.invoke(), 0.5);

        cache.recompute(&CapSettings {
            major: 500.0,
            minor: 350.0,
            talent_minor: 450.0,
        });
        assert_eq!(provider.invoke(), 0.7);
        assert_eq!(provider.name(), "minor-fill-max");
    }

    #[test]
    fn attach_wires_store_changes_through() {
        let store = ConfigStore::new();
        let cache = Arc::new(DerivedCache::default());
        cache.attach(&store).unwrap();

        // Defaults from the attach call.
        assert_eq!(cache.get(DerivedKind::MajorCap), 500.0);
        assert_eq!(cache.get(DerivedKind::MinorFillMax), 0.7);

        store.set(MINOR_CAP_KEY, 250.0).unwrap();
        assert_eq!(cache.get(DerivedKind::MinorFillMax), 0.5);
    }

    #[test]
    fn nan_setting_write_never_panics_the_recompute() {
        let store = ConfigStore::new();
        let cache = Arc::new(DerivedCache::default());
        cache.attach(&store).unwrap();

        // A NaN write must neither unwind out of the subscriber nor
        // disturb the cached set.
        store.set(MINOR_CAP_KEY, f64::NAN).unwrap();
        assert_eq!(cache.get(DerivedKind::MinorCap), 350.0);

        let snapshot = cache.snapshot();
        assert!(snapshot.minor_cap > 0.0);
        assert!(snapshot.minor_cap <= snapshot.talent_minor_cap);
        assert!(snapshot.talent_minor_cap <= snapshot.major_cap);
    }

    #[test]
    fn every_kind_is_served_and_named_distinctly() {
        use strum::IntoEnumIterator;

        let cache = Arc::new(DerivedCache::default());
        let names: Vec<String> = DerivedKind::iter()
            .map(|kind| cache.provider(kind).name().to_string())
            .collect();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());

        for kind in DerivedKind::iter() {
            assert!(cache.get(kind).is_finite());
        }
    }

    #[test]
    fn cap_lookup_matches_named_values() {
        let cache = DerivedCache::new(&CapSettings {
            major: 500.0,
            minor: 350.0,
            talent_minor: 450.0,
        });
        assert_eq!(cache.cap_for(SlotCategory::Primary), 500.0);
        assert_eq!(cache.cap_for(SlotCategory::Secondary { talented: false }), 350.0);
        assert_eq!(cache.cap_for(SlotCategory::Secondary { talented: true }), 450.0);
    }
}
