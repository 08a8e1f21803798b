//! Result-correction hooks for call sites that cannot be rewritten.
//!
//! Some host methods return a cap instead of loading it from a literal the
//! rewriter could match. For those the host invokes a hook on the returned
//! value after the original method runs. The corrections key off the host's
//! unmodified constants: a secondary-cap getter returns 50 or 60 (talent),
//! a primary-cap getter returns 100, and a sandbox mode returns 100 or more
//! from the secondary getter and must pass through untouched.
//!
//! All hooks are gated on the configuration store's master switch and turn
//! into identity functions when it is off.

use std::sync::Arc;

use crate::clamp::{clamp_slots, SkillSlots};
use crate::config::ConfigStore;
use crate::derived::{DerivedCache, DerivedValues};

/// The host's unmodified primary cap. Also the sandbox sentinel: secondary
/// getters returning this or more are left alone.
pub const VANILLA_PRIMARY_CAP: f64 = 100.0;

/// The host's unmodified untalented secondary cap. Secondary getter results
/// above this carry the talent trait.
pub const VANILLA_TALENT_BOUNDARY: f64 = 50.0;

/// Maps a vanilla secondary-cap return value onto the configured caps.
///
/// Results at or above [`VANILLA_PRIMARY_CAP`] are sandbox values and pass
/// through unchanged.
#[must_use]
pub fn correct_secondary_cap(result: f64, values: &DerivedValues) -> f64 {
    if result >= VANILLA_PRIMARY_CAP {
        return result;
    }
    if result > VANILLA_TALENT_BOUNDARY {
        values.talent_minor_cap
    } else {
        values.minor_cap
    }
}

/// Maps a vanilla primary-cap return value onto the configured major cap.
///
/// Only the exact vanilla constant is corrected; any other result was
/// already produced by a corrected path.
#[must_use]
pub fn correct_primary_cap(result: f64, values: &DerivedValues) -> f64 {
    if result == VANILLA_PRIMARY_CAP {
        values.major_cap
    } else {
        result
    }
}

/// Rescales a `0..major_cap` value back into the vanilla `0..100` range.
///
/// Downstream display code compares against fixed thresholds tuned for the
/// vanilla range; without this, every raised value lands in the top band.
#[must_use]
pub fn normalize_for_thresholds(value: f64, values: &DerivedValues) -> f64 {
    value / values.major_cap * VANILLA_PRIMARY_CAP
}

/// The hook surface handed to the host: result corrections, threshold
/// normalization, and the post-tick clamp, all reading one cache and one
/// master switch.
#[derive(Debug, Clone)]
pub struct CapHooks {
    store: Arc<ConfigStore>,
    cache: Arc<DerivedCache>,
}

impl CapHooks {
    /// Creates the hook surface over a configuration store and a derived
    /// cache. The cache is expected to be attached to the same store.
    #[must_use]
    pub fn new(store: Arc<ConfigStore>, cache: Arc<DerivedCache>) -> Self {
        Self { store, cache }
    }

    /// [`correct_secondary_cap`], or identity when the master switch is off.
    #[must_use]
    pub fn secondary_cap(&self, result: f64) -> f64 {
        if !self.store.enabled() {
            return result;
        }
        correct_secondary_cap(result, &self.cache.snapshot())
    }

    /// [`correct_primary_cap`], or identity when the master switch is off.
    #[must_use]
    pub fn primary_cap(&self, result: f64) -> f64 {
        if !self.store.enabled() {
            return result;
        }
        correct_primary_cap(result, &self.cache.snapshot())
    }

    /// [`normalize_for_thresholds`], or identity when the master switch is
    /// off.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        if !self.store.enabled() {
            return value;
        }
        normalize_for_thresholds(value, &self.cache.snapshot())
    }

    /// Runs the post-tick safety clamp over `slots`. Returns the number of
    /// slots written; zero when the master switch is off.
    pub fn clamp_after_tick<S: SkillSlots + ?Sized>(
        &self,
        slots: &mut S,
        primary: Option<usize>,
        talented: bool,
    ) -> usize {
        if !self.store.enabled() {
            return 0;
        }
        clamp_slots(slots, primary, talented, &*self.cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::CapSettings;

    fn values() -> DerivedValues {
        DerivedValues::compute(&CapSettings {
            major: 500.0,
            minor: 350.0,
            talent_minor: 450.0,
        })
    }

    #[test]
    fn secondary_correction_maps_vanilla_returns() {
        let v = values();
        assert_eq!(correct_secondary_cap(50.0, &v), 350.0);
        assert_eq!(correct_secondary_cap(60.0, &v), 450.0);
        // Sandbox: at or above the vanilla primary cap, untouched.
        assert_eq!(correct_secondary_cap(100.0, &v), 100.0);
        assert_eq!(correct_secondary_cap(250.0, &v), 250.0);
    }

    #[test]
    fn primary_correction_only_touches_the_exact_constant() {
        let v = values();
        assert_eq!(correct_primary_cap(100.0, &v), 500.0);
        assert_eq!(correct_primary_cap(60.0, &v), 60.0);
        assert_eq!(correct_primary_cap(350.0, &v), 350.0);
    }

    #[test]
    fn normalization_restores_the_vanilla_range() {
        let v = values();
        assert_eq!(normalize_for_thresholds(500.0, &v), 100.0);
        assert_eq!(normalize_for_thresholds(250.0, &v), 50.0);
        assert_eq!(normalize_for_thresholds(0.0, &v), 0.0);
    }

    #[test]
    fn master_switch_turns_hooks_into_identities() {
        let store = Arc::new(ConfigStore::new());
        let cache = Arc::new(DerivedCache::default());
        cache.attach(&store).unwrap();
        let hooks = CapHooks::new(store.clone(), cache);

        assert_eq!(hooks.secondary_cap(50.0), 350.0);

        store.set_enabled(false);
        assert_eq!(hooks.secondary_cap(50.0), 50.0);
        assert_eq!(hooks.primary_cap(100.0), 100.0);
        assert_eq!(hooks.normalize(500.0), 500.0);

        let mut slots = vec![9999.0];
        assert_eq!(hooks.clamp_after_tick(&mut slots, None, false), 0);
        assert_eq!(slots, vec![9999.0]);
    }

    #[test]
    fn clamp_after_tick_uses_the_live_cache() {
        let store = Arc::new(ConfigStore::new());
        let cache = Arc::new(DerivedCache::default());
        cache.attach(&store).unwrap();
        let hooks = CapHooks::new(store.clone(), cache);

        let mut slots = vec![400.0, 400.0];
        assert_eq!(hooks.clamp_after_tick(&mut slots, Some(0), false), 1);
        assert_eq!(slots, vec![400.0, 350.0]);

        store.set("minor-skill-cap", 300.0).unwrap();
        assert_eq!(hooks.clamp_after_tick(&mut slots, Some(0), false), 1);
        assert_eq!(slots, vec![400.0, 300.0]);
    }
}
