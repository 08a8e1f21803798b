//! Post-tick safety clamp over injected slot accessors.
//!
//! The rewritten cap checks inside the host's tick method are a heuristic:
//! a host update can move or remove the matched literals, leaving zero
//! rewrites applied. The clamp is the unconditional backstop: after every
//! tick it re-reads each tracked slot and forces it under the cap for its
//! logical category, so values can never run away even when no rewrite
//! landed.
//!
//! Slot storage is reached only through the [`SkillSlots`] trait. The host's
//! concrete layout (discrete fields, an array, a component) stays on the
//! host's side of the boundary; this module never names a field.

use crate::derived::{CapLookup, SlotCategory};

/// Accessor-based view of an entity's skill slots.
///
/// Indices are dense, `0..slot_count()`. Implementations map them onto
/// whatever storage the host actually uses.
pub trait SkillSlots {
    /// Number of tracked slots.
    fn slot_count(&self) -> usize;

    /// Reads the current value of slot `index`.
    fn get_slot(&self, index: usize) -> f64;

    /// Overwrites slot `index`.
    fn set_slot(&mut self, index: usize, value: f64);
}

impl SkillSlots for [f64] {
    fn slot_count(&self) -> usize {
        self.len()
    }

    fn get_slot(&self, index: usize) -> f64 {
        self[index]
    }

    fn set_slot(&mut self, index: usize, value: f64) {
        self[index] = value;
    }
}

impl SkillSlots for Vec<f64> {
    fn slot_count(&self) -> usize {
        self.len()
    }

    fn get_slot(&self, index: usize) -> f64 {
        self[index]
    }

    fn set_slot(&mut self, index: usize, value: f64) {
        self[index] = value;
    }
}

/// Clamps every slot to the cap for its logical category and returns how
/// many slots were written.
///
/// `primary` names the slot that gets the primary cap; every other slot is
/// secondary, talented or not per `talented`. Caps come from the same
/// [`CapLookup`] the rewrite providers read, so the clamp and the rewritten
/// call sites cannot disagree.
///
/// Slots at or under their cap are not written at all, which makes the
/// operation idempotent: a second call over unchanged slots writes nothing.
pub fn clamp_slots<S, C>(
    slots: &mut S,
    primary: Option<usize>,
    talented: bool,
    caps: &C,
) -> usize
where
    S: SkillSlots + ?Sized,
    C: CapLookup + ?Sized,
{
    let primary_cap = caps.cap_for(SlotCategory::Primary);
    let secondary_cap = caps.cap_for(SlotCategory::Secondary { talented });

    let mut clamped = 0;
    for index in 0..slots.slot_count() {
        let cap = if primary == Some(index) {
            primary_cap
        } else {
            secondary_cap
        };
        if slots.get_slot(index) > cap {
            slots.set_slot(index, cap);
            clamped += 1;
        }
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::{CapSettings, DerivedCache};

    fn caps() -> DerivedCache {
        DerivedCache::new(&CapSettings {
            major: 500.0,
            minor: 350.0,
            talent_minor: 450.0,
        })
    }

    #[test]
    fn runaway_secondary_is_pulled_back() {
        let caps = caps();
        // Slot 2 is primary; slot 0 has "jumped" past the secondary cap.
        let mut slots = vec![500.0, 120.0, 480.0];
        let written = clamp_slots(&mut slots, Some(2), false, &caps);
        assert_eq!(written, 1);
        assert_eq!(slots, vec![350.0, 120.0, 480.0]);
    }

    #[test]
    fn talent_raises_the_secondary_bound() {
        let caps = caps();
        let mut slots = vec![400.0, 400.0];
        let written = clamp_slots(&mut slots, Some(1), true, &caps);
        // 400 <= 450 (talented secondary) and 400 <= 500 (primary).
        assert_eq!(written, 0);
        assert_eq!(slots, vec![400.0, 400.0]);
    }

    #[test]
    fn primary_slot_uses_the_major_cap() {
        let caps = caps();
        let mut slots = vec![600.0];
        assert_eq!(clamp_slots(&mut slots, Some(0), false, &caps), 1);
        assert_eq!(slots, vec![500.0]);
    }

    #[test]
    fn no_primary_treats_every_slot_as_secondary() {
        let caps = caps();
        let mut slots = vec![400.0, 300.0];
        assert_eq!(clamp_slots(&mut slots, None, false, &caps), 1);
        assert_eq!(slots, vec![350.0, 300.0]);
    }

    #[test]
    fn clamping_is_idempotent() {
        let caps = caps();
        let mut slots = vec![999.0, 999.0, 999.0, 10.0];
        let first = clamp_slots(&mut slots, Some(0), false, &caps);
        assert_eq!(first, 3);

        let after_first = slots.clone();
        let second = clamp_slots(&mut slots, Some(0), false, &caps);
        assert_eq!(second, 0);
        assert_eq!(slots, after_first);
    }
}
