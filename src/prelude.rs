//! # ilpatch Prelude
//!
//! Convenient single import for the types and functions most setups touch:
//! building a plan, installing it, and wiring the configuration store to the
//! derived-value cache and the runtime hooks.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ilpatch operations
pub use crate::Error;

/// The result type used throughout ilpatch
pub use crate::Result;

// ================================================================================================
// Instruction Model
// ================================================================================================

/// The closed instruction set and its classification helpers
pub use crate::opcode::Opcode;

/// Instructions, operands, and method bodies
pub use crate::stream::{FieldRef, Instruction, InstructionStream, MethodRef, Operand, ProviderRef};

// ================================================================================================
// Rewriting
// ================================================================================================

/// Rules, context predicates, and the rewrite entry point
pub use crate::rewrite::{
    rewrite, ContextPredicate, RewriteReport, RewriteRule, RuleOutcome, DEFAULT_TOLERANCE,
};

// ================================================================================================
// Method Location
// ================================================================================================

/// Target descriptors, registry traits, and batch resolution
pub use crate::locator::{
    resolve, BodyStore, HashRegistry, MethodHandle, MethodRegistry, Resolution, TargetDescriptor,
};

// ================================================================================================
// Configuration and Derived Values
// ================================================================================================

/// Range-validated settings with change notification
pub use crate::config::ConfigStore;

/// Cap settings, the derived-value cache, and cap lookup by slot category
pub use crate::derived::{
    CapLookup, CapSettings, DerivedCache, DerivedKind, DerivedValues, SlotCategory,
};

// ================================================================================================
// Runtime Hooks and the Safety Clamp
// ================================================================================================

/// The post-tick clamp and its slot accessor trait
pub use crate::clamp::{clamp_slots, SkillSlots};

/// Result corrections and the gated hook surface
pub use crate::hooks::{
    correct_primary_cap, correct_secondary_cap, normalize_for_thresholds, CapHooks,
};

// ================================================================================================
// Patch Driver
// ================================================================================================

/// Plans, installation, summaries, and the hook panic boundary
pub use crate::patcher::{
    guard_hook, install, log_effective_caps, MethodOutcome, MethodStatus, PatchPlan, PatchSummary,
    PatchTarget,
};
