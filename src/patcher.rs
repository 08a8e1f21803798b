//! The patch driver: resolves a declared target batch, rewrites each
//! resolved body, and reports without ever failing the batch.
//!
//! A plan pairs each target descriptor with the rewrite rules for that
//! method. Installation resolves the whole batch through the locator (which
//! preserves input order, so the zip against the plan is sound), fetches
//! each resolved body, runs the rewriter, and installs the result back.
//! Misses degrade: an unresolved descriptor, a missing body, or a rule that
//! matched nothing each produce a warning and a marked outcome, never an
//! error; the post-tick safety clamp keeps the system correct when a
//! rewrite did not land.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::{
    locator::{resolve, BodyStore, MethodRegistry, TargetDescriptor},
    rewrite::{rewrite, RewriteReport, RewriteRule},
};

/// One method to patch: its descriptor and the rules to run over its body.
#[derive(Debug, Clone)]
pub struct PatchTarget {
    /// Identifies the method in the host registry.
    pub descriptor: TargetDescriptor,
    /// Rules applied to the method body, in priority order.
    pub rules: Vec<RewriteRule>,
}

/// An ordered batch of patch targets.
#[derive(Debug, Clone, Default)]
pub struct PatchPlan {
    targets: Vec<PatchTarget>,
}

impl PatchPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a target, builder style.
    #[must_use]
    pub fn with_target(
        mut self,
        descriptor: TargetDescriptor,
        rules: impl Into<Vec<RewriteRule>>,
    ) -> Self {
        self.targets.push(PatchTarget {
            descriptor,
            rules: rules.into(),
        });
        self
    }

    /// The targets in declaration order.
    #[must_use]
    pub fn targets(&self) -> &[PatchTarget] {
        &self.targets
    }

    /// Number of targets in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the plan holds no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// What happened to one target during installation.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodStatus {
    /// The body was fetched, rewritten, and installed back.
    Patched(RewriteReport),
    /// The registry has no method for the descriptor.
    Unresolved,
    /// The method resolved but no body could be fetched.
    BodyUnavailable,
}

/// Per-target installation outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodOutcome {
    /// The target's descriptor.
    pub descriptor: TargetDescriptor,
    /// What happened to it.
    pub status: MethodStatus,
}

/// Outcome of one [`install`] call, one entry per plan target, in plan
/// order.
#[derive(Debug, Clone, Default)]
pub struct PatchSummary {
    outcomes: Vec<MethodOutcome>,
}

impl PatchSummary {
    /// Outcomes in plan order.
    #[must_use]
    pub fn outcomes(&self) -> &[MethodOutcome] {
        &self.outcomes
    }

    /// Number of methods whose body was rewritten and installed back.
    #[must_use]
    pub fn methods_patched(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, MethodStatus::Patched(_)))
            .count()
    }

    /// Number of targets that did not make it to a rewrite.
    #[must_use]
    pub fn methods_missing(&self) -> usize {
        self.outcomes.len() - self.methods_patched()
    }

    /// Total literal replacements across every patched method.
    #[must_use]
    pub fn replacements(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                MethodStatus::Patched(report) => Some(report.total()),
                _ => None,
            })
            .sum()
    }
}

impl fmt::Display for PatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} methods patched, {} replacements",
            self.methods_patched(),
            self.outcomes.len(),
            self.replacements()
        )
    }
}

/// Resolves and rewrites every target in `plan` against `host`.
///
/// Processes targets in plan order and never aborts the batch: each miss is
/// logged and marked in the summary, and the remaining targets still run.
/// Rewritten bodies are installed back through [`BodyStore::install_body`];
/// unresolved or body-less targets leave the host untouched.
#[must_use]
pub fn install<H>(plan: &PatchPlan, host: &H) -> PatchSummary
where
    H: MethodRegistry + BodyStore + ?Sized,
{
    let descriptors: Vec<TargetDescriptor> = plan
        .targets()
        .iter()
        .map(|target| target.descriptor.clone())
        .collect();

    let mut outcomes = Vec::with_capacity(plan.len());
    for (resolution, target) in resolve(&descriptors, host).zip(plan.targets()) {
        let status = match resolution.handle {
            None => MethodStatus::Unresolved,
            Some(handle) => match host.fetch_body(&handle) {
                None => {
                    log::warn!("{}: resolved but no body available", target.descriptor);
                    MethodStatus::BodyUnavailable
                }
                Some(mut body) => {
                    let report = rewrite(&mut body, &target.rules);
                    host.install_body(&handle, body);

                    if report.total() == 0 {
                        log::warn!(
                            "{}: no replacements applied; host update? safety clamp still covers it",
                            target.descriptor
                        );
                    }
                    for mismatch in report.mismatches() {
                        log::warn!("{}: count mismatch: {mismatch}", target.descriptor);
                    }
                    MethodStatus::Patched(report)
                }
            },
        };
        outcomes.push(MethodOutcome {
            descriptor: target.descriptor.clone(),
            status,
        });
    }

    let summary = PatchSummary { outcomes };
    log::info!("{summary}");
    summary
}

/// Logs the effective cap values at info level.
///
/// Intended to run once after a successful [`install`], so the log carries
/// both what was patched and what it was patched to.
pub fn log_effective_caps(values: &crate::derived::DerivedValues) {
    log::info!(
        "effective caps: major={} minor={} talent-minor={}",
        values.major_cap,
        values.minor_cap,
        values.talent_minor_cap
    );
}

/// Runs a host-invoked hook under a panic boundary.
///
/// A panic inside a hook must not unwind into the host's tick loop: it is
/// caught, logged at error level with whatever message the payload carries,
/// and converted into `None`.
///
/// Unwind safety is asserted rather than required of the closure. Hooks
/// capture lock-holding state, and the locks in this crate recover from
/// poisoning, so observing a broken invariant after a caught panic is
/// already accounted for.
pub fn guard_hook<F, T>(name: &str, hook: F) -> Option<T>
where
    F: FnOnce() -> T,
{
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic payload>");
            log::error!("hook '{name}' panicked: {message}");
            None
        }
    }
}
