//! The constant rewriter: in-place substitution of numeric literals with
//! provider calls, gated on local context.
//!
//! # Problem
//!
//! A compiled method body that compares a value against a hard limit embeds
//! that limit as a literal (`ldc.r4 100`). The same numeric value routinely
//! appears elsewhere in the body as part of unrelated arithmetic. Replacing
//! every occurrence of the value would corrupt those computations, so each
//! candidate literal is qualified by the instruction that immediately
//! follows it: a limit literal flows into a comparison branch or a field
//! store, an arithmetic literal flows into `mul`/`div`/etc.
//!
//! # Algorithm
//!
//! For each instruction index, in order: if the instruction is a float
//! constant load whose value matches a rule's target within tolerance, and
//! the following instruction exists and satisfies the rule's
//! [`ContextPredicate`], the literal is replaced in place with a call to the
//! rule's provider. The first matching rule wins; later rules are not
//! consulted for that index. Everything else is left untouched.
//!
//! Replacements use the distinct [`Opcode::CallProvider`] opcode, so running
//! the rewriter over its own output applies zero further replacements.
//!
//! "No match" is not a failure: the rewriter reports per-rule counts and the
//! caller decides whether a shortfall is worth a warning (the runtime safety
//! clamp in [`crate::clamp`] keeps the system correct either way).

use std::fmt;

use crate::{
    opcode::Opcode,
    stream::{Instruction, InstructionStream, ProviderRef},
    Error, Result,
};

/// Default matching tolerance for float literals.
///
/// `ldc.r4` operands are single-precision, so an exact `f64` comparison
/// against a target like `0.01` would miss; this is the epsilon the original
/// comparison sites tolerate.
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// Local-context test applied to the instruction following a candidate
/// literal.
///
/// Checking a single following opcode is a heuristic, not a proof that the
/// literal feeds the expected consumer; a stack machine can interpose
/// conversions or reorder operands. The allow/deny sets are therefore
/// caller-supplied policy, tuned per target method, rather than a built-in
/// parse of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextPredicate {
    /// The following opcode must be one of the given set.
    FollowedByAny(Vec<Opcode>),
    /// The following opcode must not be a pure arithmetic operation
    /// (see [`Opcode::is_arithmetic`]).
    NotArithmetic,
}

impl ContextPredicate {
    /// Whether `next` satisfies this predicate.
    #[must_use]
    pub fn matches(&self, next: Opcode) -> bool {
        match self {
            ContextPredicate::FollowedByAny(allowed) => allowed.contains(&next),
            ContextPredicate::NotArithmetic => !next.is_arithmetic(),
        }
    }
}

/// One literal-substitution rule: target value, tolerance, context
/// predicate, and the provider to install at qualifying sites.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    /// The literal value this rule looks for.
    pub target: f64,
    /// Absolute tolerance for the literal match.
    pub tolerance: f64,
    /// Context test applied to the following instruction.
    pub context: ContextPredicate,
    /// Provider substituted at qualifying sites.
    pub provider: ProviderRef,
    /// Number of replacements the caller expects, when known.
    ///
    /// A mismatch is a soft warning, not a failure; the body shape may have
    /// changed upstream.
    pub expected: Option<usize>,
}

impl RewriteRule {
    /// Creates a rule with the default tolerance and no expected count.
    #[must_use]
    pub fn new(target: f64, context: ContextPredicate, provider: ProviderRef) -> Self {
        Self {
            target,
            tolerance: DEFAULT_TOLERANCE,
            context,
            provider,
            expected: None,
        }
    }

    /// Overrides the matching tolerance.
    ///
    /// # Errors
    ///
    /// [`Error::NegativeTolerance`] when `tolerance` is negative.
    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self> {
        if tolerance < 0.0 {
            return Err(Error::NegativeTolerance(tolerance));
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    /// Declares how many replacements this rule should produce.
    #[must_use]
    pub fn expect(mut self, count: usize) -> Self {
        self.expected = Some(count);
        self
    }

    /// Whether `value` matches this rule's target within tolerance.
    #[must_use]
    fn matches_value(&self, value: f64) -> bool {
        (value - self.target).abs() <= self.tolerance
    }
}

/// Outcome of one rule across one rewrite call.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Name of the provider the rule installs.
    pub provider: String,
    /// The rule's target literal.
    pub target: f64,
    /// Expected replacement count, when the rule declared one.
    pub expected: Option<usize>,
    /// Replacements actually applied.
    pub applied: usize,
}

impl RuleOutcome {
    /// Whether the applied count differs from a declared expectation.
    #[must_use]
    pub fn is_mismatch(&self) -> bool {
        self.expected.is_some_and(|expected| expected != self.applied)
    }
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected {
            Some(expected) => write!(
                f,
                "{} -> {}: {} applied (expected {expected})",
                self.target, self.provider, self.applied
            ),
            None => write!(
                f,
                "{} -> {}: {} applied",
                self.target, self.provider, self.applied
            ),
        }
    }
}

/// Per-rule replacement counts from one rewrite call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RewriteReport {
    outcomes: Vec<RuleOutcome>,
}

impl RewriteReport {
    /// Outcomes in rule order.
    #[must_use]
    pub fn outcomes(&self) -> &[RuleOutcome] {
        &self.outcomes
    }

    /// Total replacements across all rules.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.iter().map(|o| o.applied).sum()
    }

    /// Outcomes whose applied count differs from a declared expectation.
    pub fn mismatches(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| o.is_mismatch())
    }
}

/// Rewrites qualifying literal sites in `stream` according to `rules`.
///
/// The stream is mutated in place; each index is replaced at most once, by
/// the first rule (in slice order) whose value and context predicates both
/// hold. The last instruction of a stream is never a candidate, since no
/// following instruction exists to confirm its context.
///
/// Performs zero replacements, and returns zeroed counts, when nothing
/// matches; it never fails for "no match".
#[must_use]
pub fn rewrite(stream: &mut InstructionStream, rules: &[RewriteRule]) -> RewriteReport {
    let mut counts = vec![0usize; rules.len()];

    for index in 0..stream.len() {
        let Some(value) = stream[index].float_literal() else {
            continue;
        };
        let Some(next) = stream.get(index + 1) else {
            continue;
        };
        let next_opcode = next.opcode;

        let matched = rules
            .iter()
            .position(|rule| rule.matches_value(value) && rule.context.matches(next_opcode));

        if let Some(rule_index) = matched {
            stream.replace(
                index,
                Instruction::call_provider(rules[rule_index].provider.clone()),
            );
            counts[rule_index] += 1;
        }
    }

    RewriteReport {
        outcomes: rules
            .iter()
            .zip(counts)
            .map(|(rule, applied)| RuleOutcome {
                provider: rule.provider.name().to_string(),
                target: rule.target,
                expected: rule.expected,
                applied,
            })
            .collect(),
    }
}
