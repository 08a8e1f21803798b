//! The instruction set recognized by the rewriting engine.
//!
//! The set is closed and finite, modeled on the stack-machine IL that the
//! original patch targets: constant loaders, branches, comparisons,
//! arithmetic, field access, and calls. The [`Opcode::CallProvider`] opcode
//! is the one addition over the host's own set: it marks a call site that
//! was substituted for a numeric literal, which is what makes a rewrite pass
//! idempotent (provider calls are never mistaken for literals on a re-run).
//!
//! Classification helpers ([`Opcode::is_arithmetic`], [`Opcode::is_branch`],
//! [`Opcode::loads_float_const`]) are what the rewriter's context predicates
//! are built from.

use strum::{Display, EnumIter};

/// A single operation in an instruction stream.
///
/// Mnemonics follow the usual IL spelling (`ldc.r4`, `ble.un.s`, `stfld`)
/// and are available through [`std::fmt::Display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Opcode {
    /// No operation.
    #[strum(serialize = "nop")]
    Nop,
    /// Duplicate the top stack value.
    #[strum(serialize = "dup")]
    Dup,
    /// Discard the top stack value.
    #[strum(serialize = "pop")]
    Pop,

    /// Load an argument by index.
    #[strum(serialize = "ldarg")]
    Ldarg,
    /// Load a local variable by index.
    #[strum(serialize = "ldloc")]
    Ldloc,
    /// Store into a local variable by index.
    #[strum(serialize = "stloc")]
    Stloc,

    /// Push a 32-bit integer constant.
    #[strum(serialize = "ldc.i4")]
    LdcI4,
    /// Push a 64-bit integer constant.
    #[strum(serialize = "ldc.i8")]
    LdcI8,
    /// Push a 32-bit floating-point constant.
    #[strum(serialize = "ldc.r4")]
    LdcR4,
    /// Push a 64-bit floating-point constant.
    #[strum(serialize = "ldc.r8")]
    LdcR8,

    /// Load an instance field.
    #[strum(serialize = "ldfld")]
    Ldfld,
    /// Store into an instance field.
    #[strum(serialize = "stfld")]
    Stfld,
    /// Load a static field.
    #[strum(serialize = "ldsfld")]
    Ldsfld,
    /// Store into a static field.
    #[strum(serialize = "stsfld")]
    Stsfld,

    /// Call a method by reference.
    #[strum(serialize = "call")]
    Call,
    /// Call a virtual method by reference.
    #[strum(serialize = "callvirt")]
    Callvirt,
    /// Call a zero-argument numeric provider installed by a rewrite.
    #[strum(serialize = "call.provider")]
    CallProvider,
    /// Return from the current method.
    #[strum(serialize = "ret")]
    Ret,

    /// Unconditional branch.
    #[strum(serialize = "br")]
    Br,
    /// Unconditional branch, short form.
    #[strum(serialize = "br.s")]
    BrS,
    /// Branch if the top value is true / non-zero.
    #[strum(serialize = "brtrue")]
    Brtrue,
    /// Branch if the top value is false / zero.
    #[strum(serialize = "brfalse")]
    Brfalse,
    /// Branch on equal.
    #[strum(serialize = "beq")]
    Beq,
    /// Branch on greater-or-equal.
    #[strum(serialize = "bge")]
    Bge,
    /// Branch on greater-than.
    #[strum(serialize = "bgt")]
    Bgt,
    /// Branch on less-or-equal.
    #[strum(serialize = "ble")]
    Ble,
    /// Branch on less-or-equal, unsigned/unordered.
    #[strum(serialize = "ble.un")]
    BleUn,
    /// Branch on less-or-equal, unsigned/unordered, short form.
    #[strum(serialize = "ble.un.s")]
    BleUnS,
    /// Branch on less-than.
    #[strum(serialize = "blt")]
    Blt,
    /// Branch on not-equal, unsigned/unordered.
    #[strum(serialize = "bne.un")]
    BneUn,
    /// Multi-way branch.
    #[strum(serialize = "switch")]
    Switch,

    /// Compare equal, push result.
    #[strum(serialize = "ceq")]
    Ceq,
    /// Compare greater-than, push result.
    #[strum(serialize = "cgt")]
    Cgt,
    /// Compare less-than, push result.
    #[strum(serialize = "clt")]
    Clt,

    /// Add the top two values.
    #[strum(serialize = "add")]
    Add,
    /// Subtract the top two values.
    #[strum(serialize = "sub")]
    Sub,
    /// Multiply the top two values.
    #[strum(serialize = "mul")]
    Mul,
    /// Divide the top two values.
    #[strum(serialize = "div")]
    Div,
    /// Remainder of the top two values.
    #[strum(serialize = "rem")]
    Rem,
    /// Negate the top value.
    #[strum(serialize = "neg")]
    Neg,

    /// Convert the top value to a 32-bit integer.
    #[strum(serialize = "conv.i4")]
    ConvI4,
    /// Convert the top value to a 32-bit float.
    #[strum(serialize = "conv.r4")]
    ConvR4,
    /// Convert the top value to a 64-bit float.
    #[strum(serialize = "conv.r8")]
    ConvR8,

    /// Throw the exception object on top of the stack.
    #[strum(serialize = "throw")]
    Throw,
}

impl Opcode {
    /// Whether this opcode pushes a floating-point literal.
    ///
    /// Only these opcodes are candidates for a constant rewrite; in
    /// particular [`Opcode::CallProvider`] is not, which is what keeps
    /// rewriting idempotent.
    #[must_use]
    pub const fn loads_float_const(self) -> bool {
        matches!(self, Opcode::LdcR4 | Opcode::LdcR8)
    }

    /// Whether this opcode is a pure arithmetic operation.
    ///
    /// This is the deny-set used by
    /// [`ContextPredicate::NotArithmetic`](crate::rewrite::ContextPredicate):
    /// a literal feeding straight into arithmetic is assumed to be part of an
    /// unrelated computation rather than a cap comparison or assignment.
    #[must_use]
    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Rem | Opcode::Neg
        )
    }

    /// Whether this opcode transfers control to a branch target.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Br
                | Opcode::BrS
                | Opcode::Brtrue
                | Opcode::Brfalse
                | Opcode::Beq
                | Opcode::Bge
                | Opcode::Bgt
                | Opcode::Ble
                | Opcode::BleUn
                | Opcode::BleUnS
                | Opcode::Blt
                | Opcode::BneUn
                | Opcode::Switch
        )
    }

    /// Whether this opcode pushes the result of a comparison.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(self, Opcode::Ceq | Opcode::Cgt | Opcode::Clt)
    }

    /// Whether this opcode writes through a field reference.
    #[must_use]
    pub const fn is_field_store(self) -> bool {
        matches!(self, Opcode::Stfld | Opcode::Stsfld)
    }
}
