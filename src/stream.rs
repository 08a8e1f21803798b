//! Instruction, operand, and instruction-stream representations.
//!
//! An [`InstructionStream`] is one decoded method body: an ordered,
//! index-addressable sequence of [`Instruction`]s. It is constructed from
//! host method metadata at patch-install time, mutated in place by the
//! rewriter, and handed back to the host loader for installation; it is not
//! retained afterwards, and it is exclusively owned for the duration of one
//! rewrite call.

use std::fmt;
use std::sync::Arc;

use crate::{opcode::Opcode, Error, Result};

/// Reference to an instance or static field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Name of the type declaring the field.
    pub owner: String,
    /// Field name.
    pub name: String,
}

impl FieldRef {
    /// Creates a field reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.name)
    }
}

/// Reference to a callable method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Name of the type declaring the method.
    pub owner: String,
    /// Method name.
    pub name: String,
}

impl MethodRef {
    /// Creates a method reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.name)
    }
}

/// A zero-argument numeric provider, invocable from a rewritten call site.
///
/// The calling convention matches a direct field read: no arguments, a
/// floating-point return. Providers are cheap to clone (the closure is
/// shared) and compare equal by name, which is what the rewriter and its
/// tests care about.
#[derive(Clone)]
pub struct ProviderRef {
    name: Arc<str>,
    func: Arc<dyn Fn() -> f64 + Send + Sync>,
}

impl ProviderRef {
    /// Creates a provider from a name and a zero-argument function.
    pub fn new(name: impl Into<String>, func: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(func),
        }
    }

    /// Creates a provider that always returns the same value.
    ///
    /// Handy in tests and for pinning a site to a fixed replacement.
    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, move || value)
    }

    /// The provider's name, used for reporting and equality.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the provider.
    #[must_use]
    pub fn invoke(&self) -> f64 {
        (self.func)()
    }
}

impl PartialEq for ProviderRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderRef({})", self.name)
    }
}

impl fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Operand attached to an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand present.
    None,
    /// Integer immediate (constant, or local/argument index).
    Int(i64),
    /// Floating-point immediate.
    Float(f64),
    /// Field reference.
    Field(FieldRef),
    /// Method reference.
    Method(MethodRef),
    /// Numeric provider installed by a rewrite.
    Provider(ProviderRef),
    /// Branch target, as an instruction index into the owning stream.
    Target(usize),
}

/// One decoded instruction: an opcode plus an optional operand.
///
/// Immutable once read from source; a rewrite replaces a whole instruction
/// in place rather than editing its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation.
    pub opcode: Opcode,
    /// The operand, if any.
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction with an operand.
    #[must_use]
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }

    /// Creates an instruction without an operand.
    #[must_use]
    pub fn bare(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: Operand::None,
        }
    }

    /// Creates a floating-point constant load (`ldc.r4`).
    #[must_use]
    pub fn load_f32(value: f64) -> Self {
        Self::new(Opcode::LdcR4, Operand::Float(value))
    }

    /// Creates a call to a numeric provider.
    #[must_use]
    pub fn call_provider(provider: ProviderRef) -> Self {
        Self::new(Opcode::CallProvider, Operand::Provider(provider))
    }

    /// Returns the literal value if this instruction pushes a float constant.
    ///
    /// `None` for everything else, including provider calls, which push a
    /// float at runtime but are not literals.
    #[must_use]
    pub fn float_literal(&self) -> Option<f64> {
        if !self.opcode.loads_float_const() {
            return None;
        }
        match self.operand {
            Operand::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the provider if this instruction is a rewritten call site.
    #[must_use]
    pub fn provider(&self) -> Option<&ProviderRef> {
        match (&self.opcode, &self.operand) {
            (Opcode::CallProvider, Operand::Provider(p)) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            Operand::Int(v) => write!(f, "{} {v}", self.opcode),
            Operand::Float(v) => write!(f, "{} {v}", self.opcode),
            Operand::Field(r) => write!(f, "{} {r}", self.opcode),
            Operand::Method(r) => write!(f, "{} {r}", self.opcode),
            Operand::Provider(p) => write!(f, "{} {p}", self.opcode),
            Operand::Target(t) => write!(f, "{} -> {t}", self.opcode),
        }
    }
}

/// An ordered, index-addressable sequence of instructions forming one
/// method body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstructionStream {
    instructions: Vec<Instruction>,
}

impl InstructionStream {
    /// Wraps a decoded instruction sequence.
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Wraps a decoded instruction sequence, checking structural sanity.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyStream`] for an empty body, or
    /// [`Error::TargetOutOfBounds`] when a branch operand points past the
    /// end of the stream.
    pub fn validated(instructions: Vec<Instruction>) -> Result<Self> {
        if instructions.is_empty() {
            return Err(Error::EmptyStream);
        }
        for (index, instruction) in instructions.iter().enumerate() {
            if let Operand::Target(target) = instruction.operand {
                if target >= instructions.len() {
                    return Err(Error::TargetOutOfBounds {
                        index,
                        target,
                        len: instructions.len(),
                    });
                }
            }
        }
        Ok(Self { instructions })
    }

    /// Number of instructions in the stream.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the stream contains no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Replaces the instruction at `index` in place.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds; the rewriter only replaces at
    /// indices it has already visited.
    pub fn replace(&mut self, index: usize, instruction: Instruction) {
        self.instructions[index] = instruction;
    }

    /// Iterates over the instructions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Consumes the stream, returning the underlying instructions.
    #[must_use]
    pub fn into_inner(self) -> Vec<Instruction> {
        self.instructions
    }
}

impl std::ops::Index<usize> for InstructionStream {
    type Output = Instruction;

    fn index(&self, index: usize) -> &Instruction {
        &self.instructions[index]
    }
}

impl FromIterator<Instruction> for InstructionStream {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a InstructionStream {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
