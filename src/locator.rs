//! Batch method location against an injected type/method registry.
//!
//! Patch targets are declared up front as [`TargetDescriptor`]s and resolved
//! in one batch through a [`MethodRegistry`]. The host's method surface
//! evolves across versions, so a descriptor that fails to resolve yields an
//! explicit absent marker instead of aborting the batch; partial
//! functionality with a logged warning beats total failure.
//!
//! Resolution order follows input order. Callers zip the results against
//! parallel metadata (which rewrite rules apply to which method), so the
//! ordering is part of the contract.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::{stream::InstructionStream, Error, Result};

/// Identifies one method to patch: owning type, method name, and an optional
/// parameter signature for overload disambiguation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    /// Name of the owning type.
    pub type_name: String,
    /// Method name within the type.
    pub method_name: String,
    /// Parameter type names, when an overload must be pinned down.
    pub signature: Option<Vec<String>>,
}

impl TargetDescriptor {
    /// Creates a descriptor without a parameter signature.
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method_name: method_name.into(),
            signature: None,
        }
    }

    /// Pins the descriptor to a specific overload.
    #[must_use]
    pub fn with_signature(mut self, parameters: impl IntoIterator<Item = String>) -> Self {
        self.signature = Some(parameters.into_iter().collect());
        self
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.type_name, self.method_name)?;
        if let Some(signature) = &self.signature {
            write!(f, "({})", signature.join(", "))?;
        }
        Ok(())
    }
}

/// An opaque handle to a live method, as issued by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    id: u64,
    name: Arc<str>,
}

impl MethodHandle {
    /// The registry-assigned identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Display name of the method this handle refers to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The live type/method registry exposed by the host loader.
///
/// Lookups must not fail for unknown identifiers: `None` is the answer for
/// a method the host no longer (or never) had.
pub trait MethodRegistry {
    /// Resolves a descriptor to a method handle, if the method exists.
    fn lookup(&self, descriptor: &TargetDescriptor) -> Option<MethodHandle>;
}

/// Access to method bodies behind resolved handles.
///
/// `fetch_body` transfers exclusive ownership of the stream to the caller
/// for the duration of a rewrite; `install_body` hands it back.
pub trait BodyStore {
    /// Takes the method body for `handle`, if one is present.
    fn fetch_body(&self, handle: &MethodHandle) -> Option<InstructionStream>;

    /// Installs (or restores) the method body for `handle`.
    fn install_body(&self, handle: &MethodHandle, body: InstructionStream);
}

/// One resolution result: the descriptor and the handle, or an absent
/// marker when the host has no such method.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The descriptor that was looked up.
    pub descriptor: TargetDescriptor,
    /// The resolved handle, or `None` for a miss.
    pub handle: Option<MethodHandle>,
}

/// Lazy, order-preserving resolution of a descriptor batch.
///
/// Yields exactly one [`Resolution`] per input descriptor. When the
/// sequence is first exhausted it emits a found/total summary at info level
/// and lists any missing descriptors at warn level.
pub fn resolve<'a, R: MethodRegistry + ?Sized>(
    descriptors: &'a [TargetDescriptor],
    registry: &'a R,
) -> Resolutions<'a, R> {
    Resolutions {
        inner: descriptors.iter(),
        registry,
        total: descriptors.len(),
        found: 0,
        missing: Vec::new(),
        summarized: false,
    }
}

/// Iterator returned by [`resolve`].
pub struct Resolutions<'a, R: ?Sized> {
    inner: std::slice::Iter<'a, TargetDescriptor>,
    registry: &'a R,
    total: usize,
    found: usize,
    missing: Vec<&'a TargetDescriptor>,
    summarized: bool,
}

impl<R: MethodRegistry + ?Sized> Iterator for Resolutions<'_, R> {
    type Item = Resolution;

    fn next(&mut self) -> Option<Resolution> {
        match self.inner.next() {
            Some(descriptor) => {
                let handle = self.registry.lookup(descriptor);
                match &handle {
                    Some(_) => self.found += 1,
                    None => self.missing.push(descriptor),
                }
                Some(Resolution {
                    descriptor: descriptor.clone(),
                    handle,
                })
            }
            None => {
                if !self.summarized {
                    self.summarized = true;
                    log::info!("resolved {}/{} target methods", self.found, self.total);
                    if !self.missing.is_empty() {
                        let listing = self
                            .missing
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", ");
                        log::warn!(
                            "{} target method(s) did not resolve: {listing}",
                            self.missing.len()
                        );
                    }
                }
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An in-memory registry and body store.
///
/// The reference deployment resolves against the host loader's own registry;
/// this implementation backs tests and compile-time-populated setups where
/// the patchable surface is known up front.
#[derive(Debug, Default)]
pub struct HashRegistry {
    methods: DashMap<TargetDescriptor, MethodHandle>,
    bodies: DashMap<u64, InstructionStream>,
    next_id: AtomicU64,
}

impl HashRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a method body under a descriptor and issues its handle.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateMethod`] when the descriptor is already registered.
    pub fn register(
        &self,
        descriptor: TargetDescriptor,
        body: InstructionStream,
    ) -> Result<MethodHandle> {
        if self.methods.contains_key(&descriptor) {
            return Err(Error::DuplicateMethod(descriptor.to_string()));
        }
        let handle = MethodHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(descriptor.to_string()),
        };
        self.bodies.insert(handle.id, body);
        self.methods.insert(descriptor, handle.clone());
        Ok(handle)
    }

    /// Returns a copy of the current body for `handle`, for inspection.
    #[must_use]
    pub fn body(&self, handle: &MethodHandle) -> Option<InstructionStream> {
        self.bodies.get(&handle.id).map(|body| body.clone())
    }
}

impl MethodRegistry for HashRegistry {
    fn lookup(&self, descriptor: &TargetDescriptor) -> Option<MethodHandle> {
        self.methods.get(descriptor).map(|handle| handle.clone())
    }
}

impl BodyStore for HashRegistry {
    fn fetch_body(&self, handle: &MethodHandle) -> Option<InstructionStream> {
        self.bodies.remove(&handle.id).map(|(_, body)| body)
    }

    fn install_body(&self, handle: &MethodHandle, body: InstructionStream) {
        self.bodies.insert(handle.id, body);
    }
}
