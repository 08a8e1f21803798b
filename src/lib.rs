// Copyright 2026 ilpatch contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]

//! # ilpatch
//!
//! An instruction-stream rewriting engine: numeric literals embedded in
//! compiled method bodies are replaced, in place and with contextual
//! disambiguation, by calls to runtime value providers.
//!
//! The problem this solves comes from binary patching of managed game code:
//! a hard limit like `100` is compiled into a method body as a float
//! constant load, and the same number also appears in unrelated arithmetic
//! within the same body. Patching by value alone corrupts the arithmetic;
//! patching by instruction index breaks on every host update. `ilpatch`
//! matches a literal by value *and* by the instruction that consumes it,
//! and backs the whole scheme with a runtime safety clamp for the day a
//! host update invalidates the match entirely.
//!
//! ## Architecture
//!
//! - [`stream`] / [`opcode`] - the instruction model: a closed opcode set
//!   with classification helpers, and index-addressable method bodies.
//! - [`rewrite`] - the constant rewriter: context-gated, first-match-wins,
//!   idempotent literal substitution.
//! - [`locator`] - batch method resolution with absent markers instead of
//!   hard failures.
//! - [`config`] / [`derived`] - range-validated settings and the cache of
//!   values derived from them, recomputed on change and served O(1).
//! - [`clamp`] - the post-tick safety clamp over injected slot accessors.
//! - [`hooks`] - result corrections for call sites a rewrite cannot reach.
//! - [`patcher`] - the driver tying resolution, rewriting, and reporting
//!   together, plus the panic boundary for host-invoked hooks.
//!
//! ## Quick Start
//!
//! ```rust
//! use ilpatch::prelude::*;
//! use std::sync::Arc;
//!
//! // Settings and the values derived from them.
//! let store = Arc::new(ConfigStore::new());
//! let cache = Arc::new(DerivedCache::default());
//! cache.attach(&store)?;
//!
//! // A host with one patchable method body.
//! let host = HashRegistry::new();
//! host.register(
//!     TargetDescriptor::new("Character", "Learn"),
//!     InstructionStream::new(vec![
//!         Instruction::load_f32(100.0),
//!         Instruction::new(Opcode::BleUnS, Operand::Target(2)),
//!         Instruction::bare(Opcode::Ret),
//!     ]),
//! )?;
//!
//! // Replace the hard limit with a live provider and install.
//! let plan = PatchPlan::new().with_target(
//!     TargetDescriptor::new("Character", "Learn"),
//!     vec![RewriteRule::new(
//!         100.0,
//!         ContextPredicate::FollowedByAny(vec![Opcode::BleUnS, Opcode::BleUn, Opcode::Stfld]),
//!         cache.provider(DerivedKind::MajorCap),
//!     )],
//! );
//! let summary = install(&plan, &host);
//! assert_eq!(summary.replacements(), 1);
//! # Ok::<(), ilpatch::Error>(())
//! ```
//!
//! ## Error handling philosophy
//!
//! The engine runs inside someone else's process. Operational misses (a
//! method the host no longer has, a literal that no longer matches) are
//! logged and reported, never raised: partial functionality with a warning
//! beats taking the host down. [`Error`] is reserved for genuine API misuse
//! caught up front.

pub mod clamp;
pub mod config;
pub mod derived;
pub mod hooks;
pub mod locator;
pub mod opcode;
pub mod patcher;
pub mod prelude;
pub mod rewrite;
pub mod stream;

mod error;

pub use error::Error;

/// The result type used throughout `ilpatch`.
pub type Result<T> = std::result::Result<T, Error>;
