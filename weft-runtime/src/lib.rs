//! weft-runtime - an in-process host for weft advice
//!
//! Rust has no reflection to enumerate a program's types and no way to
//! swap a method out from under its callers, so this crate provides both
//! explicitly. A [`Runtime`] is a dispatch table: types, methods,
//! attributes, objects and per-object methods are registered by name and
//! invoked by name. It implements the core's collaborator traits, so
//! pointcuts resolve against it and aspects advise it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Runtime                        │
//! │   types ── methods        objects ── fields          │
//! │              │                   └── singleton       │
//! │              ▼                         methods       │
//! │   invoke(object, "greet", args)                      │
//! │      │                                               │
//! │      ├─ object chain   (#<Watchful:1>#greet)         │
//! │      ├─ type chain     (Watchful#greet)              │
//! │      ├─ type chain     (Base#greet, if defined there)│
//! │      └─ method body                                  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Each chain is whatever advice aspects registered for that join point;
//! layers without advice are skipped.
//!
//! # Manifests
//!
//! A [`Manifest`] describes a catalog in YAML. It is what the `weft` CLI
//! resolves pointcuts against.

pub mod error;
pub mod manifest;
pub mod runtime;
pub mod types;

pub use error::{Result, RuntimeError};
pub use manifest::{AttributeEntry, Manifest, MethodEntry, ObjectEntry, TypeEntry};
pub use runtime::Runtime;
pub use types::{method, AttributeAccess, Call, MethodBody};

pub use weft_types::{MethodName, ObjectRef, TargetRef, TypeName, Value, Visibility};
