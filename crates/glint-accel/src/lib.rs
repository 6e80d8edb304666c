#![warn(missing_docs)]

//! Acceleration-structure construction for the glint ray tracer.
//!
//! This crate builds the spatial indexes a traversal kernel walks to answer
//! ray queries: binned-SAH binary BVHs with optional spatial (SBVH) splits,
//! a 4-ary wide-tree collapse for SIMD/warp traversal, and a two-level
//! scheme (per-shape trees, instanced, under an agglomeratively clustered
//! top-level tree). Traversal itself lives with the consumer; this crate
//! only produces flat node and index arrays.
//!
//! # Architecture
//!
//! - [`binary`] - binned-SAH builder with spatial splits and refitting
//! - [`clip`] - primitive clipping against boxes, used by spatial splits
//! - [`wide`] - collapse of a binary tree into 4-ary nodes
//! - [`store`] - shape registry, instancing, shared node arenas
//! - [`tlas`] - top-level tree over instance bounds
//! - [`layout`] - bit-exact `#[repr(C)]` records for the traversal kernel
//!
//! # Example
//!
//! ```ignore
//! use glint_accel::{AccelStore, BuildConfig};
//! use glint_math::Transform;
//!
//! let mut store = AccelStore::new();
//! let (shape, stats) = store.add_shape(scene.primitives(), &BuildConfig::default());
//! store.add_instance(shape, Transform::identity())?;
//! store.add_instance(shape, Transform::translation(10.0, 0.0, 0.0))?;
//! let tlas = store.tlas();
//! ```

pub mod binary;
pub mod clip;
pub mod config;
pub mod error;
pub mod layout;
pub mod store;
pub mod tlas;
pub mod wide;

pub use binary::{BinaryBvh, BvhNode};
pub use config::{BuildConfig, BuildStats};
pub use error::AccelError;
pub use store::{AccelStore, Instance, InstanceId, ShapeId};
pub use tlas::{Tlas, TlasKind, TlasNode};
pub use wide::{WideBvh, WideNode, WideSlot};
