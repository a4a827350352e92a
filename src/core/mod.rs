//! Core Primitives
//!
//! Geometry and the wire codec. Everything here is pure and synchronous;
//! the simulation and networking layers build on top.

pub mod codec;
pub mod collider;
pub mod point;

// Re-export core types
pub use codec::{ByteReader, ByteWriter, CodecError};
pub use collider::{polygons_intersect, Collider, ColliderKind, RectCollider};
pub use point::Point;
