//! FrameGen Core - Foundational types for the frame model pipeline
//!
//! This crate provides the types every other FrameGen crate depends on:
//! - `FrameSpec` - the declarative product description
//! - `ContentHash` - SHA-256 artifact hashing
//! - `Vec2`, `Vec3`, `Color` - geometry and material primitives
//! - Error types and Result alias

mod error;
mod frame;
mod hash;
mod types;

pub use error::{FrameGenError, Result};
pub use frame::{FrameSpec, MaterialCategory, ProfileType};
pub use hash::ContentHash;
pub use types::{srgb_to_linear, Color, Vec2, Vec3};
