#![crate_name = "paraclosure"]
#![crate_type = "lib"]
#![warn(missing_docs)]

//! A library for computing transitive closures of integer transition relations.
//!
//! A relation such as `x' = x + 1 && y' = y && x <= y` relates the values of some integer
//! variables before and after one step of a loop. This library computes a finite description of
//! every number of steps the loop can take: a few individual powers `R^1, ..., R^p` followed by
//! parametric matrices whose weights are affine functions `alpha * k + beta` of an iteration
//! parameter `k >= 0`. Difference-bound relations (`x - y <= c`) and octagonal relations
//! (`±x ± y <= c`) are supported.
//!
//! The high-level interface is the [`Relation`] type, which is usually obtained from the
//! [`parser`] and accelerated with [`Relation::accelerate`]. The result can be printed with the
//! [`render`] module.
//!
//! # Examples
//! ```
//! # use paraclosure::{AccelerationConfig, Relation};
//! # use paraclosure::acceleration::Termination;
//! let mut r: Relation = "x' = x + 1 && y' = y && x <= y".parse().unwrap();
//! let closure = r.accelerate(&AccelerationConfig::default()).unwrap();
//! assert_eq!(closure.termination(), Termination::Periodic { start: 1, period: 1 });
//! ```
//!
//! [`Relation`]: ./struct.Relation.html
//! [`Relation::accelerate`]: ./struct.Relation.html#method.accelerate
//! [`parser`]: ./parser/index.html
//! [`render`]: ./render/index.html

pub mod acceleration;
pub mod algebra;
pub mod parser;
pub mod render;

pub use crate::config::{AccelerationConfig, DEFAULT_MAX_POWER};
pub use crate::error::{ClosureError, Result};
pub use crate::powers::PowerCache;
pub use crate::relation::{Encoding, Relation};
mod config;
mod error;
mod powers;
mod relation;
