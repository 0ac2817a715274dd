//! Illustrative tool implementations.
//!
//! Neither `search` nor `math` is production tooling: they exist to give the
//! planner/scheduler something concrete to dispatch in tests, and to show
//! what an idiomatic [`Tool`](crate::registry::Tool) implementation looks
//! like. A real deployment registers its own tools against the same trait.

mod math;
mod search;

pub use math::MathTool;
pub use search::{SearchEntry, SearchTool};
