pub mod walk;

pub use walk::{WalkStats, Walker};
