pub mod geometry;
pub mod definitions;
pub mod spawn;
pub mod combat;
pub mod notifications;

pub use geometry::*;
pub use definitions::*;
pub use spawn::*;
pub use combat::*;
pub use notifications::*;
