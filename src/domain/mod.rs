pub mod delivery;
pub mod event;
pub mod schemas;

pub use delivery::*;
pub use event::*;
pub use schemas::*;
