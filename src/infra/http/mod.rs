pub mod public;
pub mod signature;
pub mod webhook;

pub use public::{HttpState, build_router};
