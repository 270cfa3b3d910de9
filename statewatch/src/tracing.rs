//! Logging shorthands shared by every module.

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}
