//! Stream combinators used by client subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
