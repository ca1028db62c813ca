pub mod clock;
pub mod ports;

pub use clock::{ManualClock, SystemClock};
