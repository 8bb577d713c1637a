pub mod clock;
pub mod error;
pub mod gate;

pub use error::{RingError, Side};
pub use gate::{GateError, WaitGate};
