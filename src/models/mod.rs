pub mod frame;
pub mod outcome;

pub use frame::{Frame, PixelFormat};
pub use outcome::{DecodeResult, SessionOutcome, SessionState};
