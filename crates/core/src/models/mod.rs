//! Data models for Box Office

mod booking;
mod film;
mod hall;
mod session;
mod time_range;

pub use booking::*;
pub use film::*;
pub use hall::*;
pub use session::*;
pub use time_range::*;
