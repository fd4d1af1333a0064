pub mod filter;
pub mod filters;
pub mod spline;

pub use filter::Filter;
pub use filters::{BandpassFilter, HighpassFilter, NotchFilter};
pub use spline::CubicSpline;
