//! Fastest-path search over the road network, and presentation of the
//! resulting routes.

pub mod finder;
pub mod nearest;
pub mod render;
pub mod structs;
