pub mod api;
pub mod common;
pub mod loading;
pub mod logging;
pub mod routing;
