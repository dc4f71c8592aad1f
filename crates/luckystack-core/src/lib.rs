pub mod align;
pub mod consts;
pub mod detection;
pub mod error;
pub mod fft;
pub mod filters;
pub mod frame;
pub mod io;
pub mod pipeline;
pub mod quality;
pub mod select;
pub mod sharpen;
pub mod source;
pub mod stack;

/// Version of the core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
