pub mod wavelet;

pub use wavelet::{WaveletParams, WaveletPyramid, WaveletSharpener};
