pub mod image_io;
pub mod sequence;
pub mod sink;

pub use image_io::{load_image, save_image, save_png, save_tiff};
pub use sequence::ImageSequenceSource;
pub use sink::{FileSink, ImageSink, MemorySink};
