pub mod chart;
pub mod image;
pub mod pipeline;
pub mod sink;

pub use chart::{compose, format_thousands, Padding, RenderStyle};
pub use image::{DrawCommand, Point, RenderedImage, TextAlign, Watermark};
pub use pipeline::{CaptureReport, CaptureSession, RenderCapturePipeline};
pub use sink::{CapturedFrame, EncodingHints, JsonLinesSink, MemorySink, VideoSink};
