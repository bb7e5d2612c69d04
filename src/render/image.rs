// src/render/image.rs
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// One drawing instruction; colours are CSS colour strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    VerticalGradient {
        top: String,
        bottom: String,
    },
    Line {
        from: Point,
        to: Point,
        color: String,
        width: f64,
    },
    Polyline {
        points: Vec<Point>,
        color: String,
        width: f64,
        dashed: bool,
        glow: f64,
    },
    Rect {
        origin: Point,
        width: f64,
        height: f64,
        fill: String,
        shadow: f64,
    },
    Text {
        at: Point,
        text: String,
        color: String,
        size: f64,
        bold: bool,
        align: TextAlign,
    },
    Image {
        /// Resource to draw, as given by `Watermark::source`
        source: String,
        origin: Point,
        width: f64,
        height: f64,
        opacity: f64,
    },
}

/// Renderer-agnostic frame: a sized list of drawing commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedImage {
    pub width: u32,
    pub height: u32,
    pub frame_index: usize,
    pub commands: Vec<DrawCommand>,
}

impl RenderedImage {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn polylines(&self) -> impl Iterator<Item = &[Point]> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Polyline { points, .. } => Some(points.as_slice()),
            _ => None,
        })
    }

    pub fn image_sources(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Image { source, .. } => Some(source.as_str()),
            _ => None,
        })
    }

    pub fn image_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Image { .. }))
            .count()
    }
}

/// Externally loaded watermark image
#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    pub width: u32,
    pub height: u32,
    pub source: Arc<str>,
}

impl Watermark {
    pub fn new(width: u32, height: u32, source: &str) -> Self {
        Self {
            width,
            height,
            source: Arc::from(source),
        }
    }

    /// Height when drawn at `width`, keeping the aspect ratio
    pub fn scaled_height(&self, width: f64) -> f64 {
        if self.width == 0 {
            return 0.0;
        }
        self.height as f64 / self.width as f64 * width
    }
}
