pub mod generator;

pub use generator::{
    GeneratorParams, PriceSeriesGenerator, RandomSource, RngSource, SequenceSource,
};
