// Record processing: venue normalization and canonical transformation

pub mod normalize;
pub mod transform;

pub use normalize::VenueNormalizer;
pub use transform::RecordTransformer;
