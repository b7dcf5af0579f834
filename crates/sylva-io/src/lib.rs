//! CSV ingestion and prediction output for the sylva pipeline.

mod error;
mod feature_reader;
mod label_reader;
mod prediction_writer;
mod table;

pub use error::IoError;
pub use feature_reader::FeatureReader;
pub use label_reader::LabelReader;
pub use prediction_writer::PredictionWriter;
pub use table::FeatureTable;
