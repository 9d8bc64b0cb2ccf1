//! Per-URL metadata pipeline: policy gate → fetch → parse → extract →
//! normalize → image probe, and the batch orchestrator that runs it.

pub mod document;
pub mod extractor;
pub mod fetcher;
pub mod normalizer;
pub mod policy;
pub mod prober;
pub mod resolver;
pub mod service;

pub use document::Document;
pub use extractor::{MetadataExtractor, OpenGraphExtractor};
pub use prober::{HttpImageProber, ImageDimensions, ImageProber};
pub use service::MetadataService;
