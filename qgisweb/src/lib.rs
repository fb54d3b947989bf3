#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod bundle;
pub use bundle::{BundleOutcome, bundle, bundle_path, read_bundle};

mod document;
pub use document::{
    Container, ContainerParams, ExtentParams, NON_FINITE_COORD, TileRecord, format_coord,
    parse_coord,
};

mod errors;
pub use errors::{QwError, QwResult};

mod summary;
pub use summary::{ContainerSummary, ZoomInfo};

mod wrap;
pub use wrap::{decode_document, read_container, read_document, wrap_document};

mod writer;
pub use writer::QgisWebWriter;

/// File extension of a container.
pub const CONTAINER_EXTENSION: &str = "qgisweb";
