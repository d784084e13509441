//! Parallel Variable-Block container engine for the genozip compression
//! format: the context/dictionary/b250/local data model, the section
//! catalogue, codec dispatch, the reference/refhash subsystem, and the
//! container-based reconstruction engine. Per-format segmenters live
//! behind the [`datatype::DataType`] trait; this crate ships one concrete
//! plugin, [`datatype::Generic`], for tab-separated input.

pub mod codec;
pub mod codec_acgt;
pub mod container;
pub mod context;
pub mod crypto;
pub mod datatype;
pub mod dict_id;
pub mod digest;
pub mod error;
pub mod piz;
pub mod plan;
pub mod reference;
pub mod report;
pub mod section;
pub mod sectionlist;
pub mod snip;
pub mod translator;
pub mod vb;
pub mod zip;

pub use error::{GenozipError, Result};
pub use piz::{piz_from_bytes, PizOptions};
pub use zip::{zip_to_writer, ZipOptions};
