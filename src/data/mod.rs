//! Data module: named arrays carried by patches
#![warn(missing_docs)]

pub mod patch_data;
pub mod tag_field;

pub use patch_data::{Centering, PatchData, PatchValues, ScalarType};
pub use tag_field::{TAG_QUANTITY, TagField};
