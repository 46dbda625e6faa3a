//! Assets domain module.
//!
//! Business rules for assets, residual-value form submissions and bulk-import
//! rows, implemented as deterministic domain logic (no IO, no storage).

pub mod asset;
pub mod form;
pub mod import;
pub mod residual_form;
pub mod stats;

pub use asset::{Asset, AssetPatch, AssetStatus, NewAsset};
pub use form::{FormField, asset_form_fields};
pub use import::{DuplicatePolicy, ImportRow, ImportTally};
pub use residual_form::ResidualForm;
pub use stats::AssetStats;
