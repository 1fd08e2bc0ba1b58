//! Maps heterogeneous upstream rows onto canonical [`Record`](relief_core::Record)s.
//!
//! Field-name guessing is data-driven: every dataset category declares a
//! [`Schema`] listing, per canonical field, the upstream names to try in
//! priority order.

pub mod normalizer;
pub mod rows;
pub mod schema;
pub mod schemas;

pub use normalizer::{DropCounts, NormalizationError, NormalizeReport, Normalizer};
pub use rows::{extract_rows, inject_constants, RowShapeError};
pub use schema::{FieldDefault, FieldKind, FieldSpec, Schema};
