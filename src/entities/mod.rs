// Entity Models
// The canonical facility record and its lightweight projections.
//
// A Facility is built once per load by the reconciliation pass and is
// immutable afterward; a reload replaces the whole collection.

pub mod facility;

pub use facility::{Facility, FacilitySummary, MapPoint, UNKNOWN_FACILITY_NAME};
