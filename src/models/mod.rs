//! Domain models for Wayfarer.
//!
//! # Core Concepts
//!
//! - [`Itinerary`]: the full travel plan (title, days, notes) treated as a
//!   single persistence unit. Every mutation is expressed as "replace the
//!   whole document", so concurrent saves resolve last-write-wins.
//! - [`Day`] / [`Item`]: the ordered timeline. Order is meaningful: it is
//!   the itinerary's calendar order, and drag-reorder in a client mutates it.
//! - [`Note`]: per-item annotations keyed by item id. A note's `kind` is
//!   derived from its content shape, never set independently.
//! - [`TempNote`]: an itinerary-independent scratch list, upserted by
//!   client-supplied id.
//! - [`ChangeDescriptor`]: the compact payload published whenever a document
//!   is written, fanned out to live-update streams.

mod itinerary;
mod temp_note;

pub use itinerary::*;
pub use temp_note::*;
