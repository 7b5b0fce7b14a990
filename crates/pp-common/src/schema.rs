//! Schema versioning for wire-visible types.

/// Schema version for `ProcessEnvelope` (TopNBatch + aggregate rows).
///
/// Follows semver: MAJOR.MINOR.PATCH. MAJOR bumps on field removal or type
/// change; MINOR on additive, optional fields; PATCH otherwise. Field tags
/// at or below 19 are frozen per the wire-format contract and must never be
/// reassigned.
pub const PROCESS_ENVELOPE_SCHEMA_VERSION: &str = "2.1.0";

/// Highest field tag frozen by the `ProcessEnvelope` v2.1 contract.
pub const FROZEN_FIELD_TAG_MAX: u32 = 19;

/// Current `DDSketch` wire-format version byte (see `pp_sketch::wire`).
pub const SKETCH_WIRE_VERSION: u8 = 1;
