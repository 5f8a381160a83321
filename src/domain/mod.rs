//! Domain modules (vertical slices): types, wire types, conversions, state.

pub mod clan;
pub mod notification;
