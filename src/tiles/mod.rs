//! Site to satellite-tile resolution

mod resolver;

pub use resolver::{write_assignments, ColumnNames, SiteTileAssignment, TileResolver, ZoneRule};
