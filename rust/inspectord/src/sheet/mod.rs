mod cell;
pub mod csv;
mod parse;
mod serialize;

pub use cell::{Cell, Row};
pub use parse::{parse, parse_score, ParseWarning, ParsedSheet};
pub use serialize::serialize;
