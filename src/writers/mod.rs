// File writers: concrete implementations of ProblemWriter

pub(crate) mod common;

pub mod baron;
pub mod factory;
pub mod gams;
pub mod lp;
pub mod nl;

pub use baron::BaronWriter;
pub use common::{format_number, split_long_lines};
pub use factory::WriterFactory;
pub use gams::GamsWriter;
pub use lp::LpWriter;
pub use nl::NlWriter;
