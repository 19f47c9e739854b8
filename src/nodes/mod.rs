pub mod iter_source;
pub mod print;

pub use iter_source::IterSource;
pub use print::PrintReport;
