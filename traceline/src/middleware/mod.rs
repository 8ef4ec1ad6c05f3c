pub mod trace;

pub use trace::TraceWrapper;
