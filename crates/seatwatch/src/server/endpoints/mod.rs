pub mod sections;
pub mod stats;
pub mod status;
pub mod sync;
pub mod tracking;
pub mod ws;
