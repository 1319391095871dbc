//! EDF / EDF+ recording I/O.
//!
//! Loads European Data Format files (through `edf-reader`) into the
//! in-memory [`Recording`] the spindle detector works on, and writes
//! recordings back out with `edfplus`.
//!
//! # Quick start
//! ```no_run
//! use spindlestats::edf::read_edf;
//!
//! let rec = read_edf("Archive/subj1.edf").unwrap();
//! println!("{} channels @ {} Hz, {:.0} s", rec.n_chan(), rec.sfreq, rec.duration_secs());
//! ```
pub mod raw;
pub mod writer;

pub use raw::{read_edf, Recording};
pub use writer::write_edf;
