//! Band-pass filtering for spindle detection.
//!
//! The detector needs two views of every channel: a broadband one
//! (default 1-30 Hz) for relative sigma power, and a sigma-band one
//! (default 12-15 Hz) for the envelope, correlation and RMS criteria.
//!
//! - [`design`]: Hamming-windowed sinc band-pass kernels with automatic
//!   transition bands and lengths.
//! - [`apply`]: overlap-add convolution, advanced by half the kernel so
//!   filtered samples stay aligned with raw ones.

pub mod apply;
pub mod design;

pub use design::{
    auto_filter_length, auto_h_trans_bandwidth, auto_l_trans_bandwidth, design_bandpass,
    firwin_bandpass, gain_at, hamming,
};
pub use apply::{apply_fir_zero_phase, filter_1d};
