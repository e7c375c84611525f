pub mod chart;
pub mod gameplay;
pub mod judgment;
pub mod lanes;
pub mod note;
pub mod scores;
pub mod scroll;
pub mod timing_windows;
