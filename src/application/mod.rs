pub mod calibration;
pub mod context;
pub mod features;
pub mod history;
pub mod model;
pub mod sequences;
pub mod signal;
pub mod training;
