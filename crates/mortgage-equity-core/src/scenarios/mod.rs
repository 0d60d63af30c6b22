pub mod sensitivity;

pub use sensitivity::{cap_rate_sensitivity, SensitivityInput, SensitivityOutput};
