pub mod cap_rate;
pub mod sensitivity;
