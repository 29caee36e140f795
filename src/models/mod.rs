// Data models for decoded video frames and pose landmark sequences

pub mod frame;
pub mod pose;
