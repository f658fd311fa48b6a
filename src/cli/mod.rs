//! Command line front end

pub mod orchestration;
