//! Domain logic built on top of the data layer

pub mod analytics;
