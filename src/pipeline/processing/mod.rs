pub mod clean;
pub mod features;
pub mod names;
pub mod outliers;
