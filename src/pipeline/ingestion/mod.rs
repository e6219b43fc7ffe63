pub mod loader;

pub use loader::{load_demographics, load_gdp, load_population};
