pub mod worldometers;
