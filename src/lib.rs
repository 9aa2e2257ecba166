pub mod api;
pub mod config;
pub mod logging;
pub mod runtime;
pub mod state;
pub mod types;
pub mod util;

#[cfg(test)]
mod test_support;
