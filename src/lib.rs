pub mod cli;
pub mod error;
pub mod logging;
pub mod relay;

#[cfg(test)]
pub mod test_utils;
