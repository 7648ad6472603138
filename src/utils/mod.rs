/// Bounded retries for provider calls.
pub mod retry;
/// TOML configuration with hot reloading.
pub mod toml_config;
