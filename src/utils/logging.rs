//! Logging utilities for consistent logging across the node
//!
//! Provides simple, non-overengineered logging initialization that:
//! - Supports centralized node logging
//! - Respects RUST_LOG environment variable
//! - Allows configuration via config file
//!
//! # Usage
//!
//! ## Main Node
//! ```rust
//! use elements_spv::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for the main node
///
/// Uses standard Rust logging practices:
/// - Respects RUST_LOG environment variable (standard practice)
/// - Falls back to config filter if provided
/// - Defaults to "info" level
/// - Uses `EnvFilter::from_default_env()` for proper RUST_LOG handling
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g., "info", "debug", "elements_spv=debug,network=trace")
///              If None, uses RUST_LOG environment variable or defaults to "info"
///
/// # Example
/// ```rust
/// use elements_spv::utils::init_logging;
///
/// // Use RUST_LOG (standard) or default to "info"
/// init_logging(None);
///
/// // Override with config filter (RUST_LOG still takes precedence)
/// init_logging(Some("debug"));
/// ```
pub fn init_logging(filter: Option<&str>) {
    // Standard practice: Use EnvFilter::from_default_env() which properly handles RUST_LOG
    // This respects the standard RUST_LOG environment variable format
    let mut env_filter = EnvFilter::from_default_env();
    
    // If config provides a filter and RUST_LOG is not set, use config filter
    // RUST_LOG always takes precedence (standard practice)
    if filter.is_some() && std::env::var("RUST_LOG").is_err() {
        if let Some(f) = filter {
            env_filter = EnvFilter::new(f);
        }
    }
    
    // If neither RUST_LOG nor config filter is set, default to "info"
    if std::env::var("RUST_LOG").is_err() && filter.is_none() {
        env_filter = EnvFilter::new("info");
    }

    // Standard setup following Rust logging best practices:
    // - Human-readable format (default)
    // - Output to stderr (standard for logs)
    // - Include target (module path) for better debugging
    // - Thread IDs disabled by default (can be noisy)
    // - ANSI colors enabled (can be disabled via NO_COLOR env var)
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true) // Include module path - useful for debugging
                .with_thread_ids(false) // Disable by default (can be noisy)
                .with_ansi(!std::env::var("NO_COLOR").is_ok()), // Respect NO_COLOR standard
        )
        .with(env_filter)
        .init();
}

/// Initialize logging with JSON output (for production/monitoring)
///
/// Useful when logs need to be parsed by log aggregation systems.
///
/// # Arguments
/// * `filter` - Optional log filter. If None, uses RUST_LOG or defaults to "info"
///
/// # Example
/// ```rust
/// use elements_spv::utils::init_json_logging;
///
/// init_json_logging(None);
/// ```
/// Initialize logging with JSON output (for production/monitoring)
///
/// Useful when logs need to be parsed by log aggregation systems.
/// Follows standard structured logging practices.
///
/// # Arguments
/// * `filter` - Optional log filter from config. If None, uses RUST_LOG or defaults to "info"
///
/// # Example
/// ```rust
/// use elements_spv::utils::init_json_logging;
///
/// init_json_logging(None);
/// ```
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    // Standard practice: Use EnvFilter::from_default_env() for RUST_LOG
    let mut env_filter = EnvFilter::from_default_env();
    
    // If config provides a filter and RUST_LOG is not set, use config filter
    if filter.is_some() && std::env::var("RUST_LOG").is_err() {
        if let Some(f) = filter {
            env_filter = EnvFilter::new(f);
        }
    }
    
    // If neither RUST_LOG nor config filter is set, default to "info"
    if std::env::var("RUST_LOG").is_err() && filter.is_none() {
        env_filter = EnvFilter::new("info");
    }

    // JSON logging for structured logging (production/monitoring):
    // - JSON format for log aggregation systems
    // - Include target, spans, and span lists for full context
    // - Standard structured logging practice
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true) // Include module path in JSON
                .with_current_span(true) // Include current span context
                .with_span_list(true), // Include span list for full context
        )
        .with(env_filter)
        .init();
}

/// Initialize logging from a `Config`'s `LoggingConfig`
///
/// Integrates logging configuration from config file with standard RUST_LOG handling.
/// RUST_LOG always takes precedence (standard practice).
///
/// # Arguments
/// * `config` - Optional `LoggingConfig` from `Config`
///
/// # Example
/// ```rust
/// use elements_spv::utils::init_logging_from_config;
/// use elements_spv::config::LoggingConfig;
///
/// let config = LoggingConfig::default();
/// init_logging_from_config(Some(&config));
/// ```
pub fn init_logging_from_config(config: Option<&crate::config::LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());
    
    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            // Fall back to regular logging if json-logging feature not enabled
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}
