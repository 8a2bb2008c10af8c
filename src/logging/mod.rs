//! Structured logging helpers.

use crate::config::LoggingConfig;

/// Build the tracing filter string from the logging configuration: the base
/// level plus any per-component overrides, e.g.
/// `"info,conduit::health=debug"`.
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter = config.level.clone();
    if let Some(component_levels) = &config.component_levels {
        for (component, level) in component_levels {
            filter.push_str(&format!(",conduit::{component}={level}"));
        }
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_base_level_only() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(build_filter_directives(&config), "warn");
    }

    #[test]
    fn test_component_overrides_appended() {
        let mut component_levels = HashMap::new();
        component_levels.insert("health".to_string(), "debug".to_string());

        let config = LoggingConfig {
            level: "info".to_string(),
            component_levels: Some(component_levels),
            ..LoggingConfig::default()
        };
        assert_eq!(
            build_filter_directives(&config),
            "info,conduit::health=debug"
        );
    }
}
