//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows, limits and timeouts > 0)
//! - Validate collaborator URLs for enabled features
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("model.evaluation_threshold must be at most 100, got {0}")]
    ThresholdOutOfRange(u8),

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    let positive: [(&'static str, u64); 7] = [
        ("listener.max_body_bytes", config.listener.max_body_bytes as u64),
        ("rate_limit.window_ms", config.rate_limit.window_ms),
        ("rate_limit.max_requests", config.rate_limit.max_requests as u64),
        ("rate_limit.max_tracked_clients", config.rate_limit.max_tracked_clients as u64),
        ("security.timeout_ms", config.security.timeout_ms),
        ("audit.timeout_ms", config.audit.timeout_ms),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }

    if config.model.timeout_secs == 0 {
        errors.push(ValidationError::NotPositive {
            field: "model.timeout_secs",
        });
    }

    if config.security.enabled {
        check_url(&mut errors, "security.service_url", &config.security.service_url);
    }
    if config.audit.enabled {
        check_url(&mut errors, "audit.sink_url", &config.audit.sink_url);
    }
    check_url(&mut errors, "model.base_url", &config.model.base_url);

    let persistence = &config.persistence;
    if persistence.enabled {
        if !persistence.mongodb_url.starts_with("mongodb://")
            && !persistence.mongodb_url.starts_with("mongodb+srv://")
        {
            errors.push(ValidationError::InvalidUrl {
                field: "persistence.mongodb_url",
                value: persistence.mongodb_url.clone(),
            });
        }
        for (field, value) in [
            ("persistence.database", &persistence.database),
            ("persistence.collection", &persistence.collection),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::Empty { field });
            }
        }
        if persistence.timeout_ms == 0 {
            errors.push(ValidationError::NotPositive {
                field: "persistence.timeout_ms",
            });
        }
    }

    let publishing = &config.publishing;
    if publishing.enabled {
        if publishing.brokers.iter().all(|b| b.trim().is_empty()) {
            errors.push(ValidationError::Empty {
                field: "publishing.brokers",
            });
        }
        if publishing.topic.trim().is_empty() {
            errors.push(ValidationError::Empty {
                field: "publishing.topic",
            });
        }
        if publishing.timeout_ms == 0 {
            errors.push(ValidationError::NotPositive {
                field: "publishing.timeout_ms",
            });
        }
    }

    if config.model.evaluation_threshold > 100 {
        errors.push(ValidationError::ThresholdOutOfRange(
            config.model.evaluation_threshold,
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match url::Url::parse(value) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        _ => errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}
