use crate::ConfigResult;

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate a `host:port` socket address string
    pub fn validate_bind_address(value: &str, field_name: &str) -> ConfigResult<()> {
        Self::validate_not_empty(value, field_name)?;
        if value.parse::<std::net::SocketAddr>().is_err() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be a valid socket address, got '{value}'"
            )));
        }
        Ok(())
    }

    /// Validate that a millisecond interval is reasonable
    pub fn validate_interval_ms(interval_ms: u64, field_name: &str) -> ConfigResult<()> {
        if interval_ms == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if interval_ms > 3_600_000 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to 3600000"
            )));
        }
        Ok(())
    }

    /// Validate that a count is reasonable
    pub fn validate_count(count: usize, field_name: &str, max: usize) -> ConfigResult<()> {
        if count == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > max {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to {max}"
            )));
        }
        Ok(())
    }

    /// Validate that a URL has a valid format
    pub fn validate_url(url: &str, field_name: &str) -> ConfigResult<()> {
        Self::validate_not_empty(url, field_name)?;

        // Basic URL format validation
        if !url.contains("://") {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be a valid URL with protocol"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(ValidationUtils::validate_not_empty("queue", "broker.default_queue").is_ok());
        assert!(ValidationUtils::validate_not_empty("  ", "broker.default_queue").is_err());
    }

    #[test]
    fn test_validate_bind_address() {
        assert!(ValidationUtils::validate_bind_address("0.0.0.0:8080", "api.bind_address").is_ok());
        assert!(ValidationUtils::validate_bind_address("localhost", "api.bind_address").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(ValidationUtils::validate_url("http://localhost:8000", "gateway").is_ok());
        assert!(ValidationUtils::validate_url("localhost:8000", "gateway").is_err());
    }

    #[test]
    fn test_validate_count() {
        assert!(ValidationUtils::validate_count(4, "worker.concurrency", 256).is_ok());
        assert!(ValidationUtils::validate_count(0, "worker.concurrency", 256).is_err());
        assert!(ValidationUtils::validate_count(512, "worker.concurrency", 256).is_err());
    }
}
