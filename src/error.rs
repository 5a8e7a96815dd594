//! Error types for domain seeding

/// Errors that can occur while configuring, relaxing or exporting a seeded domain
#[derive(Debug, thiserror::Error)]
pub enum SeederError {
    /// Domain bounds are empty, inverted or not finite
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    /// Configuration validation failed
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Rejection sampling could not find an unoccupied point within the retry budget
    #[error("mask exhausted: no unoccupied point found after {attempts} attempts")]
    MaskExhausted {
        /// Number of draws made before giving up
        attempts: usize,
    },
    /// Image decoding or encoding failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    /// Writing an output file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The dedicated worker pool could not be created
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type alias for seeding operations
pub type Result<T> = std::result::Result<T, SeederError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SeederError::InvalidConfiguration("site count must be positive".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: site count must be positive"
        );

        let err = SeederError::MaskExhausted { attempts: 10 };
        assert_eq!(
            err.to_string(),
            "mask exhausted: no unoccupied point found after 10 attempts"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SeederError = io.into();
        assert!(matches!(err, SeederError::Io(_)));
    }
}
