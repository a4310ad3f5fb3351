pub type VoxweaveResult<T> = Result<T, VoxweaveError>;

#[derive(thiserror::Error, Debug)]
pub enum VoxweaveError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("negotiation error: {0}")]
    Negotiation(String),

    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VoxweaveError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn negotiation(msg: impl Into<String>) -> Self {
        Self::Negotiation(msg.into())
    }

    pub fn data_integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            VoxweaveError::config("x")
                .to_string()
                .contains("configuration error:")
        );
        assert!(
            VoxweaveError::negotiation("x")
                .to_string()
                .contains("negotiation error:")
        );
        assert!(
            VoxweaveError::data_integrity("x")
                .to_string()
                .contains("data integrity error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = VoxweaveError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
