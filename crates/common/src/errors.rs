use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Unresolvable symbol {symbol}: {reason}")]
    ProviderSymbol { symbol: String, reason: String },
    #[error("Transient provider failure: {0}")]
    ProviderTransient(String),
    #[error("Undecodable payload for {symbol}: {reason}")]
    Decode { symbol: String, reason: String },
    #[error("Persistence error: {0}")]
    Persistence(#[source] BoxError),
}

impl FeedError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn symbol(symbol: &str, reason: impl Into<String>) -> Self {
        Self::ProviderSymbol {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn decode(symbol: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn persistence<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Persistence(Box::new(err))
    }

    /// Worth another attempt inside the same cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderTransient(_))
    }

    /// Retrying cannot help; the caller should stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Affects a single symbol only; the rest of the batch goes on.
    pub fn is_symbol_scoped(&self) -> bool {
        matches!(self, Self::ProviderSymbol { .. } | Self::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_retry_policy() {
        assert!(FeedError::ProviderTransient("429".into()).is_transient());
        assert!(!FeedError::config("bad mode").is_transient());
        assert!(FeedError::symbol("AMD", "invalid").is_symbol_scoped());
        assert!(FeedError::decode("AMD", "bad number").is_symbol_scoped());
        assert!(!FeedError::persistence(std::io::Error::other("disk")).is_symbol_scoped());
        assert!(FeedError::config("HTTP 401").is_fatal());
        assert!(!FeedError::ProviderTransient("429".into()).is_fatal());
        assert!(!FeedError::persistence(std::io::Error::other("locked")).is_fatal());
    }

    #[test]
    fn persistence_keeps_its_source() {
        use std::error::Error;

        let err = FeedError::persistence(std::io::Error::other("locked"));
        assert_eq!(err.to_string(), "Persistence error: locked");
        assert!(err.source().is_some());
    }
}
