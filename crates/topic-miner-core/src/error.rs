use thiserror::Error;

/// Errors raised by the post-collection pipeline.
///
/// Configuration errors (`UnsupportedStrategy`, `UnsupportedBucketInterval`)
/// abort a run; there is no fallback to a default. `EmptyTopic` and
/// `ClusterLabelMismatch` indicate a broken caller contract.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported dedupe strategy: {0}")]
    UnsupportedStrategy(String),

    #[error("Unsupported bucket_interval: {0}")]
    UnsupportedBucketInterval(String),

    #[error("Unsupported noise handling: {0}")]
    UnsupportedNoiseHandling(String),

    #[error("Cannot create topic {0} with empty items")]
    EmptyTopic(i64),

    #[error("Clusterer returned {actual} labels for {expected} texts")]
    ClusterLabelMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
