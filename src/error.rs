use thiserror::Error;

/// Reasons an extractor gives up on a product. All of them abort the run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{maker}: `{product}` has no `{field}` field")]
    MissingField {
        maker: String,
        product: String,
        field: String,
    },

    #[error("{maker}: cannot parse {field} of `{product}` from {value:?}")]
    PatternMismatch {
        maker: String,
        product: String,
        field: String,
        value: String,
    },

    #[error("{maker}: unsupported product {label:?}, add it to the name aliases")]
    UnsupportedProduct { maker: String, label: String },

    #[error("{maker}: `{product}` breaks an invariant: {detail}")]
    InvariantViolation {
        maker: String,
        product: String,
        detail: String,
    },
}
