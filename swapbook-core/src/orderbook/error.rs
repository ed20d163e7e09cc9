use swapbook_sdk::objects::ObjectError;
use swapbook_sdk::objects::order::SignObjectError;
use swapbook_sdk::{IdentityError, OrderId, SignatureError};

/// Why an incoming order or withdrawal was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderRejection {
    #[error("malformed message: {0}")]
    Decode(String),
    #[error("cannot recover signer key: {0}")]
    UnknownSigner(String),
    #[error("signature does not verify")]
    SignatureInvalid,
    #[error("order expired at {expiry}")]
    Expired { expiry: i64 },
}

impl From<ObjectError> for OrderRejection {
    fn from(err: ObjectError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<IdentityError> for OrderRejection {
    fn from(err: IdentityError) -> Self {
        Self::UnknownSigner(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderBookError {
    #[error("order {0} not found")]
    NotFound(OrderId),
}

/// Failure to build a local order.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("failed to sign order: {0}")]
    Signing(#[from] SignatureError),
    #[error("failed to encode order: {0}")]
    Encode(#[from] ObjectError),
}

impl From<SignObjectError> for SubmitError {
    fn from(err: SignObjectError) -> Self {
        match err {
            SignObjectError::Object(e) => Self::Encode(e),
            SignObjectError::Signature(e) => Self::Signing(e),
        }
    }
}
