use std::time::Duration;

use thiserror::Error;

/// Aggregates every failure mode exposed by the message model, the provider layer,
/// and tool orchestration.
///
/// Variants stay granular so adapters can report what actually went wrong; use
/// [`EllError::kind`] when only the coarse category matters.
#[derive(Debug, Error)]
pub enum EllError {
    /// A content block or message violates its shape invariants, or a value could not
    /// be coerced into content.
    #[error("invalid content: {message}")]
    InvalidContent { message: String },
    /// An adapter rejected the inputs before contacting the vendor.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    /// Represents transport-layer or networking failures.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Reports invalid or missing credentials.
    #[error("auth failure: {message}")]
    Auth { message: String },
    /// Indicates that the provider throttled the request.
    #[error("rate limited: {message}")]
    RateLimit {
        /// Raw message returned by the upstream provider.
        message: String,
        /// Optional wait duration suggested by the provider before retrying.
        retry_after: Option<Duration>,
    },
    /// Wraps vendor-side errors that cannot be normalized further.
    #[error("provider {provider} error: {message}")]
    Provider {
        /// Name of the provider, such as `openai_chat`.
        provider: &'static str,
        /// Human-readable error message returned by the provider.
        message: String,
    },
    /// The vendor response could not be parsed or schema-decoded.
    #[error("provider {provider} returned an undecodable response: {message}")]
    ResponseDecode {
        provider: &'static str,
        message: String,
    },
    /// A single tool failed while being invoked.
    #[error("tool {tool} failed: {message}")]
    ToolInvocation { tool: String, message: String },
    /// The caller cancelled the operation.
    #[error("cancelled: {message}")]
    Cancelled { message: String },
    /// Raised when building or validating configuration fails.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
}

/// Coarse error categories shared by every component of the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidContent,
    InvalidRequest,
    ProviderFailure,
    ResponseDecode,
    ToolInvocation,
    Cancelled,
    Configuration,
}

impl EllError {
    /// Creates an [`EllError::InvalidContent`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use ell_core::error::{EllError, ErrorKind};
    ///
    /// let err = EllError::invalid_content("text and audio are both set");
    /// assert_eq!(err.kind(), ErrorKind::InvalidContent);
    /// ```
    pub fn invalid_content<T: Into<String>>(message: T) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }

    /// Creates an [`EllError::InvalidRequest`] from a textual description.
    pub fn invalid_request<T: Into<String>>(message: T) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an [`EllError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use ell_core::error::EllError;
    ///
    /// let err = EllError::transport("dns lookup failed");
    /// assert!(matches!(err, EllError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`EllError::Provider`] with the given provider name and message.
    ///
    /// # Examples
    ///
    /// ```
    /// use ell_core::error::EllError;
    ///
    /// let err = EllError::provider("openai_chat", "bad JSON payload");
    /// assert!(matches!(err, EllError::Provider { provider: "openai_chat", .. }));
    /// ```
    pub fn provider<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Creates an [`EllError::ResponseDecode`] for the given provider.
    pub fn response_decode<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::ResponseDecode {
            provider,
            message: message.into(),
        }
    }

    /// Creates an [`EllError::ToolInvocation`] for the named tool.
    pub fn tool<N: Into<String>, T: Into<String>>(tool: N, message: T) -> Self {
        Self::ToolInvocation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Creates an [`EllError::Cancelled`] from a textual description.
    pub fn cancelled<T: Into<String>>(message: T) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Maps the variant onto its coarse [`ErrorKind`].
    ///
    /// Transport, authentication, throttling, and vendor errors all count as
    /// [`ErrorKind::ProviderFailure`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidContent { .. } => ErrorKind::InvalidContent,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::Transport { .. }
            | Self::Auth { .. }
            | Self::RateLimit { .. }
            | Self::Provider { .. } => ErrorKind::ProviderFailure,
            Self::ResponseDecode { .. } => ErrorKind::ResponseDecode,
            Self::ToolInvocation { .. } => ErrorKind::ToolInvocation,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidConfig { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns `true` for failures raised by the transport or the vendor.
    pub fn is_provider_failure(&self) -> bool {
        self.kind() == ErrorKind::ProviderFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_groups_vendor_failures() {
        let errors = [
            EllError::transport("reset"),
            EllError::Auth {
                message: "bad key".into(),
            },
            EllError::RateLimit {
                message: "slow down".into(),
                retry_after: Some(Duration::from_secs(1)),
            },
            EllError::provider("openai_chat", "boom"),
        ];
        for err in errors {
            assert!(err.is_provider_failure(), "{err:?}");
        }
    }

    #[test]
    fn kind_keeps_local_failures_apart() {
        assert_eq!(
            EllError::invalid_content("x").kind(),
            ErrorKind::InvalidContent
        );
        assert_eq!(
            EllError::invalid_request("x").kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            EllError::response_decode("openai_chat", "x").kind(),
            ErrorKind::ResponseDecode
        );
        assert_eq!(EllError::tool("add", "x").kind(), ErrorKind::ToolInvocation);
        assert_eq!(EllError::cancelled("x").kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn display_includes_tool_name() {
        let err = EllError::tool("add", "division by zero");
        assert_eq!(err.to_string(), "tool add failed: division by zero");
    }
}
