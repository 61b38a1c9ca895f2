//! Common error types for modem HTTP operations

/// A common error type for modem HTTP operations.
///
/// This enum defines the local failure categories of the HTTP engine. It is
/// designed to be simple and portable for `no_std` environments. The remote
/// HTTP status is not an error: it travels in the `Ok` value of the request
/// operations, and callers decide what to do with a non-2xx outcome.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The channel lock, a result trailer or a data event was not obtained
    /// in time.
    Timeout,
    /// The operation was attempted while the channel or its data consumer
    /// was busy.
    Conflict,
    /// The operation was attempted in the wrong state, or a response could
    /// not be parsed.
    PreconditionFailed,
    /// An unattributed transport failure.
    InternalError,
    /// A staging buffer or fixed-capacity field was too small.
    Overflow,
    /// The host URL failed validation.
    InvalidUrl,
    /// A modem or transport error code, propagated verbatim.
    Device(u16),
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::Conflict => defmt::write!(f, "Conflict"),
            Error::PreconditionFailed => defmt::write!(f, "PreconditionFailed"),
            Error::InternalError => defmt::write!(f, "InternalError"),
            Error::Overflow => defmt::write!(f, "Overflow"),
            Error::InvalidUrl => defmt::write!(f, "InvalidUrl"),
            Error::Device(code) => defmt::write!(f, "Device({=u16})", *code),
        }
    }
}
