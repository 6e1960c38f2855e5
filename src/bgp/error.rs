//! Errors surfacing from the BGP codec.
//!
//! Decoding failures come in three kinds:
//!
//! * [`ParseError`] is what the low level parsers return. It never crosses
//!   a registry dispatch boundary as-is: the attribute and message layers
//!   translate it into one of the two kinds below.
//! * [`DocumentedError`] is fatal for the session. It carries the error
//!   code and subcode (and optional data) of the NOTIFICATION to send to
//!   the peer before tearing the session down.
//! * [`TreatAsWithdraw`] is the RFC 7606 recoverable case: the UPDATE it
//!   came from is discarded and its routes are to be considered withdrawn,
//!   the session itself stays up.

use std::error::Error;
use std::fmt;

use crate::typeenum; // from util::macros
use crate::util::parser::ParseError;

typeenum!(
/// NOTIFICATION error codes, RFC 4271 and RFC 7313.
    ErrorCode, u8,
    1 => MessageHeader,
    2 => OpenMessage,
    3 => UpdateMessage,
    4 => HoldTimerExpired,
    5 => FiniteStateMachine,
    6 => Cease,
    7 => RouteRefreshMessage,
);

typeenum!(
/// Subcodes for [`ErrorCode::MessageHeader`].
    HeaderErrorSubcode, u8,
    1 => ConnectionNotSynchronized,
    2 => BadMessageLength,
    3 => BadMessageType,
);

typeenum!(
/// Subcodes for [`ErrorCode::OpenMessage`].
    OpenErrorSubcode, u8,
    1 => UnsupportedVersionNumber,
    2 => BadPeerAs,
    3 => BadBgpIdentifier,
    4 => UnsupportedOptionalParameter,
    6 => UnacceptableHoldTime,
    7 => UnsupportedCapability,
);

typeenum!(
/// Subcodes for [`ErrorCode::UpdateMessage`].
    UpdateErrorSubcode, u8,
    1 => MalformedAttributeList,
    2 => UnrecognizedWellknownAttribute,
    3 => MissingWellknownAttribute,
    4 => AttributeFlagsError,
    5 => AttributeLengthError,
    6 => InvalidOriginAttribute,
    8 => InvalidNextHopAttribute,
    9 => OptionalAttributeError,
    10 => InvalidNetworkField,
    11 => MalformedAsPath,
);

typeenum!(
/// Subcodes for [`ErrorCode::RouteRefreshMessage`].
    RouteRefreshErrorSubcode, u8,
    1 => InvalidMessageLength,
);

//------------ DocumentedError -----------------------------------------------

/// A session-fatal error to be reported to the peer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DocumentedError {
    code: ErrorCode,
    subcode: u8,
    data: Vec<u8>,
    reason: &'static str,
    cause: Option<ParseError>,
}

impl DocumentedError {
    pub fn new(
        code: ErrorCode,
        subcode: u8,
        data: Vec<u8>,
        reason: &'static str,
    ) -> Self {
        DocumentedError { code, subcode, data, reason, cause: None }
    }

    pub fn header(
        subcode: HeaderErrorSubcode,
        data: Vec<u8>,
        reason: &'static str,
    ) -> Self {
        Self::new(ErrorCode::MessageHeader, subcode.into(), data, reason)
    }

    pub fn open(
        subcode: OpenErrorSubcode,
        data: Vec<u8>,
        reason: &'static str,
    ) -> Self {
        Self::new(ErrorCode::OpenMessage, subcode.into(), data, reason)
    }

    pub fn update(
        subcode: UpdateErrorSubcode,
        data: Vec<u8>,
        reason: &'static str,
    ) -> Self {
        Self::new(ErrorCode::UpdateMessage, subcode.into(), data, reason)
    }

    /// Records the low level error that caused this one.
    pub fn with_cause(mut self, cause: ParseError) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn subcode(&self) -> u8 {
        self.subcode
    }

    /// Returns the diagnostic data for the NOTIFICATION.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }

    pub fn cause(&self) -> Option<ParseError> {
        self.cause
    }
}

impl fmt::Display for DocumentedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}/{})", self.reason, self.code, self.subcode)?;
        if let Some(cause) = self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl Error for DocumentedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_ref().map(|e| e as &(dyn Error + 'static))
    }
}

//------------ TreatAsWithdraw -----------------------------------------------

/// A malformed UPDATE whose routes are to be treated as withdrawn.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreatAsWithdraw {
    subcode: UpdateErrorSubcode,
    data: Vec<u8>,
    reason: &'static str,
    cause: Option<ParseError>,
}

impl TreatAsWithdraw {
    pub fn new(
        subcode: UpdateErrorSubcode,
        data: Vec<u8>,
        reason: &'static str,
    ) -> Self {
        TreatAsWithdraw { subcode, data, reason, cause: None }
    }

    pub fn with_cause(mut self, cause: ParseError) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn subcode(&self) -> UpdateErrorSubcode {
        self.subcode
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }

    /// Turns this into the UPDATE error NOTIFICATION RFC 4271 would send.
    pub fn into_documented(self) -> DocumentedError {
        let res = DocumentedError::update(
            self.subcode, self.data, self.reason
        );
        match self.cause {
            Some(cause) => res.with_cause(cause),
            None => res,
        }
    }
}

impl fmt::Display for TreatAsWithdraw {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "treat-as-withdraw: {} ({})", self.reason, self.subcode)
    }
}

impl Error for TreatAsWithdraw {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_ref().map(|e| e as &(dyn Error + 'static))
    }
}

impl From<TreatAsWithdraw> for DocumentedError {
    fn from(taw: TreatAsWithdraw) -> Self {
        taw.into_documented()
    }
}

//------------ AttributeErrorPolicy ------------------------------------------

/// How a malformed path attribute affects its UPDATE, RFC 7606 section 7.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AttributeErrorPolicy {
    /// Discard the UPDATE and withdraw its routes.
    TreatAsWithdraw,

    /// Drop the attribute, keep the rest of the UPDATE.
    AttributeDiscard,

    /// Reset the session.
    SessionReset,
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(u8::from(ErrorCode::UpdateMessage), 3);
        assert_eq!(ErrorCode::from(6), ErrorCode::Cease);
        assert_eq!(ErrorCode::from(42), ErrorCode::Unimplemented(42));
        assert_eq!(
            u8::from(UpdateErrorSubcode::MissingWellknownAttribute), 3
        );
    }

    #[test]
    fn treat_as_withdraw_escalates_to_update_error() {
        let taw = TreatAsWithdraw::new(
            UpdateErrorSubcode::MissingWellknownAttribute,
            vec![3],
            "NEXT_HOP missing"
        ).with_cause(ParseError::ShortInput);
        let err: DocumentedError = taw.into();
        assert_eq!(err.code(), ErrorCode::UpdateMessage);
        assert_eq!(err.subcode(), 3);
        assert_eq!(err.data(), &[3]);
        assert_eq!(err.cause(), Some(ParseError::ShortInput));
        assert!(err.source().is_some());
    }

    #[test]
    fn display() {
        let err = DocumentedError::header(
            HeaderErrorSubcode::BadMessageType, vec![9], "unknown type"
        );
        assert_eq!(err.to_string(), "unknown type (MessageHeader/3)");
    }
}
