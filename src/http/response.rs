//! Result trailer parsing
//!
//! Long-running HTTP commands report their true outcome through an
//! asynchronous trailer line of the form `<err>[,<status>[,<len>]]` (the
//! method prefix is stripped by the channel). The status and length
//! fields are only present when the firmware reached the remote end.

use crate::error::Error;

/// Parse the leading `<err>` field of a trailer tail.
pub(crate) fn parse_err(tail: &str) -> Result<u16, Error> {
    let end = tail.find(',').unwrap_or(tail.len());
    tail[..end]
        .trim()
        .parse::<u16>()
        .map_err(|_| Error::PreconditionFailed)
}

/// Parse the `<status>[,<len>]` fields following the `<err>` field.
///
/// A missing length is reported as zero; a tail with no separator at all
/// carries no status and is rejected.
pub(crate) fn parse_status(tail: &str) -> Result<(u16, u32), Error> {
    let rest = match tail.find(',') {
        Some(at) => &tail[at + 1..],
        None => return Err(Error::PreconditionFailed),
    };
    let (status_field, len_field) = match rest.find(',') {
        Some(at) => (&rest[..at], Some(&rest[at + 1..])),
        None => (rest, None),
    };

    let status = status_field
        .trim()
        .parse::<u16>()
        .map_err(|_| Error::PreconditionFailed)?;
    let length = match len_field {
        Some(field) => field.trim().parse::<u32>().unwrap_or(0),
        None => 0,
    };
    Ok((status, length))
}
