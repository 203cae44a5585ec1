//! Remote Music Service Link
//!
//! The engine stores a remote identifier ("URI") inside a track's tags. It
//! only needs two things from the remote service client: a syntactic validity
//! check and the sentinel value written when a track is known to have no
//! remote counterpart.

/// Remote identifier contract
///
/// # Example
///
/// ```ignore
/// use bridge_traits::remote::RemoteLink;
///
/// fn classify(link: &dyn RemoteLink, value: &str) -> Option<bool> {
///     if value == link.unavailable_sentinel() {
///         Some(false)
///     } else if link.validate_identifier(value) {
///         Some(true)
///     } else {
///         None
///     }
/// }
/// ```
pub trait RemoteLink: Send + Sync {
    /// Returns `true` when `value` is a syntactically valid remote identifier.
    fn validate_identifier(&self, value: &str) -> bool;

    /// Value stored in place of an identifier when the track is known to be
    /// unavailable on the remote service.
    fn unavailable_sentinel(&self) -> &str;
}
