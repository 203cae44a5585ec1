//! Spotify identifiers as the default remote link.

use bridge_traits::RemoteLink;

pub const SPOTIFY_UNAVAILABLE: &str = "spotify:track:unavailable";

const SPOTIFY_ID_LEN: usize = 22;

/// Validates `spotify:track:<id>` and `spotify:user:<name>` identifiers.
///
/// Matching is case-insensitive and ignores surrounding whitespace. The
/// unavailable sentinel is not itself a valid identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpotifyLink;

impl RemoteLink for SpotifyLink {
    fn validate_identifier(&self, value: &str) -> bool {
        let value = value.trim().to_lowercase();
        let parts: Vec<&str> = value.split(':').collect();
        let [scheme, kind, id] = parts.as_slice() else {
            return false;
        };

        *scheme == "spotify"
            && (*kind == "user" || id.chars().count() == SPOTIFY_ID_LEN)
    }

    fn unavailable_sentinel(&self) -> &str {
        SPOTIFY_UNAVAILABLE
    }
}
