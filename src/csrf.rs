use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;

/// Generates a cryptographically random state parameter for `OAuth2`.
///
/// Returns a 43-character URL-safe string (32 random bytes → base64url).
/// The state is round-tripped through the provider redirect and compared
/// against the stored copy on callback to reject forged callbacks.
#[must_use]
pub fn generate_state() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}
