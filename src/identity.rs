//! Owner identity: the opaque token that partitions all remote data.
//!
//! Generated once per device profile (`user_` + random suffix) and kept
//! stable unless a shared link overwrites it. The token is a plain
//! client-chosen string with no server-side authentication behind it;
//! anyone holding the string holds the dataset, which is exactly what
//! the share-a-link flow relies on.

use rand::distributions::Alphanumeric;
use rand::Rng;
use url::Url;

const OWNER_ID_PREFIX: &str = "user_";
const OWNER_ID_SUFFIX_LEN: usize = 13;

/// Lowercase alphanumeric token of the given length.
pub(crate) fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Generate a fresh owner id.
pub fn generate_owner_id() -> String {
    format!("{}{}", OWNER_ID_PREFIX, random_token(OWNER_ID_SUFFIX_LEN))
}

/// Extract the shared owner id from an app link, if it carries one.
/// Accepts any URL with a non-empty `userId` query parameter.
pub fn owner_id_from_link(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "userId")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Build the link another device opens to adopt this owner id.
pub fn share_link(server_url: &str, owner_id: &str) -> String {
    format!("{}/?userId={}", server_url.trim_end_matches('/'), owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_shape() {
        let id = generate_owner_id();

        assert!(id.starts_with("user_"));
        assert_eq!(id.len(), "user_".len() + 13);
        assert!(id
            .trim_start_matches("user_")
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate_owner_id(), generate_owner_id());
    }

    #[test]
    fn test_owner_id_from_link() {
        let id = owner_id_from_link("https://wedding.example/?userId=shared123");
        assert_eq!(id.as_deref(), Some("shared123"));
    }

    #[test]
    fn test_owner_id_from_link_with_other_params() {
        let id = owner_id_from_link("https://wedding.example/run?lang=en&userId=user_abc123");
        assert_eq!(id.as_deref(), Some("user_abc123"));
    }

    #[test]
    fn test_link_without_user_id() {
        assert!(owner_id_from_link("https://wedding.example/").is_none());
        assert!(owner_id_from_link("https://wedding.example/?userId=").is_none());
        assert!(owner_id_from_link("not a url").is_none());
    }

    #[test]
    fn test_share_link_round_trip() {
        let link = share_link("http://127.0.0.1:3000/", "user_abc");

        assert_eq!(link, "http://127.0.0.1:3000/?userId=user_abc");
        assert_eq!(owner_id_from_link(&link).as_deref(), Some("user_abc"));
    }
}
