use serde_json::{Map, Value};

const SESSION_PREFIX: &str = "x-hasura-";
const AUTHORIZATION: &str = "authorization";
const USER_ID: &str = "x-hasura-user-id";

/// Trust headers lifted from the inbound request and replayed verbatim on
/// every metadata catalog call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedHeaders {
    headers: Vec<(String, String)>,
}

impl ForwardedHeaders {
    /// Keep only the headers the catalog authorizes with.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers = pairs
            .into_iter()
            .filter_map(|(name, value)| {
                let name = name.as_ref().to_ascii_lowercase();
                Self::is_forwardable(&name).then(|| (name, value.into()))
            })
            .collect();
        Self { headers }
    }

    pub fn is_forwardable(name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        name == AUTHORIZATION || name.starts_with(SESSION_PREFIX)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get(USER_ID)
    }

    /// Session variables recorded alongside a virus detection.
    pub fn session_variables(&self) -> Value {
        let map: Map<String, Value> = self
            .headers
            .iter()
            .filter(|(k, _)| k.starts_with(SESSION_PREFIX) && k != "x-hasura-admin-secret")
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_trust_headers_are_kept() {
        let headers = ForwardedHeaders::from_pairs(vec![
            ("Authorization", "Bearer t"),
            ("X-Hasura-User-Id", "u1"),
            ("Content-Type", "text/plain"),
        ]);
        assert_eq!(headers.iter().count(), 2);
        assert_eq!(headers.get("authorization"), Some("Bearer t"));
        assert_eq!(headers.user_id(), Some("u1"));
        assert!(headers.get("content-type").is_none());
    }

    #[test]
    fn test_session_variables_exclude_admin_secret() {
        let headers = ForwardedHeaders::from_pairs(vec![
            ("x-hasura-admin-secret", "s"),
            ("x-hasura-role", "user"),
        ]);
        let vars = headers.session_variables();
        assert_eq!(vars["x-hasura-role"], "user");
        assert!(vars.get("x-hasura-admin-secret").is_none());
    }
}
