use crate::api::encode_path;

/// Deep-link parameters: `path=...&publish=...&subscribe=...`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkParams {
    pub path: Option<String>,
    pub publish: Option<String>,
    pub subscribe: Option<String>,
}

impl LinkParams {
    /// Parse a query string, with or without its leading `?`. Unknown keys
    /// and undecodable values are skipped.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for pair in query.trim_start_matches('?').split('&') {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = match urlencoding::decode(&raw.replace('+', " ")) {
                Ok(v) => v.into_owned(),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "skipping undecodable link parameter");
                    continue;
                }
            };
            if value.is_empty() {
                continue;
            }
            match key {
                "path" => params.path = Some(value),
                "publish" => params.publish = Some(value),
                "subscribe" => params.subscribe = Some(value),
                _ => {}
            }
        }
        params
    }

    /// Fields set in `other` win.
    pub fn merge(self, other: LinkParams) -> Self {
        Self {
            path: other.path.or(self.path),
            publish: other.publish.or(self.publish),
            subscribe: other.subscribe.or(self.subscribe),
        }
    }

    /// Render back to a query string (without `?`).
    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(path) = &self.path {
            parts.push(format!("path={}", encode_path(path)));
        }
        if let Some(publish) = &self.publish {
            parts.push(format!("publish={}", urlencoding::encode(publish)));
        }
        if let Some(subscribe) = &self.subscribe {
            parts.push(format!("subscribe={}", urlencoding::encode(subscribe)));
        }
        parts.join("&")
    }
}
