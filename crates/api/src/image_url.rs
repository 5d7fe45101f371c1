//! Asset URL resolution.
//!
//! Uploaded images are stored as paths like `/uploads/avatars/1.png`. In
//! production they are served back as absolute URLs built from the request's
//! host and scheme. During local development the frontend dev server proxies
//! `/uploads` to us, so the browser must get the relative path instead.

use axum::http::{HeaderMap, Uri, header};
use serde_json::Value;

use crate::config::Config;

/// Nested objects that may carry a user with an `avatar`.
const NESTED_USER_FIELDS: &[&str] = &["user", "author", "parentComment"];

/// Port the API listens on during local development.
const DEV_BACKEND_PORT: &str = ":3000";

/// Request-derived context for building asset URLs.
#[derive(Debug, Clone)]
pub struct UrlContext {
    origin: Option<String>,
    host: String,
    scheme: String,
    production: bool,
    dev_frontend_ports: Vec<String>,
}

impl UrlContext {
    pub fn from_headers(headers: &HeaderMap, config: &Config) -> Self {
        let get = |name: &header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let origin = get(&header::ORIGIN)
            .or_else(|| get(&header::REFERER))
            .map(String::from);
        let host = get(&header::HOST).unwrap_or_default().to_string();
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("http")
            .to_string();

        Self {
            origin,
            host,
            scheme,
            production: config.is_production(),
            dev_frontend_ports: config.dev_frontend_ports.clone(),
        }
    }

    /// True when the request came through a local frontend dev server.
    fn from_dev_frontend(&self) -> bool {
        let Some(port) = self
            .origin
            .as_deref()
            .and_then(|origin| origin.parse::<Uri>().ok())
            .and_then(|uri| uri.port_u16())
        else {
            return false;
        };

        self.dev_frontend_ports
            .iter()
            .any(|p| p.parse::<u16>().ok() == Some(port))
    }

    fn is_local_backend(&self) -> bool {
        self.host.contains("localhost")
            && (self.host.contains(DEV_BACKEND_PORT) || self.host == "localhost")
    }

    /// Turn a stored asset path into the URL the browser should load.
    ///
    /// Absolute URLs pass through untouched. Returns `None` for a missing or
    /// empty path.
    pub fn resolve_image_url(&self, path: Option<&str>) -> Option<String> {
        let path = path.filter(|p| !p.is_empty())?;

        if path.starts_with("http://") || path.starts_with("https://") {
            return Some(path.to_string());
        }

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        if !self.production && (self.from_dev_frontend() || self.is_local_backend()) {
            return Some(path);
        }

        if self.host.is_empty() {
            return Some(path);
        }

        Some(format!("{}://{}{}", self.scheme, self.host, path))
    }

    /// Rewrite `avatar` fields in a serialized user, article or comment,
    /// including users nested under `user`, `author` and `parentComment`.
    pub fn rewrite_avatars(&self, value: &mut Value) {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.rewrite_avatars(item);
                }
            }
            Value::Object(map) => {
                if let Some(Value::String(avatar)) = map.get_mut("avatar") {
                    if let Some(url) = self.resolve_image_url(Some(avatar.as_str())) {
                        *avatar = url;
                    }
                }

                for field in NESTED_USER_FIELDS {
                    if let Some(nested) = map.get_mut(*field) {
                        if nested.is_object() {
                            self.rewrite_avatars(nested);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    use crate::test_utils::test_config;

    fn production() -> Config {
        Config {
            env: "production".to_string(),
            ..test_config()
        }
    }

    fn context(pairs: &[(&'static str, &'static str)], config: &Config) -> UrlContext {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        UrlContext::from_headers(&headers, config)
    }

    #[test]
    fn missing_or_empty_path_is_none() {
        let ctx = context(&[("host", "blog.example.com")], &production());

        assert_eq!(ctx.resolve_image_url(None), None);
        assert_eq!(ctx.resolve_image_url(Some("")), None);
    }

    #[test]
    fn absolute_urls_pass_through() {
        let ctx = context(&[("host", "blog.example.com")], &production());

        assert_eq!(
            ctx.resolve_image_url(Some("https://cdn.example.com/a.png")).as_deref(),
            Some("https://cdn.example.com/a.png")
        );
    }

    #[test]
    fn production_builds_absolute_url_from_proxy_headers() {
        let ctx = context(
            &[("host", "blog.example.com"), ("x-forwarded-proto", "https")],
            &production(),
        );

        assert_eq!(
            ctx.resolve_image_url(Some("uploads/avatars/1.png")).as_deref(),
            Some("https://blog.example.com/uploads/avatars/1.png")
        );
    }

    #[test]
    fn production_defaults_to_http() {
        let ctx = context(&[("host", "blog.example.com")], &production());

        assert_eq!(
            ctx.resolve_image_url(Some("/uploads/1.png")).as_deref(),
            Some("http://blog.example.com/uploads/1.png")
        );
    }

    #[test]
    fn production_ignores_dev_origin() {
        let ctx = context(
            &[("host", "localhost:3000"), ("origin", "http://localhost:5173")],
            &production(),
        );

        assert_eq!(
            ctx.resolve_image_url(Some("/uploads/1.png")).as_deref(),
            Some("http://localhost:3000/uploads/1.png")
        );
    }

    #[test]
    fn development_dev_server_origin_gets_relative_path() {
        let ctx = context(
            &[("host", "192.168.1.5:3000"), ("origin", "http://192.168.1.5:5173")],
            &test_config(),
        );

        assert_eq!(
            ctx.resolve_image_url(Some("/uploads/1.png")).as_deref(),
            Some("/uploads/1.png")
        );
    }

    #[test]
    fn development_referer_is_used_without_origin() {
        let ctx = context(
            &[
                ("host", "192.168.1.5:3000"),
                ("referer", "http://192.168.1.5:8080/articles/42"),
            ],
            &test_config(),
        );

        assert_eq!(
            ctx.resolve_image_url(Some("/uploads/1.png")).as_deref(),
            Some("/uploads/1.png")
        );
    }

    #[test]
    fn development_localhost_backend_gets_relative_path() {
        let ctx = context(&[("host", "localhost:3000")], &test_config());

        assert_eq!(
            ctx.resolve_image_url(Some("/uploads/1.png")).as_deref(),
            Some("/uploads/1.png")
        );
    }

    #[test]
    fn development_other_host_gets_absolute_url() {
        let ctx = context(
            &[("host", "staging.example.com"), ("origin", "https://staging.example.com")],
            &test_config(),
        );

        assert_eq!(
            ctx.resolve_image_url(Some("/uploads/1.png")).as_deref(),
            Some("http://staging.example.com/uploads/1.png")
        );
    }

    #[test]
    fn missing_host_falls_back_to_relative_path() {
        let ctx = context(&[], &production());

        assert_eq!(
            ctx.resolve_image_url(Some("/uploads/1.png")).as_deref(),
            Some("/uploads/1.png")
        );
    }

    #[test]
    fn rewrites_nested_avatars() {
        let ctx = context(&[("host", "blog.example.com")], &production());

        let mut comments = json!([
            {
                "content": "Nice post",
                "user": { "username": "alice", "avatar": "/uploads/avatars/a.png" },
                "parentComment": {
                    "user": { "username": "bob", "avatar": "https://cdn.example.com/b.png" }
                }
            },
            {
                "content": "Thanks",
                "user": { "username": "carol", "avatar": "" },
                "article": { "author": { "avatar": "/uploads/avatars/untouched.png" } }
            }
        ]);

        ctx.rewrite_avatars(&mut comments);

        assert_eq!(
            comments[0]["user"]["avatar"],
            "http://blog.example.com/uploads/avatars/a.png"
        );
        assert_eq!(
            comments[0]["parentComment"]["user"]["avatar"],
            "https://cdn.example.com/b.png"
        );
        assert_eq!(comments[1]["user"]["avatar"], "");
        // Only user, author and parentComment are followed.
        assert_eq!(
            comments[1]["article"]["author"]["avatar"],
            "/uploads/avatars/untouched.png"
        );
    }

    #[test]
    fn rewrites_article_author() {
        let ctx = context(&[("host", "blog.example.com")], &production());

        let mut article = json!({
            "title": "Hello",
            "author": { "username": "alice", "avatar": "uploads/avatars/a.png" }
        });

        ctx.rewrite_avatars(&mut article);

        assert_eq!(
            article["author"]["avatar"],
            "http://blog.example.com/uploads/avatars/a.png"
        );
    }
}
