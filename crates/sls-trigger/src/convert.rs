//! HTTP type conversions between hyper and the invocation layer.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use http::header::{COOKIE, HOST};
use http::{HeaderMap, Uri, Version, request};
use sls_core::RequestParts;

/// Reduce a request head plus its parsed body to [`RequestParts`].
pub fn request_parts(
    parts: &request::Parts,
    peer: SocketAddr,
    body: serde_json::Value,
) -> RequestParts {
    RequestParts {
        method: parts.method.as_str().to_string(),
        hostname: hostname(&parts.headers, &parts.uri),
        path: parts.uri.path().to_string(),
        raw_query: parts.uri.query().unwrap_or_default().to_string(),
        headers: headers_to_map(&parts.headers),
        source_ip: peer.ip().to_canonical().to_string(),
        protocol: protocol_label(parts.version).to_string(),
        body,
    }
}

/// Host header (or URI authority) without the port. Bracketed IPv6
/// literals keep their brackets.
pub fn hostname(headers: &HeaderMap, uri: &Uri) -> String {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
        .unwrap_or_default();

    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => host[..=end].to_string(),
            None => host,
        };
    }
    match host.split_once(':') {
        Some((name, _port)) => name.to_string(),
        None => host,
    }
}

/// Flatten headers into one value per name. Repeated headers join with
/// `, `, except `cookie` which joins with `; `.
pub fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for name in headers.keys() {
        let separator = if *name == COOKIE { "; " } else { ", " };
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(separator);
        map.insert(name.as_str().to_string(), joined);
    }
    map
}

pub fn protocol_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn parts(req: Request<()>) -> request::Parts {
        req.into_parts().0
    }

    #[test]
    fn request_parts_split_path_and_query() {
        let req = Request::builder()
            .method("PUT")
            .uri("/api/v1/items?limit=10&sort=desc")
            .header("host", "example.test:3000")
            .header("user-agent", "test-agent")
            .body(())
            .unwrap();
        let peer: SocketAddr = "10.0.0.7:51234".parse().unwrap();
        let request = request_parts(&parts(req), peer, serde_json::json!({}));

        assert_eq!(request.method, "PUT");
        assert_eq!(request.path, "/api/v1/items");
        assert_eq!(request.raw_query, "limit=10&sort=desc");
        assert_eq!(request.hostname, "example.test");
        assert_eq!(request.source_ip, "10.0.0.7");
        assert_eq!(request.protocol, "HTTP/1.1");
        assert_eq!(request.header("User-Agent"), Some("test-agent"));
    }

    #[test]
    fn no_query_is_empty_string() {
        let req = Request::builder().uri("/").body(()).unwrap();
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let request = request_parts(&parts(req), peer, serde_json::json!({}));
        assert_eq!(request.raw_query, "");
    }

    #[test]
    fn mapped_ipv4_peer_is_canonical() {
        let req = Request::builder().uri("/").body(()).unwrap();
        let peer: SocketAddr = "[::ffff:127.0.0.1]:4000".parse().unwrap();
        let request = request_parts(&parts(req), peer, serde_json::json!({}));
        assert_eq!(request.source_ip, "127.0.0.1");
    }

    #[test]
    fn hostname_variants() {
        let uri: Uri = "/".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "localhost".parse().unwrap());
        assert_eq!(hostname(&headers, &uri), "localhost");

        headers.insert(HOST, "[::1]:3000".parse().unwrap());
        assert_eq!(hostname(&headers, &uri), "[::1]");

        let absolute: Uri = "http://proxy.test:8080/x".parse().unwrap();
        assert_eq!(hostname(&HeaderMap::new(), &absolute), "proxy.test");
        assert_eq!(hostname(&HeaderMap::new(), &uri), "");
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("accept", "text/html".parse().unwrap());
        headers.append("accept", "application/json".parse().unwrap());
        headers.append("cookie", "a=1".parse().unwrap());
        headers.append("cookie", "b=2".parse().unwrap());

        let map = headers_to_map(&headers);
        assert_eq!(map["accept"], "text/html, application/json");
        assert_eq!(map["cookie"], "a=1; b=2");
    }
}
