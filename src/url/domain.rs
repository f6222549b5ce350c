use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use vetting_crawler::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.test:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.test".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true when `candidate` is on the same site as `seed`
///
/// Hosts are compared exactly (case-insensitive): `blog.example.test` is a different
/// domain from `example.test`. An explicit port is part of the site, so
/// `example.test:8443` is not `example.test`; a scheme's default port is not written
/// out by the parser, so `https://example.test:443/` still matches. The scheme itself
/// is not compared, and each scheme keeps its own robots.txt entry.
pub fn same_domain(seed: &Url, candidate: &Url) -> bool {
    match (extract_domain(seed), extract_domain(candidate)) {
        (Some(a), Some(b)) => a == b && seed.port() == candidate.port(),
        _ => false,
    }
}

/// Key under which per-site policy (robots.txt) is cached: `scheme://host[:port]`
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_subdomain() {
        let url = parse("https://blog.example.test/post");
        assert_eq!(extract_domain(&url), Some("blog.example.test".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = parse("https://Example.TEST/");
        assert_eq!(extract_domain(&url), Some("example.test".to_string()));
    }

    #[test]
    fn test_same_domain() {
        let seed = parse("https://example.test/");
        assert!(same_domain(&seed, &parse("https://example.test/about")));
        assert!(same_domain(&seed, &parse("http://EXAMPLE.test/x")));
        assert!(same_domain(&seed, &parse("https://example.test:443/x")));
        assert!(!same_domain(&seed, &parse("https://other.test/")));
        assert!(!same_domain(&seed, &parse("https://sub.example.test/")));
    }

    #[test]
    fn test_explicit_port_is_a_different_site() {
        let seed = parse("https://example.test/");
        assert!(!same_domain(&seed, &parse("https://example.test:8443/x")));
        assert!(!same_domain(&seed, &parse("http://example.test:8080/")));

        let local = parse("http://127.0.0.1:4321/");
        assert!(same_domain(&local, &parse("http://127.0.0.1:4321/a")));
        assert!(!same_domain(&local, &parse("http://127.0.0.1:4322/a")));
    }

    #[test]
    fn test_origin_key_includes_port() {
        assert_eq!(
            origin_key(&parse("http://127.0.0.1:4321/a/b")),
            "http://127.0.0.1:4321"
        );
        assert_eq!(origin_key(&parse("https://example.test/x")), "https://example.test");
    }
}
