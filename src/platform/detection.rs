//! Remote URL parsing

use crate::error::{Error, Result};
use crate::types::PlatformConfig;
use url::Url;

const GITHUB_HOST: &str = "github.com";

/// Check whether a host is GitHub (or the configured GitHub Enterprise host)
fn is_github_host(host: &str, enterprise_host: Option<&str>) -> bool {
    host == GITHUB_HOST
        || host.ends_with(".github.com")
        || enterprise_host.is_some_and(|h| h.eq_ignore_ascii_case(host))
}

/// Parse a remote URL into repository coordinates
///
/// Accepts scp-style (`git@host:owner/repo.git`), `https://` and `ssh://`
/// URLs. GitHub Enterprise hosts are recognized through `GH_HOST`.
pub fn parse_repo_info(url: &str) -> Result<PlatformConfig> {
    let enterprise = std::env::var("GH_HOST").ok();
    parse_repo_info_with_host(url, enterprise.as_deref())
}

fn parse_repo_info_with_host(url: &str, enterprise_host: Option<&str>) -> Result<PlatformConfig> {
    let (host, path) = split_remote_url(url).ok_or(Error::NoSupportedRemotes)?;

    if !is_github_host(&host, enterprise_host) {
        return Err(Error::NoSupportedRemotes);
    }

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.split('/').filter(|p| !p.is_empty());

    let (Some(owner), Some(repo), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::NoSupportedRemotes);
    };

    Ok(PlatformConfig {
        owner: owner.to_string(),
        repo: repo.to_string(),
        host: (host != GITHUB_HOST).then_some(host),
    })
}

/// Split a remote URL into (host, path)
fn split_remote_url(url: &str) -> Option<(String, String)> {
    let url = url.trim();

    if url.contains("://") {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_string();
        return Some((host, parsed.path().to_string()));
    }

    // scp-style: [user@]host:path
    let (left, path) = url.split_once(':')?;
    let host = left.rsplit_once('@').map_or(left, |(_, h)| h);
    if host.is_empty() || path.is_empty() {
        return None;
    }
    Some((host.to_string(), path.to_string()))
}
