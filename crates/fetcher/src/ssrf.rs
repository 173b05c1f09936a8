//! Request forgery defence.
//!
//! Every URL the fetcher touches, including each redirect target, passes
//! [`validate_url`] (syntax, scheme, literal addresses, forbidden host names)
//! and then, for named hosts, has every resolved address checked with
//! [`blocked_reason`].

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use reqwest::Url;

use crate::FetchError;

/// Azure's instance metadata (WireServer) endpoint, outside every private range.
const AZURE_WIRESERVER: Ipv4Addr = Ipv4Addr::new(168, 63, 129, 16);

/// Host names that always point at the local machine or a metadata service.
const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "metadata",
    "metadata.google.internal",
    "metadata.goog",
    "instance-data",
    "instance-data.ec2.internal",
];

/// A validated URL plus how its host still has to be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    /// The parsed URL.
    pub url: Url,
    /// Host name that still needs resolving, or `None` for a literal address.
    pub pending_host: Option<String>,
}

/// Checks everything about `raw` that can be checked without the network.
///
/// Rejects unparseable input, schemes other than `http`/`https`, embedded
/// credentials, forbidden host names, and literal addresses in any blocked
/// range. Alternate IPv4 spellings (`2130706433`, `0x7f.1`) are normalised
/// by the URL parser before the range check.
pub fn validate_url(raw: &str) -> Result<ValidatedUrl, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;

    let blocked = |reason: String| FetchError::Blocked {
        url: raw.to_string(),
        reason,
    };

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(blocked(format!("scheme '{other}' is not allowed"))),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(blocked("credentials in URLs are not allowed".into()));
    }

    let pending_host = match literal_host(&url) {
        None => return Err(blocked("URL has no host".into())),
        Some(HostLiteral::Ip(ip)) => {
            if let Some(reason) = blocked_reason(ip) {
                return Err(blocked(format!("{ip} is a {reason}")));
            }
            None
        }
        Some(HostLiteral::Domain(domain)) => {
            let name = domain.trim_end_matches('.').to_ascii_lowercase();
            if is_blocked_hostname(&name) {
                return Err(blocked(format!("host '{name}' is not allowed")));
            }
            Some(name)
        }
    };

    Ok(ValidatedUrl { url, pending_host })
}

enum HostLiteral<'a> {
    Ip(IpAddr),
    Domain(&'a str),
}

/// The parser already canonicalises IPv4 spellings and brackets IPv6 hosts.
fn literal_host(url: &Url) -> Option<HostLiteral<'_>> {
    let raw = url.host_str()?;
    let unbracketed = raw
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(raw);
    Some(match unbracketed.parse::<IpAddr>() {
        Ok(ip) => HostLiteral::Ip(ip),
        Err(_) => HostLiteral::Domain(raw),
    })
}

/// `true` for host names that must never be contacted.
pub fn is_blocked_hostname(name: &str) -> bool {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    name.ends_with(".localhost") || BLOCKED_HOSTNAMES.contains(&name.as_str())
}

/// Names the blocked range `ip` falls in, or `None` if it is public.
pub fn blocked_reason(ip: IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => blocked_v4_reason(v4),
        IpAddr::V6(v6) => blocked_v6_reason(v6),
    }
}

fn blocked_v4_reason(ip: Ipv4Addr) -> Option<&'static str> {
    let [a, b, c, _] = ip.octets();
    if ip == AZURE_WIRESERVER {
        return Some("cloud metadata address");
    }
    if a == 0 {
        return Some("unspecified address");
    }
    if ip.is_loopback() {
        return Some("loopback address");
    }
    if ip.is_private() {
        return Some("private address");
    }
    if ip.is_link_local() {
        return Some("link-local address");
    }
    if a == 100 && (b & 0xC0) == 64 {
        return Some("shared address space address");
    }
    if a == 192 && b == 0 && c == 0 {
        return Some("protocol assignment address");
    }
    if a == 198 && (b & 0xFE) == 18 {
        return Some("benchmarking address");
    }
    if ip.is_multicast() {
        return Some("multicast address");
    }
    if a >= 240 {
        return Some("reserved address");
    }
    None
}

fn blocked_v6_reason(ip: Ipv6Addr) -> Option<&'static str> {
    if ip.is_unspecified() {
        return Some("unspecified address");
    }
    if ip.is_loopback() {
        return Some("loopback address");
    }
    if let Some(v4) = embedded_v4(ip) {
        return blocked_v4_reason(v4);
    }
    let [first, second, ..] = ip.segments();
    // Tunnels hand the packet to whatever v4 host the address encodes.
    if first == 0x2002 {
        return Some("6to4 tunnel address");
    }
    if first == 0x2001 && second == 0 {
        return Some("Teredo tunnel address");
    }
    if (first & 0xFE00) == 0xFC00 {
        return Some("unique local address");
    }
    if (first & 0xFFC0) == 0xFE80 {
        return Some("link-local address");
    }
    if (first & 0xFFC0) == 0xFEC0 {
        return Some("site-local address");
    }
    if ip.is_multicast() {
        return Some("multicast address");
    }
    None
}

/// IPv4 address carried by mapped (`::ffff:a.b.c.d`), compatible
/// (`::a.b.c.d`), or NAT64 (`64:ff9b::a.b.c.d`) forms.
fn embedded_v4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return Some(mapped);
    }
    let s = ip.segments();
    let tail = Ipv4Addr::new(
        (s[6] >> 8) as u8,
        s[6] as u8,
        (s[7] >> 8) as u8,
        s[7] as u8,
    );
    let compatible = s[..6].iter().all(|&seg| seg == 0);
    let nat64 = s[0] == 0x0064 && s[1] == 0xFF9B && s[2..6].iter().all(|&seg| seg == 0);
    (compatible || nat64).then_some(tail)
}
