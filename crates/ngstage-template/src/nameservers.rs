//! Resolver configuration reader for `{{nameservers}}`.

use std::net::IpAddr;
use std::path::Path;

/// Reads the nameservers listed in a resolver configuration file.
///
/// Falls back to `[default]` when the file cannot be read or lists no
/// nameserver. Problems with the file are never fatal.
#[must_use]
pub fn read_nameservers(path: &Path, default: &str) -> Vec<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::info!(
                path = %path.display(),
                default,
                error = %e,
                "could not open resolver configuration, using default nameserver"
            );
            return vec![default.to_string()];
        }
    };

    let nameservers = parse_nameservers(&content);
    if nameservers.is_empty() {
        tracing::info!(path = %path.display(), default, "no nameservers found, using default");
        return vec![default.to_string()];
    }
    nameservers
}

/// Extracts `nameserver <ip>` entries in file order.
///
/// Lines starting with `#` or `;` are comments. Entries are not deduplicated.
#[must_use]
pub fn parse_nameservers(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(['#', ';']))
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            let address = match (words.next(), words.next()) {
                (Some("nameserver"), Some(address)) if is_ip(address) => address,
                _ => {
                    tracing::debug!(line, "ignoring resolver configuration line");
                    return None;
                }
            };
            Some(address.to_string())
        })
        .collect()
}

fn is_ip(address: &str) -> bool {
    let bare = address.split_once('%').map_or(address, |(ip, _)| ip);
    bare.parse::<IpAddr>().is_ok()
}
