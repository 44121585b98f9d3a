//! Conversion between dnsmasq config text and DNS records
//!
//! The only meaningful line shape is
//!
//! ```text
//! address=/<hostname>/<ip>
//! ```
//!
//! Parsing is permissive: anything that does not have exactly
//! that shape is skipped, never reported. Rendering always emits [`HEADER`]
//! followed by one such line per record.

use std::collections::BTreeMap;

use crate::traits::DnsRecord;

/// First line of every generated config file
pub const HEADER: &str = "# Managed by DNSMasq API\n";

const ADDRESS_PREFIX: &str = "address=/";

/// Parse config text into hostname → IPs
///
/// IPs keep file order per hostname and are trimmed of surrounding
/// whitespace. Duplicates are kept; deduplication happens when the records
/// are stored.
pub fn parse(text: &str) -> BTreeMap<String, Vec<String>> {
    let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for line in text.lines() {
        if let Some((hostname, ip)) = parse_line(line) {
            entries
                .entry(hostname.to_string())
                .or_default()
                .push(ip.to_string());
        }
    }

    entries
}

/// Split one `address=/<hostname>/<ip>` line
fn parse_line(line: &str) -> Option<(&str, &str)> {
    if !line.starts_with(ADDRESS_PREFIX) {
        return None;
    }

    let mut fields = line.split('/');
    let (_prefix, hostname, ip) = (fields.next()?, fields.next()?, fields.next()?);
    if fields.next().is_some() {
        return None;
    }

    // An empty IP is kept: `address=/<hostname>/` answers locally
    if hostname.is_empty() {
        return None;
    }

    Some((hostname, ip.trim()))
}

/// Render records as config text, in the order given
pub fn render(records: &[DnsRecord]) -> String {
    let mut out = String::with_capacity(HEADER.len() + records.len() * 32);
    out.push_str(HEADER);

    for record in records {
        out.push_str(ADDRESS_PREFIX);
        out.push_str(&record.hostname);
        out.push('/');
        out.push_str(&record.ip);
        out.push('\n');
    }

    out
}
