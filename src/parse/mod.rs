//! Pure parsers over raw platform-tool output.
//!
//! No I/O and no platform dispatch happens here: each function is total over
//! its input text. Malformed lines are skipped, never errors; header-only or
//! empty input parses to an empty collection.

pub(crate) mod darwin;
pub(crate) mod linux;
pub(crate) mod ps;
pub(crate) mod windows;

/// Extract the port from a local-address token.
///
/// Handles every form the platform tools emit:
/// - wildcard: `*:3000`
/// - IPv4: `127.0.0.1:3000`, `0.0.0.0:80`
/// - bracketed IPv6: `[::1]:3000`, `[::ffff:127.0.0.1]:63342`
/// - bare IPv6 (Linux netstat): `:::80`
pub(crate) fn parse_port(address: &str) -> Option<u16> {
    if address.starts_with('[') {
        // IPv6 format: [::1]:3000
        let bracket_end = address.find(']')?;
        let after_bracket = address.get(bracket_end + 1..)?;
        let port_str = after_bracket.strip_prefix(':')?;
        port_str.parse().ok()
    } else {
        // Everything else keeps the port after the last colon.
        let last_colon = address.rfind(':')?;
        address[last_colon + 1..].parse().ok()
    }
}

/// Index of the first purely-numeric whitespace-delimited token.
///
/// Socket-listing output may carry a command with embedded whitespace before
/// the PID column; everything before this index belongs to the command.
pub(crate) fn first_numeric_token(tokens: &[&str]) -> Option<usize> {
    tokens
        .iter()
        .position(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
}
