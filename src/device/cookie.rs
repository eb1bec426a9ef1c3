use crate::device::types::SessionToken;

/// Pull the session value out of a `Set-Cookie` header.
///
/// Attributes start at the first `;` and are ignored. In the `name=value`
/// pair before them, the name runs to the first `=`. A pair without `=`
/// yields an empty token, even when an attribute contains one.
pub fn parse_set_cookie(header: &str) -> SessionToken {
    let pair = header
        .split_once(';')
        .map_or(header, |(pair, _attributes)| pair);
    match pair.split_once('=') {
        Some((_name, value)) => SessionToken::new(value),
        None => SessionToken::default(),
    }
}
