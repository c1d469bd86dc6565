use url::{form_urlencoded, Url};

const TARGET_PARAM: &str = "q";

/// Real destination of a redirect link, taken from its `q` parameter.
///
/// Relative hrefs (`/redirect?...`) are accepted. Anything without the
/// parameter yields an empty string. The value is percent-decoded exactly
/// once, so a target that itself carries `%25` escapes keeps them.
pub fn unwrap_redirect(href: &str) -> String {
    let query = match Url::parse(href) {
        Ok(url) => url.query().map(str::to_owned),
        Err(_) => href
            .split_once('?')
            .map(|(_, rest)| rest.split('#').next().unwrap_or("").to_owned()),
    };

    query
        .and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == TARGET_PARAM)
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default()
}
