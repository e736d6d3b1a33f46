//! Cookie lookup and CSRF token attachment.

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_FORM_FIELD: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Value of cookie `name` in a `Cookie:`-style string, empty when absent.
pub fn get_cookie(cookies: &str, name: &str) -> String {
    let prefix = format!("{name}=");
    cookies
        .split(';')
        .map(|part| part.trim_start_matches(' '))
        .find_map(|part| part.strip_prefix(&prefix))
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_cookie_among_others() {
        let cookies = "session=abc; csrf_token=t0k3n;  other=1";
        assert_eq!(get_cookie(cookies, "csrf_token"), "t0k3n");
        assert_eq!(get_cookie(cookies, "other"), "1");
    }

    #[test]
    fn missing_cookie_is_empty() {
        assert_eq!(get_cookie("session=abc", "csrf_token"), "");
        assert_eq!(get_cookie("", "csrf_token"), "");
    }

    #[test]
    fn does_not_match_cookie_name_suffix() {
        assert_eq!(get_cookie("xcsrf_token=1; csrf_token=2", "csrf_token"), "2");
    }
}
