//! Utility functions.

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Turn HTML produced with [`html_escape`] back into plain text: tags are
/// dropped and entities decoded.
pub fn strip_html(s: &str) -> String {
    let mut text = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Full display name from Telegram's first and optional last name.
pub fn user_fullname(first_name: &str, last_name: Option<&str>) -> String {
    match last_name {
        Some(last) if !last.is_empty() => format!("{} {}", first_name, last),
        _ => first_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>a & b</b>"), "&lt;b&gt;a &amp; b&lt;/b&gt;");
    }

    #[test]
    fn test_strip_html() {
        let html = format!("<b>{}</b>\n<pre>{}</pre>", html_escape("Vec<u8>"), html_escape("a &lt; b"));
        assert_eq!(strip_html(&html), "Vec<u8>\na &lt; b");
    }

    #[test]
    fn test_user_fullname() {
        assert_eq!(user_fullname("Ann", Some("Lee")), "Ann Lee");
        assert_eq!(user_fullname("Ann", Some("")), "Ann");
        assert_eq!(user_fullname("Ann", None), "Ann");
    }
}
