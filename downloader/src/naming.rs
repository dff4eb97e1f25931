const INVALID_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces characters that are invalid in file names with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if INVALID_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// File name for an image: the last `/`-separated segment of its URL, sanitized.
pub fn image_filename(url: &str) -> String {
    let last_segment = url.rsplit('/').next().unwrap_or(url);
    sanitize_filename(last_segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_each_invalid_char() {
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("plain-name_1.png"), "plain-name_1.png");
    }

    #[test]
    fn test_image_filename_uses_last_segment() {
        assert_eq!(image_filename("https://i.redd.it/abc123.jpg"), "abc123.jpg");
        assert_eq!(
            image_filename("https://i.imgur.com/gallery/x/loop.gif"),
            "loop.gif"
        );
    }

    #[test]
    fn test_image_filename_keeps_query_sanitized() {
        assert_eq!(
            image_filename("https://example.com/pic?id=1&f=cat.png"),
            "pic_id=1&f=cat.png"
        );
    }
}
