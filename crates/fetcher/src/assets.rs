//! Image references in markdown.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)
        .expect("static regex is valid")
});

static HTML_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\ssrc\s*=\s*["']([^"']+)["']"#).expect("static regex is valid")
});

/// Image URLs referenced by `![alt](url)` or `<img src="url">`, in document
/// order, each listed once.
pub fn image_references(markdown: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = MARKDOWN_IMAGE
        .captures_iter(markdown)
        .chain(HTML_IMAGE.captures_iter(markdown))
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str().trim()))
        .filter(|(_, url)| !url.is_empty())
        .collect();
    found.sort_by_key(|(start, _)| *start);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|(_, url)| seen.insert(*url))
        .map(|(_, url)| url.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_markdown_and_html_images_in_order() {
        let md = r#"
Intro ![map](https://cdn.example/map.png "World map")
<img class="hero" src='https://cdn.example/hero.webp'>
Again ![same](https://cdn.example/map.png)
[not an image](https://cdn.example/page.html)
"#;
        assert_eq!(
            image_references(md),
            vec![
                "https://cdn.example/map.png".to_string(),
                "https://cdn.example/hero.webp".to_string(),
            ]
        );
    }

    #[test]
    fn empty_document_has_no_references() {
        assert!(image_references("").is_empty());
        assert!(image_references("# Title\n\nJust text.").is_empty());
    }
}
