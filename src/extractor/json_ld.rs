//! JSON-LD structured data extraction

use scraper::Html;
use serde_json::Value;

use super::select_all;

/// Extracts every `<script type="application/ld+json">` payload that is valid JSON
///
/// Each block yields one value (an object, or an array when the block holds one).
/// Malformed blocks are dropped without error.
pub fn extract_json_ld(html: &str) -> Vec<Value> {
    let document = Html::parse_document(html);

    select_all(&document, "script[type]")
        .into_iter()
        .filter(|script| {
            script
                .value()
                .attr("type")
                .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
                .unwrap_or(false)
        })
        .filter_map(|script| {
            let raw: String = script.text().collect();
            match serde_json::from_str::<Value>(raw.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::trace!("Dropping malformed JSON-LD block: {}", e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_valid_blocks() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@context":"https://schema.org","@type":"Organization","name":"Acme"}</script>
            <script type="application/ld+json">[{"@type":"WebSite"}]</script>
            </head></html>"#;
        let blocks = extract_json_ld(html);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["name"], json!("Acme"));
        assert!(blocks[1].is_array());
    }

    #[test]
    fn test_malformed_blocks_are_dropped() {
        let html = r#"
            <script type="application/ld+json">{"@type": "Product", </script>
            <script type="application/ld+json">{"@type": "Article"}</script>"#;
        let blocks = extract_json_ld(html);
        assert_eq!(blocks, vec![json!({"@type": "Article"})]);
    }

    #[test]
    fn test_type_attribute_is_case_insensitive() {
        let html = r#"<script type=" Application/LD+JSON ">{"@type":"Thing"}</script>"#;
        assert_eq!(extract_json_ld(html).len(), 1);
    }

    #[test]
    fn test_other_scripts_are_ignored() {
        let html = r#"<script>var x = {"a": 1};</script><script type="text/javascript">{}</script>"#;
        assert!(extract_json_ld(html).is_empty());
    }
}
