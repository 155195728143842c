use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe formatting tags (<b>, <p>, lists, links) survive,
/// scripts, iframes and event-handler attributes are stripped.
/// Applied to article lesson bodies before they are stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
