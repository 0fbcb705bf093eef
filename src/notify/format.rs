//! Record → chat message rendering.
use crate::config::FeedSpec;
use crate::feed::Record;
use crate::util::{escape_markdown, strip_control_chars, truncate_chars};

/// Discord rejects message content longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Renders the announcement for one new record.
///
/// Uses the feed's `template` when set, otherwise the default layout:
///
/// ```text
/// **[items] Sword**
/// **rarity:** rare
/// id: 42
/// ```
pub fn render(feed: &FeedSpec, record: &Record) -> String {
    let text = match feed.template.as_deref() {
        Some(template) => render_template(template, feed, record),
        None => render_default(feed, record),
    };
    finish(&text)
}

/// Summary sent instead of the records past the per-cycle cap.
pub fn overflow(feed: &FeedSpec, remaining: usize) -> String {
    let noun = if remaining == 1 { "record" } else { "records" };
    finish(&format!(
        "**[{}]** ...and {} more new {}",
        escape_markdown(&feed.name),
        remaining,
        noun
    ))
}

fn render_default(feed: &FeedSpec, record: &Record) -> String {
    let mut out = format!(
        "**[{}] {}**",
        escape_markdown(&feed.name),
        escape_markdown(&record.title)
    );
    for (name, value) in &record.fields {
        out.push_str(&format!(
            "\n**{}:** {}",
            escape_markdown(name),
            escape_markdown(value)
        ));
    }
    out.push_str(&format!("\nid: {}", escape_markdown(&record.id)));
    out
}

/// Substitutes `{id}`, `{title}`, `{feed}` and `{<field>}`. Unknown or absent
/// placeholders are left as written; absent configured fields render empty.
fn render_template(template: &str, feed: &FeedSpec, record: &Record) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let key = &after[..close];
        match lookup(key, feed, record) {
            Some(value) => out.push_str(value),
            None => {
                out.push('{');
                out.push_str(key);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

fn lookup<'a>(key: &str, feed: &'a FeedSpec, record: &'a Record) -> Option<&'a str> {
    match key {
        "id" => Some(record.id.as_str()),
        "title" => Some(record.title.as_str()),
        "feed" => Some(feed.name.as_str()),
        field if feed.text_fields.iter().any(|f| f == field) => {
            Some(record.field(field).unwrap_or(""))
        }
        _ => None,
    }
}

fn finish(text: &str) -> String {
    let clean = strip_control_chars(text);
    truncate_chars(&clean, MAX_MESSAGE_CHARS).into_owned()
}
