//! Template helpers, registered on the tera instance by `register`.
//!
//! Filters: `format_date`, `truncate_text`, `strip_tags`.
//! Functions: `edit_icon`, `select_options`. Both return markup, so templates
//! pipe them through `safe`.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use tera::{escape_html, Tera, Value};

/// `format_date` default: "January 5th 2024, 3:04:05 pm". `%o` is the ordinal day.
pub const DEFAULT_DATE_FORMAT: &str = "%B %o %Y, %-I:%M:%S %P";

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<.*?>").expect("tag pattern is valid"));

pub fn register(tera: &mut Tera) {
    tera.register_filter("format_date", format_date_filter);
    tera.register_filter("truncate_text", truncate_text_filter);
    tera.register_filter("strip_tags", strip_tags_filter);
    tera.register_function("edit_icon", edit_icon_function);
    tera.register_function("select_options", select_options_function);
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", day, suffix)
}

/// Formats `date` with a strftime pattern, plus `%o` for the ordinal day of month.
pub fn format_date(date: DateTime<Utc>, format: &str) -> Option<String> {
    let pattern = format.replace("%o", &ordinal(date.day()));
    let mut out = String::new();
    write!(out, "{}", date.format(&pattern)).ok()?;
    Some(out)
}

/// Shortens `text` to at most `len` characters, backing up to the last space,
/// and appends "...". Text that already fits is returned unchanged.
pub fn truncate_text(text: &str, len: usize) -> String {
    if text.chars().count() <= len {
        return text.to_string();
    }
    let cut: String = text.chars().take(len).collect();
    let shortened = match cut.rfind(' ') {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", shortened)
}

pub fn strip_tags(input: &str) -> String {
    TAG.replace_all(input, "").into_owned()
}

/// Edit link for the story's owner, nothing for anyone else.
pub fn edit_icon(story_user: &str, viewer_id: Option<&str>, story_id: &str, floating: bool) -> String {
    if viewer_id != Some(story_user) {
        return String::new();
    }
    let href = format!("/stories/edit/{}", escape_html(story_id));
    if floating {
        format!(
            r#"<a href="{}" class="btn-floating halfway-fab blue"><i class="fas fa-edit fa-small"></i></a>"#,
            href
        )
    } else {
        format!(r#"<a href="{}"><i class="fas fa-edit"></i></a>"#, href)
    }
}

/// `<option>` list with `selected` pre-selected.
pub fn select_options(selected: &str, options: &[String]) -> String {
    options
        .iter()
        .map(|option| {
            let mut label = option.clone();
            if let Some(first) = label.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            let marker = if option == selected { r#" selected="selected""# } else { "" };
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                escape_html(option),
                marker,
                escape_html(&label)
            )
        })
        .collect()
}

fn string_arg<'a>(args: &'a HashMap<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

fn format_date_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("format_date expects an RFC 3339 date string"))?;
    let date = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| tera::Error::msg(format!("format_date: {}", e)))?
        .with_timezone(&Utc);
    let format = string_arg(args, "format").unwrap_or(DEFAULT_DATE_FORMAT);
    format_date(date, format)
        .map(Value::from)
        .ok_or_else(|| tera::Error::msg(format!("format_date: bad format '{}'", format)))
}

fn truncate_text_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value.as_str().unwrap_or_default();
    let len = args.get("len").and_then(Value::as_u64).unwrap_or(150);
    Ok(Value::from(truncate_text(text, len as usize)))
}

fn strip_tags_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::from(strip_tags(value.as_str().unwrap_or_default())))
}

fn edit_icon_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let story_user = string_arg(args, "story_user")
        .ok_or_else(|| tera::Error::msg("edit_icon: missing story_user"))?;
    let story_id =
        string_arg(args, "story_id").ok_or_else(|| tera::Error::msg("edit_icon: missing story_id"))?;
    let floating = args.get("floating").and_then(Value::as_bool).unwrap_or(true);
    Ok(Value::from(edit_icon(
        story_user,
        string_arg(args, "user_id"),
        story_id,
        floating,
    )))
}

fn select_options_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let selected = string_arg(args, "selected").unwrap_or_default();
    let options: Vec<String> = args
        .get("options")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .ok_or_else(|| tera::Error::msg("select_options: options must be a list of strings"))?;
    Ok(Value::from(select_options(selected, &options)))
}
