//! Miscellaneous convenience methods, mostly argument parsing

use serenity::all::{ChannelId, RoleId};
use std::time::Duration;

/// Split `content` into command keyword and the text after it, if it starts with `prefix`.
///
/// The keyword ends at the first whitespace, the rest is trimmed.
pub fn split_command<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    if prefix.is_empty() {
        return None;
    }

    let rest = content.strip_prefix(prefix)?;
    let (keyword, args) = match rest.split_once(char::is_whitespace) {
        Some((keyword, args)) => (keyword, args.trim()),
        None => (rest, ""),
    };

    (!keyword.is_empty()).then_some((keyword, args))
}

/// Split on whitespace, keeping `"quoted parts"` together.  Quotes are removed.
pub fn split_args(s: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_arg = false;

    for c in s.chars() {
        match c {
            '"' | '“' | '”' => {
                quoted = !quoted;
                in_arg = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }

    args
}

fn parse_snowflake(s: &str) -> Option<u64> {
    s.parse::<u64>().ok().filter(|&id| id != 0)
}

fn strip_mention<'a>(s: &'a str, open: &str) -> Option<&'a str> {
    s.trim().strip_prefix(open)?.strip_suffix('>')
}

/// `<#id>` or a bare id
pub fn parse_channel(s: &str) -> Option<ChannelId> {
    let id = strip_mention(s, "<#").unwrap_or(s.trim());
    parse_snowflake(id).map(ChannelId::new)
}

/// `<@&id>` or a bare id
pub fn parse_role(s: &str) -> Option<RoleId> {
    let id = strip_mention(s, "<@&").unwrap_or(s.trim());
    parse_snowflake(id).map(RoleId::new)
}

fn unit_seconds(unit: &str) -> Option<u64> {
    Some(match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 60 * 60,
        "d" | "day" | "days" => 24 * 60 * 60,
        "w" | "week" | "weeks" => 7 * 24 * 60 * 60,
        _ => return None,
    })
}

/// Parse durations like `5m`, `1h30m`, `2 hours 10 minutes` or `1 day`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut number: Option<u64> = None;
    let mut unit = String::new();
    let mut seen_any = false;

    let mut flush = |number: &mut Option<u64>, unit: &mut String| -> Option<()> {
        if unit.is_empty() {
            return Some(());
        }
        let n = number.take()?;
        total = total.checked_add(n.checked_mul(unit_seconds(&unit.to_lowercase())?)?)?;
        unit.clear();
        seen_any = true;
        Some(())
    };

    for c in s.trim().chars() {
        if c.is_ascii_digit() {
            if !unit.is_empty() {
                flush(&mut number, &mut unit)?;
            }
            let digit = u64::from(c.to_digit(10)?);
            number = Some(number.unwrap_or(0).checked_mul(10)?.checked_add(digit)?);
        } else if c.is_alphabetic() {
            unit.push(c);
        } else if c.is_whitespace() || c == ',' {
            continue;
        } else {
            return None;
        }
    }
    flush(&mut number, &mut unit)?;

    // A trailing number without unit is not a duration.
    if number.is_some() || !seen_any {
        return None;
    }
    Some(Duration::from_secs(total))
}

/// `1d 2h 3m 4s`, leaving out leading zero units
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (days, hours, minutes, seconds) = (
        secs / 86_400,
        secs % 86_400 / 3_600,
        secs % 3_600 / 60,
        secs % 60,
    );

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{}s", seconds));
    parts.join(" ")
}
