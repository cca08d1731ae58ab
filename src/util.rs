//! String helpers shared by the detector modules.

const COLOR_MARKER: char = '\u{00A7}';

/// Remove in-game color codes (a section sign followed by one code char).
pub fn strip_colors(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == COLOR_MARKER {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Capitalize each word, treating underscores as spaces.
pub fn format_words(input: &str) -> String {
    input
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive either a lookup identifier (`as_id`) or a display name from a raw
/// host name. Deterministic: identical input always yields identical output.
pub fn format_identifier(original: &str, as_id: bool, raw: bool) -> String {
    let stripped = strip_colors(original);
    let trimmed = stripped.trim();

    if as_id {
        trimmed
            .to_lowercase()
            .replace(' ', "_")
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
            .collect()
    } else if raw {
        trimmed.to_string()
    } else {
        format_words(trimmed)
    }
}

/// Normalize a string into the shape remote asset keys use.
pub fn format_as_icon(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Drop the port from a `host:port` address. IPv6 literals are left alone.
pub fn short_address(address: &str) -> String {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            host.to_string()
        }
        _ => address.to_string(),
    }
}

/// Return `value` unless it is empty, in which case return `fallback`.
pub fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// Convert world ticks into a 24-hour clock string. Tick 0 is 06:00.
pub fn world_time_24(ticks: u64) -> String {
    let hours = (ticks / 1000 + 6) % 24;
    let minutes = (ticks % 1000) * 60 / 1000;
    format!("{:02}:{:02}", hours, minutes)
}

/// Convert world ticks into a 12-hour clock string.
pub fn world_time_12(ticks: u64) -> String {
    let hours = (ticks / 1000 + 6) % 24;
    let minutes = (ticks % 1000) * 60 / 1000;
    let suffix = if hours < 12 { "AM" } else { "PM" };
    let display = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{:02}:{:02} {}", display, minutes, suffix)
}

/// Number of full days elapsed for the given world ticks.
pub fn world_day(ticks: u64) -> String {
    (ticks / 24_000).to_string()
}

/// Loose UUID check (8-4-4-4-12 hex groups).
pub fn is_uuid(input: &str) -> bool {
    let groups: Vec<&str> = input.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_codes() {
        assert_eq!(strip_colors("\u{00A7}aGreen \u{00A7}lBold"), "Green Bold");
        assert_eq!(strip_colors("plain"), "plain");
    }

    #[test]
    fn identifiers_are_deterministic() {
        let a = format_identifier("Deep Ocean", true, false);
        let b = format_identifier("Deep Ocean", true, false);
        assert_eq!(a, "deep_ocean");
        assert_eq!(a, b);
    }

    #[test]
    fn display_names_format_words() {
        assert_eq!(format_identifier("the_nether", false, false), "The Nether");
        assert_eq!(format_identifier("the_nether", false, true), "the_nether");
    }

    #[test]
    fn icon_keys_are_normalized() {
        assert_eq!(format_as_icon("Mega Taiga!"), "mega_taiga");
    }

    #[test]
    fn short_address_drops_port() {
        assert_eq!(short_address("play.example.net:25565"), "play.example.net");
        assert_eq!(short_address("play.example.net"), "play.example.net");
        assert_eq!(short_address("::1"), "::1");
    }

    #[test]
    fn world_clock_conversion() {
        assert_eq!(world_time_24(0), "06:00");
        assert_eq!(world_time_24(18_000), "00:00");
        assert_eq!(world_time_24(6_500), "12:30");
        assert_eq!(world_time_12(6_500), "12:30 PM");
        assert_eq!(world_time_12(18_000), "12:00 AM");
        assert_eq!(world_day(48_001), "2");
    }

    #[test]
    fn uuid_detection() {
        assert!(is_uuid("069a79f4-44e9-4726-a5be-fca90e38aaf5"));
        assert!(!is_uuid("zombie"));
    }
}
