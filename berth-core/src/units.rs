//! Human-readable size parsing.
//!
//! Sizes use binary multiples: `64m` is 64 MiB. Accepted forms are a decimal
//! number optionally followed by one of `b k m g t p` (case-insensitive),
//! optionally followed by `b` or `ib` (`"1.5GB"`, `"512 MiB"`, `"1024"`).

/// Parse a human size expression into bytes.
pub fn ram_in_bytes(s: &str) -> Result<i64, String> {
    let trimmed = s.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);

    if number.is_empty() {
        return Err(format!("invalid size: '{}'", s));
    }
    let value: f64 = number.parse().map_err(|_| format!("invalid size: '{}'", s))?;

    let suffix = suffix.trim_start().to_ascii_lowercase();
    if suffix == "ib" {
        return Err(format!("invalid size: '{}'", s));
    }
    let unit = suffix.strip_suffix("ib").or_else(|| suffix.strip_suffix('b')).unwrap_or(&suffix);
    let multiplier: i64 = match unit {
        "" => 1,
        "k" => 1 << 10,
        "m" => 1 << 20,
        "g" => 1 << 30,
        "t" => 1 << 40,
        "p" => 1 << 50,
        _ => return Err(format!("invalid size: '{}'", s)),
    };

    Ok((value * multiplier as f64) as i64)
}
