use chrono::{DateTime, Utc};

use crate::quote::{Price, Quote};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// `[2025-01-01 12:00:00 UTC] LTCUSD: 91.234  (1.23%, 1.1, vol 500000)`
pub fn console_line(now: DateTime<Utc>, quote: &Quote) -> String {
    let mut extra: Vec<String> = Vec::with_capacity(3);
    if let Some(change) = quote.change {
        extra.push(format!("{change:.2}%"));
    }
    if let Some(change_abs) = &quote.change_abs {
        extra.push(change_abs.to_string());
    }
    if let Some(volume) = quote.volume {
        extra.push(format!("vol {}", volume.trunc() as i64));
    }

    format!(
        "[{}] {}: {}  ({})",
        now.format(TIMESTAMP_FORMAT),
        quote.name,
        display_price(&quote.close),
        extra.join(", ")
    )
}

fn display_price(price: &Price) -> String {
    match price {
        Price::Number(n) => n.to_string(),
        Price::Text(s) => s.clone(),
        Price::Missing => "None".to_string(),
    }
}

/// Sentence handed to the speech engine.
pub fn phrase(quote: &Quote) -> String {
    let price = match &quote.close {
        Price::Number(n) => n.as_f64().map(grouped_2dp).unwrap_or_else(|| n.to_string()),
        other => display_price(other),
    };

    match quote.change {
        Some(change) => format!("{} price {price}. Change {change:.2} percent.", quote.name),
        None => format!("{} price {price}.", quote.name),
    }
}

/// Two decimals with comma thousands separators, e.g. `64,250.50`.
pub fn grouped_2dp(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    // Negative values keep their sign even when they round to zero.
    let sign = if value.is_sign_negative() { "-" } else { "" };

    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::Fields;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn ltc() -> Quote {
        let fields = Fields::from([
            ("name", json!("LTCUSD")),
            ("close", json!(91.234)),
            ("change", json!(1.23)),
            ("change_abs", json!(1.1)),
            ("volume", json!(500000)),
        ]);
        Quote::from_fields("BINANCE:LTCUSDT", &fields)
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 5).unwrap()
    }

    #[test]
    fn console_line_for_full_quote() {
        assert_eq!(
            console_line(noon(), &ltc()),
            "[2025-03-14 12:00:05 UTC] LTCUSD: 91.234  (1.23%, 1.1, vol 500000)"
        );
    }

    #[test]
    fn console_line_omits_non_numeric_extras() {
        let fields = Fields::from([
            ("name", json!("BTCUSDT")),
            ("close", json!(64250.123456)),
            ("change", Value::Null),
            ("change_abs", json!("-")),
            ("volume", json!(12.99)),
        ]);
        let quote = Quote::from_fields("BINANCE:BTCUSDT", &fields);

        assert_eq!(
            console_line(noon(), &quote),
            "[2025-03-14 12:00:05 UTC] BTCUSDT: 64250.123456  (vol 12)"
        );
    }

    #[test]
    fn console_line_with_nothing_extra() {
        let quote = Quote::from_fields("X:Y", &Fields::from([("close", Value::Null)]));
        assert_eq!(console_line(noon(), &quote), "[2025-03-14 12:00:05 UTC] X:Y: None  ()");
    }

    #[test]
    fn phrase_for_full_quote() {
        assert_eq!(phrase(&ltc()), "LTCUSD price 91.23. Change 1.23 percent.");
    }

    #[test]
    fn phrase_without_change() {
        let fields = Fields::from([("name", json!("BTCUSDT")), ("close", json!(64250.5))]);
        let quote = Quote::from_fields("BINANCE:BTCUSDT", &fields);

        assert_eq!(phrase(&quote), "BTCUSDT price 64,250.50.");
    }

    #[test]
    fn phrase_uses_raw_text_close() {
        let fields = Fields::from([("name", json!("X")), ("close", json!("halted"))]);
        assert_eq!(phrase(&Quote::from_fields("X:Y", &fields)), "X price halted.");
    }

    #[test]
    fn grouping() {
        assert_eq!(grouped_2dp(0.0), "0.00");
        assert_eq!(grouped_2dp(999.999), "1,000.00");
        assert_eq!(grouped_2dp(1234567.891), "1,234,567.89");
        assert_eq!(grouped_2dp(-1234.5), "-1,234.50");
        assert_eq!(grouped_2dp(-0.001), "-0.00");
        assert_eq!(grouped_2dp(0.004), "0.00");
    }
}
