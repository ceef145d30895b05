//! 金额在库内一律以"分"存储；支付宝接口使用两位小数的"元"字符串。

/// 3000 -> "30.00"
pub fn cents_to_yuan(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// "30.00" / "30.5" / "30" -> 分；格式非法返回 None
pub fn yuan_to_cents(yuan: &str) -> Option<i64> {
    let yuan = yuan.trim();
    let (int_part, frac_part) = match yuan.split_once('.') {
        Some((i, f)) => (i, f),
        None => (yuan, ""),
    };
    if int_part.is_empty()
        || !int_part.chars().all(|c| c.is_ascii_digit())
        || frac_part.len() > 2
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let int_value: i64 = int_part.parse().ok()?;
    let frac_value: i64 = match frac_part.len() {
        0 => 0,
        1 => frac_part.parse::<i64>().ok()? * 10,
        _ => frac_part.parse().ok()?,
    };
    int_value.checked_mul(100)?.checked_add(frac_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cents_to_yuan() {
        assert_eq!(cents_to_yuan(3000), "30.00");
        assert_eq!(cents_to_yuan(29805), "298.05");
        assert_eq!(cents_to_yuan(7), "0.07");
    }

    #[test]
    fn test_yuan_to_cents() {
        assert_eq!(yuan_to_cents("30.00"), Some(3000));
        assert_eq!(yuan_to_cents("30.5"), Some(3050));
        assert_eq!(yuan_to_cents("698"), Some(69800));
        assert_eq!(yuan_to_cents("0.01"), Some(1));
        assert_eq!(yuan_to_cents("1.001"), None);
        assert_eq!(yuan_to_cents("-1.00"), None);
        assert_eq!(yuan_to_cents("abc"), None);
        assert_eq!(yuan_to_cents(".5"), None);
    }
}
