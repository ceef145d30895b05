use chrono::Utc;
use rand::Rng;

/// 生成商户订单号：AF + UTC 时间戳(精确到秒) + 6 位随机数，共 22 位
pub fn generate_out_trade_no() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "AF{}{:06}",
        Utc::now().format("%Y%m%d%H%M%S"),
        rng.gen_range(0..=999_999)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_out_trade_no() {
        let no = generate_out_trade_no();
        assert_eq!(no.len(), 22);
        assert!(no.starts_with("AF"));
        assert!(no[2..].chars().all(|c| c.is_ascii_digit()));
    }
}
