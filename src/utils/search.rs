use sea_orm::sea_query::LikeExpr;

const LIKE_ESCAPE: char = '\\';

/// 转义 LIKE 通配符，使用户输入按字面匹配
pub fn escape_like(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// `%keyword%` 子串匹配
pub fn like_contains(keyword: &str) -> LikeExpr {
    LikeExpr::new(format!("%{}%", escape_like(keyword))).escape(LIKE_ESCAPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("绘画"), "绘画");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
