use regex::Regex;
use std::sync::LazyLock;
use crate::error::{AppError, AppResult};

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,32}$").expect("valid username regex"));

/// 验证用户名：3-32 位字母、数字或下划线
pub fn validate_username(username: &str) -> AppResult<()> {
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::ValidationError(
            "用户名必须为3-32位字母、数字或下划线".to_string()
        ));
    }

    Ok(())
}

/// 验证昵称长度（按字符计，兼容中文）
pub fn validate_nickname(nickname: &str) -> AppResult<()> {
    let len = nickname.trim().chars().count();
    if len == 0 || len > 32 {
        return Err(AppError::ValidationError(
            "昵称长度必须在1-32字符之间".to_string()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("ab").is_err()); // 太短
        assert!(validate_username("has space").is_err());
        assert!(validate_username("中文名").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_nickname() {
        assert!(validate_nickname("小明").is_ok());
        assert!(validate_nickname("   ").is_err());
        assert!(validate_nickname(&"字".repeat(32)).is_ok());
        assert!(validate_nickname(&"字".repeat(33)).is_err());
    }
}
