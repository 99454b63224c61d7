// ==========================================
// 班次生产数据采集 - 通知文案国际化
// ==========================================
// 文案位于 locales/zh-CN.yml（默认）与 locales/en.yml
// 占位符格式: %{name}，由 t_with_args 替换
// rust_i18n::i18n! 宏在 lib.rs 中初始化
// ==========================================

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"zh-CN" 或 "en"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use production_capture::i18n::t;
/// let msg = t("session.restored");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use production_capture::i18n::t_with_args;
/// let msg = t_with_args("slot.saved", &[("hour", "3")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}
