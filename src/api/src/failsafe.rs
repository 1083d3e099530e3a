//! Fallback reply when the page could not be fetched or parsed.

/// Minimal reply pointing the user at the official page
pub fn fallback_reply(title: &str, url: &str) -> String {
    format!(
        "📍 {}\n――――――――――\n直前情報の取得に失敗しました。少し待ってから再度お試しください。\n公式ページで直接ご確認いただけます。\n(src: 公式 / {})",
        title, url
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_contains_url() {
        let url = "https://www.boatrace.jp/owpc/pc/race/beforeinfo?rno=8&jcd=15&hd=20250811";
        let text = fallback_reply("丸亀 8R (2025/08/11)", url);
        assert!(text.contains(url));
        assert!(text.starts_with("📍 丸亀 8R (2025/08/11)"));
        assert!(text.contains("取得に失敗"));
    }
}
