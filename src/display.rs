//! Plain-text rendering for the command line front end

use std::fmt::Write;

use portal_core::{DownloadStatus, SearchResultItem, VideoDetail};

use crate::auth::Session;
use crate::state::{DownloadState, ResultView};

pub const NO_RESULTS: &str = "No results found";

/// One result card: title line, facts line, poster, page, description
pub fn render_card(item: &SearchResultItem, placeholder_poster: &str) -> String {
    let mut out = String::new();

    let _ = write!(out, "🎬 {}", item.display_title());
    if let Some(quality) = &item.quality_tag {
        let _ = write!(out, " [{}]", quality);
    }
    out.push('\n');

    let facts: Vec<String> = [
        item.release_year.clone(),
        item.duration.clone(),
        item.genre.clone(),
        item.score.as_ref().map(|s| format!("⭐ {}", s)),
        item.category.clone(),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !facts.is_empty() {
        let _ = writeln!(out, "   {}", facts.join(" • "));
    }

    let _ = writeln!(out, "   poster: {}", item.poster_or(placeholder_poster));
    if !item.page_url.is_empty() {
        let _ = writeln!(out, "   page:   {}", item.page_url);
    }
    if let Some(description) = &item.description {
        let _ = writeln!(out, "   {}", truncate(description, 160));
    }
    out
}

/// Number of cards shown out of `total`; `max_results == 0` shows all
pub fn shown_count(total: usize, max_results: usize) -> usize {
    if max_results == 0 {
        total
    } else {
        total.min(max_results)
    }
}

/// Render whatever the accumulator currently holds.
///
/// The first `already_shown` cards were printed while streaming and are
/// skipped here.
pub fn render_results(
    view: ResultView<'_>,
    already_shown: usize,
    max_results: usize,
    placeholder_poster: &str,
) -> String {
    match view {
        ResultView::Idle => String::new(),
        ResultView::Loading => "⏳ Loading...\n".to_string(),
        ResultView::Empty => format!("{}\n", NO_RESULTS),
        ResultView::Failed(message) => format!("❌ {}\n", message),
        ResultView::Results(items) => {
            let shown = shown_count(items.len(), max_results);
            let mut out = String::new();
            for item in items.iter().take(shown).skip(already_shown) {
                out.push_str(&render_card(item, placeholder_poster));
                out.push('\n');
            }
            if shown < items.len() {
                let _ = writeln!(out, "… and {} more", items.len() - shown);
            }
            out
        }
    }
}

pub fn render_video(detail: &VideoDetail) -> String {
    let meta = &detail.video_data;
    let mut out = format!("🎬 {}\n", detail.title());
    let _ = writeln!(out, "   stream: {}", detail.video_url);

    let rows = [
        ("year", &meta.release_year),
        ("duration", &meta.duration),
        ("genre", &meta.genre),
        ("score", &meta.score),
        ("country", &meta.release_country),
        ("quality", &meta.quality_tag),
        ("rating", &meta.user_rating),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            let _ = writeln!(out, "   {:<9}{}", format!("{}:", label), value);
        }
    }
    if let Some(description) = &meta.description {
        let _ = writeln!(out, "\n{}", description);
    }
    out
}

pub fn render_download_state(state: &DownloadState) -> String {
    match state {
        DownloadState::Idle => "Download".to_string(),
        DownloadState::Downloading => "⬇️ Downloading...".to_string(),
        DownloadState::Succeeded(message) => format!("✅ {}", message),
        DownloadState::Failed(message) => format!("❌ Download failed: {} (retry allowed)", message),
    }
}

pub fn render_download_status(status: &DownloadStatus) -> String {
    let mut out = String::new();
    if let Some(filename) = &status.filename {
        let _ = writeln!(out, "📁 {}", filename);
    }
    if let Some(state) = &status.status {
        let _ = writeln!(out, "   status: {}", state);
    }
    if let Some(message) = &status.message {
        let _ = writeln!(out, "   {}", message);
    }
    if out.is_empty() {
        out.push_str("No download status reported\n");
    }
    out
}

pub fn render_session(session: &Session) -> String {
    let Some(user) = session.user() else {
        return "Not signed in\n".to_string();
    };
    let mut out = format!("👤 {}", user.display_name());
    if !user.email.is_empty() {
        let _ = write!(out, " <{}>", user.email);
    }
    out.push('\n');

    let role = match (session.is_banned(), session.role()) {
        (true, _) => "banned".to_string(),
        (false, Some(role)) => role.to_string(),
        (false, None) => "pending approval".to_string(),
    };
    let _ = writeln!(out, "   role: {}", role);
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::{Group, User, UserStatus};

    #[test]
    fn test_card_uses_placeholder_poster() {
        let item = SearchResultItem {
            title: Some("Flushed Away".to_string()),
            release_year: Some("2006".to_string()),
            score: Some("6.6".to_string()),
            ..Default::default()
        };
        let card = render_card(&item, "/placeholder-poster.svg");

        assert!(card.starts_with("🎬 Flushed Away\n"));
        assert!(card.contains("2006 • ⭐ 6.6"));
        assert!(card.contains("poster: /placeholder-poster.svg"));
        assert!(!card.contains("page:"));
    }

    #[test]
    fn test_empty_view_says_no_results() {
        assert_eq!(render_results(ResultView::Empty, 0, 0, "p"), "No results found\n");
        assert_eq!(render_results(ResultView::Idle, 0, 0, "p"), "");
    }

    #[test]
    fn test_max_results_limits_cards() {
        let items: Vec<SearchResultItem> = (0..5)
            .map(|i| SearchResultItem {
                title: Some(format!("T{}", i)),
                ..Default::default()
            })
            .collect();
        let out = render_results(ResultView::Results(&items), 0, 2, "p");

        assert_eq!(out.matches("🎬").count(), 2);
        assert!(out.ends_with("… and 3 more\n"));
    }

    #[test]
    fn test_streamed_cards_are_not_repeated() {
        let items: Vec<SearchResultItem> = (0..4)
            .map(|i| SearchResultItem {
                title: Some(format!("T{}", i)),
                ..Default::default()
            })
            .collect();

        assert_eq!(render_results(ResultView::Results(&items), 3, 3, "p"), "… and 1 more\n");

        let rest = render_results(ResultView::Results(&items), 2, 0, "p");
        assert_eq!(rest.matches("🎬").count(), 2);
        assert!(rest.starts_with("🎬 T2"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héllo…");
        assert_eq!(truncate(" short ", 10), "short");
    }

    #[test]
    fn test_session_rendering() {
        assert_eq!(render_session(&Session::from_status(None)), "Not signed in\n");

        let pending = Session::from_status(Some(UserStatus {
            user: User {
                first_name: "Kyra".to_string(),
                email: "k@example.com".to_string(),
                ..Default::default()
            },
            group: None,
        }));
        assert_eq!(
            render_session(&pending),
            "👤 Kyra <k@example.com>\n   role: pending approval\n"
        );

        let admin = Session::from_status(Some(UserStatus {
            user: User::default(),
            group: Some(Group { role: "Root".to_string() }),
        }));
        assert!(render_session(&admin).contains("role: Root"));
    }
}
