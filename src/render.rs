// 🖼️ Card rendering - HTML and terminal text. Presentation only: everything
// shown here is already computed on the Card.

use crate::card::Card;
use crate::gallery::GalleryStats;
use std::fmt::Write;

/// Minimal HTML escaping for text and attribute values
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn stat_bar_html(label: &str, value: u8) -> String {
    format!(
        r#"<div class="stat"><span class="stat-label">{}</span><div class="stat-bar"><div class="stat-fill" style="width:{}%"></div></div><span class="stat-value">{}</span></div>"#,
        label, value, value
    )
}

pub fn card_html(card: &Card) -> String {
    let display = card.element.display();
    let mut html = String::new();

    let _ = write!(
        html,
        r#"<article class="card card-{element} tier-{tier}" data-member="{id}" style="--type-color:{color}">"#,
        element = card.element,
        tier = card.tier,
        id = escape_html(&card.member_id),
        color = display.color,
    );
    let _ = write!(
        html,
        r#"<header><h3>{}</h3><span class="hp">HP {}</span></header>"#,
        escape_html(&card.full_name()),
        card.hp
    );
    let _ = write!(
        html,
        r#"<img class="sprite" src="{}" alt="{}" loading="lazy">"#,
        escape_html(&card.sprite_url),
        escape_html(&card.identity.name)
    );
    let _ = write!(
        html,
        r#"<p class="identity">{} #{} · {} {} · Niv. {} · {}</p>"#,
        escape_html(&card.identity.name),
        card.identity.sprite_id,
        display.icon,
        display.name,
        card.level,
        card.tier.label()
    );
    let _ = write!(
        html,
        r#"<p class="badge" style="color:{}">{} {}</p>"#,
        card.badge.color, card.badge.icon, card.badge.name
    );

    html.push_str(r#"<section class="stats">"#);
    html.push_str(&stat_bar_html("Cardio", card.stats.cardio));
    html.push_str(&stat_bar_html("Force", card.stats.force));
    html.push_str(&stat_bar_html("Gym", card.stats.gym));
    html.push_str(&stat_bar_html("Puissance", card.stats.power));
    html.push_str("</section>");

    html.push_str(r#"<ul class="attacks">"#);
    for attack in &card.attacks {
        let _ = write!(
            html,
            r#"<li><span>{}</span><strong>{}</strong></li>"#,
            escape_html(&attack.name),
            attack.damage
        );
    }
    html.push_str("</ul>");

    let _ = write!(
        html,
        r#"<footer>{} · {} perfs · {} PR</footer></article>"#,
        card.rarity.label(),
        card.performance_count,
        card.pr_count
    );

    html
}

const PAGE_STYLE: &str = "body{font-family:system-ui,sans-serif;background:#111827;color:#f9fafb;margin:0;padding:2rem}\
.grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(240px,1fr));gap:1rem}\
.card{background:#1f2937;border:3px solid var(--type-color);border-radius:12px;padding:1rem}\
.card header{display:flex;justify-content:space-between}\
.sprite{width:100%;height:160px;object-fit:contain}\
.stat{display:flex;align-items:center;gap:.5rem;font-size:.8rem}\
.stat-bar{flex:1;background:#374151;height:6px;border-radius:3px}\
.stat-fill{background:var(--type-color);height:100%;border-radius:3px}\
.attacks{list-style:none;padding:0}.attacks li{display:flex;justify-content:space-between}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"fr\"><head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head><body>{}</body></html>",
        escape_html(title),
        PAGE_STYLE,
        body
    )
}

pub fn card_page(card: &Card) -> String {
    page(&card.full_name(), &format!(r#"<div class="grid">{}</div>"#, card_html(card)))
}

pub fn gallery_page(cards: &[&Card], stats: &GalleryStats) -> String {
    let mut body = String::new();
    let _ = write!(
        body,
        "<h1>Vitrine des athlètes</h1><p>{} cartes · niveau moyen {:.1} · puissance moyenne {:.1}</p>",
        stats.total, stats.average_level, stats.average_power
    );
    body.push_str(r#"<div class="grid">"#);
    for card in cards {
        body.push_str(&card_html(card));
    }
    body.push_str("</div>");
    page("Vitrine des athlètes", &body)
}

// ============================================================================
// TERMINAL
// ============================================================================

fn stat_bar_text(value: u8) -> String {
    let filled = (value as usize + 5) / 10;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled.min(10)))
}

pub fn card_text(card: &Card) -> String {
    let display = card.element.display();
    let mut out = String::new();

    let _ = writeln!(out, "🎴 {}  ({})", card.full_name(), card.member_id);
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(
        out,
        "{} #{}  {} {}  |  Niv. {}  HP {}",
        card.identity.name, card.identity.sprite_id, display.icon, display.name, card.level, card.hp
    );
    let _ = writeln!(
        out,
        "Palier: {} ({})  Rareté: {}  Badge: {} {}",
        card.tier.label(),
        card.tier,
        card.rarity.label(),
        card.badge.icon,
        card.badge.name
    );
    let _ = writeln!(out);
    for (label, value) in [
        ("Cardio", card.stats.cardio),
        ("Force", card.stats.force),
        ("Gym", card.stats.gym),
        ("Puissance", card.stats.power),
    ] {
        let _ = writeln!(out, "  {:<10} {} {:>3}", label, stat_bar_text(value), value);
    }
    let _ = writeln!(out);
    for attack in &card.attacks {
        let _ = writeln!(out, "  ⚔️  {:<20} {:>4}", attack.name, attack.damage);
    }
    let _ = writeln!(out);
    let _ = write!(
        out,
        "{} performances · {} PR · dernière: {}",
        card.performance_count,
        card.pr_count,
        card.last_performance
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardEngine;
    use crate::db::{Gender, Member};
    use crate::evolution::UsedIdentitySet;
    use crate::gallery::Gallery;

    fn card_for(first: &str, last: &str) -> Card {
        let member = Member::new("m<1>", first, last, Gender::Female);
        CardEngine::default().generate_card(&member, &[], None, &mut UsedIdentitySet::new())
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        assert_eq!(escape_html("Zoé"), "Zoé");
    }

    #[test]
    fn test_card_html_escapes_member_text() {
        let html = card_html(&card_for("<script>", "O'Neil"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("O&#39;Neil"));
        assert!(html.contains("data-member=\"m&lt;1&gt;\""));
        assert!(html.contains("HP 1"));
    }

    #[test]
    fn test_gallery_page_lists_every_card() {
        let gallery = Gallery::new(vec![card_for("Ana", "A"), card_for("Bea", "B")]);
        let cards: Vec<&Card> = gallery.cards().iter().collect();
        let html = gallery_page(&cards, &gallery.stats());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert_eq!(html.matches("<article").count(), 2);
        assert!(html.contains("2 cartes"));
    }

    #[test]
    fn test_card_text() {
        let text = card_text(&card_for("Ana", "Lopez"));
        assert!(text.contains("Ana Lopez"));
        assert!(text.contains("HP 1"));
        assert!(text.contains("dernière: -"));
        assert_eq!(stat_bar_text(100), "██████████");
        assert_eq!(stat_bar_text(5), "█░░░░░░░░░");
    }
}
