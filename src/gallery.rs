// Gallery queries: filters, sort orders and summary stats over one pass

use crate::card::Card;
use crate::db::Gender;
use crate::element::ElementType;
use crate::evolution::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct Gallery {
    cards: Vec<Card>,
    generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleryFilter {
    #[serde(default, rename = "type")]
    pub element: Option<ElementType>,
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default)]
    pub gender: Option<Gender>,
    /// Case-insensitive substring of the member's full name
    #[serde(default)]
    pub search: Option<String>,
}

impl GalleryFilter {
    pub fn matches(&self, card: &Card) -> bool {
        if self.element.is_some_and(|e| e != card.element) {
            return false;
        }
        if self.tier.is_some_and(|t| t != card.tier) {
            return false;
        }
        if self.gender.is_some_and(|g| g != card.gender) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => card.full_name().to_lowercase().contains(&q.to_lowercase()),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Last name, then first name
    #[default]
    Name,
    /// Highest level first
    Level,
    /// Most recent performance first, members without any last
    Recent,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GalleryStats {
    pub total: usize,
    pub average_level: f64,
    pub average_power: f64,
    pub by_type: BTreeMap<ElementType, usize>,
    pub by_tier: BTreeMap<Tier, usize>,
}

impl Gallery {
    pub fn new(cards: Vec<Card>) -> Self {
        Gallery {
            cards,
            generated_at: Utc::now(),
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn into_cards(self) -> Vec<Card> {
        self.cards
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn find(&self, member_id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.member_id == member_id)
    }

    pub fn query(&self, filter: &GalleryFilter, order: SortOrder) -> Vec<&Card> {
        let mut cards: Vec<&Card> = self.cards.iter().filter(|c| filter.matches(c)).collect();
        sort_cards(&mut cards, order);
        cards
    }

    pub fn stats(&self) -> GalleryStats {
        let total = self.cards.len();
        let mean = |f: fn(&Card) -> f64| {
            if total == 0 {
                0.0
            } else {
                self.cards.iter().map(f).sum::<f64>() / total as f64
            }
        };

        let mut by_type = BTreeMap::new();
        let mut by_tier = BTreeMap::new();
        for card in &self.cards {
            *by_type.entry(card.element).or_insert(0) += 1;
            *by_tier.entry(card.tier).or_insert(0) += 1;
        }

        GalleryStats {
            total,
            average_level: mean(|c: &Card| c.level as f64),
            average_power: mean(|c: &Card| c.stats.power as f64),
            by_type,
            by_tier,
        }
    }
}

pub fn sort_cards(cards: &mut [&Card], order: SortOrder) {
    match order {
        SortOrder::Name => cards.sort_by_key(|c| (c.last_name.to_lowercase(), c.first_name.to_lowercase())),
        SortOrder::Level => cards.sort_by_key(|c| (Reverse(c.level), c.last_name.to_lowercase())),
        SortOrder::Recent => cards.sort_by_key(|c| (c.last_performance.is_none(), Reverse(c.last_performance))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardEngine;
    use crate::db::{Member, PerformanceRecord, Unit};

    fn gallery() -> Gallery {
        let members = vec![
            Member::new("1", "Zoé", "Bernard", Gender::Female),
            Member::new("2", "Adam", "Moreau", Gender::Male),
            Member::new("3", "Inès", "Arnaud", Gender::Female),
        ];
        let mut records = Vec::new();
        for i in 0..6 {
            records.push(PerformanceRecord::new("2", "Back Squat", 100.0 + i as f64, Unit::Kg, "2024-02-01"));
        }
        records.push(PerformanceRecord::new("3", "1200m Run", 280.0, Unit::Sec, "2024-05-01"));

        CardEngine::default().regenerate_gallery(&members, &records, None)
    }

    #[test]
    fn test_sort_orders() {
        let g = gallery();
        let all = GalleryFilter::default();

        let names: Vec<&str> = g.query(&all, SortOrder::Name).iter().map(|c| c.member_id.as_str()).collect();
        assert_eq!(names, vec!["3", "1", "2"]);

        let recent: Vec<&str> = g.query(&all, SortOrder::Recent).iter().map(|c| c.member_id.as_str()).collect();
        assert_eq!(recent, vec!["3", "2", "1"]);

        let levels: Vec<u8> = g.query(&all, SortOrder::Level).iter().map(|c| c.level).collect();
        assert!(levels.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_filters() {
        let g = gallery();

        let women = GalleryFilter {
            gender: Some(Gender::Female),
            ..Default::default()
        };
        assert_eq!(g.query(&women, SortOrder::Name).len(), 2);

        let search = GalleryFilter {
            search: Some("  mOrEaU ".to_string()),
            ..Default::default()
        };
        assert_eq!(g.query(&search, SortOrder::Name)[0].member_id, "2");

        let fighters = GalleryFilter {
            element: Some(ElementType::Fighting),
            ..Default::default()
        };
        let hits = g.query(&fighters, SortOrder::Name);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].member_id, "2");

        let masters = GalleryFilter {
            tier: Some(Tier::Master),
            ..Default::default()
        };
        assert!(g.query(&masters, SortOrder::Name).is_empty());
    }

    #[test]
    fn test_stats() {
        let g = gallery();
        let stats = g.stats();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_tier.values().sum::<usize>(), 3);
        assert_eq!(stats.by_type.get(&ElementType::Normal), Some(&1));
        assert!(stats.average_level >= 1.0);
        assert_eq!(stats.average_power, 5.0);

        assert_eq!(Gallery::new(Vec::new()).stats().average_level, 0.0);
    }

    #[test]
    fn test_filter_from_query_string_shape() {
        let f: GalleryFilter = serde_json::from_str(r#"{"type": "fire", "tier": "elite"}"#).unwrap();
        assert_eq!(f.element, Some(ElementType::Fire));
        assert_eq!(f.tier, Some(Tier::Elite));
    }
}
