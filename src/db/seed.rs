use chrono::Utc;
use uuid::Uuid;

use crate::models::{Day, Item, ItemKind, Itinerary};

/// Built-in itinerary returned when the store is empty or unreachable.
///
/// Reads prioritize availability: a browser session always gets a usable
/// document to render, never an error page. The nil id marks the document as
/// unsaved; the first save replaces it with a store-assigned id.
pub fn seed_itinerary() -> Itinerary {
    let now = Utc::now();
    Itinerary {
        id: Uuid::nil(),
        title: "Kansai & Shikoku".to_string(),
        subtitle: "Nov 22 - Nov 29 (8 days, 7 nights)".to_string(),
        days: vec![
            Day {
                id: "day1".to_string(),
                date: "11/22 (Fri)".to_string(),
                title: "Day 1 - Departure".to_string(),
                accommodation: "Kansai Airport Hotel".to_string(),
                items: vec![
                    Item {
                        id: "item1".to_string(),
                        kind: ItemKind::Airport,
                        time: "07:30".to_string(),
                        name: "Taoyuan International Airport".to_string(),
                        activity: "Check-in, duty free".to_string(),
                    },
                    Item {
                        id: "item2".to_string(),
                        kind: ItemKind::Transport,
                        time: "07:30-11:00".to_string(),
                        name: "EVA Air BR109".to_string(),
                        activity: "Flight, about 2.5 hours".to_string(),
                    },
                    Item {
                        id: "item3".to_string(),
                        kind: ItemKind::City,
                        time: "11:00-18:00".to_string(),
                        name: "Osaka".to_string(),
                        activity: "Airport to city, Shinsaibashi, Dotonbori".to_string(),
                    },
                ],
            },
            Day {
                id: "day2".to_string(),
                date: "11/23 (Sat)".to_string(),
                title: "Day 2 - Osaka".to_string(),
                accommodation: "Osaka City Hotel".to_string(),
                items: vec![
                    Item {
                        id: "item4".to_string(),
                        kind: ItemKind::Attraction,
                        time: "09:00".to_string(),
                        name: "Osaka Castle".to_string(),
                        activity: "Main keep".to_string(),
                    },
                    Item {
                        id: "item5".to_string(),
                        kind: ItemKind::Attraction,
                        time: "14:00".to_string(),
                        name: "Dotonbori".to_string(),
                        activity: "Shopping, street food".to_string(),
                    },
                ],
            },
        ],
        notes: Default::default(),
        created_at: now,
        updated_at: now,
    }
}
