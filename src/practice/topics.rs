use chrono::{Local, NaiveDate};
use rand::Rng;

pub const COMMON_TOPICS: [&str; 10] = [
    "Introduce yourself and your background.",
    "What are your long-term career goals?",
    "Describe your favorite travel memory.",
    "What is the importance of technology in modern education?",
    "How do you usually spend your weekends?",
    "Talk about a book or movie that changed your perspective.",
    "What are the pros and cons of working from home?",
    "Describe a person who has influenced you the most.",
    "How do you handle stress in your daily life?",
    "Talk about your favorite hobby and why you enjoy it.",
];

pub fn default_topic() -> &'static str {
    COMMON_TOPICS[0]
}

/// Uniform pick from [`COMMON_TOPICS`].
pub fn random_topic<R: Rng>(rng: &mut R) -> &'static str {
    COMMON_TOPICS[rng.gen_range(0..COMMON_TOPICS.len())]
}

pub fn day_topic(date: NaiveDate) -> String {
    format!(
        "Talk about your day today, {}. What went well?",
        date.format("%A, %B %-d, %Y")
    )
}

pub fn todays_topic() -> String {
    day_topic(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_day_topic_embeds_long_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            day_topic(date),
            "Talk about your day today, Monday, January 15, 2024. What went well?"
        );
    }

    #[test]
    fn test_random_topic_covers_the_list() {
        let mut rng = StdRng::seed_from_u64(42);
        let seen: HashSet<&str> = (0..500).map(|_| random_topic(&mut rng)).collect();
        assert_eq!(seen.len(), COMMON_TOPICS.len());
    }

    #[test]
    fn test_default_is_first_prompt() {
        assert_eq!(default_topic(), "Introduce yourself and your background.");
    }
}
