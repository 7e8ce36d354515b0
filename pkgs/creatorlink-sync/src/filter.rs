//! Conversation list filtering and grouping
//!
//! Everything here is a pure function of (conversations, search term, status filter,
//! now). Callers recompute on any input change; conversation counts are small enough
//! that no incremental update is kept.

use chrono::{DateTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::bucket::{classify_with_week_start, TimeBucket};
use crate::models::Conversation;

/// Status filter for the conversation list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Unread,
    Archived,
}

impl StatusFilter {
    pub fn matches(&self, conversation: &Conversation) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Unread => conversation.unread,
            // No conversation qualifies yet; see DESIGN.md open questions.
            StatusFilter::Archived => false,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusFilter::All => "all",
            StatusFilter::Unread => "unread",
            StatusFilter::Archived => "archived",
        };
        f.write_str(name)
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "unread" => Ok(StatusFilter::Unread),
            "archived" => Ok(StatusFilter::Archived),
            other => Err(format!("Unknown status filter: {}", other)),
        }
    }
}

/// Case-insensitive substring match against name, handle, preview and campaign
pub fn matches_search(conversation: &Conversation, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    let contains = |field: &str| field.to_lowercase().contains(&needle);

    contains(&conversation.participant_name)
        || contains(&conversation.participant_handle)
        || contains(&conversation.last_message)
        || conversation
            .campaign_name
            .as_deref()
            .is_some_and(contains)
}

/// Conversations passing both the search and the status predicate, in input order
pub fn filter_conversations<'a>(
    conversations: &'a [Conversation],
    search: &str,
    filter: StatusFilter,
) -> Vec<&'a Conversation> {
    conversations
        .iter()
        .filter(|c| matches_search(c, search) && filter.matches(c))
        .collect()
}

/// One non-empty bucket of the grouped conversation list
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationGroup<'a> {
    pub bucket: TimeBucket,
    pub conversations: Vec<&'a Conversation>,
}

/// Partition conversations by last-message bucket
///
/// Groups come out in bucket order and empty buckets are omitted. Conversations keep
/// their relative order within a group.
pub fn group_conversations<'a, Tz: TimeZone>(
    conversations: &[&'a Conversation],
    now: &DateTime<Tz>,
    week_start: Weekday,
) -> Vec<ConversationGroup<'a>> {
    let mut groups: Vec<ConversationGroup<'a>> = TimeBucket::ALL
        .iter()
        .map(|bucket| ConversationGroup {
            bucket: *bucket,
            conversations: Vec::new(),
        })
        .collect();

    for conversation in conversations {
        let bucket = classify_with_week_start(conversation.last_message_at, now, week_start);
        // ALL is in enum order, so the discriminant is the slot
        groups[bucket as usize].conversations.push(*conversation);
    }

    groups.retain(|g| !g.conversations.is_empty());
    groups
}

/// Filter then group in one step
pub fn filter_and_group<'a, Tz: TimeZone>(
    conversations: &'a [Conversation],
    search: &str,
    filter: StatusFilter,
    now: &DateTime<Tz>,
    week_start: Weekday,
) -> Vec<ConversationGroup<'a>> {
    let filtered = filter_conversations(conversations, search, filter);
    group_conversations(&filtered, now, week_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn conversation(id: &str, name: &str, unread: bool, age: Duration) -> Conversation {
        let now = Utc.with_ymd_and_hms(2025, 3, 12, 12, 0, 0).unwrap();
        Conversation {
            id: id.to_string(),
            participant_name: name.to_string(),
            participant_handle: name.to_lowercase().replace(' ', "_"),
            avatar_url: None,
            last_message: format!("Latest from {}", name),
            last_message_at: now - age,
            unread,
            campaign_name: None,
            creator_archived_at: None,
            brand_archived_at: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, 12, 0, 0).unwrap()
    }

    fn sample() -> Vec<Conversation> {
        vec![
            conversation("c1", "Acme Drinks", true, Duration::hours(1)),
            conversation("c2", "Blue Bottle", false, Duration::days(1)),
            conversation("c3", "Cobalt Studio", true, Duration::days(2)),
            conversation("c4", "Delta Gear", false, Duration::days(30)),
        ]
    }

    #[test]
    fn test_unread_filter_with_empty_search() {
        let mut convs = sample();
        convs.truncate(3);

        let result = filter_conversations(&convs, "", StatusFilter::Unread);
        let ids: Vec<&str> = result.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[test]
    fn test_search_is_case_insensitive_over_all_fields() {
        let mut convs = sample();
        convs[3].campaign_name = Some("Summer Launch".to_string());

        let by_name = filter_conversations(&convs, "ACME", StatusFilter::All);
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "c1");

        let by_handle = filter_conversations(&convs, "blue_bottle", StatusFilter::All);
        assert_eq!(by_handle[0].id, "c2");

        let by_preview = filter_conversations(&convs, "latest from cobalt", StatusFilter::All);
        assert_eq!(by_preview[0].id, "c3");

        let by_campaign = filter_conversations(&convs, "summer", StatusFilter::All);
        assert_eq!(by_campaign[0].id, "c4");

        assert!(filter_conversations(&convs, "nothing here", StatusFilter::All).is_empty());
    }

    #[test]
    fn test_search_and_status_must_both_hold() {
        let convs = sample();
        let result = filter_conversations(&convs, "blue", StatusFilter::Unread);
        assert!(result.is_empty());
    }

    #[test]
    fn test_archived_filter_matches_nothing() {
        let mut convs = sample();
        convs[0].creator_archived_at = Some(now());
        convs[1].brand_archived_at = Some(now());

        assert!(filter_conversations(&convs, "", StatusFilter::Archived).is_empty());
    }

    #[test]
    fn test_filtered_result_is_subset_satisfying_predicates() {
        let convs = sample();
        for filter in [StatusFilter::All, StatusFilter::Unread, StatusFilter::Archived] {
            for term in ["", "a", "O", "studio", "zzz"] {
                let result = filter_conversations(&convs, term, filter);
                for c in &result {
                    assert!(convs.iter().any(|orig| orig.id == c.id));
                    assert!(matches_search(c, term));
                    assert!(filter.matches(c));
                }
            }
        }
    }

    #[test]
    fn test_grouping_is_a_partition_without_empty_buckets() {
        let convs = sample();
        let groups = filter_and_group(&convs, "", StatusFilter::All, &now(), Weekday::Sun);

        let buckets: Vec<TimeBucket> = groups.iter().map(|g| g.bucket).collect();
        assert_eq!(
            buckets,
            vec![
                TimeBucket::Today,
                TimeBucket::Yesterday,
                TimeBucket::ThisWeek,
                TimeBucket::Earlier
            ]
        );

        let mut seen: Vec<&str> = groups
            .iter()
            .flat_map(|g| g.conversations.iter().map(|c| c.id.as_str()))
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["c1", "c2", "c3", "c4"]);
        assert!(groups.iter().all(|g| !g.conversations.is_empty()));
    }

    #[test]
    fn test_empty_buckets_are_omitted() {
        let convs = sample();
        let groups = filter_and_group(&convs, "", StatusFilter::Unread, &now(), Weekday::Sun);

        let buckets: Vec<TimeBucket> = groups.iter().map(|g| g.bucket).collect();
        assert_eq!(buckets, vec![TimeBucket::Today, TimeBucket::ThisWeek]);
    }

    #[test]
    fn test_group_keeps_input_order() {
        let convs = vec![
            conversation("late", "Late", false, Duration::minutes(5)),
            conversation("early", "Early", false, Duration::hours(3)),
        ];
        let groups = filter_and_group(&convs, "", StatusFilter::All, &now(), Weekday::Sun);

        assert_eq!(groups.len(), 1);
        let ids: Vec<&str> = groups[0].conversations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["late", "early"]);
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("Unread".parse::<StatusFilter>(), Ok(StatusFilter::Unread));
        assert_eq!(StatusFilter::default(), StatusFilter::All);
        assert!("starred".parse::<StatusFilter>().is_err());
    }
}
