use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use serde::Serialize;

use crate::Message;

/// Messages that fall on one calendar day. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageGroup {
    pub date: NaiveDate,
    pub formatted_date: String,
    pub messages: Vec<Message>,
}

/// Partition `messages` by calendar day in the time zone of `now`.
///
/// Groups come back newest day first and each group's messages newest
/// first. Every input message lands in exactly one group.
pub fn group_messages_by_day<Tz: TimeZone>(
    messages: &[Message],
    now: &DateTime<Tz>,
) -> Vec<MessageGroup> {
    let tz = now.timezone();
    let today = now.date_naive();

    let mut by_day: BTreeMap<NaiveDate, Vec<Message>> = BTreeMap::new();
    for message in messages {
        let day = message.timestamp.with_timezone(&tz).date_naive();
        by_day.entry(day).or_default().push(message.clone());
    }

    by_day
        .into_iter()
        .rev()
        .map(|(date, mut messages)| {
            messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            MessageGroup {
                date,
                formatted_date: day_label(date, today),
                messages,
            }
        })
        .collect()
}

/// "Today", "Yesterday", or a short en-US date. The year is only shown
/// when it differs from `today`'s.
pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        return "Today".to_string();
    }
    if today.pred_opt() == Some(date) {
        return "Yesterday".to_string();
    }
    if date.year() == today.year() {
        date.format("%b %-d").to_string()
    } else {
        date.format("%b %-d, %Y").to_string()
    }
}
