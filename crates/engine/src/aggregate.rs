//! The rolling analytics aggregate: a singleton fragment under the journal
//! root, folded forward on every processed entry.
//!
//! The fragment has the same marker-plus-data shape as an insight fragment,
//! labeled with its own sentinel. Every operation is a read-modify-write
//! against the store with no concurrency control: callers must never run
//! two merges against the same root at once.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use capsule_llm::InsightRecord;
use capsule_store::{Block, BlockInsert, BlockPatch, ListStyle, Position, TextStyle, TreeStore};

use crate::classify;
use crate::codec;
use crate::{EngineError, EngineResult};

/// Sentinel phrase for the aggregate marker, matched by substring.
pub const AGGREGATE_MARKER: &str = "Memory Capsule Dashboard";

/// Gap tolerance when walking consecutive days, in hours. Deliberately
/// wider than 24h to absorb timezone skew in observation dates.
const STREAK_TOLERANCE_HOURS: i64 = 36;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMood {
    pub date: String,
    pub mood: f64,
}

/// The singleton rolling analytics state.
///
/// `avg_mood` is stored pre-rounded as a decimal string; the running mean
/// is reconstructed from it at merge time so prior entries never need to be
/// re-read. `daily_moods` is append-only, one observation per processed
/// entry, never deduplicated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    pub total_entries: u64,
    pub avg_mood: String,
    pub streak: u32,
    pub themes: Vec<ThemeCount>,
    pub daily_moods: Vec<DailyMood>,
    pub last_updated: String,
}

impl AggregateRecord {
    pub fn zero(now: String) -> Self {
        Self {
            total_entries: 0,
            avg_mood: "0".to_string(),
            streak: 0,
            themes: Vec::new(),
            daily_moods: Vec::new(),
            last_updated: now,
        }
    }
}

/// Folds one entry's insight into the aggregate. Pure; the caller supplies
/// the timestamp.
pub fn fold(
    current: AggregateRecord,
    insight: &InsightRecord,
    entry_date: &str,
    now: String,
) -> AggregateRecord {
    let new_count = current.total_entries + 1;

    // Reconstruct the total from the stored average rather than re-summing
    // raw history.
    let current_total = current.avg_mood.parse::<f64>().unwrap_or(0.0) * current.total_entries as f64;
    let avg_mood = format!("{:.1}", (current_total + insight.mood) / new_count as f64);

    let mut themes = current.themes;
    for theme in &insight.themes {
        match themes.iter_mut().find(|existing| &existing.name == theme) {
            Some(existing) => existing.count += 1,
            None => themes.push(ThemeCount {
                name: theme.clone(),
                count: 1,
            }),
        }
    }
    // Stable sort: ties keep their prior relative order.
    themes.sort_by(|a, b| b.count.cmp(&a.count));

    let mut daily_moods = current.daily_moods;
    daily_moods.push(DailyMood {
        date: entry_date.to_string(),
        mood: insight.mood,
    });

    let streak = compute_streak(&daily_moods);

    AggregateRecord {
        total_entries: new_count,
        avg_mood,
        streak,
        themes,
        daily_moods,
        last_updated: now,
    }
}

/// Consecutive calendar days with at least one observation, walking
/// backward from the most recent. Duplicate same-day observations collapse;
/// a gap wider than the tolerance band ends the walk.
pub fn compute_streak(daily_moods: &[DailyMood]) -> u32 {
    let mut days: Vec<NaiveDate> = daily_moods
        .iter()
        .filter_map(|observation| parse_day(&observation.date))
        .collect();
    days.sort_unstable();
    days.dedup();
    days.reverse();

    let Some(&most_recent) = days.first() else {
        return 0;
    };

    let mut streak = 1;
    let mut anchor = most_recent;
    for &day in &days[1..] {
        if (anchor - day).num_hours() <= STREAK_TOLERANCE_HOURS {
            streak += 1;
            anchor = day;
        } else {
            break;
        }
    }
    streak
}

/// Calendar-day identity of an observation date: plain dates and full
/// timestamps both collapse to their day.
fn parse_day(date: &str) -> Option<NaiveDate> {
    if let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return Some(day);
    }
    DateTime::parse_from_rfc3339(date)
        .ok()
        .map(|timestamp| timestamp.date_naive())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn aggregate_marker_insert() -> BlockInsert {
    BlockInsert::text(AGGREGATE_MARKER)
        .with_text_style(TextStyle::Body)
        .with_list_style(ListStyle::Toggle)
}

/// Handle on the aggregate fragment under one journal root.
pub struct AggregateStore<'a, S: TreeStore + ?Sized> {
    store: &'a S,
    root_id: &'a str,
}

impl<'a, S: TreeStore + ?Sized> AggregateStore<'a, S> {
    pub fn new(store: &'a S, root_id: &'a str) -> Self {
        Self { store, root_id }
    }

    /// Finds the live aggregate marker among the root's immediate children.
    /// More than one match is a structural inconsistency: all but the first
    /// are deleted to restore the singleton invariant.
    pub async fn locate(&self) -> EngineResult<Option<Block>> {
        let root = self.store.get_block(self.root_id, 1).await?;
        let markers: Vec<&Block> = root
            .content
            .iter()
            .filter(|block| classify::is_marker(block, AGGREGATE_MARKER))
            .collect();

        if markers.len() > 1 {
            warn!(
                count = markers.len(),
                "duplicate aggregate fragments found; deleting extras"
            );
            let extras: Vec<String> = markers[1..]
                .iter()
                .filter_map(|block| block.id.clone())
                .collect();
            self.store.delete_blocks(&extras).await?;
        }

        Ok(markers.first().map(|&block| block.clone()))
    }

    /// Returns the marker with its data child materialized, creating the
    /// whole fragment if it is missing. An existing marker with no children
    /// is corrupt: it is deleted and recreated.
    pub async fn ensure(&self) -> EngineResult<Block> {
        if let Some(existing) = self.locate().await? {
            if let Some(id) = existing.id.as_deref() {
                let full = self.store.get_block(id, 1).await?;
                if !full.content.is_empty() {
                    return Ok(full);
                }
                warn!("aggregate fragment has no data child; deleting and recreating");
                self.store.delete_blocks(&[id.to_string()]).await?;
            }
        }

        // A separator sets the fragment off from the entries above it.
        let inserted = self
            .store
            .insert_blocks(
                self.root_id,
                vec![BlockInsert::separator(), aggregate_marker_insert()],
                Position::End,
            )
            .await?;
        let marker = inserted
            .into_iter()
            .find(|block| classify::is_marker(block, AGGREGATE_MARKER))
            .ok_or_else(|| {
                EngineError::Aggregate("insert did not return the aggregate marker".to_string())
            })?;
        let marker_id = marker.id.as_deref().ok_or_else(|| {
            EngineError::Aggregate("inserted aggregate marker has no id".to_string())
        })?;

        let zero = AggregateRecord::zero(now_rfc3339());
        let payload = serde_json::to_string_pretty(&zero)?;
        self.store
            .insert_blocks(
                marker_id,
                vec![BlockInsert::text(codec::wrap_fenced(&payload))],
                Position::End,
            )
            .await?;
        debug!(marker = marker_id, "created aggregate fragment");

        Ok(self.store.get_block(marker_id, 1).await?)
    }

    /// Reads the current aggregate. Returns `Ok(None)`, not an error, when
    /// no fragment exists yet or its payload is malformed.
    pub async fn read(&self) -> EngineResult<Option<AggregateRecord>> {
        let Some(marker) = self.locate().await? else {
            return Ok(None);
        };
        let Some(id) = marker.id.as_deref() else {
            return Ok(None);
        };

        let full = self.store.get_block(id, 1).await?;
        let Some(data) = full.content.first() else {
            debug!("aggregate fragment has no data child");
            return Ok(None);
        };
        let Some(payload) = codec::payload_of(data) else {
            debug!("aggregate data child carries no structured payload");
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                debug!(error = %err, "malformed aggregate payload; treating as absent");
                Ok(None)
            }
        }
    }

    /// The core fold step: read (or synthesize) the current aggregate,
    /// merge one entry's insight, and write the result back in place.
    pub async fn merge(
        &self,
        insight: &InsightRecord,
        entry_date: &str,
    ) -> EngineResult<AggregateRecord> {
        let current = self
            .read()
            .await?
            .unwrap_or_else(|| AggregateRecord::zero(now_rfc3339()));
        let updated = fold(current, insight, entry_date, now_rfc3339());
        self.write(&updated).await?;
        Ok(updated)
    }

    /// Overwrites the data child's payload in place (update, not insert),
    /// re-wrapped in the same fenced envelope used at creation.
    async fn write(&self, record: &AggregateRecord) -> EngineResult<()> {
        let marker = self.ensure().await?;
        let data = marker.content.first().ok_or_else(|| {
            EngineError::Aggregate("ensured fragment is missing its data child".to_string())
        })?;
        let data_id = data
            .id
            .as_deref()
            .ok_or_else(|| EngineError::Aggregate("data child has no id".to_string()))?;

        let payload = serde_json::to_string_pretty(record)?;
        self.store
            .update_block(data_id, BlockPatch::markdown(codec::wrap_fenced(&payload)))
            .await?;
        Ok(())
    }
}
