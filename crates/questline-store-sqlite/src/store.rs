//! [`SqliteStore`] — the SQLite implementation of [`ProgressStore`].
//!
//! Every mutation that the concurrency model cares about is pushed into the
//! database itself: the progress-row upsert targets the composite key, the
//! counter and XP updates are `SET x = x + n` increments, and the submission
//! ledger commits in the same transaction as the row writes it guards.

use std::{collections::HashSet, path::Path};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use questline_core::{
  achievement::{AchievementId, OneShotFlag, OneShotFlags},
  progress::{CounterDelta, MissionProgress},
  store::{DeltaOutcome, ProgressPatch, ProgressStore},
  xp::{UserXp, XpAward},
};

use crate::{
  encode::{
    RawProgress, encode_dt, encode_uuid, decode_achievement, fine_column,
    quality_column, type_column, PROGRESS_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Questline progress store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Read one progress row inside a connection closure.
fn select_progress(
  conn: &rusqlite::Connection,
  user_id: &str,
  mission_id: &str,
) -> rusqlite::Result<Option<RawProgress>> {
  conn
    .query_row(
      &format!(
        "SELECT {PROGRESS_COLUMNS} FROM mission_progress \
         WHERE user_id = ?1 AND mission_id = ?2"
      ),
      rusqlite::params![user_id, mission_id],
      RawProgress::from_row,
    )
    .optional()
}

/// Ensure the (user, mission) row exists. Loser of a concurrent create hits
/// the conflict target and is a silent no-op, never an error.
fn ensure_row(
  conn: &rusqlite::Connection,
  user_id: &str,
  mission_id: &str,
  now: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO mission_progress (user_id, mission_id, last_updated)
     VALUES (?1, ?2, ?3)
     ON CONFLICT(user_id, mission_id) DO NOTHING",
    rusqlite::params![user_id, mission_id, now],
  )?;
  Ok(())
}

// ─── ProgressStore impl ──────────────────────────────────────────────────────

impl ProgressStore for SqliteStore {
  type Error = Error;

  // ── Progress rows ──────────────────────────────────────────────────────

  async fn get_progress<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
  ) -> Result<Option<MissionProgress>> {
    let user_str    = encode_uuid(user_id);
    let mission_str = mission_id.to_owned();

    let raw: Option<RawProgress> = self
      .conn
      .call(move |conn| Ok(select_progress(conn, &user_str, &mission_str)?))
      .await?;

    raw.map(RawProgress::into_progress).transpose()
  }

  async fn list_progress(&self, user_id: Uuid) -> Result<Vec<MissionProgress>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawProgress> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PROGRESS_COLUMNS} FROM mission_progress WHERE user_id = ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], RawProgress::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProgress::into_progress).collect()
  }

  async fn upsert_progress<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
    patch: ProgressPatch,
  ) -> Result<MissionProgress> {
    let user_str    = encode_uuid(user_id);
    let mission_str = mission_id.to_owned();
    let now_str     = encode_dt(Utc::now());

    let raw: Option<RawProgress> = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO mission_progress (
             user_id, mission_id, completion_percentage,
             can_resume, last_message_order, last_updated
           ) VALUES (?1, ?2, COALESCE(?3, 0), COALESCE(?4, 0), COALESCE(?5, 0), ?6)
           ON CONFLICT(user_id, mission_id) DO UPDATE SET
             completion_percentage = COALESCE(?3, completion_percentage),
             can_resume            = COALESCE(?4, can_resume),
             last_message_order    = COALESCE(?5, last_message_order),
             last_updated          = ?6",
          rusqlite::params![
            user_str,
            mission_str,
            patch.completion_percentage,
            patch.can_resume,
            patch.last_message_order,
            now_str,
          ],
        )?;
        Ok(select_progress(conn, &user_str, &mission_str)?)
      })
      .await?;

    raw
      .ok_or_else(|| Error::RowMissingAfterWrite {
        user_id,
        mission_id: mission_id.to_owned(),
      })?
      .into_progress()
  }

  async fn record_decision<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
    delta: Option<CounterDelta>,
    patch: ProgressPatch,
    submission_id: Uuid,
  ) -> Result<DeltaOutcome> {
    let user_str       = encode_uuid(user_id);
    let mission_str    = mission_id.to_owned();
    let submission_str = encode_uuid(submission_id);
    let now_str        = encode_dt(Utc::now());

    let columns = delta.map(|d| {
      (
        type_column(d.decision_type),
        quality_column(d.quality),
        fine_column(d.decision_type, d.quality),
      )
    });

    let (replayed, raw): (bool, Option<RawProgress>) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        ensure_row(&tx, &user_str, &mission_str, &now_str)?;

        // The ledger insert gates every write in this transaction: a
        // retried submission either finds its entry (replay, nothing
        // re-applied — not even the patch) or applies exactly once.
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO decision_submissions
             (submission_id, user_id, mission_id, recorded_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![submission_str, user_str, mission_str, now_str],
        )?;

        if inserted == 1 {
          if let Some((type_col, quality_col, fine_col)) = columns {
            tx.execute(
              &format!(
                "UPDATE mission_progress SET
                   decisions_made = decisions_made + 1,
                   {type_col}     = {type_col} + 1,
                   {quality_col}  = {quality_col} + 1,
                   {fine_col}     = {fine_col} + 1
                 WHERE user_id = ?1 AND mission_id = ?2"
              ),
              rusqlite::params![user_str, mission_str],
            )?;
          }

          tx.execute(
            "UPDATE mission_progress SET
               completion_percentage = COALESCE(?3, completion_percentage),
               can_resume            = COALESCE(?4, can_resume),
               last_message_order    = COALESCE(?5, last_message_order),
               last_updated          = ?6
             WHERE user_id = ?1 AND mission_id = ?2",
            rusqlite::params![
              user_str,
              mission_str,
              patch.completion_percentage,
              patch.can_resume,
              patch.last_message_order,
              now_str,
            ],
          )?;
        }

        let raw = select_progress(&tx, &user_str, &mission_str)?;
        tx.commit()?;
        Ok((inserted == 0, raw))
      })
      .await?;

    let progress = raw
      .ok_or_else(|| Error::RowMissingAfterWrite {
        user_id,
        mission_id: mission_id.to_owned(),
      })?
      .into_progress()?;

    Ok(if replayed {
      DeltaOutcome::Replayed(progress)
    } else {
      DeltaOutcome::Applied(progress)
    })
  }

  async fn record_time<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
    total_secs: u32,
  ) -> Result<()> {
    let user_str    = encode_uuid(user_id);
    let mission_str = mission_id.to_owned();
    let now_str     = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        ensure_row(conn, &user_str, &mission_str, &now_str)?;
        // MAX keeps time monotone even when a stale tab flushes late.
        conn.execute(
          "UPDATE mission_progress SET
             time_spent_secs = MAX(time_spent_secs, ?3),
             last_updated    = ?4
           WHERE user_id = ?1 AND mission_id = ?2",
          rusqlite::params![user_str, mission_str, total_secs, now_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn mark_completed<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
  ) -> Result<bool> {
    let user_str    = encode_uuid(user_id);
    let mission_str = mission_id.to_owned();
    let now_str     = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        // The IS NULL guard is the whole trick: only one caller ever
        // performs the first crossing, no matter how often 100 is reached.
        let n = conn.execute(
          "UPDATE mission_progress SET completed_at = ?3, last_updated = ?3
           WHERE user_id = ?1 AND mission_id = ?2 AND completed_at IS NULL",
          rusqlite::params![user_str, mission_str, now_str],
        )?;
        Ok(n)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn reset_mission<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
  ) -> Result<()> {
    let user_str    = encode_uuid(user_id);
    let mission_str = mission_id.to_owned();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM decision_submissions WHERE user_id = ?1 AND mission_id = ?2",
          rusqlite::params![user_str, mission_str],
        )?;
        tx.execute(
          "DELETE FROM mission_progress WHERE user_id = ?1 AND mission_id = ?2",
          rusqlite::params![user_str, mission_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── XP ─────────────────────────────────────────────────────────────────

  async fn add_xp(&self, user_id: Uuid, delta: u32) -> Result<XpAward> {
    let user_str = encode_uuid(user_id);

    let total_after: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO user_xp (user_id, total_xp) VALUES (?1, ?2)
           ON CONFLICT(user_id) DO UPDATE SET total_xp = total_xp + ?2",
          rusqlite::params![user_str, delta],
        )?;
        let total: i64 = tx.query_row(
          "SELECT total_xp FROM user_xp WHERE user_id = ?1",
          rusqlite::params![user_str],
          |r| r.get(0),
        )?;
        tx.commit()?;
        Ok(total)
      })
      .await?;

    let total_after = total_after as u64;
    Ok(XpAward {
      delta,
      total_before: total_after - delta as u64,
      total_after,
    })
  }

  async fn get_xp(&self, user_id: Uuid) -> Result<UserXp> {
    let user_str = encode_uuid(user_id);

    let total: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT total_xp FROM user_xp WHERE user_id = ?1",
              rusqlite::params![user_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(UserXp { user_id, total_xp: total.unwrap_or(0) as u64 })
  }

  // ── Achievements ───────────────────────────────────────────────────────

  async fn unlocked_achievements(
    &self,
    user_id: Uuid,
  ) -> Result<HashSet<AchievementId>> {
    let user_str = encode_uuid(user_id);

    let tokens: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT achievement_id FROM unlocked_achievements WHERE user_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    tokens.iter().map(|t| decode_achievement(t)).collect()
  }

  async fn grant_achievement(
    &self,
    user_id: Uuid,
    id: AchievementId,
  ) -> Result<bool> {
    let user_str = encode_uuid(user_id);
    let id_str   = id.as_str();
    let now_str  = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT OR IGNORE INTO unlocked_achievements
             (user_id, achievement_id, unlocked_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![user_str, id_str, now_str],
        )?;
        Ok(n)
      })
      .await?;

    Ok(inserted == 1)
  }

  // ── One-shot flags ─────────────────────────────────────────────────────

  async fn one_shot_flags(&self, user_id: Uuid) -> Result<OneShotFlags> {
    let user_str = encode_uuid(user_id);

    let tokens: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT flag FROM one_shot_flags WHERE user_id = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut flags = OneShotFlags::default();
    for token in tokens {
      match token.as_str() {
        "stop_command" => flags.stop_command_used = true,
        "export" => flags.exported_stats = true,
        other => {
          return Err(Error::UnknownToken(format!("one-shot flag {other:?}")))
        }
      }
    }
    Ok(flags)
  }

  async fn set_one_shot_flag(
    &self,
    user_id: Uuid,
    flag: OneShotFlag,
  ) -> Result<bool> {
    let user_str = encode_uuid(user_id);
    let flag_str = flag.as_str();
    let now_str  = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT OR IGNORE INTO one_shot_flags (user_id, flag, set_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![user_str, flag_str, now_str],
        )?;
        Ok(n)
      })
      .await?;

    Ok(inserted == 1)
  }
}
