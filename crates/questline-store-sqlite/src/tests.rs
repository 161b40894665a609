//! Integration tests for `SqliteStore` against an in-memory database.

use questline_core::{
  achievement::{AchievementId, OneShotFlag},
  decision::{DecisionQuality, DecisionType},
  progress::{check_invariants, CounterDelta},
  store::{ProgressPatch, ProgressStore},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn delta(decision_type: DecisionType, quality: DecisionQuality) -> CounterDelta {
  CounterDelta { decision_type, quality }
}

// ─── Progress rows ───────────────────────────────────────────────────────────

#[tokio::test]
async fn get_progress_missing_returns_none() {
  let s = store().await;
  let row = s.get_progress(Uuid::new_v4(), "first-contact").await.unwrap();
  assert!(row.is_none());
}

#[tokio::test]
async fn upsert_creates_then_merges() {
  let s = store().await;
  let user = Uuid::new_v4();

  let row = s
    .upsert_progress(user, "first-contact", ProgressPatch {
      completion_percentage: Some(25),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(row.completion_percentage, 25);
  assert!(!row.can_resume);

  // A later patch replaces only the supplied fields.
  let row = s
    .upsert_progress(user, "first-contact", ProgressPatch {
      can_resume: Some(true),
      last_message_order: Some(7),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(row.completion_percentage, 25);
  assert!(row.can_resume);
  assert_eq!(row.last_message_order, 7);
}

#[tokio::test]
async fn concurrent_creates_converge_to_one_row() {
  let s = store().await;
  let user = Uuid::new_v4();

  let patch = ProgressPatch {
    completion_percentage: Some(10),
    ..Default::default()
  };
  let (a, b) = tokio::join!(
    s.upsert_progress(user, "first-contact", patch),
    s.upsert_progress(user, "first-contact", patch),
  );
  // Neither caller sees an error; both read back the same converged row.
  a.unwrap();
  b.unwrap();

  let rows = s.list_progress(user).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].completion_percentage, 10);
}

#[tokio::test]
async fn list_progress_spans_missions() {
  let s = store().await;
  let user = Uuid::new_v4();
  for mission in ["first-contact", "the-broken-cipher"] {
    s.upsert_progress(user, mission, ProgressPatch::default())
      .await
      .unwrap();
  }
  // Another user's rows stay invisible.
  s.upsert_progress(Uuid::new_v4(), "first-contact", ProgressPatch::default())
    .await
    .unwrap();

  assert_eq!(s.list_progress(user).await.unwrap().len(), 2);
}

// ─── Recorded decisions ──────────────────────────────────────────────────────

#[tokio::test]
async fn delta_increments_all_four_counters() {
  let s = store().await;
  let user = Uuid::new_v4();

  let outcome = s
    .record_decision(
      user,
      "first-contact",
      Some(delta(DecisionType::Strategic, DecisionQuality::Good)),
      ProgressPatch::default(),
      Uuid::new_v4(),
    )
    .await
    .unwrap();

  assert!(!outcome.is_replay());
  let row = outcome.progress();
  assert_eq!(row.counters.decisions_made, 1);
  assert_eq!(row.counters.good_decisions, 1);
  assert_eq!(row.counters.strategic.total, 1);
  assert_eq!(row.counters.strategic.good, 1);
  assert!(check_invariants(row).is_empty());
}

#[tokio::test]
async fn delta_creates_the_row_lazily() {
  let s = store().await;
  let user = Uuid::new_v4();
  assert!(s.get_progress(user, "first-contact").await.unwrap().is_none());

  s.record_decision(
    user,
    "first-contact",
    Some(delta(DecisionType::Action, DecisionQuality::Bad)),
    ProgressPatch::default(),
    Uuid::new_v4(),
  )
  .await
  .unwrap();

  let row = s.get_progress(user, "first-contact").await.unwrap().unwrap();
  assert_eq!(row.counters.action.bad, 1);
}

#[tokio::test]
async fn replayed_submission_is_a_noop() {
  let s = store().await;
  let user = Uuid::new_v4();
  let submission = Uuid::new_v4();
  let d = delta(DecisionType::Diplomatic, DecisionQuality::Good);

  let patch = ProgressPatch {
    completion_percentage: Some(15),
    ..Default::default()
  };
  let first = s
    .record_decision(user, "first-contact", Some(d), patch, submission)
    .await
    .unwrap();
  assert!(!first.is_replay());

  // Same submission id retried with a larger patch: neither the counters
  // nor the patched fields may move.
  let retry_patch = ProgressPatch {
    completion_percentage: Some(30),
    ..Default::default()
  };
  let second = s
    .record_decision(user, "first-contact", Some(d), retry_patch, submission)
    .await
    .unwrap();
  assert!(second.is_replay());
  assert_eq!(second.progress().counters.decisions_made, 1);
  assert_eq!(second.progress().counters.diplomatic.total, 1);
  assert_eq!(second.progress().completion_percentage, 15);
}

#[tokio::test]
async fn patch_commits_with_the_ledger_entry() {
  let s = store().await;
  let user = Uuid::new_v4();

  let outcome = s
    .record_decision(
      user,
      "first-contact",
      Some(delta(DecisionType::Strategic, DecisionQuality::Good)),
      ProgressPatch {
        completion_percentage: Some(40),
        can_resume: Some(true),
        last_message_order: Some(9),
      },
      Uuid::new_v4(),
    )
    .await
    .unwrap();

  // Counters and patched fields land in the same write.
  let row = outcome.progress();
  assert_eq!(row.counters.decisions_made, 1);
  assert_eq!(row.completion_percentage, 40);
  assert!(row.can_resume);
  assert_eq!(row.last_message_order, 9);
}

#[tokio::test]
async fn deltaless_submissions_are_ledgered_too() {
  let s = store().await;
  let user = Uuid::new_v4();
  let submission = Uuid::new_v4();
  let patch = ProgressPatch {
    completion_percentage: Some(5),
    ..Default::default()
  };

  // A turn that moves the story without a countable decision still records
  // its submission id.
  let first = s
    .record_decision(user, "first-contact", None, patch, submission)
    .await
    .unwrap();
  assert!(!first.is_replay());
  assert_eq!(first.progress().completion_percentage, 5);
  assert_eq!(first.progress().counters.decisions_made, 0);

  let retry_patch = ProgressPatch {
    completion_percentage: Some(10),
    ..Default::default()
  };
  let second = s
    .record_decision(user, "first-contact", None, retry_patch, submission)
    .await
    .unwrap();
  assert!(second.is_replay());
  assert_eq!(second.progress().completion_percentage, 5);
}

#[tokio::test]
async fn concurrent_deltas_never_lose_an_update() {
  let s = store().await;
  let user = Uuid::new_v4();
  let d = delta(DecisionType::Investigation, DecisionQuality::Good);

  let (a, b) = tokio::join!(
    s.record_decision(
      user,
      "first-contact",
      Some(d),
      ProgressPatch::default(),
      Uuid::new_v4(),
    ),
    s.record_decision(
      user,
      "first-contact",
      Some(d),
      ProgressPatch::default(),
      Uuid::new_v4(),
    ),
  );
  a.unwrap();
  b.unwrap();

  let row = s.get_progress(user, "first-contact").await.unwrap().unwrap();
  assert_eq!(row.counters.decisions_made, 2);
  assert_eq!(row.counters.investigation.good, 2);
}

// ─── Session time ────────────────────────────────────────────────────────────

#[tokio::test]
async fn time_is_monotone_non_decreasing() {
  let s = store().await;
  let user = Uuid::new_v4();

  s.record_time(user, "first-contact", 120).await.unwrap();
  // A stale flush with a smaller total must not move the clock backwards.
  s.record_time(user, "first-contact", 90).await.unwrap();
  let row = s.get_progress(user, "first-contact").await.unwrap().unwrap();
  assert_eq!(row.time_spent_secs, 120);

  s.record_time(user, "first-contact", 200).await.unwrap();
  let row = s.get_progress(user, "first-contact").await.unwrap().unwrap();
  assert_eq!(row.time_spent_secs, 200);
}

// ─── Completion guard ────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_completed_fires_exactly_once() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.upsert_progress(user, "first-contact", ProgressPatch {
    completion_percentage: Some(100),
    ..Default::default()
  })
  .await
  .unwrap();

  assert!(s.mark_completed(user, "first-contact").await.unwrap());
  // Re-reaching 100 later never re-arms the guard.
  assert!(!s.mark_completed(user, "first-contact").await.unwrap());

  let row = s.get_progress(user, "first-contact").await.unwrap().unwrap();
  assert!(row.is_completed());
}

// ─── XP ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn xp_awards_are_additive_increments() {
  let s = store().await;
  let user = Uuid::new_v4();

  let first = s.add_xp(user, 150).await.unwrap();
  assert_eq!(first.total_before, 0);
  assert_eq!(first.total_after, 150);
  assert!(!first.leveled_up());

  let second = s.add_xp(user, 75).await.unwrap();
  assert_eq!(second.total_before, 150);
  assert_eq!(second.total_after, 225);
  assert!(second.leveled_up());

  assert_eq!(s.get_xp(user).await.unwrap().total_xp, 225);
}

#[tokio::test]
async fn concurrent_xp_awards_both_land() {
  let s = store().await;
  let user = Uuid::new_v4();

  let (a, b) = tokio::join!(s.add_xp(user, 10), s.add_xp(user, 20));
  a.unwrap();
  b.unwrap();

  assert_eq!(s.get_xp(user).await.unwrap().total_xp, 30);
}

#[tokio::test]
async fn xp_defaults_to_zero_for_new_users() {
  let s = store().await;
  let xp = s.get_xp(Uuid::new_v4()).await.unwrap();
  assert_eq!(xp.total_xp, 0);
  assert_eq!(xp.level(), 1);
}

// ─── Achievements ────────────────────────────────────────────────────────────

#[tokio::test]
async fn grant_is_append_only_and_idempotent() {
  let s = store().await;
  let user = Uuid::new_v4();

  assert!(s.grant_achievement(user, AchievementId::Diplomat).await.unwrap());
  // Double grant: no-op, not an error.
  assert!(!s.grant_achievement(user, AchievementId::Diplomat).await.unwrap());

  let unlocked = s.unlocked_achievements(user).await.unwrap();
  assert_eq!(unlocked.len(), 1);
  assert!(unlocked.contains(&AchievementId::Diplomat));
}

// ─── One-shot flags ──────────────────────────────────────────────────────────

#[tokio::test]
async fn one_shot_flags_set_once() {
  let s = store().await;
  let user = Uuid::new_v4();

  let flags = s.one_shot_flags(user).await.unwrap();
  assert!(!flags.stop_command_used && !flags.exported_stats);

  assert!(s.set_one_shot_flag(user, OneShotFlag::StopCommand).await.unwrap());
  assert!(!s.set_one_shot_flag(user, OneShotFlag::StopCommand).await.unwrap());

  let flags = s.one_shot_flags(user).await.unwrap();
  assert!(flags.stop_command_used);
  assert!(!flags.exported_stats);
}

// ─── Reset ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_clears_row_and_submission_ledger() {
  let s = store().await;
  let user = Uuid::new_v4();
  let submission = Uuid::new_v4();
  let d = delta(DecisionType::Strategic, DecisionQuality::Good);

  s.record_decision(user, "first-contact", Some(d), ProgressPatch::default(), submission)
    .await
    .unwrap();
  s.reset_mission(user, "first-contact").await.unwrap();

  assert!(s.get_progress(user, "first-contact").await.unwrap().is_none());

  // After a reset the same submission id counts again: the ledger entry
  // was deleted with the row.
  let outcome = s
    .record_decision(user, "first-contact", Some(d), ProgressPatch::default(), submission)
    .await
    .unwrap();
  assert!(!outcome.is_replay());
  assert_eq!(outcome.progress().counters.decisions_made, 1);
}
