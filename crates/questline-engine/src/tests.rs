//! End-to-end pipeline tests against an in-memory SQLite store.

use questline_core::{
  achievement::AchievementId,
  decision::{DecisionClassification, DecisionQuality},
};
use questline_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{TurnInput, TurnPipeline};

async fn pipeline() -> TurnPipeline<SqliteStore> {
  TurnPipeline::new(
    SqliteStore::open_in_memory().await.expect("in-memory store"),
  )
}

fn classification(
  decision_type: &str,
  quality: Option<DecisionQuality>,
  is_story: bool,
  advancement: f64,
  bonus: Option<f64>,
) -> DecisionClassification {
  DecisionClassification {
    submission_id:        Uuid::new_v4(),
    decision_type:        decision_type.into(),
    quality,
    is_story_decision:    is_story,
    progress_advancement: advancement,
    difficulty_bonus:     bonus,
    reasoning:            None,
  }
}

fn turn(user: Uuid, mission: &str, c: DecisionClassification) -> TurnInput {
  TurnInput {
    user_id:            user,
    mission_id:         mission.into(),
    classification:     c,
    session_total_secs: None,
    message_order:      None,
  }
}

// ─── Core scenarios ──────────────────────────────────────────────────────────

#[tokio::test]
async fn first_good_decision_counts_and_rewards() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  let outcome = p
    .submit_turn(turn(
      user,
      "first-contact",
      classification(
        "strategic",
        Some(DecisionQuality::Good),
        true,
        10.0,
        Some(1.5),
      ),
    ))
    .await
    .unwrap();

  let c = &outcome.progress.counters;
  assert_eq!(c.decisions_made, 1);
  assert_eq!(c.strategic.total, 1);
  assert_eq!(c.strategic.good, 1);
  assert_eq!(c.good_decisions, 1);
  assert_eq!(outcome.progress.completion_percentage, 10);
  // round(5 * 1.5) + round(10 * 1.5)
  assert_eq!(outcome.decision_xp.unwrap().delta, 23);
  assert!(!outcome.replayed);
}

#[tokio::test]
async fn invalid_decision_still_moves_progress() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  let outcome = p
    .submit_turn(turn(
      user,
      "first-contact",
      classification("none", None, false, 5.0, Some(1.0)),
    ))
    .await
    .unwrap();

  assert_eq!(outcome.progress.counters.decisions_made, 0);
  assert_eq!(outcome.progress.completion_percentage, 5);
  // Only the progress term applies.
  assert_eq!(outcome.decision_xp.unwrap().delta, 5);
  assert_eq!(outcome.decision.quality, DecisionQuality::Good);
}

#[tokio::test]
async fn difficulty_bonus_falls_back_to_the_catalog() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  // "the-last-envoy" is the Expert mission: bonus 2.0.
  let outcome = p
    .submit_turn(turn(
      user,
      "the-last-envoy",
      classification("action", Some(DecisionQuality::Good), true, 0.0, None),
    ))
    .await
    .unwrap();

  assert_eq!(outcome.decision.difficulty_bonus, 2.0);
  assert_eq!(outcome.decision_xp.unwrap().delta, 10);
}

#[tokio::test]
async fn unknown_mission_is_rejected() {
  let p = pipeline().await;
  let result = p
    .submit_turn(turn(
      Uuid::new_v4(),
      "ghost-mission",
      classification("action", Some(DecisionQuality::Good), true, 0.0, None),
    ))
    .await;
  assert!(result.is_err());
}

// ─── Idempotence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn retried_submission_is_a_noop() {
  let p = pipeline().await;
  let user = Uuid::new_v4();
  let input = turn(
    user,
    "first-contact",
    classification(
      "diplomatic",
      Some(DecisionQuality::Good),
      true,
      10.0,
      Some(1.0),
    ),
  );

  let first = p.submit_turn(input.clone()).await.unwrap();
  assert!(!first.replayed);
  let xp_after_first = first.total_xp;

  let second = p.submit_turn(input).await.unwrap();
  assert!(second.replayed);
  assert!(second.decision_xp.is_none());
  assert_eq!(second.progress.counters.decisions_made, 1);
  assert_eq!(second.total_xp, xp_after_first);
}

#[tokio::test]
async fn retried_invalid_decision_is_a_noop_too() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  // An invalid decision counts nothing, but its advancement still moves
  // completion and earns progress XP — so its retry must replay as well.
  let input = turn(
    user,
    "first-contact",
    classification("none", None, false, 5.0, Some(1.0)),
  );

  let first = p.submit_turn(input.clone()).await.unwrap();
  assert!(!first.replayed);
  assert_eq!(first.progress.completion_percentage, 5);
  let xp_after_first = first.total_xp;

  let second = p.submit_turn(input).await.unwrap();
  assert!(second.replayed);
  assert!(second.decision_xp.is_none());
  assert_eq!(second.progress.completion_percentage, 5);
  assert_eq!(second.total_xp, xp_after_first);
}

// ─── Completion ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn completion_bonus_fires_once_on_the_crossing_edge() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  let outcome = p
    .submit_turn(turn(
      user,
      "first-contact",
      classification(
        "strategic",
        Some(DecisionQuality::Good),
        true,
        100.0,
        Some(1.0),
      ),
    ))
    .await
    .unwrap();

  assert_eq!(outcome.progress.completion_percentage, 100);
  assert!(outcome.progress.is_completed());
  // 100*2 + 1 good * 5 + 200
  assert_eq!(outcome.completion_xp.unwrap().delta, 405);
  assert!(outcome.newly_unlocked.contains(&AchievementId::FirstMission));

  // A later turn while already at 100 must not re-award the bonus.
  let again = p
    .submit_turn(turn(
      user,
      "first-contact",
      classification(
        "strategic",
        Some(DecisionQuality::Good),
        true,
        10.0,
        Some(1.0),
      ),
    ))
    .await
    .unwrap();
  assert_eq!(again.progress.completion_percentage, 100);
  assert!(again.completion_xp.is_none());
}

#[tokio::test]
async fn completion_clamps_at_one_hundred() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  let outcome = p
    .submit_turn(turn(
      user,
      "first-contact",
      classification(
        "action",
        Some(DecisionQuality::Good),
        true,
        250.0,
        Some(1.0),
      ),
    ))
    .await
    .unwrap();

  assert_eq!(outcome.progress.completion_percentage, 100);
}

// ─── Achievements ────────────────────────────────────────────────────────────

#[tokio::test]
async fn diplomat_unlocks_on_the_third_decision_across_missions() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  for mission in ["first-contact", "first-contact", "the-broken-cipher"] {
    let outcome = p
      .submit_turn(turn(
        user,
        mission,
        classification(
          "diplomatic",
          Some(DecisionQuality::Good),
          true,
          0.0,
          Some(1.0),
        ),
      ))
      .await
      .unwrap();

    if mission == "the-broken-cipher" {
      assert!(outcome.newly_unlocked.contains(&AchievementId::Diplomat));
      assert_eq!(outcome.achievement_xp, 50);
    } else {
      assert!(!outcome.newly_unlocked.contains(&AchievementId::Diplomat));
    }
  }

  let unlocked = p.unlocked(user).await.unwrap();
  assert!(unlocked.contains(&AchievementId::Diplomat));
}

#[tokio::test]
async fn all_missions_unlocks_after_four_completions() {
  let p = pipeline().await;
  let user = Uuid::new_v4();
  let missions = [
    "first-contact",
    "the-broken-cipher",
    "midnight-extraction",
    "the-last-envoy",
  ];

  let mut last = None;
  for mission in missions {
    last = Some(
      p.submit_turn(turn(
        user,
        mission,
        classification(
          "strategic",
          Some(DecisionQuality::Good),
          true,
          100.0,
          Some(1.0),
        ),
      ))
      .await
      .unwrap(),
    );
  }
  let last = last.unwrap();
  assert!(last.newly_unlocked.contains(&AchievementId::AllMissions));

  // Re-evaluation with no state change unlocks nothing further.
  let again = p.record_export(user).await.unwrap();
  assert_eq!(again, vec![AchievementId::SocialButterfly]);
  let again = p.record_export(user).await.unwrap();
  assert!(again.is_empty());
}

#[tokio::test]
async fn stop_command_unlocks_stop_master_once() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  let first = p.trigger_stop_command(user).await.unwrap();
  assert_eq!(first, vec![AchievementId::StopMaster]);

  let second = p.trigger_stop_command(user).await.unwrap();
  assert!(second.is_empty());
}

// ─── Session time and reset ──────────────────────────────────────────────────

#[tokio::test]
async fn session_time_flows_into_storyteller() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  let mut input = turn(
    user,
    "first-contact",
    classification("none", None, false, 0.0, None),
  );
  input.session_total_secs = Some(301);

  let outcome = p.submit_turn(input).await.unwrap();
  assert_eq!(outcome.progress.time_spent_secs, 301);
  assert!(outcome.newly_unlocked.contains(&AchievementId::Storyteller));
}

#[tokio::test]
async fn start_fresh_drops_the_row() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  p.submit_turn(turn(
    user,
    "first-contact",
    classification("action", Some(DecisionQuality::Bad), true, 20.0, None),
  ))
  .await
  .unwrap();

  p.start_fresh(user, "first-contact").await.unwrap();
  assert!(p
    .mission_progress(user, "first-contact")
    .await
    .unwrap()
    .is_none());
}

// ─── Levels ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn level_up_is_detected_across_the_turn() {
  let p = pipeline().await;
  let user = Uuid::new_v4();

  // Completing the Easy mission in one turn: decision XP 5 + 100, bonus
  // 405, first_mission 50, speed_runner 100, perfectionist is not yet
  // satisfied (one good decision). Comfortably past 200.
  let outcome = p
    .submit_turn(turn(
      user,
      "first-contact",
      classification(
        "strategic",
        Some(DecisionQuality::Good),
        true,
        100.0,
        Some(1.0),
      ),
    ))
    .await
    .unwrap();

  assert!(outcome.leveled_up);
  assert!(outcome.level > 1);
  assert_eq!(outcome.total_xp, p.user_xp(user).await.unwrap().total_xp);
}
