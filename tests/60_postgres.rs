//! Postgres repositories against a live database.
//!
//! Set `TEST_DATABASE_URL` to run these; without it every test returns early.
//! Names carry a random suffix so runs can share one database.

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use fwt_api::auth::PasswordHasher;
use fwt_api::config::DatabaseConfig;
use fwt_api::database::{DatabaseManager, PgStore};
use fwt_api::models::{
    ErrorKind, Exercise, ExerciseFilter, ExerciseStatus, Principal, Profile, ProfileUpdate, User, UserUpdate,
    WEStatusUpdate, Workout, WorkoutExerciseFilter, WorkoutFilter,
};
use fwt_api::services::{
    ExerciseService, ProfileService, UserService, WEStatusService, WorkoutExerciseService, WorkoutService,
};

async fn store() -> Result<Option<PgStore>> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(None);
    };
    let db = DatabaseManager::open(&DatabaseConfig {
        url: Some(url),
        max_connections: 5,
        connection_timeout: 10,
        run_migrations: true,
    })
    .await?;
    db.migrate().await?;
    Ok(Some(PgStore::new(db, PasswordHasher::new(4))))
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

async fn principal(store: &PgStore, prefix: &str) -> Result<Principal> {
    let name = unique(prefix);
    let hash = PasswordHasher::new(4).hash("secret123").await?;
    let mut user = User::new(name.clone(), format!("{}@email.com", name), hash);
    store.create_user(&mut user).await?;
    Ok(Principal(user))
}

async fn exercise(store: &PgStore, prefix: &str) -> Result<Exercise> {
    let mut exercise = Exercise::new(unique(prefix), "test exercise");
    store.create_exercise(&mut exercise).await?;
    Ok(exercise)
}

#[tokio::test]
async fn users_round_trip_and_conflict() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };

    let jane = principal(&store, "jane").await?;
    let user = jane.user();
    assert!(user.id > 0);
    assert_eq!(user.created_at, user.updated_at);
    assert_eq!(store.find_user_by_id(user.id).await?, *user);

    let mut dup = User::new(user.username.clone(), unique("other") + "@email.com", "hash");
    let err = store.create_user(&mut dup).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.to_string(), "This username already exists.");

    let mut dup = User::new(unique("other"), user.email.clone(), "hash");
    let err = store.create_user(&mut dup).await.unwrap_err();
    assert_eq!(err.to_string(), "This email already exists.");

    let authed = store.authenticate(&user.username, "secret123").await?;
    assert_eq!(authed.id, user.id);
    let err = store.authenticate(&user.username, "wrong-password").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);

    let updated = store.update_user(Some(&jane), user.id, UserUpdate::default()).await?;
    assert_eq!(updated.username, user.username);
    assert!(updated.updated_at >= user.updated_at);
    assert_eq!(store.find_user_by_id(user.id).await?, updated);
    Ok(())
}

#[tokio::test]
async fn profile_lifecycle() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };
    let jane = principal(&store, "jane").await?;
    let john = principal(&store, "john").await?;

    let dob = NaiveDate::from_ymd_opt(1990, 4, 2).unwrap_or_default();
    let mut profile = Profile::new("Jane", "Doe", dob, "female", 170.0, 62.5);
    store.create_profile(Some(&jane), &mut profile).await?;
    assert_eq!(profile.user_id, jane.id());
    assert_eq!(store.find_profile_by_user_id(jane.id()).await?, profile);

    let mut again = Profile::new("Jane", "Doe", dob, "female", 170.0, 62.5);
    let err = store.create_profile(Some(&jane), &mut again).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let upd = ProfileUpdate { weight: Some(90.0), ..Default::default() };
    let err = store.update_profile(Some(&john), profile.id, upd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(store.find_profile_by_id(profile.id).await?.weight, 62.5);

    store.delete_profile(Some(&jane), profile.id).await?;
    let err = store.find_profile_by_id(profile.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "Profile not found.");
    Ok(())
}

#[tokio::test]
async fn leg_day_with_statuses() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };
    let jane = principal(&store, "jane").await?;
    let squat = exercise(&store, "squat").await?;
    let lunge = exercise(&store, "lunge").await?;

    let mut workout = Workout::new("Leg Day", Utc::now() + Duration::hours(1));
    store
        .create_workout(Some(&jane), &mut workout, &[squat.name.clone(), lunge.name.clone()])
        .await?;
    assert!(workout.id > 0);
    assert_eq!(workout.created_at, workout.updated_at);

    let (workouts, count) = store.find_workouts(WorkoutFilter::by_user_id(jane.id())).await?;
    assert_eq!(count, 1);
    let names: Vec<&str> = workouts[0].exercises.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec![squat.name.as_str(), lunge.name.as_str()]);

    let (rows, count) = store.find_workout_exercises(WorkoutExerciseFilter::by_workout_id(workout.id)).await?;
    assert_eq!(count, 2);
    let first = rows.iter().find(|we| we.order == 1).map(|we| we.id).unwrap_or_default();
    let status = store.find_status_by_workout_exercise_id(first).await?;
    assert_eq!(status.status, ExerciseStatus::Pending);

    let done = store
        .update_status(
            Some(&jane),
            status.id,
            WEStatusUpdate { status: Some(ExerciseStatus::Completed), ..Default::default() },
        )
        .await?;
    assert!(done.completed_at.is_some());

    // squat is referenced, so the catalog refuses to drop it
    let err = store.delete_exercise(squat.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    store.delete_workout(Some(&jane), workout.id).await?;
    let err = store.find_status_by_id(status.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    store.delete_exercise(squat.id).await?;
    Ok(())
}

#[tokio::test]
async fn failed_create_writes_nothing() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };
    let jane = principal(&store, "jane").await?;
    let squat = exercise(&store, "squat").await?;

    let mut workout = Workout::new("Leg Day", Utc::now() + Duration::hours(1));
    let err = store
        .create_workout(Some(&jane), &mut workout, &[squat.name.clone(), unique("missing")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let (_, count) = store.find_workouts(WorkoutFilter::by_user_id(jane.id())).await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn non_owner_cannot_change_workout() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };
    let jane = principal(&store, "jane").await?;
    let john = principal(&store, "john").await?;
    let squat = exercise(&store, "squat").await?;

    let mut workout = Workout::new("Leg Day", Utc::now() + Duration::hours(1));
    store.create_workout(Some(&jane), &mut workout, &[squat.name.clone()]).await?;

    let err = store.delete_workout(Some(&john), workout.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    let err = store.delete_workout(None, workout.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);

    let unchanged = store.find_workout_by_id(workout.id).await?;
    assert_eq!(unchanged.name, "Leg Day");
    Ok(())
}

#[tokio::test]
async fn filter_pages_report_full_count() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };
    let prefix = unique("page");
    for i in 0..3 {
        let mut e = Exercise::new(format!("{}_{}", prefix, i), "paged");
        store.create_exercise(&mut e).await?;
    }

    let name = format!("{}_1", prefix);
    let (found, count) = store.find_exercises(ExerciseFilter::by_name(name.clone())).await?;
    assert_eq!(count, 1);
    assert_eq!(found[0].name, name);

    // past the last row the total still comes back
    let (found, count) = store
        .find_exercises(ExerciseFilter { name: Some(name), offset: 5, limit: 10, ..Default::default() })
        .await?;
    assert!(found.is_empty());
    assert_eq!(count, 1);
    Ok(())
}
