//! Client-facing messages shared by every service implementation.

pub const LOGIN_REQUIRED: &str = "You must be logged in.";

pub const USER_NOT_FOUND: &str = "User not found.";
pub const USERNAME_TAKEN: &str = "This username already exists.";
pub const EMAIL_TAKEN: &str = "This email already exists.";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";
pub const USER_FORBIDDEN: &str = "You are not allowed to modify this user.";

pub const PROFILE_NOT_FOUND: &str = "Profile not found.";
pub const PROFILE_EXISTS: &str = "Profile already exists.";
pub const PROFILE_LOGIN_REQUIRED: &str = "You must be logged in to create a profile.";
pub const PROFILE_FORBIDDEN: &str = "You are not allowed to modify this profile.";

pub const EXERCISE_NOT_FOUND: &str = "Exercise not found.";
pub const EXERCISE_EXISTS: &str = "This exercise already exists.";
pub const EXERCISE_IN_USE: &str = "This exercise is used by a workout.";

pub const WORKOUT_NOT_FOUND: &str = "Workout not found.";
pub const WORKOUT_LOGIN_REQUIRED: &str = "You must be logged in to create a workout.";
pub const WORKOUT_FORBIDDEN_UPDATE: &str = "You are not allowed to update this workout.";
pub const WORKOUT_FORBIDDEN_MODIFY: &str = "You are not allowed to modify this workout.";
pub const WORKOUT_FORBIDDEN_DELETE: &str = "You are not allowed to delete this workout.";
pub const WORKOUT_NO_EXERCISES: &str = "Exercises must contain at least 1 exercise.";
pub const WORKOUT_LAST_EXERCISE: &str = "A workout must keep at least 1 exercise.";

pub const WORKOUT_EXERCISE_NOT_FOUND: &str = "Workout Exercise not found.";
pub const WORKOUT_EXERCISE_EXISTS: &str = "This exercise is already part of the workout.";

pub const STATUS_NOT_FOUND: &str = "WEStatus not found.";
pub const STATUS_EXISTS: &str = "This workout exercise already has a status.";
