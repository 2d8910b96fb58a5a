pub mod error;
pub mod exercise;
pub mod profile;
pub mod user;
pub mod workout;
pub mod workout_exercise;
pub mod workout_exercise_status;

pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use exercise::{Exercise, ExerciseFilter, ExerciseUpdate};
pub use profile::{Profile, ProfileFilter, ProfileUpdate};
pub use user::{require_principal, Principal, User, UserFilter, UserUpdate};
pub use workout::{dedup_names, Workout, WorkoutFilter, WorkoutUpdate};
pub use workout_exercise::{WorkoutExercise, WorkoutExerciseFilter, WorkoutExerciseUpdate};
pub use workout_exercise_status::{ExerciseStatus, WEStatus, WEStatusFilter, WEStatusUpdate};
