use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::database::Clock;
use crate::models::{Exercise, Principal, User};
use crate::services::{ExerciseService, MemoryStore, UserService};

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// A fixed instant with a fractional second, so truncation is observable.
    pub fn at_default() -> Self {
        let start = Utc
            .with_ymd_and_hms(2030, 1, 15, 9, 30, 0)
            .single()
            .expect("valid start time")
            + Duration::milliseconds(750);
        Self::new(start)
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }

    pub fn clock(&self) -> Clock {
        let now = self.now.clone();
        Arc::new(move || *now.lock().expect("clock lock"))
    }
}

/// Memory-backed store plus helpers for seeding users and exercises.
pub struct TestContext {
    pub store: MemoryStore,
    pub clock: ManualClock,
}

impl TestContext {
    pub fn new() -> Self {
        let clock = ManualClock::at_default();
        let store = MemoryStore::new().with_clock(clock.clock());
        Self { store, clock }
    }

    /// Create a user with a unique name and return it as a principal.
    pub async fn principal(&self, prefix: &str) -> Principal {
        let name = format!("{}_{}", prefix, Uuid::new_v4().simple());
        let mut user = User::new(&name, format!("{}@email.com", name), "not-a-real-hash");
        self.store.create_user(&mut user).await.expect("create user");
        Principal(user)
    }

    pub async fn exercise(&self, name: &str) -> Exercise {
        let mut exercise = Exercise::new(name, format!("{} description", name));
        self.store.create_exercise(&mut exercise).await.expect("create exercise");
        exercise
    }

    pub fn tomorrow(&self) -> DateTime<Utc> {
        self.clock.now() + Duration::days(1)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
