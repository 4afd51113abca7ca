use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per teacher.
///
/// Lifecycle mutations (start, monitor entry, tick, end) for the same teacher
/// are read-modify-write on the same row; holding the teacher's guard for the
/// whole operation serializes them inside this process.
#[derive(Clone, Default)]
pub struct TeacherLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl TeacherLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, teacher_id: i64) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry(teacher_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_teacher_waits_other_teacher_does_not() {
        let locks = TeacherLocks::new();
        let held = locks.acquire(1).await;

        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire(2)).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire(1)).await;
        assert!(same.is_err());

        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.acquire(1)).await;
        assert!(again.is_ok());
    }
}
