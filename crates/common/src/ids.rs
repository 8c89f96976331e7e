use std::fmt::Debug;

use uuid::Uuid;

pub trait IdGenerator: Send + Sync + Debug {
    fn new_unique_id(&self) -> String;
}

/// Random v4 uuids in their 32-character simple form
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_unique_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_generator_is_unique() {
        let ids = UuidGenerator;
        let a = ids.new_unique_id();
        let b = ids.new_unique_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
