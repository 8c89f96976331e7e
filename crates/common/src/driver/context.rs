use std::collections::VecDeque;

use crate::document::DocRow;
use crate::store::{Database, StoreClient};

use super::{Mode, PassSummary};

pub const LOCAL_DB: &str = "local";
pub const LOCAL_COPY_DB: &str = "localcopy";
pub const REMOTE_TEST_DB: &str = "test";

/// Everything one run of the check reads and writes
///
/// Owned by exactly one driver invocation and only ever touched through
///  `&mut`, one step at a time.
#[derive(Debug)]
pub struct RunContext<C: StoreClient> {
    pub mode: Mode,
    /// 1-based number of the current pass
    pub pass: usize,
    /// Prefix for the local scratch databases; empty for embedded stores
    pub local_base: String,
    pub remote_test_db: String,
    pub primary: Option<Database<C>>,
    pub secondary: Option<Database<C>>,
    /// Rows still waiting to be found in the local copy
    pub pending: VecDeque<DocRow>,
    pub tag: Option<String>,
    pub enumerated: usize,
    pub verified: usize,
}

impl<C: StoreClient> RunContext<C> {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            pass: 0,
            local_base: String::new(),
            remote_test_db: String::new(),
            primary: None,
            secondary: None,
            pending: VecDeque::new(),
            tag: None,
            enumerated: 0,
            verified: 0,
        }
    }

    /// Drop everything the previous pass left behind
    pub fn begin_pass(&mut self) {
        self.pass += 1;
        self.local_base.clear();
        self.remote_test_db.clear();
        self.primary = None;
        self.secondary = None;
        self.pending.clear();
        self.tag = None;
        self.enumerated = 0;
        self.verified = 0;
    }

    pub fn local_locator(&self) -> String {
        format!("{}{}", self.local_base, LOCAL_DB)
    }

    pub fn local_copy_locator(&self) -> String {
        format!("{}{}", self.local_base, LOCAL_COPY_DB)
    }

    /// Fill the verification queue; only ever done once per pass
    pub fn queue_for_verification(&mut self, rows: Vec<DocRow>) {
        debug_assert!(self.pending.is_empty() && self.enumerated == 0);
        self.enumerated = rows.len();
        self.pending = rows.into();
    }

    pub fn summary(&self, completed: bool) -> PassSummary {
        PassSummary {
            pass: self.pass,
            mode: self.mode,
            local_base: self.local_base.clone(),
            remote_test_db: self.remote_test_db.clone(),
            tag: self.tag.clone(),
            docs_enumerated: self.enumerated,
            docs_verified: self.verified,
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStoreClient;

    #[test]
    fn test_begin_pass_resets_pass_state() {
        let client = MemoryStoreClient::new();
        let mut ctx = RunContext::<MemoryStoreClient>::new(Mode::Direct);

        ctx.begin_pass();
        ctx.local_base = "mem://h:1/".to_string();
        ctx.remote_test_db = "mem://h:1/test".to_string();
        ctx.primary = Some(Database::open(&client, &ctx.local_locator()).unwrap());
        ctx.queue_for_verification(vec![DocRow {
            id: "bar".to_string(),
            rev: "1-a".to_string(),
            doc: None,
        }]);
        ctx.tag = Some("t1".to_string());

        assert_eq!(ctx.local_locator(), "mem://h:1/local");
        assert_eq!(ctx.local_copy_locator(), "mem://h:1/localcopy");

        ctx.begin_pass();
        assert_eq!(ctx.pass, 2);
        assert!(ctx.local_base.is_empty());
        assert!(ctx.remote_test_db.is_empty());
        assert!(ctx.primary.is_none());
        assert!(ctx.pending.is_empty());
        assert!(ctx.tag.is_none());
        assert_eq!(ctx.local_locator(), "local");
        assert_eq!(ctx.mode, Mode::Direct);
    }
}
