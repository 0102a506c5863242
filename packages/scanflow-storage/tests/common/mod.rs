//! Shared fixtures: a small analysed project, a view copying it, metrics,
//! measures, users and groups.
//!
//! ```text
//! foo (TRK, snapshot 1)
//! └── foo:core (BRC, 2)
//!     └── foo:core:src (DIR, 3)
//!         ├── Alpha.php (FIL, 4)       ncloc 100, favourite of user 2
//!         ├── beta.php (FIL, 5)        ncloc 150
//!         └── AlphaTest.php (UTS, 6)   ncloc 50
//! bar (TRK, never analysed)
//! myview (VW, 10)
//! └── myview:foo (TRK, 11, copy of foo)
//! ```
#![allow(dead_code)]

use scanflow_storage::domain::{DbSession, Repository};
use scanflow_storage::{Result, SqliteRepository};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn seeded_repository() -> SqliteRepository {
    let repo = SqliteRepository::in_memory().unwrap();
    repo.with_connection(|conn| conn.execute_batch(SEED)).unwrap();
    repo
}

const SEED: &str = "
INSERT INTO components (id, uuid, kee, name, qualifier, scope, path, description, project_uuid, copy_component_id) VALUES
    (1, 'p1', 'foo', 'Foo Project', 'TRK', 'PRJ', NULL, 'The foo project', NULL, NULL),
    (2, 'm1', 'foo:core', 'Core', 'BRC', 'PRJ', NULL, NULL, 'p1', NULL),
    (3, 'd1', 'foo:core:src', 'src', 'DIR', 'DIR', 'src', NULL, 'p1', NULL),
    (4, 'f1', 'foo:core:src/Alpha.php', 'Alpha.php', 'FIL', 'FIL', 'src/Alpha.php', NULL, 'p1', NULL),
    (5, 'f2', 'foo:core:src/beta.php', 'beta.php', 'FIL', 'FIL', 'src/beta.php', NULL, 'p1', NULL),
    (6, 't1', 'foo:core:src/AlphaTest.php', 'AlphaTest.php', 'UTS', 'FIL', 'src/AlphaTest.php', NULL, 'p1', NULL),
    (7, 'p2', 'bar', 'Bar', 'TRK', 'PRJ', NULL, NULL, NULL, NULL),
    (8, 'v1', 'myview', 'My View', 'VW', 'PRJ', NULL, NULL, NULL, NULL),
    (9, 'v1c', 'myview:foo', 'Foo', 'TRK', 'PRJ', NULL, NULL, 'v1', 1);

INSERT INTO snapshots (id, component_id, root_snapshot_id, parent_snapshot_id, path, depth, qualifier, scope, created_at, islast) VALUES
    (20, 1, NULL, NULL, NULL, 0, 'TRK', 'PRJ', 500, 0),
    (1, 1, NULL, NULL, NULL, 0, 'TRK', 'PRJ', 1000, 1),
    (2, 2, 1, 1, '1.', 1, 'BRC', 'PRJ', 1000, 1),
    (3, 3, 1, 2, '1.2.', 2, 'DIR', 'DIR', 1000, 1),
    (4, 4, 1, 3, '1.2.3.', 3, 'FIL', 'FIL', 1000, 1),
    (5, 5, 1, 3, '1.2.3.', 3, 'FIL', 'FIL', 1000, 1),
    (6, 6, 1, 3, '1.2.3.', 3, 'UTS', 'FIL', 1000, 1),
    (10, 8, NULL, NULL, NULL, 0, 'VW', 'PRJ', 2000, 1),
    (11, 9, 10, 10, '10.', 1, 'TRK', 'PRJ', 2000, 1);

INSERT INTO metrics (id, name, short_name, val_type, enabled) VALUES
    (1, 'ncloc', 'Lines of code', 'INT', 1),
    (2, 'coverage', 'Coverage', 'PERCENT', 1),
    (3, 'alert_status', 'Quality Gate', 'LEVEL', 1),
    (4, 'old_metric', 'Old', 'INT', 0);

INSERT INTO project_measures (snapshot_id, metric_id, value, text_value, variation_value_1) VALUES
    (1, 1, 300, NULL, NULL),
    (1, 2, 80.0, NULL, 5.0),
    (1, 3, NULL, 'OK', NULL),
    (4, 1, 100, NULL, NULL),
    (5, 1, 150, NULL, NULL),
    (6, 1, 50, NULL, NULL);

INSERT INTO properties (prop_key, resource_id, user_id) VALUES ('favourite', 4, 2);

INSERT INTO users (id, login, name, email) VALUES
    (1, 'admin', 'Administrator', NULL),
    (2, 'john', 'John', 'john@email.com'),
    (3, 'jane', 'Jane', NULL);

INSERT INTO user_groups (id, name) VALUES (1, 'sonar-users'), (2, 'sonar-administrators');
INSERT INTO groups_users (user_id, group_id) VALUES (1, 1), (1, 2), (2, 1);

INSERT INTO user_tokens (login, name, token_hash, created_at) VALUES
    ('admin', 'ci', 'h1', 1),
    ('admin', 'laptop', 'h2', 2),
    ('john', 'ci', 'h3', 3);
";

/// Counts sessions opened on the wrapped repository
pub struct CountingRepository {
    inner: SqliteRepository,
    sessions: AtomicUsize,
}

impl CountingRepository {
    pub fn new(inner: SqliteRepository) -> Self {
        Self {
            inner,
            sessions: AtomicUsize::new(0),
        }
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

impl Repository for CountingRepository {
    fn open_session(&self) -> Result<Box<dyn DbSession + '_>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        self.inner.open_session()
    }
}
